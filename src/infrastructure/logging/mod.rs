// Logging module - Logging infrastructure
use std::io;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize logging system
///
/// `RUST_LOG` wins when set; otherwise `default_filter` applies. Calling
/// this more than once is harmless.
pub fn init_logging(default_filter: &str) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("aircom={},warn,error", default_filter)));

    let result = tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .with_target(true)
                .with_level(true),
        )
        .try_init();

    // A second init keeps the first subscriber
    if result.is_ok() {
        tracing::info!("aircom logging system initialized");
    }
    Ok(())
}
