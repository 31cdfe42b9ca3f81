use base64::Engine as _;
use std::path::Path;
use std::time::Duration;
use tokio::time::{timeout, Instant};

use crate::cli::args::{
    Args, Command, ConfigArgs, ConfigCommand, MonitorArgs, SendArgs, TargetArgs,
};
use crate::cli::output::{hex_dump, ConsoleWriter, OutputWriter};
use crate::core::discovery::{DeviceManager, StaticScanner};
use crate::core::session::{KeepaliveConfig, Session, SessionEvent};
use crate::domain::config::AircomConfig;
use crate::domain::device::Device;
use crate::domain::error::{AircomError, AircomResult};
use crate::domain::line::{DataBits, StopBits};
use crate::infrastructure::config::ConfigManager;
use crate::infrastructure::logging::init_logging;

/// Execute CLI command
pub async fn execute_command(args: Args) -> Result<(), AircomError> {
    let writer = ConsoleWriter::new(args.output.clone());

    let config_manager = ConfigManager::new()?;
    let config = if let Some(config_path) = &args.config {
        config_manager.load_config_from_path(Path::new(config_path))?
    } else {
        config_manager.load_config()?
    };

    if !args.quiet {
        let level = if args.verbose {
            "debug"
        } else {
            config.global.log_level.as_str()
        };
        let _ = init_logging(level);
    }

    match args.command {
        Command::Devices => execute_devices(&writer, &config).await,
        Command::Send(send_args) => execute_send(send_args, &writer, &config).await,
        Command::Monitor(monitor_args) => execute_monitor(monitor_args, &writer, &config).await,
        Command::Config(config_args) => {
            execute_config(config_args, &writer, &config, &config_manager)
        }
        Command::Version => {
            writer.write_message(&format!("aircom {}", DeviceManager::sdk_version()))?;
            Ok(())
        }
    }
}

async fn execute_devices(writer: &ConsoleWriter, config: &AircomConfig) -> Result<(), AircomError> {
    let manager = DeviceManager::new();
    manager
        .register_scanner(Box::new(StaticScanner::from_config(config)))
        .await;
    manager.scan_for_devices().await?;

    // Give the merge task a moment to fold the announcements in
    tokio::time::sleep(Duration::from_millis(100)).await;

    writer.write_devices(&manager.device_list())?;
    manager.stop_scanning().await;
    Ok(())
}

async fn execute_send(
    args: SendArgs,
    writer: &ConsoleWriter,
    config: &AircomConfig,
) -> Result<(), AircomError> {
    let data = if args.text {
        args.data.clone().into_bytes()
    } else {
        parse_hex(&args.data)?
    };

    let (session, mut events) = build_session(&args.target, config)?;
    if !session.connect_wait().await {
        return Err(connect_failure(&mut events));
    }

    let sent = session.write(&data);
    writer.write_message(&format!("Sent {} bytes", sent))?;

    let mut received = Vec::new();
    let deadline = Instant::now() + Duration::from_millis(args.wait_ms);
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }
        match timeout(remaining, events.recv()).await {
            Ok(Some(SessionEvent::BytesAvailable { .. })) => drain_session(&session, &mut received),
            Ok(Some(SessionEvent::DidDisconnect)) => break,
            Ok(Some(_)) => {}
            Ok(None) | Err(_) => break,
        }
    }

    if received.is_empty() {
        writer.write_message("No reply")?;
    } else {
        writer.write_message(&format!(
            "Received {} bytes:\n{}",
            received.len(),
            hex_dump(&received)
        ))?;
    }

    session.disconnect();
    Ok(())
}

async fn execute_monitor(
    args: MonitorArgs,
    writer: &ConsoleWriter,
    config: &AircomConfig,
) -> Result<(), AircomError> {
    let (session, mut events) = build_session(&args.target, config)?;
    if !session.connect_wait().await {
        return Err(connect_failure(&mut events));
    }
    writer.write_message(&format!(
        "Connected to {}:{} (port {}), press Ctrl-C to stop",
        args.target.host, args.target.port, args.target.port_number
    ))?;

    let deadline = args
        .duration_ms
        .map(|ms| Instant::now() + Duration::from_millis(ms));

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = async {
                match deadline {
                    Some(at) => tokio::time::sleep_until(at).await,
                    None => std::future::pending::<()>().await,
                }
            } => break,
            event = events.recv() => match event {
                Some(SessionEvent::BytesAvailable { .. }) => {
                    let mut data = Vec::new();
                    drain_session(&session, &mut data);
                    if args.hex {
                        print!("{}", hex_dump(&data));
                    } else {
                        print!("{}", String::from_utf8_lossy(&data));
                    }
                }
                Some(SessionEvent::LinePropertiesChanged) => {
                    writer.write_message(&format!(
                        "Line: {} baud, {} data bits, parity {}, flow {}",
                        session.baud_rate(),
                        session.data_bits().to_wire(),
                        session.parity(),
                        session.flow_control()
                    ))?;
                }
                Some(SessionEvent::ModemStatusChanged { msr, prev_msr }) => {
                    writer.write_message(&format!(
                        "Modem status: {:02x} (was {:02x})",
                        msr, prev_msr
                    ))?;
                }
                Some(SessionEvent::SignatureChanged { signature }) => {
                    writer.write_message(&format!("Signature: {}", signature))?;
                }
                Some(SessionEvent::DidOverflow) => {
                    writer.write_error("receive buffer overflowed, data was discarded")?;
                }
                Some(SessionEvent::DidDisconnect) => {
                    writer.write_message("Disconnected")?;
                    return Ok(());
                }
                Some(_) => {}
                None => break,
            },
        }
    }

    session.disconnect();
    Ok(())
}

fn execute_config(
    args: ConfigArgs,
    writer: &ConsoleWriter,
    config: &AircomConfig,
    config_manager: &ConfigManager,
) -> Result<(), AircomError> {
    match args.command {
        ConfigCommand::Show => {
            writer.write_config(config)?;
            Ok(())
        }
        ConfigCommand::Init => {
            config_manager.save_config(&AircomConfig::default())?;
            writer.write_message(&format!(
                "Wrote default configuration to {}",
                config_manager.global_path().display()
            ))?;
            Ok(())
        }
        ConfigCommand::Path => {
            writer.write_message(&format!("global: {}", config_manager.global_path().display()))?;
            match config_manager.project_path() {
                Some(path) => writer.write_message(&format!("project: {}", path.display()))?,
                None => writer.write_message("project: (none found)")?,
            }
            Ok(())
        }
    }
}

/// Build a session toward the target, with line parameters, credentials and
/// keepalive queued for the connect.
fn build_session(
    target: &TargetArgs,
    config: &AircomConfig,
) -> AircomResult<(
    Session,
    tokio::sync::mpsc::UnboundedReceiver<SessionEvent>,
)> {
    let data_bits = DataBits::from_wire(target.data_bits)
        .ok_or_else(|| AircomError::InvalidInput(format!("invalid data bits: {}", target.data_bits)))?;
    let stop_bits = StopBits::from_wire(target.stop_bits)
        .ok_or_else(|| AircomError::InvalidInput(format!("invalid stop bits: {}", target.stop_bits)))?;

    let mut device = Device::with_ip(&target.host, &target.host, target.port);
    device.port_count = target.port_number.max(1);
    let session = Session::with_port(device, target.port_number)?;

    if let Some(user) = &target.user {
        let secret = match &target.secret {
            Some(encoded) => base64::engine::general_purpose::STANDARD
                .decode(encoded)
                .map_err(|e| AircomError::InvalidInput(format!("invalid secret: {}", e)))?,
            None => Vec::new(),
        };
        session.set_credentials(user, &secret)?;
    }

    let keepalive = &config.global.keepalive;
    if target.keepalive || keepalive.enabled {
        session.set_keepalive(KeepaliveConfig {
            enabled: true,
            interval: Duration::from_millis(keepalive.interval_ms),
            timeout: Duration::from_millis(keepalive.timeout_ms),
        });
    }

    session.set_connect_timeout(Duration::from_millis(config.global.connect_timeout_ms));
    session.set_buffer_capacity(config.global.buffer_capacity);
    session.set_line_parameters(target.baud, data_bits, target.parity.into(), stop_bits);
    session.set_flow_control(target.flow_control.into());

    let events = session.take_events().ok_or_else(|| AircomError::Session {
        message: "event queue already taken".to_string(),
    })?;
    Ok((session, events))
}

/// Pull the failure message out of the queued events
fn connect_failure(
    events: &mut tokio::sync::mpsc::UnboundedReceiver<SessionEvent>,
) -> AircomError {
    while let Ok(event) = events.try_recv() {
        if let SessionEvent::FailedToConnect { message } = event {
            return AircomError::Connect { message };
        }
    }
    AircomError::Connect {
        message: "connection failed".to_string(),
    }
}

fn drain_session(session: &Session, out: &mut Vec<u8>) {
    let mut buf = [0u8; 4096];
    loop {
        let n = session.read(&mut buf);
        if n == 0 {
            break;
        }
        out.extend_from_slice(&buf[..n]);
    }
}

fn parse_hex(input: &str) -> AircomResult<Vec<u8>> {
    let cleaned: String = input.chars().filter(|c| !c.is_whitespace()).collect();
    hex::decode(&cleaned).map_err(|e| AircomError::InvalidInput(format!("invalid hex data: {}", e)))
}
