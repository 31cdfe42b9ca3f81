use thiserror::Error;

/// Aircom unified error type
#[derive(Error, Debug)]
pub enum AircomError {
    #[error("Connection failed: {message}")]
    Connect { message: String },

    #[error("Network error: {0}")]
    Network(#[from] std::io::Error),

    #[error("Connection timeout")]
    Timeout,

    #[error("Authentication failed: {message}")]
    Auth { message: String },

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Session error: {message}")]
    Session { message: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Output error: {0}")]
    Output(String),
}

pub type AircomResult<T> = Result<T, AircomError>;
