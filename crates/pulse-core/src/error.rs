use thiserror::Error;

#[derive(Error, Debug)]
pub enum PulseError {
    #[error("API error: {0}")]
    ApiError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}
