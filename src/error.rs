use thiserror::Error;

#[derive(Error, Debug)]
pub enum QualityError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("Telemetry error at line {line}: {message}")]
    Telemetry { line: usize, message: String },

    #[error("Invalid resolution table: {message}")]
    InvalidTable { message: String },
}

impl QualityError {
    pub fn telemetry<S: Into<String>>(line: usize, message: S) -> Self {
        Self::Telemetry {
            line,
            message: message.into(),
        }
    }

    pub fn invalid_table<S: Into<String>>(message: S) -> Self {
        Self::InvalidTable {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, QualityError>;
