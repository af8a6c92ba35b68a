use thiserror::Error;

#[derive(Error, Debug)]
pub enum GarpError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Data error: {0}")]
    Data(String),

    #[error("Algorithm error: {0}")]
    Algorithm(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("No run was accepted out of {attempted} attempted: {reasons}")]
    NoAcceptedRuns { attempted: usize, reasons: String },

    #[error("Run cancelled")]
    Cancelled,

    #[error("Run exceeded its time limit of {0} ms")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serde error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, GarpError>;
