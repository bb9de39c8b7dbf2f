use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Dump producer failed: {0}")]
    DumpProducer(String),

    #[error("Backup state file is corrupt: {0}")]
    CorruptState(String),

    #[error("Upload failed: {0}")]
    Upload(String),

    #[error("Storage operation failed: {0}")]
    Storage(String),

    #[error("Serde JSON error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    #[error("Another backup run appears to be in progress (lock file {0} exists)")]
    Locked(String),
}

pub type Result<T> = std::result::Result<T, AppError>;
