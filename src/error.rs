use thiserror::Error;

#[derive(Error, Debug)]
pub enum SnapError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Stream {stream}: missing column '{column}'")]
    MissingColumn { stream: String, column: String },

    #[error("Unknown stream: {0} (pass --kind to reconcile it)")]
    UnknownStream(String),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("Invalid date: {0}")]
    InvalidDate(String),

    #[error("{0} stream(s) failed to reconcile")]
    StreamsFailed(usize),
}

pub type Result<T> = std::result::Result<T, SnapError>;
