use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Insufficient training data: {0}")]
    InsufficientData(String),

    #[error("Model not ready: train or load a model first")]
    ModelNotReady,

    #[error("Embedding provider unavailable: {0}")]
    EmbeddingUnavailable(String),

    #[error("ANN index not loaded")]
    IndexNotLoaded,

    #[error("Index corrupted: {0}")]
    IndexCorrupted(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
