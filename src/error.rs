//! Error types for the graph engine.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, GraphError>;

#[derive(Error, Debug)]
pub enum GraphError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store error: {0}")]
    Store(#[from] rocksdb::Error),

    #[error("corruption: {0}")]
    Corruption(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("config error: {0}")]
    Config(String),
}

impl GraphError {
    /// Error code for the taxonomy in the external interface contract:
    /// Ok / NotFound / IoError / Corruption / InvalidArgument.
    pub fn code(&self) -> &'static str {
        match self {
            GraphError::NotFound(_) => "NOT_FOUND",
            GraphError::Io(_) => "IO_ERROR",
            GraphError::Store(_) => "IO_ERROR",
            GraphError::Corruption(_) => "CORRUPTION",
            GraphError::InvalidArgument(_) => "INVALID_ARGUMENT",
            GraphError::Serialization(_) => "CORRUPTION",
            GraphError::Config(_) => "INVALID_ARGUMENT",
        }
    }
}
