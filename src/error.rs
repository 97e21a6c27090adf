use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

/// Capacity exhaustion on non-blocking operations is a normal `false`/`None`
/// return, not an `Error` variant.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("directory {0} exists but is not a persistent queue")]
    NotAQueue(PathBuf),
    #[error("codec error: {0}")]
    Codec(String),
    #[error("operation cancelled")]
    Cancelled,
    #[error("page {0} not found")]
    PageNotFound(u32),
}
