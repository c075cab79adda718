use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, KnnError>;

#[derive(Debug, Error)]
pub enum KnnError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("malformed row at line {line}: {message}")]
    Parse { line: usize, message: String },
    #[error("raw weight {weight} at line {line} is below 1; the cost transform 100/ln(w+1) needs w >= 1")]
    InvalidWeight { line: usize, weight: i64 },
    #[error("requested {k} neighbours but the graph has only {vertices} vertices (K must be <= V - 1)")]
    TooManyNeighbours { k: usize, vertices: usize },
    #[error("graph has no vertices")]
    EmptyGraph,
    #[error("worker pool error: {0}")]
    ThreadPool(String),
    #[error("internal invariant violated: {0}")]
    Internal(String),
}

impl KnnError {
    pub(crate) fn parse(line: usize, message: impl Into<String>) -> Self {
        KnnError::Parse { line, message: message.into() }
    }
}
