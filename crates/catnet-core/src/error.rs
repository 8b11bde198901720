use std::path::PathBuf;

use thiserror::Error;

/// Error type shared by every catnet crate.
#[derive(Debug, Error)]
pub enum CnnError {
    #[error("Shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        got: Vec<usize>,
    },

    #[error("Parameter header mismatch for `{field}`: layer expects {expected}, file has {got}")]
    HeaderMismatch {
        field: &'static str,
        expected: usize,
        got: i64,
    },

    #[error("Invalid layer geometry: {0}")]
    InvalidGeometry(String),

    #[error("Cannot parse token {token:?} at position {position}")]
    Parse { token: String, position: usize },

    #[error("Unexpected end of parameters at position {position}: expected {expected}")]
    UnexpectedEof {
        expected: &'static str,
        position: usize,
    },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to load {path}: {source}")]
    Load {
        path: PathBuf,
        #[source]
        source: Box<CnnError>,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl CnnError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CnnError::Io {
            path: path.into(),
            source,
        }
    }

    /// Attach the file a layer was being loaded from.
    pub fn in_file(self, path: impl Into<PathBuf>) -> Self {
        CnnError::Load {
            path: path.into(),
            source: Box::new(self),
        }
    }
}

pub type CnnResult<T> = Result<T, CnnError>;
