//! Error taxonomy for the routing engine
//!
//! Library code returns typed errors; the CLI and server map them onto exit
//! codes and HTTP responses at the boundary. Per-query failures (`NoRoute`,
//! `NoSegment`, `Timeout`) are values a worker returns to its caller and
//! never terminate the process.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ErrorKind>;

#[derive(Debug, Error)]
pub enum ErrorKind {
    /// Missing file, empty required section, malformed CSV line, profile
    /// rejection. Fatal during preprocessing and worker startup.
    #[error("bad input: {0}")]
    BadInput(String),

    /// Fingerprint major mismatch or edge-CRC mismatch between the query
    /// graph and the dataset it was built from. The worker refuses to start.
    #[error("incompatible dataset: {0}")]
    IncompatibleDataset(String),

    /// Bidirectional search exhausted both heaps without meeting, or the
    /// meeting distance stayed infinite.
    #[error("no route found between the given coordinates")]
    NoRoute,

    /// Snapping failed within the configured search radius.
    #[error("no road segment within search radius of coordinate {index}")]
    NoSegment { index: usize },

    /// Query deadline expired mid-search. No partial result is returned.
    #[error("query exceeded its deadline")]
    Timeout,

    /// Always a bug: a broken internal invariant such as a shortcut whose
    /// unpacking pair cannot be found.
    #[error("internal invariant violated: {0}")]
    InternalInvariant(String),

    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ErrorKind {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ErrorKind::Io {
            path: path.into(),
            source,
        }
    }

    /// Process exit code for CLI tools: 1 for bad arguments / missing
    /// input, 2 for a corrupted dataset.
    pub fn exit_code(&self) -> i32 {
        match self {
            ErrorKind::IncompatibleDataset(_) => 2,
            _ => 1,
        }
    }

    /// True for errors a query worker reports as a well-formed response
    /// instead of failing.
    pub fn is_per_query(&self) -> bool {
        matches!(
            self,
            ErrorKind::NoRoute | ErrorKind::NoSegment { .. } | ErrorKind::Timeout
        )
    }
}
