//! Centralized error types for eml2pdf.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the eml2pdf library.
///
/// Per-part and per-field decoding problems are never reported through this
/// type; they are recorded as warnings and the run continues. What remains
/// splits into fatal configuration errors (see [`ConvertError::is_fatal_config`])
/// and unexpected failures.
#[derive(Error, Debug)]
pub enum ConvertError {
    /// I/O error with the associated file path.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The input file does not exist.
    #[error("Input file not found: {0}")]
    FileNotFound(PathBuf),

    /// The configured output directory does not exist.
    #[error("Output directory does not exist: {0}")]
    OutputDirectoryMissing(PathBuf),

    /// The destination document already exists and overwriting was not requested.
    #[error("Output file {0} already exists")]
    OutputExists(PathBuf),

    /// The external renderer binary could not be located.
    #[error("Renderer '{0}' was not found on PATH; please install it")]
    RendererMissing(String),

    /// The input could not be parsed as a message at all.
    #[error("MIME parse error: {0}")]
    MimeError(String),

    /// The input encoding label is not known.
    #[error("Unsupported encoding: {0}")]
    UnsupportedEncoding(String),

    /// The renderer process failed to start or to produce a document.
    #[error("Renderer error: {0}")]
    RenderError(String),

    /// Reading or rewriting the produced document's metadata failed.
    #[error("Metadata error on '{path}': {reason}")]
    MetadataError { path: PathBuf, reason: String },

    /// A remote image could not be retrieved.
    #[error("Could not fetch '{url}': {reason}")]
    FetchError { url: String, reason: String },
}

/// Convenience alias for `Result<T, ConvertError>`.
pub type Result<T> = std::result::Result<T, ConvertError>;

impl ConvertError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error belongs to the "fatal configuration error" class
    /// (exit code 2) rather than to unexpected failures (exit code 3).
    pub fn is_fatal_config(&self) -> bool {
        matches!(
            self,
            Self::FileNotFound(_)
                | Self::OutputDirectoryMissing(_)
                | Self::OutputExists(_)
                | Self::RendererMissing(_)
                | Self::UnsupportedEncoding(_)
        )
    }
}

/// Allow `?` on `std::io::Error` inside functions returning `ConvertError`
/// when no path context is available (rare, prefer `ConvertError::io`).
impl From<std::io::Error> for ConvertError {
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            path: PathBuf::from("<unknown>"),
            source,
        }
    }
}
