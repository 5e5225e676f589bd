//! Shared Image Conversion Error Types
//!
//! Every variant is local to one file of a batch; none of them abort the batch.

use serde::{Serialize, Serializer};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Which side of a conversion hit the I/O problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IoStage {
    Read,
    Write,
}

impl fmt::Display for IoStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IoStage::Read => write!(f, "read"),
            IoStage::Write => write!(f, "write"),
        }
    }
}

/// How the batch should treat an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The file could not be converted; move on to the next one.
    Fatal,
    /// Retrying the same file later may succeed (e.g. a file lock was released).
    Recoverable,
    /// The request itself is malformed; reject before touching any file.
    Contract,
}

#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("Permission denied ({stage}): {}", path.display())]
    PermissionDenied { path: PathBuf, stage: IoStage },

    #[error("Failed to decode {}: {reason}", path.display())]
    DecodeFailure { path: PathBuf, reason: String },

    #[error("Failed to encode {}: {reason}", path.display())]
    EncodeFailure { path: PathBuf, reason: String },

    #[error("Output format not supported: {0}")]
    InvalidOutputFormat(String),
}

impl ConvertError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ConvertError::PermissionDenied { .. } => ErrorCategory::Recoverable,
            ConvertError::DecodeFailure { .. } | ConvertError::EncodeFailure { .. } => {
                ErrorCategory::Fatal
            }
            ConvertError::InvalidOutputFormat(_) => ErrorCategory::Contract,
        }
    }

    pub fn is_permission_denied(&self) -> bool {
        matches!(self, ConvertError::PermissionDenied { .. })
    }

    /// Classify an I/O error raised while reading `path`.
    pub fn from_read_io(path: &Path, err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::PermissionDenied {
            ConvertError::PermissionDenied {
                path: path.to_path_buf(),
                stage: IoStage::Read,
            }
        } else {
            ConvertError::DecodeFailure {
                path: path.to_path_buf(),
                reason: err.to_string(),
            }
        }
    }

    /// Classify an I/O error raised while writing `path`.
    pub fn from_write_io(path: &Path, err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::PermissionDenied {
            ConvertError::PermissionDenied {
                path: path.to_path_buf(),
                stage: IoStage::Write,
            }
        } else {
            ConvertError::EncodeFailure {
                path: path.to_path_buf(),
                reason: err.to_string(),
            }
        }
    }

    pub fn from_decode(path: &Path, err: image::ImageError) -> Self {
        match err {
            image::ImageError::IoError(e) => Self::from_read_io(path, e),
            other => ConvertError::DecodeFailure {
                path: path.to_path_buf(),
                reason: other.to_string(),
            },
        }
    }

    pub fn from_encode(path: &Path, err: image::ImageError) -> Self {
        match err {
            image::ImageError::IoError(e) => Self::from_write_io(path, e),
            other => ConvertError::EncodeFailure {
                path: path.to_path_buf(),
                reason: other.to_string(),
            },
        }
    }
}

impl Serialize for ConvertError {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ConvertError>;
