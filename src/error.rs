//! Error types for the brand-renditions crate.

use std::path::PathBuf;

/// Errors that can occur while deriving brand icon renditions.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A source image file could not be decoded.
    #[error("failed to decode {path}: {source}")]
    Decode {
        /// Path of the unreadable file.
        path: PathBuf,
        /// Underlying decode error.
        source: image::ImageError,
    },

    /// An output variant could not be encoded or written.
    #[error("failed to encode {path}: {source}")]
    Encode {
        /// Destination path of the failed write.
        path: PathBuf,
        /// Underlying encode error.
        source: image::ImageError,
    },

    /// No pixel in the image exceeds the alpha tolerance, so content bounds
    /// (and everything derived from them) are undefined.
    #[error("image has no visible content above alpha tolerance {tolerance}")]
    NoContent {
        /// The alpha tolerance that was applied (0-255).
        tolerance: u8,
    },

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The image format is not supported.
    #[error("unsupported image format: {0}")]
    UnsupportedFormat(String),
}

/// A specialized `Result` type for this crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let io_err = Error::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        assert!(io_err.to_string().contains("gone"));

        let unsupported = Error::UnsupportedFormat("tiff".to_string());
        assert!(unsupported.to_string().contains("tiff"));

        let no_content = Error::NoContent { tolerance: 30 };
        assert!(no_content.to_string().contains("30"));
    }
}
