//! Error types for the afdicon crate.

/// Errors that can occur while acquiring, compositing, or serving an icon.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Neither a usable upload nor a URL was supplied.
    #[error("must provide an image URL or upload an image file")]
    MissingInput,

    /// The overlay index is not an integer in the supported range.
    #[error("invalid overlay index {0:?}: expected an integer from 1 to 9")]
    InvalidIndex(String),

    /// The source image is not square.
    #[error("image must be square, got {width}x{height}")]
    ShapeMismatch {
        /// Image width in pixels.
        width: u32,
        /// Image height in pixels.
        height: u32,
    },

    /// Fetching or decoding a remote image failed.
    #[error("unable to get image from {url}: {reason}")]
    Acquisition {
        /// The URL the caller asked for.
        url: String,
        /// Upstream status and body, transport error, or decode error.
        reason: String,
    },

    /// An overlay asset could not be decoded.
    #[error("failed to decode overlay {index}: {source}")]
    OverlayDecode {
        /// Overlay index the asset belongs to.
        index: u8,
        /// Underlying decode error.
        source: image::ImageError,
    },

    /// An overlay asset file is missing from the overlay directory.
    #[error("overlay {0} is missing")]
    OverlayMissing(u8),

    /// The file format is not supported for offline rendering.
    #[error("unsupported image format: {0}")]
    UnsupportedFormat(String),

    /// A compositing job was lost before it produced a result.
    #[error("compositing worker failed: {0}")]
    Worker(String),

    /// The HTTP client could not be constructed.
    #[cfg(feature = "server")]
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An error occurred during image processing (load, save, encode).
    #[error("image processing error: {0}")]
    Image(#[from] image::ImageError),
}

/// Coarse classification of an [`Error`], used to pick a response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad or missing request input.
    Input,
    /// Non-square source image.
    Shape,
    /// Remote fetch or decode failure.
    Acquisition,
    /// Asset, worker, or I/O failure: a deployment or programming error.
    Internal,
}

impl Error {
    /// Classify this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingInput | Self::InvalidIndex(_) => ErrorKind::Input,
            Self::ShapeMismatch { .. } => ErrorKind::Shape,
            Self::Acquisition { .. } => ErrorKind::Acquisition,
            Self::OverlayDecode { .. }
            | Self::OverlayMissing(_)
            | Self::UnsupportedFormat(_)
            | Self::Worker(_)
            | Self::Io(_)
            | Self::Image(_) => ErrorKind::Internal,
            #[cfg(feature = "server")]
            Self::Http(_) => ErrorKind::Internal,
        }
    }
}

/// A specialized `Result` type for this crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let shape = Error::ShapeMismatch {
            width: 300,
            height: 500,
        };
        assert!(shape.to_string().contains("300x500"));

        let fetch = Error::Acquisition {
            url: "https://example.com/cat.png".to_string(),
            reason: "upstream returned 404 Not Found: nope".to_string(),
        };
        let msg = fetch.to_string();
        assert!(msg.contains("https://example.com/cat.png"));
        assert!(msg.contains("nope"));

        assert!(Error::InvalidIndex("15".to_string()).to_string().contains("15"));
        assert!(Error::MissingInput.to_string().contains("must provide"));
    }

    #[test]
    fn kinds_follow_taxonomy() {
        assert_eq!(Error::MissingInput.kind(), ErrorKind::Input);
        assert_eq!(Error::InvalidIndex("x".into()).kind(), ErrorKind::Input);
        assert_eq!(
            Error::ShapeMismatch {
                width: 1,
                height: 2
            }
            .kind(),
            ErrorKind::Shape
        );
        assert_eq!(
            Error::Acquisition {
                url: String::new(),
                reason: String::new()
            }
            .kind(),
            ErrorKind::Acquisition
        );
        assert_eq!(Error::OverlayMissing(3).kind(), ErrorKind::Internal);
        assert_eq!(Error::Worker("gone".into()).kind(), ErrorKind::Internal);
    }
}
