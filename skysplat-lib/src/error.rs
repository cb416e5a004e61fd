use std::{fmt, io};

#[derive(Debug)]
pub enum SkysplatError {
    MalformedHeader(String),
    TruncatedRecord { index: usize, available: usize },
    VertexCountMismatch { declared: usize, actual: usize },
    UnsupportedPixelFormat(u8),
    OutOfBoundsProjection { x: i64, y: i64, width: u32, height: u32 },
    InvalidWriterState {
        state: &'static str,
        operation: &'static str,
    },
    InvalidParameter(String),
    Image(image::ImageError),
    IoError(io::Error),
}

impl fmt::Display for SkysplatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkysplatError::MalformedHeader(e) => {
                write!(f, "Malformed PLY header: {}", e)
            }
            SkysplatError::TruncatedRecord { index, available } => {
                write!(
                    f,
                    "Record {} is truncated: {} bytes available, 240 required.",
                    index, available
                )
            }
            SkysplatError::VertexCountMismatch { declared, actual } => {
                write!(
                    f,
                    "Vertex count mismatch: header declares {}, found {}.",
                    declared, actual
                )
            }
            SkysplatError::UnsupportedPixelFormat(channels) => {
                write!(
                    f,
                    "Unsupported pixel format with {} channel(s); expected 1, 3 or 4.",
                    channels
                )
            }
            SkysplatError::OutOfBoundsProjection {
                x,
                y,
                width,
                height,
            } => {
                write!(
                    f,
                    "Projected pixel ({}, {}) is outside the {}x{} image.",
                    x, y, width, height
                )
            }
            SkysplatError::InvalidWriterState { state, operation } => {
                write!(f, "Cannot {} while the writer is {}.", operation, state)
            }
            SkysplatError::InvalidParameter(e) => {
                write!(f, "Invalid parameter: {}", e)
            }
            SkysplatError::Image(e) => {
                write!(f, "Failed to load the source image: {}", e)
            }
            SkysplatError::IoError(e) => {
                write!(f, "An I/O error occurred: {}", e)
            }
        }
    }
}

impl std::error::Error for SkysplatError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SkysplatError::Image(e) => Some(e),
            SkysplatError::IoError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for SkysplatError {
    fn from(e: io::Error) -> Self {
        SkysplatError::IoError(e)
    }
}

impl From<image::ImageError> for SkysplatError {
    fn from(e: image::ImageError) -> Self {
        SkysplatError::Image(e)
    }
}
