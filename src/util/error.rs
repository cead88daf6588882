//! Error types for stereobm.

use thiserror::Error;

/// Result alias for stereobm operations.
pub type StereoResult<T> = std::result::Result<T, StereoError>;

/// Precondition violations reported before any computation starts.
///
/// Pixels without a reliable match are not errors; they are encoded with the
/// sentinel value in the disparity map.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StereoError {
    /// Width or height is zero or overflows the address space.
    #[error("invalid dimensions {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },
    /// Stride is smaller than the row width.
    #[error("stride {stride} is smaller than width {width}")]
    InvalidStride { width: usize, stride: usize },
    /// Backing slice cannot hold the described image.
    #[error("buffer too small: needed {needed} elements, got {got}")]
    BufferTooSmall { needed: usize, got: usize },
    /// Two buffers that must share a size do not.
    #[error("{context} is {got_width}x{got_height}, expected {width}x{height}")]
    SizeMismatch {
        context: &'static str,
        width: usize,
        height: usize,
        got_width: usize,
        got_height: usize,
    },
    /// A configuration value lies outside its documented range.
    #[error("parameter `{name}` out of range: {reason}")]
    ParamOutOfRange {
        name: &'static str,
        reason: &'static str,
    },
    /// The disparity range leaves no column where the full search fits.
    #[error(
        "no valid search column for width {width} with {num_disparities} disparities \
         starting at {min_disparity}"
    )]
    DegenerateGeometry {
        width: usize,
        num_disparities: usize,
        min_disparity: i32,
    },
    /// The requested correlation kernel cannot run with this build or configuration.
    #[error("kernel unavailable: {reason}")]
    KernelUnavailable { reason: &'static str },
    /// Image decoding or encoding failed.
    #[error("image I/O failed: {reason}")]
    ImageIo { reason: String },
}
