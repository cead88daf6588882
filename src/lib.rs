//! stereobm is a CPU stereo block matcher for rectified grayscale pairs.
//!
//! The matcher pre-filters both views, correlates them with sliding-window
//! SAD costs over a fixed disparity range, gates unreliable pixels by texture
//! and uniqueness, interpolates sub-pixel disparity and removes speckles.
//! Output is signed 16-bit fixed point (disparity * 16) or `f32`.
//!
//! Optional features: `rayon` (parallel row bands), `simd` (16-bit vector
//! kernel), `image-io` (PNG/JPEG helpers), `tracing` (spans and events).

pub mod disparity;
pub mod filter;
pub mod image;
pub mod kernel;
pub mod lowlevel;
pub mod prefilter;
mod refine;
pub mod search;
mod trace;
pub mod util;

pub use disparity::{
    filtered_value, fixed_to_float, float_to_fixed, DisparityFormat, DisparityMap, DISPARITY_SHIFT,
};
pub use filter::{filter_speckles, SpeckleScratch};
pub use image::{ImageView, ImageViewMut, OwnedImage};
#[cfg(feature = "image-io")]
pub use image::io;
pub use kernel::KernelChoice;
pub use prefilter::{prefilter, prefilter_normalized, prefilter_xsobel, PreFilterKind};
pub use search::{StereoConfig, StereoMatcher};
pub use util::{StereoError, StereoResult};
