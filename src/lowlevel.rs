//! Building blocks for custom pipelines.
//!
//! These expose the correlation kernels, band scheduling and bracket helpers
//! behind [`StereoMatcher`](crate::StereoMatcher). Most users only need the
//! top-level matcher.

pub use crate::kernel::scalar::ScalarKernel;
#[cfg(feature = "simd")]
pub use crate::kernel::simd::SimdKernel;
pub use crate::kernel::{
    correlate_bands, simd_eligible, BandInput, BandScratch, Bracket, PassInput, PassParams,
    SadKernel,
};
#[cfg(feature = "rayon")]
pub use crate::kernel::rayon::correlate_bands_par;
pub use crate::refine::bracket::small_window;
pub use crate::search::{resolve_workers, BandPlan};
