//! Row-band scheduling of correlation passes.

use std::ops::Range;

use crate::image::ImageViewMut;
use crate::kernel::scalar::ScalarKernel;
use crate::kernel::{correlate_bands, BandScratch, KernelKind, PassInput, SadKernel};
use crate::util::StereoResult;

#[cfg(feature = "rayon")]
use crate::kernel::rayon::correlate_bands_par;
#[cfg(feature = "simd")]
use crate::kernel::simd::SimdKernel;

/// Partition of the image rows into independent correlation bands.
///
/// Each band holds at least `window` rows, so every band sees a full
/// vertical window.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BandPlan {
    bands: Vec<Range<usize>>,
}

impl BandPlan {
    /// Splits `height` rows into `max(min(height / window, workers), 1)`
    /// bands, with `workers == 0` meaning the thread pool size.
    pub fn new(height: usize, window: usize, workers: usize) -> Self {
        let workers = resolve_workers(workers);
        let n = (height / window.max(1)).min(workers).max(1);
        let bands = (0..n).map(|i| i * height / n..(i + 1) * height / n).collect();
        Self { bands }
    }

    pub fn bands(&self) -> &[Range<usize>] {
        &self.bands
    }

    pub fn len(&self) -> usize {
        self.bands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bands.is_empty()
    }
}

/// Effective worker count for a `workers` request.
pub fn resolve_workers(workers: usize) -> usize {
    if workers > 0 {
        return workers;
    }
    #[cfg(feature = "rayon")]
    {
        rayon::current_num_threads()
    }
    #[cfg(not(feature = "rayon"))]
    {
        1
    }
}

/// Runs one correlation pass with the resolved kernel over every band.
pub(crate) fn correlate_pass(
    kind: KernelKind,
    pass: &PassInput<'_>,
    plan: &BandPlan,
    scratches: &mut [BandScratch],
    out: ImageViewMut<'_, i16>,
) -> StereoResult<()> {
    match kind {
        KernelKind::Scalar => run_bands::<ScalarKernel>(pass, plan, scratches, out),
        #[cfg(feature = "simd")]
        KernelKind::Simd => run_bands::<SimdKernel>(pass, plan, scratches, out),
    }
}

fn run_bands<K: SadKernel>(
    pass: &PassInput<'_>,
    plan: &BandPlan,
    scratches: &mut [BandScratch],
    out: ImageViewMut<'_, i16>,
) -> StereoResult<()> {
    #[cfg(feature = "rayon")]
    if plan.len() > 1 {
        return correlate_bands_par::<K>(pass, plan.bands(), scratches, out);
    }
    correlate_bands::<K>(pass, plan.bands(), scratches, out)
}

/// Runs two independent tasks, in parallel when `rayon` is enabled.
#[cfg(feature = "rayon")]
pub(crate) fn join<A, B>(a: A, b: B)
where
    A: FnOnce() + Send,
    B: FnOnce() + Send,
{
    rayon::join(a, b);
}

#[cfg(not(feature = "rayon"))]
pub(crate) fn join<A, B>(a: A, b: B)
where
    A: FnOnce(),
    B: FnOnce(),
{
    a();
    b();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bands_cover_rows_without_gaps() {
        let plan = BandPlan::new(100, 15, 4);
        assert_eq!(plan.len(), 4);
        assert_eq!(plan.bands()[0], 0..25);
        assert_eq!(plan.bands()[3], 75..100);
        for pair in plan.bands().windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
    }

    #[test]
    fn band_count_is_limited_by_window() {
        let plan = BandPlan::new(40, 15, 8);
        assert_eq!(plan.len(), 2);
        assert!(plan.bands().iter().all(|b| b.len() >= 15));

        let plan = BandPlan::new(10, 15, 8);
        assert_eq!(plan.bands(), &[0..10]);
    }

    #[test]
    fn explicit_workers_are_respected() {
        assert_eq!(resolve_workers(3), 3);
        assert!(resolve_workers(0) >= 1);
    }
}
