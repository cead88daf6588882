//! Row-band parallel correlation (feature-gated).
//!
//! Each band gets its own scratch and a disjoint slice of output rows, so
//! bands run without synchronization. The output is identical to the
//! sequential [`correlate_bands`](crate::kernel::correlate_bands).

use std::ops::Range;

use rayon::prelude::*;

use crate::image::ImageViewMut;
use crate::kernel::{check_pass, BandScratch, PassInput, SadKernel};
use crate::util::StereoResult;

/// Runs `K` over all bands on the rayon pool.
pub fn correlate_bands_par<K: SadKernel>(
    pass: &PassInput<'_>,
    bands: &[Range<usize>],
    scratches: &mut [BandScratch],
    out: ImageViewMut<'_, i16>,
) -> StereoResult<()> {
    check_pass(pass, bands, scratches.len(), &out)?;
    let mut jobs: Vec<_> = bands
        .iter()
        .cloned()
        .zip(scratches.iter_mut())
        .zip(out.into_bands(bands))
        .collect();

    jobs.par_iter_mut()
        .try_for_each(|((rows, scratch), band_out)| {
            K::correlate_band(&pass.band(rows.clone()), scratch, band_out)
        })
}
