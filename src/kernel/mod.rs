//! SAD correlation kernels.
//!
//! A kernel processes one row band: it builds per-row horizontal window sums
//! of absolute differences for every disparity, slides them vertically, and
//! decides a fixed-point disparity per pixel. The scalar and vector kernels
//! share geometry, texture bookkeeping and the decision gates defined here,
//! and must produce bit-identical output.

use std::ops::Range;

use crate::disparity::{filtered_value, DISPARITY_SHIFT};
use crate::image::{ensure_size, ImageView, ImageViewMut};
use crate::util::{StereoError, StereoResult};

pub mod scalar;
mod scratch;

#[cfg(feature = "simd")]
pub mod simd;

#[cfg(feature = "rayon")]
pub mod rayon;

pub use scratch::BandScratch;

/// Parameters of one correlation pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PassParams {
    /// Odd SAD window size.
    pub window: usize,
    /// Number of searched disparities (multiple of 16).
    pub num_disparities: usize,
    /// Smallest searched disparity.
    pub min_disparity: i32,
    /// Pre-filter clip level; the texture zero level.
    pub prefilter_cap: u8,
    /// Minimum window texture energy.
    pub texture_threshold: i32,
    /// Uniqueness margin in percent; 0 disables the gate.
    pub uniqueness_ratio: i32,
}

impl PassParams {
    /// First output column with a full disparity search.
    pub fn lofs(&self) -> usize {
        (self.num_disparities as i32 - 1 + self.min_disparity).max(0) as usize
    }

    /// Right-image column offset applied when `min_disparity` is very negative.
    pub fn rofs(&self) -> usize {
        (1 - self.num_disparities as i32 - self.min_disparity).max(0) as usize
    }

    /// Number of output columns with a full search; may be zero or negative.
    ///
    /// Bounded both by the right view (`width - rofs - D + 1`) and by the
    /// output row (`width - lofs`), which is the tighter one when
    /// `min_disparity > 0`.
    pub fn valid_width(&self, width: usize) -> isize {
        let by_right = width as isize - self.rofs() as isize - self.num_disparities as isize + 1;
        let by_left = width as isize - self.lofs() as isize;
        by_right.min(by_left)
    }

    /// Columns `[lofs, lofs + valid_width)` that receive a computed disparity.
    pub fn valid_columns(&self, width: usize) -> Range<usize> {
        let lofs = self.lofs();
        let w1 = self.valid_width(width).max(0) as usize;
        lofs.min(width)..(lofs + w1).min(width)
    }

    /// Fixed-point "no match" sentinel.
    pub fn filtered(&self) -> i16 {
        filtered_value(self.min_disparity)
    }

    /// Integer disparity searched at cost index `d`.
    #[inline]
    pub fn index_disparity(&self, d: usize) -> i32 {
        self.num_disparities as i32 - 1 + self.min_disparity - d as i32
    }
}

/// Per-pixel search bracket for the refinement pass.
///
/// Stored in fixed point. A pixel with `min > max` is unconstrained.
#[derive(Clone, Copy, Debug)]
pub struct Bracket<'a> {
    pub min: ImageView<'a, i16>,
    pub max: ImageView<'a, i16>,
}

impl Bracket<'_> {
    /// Whether integer disparity `disparity` is admitted at `(x, y)`.
    #[inline]
    pub fn admits(&self, x: usize, y: usize, disparity: i32) -> bool {
        let lo = i32::from(self.min.row_at(y)[x]);
        let hi = i32::from(self.max.row_at(y)[x]);
        if lo > hi {
            return true;
        }
        let round = (1 << DISPARITY_SHIFT) - 1;
        disparity >= lo >> DISPARITY_SHIFT && disparity <= (hi + round) >> DISPARITY_SHIFT
    }
}

/// Inputs shared by every band of a pass.
#[derive(Clone, Copy, Debug)]
pub struct PassInput<'a> {
    /// Pre-filtered left image.
    pub left: ImageView<'a, u8>,
    /// Pre-filtered right image, at least `num_disparities` columns wider
    /// than `left`, padded by replicating its last valid column.
    pub right: ImageView<'a, u8>,
    pub bracket: Option<Bracket<'a>>,
    pub params: PassParams,
}

impl<'a> PassInput<'a> {
    pub fn band(&self, rows: Range<usize>) -> BandInput<'a> {
        BandInput {
            pass: *self,
            row0: rows.start,
            row1: rows.end,
        }
    }

    /// Checks window, disparity count, right-view padding and bracket sizes.
    pub fn validate(&self) -> StereoResult<()> {
        let params = &self.params;
        let (width, height) = (self.left.width(), self.left.height());
        if params.window == 0 || params.window % 2 == 0 {
            return Err(StereoError::ParamOutOfRange {
                name: "window",
                reason: "must be odd",
            });
        }
        if params.num_disparities == 0 || params.num_disparities % 16 != 0 {
            return Err(StereoError::ParamOutOfRange {
                name: "num_disparities",
                reason: "must be a positive multiple of 16",
            });
        }
        let padded = width + params.num_disparities;
        if self.right.width() < padded || self.right.height() != height {
            return Err(StereoError::SizeMismatch {
                context: "padded right view",
                width: padded,
                height,
                got_width: self.right.width(),
                got_height: self.right.height(),
            });
        }
        if let Some(bracket) = &self.bracket {
            self.left.ensure_same_size(&bracket.min, "bracket minimum")?;
            self.left.ensure_same_size(&bracket.max, "bracket maximum")?;
        }
        Ok(())
    }
}

/// One row band `[row0, row1)` of a pass.
#[derive(Clone, Copy, Debug)]
pub struct BandInput<'a> {
    pub pass: PassInput<'a>,
    pub row0: usize,
    pub row1: usize,
}

impl BandInput<'_> {
    /// Checks the pass, the row range and that `out` spans exactly the band.
    pub fn validate(&self, out: &ImageViewMut<'_, i16>) -> StereoResult<()> {
        self.pass.validate()?;
        if self.row0 >= self.row1 || self.row1 > self.pass.left.height() {
            return Err(StereoError::ParamOutOfRange {
                name: "band rows",
                reason: "must be a non-empty range inside the image",
            });
        }
        ensure_size(
            "band output",
            self.pass.left.width(),
            self.row1 - self.row0,
            out.width(),
            out.height(),
        )
    }
}

/// A SAD correlation strategy.
///
/// `out` covers exactly rows `[row0, row1)` of the disparity map at full
/// image width. In a bracket pass, pixels that fail a gate keep whatever
/// `out` already holds.
pub trait SadKernel {
    const NAME: &'static str;

    fn correlate_band(
        input: &BandInput<'_>,
        scratch: &mut BandScratch,
        out: &mut ImageViewMut<'_, i16>,
    ) -> StereoResult<()>;
}

/// Checks that `bands` tile `[0, height)` in order and each has a scratch.
pub(crate) fn check_bands(
    bands: &[Range<usize>],
    height: usize,
    scratches: usize,
) -> StereoResult<()> {
    let mut next = 0;
    for rows in bands {
        if rows.start != next || rows.end <= rows.start {
            return Err(StereoError::ParamOutOfRange {
                name: "bands",
                reason: "must tile the output rows in order",
            });
        }
        next = rows.end;
    }
    if next != height {
        return Err(StereoError::ParamOutOfRange {
            name: "bands",
            reason: "must tile the output rows in order",
        });
    }
    if scratches < bands.len() {
        return Err(StereoError::ParamOutOfRange {
            name: "scratches",
            reason: "need one scratch per band",
        });
    }
    Ok(())
}

/// Checks a whole pass before it is split into bands.
pub(crate) fn check_pass(
    pass: &PassInput<'_>,
    bands: &[Range<usize>],
    scratches: usize,
    out: &ImageViewMut<'_, i16>,
) -> StereoResult<()> {
    pass.validate()?;
    ensure_size(
        "pass output",
        pass.left.width(),
        pass.left.height(),
        out.width(),
        out.height(),
    )?;
    check_bands(bands, pass.left.height(), scratches)
}

/// Runs `K` over each band in turn.
pub fn correlate_bands<K: SadKernel>(
    pass: &PassInput<'_>,
    bands: &[Range<usize>],
    scratches: &mut [BandScratch],
    out: ImageViewMut<'_, i16>,
) -> StereoResult<()> {
    check_pass(pass, bands, scratches.len(), &out)?;
    for ((rows, scratch), mut band_out) in bands
        .iter()
        .zip(scratches.iter_mut())
        .zip(out.into_bands(bands))
    {
        K::correlate_band(&pass.band(rows.clone()), scratch, &mut band_out)?;
    }
    Ok(())
}

/// Requested correlation kernel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum KernelChoice {
    /// Vector kernel when compiled in and eligible, otherwise scalar.
    #[default]
    Auto,
    Scalar,
    /// Vector kernel or an error.
    Simd,
}

/// Kernel resolved for one pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum KernelKind {
    Scalar,
    #[cfg(feature = "simd")]
    Simd,
}

impl KernelKind {
    pub(crate) fn name(self) -> &'static str {
        match self {
            KernelKind::Scalar => scalar::ScalarKernel::NAME,
            #[cfg(feature = "simd")]
            KernelKind::Simd => simd::SimdKernel::NAME,
        }
    }
}

/// Whether 16-bit window sums cannot overflow for this cap and window.
pub fn simd_eligible(prefilter_cap: u8, window: usize) -> bool {
    2 * usize::from(prefilter_cap) * window * window < i16::MAX as usize
}

impl KernelChoice {
    pub(crate) fn resolve(self, prefilter_cap: u8, window: usize) -> StereoResult<KernelKind> {
        let eligible = simd_eligible(prefilter_cap, window);
        match self {
            KernelChoice::Scalar => Ok(KernelKind::Scalar),
            #[cfg(feature = "simd")]
            KernelChoice::Auto if eligible => Ok(KernelKind::Simd),
            KernelChoice::Auto => Ok(KernelKind::Scalar),
            #[cfg(feature = "simd")]
            KernelChoice::Simd if eligible => Ok(KernelKind::Simd),
            #[cfg(feature = "simd")]
            KernelChoice::Simd => Err(StereoError::KernelUnavailable {
                reason: "2 * prefilter_cap * window^2 must stay below i16::MAX",
            }),
            #[cfg(not(feature = "simd"))]
            KernelChoice::Simd => {
                let _ = eligible;
                Err(StereoError::KernelUnavailable {
                    reason: "built without the `simd` feature",
                })
            }
        }
    }
}

/// Band layout derived from the pass parameters and band rows.
///
/// Scratch row `r` holds image row `top + r`. The band sees `dy0` rows above
/// and `dy1` rows below itself; window rows beyond those replicate the
/// outermost scratch rows, which matches image-border replication.
#[derive(Clone, Copy, Debug)]
pub(crate) struct BandGeometry {
    pub wsz: usize,
    pub wsz2: usize,
    pub ndisp: usize,
    pub width: usize,
    pub lofs: usize,
    pub rofs: usize,
    pub width1: usize,
    pub bh: usize,
    pub dy0: usize,
    pub rows_total: usize,
    pub top: usize,
}

impl BandGeometry {
    pub(crate) fn new(input: &BandInput<'_>) -> Self {
        let params = &input.pass.params;
        let height = input.pass.left.height();
        let width = input.pass.left.width();
        let wsz = params.window;
        let wsz2 = wsz / 2;
        let dy0 = input.row0.min(wsz2 + 1);
        let dy1 = (height - input.row1).min(wsz2 + 1);
        let bh = input.row1 - input.row0;
        Self {
            wsz,
            wsz2,
            ndisp: params.num_disparities,
            width,
            lofs: params.lofs(),
            rofs: params.rofs(),
            width1: params.valid_width(width).max(0) as usize,
            bh,
            dy0,
            rows_total: bh + dy0 + dy1,
            top: input.row0 - dy0,
        }
    }

    /// Bytes per `cbuf` ring plane.
    #[inline]
    pub(crate) fn plane(&self) -> usize {
        self.rows_total * self.ndisp
    }

    /// Left-image column for window column `x` relative to `lofs`.
    #[inline]
    pub(crate) fn left_col(&self, x: isize) -> usize {
        (self.lofs as isize + x).clamp(0, self.width as isize - 1) as usize
    }

    /// First right-image column for window column `x`; disparity index `d`
    /// reads `right_col(x) + d`.
    #[inline]
    pub(crate) fn right_col(&self, x: isize) -> usize {
        (self.rofs as isize + x).clamp(0, self.width as isize - 1) as usize
    }

    /// Scratch row entering the vertical window at band row `y`.
    #[inline]
    pub(crate) fn add_row(&self, y: usize) -> usize {
        (y + self.wsz2 + self.dy0).min(self.rows_total - 1)
    }

    /// Scratch row leaving the vertical window at band row `y`.
    #[inline]
    pub(crate) fn sub_row(&self, y: usize) -> usize {
        (y + self.dy0).saturating_sub(self.wsz2 + 1)
    }

    /// Weight of scratch row 0 in the initial vertical sum.
    #[inline]
    pub(crate) fn top_weight(&self) -> usize {
        self.wsz2 + 2 - self.dy0
    }

    /// Length of the per-row texture buffer.
    #[inline]
    pub(crate) fn htext_len(&self) -> usize {
        self.bh + self.wsz + 1
    }

    /// Ring slot holding window column `x` (`x >= -wsz2 - 1`).
    #[inline]
    pub(crate) fn slot(&self, x: isize) -> usize {
        ((x + self.wsz2 as isize + 1) as usize) % (self.wsz + 1)
    }
}

/// `|v - cap|` per pre-filtered sample.
pub(crate) fn texture_lut(cap: u8) -> [i32; 256] {
    let mut lut = [0i32; 256];
    for (v, slot) in lut.iter_mut().enumerate() {
        *slot = (v as i32 - i32::from(cap)).abs();
    }
    lut
}

/// Slides the per-row horizontal texture sums by one column.
///
/// `htext[i]` holds band row `i - wsz2 - 1`.
pub(crate) fn texture_column(
    geom: &BandGeometry,
    left: ImageView<'_, u8>,
    lut: &[i32; 256],
    htext: &mut [i32],
    add: isize,
    sub: Option<isize>,
) {
    let add_col = geom.left_col(add);
    let sub_col = sub.map(|x| geom.left_col(x));
    let base = geom.wsz2 + 1 - geom.dy0;
    for r in 0..geom.rows_total {
        let row = left.row_at(geom.top + r);
        let mut delta = lut[usize::from(row[add_col])];
        if let Some(c) = sub_col {
            delta -= lut[usize::from(row[c])];
        }
        htext[base + r] += delta;
    }
}

/// Replicates the outermost texture rows into the window margins.
pub(crate) fn texture_fill_borders(geom: &BandGeometry, htext: &mut [i32]) {
    let base = geom.wsz2 + 1 - geom.dy0;
    let first = htext[base];
    htext[..base].fill(first);
    let end = base + geom.rows_total;
    let last = htext[end - 1];
    htext[end..geom.htext_len()].fill(last);
}

/// Writes the sentinel into columns outside the valid search range.
pub(crate) fn fill_border_columns(geom: &BandGeometry, out: &mut ImageViewMut<'_, i16>, filtered: i16) {
    let valid_end = (geom.lofs + geom.width1).min(geom.width);
    let lofs = geom.lofs.min(geom.width);
    for y in 0..out.height() {
        let row = out.row_at_mut(y);
        row[..lofs].fill(filtered);
        row[valid_end..].fill(filtered);
    }
}

/// Largest cost that still counts as ambiguous with the minimum.
#[inline]
pub(crate) fn uniqueness_threshold(minsad: i32, ratio: i32) -> i64 {
    let minsad = i64::from(minsad);
    minsad + minsad * i64::from(ratio) / 100
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(num_disparities: usize, min_disparity: i32) -> PassParams {
        PassParams {
            window: 5,
            num_disparities,
            min_disparity,
            prefilter_cap: 31,
            texture_threshold: 0,
            uniqueness_ratio: 0,
        }
    }

    #[test]
    fn offsets_follow_disparity_range() {
        let p = params(16, 0);
        assert_eq!((p.lofs(), p.rofs()), (15, 0));
        assert_eq!(p.valid_width(40), 25);
        assert_eq!(p.valid_columns(40), 15..40);
        assert_eq!(p.index_disparity(0), 15);
        assert_eq!(p.index_disparity(15), 0);

        let p = params(16, -20);
        assert_eq!((p.lofs(), p.rofs()), (0, 5));
        assert_eq!(p.valid_width(40), 20);
        assert_eq!(p.index_disparity(0), -5);

        // Positive minimum: the output row, not the right view, bounds the search.
        let p = params(16, 4);
        assert_eq!((p.lofs(), p.rofs()), (19, 0));
        assert_eq!(p.valid_width(40), 21);
        assert_eq!(p.valid_columns(40), 19..40);
        assert_eq!(p.index_disparity(0), 19);
        assert_eq!(p.index_disparity(15), 4);
        assert_eq!(params(16, 30).valid_width(40), -5);
    }

    #[test]
    fn bracket_admits_rounded_range() {
        let min = [16i16 * 3, i16::MAX];
        let max = [16i16 * 5 + 3, i16::MIN];
        let bracket = Bracket {
            min: ImageView::from_slice(&min, 2, 1).unwrap(),
            max: ImageView::from_slice(&max, 2, 1).unwrap(),
        };
        assert!(!bracket.admits(0, 0, 2));
        assert!(bracket.admits(0, 0, 3));
        assert!(bracket.admits(0, 0, 6));
        assert!(!bracket.admits(0, 0, 7));
        assert!(bracket.admits(1, 0, -100));
    }

    #[test]
    fn simd_eligibility_tracks_sum_range() {
        assert!(simd_eligible(31, 21));
        assert!(!simd_eligible(31, 23));
        assert!(simd_eligible(63, 15));
        assert!(!simd_eligible(63, 17));
    }

    #[test]
    fn explicit_scalar_always_resolves() {
        assert_eq!(
            KernelChoice::Scalar.resolve(63, 255).unwrap(),
            KernelKind::Scalar
        );
        #[cfg(not(feature = "simd"))]
        assert!(matches!(
            KernelChoice::Simd.resolve(31, 9),
            Err(StereoError::KernelUnavailable { .. })
        ));
        #[cfg(feature = "simd")]
        assert!(matches!(
            KernelChoice::Simd.resolve(31, 23),
            Err(StereoError::KernelUnavailable { .. })
        ));
    }

    #[test]
    fn uniqueness_threshold_uses_integer_percent() {
        assert_eq!(uniqueness_threshold(200, 15), 230);
        assert_eq!(uniqueness_threshold(7, 15), 8);
        assert_eq!(uniqueness_threshold(i32::MAX, 100), 2 * i64::from(i32::MAX));
    }
}
