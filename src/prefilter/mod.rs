//! Image pre-filters applied to both views before correlation.
//!
//! Both filters emphasize local texture and suppress slow illumination
//! changes, then clip the response to `[-cap, cap]` and shift it to
//! `[0, 2 * cap]` so it fits in `u8`.

use crate::image::{ImageView, ImageViewMut};
use crate::util::{StereoError, StereoResult};

/// Pre-filter applied to both images.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PreFilterKind {
    /// Center-weighted pixel minus the local box mean.
    NormalizedResponse,
    /// Horizontal Sobel derivative.
    #[default]
    XSobel,
}

/// Table offset for the normalized response (covers the widest response).
const NORMALIZED_OFS: i32 = 256 * 5;
/// Table offset for the horizontal Sobel response.
const XSOBEL_OFS: i32 = 256 * 4;

/// Lookup table mapping a signed filter response to `clamp(v, -cap, cap) + cap`.
#[derive(Clone, Debug)]
pub(crate) struct ClipTable {
    table: Vec<u8>,
    ofs: i32,
}

impl ClipTable {
    pub(crate) fn new(cap: u8, ofs: i32) -> Self {
        let cap = i32::from(cap);
        let table = (0..ofs * 2 + 256)
            .map(|i| ((i - ofs).clamp(-cap, cap) + cap) as u8)
            .collect();
        Self { table, ofs }
    }

    #[inline]
    pub(crate) fn get(&self, value: i32) -> u8 {
        let idx = (value + self.ofs).clamp(0, self.table.len() as i32 - 1);
        self.table[idx as usize]
    }
}

/// Checks the pre-filter parameters shared by every entry point.
pub(crate) fn validate_prefilter(size: usize, cap: u8) -> StereoResult<()> {
    if !(5..=255).contains(&size) || size % 2 == 0 {
        return Err(StereoError::ParamOutOfRange {
            name: "prefilter_size",
            reason: "must be odd and within 5..=255",
        });
    }
    if !(1..=63).contains(&cap) {
        return Err(StereoError::ParamOutOfRange {
            name: "prefilter_cap",
            reason: "must be within 1..=63",
        });
    }
    Ok(())
}

/// Runs the selected pre-filter from `src` into `dst`.
///
/// `size` is only used by [`PreFilterKind::NormalizedResponse`].
pub fn prefilter(
    src: ImageView<'_, u8>,
    mut dst: ImageViewMut<'_, u8>,
    kind: PreFilterKind,
    size: usize,
    cap: u8,
) -> StereoResult<()> {
    validate_prefilter(size, cap)?;
    src.ensure_same_size(&dst.as_view(), "prefilter output")?;
    let mut scratch = Vec::new();
    prefilter_with(src, &mut dst, kind, size, cap, &mut scratch);
    Ok(())
}

/// Normalized-response pre-filter over a `size x size` box.
pub fn prefilter_normalized(
    src: ImageView<'_, u8>,
    dst: ImageViewMut<'_, u8>,
    size: usize,
    cap: u8,
) -> StereoResult<()> {
    prefilter(src, dst, PreFilterKind::NormalizedResponse, size, cap)
}

/// Horizontal Sobel pre-filter.
pub fn prefilter_xsobel(
    src: ImageView<'_, u8>,
    dst: ImageViewMut<'_, u8>,
    cap: u8,
) -> StereoResult<()> {
    // The box size is unused by this filter; pass any legal value.
    prefilter(src, dst, PreFilterKind::XSobel, 5, cap)
}

/// Unchecked pre-filter entry used by the engine with arena scratch.
///
/// `dst` must have the same width and height as `src`.
pub(crate) fn prefilter_with(
    src: ImageView<'_, u8>,
    dst: &mut ImageViewMut<'_, u8>,
    kind: PreFilterKind,
    size: usize,
    cap: u8,
    scratch: &mut Vec<i32>,
) {
    match kind {
        PreFilterKind::NormalizedResponse => normalized(src, dst, size, cap, scratch),
        PreFilterKind::XSobel => xsobel(src, dst, cap),
    }
}

/// Center and box weights `(scale_g, scale_s)` in 1/1024 units.
///
/// `scale_s` is floored at 1, otherwise boxes of 91 and up would have a
/// zero weight and map every pixel to the cap.
fn normalized_scales(size: usize) -> (i32, i32) {
    let scale_g0 = (size * size / 8) as i32;
    let scale_s = ((1024 + scale_g0) / (scale_g0 * 2)).max(1);
    (scale_g0 * scale_s, scale_s)
}

fn normalized(
    src: ImageView<'_, u8>,
    dst: &mut ImageViewMut<'_, u8>,
    size: usize,
    cap: u8,
    vsum: &mut Vec<i32>,
) {
    let width = src.width();
    let height = src.height();
    let r = size / 2;
    let pad = r + 1;
    let table = ClipTable::new(cap, NORMALIZED_OFS);

    let (scale_g, scale_s) = normalized_scales(size);

    vsum.clear();
    vsum.resize(width + 2 * pad, 0);

    let clamp_row = |y: isize| y.clamp(0, height as isize - 1) as usize;

    // Column sums for the window centered one row above the image.
    for dy in -(r as isize) - 1..r as isize {
        let row = src.row_at(clamp_row(dy));
        for (acc, &v) in vsum[pad..pad + width].iter_mut().zip(row) {
            *acc += i32::from(v);
        }
    }

    for y in 0..height {
        let bottom = src.row_at(clamp_row(y as isize + r as isize));
        let top = src.row_at(clamp_row(y as isize - r as isize - 1));
        for ((acc, &b), &t) in vsum[pad..pad + width].iter_mut().zip(bottom).zip(top) {
            *acc += i32::from(b) - i32::from(t);
        }
        let first = vsum[pad];
        let last = vsum[pad + width - 1];
        vsum[..pad].fill(first);
        vsum[pad + width..].fill(last);

        let prev = src.row_at(y.saturating_sub(1));
        let curr = src.row_at(y);
        let next = src.row_at((y + 1).min(height - 1));
        let out = dst.row_at_mut(y);

        let mut sum: i32 = vsum[pad - r..=pad + r].iter().sum();
        for x in 0..width {
            if x > 0 {
                sum += vsum[pad + x + r] - vsum[pad + x - r - 1];
            }
            let left = curr[x.saturating_sub(1)];
            let right = curr[(x + 1).min(width - 1)];
            let center = i32::from(curr[x]) * 4
                + i32::from(left)
                + i32::from(right)
                + i32::from(prev[x])
                + i32::from(next[x]);
            out[x] = table.get((center * scale_g - sum * scale_s) >> 10);
        }
    }
}

fn xsobel(src: ImageView<'_, u8>, dst: &mut ImageViewMut<'_, u8>, cap: u8) {
    let width = src.width();
    let height = src.height();
    let table = ClipTable::new(cap, XSOBEL_OFS);

    for y in 0..height {
        let r0 = src.row_at(y.saturating_sub(1));
        let r1 = src.row_at(y);
        let r2 = src.row_at((y + 1).min(height - 1));
        let out = dst.row_at_mut(y);
        for x in 0..width {
            let xl = x.saturating_sub(1);
            let xr = (x + 1).min(width - 1);
            let dx = |row: &[u8]| i32::from(row[xr]) - i32::from(row[xl]);
            out[x] = table.get(dx(r1) * 2 + dx(r0) + dx(r2));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::OwnedImage;

    fn clamp_at(img: &[u8], w: usize, h: usize, x: isize, y: isize) -> i32 {
        let x = x.clamp(0, w as isize - 1) as usize;
        let y = y.clamp(0, h as isize - 1) as usize;
        i32::from(img[y * w + x])
    }

    #[test]
    fn clip_table_saturates_both_ends() {
        let table = ClipTable::new(31, XSOBEL_OFS);
        assert_eq!(table.get(-5000), 0);
        assert_eq!(table.get(-31), 0);
        assert_eq!(table.get(0), 31);
        assert_eq!(table.get(12), 43);
        assert_eq!(table.get(5000), 62);
    }

    fn normalized_against_brute_force(w: usize, h: usize, size: usize, cap: u8) -> Vec<u8> {
        let src: Vec<u8> = (0..w * h)
            .map(|i| ((i * 37 + (i / w) * 11) % 251) as u8)
            .collect();
        let mut out = OwnedImage::filled(w, h, 0u8).unwrap();
        prefilter_normalized(
            ImageView::from_slice(&src, w, h).unwrap(),
            out.view_mut(),
            size,
            cap,
        )
        .unwrap();

        let r = (size / 2) as isize;
        let (scale_g, scale_s) = normalized_scales(size);
        let table = ClipTable::new(cap, NORMALIZED_OFS);
        for y in 0..h as isize {
            for x in 0..w as isize {
                let mut sum = 0;
                for dy in -r..=r {
                    for dx in -r..=r {
                        sum += clamp_at(&src, w, h, x + dx, y + dy);
                    }
                }
                let c = clamp_at(&src, w, h, x, y) * 4
                    + clamp_at(&src, w, h, x - 1, y)
                    + clamp_at(&src, w, h, x + 1, y)
                    + clamp_at(&src, w, h, x, y - 1)
                    + clamp_at(&src, w, h, x, y + 1);
                let expected = table.get((c * scale_g - sum * scale_s) >> 10);
                assert_eq!(
                    out.data()[y as usize * w + x as usize],
                    expected,
                    "mismatch at ({x}, {y})"
                );
            }
        }
        out.data().to_vec()
    }

    #[test]
    fn normalized_matches_brute_force_box() {
        normalized_against_brute_force(23, 17, 7, 31);
    }

    #[test]
    fn large_boxes_keep_a_nonzero_box_weight() {
        assert_eq!(normalized_scales(7), (6 * 85, 85));
        assert_eq!(normalized_scales(89), (990, 1));
        assert_eq!(normalized_scales(101), (1275, 1));
        assert_eq!(normalized_scales(255), (8128, 1));

        let out = normalized_against_brute_force(40, 30, 101, 31);
        assert!(out.iter().any(|&v| v != out[0]));
    }

    #[test]
    fn constant_image_maps_to_cap() {
        let src = vec![128u8; 12 * 9];
        let view = ImageView::from_slice(&src, 12, 9).unwrap();
        let mut sobel = OwnedImage::filled(12, 9, 0u8).unwrap();
        prefilter_xsobel(view, sobel.view_mut(), 20).unwrap();
        assert!(sobel.data().iter().all(|&v| v == 20));

        let mut norm = OwnedImage::filled(12, 9, 0u8).unwrap();
        prefilter_normalized(view, norm.view_mut(), 5, 20).unwrap();
        let first = norm.data()[0];
        assert!(norm.data().iter().all(|&v| v == first));
    }

    #[test]
    fn xsobel_responds_to_horizontal_ramp() {
        let w = 10;
        let src: Vec<u8> = (0..w * 4).map(|i| ((i % w) * 2) as u8).collect();
        let mut out = OwnedImage::filled(w, 4, 0u8).unwrap();
        prefilter_xsobel(
            ImageView::from_slice(&src, w, 4).unwrap(),
            out.view_mut(),
            31,
        )
        .unwrap();
        // Interior: (2 * 2) * 4 = 16 above the zero level.
        assert_eq!(out.data()[w + 5], 31 + 16);
        // Border columns see a one-sided difference.
        assert_eq!(out.data()[w], 31 + 8);
    }

    #[test]
    fn rejects_bad_parameters() {
        let src = vec![0u8; 64];
        let mut dst = vec![0u8; 64];
        let view = ImageView::from_slice(&src, 8, 8).unwrap();
        let err = prefilter_normalized(
            view,
            ImageViewMut::from_slice(&mut dst, 8, 8).unwrap(),
            6,
            31,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            StereoError::ParamOutOfRange { name: "prefilter_size", .. }
        ));
        let err = prefilter_xsobel(view, ImageViewMut::from_slice(&mut dst, 8, 8).unwrap(), 0)
            .unwrap_err();
        assert!(matches!(
            err,
            StereoError::ParamOutOfRange { name: "prefilter_cap", .. }
        ));
        let err = prefilter_xsobel(view, ImageViewMut::from_slice(&mut dst, 4, 4).unwrap(), 31)
            .unwrap_err();
        assert!(matches!(err, StereoError::SizeMismatch { .. }));
    }
}
