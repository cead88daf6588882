//! Disparity encodings and conversions.
//!
//! The engine works in signed 16-bit fixed point with four fractional bits
//! (`value = disparity * 16`). Float maps hold true disparity. Both encodings
//! reserve one sentinel, `min_disparity - 1`, for pixels without a reliable
//! match.

use crate::image::{ensure_size, ImageView, ImageViewMut, OwnedImage};
use crate::util::StereoResult;

/// Number of fractional bits in fixed-point disparity.
pub const DISPARITY_SHIFT: u32 = 4;

/// Fixed-point units per pixel of disparity.
pub const DISPARITY_SCALE: i32 = 1 << DISPARITY_SHIFT;

/// Fixed-point sentinel marking "no reliable match".
///
/// Always strictly less than any valid disparity for the same `min_disparity`.
pub fn filtered_value(min_disparity: i32) -> i16 {
    ((min_disparity - 1) * DISPARITY_SCALE) as i16
}

/// Float sentinel marking "no reliable match".
pub fn filtered_value_f32(min_disparity: i32) -> f32 {
    (min_disparity - 1) as f32
}

/// Output encoding requested by the caller.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DisparityFormat {
    /// Signed 16-bit fixed point, disparity * 16.
    #[default]
    Fixed16,
    /// 32-bit float, true disparity.
    Float32,
}

/// Owned disparity map in the encoding the caller asked for.
#[derive(Clone, Debug)]
pub enum DisparityMap {
    Fixed(OwnedImage<i16>),
    Float(OwnedImage<f32>),
}

impl DisparityMap {
    pub fn width(&self) -> usize {
        match self {
            DisparityMap::Fixed(img) => img.width(),
            DisparityMap::Float(img) => img.width(),
        }
    }

    pub fn height(&self) -> usize {
        match self {
            DisparityMap::Fixed(img) => img.height(),
            DisparityMap::Float(img) => img.height(),
        }
    }

    pub fn format(&self) -> DisparityFormat {
        match self {
            DisparityMap::Fixed(_) => DisparityFormat::Fixed16,
            DisparityMap::Float(_) => DisparityFormat::Float32,
        }
    }

    /// Returns the fixed-point map, if that is the encoding.
    pub fn as_fixed(&self) -> Option<&OwnedImage<i16>> {
        match self {
            DisparityMap::Fixed(img) => Some(img),
            DisparityMap::Float(_) => None,
        }
    }

    /// Returns the float map, if that is the encoding.
    pub fn as_float(&self) -> Option<&OwnedImage<f32>> {
        match self {
            DisparityMap::Fixed(_) => None,
            DisparityMap::Float(img) => Some(img),
        }
    }
}

/// Converts fixed-point disparity to float by dividing by 16.
pub fn fixed_to_float(src: ImageView<'_, i16>, mut dst: ImageViewMut<'_, f32>) -> StereoResult<()> {
    ensure_size("float disparity", src.width(), src.height(), dst.width(), dst.height())?;
    let scale = 1.0 / DISPARITY_SCALE as f32;
    for y in 0..src.height() {
        let s = src.row_at(y);
        for (d, &v) in dst.row_at_mut(y).iter_mut().zip(s) {
            *d = f32::from(v) * scale;
        }
    }
    Ok(())
}

/// Quantizes float disparity to fixed point, rounding to the nearest 1/16.
pub fn float_to_fixed(src: ImageView<'_, f32>, mut dst: ImageViewMut<'_, i16>) -> StereoResult<()> {
    ensure_size("fixed disparity", src.width(), src.height(), dst.width(), dst.height())?;
    let scale = DISPARITY_SCALE as f32;
    for y in 0..src.height() {
        let s = src.row_at(y);
        for (d, &v) in dst.row_at_mut(y).iter_mut().zip(s) {
            *d = (v * scale).round() as i16;
        }
    }
    Ok(())
}

/// Maps a fixed-point disparity map to an 8-bit visualization.
///
/// Valid disparities are stretched over `1..=255`, everything below
/// `min_disparity` becomes 0.
pub fn disparity_to_u8(
    disp: ImageView<'_, i16>,
    min_disparity: i32,
    num_disparities: usize,
) -> OwnedImage<u8> {
    let lo = min_disparity * DISPARITY_SCALE;
    let span = (num_disparities as i32 * DISPARITY_SCALE).max(1);
    let mut data = Vec::with_capacity(disp.width() * disp.height());
    for y in 0..disp.height() {
        for &v in disp.row_at(y) {
            let v = i32::from(v);
            if v < lo {
                data.push(0);
            } else {
                let scaled = 1 + (v - lo) * 254 / span;
                data.push(scaled.clamp(1, 255) as u8);
            }
        }
    }
    OwnedImage::from_view(
        ImageView::from_slice(&data, disp.width(), disp.height())
            .unwrap_or_else(|_| unreachable!("buffer sized from the source view")),
    )
}
