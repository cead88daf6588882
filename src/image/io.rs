//! Convenience helpers for loading inputs and saving disparity maps via the
//! `image` crate.
//!
//! Available when the `image-io` feature is enabled.

use crate::disparity::disparity_to_u8;
use crate::image::{ImageView, OwnedImage};
use crate::util::{StereoError, StereoResult};
use std::path::Path;

/// Creates a borrowed view from a grayscale image buffer.
pub fn view_from_gray_image(img: &image::GrayImage) -> StereoResult<ImageView<'_, u8>> {
    let width = img.width() as usize;
    let height = img.height() as usize;
    ImageView::from_slice(img.as_raw(), width, height)
}

/// Loads an image from disk and converts it to an owned grayscale image.
pub fn load_gray_image<P: AsRef<Path>>(path: P) -> StereoResult<OwnedImage<u8>> {
    let img = image::open(path).map_err(|err| StereoError::ImageIo {
        reason: err.to_string(),
    })?;
    let gray = img.to_luma8();
    let width = gray.width() as usize;
    let height = gray.height() as usize;
    OwnedImage::new(gray.into_raw(), width, height)
}

/// Writes a fixed-point disparity map as an 8-bit grayscale image.
///
/// Valid disparities in `[min_disparity, min_disparity + num_disparities)`
/// are stretched over `1..=255`; filtered pixels are written as 0.
pub fn save_disparity_image<P: AsRef<Path>>(
    disp: ImageView<'_, i16>,
    min_disparity: i32,
    num_disparities: usize,
    path: P,
) -> StereoResult<()> {
    let vis = disparity_to_u8(disp, min_disparity, num_disparities);
    let gray = image::GrayImage::from_raw(vis.width() as u32, vis.height() as u32, vis.into_vec())
        .ok_or(StereoError::BufferTooSmall {
            needed: disp.width() * disp.height(),
            got: 0,
        })?;
    gray.save(path).map_err(|err| StereoError::ImageIo {
        reason: err.to_string(),
    })
}
