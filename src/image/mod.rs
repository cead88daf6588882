//! Image views and owned buffers.
//!
//! `ImageView` is a borrowed 2D view into a 1D buffer with an explicit stride.
//! The stride counts elements between the starts of consecutive rows, so a
//! stride larger than the width represents padded rows. The same layout is used
//! for 8-bit inputs, 16-bit fixed-point disparity and 32-bit float disparity.

use std::ops::Range;

use crate::util::{StereoError, StereoResult};

#[cfg(feature = "image-io")]
pub mod io;

/// Borrowed 2D image view with an explicit stride.
#[derive(Copy, Clone, Debug)]
pub struct ImageView<'a, T> {
    data: &'a [T],
    width: usize,
    height: usize,
    stride: usize,
}

impl<'a, T> ImageView<'a, T> {
    /// Creates a contiguous view with `stride == width`.
    pub fn from_slice(data: &'a [T], width: usize, height: usize) -> StereoResult<Self> {
        Self::new(data, width, height, width)
    }

    /// Creates a view with an explicit stride.
    pub fn new(data: &'a [T], width: usize, height: usize, stride: usize) -> StereoResult<Self> {
        let needed = required_len(width, height, stride)?;
        if data.len() < needed {
            return Err(StereoError::BufferTooSmall {
                needed,
                got: data.len(),
            });
        }
        Ok(Self {
            data,
            width,
            height,
            stride,
        })
    }

    /// Returns the image width in pixels.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Returns the image height in pixels.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Returns the stride in elements between row starts.
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Returns the backing slice including any row padding.
    pub fn as_slice(&self) -> &'a [T] {
        self.data
    }

    /// Returns the element at `(x, y)` if it is within bounds.
    pub fn get(&self, x: usize, y: usize) -> Option<&'a T> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.data.get(y * self.stride + x)
    }

    /// Returns a contiguous slice for row `y` with length `width`.
    pub fn row(&self, y: usize) -> Option<&'a [T]> {
        if y >= self.height {
            return None;
        }
        let start = y.checked_mul(self.stride)?;
        let end = start.checked_add(self.width)?;
        self.data.get(start..end)
    }

    /// Row `y` for loops over validated ranges; panics when `y` is out of bounds.
    #[inline]
    pub(crate) fn row_at(&self, y: usize) -> &'a [T] {
        let start = y * self.stride;
        &self.data[start..start + self.width]
    }

    /// Checks that `other` has the same width and height.
    pub(crate) fn ensure_same_size<U>(
        &self,
        other: &ImageView<'_, U>,
        context: &'static str,
    ) -> StereoResult<()> {
        ensure_size(context, self.width, self.height, other.width, other.height)
    }
}

/// Mutable borrowed 2D image view with an explicit stride.
#[derive(Debug)]
pub struct ImageViewMut<'a, T> {
    data: &'a mut [T],
    width: usize,
    height: usize,
    stride: usize,
}

impl<'a, T> ImageViewMut<'a, T> {
    /// Creates a contiguous mutable view with `stride == width`.
    pub fn from_slice(data: &'a mut [T], width: usize, height: usize) -> StereoResult<Self> {
        Self::new(data, width, height, width)
    }

    /// Creates a mutable view with an explicit stride.
    pub fn new(
        data: &'a mut [T],
        width: usize,
        height: usize,
        stride: usize,
    ) -> StereoResult<Self> {
        let needed = required_len(width, height, stride)?;
        if data.len() < needed {
            return Err(StereoError::BufferTooSmall {
                needed,
                got: data.len(),
            });
        }
        Ok(Self {
            data,
            width,
            height,
            stride,
        })
    }

    /// Returns the image width in pixels.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Returns the image height in pixels.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Returns the stride in elements between row starts.
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Returns a read-only view of the same pixels.
    pub fn as_view(&self) -> ImageView<'_, T> {
        ImageView {
            data: &*self.data,
            width: self.width,
            height: self.height,
            stride: self.stride,
        }
    }

    /// Reborrows the view for a shorter lifetime.
    pub fn reborrow(&mut self) -> ImageViewMut<'_, T> {
        ImageViewMut {
            data: &mut *self.data,
            width: self.width,
            height: self.height,
            stride: self.stride,
        }
    }

    /// Returns a mutable slice for row `y` with length `width`.
    pub fn row_mut(&mut self, y: usize) -> Option<&mut [T]> {
        if y >= self.height {
            return None;
        }
        let start = y.checked_mul(self.stride)?;
        let end = start.checked_add(self.width)?;
        self.data.get_mut(start..end)
    }

    #[inline]
    pub(crate) fn row_at(&self, y: usize) -> &[T] {
        let start = y * self.stride;
        &self.data[start..start + self.width]
    }

    #[inline]
    pub(crate) fn row_at_mut(&mut self, y: usize) -> &mut [T] {
        let start = y * self.stride;
        &mut self.data[start..start + self.width]
    }

    /// Narrows the view to its first `width` columns, keeping the stride.
    pub(crate) fn with_width(self, width: usize) -> Self {
        debug_assert!(width <= self.width);
        Self { width, ..self }
    }

    /// Splits the view into disjoint row bands.
    ///
    /// `bands` must be contiguous, in order, and cover `0..height`.
    pub(crate) fn into_bands(self, bands: &[Range<usize>]) -> Vec<ImageViewMut<'a, T>> {
        let width = self.width;
        let stride = self.stride;
        let height = self.height;
        let mut rest = self.data;
        let mut out = Vec::with_capacity(bands.len());
        for band in bands {
            let rows = band.end - band.start;
            let take = if band.end >= height {
                rest.len()
            } else {
                rows * stride
            };
            let (head, tail) = std::mem::take(&mut rest).split_at_mut(take);
            rest = tail;
            out.push(ImageViewMut {
                data: head,
                width,
                height: rows,
                stride,
            });
        }
        out
    }
}

impl<T: Copy> ImageViewMut<'_, T> {
    /// Sets every pixel to `value`, leaving stride padding untouched.
    pub fn fill(&mut self, value: T) {
        for y in 0..self.height {
            self.row_at_mut(y).fill(value);
        }
    }

    /// Copies column `valid_width - 1` into every column to its right.
    ///
    /// Gives readers that run past the right border of the valid region
    /// replicated samples.
    pub(crate) fn replicate_right_border(&mut self, valid_width: usize) {
        for y in 0..self.height {
            let row = self.row_at_mut(y);
            let edge = row[valid_width - 1];
            row[valid_width..].fill(edge);
        }
    }
}

/// Owned image buffer with an explicit stride.
#[derive(Clone, Debug)]
pub struct OwnedImage<T> {
    data: Vec<T>,
    width: usize,
    height: usize,
    stride: usize,
}

impl<T: Copy> OwnedImage<T> {
    /// Wraps a contiguous row-major buffer of exactly `width * height` elements.
    pub fn new(data: Vec<T>, width: usize, height: usize) -> StereoResult<Self> {
        let needed = required_len(width, height, width)?;
        if data.len() < needed {
            return Err(StereoError::BufferTooSmall {
                needed,
                got: data.len(),
            });
        }
        if data.len() > needed {
            return Err(StereoError::InvalidDimensions { width, height });
        }
        Ok(Self {
            data,
            width,
            height,
            stride: width,
        })
    }

    /// Allocates a contiguous image with every pixel set to `value`.
    pub fn filled(width: usize, height: usize, value: T) -> StereoResult<Self> {
        let needed = required_len(width, height, width)?;
        Ok(Self {
            data: vec![value; needed],
            width,
            height,
            stride: width,
        })
    }

    /// Copies a (possibly strided) view into a contiguous owned image.
    pub fn from_view(view: ImageView<'_, T>) -> Self {
        let mut data = Vec::with_capacity(view.width() * view.height());
        for y in 0..view.height() {
            data.extend_from_slice(view.row_at(y));
        }
        Self {
            data,
            width: view.width(),
            height: view.height(),
            stride: view.width(),
        }
    }

    /// An image with no pixels, used as an unsized arena slot.
    pub(crate) fn empty() -> Self {
        Self {
            data: Vec::new(),
            width: 0,
            height: 0,
            stride: 0,
        }
    }

    /// Changes the layout, growing the backing buffer only when it is too small.
    ///
    /// Pixel contents are unspecified afterwards; callers overwrite them.
    pub(crate) fn reshape(&mut self, width: usize, height: usize, stride: usize, fill: T) {
        let needed = stride * height;
        if self.data.len() < needed {
            self.data.resize(needed, fill);
        }
        self.width = width;
        self.height = height;
        self.stride = stride;
    }

    /// Returns the image width in pixels.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Returns the image height in pixels.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Returns the stride in elements between row starts.
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Returns the backing buffer.
    pub fn data(&self) -> &[T] {
        &self.data
    }

    /// Consumes the image and returns the backing buffer.
    pub fn into_vec(self) -> Vec<T> {
        self.data
    }

    /// Returns a borrowed view of the image.
    pub fn view(&self) -> ImageView<'_, T> {
        ImageView {
            data: &self.data,
            width: self.width,
            height: self.height,
            stride: self.stride,
        }
    }

    /// Returns a mutable view of the image.
    pub fn view_mut(&mut self) -> ImageViewMut<'_, T> {
        ImageViewMut {
            data: &mut self.data,
            width: self.width,
            height: self.height,
            stride: self.stride,
        }
    }

    /// Allocated size of the backing buffer in bytes.
    pub(crate) fn capacity_bytes(&self) -> usize {
        self.data.capacity() * std::mem::size_of::<T>()
    }
}

pub(crate) fn ensure_size(
    context: &'static str,
    width: usize,
    height: usize,
    got_width: usize,
    got_height: usize,
) -> StereoResult<()> {
    if width != got_width || height != got_height {
        return Err(StereoError::SizeMismatch {
            context,
            width,
            height,
            got_width,
            got_height,
        });
    }
    Ok(())
}

fn required_len(width: usize, height: usize, stride: usize) -> StereoResult<usize> {
    if width == 0 || height == 0 {
        return Err(StereoError::InvalidDimensions { width, height });
    }
    if stride < width {
        return Err(StereoError::InvalidStride { width, stride });
    }
    let needed = (height - 1)
        .checked_mul(stride)
        .and_then(|v| v.checked_add(width))
        .ok_or(StereoError::InvalidDimensions { width, height })?;
    Ok(needed)
}

#[cfg(test)]
mod tests {
    use super::{ImageViewMut, OwnedImage};

    #[test]
    fn into_bands_splits_rows_disjointly() {
        let mut data: Vec<u16> = (0..30).collect();
        let view = ImageViewMut::new(&mut data, 4, 5, 6).unwrap();
        let mut bands = view.into_bands(&[0..2, 2..3, 3..5]);
        assert_eq!(bands.len(), 3);
        assert_eq!(bands[0].height(), 2);
        assert_eq!(bands[1].row_at(0), &[12, 13, 14, 15]);
        assert_eq!(bands[2].row_at(1), &[24, 25, 26, 27]);

        bands[1].fill(99);
        drop(bands);
        assert_eq!(&data[12..18], &[99, 99, 99, 99, 16, 17]);
        assert_eq!(data[11], 11);
    }

    #[test]
    fn reshape_reuses_larger_buffers() {
        let mut img = OwnedImage::filled(8, 8, 0u8).unwrap();
        let before = img.capacity_bytes();
        img.reshape(4, 4, 6, 0);
        assert_eq!(img.capacity_bytes(), before);
        assert_eq!(img.view().stride(), 6);
        img.reshape(10, 10, 10, 0);
        assert!(img.capacity_bytes() >= 100);
    }

    #[test]
    fn replicate_right_border_fills_padding() {
        let mut img = OwnedImage::filled(5, 2, 0u8).unwrap();
        {
            let mut view = img.view_mut();
            view.row_at_mut(0).copy_from_slice(&[1, 2, 3, 0, 0]);
            view.row_at_mut(1).copy_from_slice(&[4, 5, 6, 0, 0]);
            view.replicate_right_border(3);
        }
        assert_eq!(img.data(), &[1, 2, 3, 3, 3, 4, 5, 6, 6, 6]);
    }
}
