//! Grow-only working memory owned by the matcher.

use crate::filter::SpeckleScratch;
use crate::image::{ImageView, OwnedImage};
use crate::kernel::BandScratch;
use crate::prefilter::prefilter_with;
use crate::search::bands::join;
use crate::search::StereoConfig;

/// Buffers reused across calls; reallocated only when a call needs more.
#[derive(Debug)]
pub(crate) struct ScratchArena {
    pub(crate) left: OwnedImage<u8>,
    /// Right image padded by `num_disparities` replicated columns.
    pub(crate) right: OwnedImage<u8>,
    prefilter_left: Vec<i32>,
    prefilter_right: Vec<i32>,
    pub(crate) bands: Vec<BandScratch>,
    /// Fixed-point map behind float output.
    pub(crate) disp: OwnedImage<i16>,
    pub(crate) dbmin: OwnedImage<i16>,
    pub(crate) dbmax: OwnedImage<i16>,
    pub(crate) morph_tmp: Vec<i16>,
    pub(crate) speckle: SpeckleScratch,
}

impl ScratchArena {
    pub(crate) fn new() -> Self {
        Self {
            left: OwnedImage::empty(),
            right: OwnedImage::empty(),
            prefilter_left: Vec::new(),
            prefilter_right: Vec::new(),
            bands: Vec::new(),
            disp: OwnedImage::empty(),
            dbmin: OwnedImage::empty(),
            dbmax: OwnedImage::empty(),
            morph_tmp: Vec::new(),
            speckle: SpeckleScratch::new(),
        }
    }

    /// Pre-filters both images into the arena.
    pub(crate) fn prefilter_pair(
        &mut self,
        left: ImageView<'_, u8>,
        right: ImageView<'_, u8>,
        cfg: &StereoConfig,
    ) {
        let width = left.width();
        let height = left.height();
        let padded = width + cfg.num_disparities;
        self.left.reshape(width, height, width, 0);
        self.right.reshape(padded, height, padded, 0);

        let mut left_dst = self.left.view_mut();
        let mut right_dst = self.right.view_mut().with_width(width);
        let left_buf = &mut self.prefilter_left;
        let right_buf = &mut self.prefilter_right;
        join(
            || {
                prefilter_with(
                    left,
                    &mut left_dst,
                    cfg.prefilter,
                    cfg.prefilter_size,
                    cfg.prefilter_cap,
                    left_buf,
                )
            },
            || {
                prefilter_with(
                    right,
                    &mut right_dst,
                    cfg.prefilter,
                    cfg.prefilter_size,
                    cfg.prefilter_cap,
                    right_buf,
                )
            },
        );
        self.right.view_mut().replicate_right_border(width);
    }

    /// Ensures one band scratch per band.
    pub(crate) fn ensure_bands(&mut self, count: usize) {
        if self.bands.len() < count {
            self.bands.resize_with(count, BandScratch::new);
        }
    }

    /// Allocated size of every buffer in bytes.
    pub(crate) fn bytes(&self) -> usize {
        self.left.capacity_bytes()
            + self.right.capacity_bytes()
            + self.prefilter_left.capacity() * 4
            + self.prefilter_right.capacity() * 4
            + self.bands.iter().map(BandScratch::bytes).sum::<usize>()
            + self.disp.capacity_bytes()
            + self.dbmin.capacity_bytes()
            + self.dbmax.capacity_bytes()
            + self.morph_tmp.capacity() * 2
            + self.speckle.bytes()
    }
}
