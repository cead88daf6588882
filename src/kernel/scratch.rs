//! Per-band working buffers.

use crate::kernel::BandGeometry;

/// Working memory for one row band.
///
/// Buffers only grow; a band with the same geometry as the previous call
/// reuses them without allocating.
#[derive(Debug, Default)]
pub struct BandScratch {
    pub(crate) sad: Vec<i32>,
    pub(crate) hsad: Vec<i32>,
    pub(crate) htext: Vec<i32>,
    pub(crate) cbuf: Vec<u8>,
    pub(crate) sad16: Vec<i16>,
    pub(crate) hsad16: Vec<i16>,
}

impl BandScratch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocated size of all buffers in bytes.
    pub fn bytes(&self) -> usize {
        self.sad.capacity() * 4
            + self.hsad.capacity() * 4
            + self.htext.capacity() * 4
            + self.cbuf.capacity()
            + self.sad16.capacity() * 2
            + self.hsad16.capacity() * 2
    }

    /// Sizes and zeroes the buffers shared by both kernels.
    pub(crate) fn prepare_common(&mut self, geom: &BandGeometry) {
        reset(&mut self.htext, geom.htext_len());
        reset(&mut self.cbuf, geom.plane() * (geom.wsz + 1));
    }

    /// Sizes and zeroes the 32-bit sums used by the scalar kernel.
    pub(crate) fn prepare_wide(&mut self, geom: &BandGeometry) {
        self.prepare_common(geom);
        reset(&mut self.sad, geom.ndisp);
        reset(&mut self.hsad, geom.plane());
    }

    /// Sizes and zeroes the 16-bit sums used by the vector kernel.
    #[cfg(feature = "simd")]
    pub(crate) fn prepare_narrow(&mut self, geom: &BandGeometry) {
        self.prepare_common(geom);
        reset(&mut self.sad16, geom.ndisp);
        reset(&mut self.hsad16, geom.plane());
    }
}

fn reset<T: Copy + Default>(buf: &mut Vec<T>, len: usize) {
    buf.clear();
    buf.resize(len, T::default());
}

/// Splits the column ring into the plane being written and the plane
/// leaving the window. The slots must differ.
pub(crate) fn ring_planes(
    cbuf: &mut [u8],
    plane: usize,
    add_slot: usize,
    sub_slot: usize,
) -> (&mut [u8], &[u8]) {
    debug_assert_ne!(add_slot, sub_slot);
    if add_slot > sub_slot {
        let (lo, hi) = cbuf.split_at_mut(add_slot * plane);
        (&mut hi[..plane], &lo[sub_slot * plane..(sub_slot + 1) * plane])
    } else {
        let (lo, hi) = cbuf.split_at_mut(sub_slot * plane);
        (&mut lo[add_slot * plane..(add_slot + 1) * plane], &hi[..plane])
    }
}
