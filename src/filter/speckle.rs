//! Connected-component speckle removal.

use crate::image::ImageViewMut;

/// 4-connectivity offsets in visiting order: right, left, down, up.
const NEIGH_4: [(isize, isize); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];

/// Reusable label, worklist and region-area buffers.
#[derive(Debug, Default)]
pub struct SpeckleScratch {
    labels: Vec<u32>,
    stack: Vec<(isize, isize)>,
    /// Pixel count per label; index 0 is the "unlabeled" slot.
    areas: Vec<usize>,
}

impl SpeckleScratch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocated size of all buffers in bytes.
    pub fn bytes(&self) -> usize {
        self.labels.capacity() * std::mem::size_of::<u32>()
            + self.stack.capacity() * std::mem::size_of::<(isize, isize)>()
            + self.areas.capacity() * std::mem::size_of::<usize>()
    }
}

#[inline]
fn in_bounds(x: isize, y: isize, w: isize, h: isize) -> bool {
    x >= 0 && y >= 0 && x < w && y < h
}

/// Replaces small disparity regions with `bad_value`.
///
/// Two 4-connected valid pixels belong to the same region when their values
/// differ by strictly less than `max_diff`. Regions with fewer than
/// `max_speckle_size` pixels are overwritten. Returns the number of pixels
/// removed. Running the filter twice removes nothing the second time.
pub fn filter_speckles(
    mut disp: ImageViewMut<'_, i16>,
    bad_value: i16,
    max_speckle_size: usize,
    max_diff: i32,
    scratch: &mut SpeckleScratch,
) -> usize {
    let w = disp.width() as isize;
    let h = disp.height() as isize;
    let SpeckleScratch {
        labels,
        stack,
        areas,
    } = scratch;
    labels.clear();
    labels.resize(disp.width() * disp.height(), 0);
    areas.clear();
    areas.push(0);
    stack.clear();

    let mut removed = 0;
    for y in 0..h {
        for x in 0..w {
            let idx = (y * w + x) as usize;
            let value = disp.row_at(y as usize)[x as usize];
            if value == bad_value {
                continue;
            }

            let mut label = labels[idx];
            if label == 0 {
                label = areas.len() as u32;
                labels[idx] = label;
                stack.push((x, y));

                let mut area = 0usize;
                while let Some((cx, cy)) = stack.pop() {
                    area += 1;
                    let cv = i32::from(disp.row_at(cy as usize)[cx as usize]);
                    for &(dx, dy) in &NEIGH_4 {
                        let nx = cx + dx;
                        let ny = cy + dy;
                        if !in_bounds(nx, ny, w, h) {
                            continue;
                        }
                        let nidx = (ny * w + nx) as usize;
                        if labels[nidx] != 0 {
                            continue;
                        }
                        let nv = disp.row_at(ny as usize)[nx as usize];
                        if nv == bad_value || (i32::from(nv) - cv).abs() >= max_diff {
                            continue;
                        }
                        labels[nidx] = label;
                        stack.push((nx, ny));
                    }
                }
                areas.push(area);
            }

            if areas[label as usize] < max_speckle_size {
                disp.row_at_mut(y as usize)[x as usize] = bad_value;
                removed += 1;
            }
        }
    }
    removed
}
