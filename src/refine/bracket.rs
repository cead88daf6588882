//! Disparity brackets for the smaller-window refinement pass.
//!
//! Every valid first-pass pixel seeds a bracket with its own value. The
//! brackets are widened by taking the neighborhood minimum of the lower bound
//! and the neighborhood maximum of the upper bound, so the second pass may
//! only pick disparities already seen nearby.

use crate::disparity::DISPARITY_SCALE;
use crate::image::{ImageView, OwnedImage};

/// Window of the refinement pass for a first-pass window `window`.
///
/// The pass runs only when the result is strictly smaller than `window`.
pub fn small_window(window: usize) -> usize {
    ((window / 2) | 1).max(9)
}

/// Builds `dbmin`/`dbmax` from a fixed-point first-pass map.
///
/// Pixels with an invalid first-pass value, or no valid neighbor, end up
/// unconstrained (`dbmin > dbmax`).
pub(crate) fn build_brackets(
    disp: ImageView<'_, i16>,
    min_disparity: i32,
    size: usize,
    dbmin: &mut OwnedImage<i16>,
    dbmax: &mut OwnedImage<i16>,
    tmp: &mut Vec<i16>,
) {
    let width = disp.width();
    let height = disp.height();
    let valid_from = min_disparity * DISPARITY_SCALE;
    dbmin.reshape(width, height, width, 0);
    dbmax.reshape(width, height, width, 0);

    {
        let mut lo = dbmin.view_mut();
        let mut hi = dbmax.view_mut();
        for y in 0..height {
            let src = disp.row_at(y);
            for ((l, h), &v) in lo.row_at_mut(y).iter_mut().zip(hi.row_at_mut(y)).zip(src) {
                if i32::from(v) < valid_from {
                    *l = i16::MAX;
                    *h = i16::MIN;
                } else {
                    *l = v;
                    *h = v;
                }
            }
        }
    }

    neighborhood_extreme(dbmin, size, tmp, std::cmp::min);
    neighborhood_extreme(dbmax, size, tmp, std::cmp::max);

    let mut lo = dbmin.view_mut();
    let mut hi = dbmax.view_mut();
    for y in 0..height {
        let src = disp.row_at(y);
        for ((l, h), &v) in lo.row_at_mut(y).iter_mut().zip(hi.row_at_mut(y)).zip(src) {
            if i32::from(v) < valid_from {
                *l = i16::MAX;
                *h = i16::MIN;
            }
        }
    }
}

/// Separable `size x size` min or max filter with border replication.
fn neighborhood_extreme(
    img: &mut OwnedImage<i16>,
    size: usize,
    tmp: &mut Vec<i16>,
    pick: fn(i16, i16) -> i16,
) {
    let width = img.width();
    let height = img.height();
    let r = size / 2;
    tmp.clear();
    tmp.resize(width * height, 0);

    let src = img.view();
    for y in 0..height {
        let row = src.row_at(y);
        let out = &mut tmp[y * width..(y + 1) * width];
        for (x, o) in out.iter_mut().enumerate() {
            let lo = x.saturating_sub(r);
            let hi = (x + r).min(width - 1);
            *o = row[lo + 1..=hi].iter().fold(row[lo], |acc, &v| pick(acc, v));
        }
    }

    let mut dst = img.view_mut();
    for y in 0..height {
        let lo = y.saturating_sub(r);
        let hi = (y + r).min(height - 1);
        let out = dst.row_at_mut(y);
        for (x, o) in out.iter_mut().enumerate() {
            let mut v = tmp[lo * width + x];
            for yy in lo + 1..=hi {
                v = pick(v, tmp[yy * width + x]);
            }
            *o = v;
        }
    }
}
