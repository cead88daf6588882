//! Vector SAD kernel using the `wide` crate.
//!
//! Sums are kept in 16-bit lanes, eight disparities at a time. The kernel is
//! only selected when `2 * cap * window^2` fits in `i16`, so no lane can
//! overflow, and every update subtracts before it adds. Results are
//! bit-identical to [`ScalarKernel`](crate::kernel::scalar::ScalarKernel).

use wide::i16x8;

use crate::image::ImageViewMut;
use crate::kernel::scratch::ring_planes;
use crate::kernel::{
    fill_border_columns, simd_eligible, texture_column, texture_fill_borders, texture_lut,
    uniqueness_threshold, BandGeometry, BandInput, BandScratch, SadKernel,
};
use crate::refine::subpixel::{neighbor_indices, subpixel_disparity};
use crate::util::{StereoError, StereoResult};

const LANES: usize = 8;

#[inline]
fn splat(v: i16) -> i16x8 {
    i16x8::from([v; LANES])
}

#[inline]
fn load_u8(s: &[u8]) -> i16x8 {
    i16x8::from([
        i16::from(s[0]),
        i16::from(s[1]),
        i16::from(s[2]),
        i16::from(s[3]),
        i16::from(s[4]),
        i16::from(s[5]),
        i16::from(s[6]),
        i16::from(s[7]),
    ])
}

#[inline]
fn load_i16(s: &[i16]) -> i16x8 {
    i16x8::from([s[0], s[1], s[2], s[3], s[4], s[5], s[6], s[7]])
}

#[inline]
fn store_i16(dst: &mut [i16], v: i16x8) {
    dst[..LANES].copy_from_slice(&v.to_array());
}

#[inline]
fn store_u8(dst: &mut [u8], v: i16x8) {
    for (d, x) in dst[..LANES].iter_mut().zip(v.to_array()) {
        *d = x as u8;
    }
}

/// Reduces per-lane minima to the global `(min, index)`, preferring the
/// smallest index among equal costs.
#[inline]
fn reduce_min(min8: i16x8, idx8: i16x8) -> (i16, usize) {
    let mins = min8.to_array();
    let idxs = idx8.to_array();
    let mut best = (mins[0], idxs[0]);
    for (&m, &i) in mins.iter().zip(idxs.iter()).skip(1) {
        if (m, i) < best {
            best = (m, i);
        }
    }
    (best.0, best.1 as usize)
}

/// Vector kernel over `i16x8` lanes.
pub struct SimdKernel;

impl SadKernel for SimdKernel {
    const NAME: &'static str = "simd";

    fn correlate_band(
        input: &BandInput<'_>,
        scratch: &mut BandScratch,
        out: &mut ImageViewMut<'_, i16>,
    ) -> StereoResult<()> {
        let pass = &input.pass;
        let params = &pass.params;
        input.validate(out)?;
        if !simd_eligible(params.prefilter_cap, params.window) {
            return Err(StereoError::KernelUnavailable {
                reason: "2 * prefilter_cap * window^2 must stay below i16::MAX",
            });
        }
        let geom = BandGeometry::new(input);
        let filtered = params.filtered();
        fill_border_columns(&geom, out, filtered);
        if geom.width1 == 0 {
            return Ok(());
        }

        scratch.prepare_narrow(&geom);
        let BandScratch {
            sad16: sad,
            hsad16: hsad,
            htext,
            cbuf,
            ..
        } = scratch;
        let nd = geom.ndisp;
        let plane = geom.plane();
        let lut = texture_lut(params.prefilter_cap);
        let wsz2 = geom.wsz2 as isize;
        let lane_idx = i16x8::from([0, 1, 2, 3, 4, 5, 6, 7]);
        let lane_step = splat(LANES as i16);

        for x in -wsz2 - 1..wsz2 {
            let slot = geom.slot(x);
            let cb = &mut cbuf[slot * plane..(slot + 1) * plane];
            let lc = geom.left_col(x);
            let rc = geom.right_col(x);
            for r in 0..geom.rows_total {
                let y = geom.top + r;
                let lv = splat(i16::from(pass.left.row_at(y)[lc]));
                let rrow = &pass.right.row_at(y)[rc..rc + nd];
                let base = r * nd;
                for k in (0..nd).step_by(LANES) {
                    let rv = load_u8(&rrow[k..]);
                    let diff = (lv - rv).max(rv - lv);
                    store_u8(&mut cb[base + k..], diff);
                    let h = load_i16(&hsad[base + k..]) + diff;
                    store_i16(&mut hsad[base + k..], h);
                }
            }
            texture_column(&geom, pass.left, &lut, htext, x, None);
        }

        for x in 0..geom.width1 {
            let x0 = x as isize - wsz2 - 1;
            let x1 = x as isize + wsz2;
            let (cb_add, cb_sub) = ring_planes(cbuf, plane, geom.slot(x1), geom.slot(x0));
            let lc = geom.left_col(x1);
            let rc = geom.right_col(x1);
            for r in 0..geom.rows_total {
                let y = geom.top + r;
                let lv = splat(i16::from(pass.left.row_at(y)[lc]));
                let rrow = &pass.right.row_at(y)[rc..rc + nd];
                let base = r * nd;
                for k in (0..nd).step_by(LANES) {
                    let rv = load_u8(&rrow[k..]);
                    let diff = (lv - rv).max(rv - lv);
                    store_u8(&mut cb_add[base + k..], diff);
                    let h = (load_i16(&hsad[base + k..]) - load_u8(&cb_sub[base + k..])) + diff;
                    store_i16(&mut hsad[base + k..], h);
                }
            }
            texture_column(&geom, pass.left, &lut, htext, x1, Some(x0));
            texture_fill_borders(&geom, htext);

            let top_weight = splat(geom.top_weight() as i16);
            for k in (0..nd).step_by(LANES) {
                store_i16(&mut sad[k..], load_i16(&hsad[k..]) * top_weight);
            }
            for r in 1..geom.wsz2 + geom.dy0 {
                let base = r.min(geom.rows_total - 1) * nd;
                for k in (0..nd).step_by(LANES) {
                    let s = load_i16(&sad[k..]) + load_i16(&hsad[base + k..]);
                    store_i16(&mut sad[k..], s);
                }
            }
            let mut tsum: i32 = htext[..geom.wsz].iter().sum();

            let col = geom.lofs + x;
            for y in 0..geom.bh {
                let ra = geom.add_row(y) * nd;
                let rs = geom.sub_row(y) * nd;
                let mut min8 = splat(i16::MAX);
                let mut mind8 = splat(0);
                let mut d8 = lane_idx;
                for k in (0..nd).step_by(LANES) {
                    let v = (load_i16(&sad[k..]) - load_i16(&hsad[rs + k..]))
                        + load_i16(&hsad[ra + k..]);
                    store_i16(&mut sad[k..], v);
                    let better = min8.simd_gt(v);
                    min8 = better.blend(v, min8);
                    mind8 = better.blend(d8, mind8);
                    d8 = d8 + lane_step;
                }
                let (minsad, mind) = reduce_min(min8, mind8);
                tsum += htext[y + geom.wsz] - htext[y];

                let px = &mut out.row_at_mut(y)[col];
                if tsum < params.texture_threshold {
                    if pass.bracket.is_none() {
                        *px = filtered;
                    }
                    continue;
                }

                if params.uniqueness_ratio > 0 {
                    let thresh = uniqueness_threshold(i32::from(minsad), params.uniqueness_ratio);
                    let limit = splat((thresh + 1).min(i64::from(i16::MAX)) as i16);
                    let lo = splat(mind as i16 - 1);
                    let hi = splat(mind as i16 + 1);
                    let mut hits = splat(0);
                    let mut d8 = lane_idx;
                    for k in (0..nd).step_by(LANES) {
                        let s = load_i16(&sad[k..]);
                        hits = hits | (limit.simd_gt(s) & (lo.simd_gt(d8) | d8.simd_gt(hi)));
                        d8 = d8 + lane_step;
                    }
                    if hits.to_array().iter().any(|&m| m != 0) {
                        if pass.bracket.is_none() {
                            *px = filtered;
                        }
                        continue;
                    }
                }

                if let Some(bracket) = &pass.bracket {
                    if !bracket.admits(col, input.row0 + y, params.index_disparity(mind)) {
                        continue;
                    }
                }

                let (prev, next) = neighbor_indices(mind, nd);
                *px = subpixel_disparity(
                    i32::from(sad[prev]),
                    i32::from(sad[mind]),
                    i32::from(sad[next]),
                    mind,
                    nd,
                    params.min_disparity,
                );
            }
        }
        Ok(())
    }
}
