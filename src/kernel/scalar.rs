//! Scalar SAD kernel with 32-bit running sums.

use crate::image::ImageViewMut;
use crate::kernel::scratch::ring_planes;
use crate::kernel::{
    fill_border_columns, texture_column, texture_fill_borders, texture_lut, uniqueness_threshold,
    BandGeometry, BandInput, BandScratch, SadKernel,
};
use crate::refine::subpixel::{neighbor_indices, subpixel_disparity};
use crate::util::StereoResult;

/// Portable kernel; handles every legal window and cap.
pub struct ScalarKernel;

impl SadKernel for ScalarKernel {
    const NAME: &'static str = "scalar";

    fn correlate_band(
        input: &BandInput<'_>,
        scratch: &mut BandScratch,
        out: &mut ImageViewMut<'_, i16>,
    ) -> StereoResult<()> {
        let pass = &input.pass;
        let params = &pass.params;
        input.validate(out)?;
        let geom = BandGeometry::new(input);
        let filtered = params.filtered();
        fill_border_columns(&geom, out, filtered);
        if geom.width1 == 0 {
            return Ok(());
        }

        scratch.prepare_wide(&geom);
        let BandScratch {
            sad,
            hsad,
            htext,
            cbuf,
            ..
        } = scratch;
        let nd = geom.ndisp;
        let plane = geom.plane();
        let lut = texture_lut(params.prefilter_cap);
        let wsz2 = geom.wsz2 as isize;

        // Prime the ring and row sums with window columns -wsz2-1 ..= wsz2-1.
        for x in -wsz2 - 1..wsz2 {
            let slot = geom.slot(x);
            let cb = &mut cbuf[slot * plane..(slot + 1) * plane];
            let lc = geom.left_col(x);
            let rc = geom.right_col(x);
            for r in 0..geom.rows_total {
                let y = geom.top + r;
                let lval = pass.left.row_at(y)[lc];
                let rrow = &pass.right.row_at(y)[rc..rc + nd];
                let hs = &mut hsad[r * nd..(r + 1) * nd];
                let cbr = &mut cb[r * nd..(r + 1) * nd];
                for ((c, h), &rv) in cbr.iter_mut().zip(hs.iter_mut()).zip(rrow) {
                    let diff = lval.abs_diff(rv);
                    *c = diff;
                    *h += i32::from(diff);
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
                let lval = pass.left.row_at(y)[lc];
                let rrow = &pass.right.row_at(y)[rc..rc + nd];
                let span = r * nd..(r + 1) * nd;
                let hs = &mut hsad[span.clone()];
                let add = &mut cb_add[span.clone()];
                let sub = &cb_sub[span];
                for d in 0..nd {
                    let diff = lval.abs_diff(rrow[d]);
                    add[d] = diff;
                    hs[d] += i32::from(diff) - i32::from(sub[d]);
                }
            }
            texture_column(&geom, pass.left, &lut, htext, x1, Some(x0));
            texture_fill_borders(&geom, htext);

            let top_weight = geom.top_weight() as i32;
            for (s, &h) in sad.iter_mut().zip(&hsad[..nd]) {
                *s = h * top_weight;
            }
            for r in 1..geom.wsz2 + geom.dy0 {
                let r = r.min(geom.rows_total - 1);
                for (s, &h) in sad.iter_mut().zip(&hsad[r * nd..(r + 1) * nd]) {
                    *s += h;
                }
            }
            let mut tsum: i32 = htext[..geom.wsz].iter().sum();

            let col = geom.lofs + x;
            for y in 0..geom.bh {
                let ra = geom.add_row(y) * nd;
                let rs = geom.sub_row(y) * nd;
                let mut minsad = i32::MAX;
                let mut mind = 0usize;
                for d in 0..nd {
                    let v = sad[d] + hsad[ra + d] - hsad[rs + d];
                    sad[d] = v;
                    if v < minsad {
                        minsad = v;
                        mind = d;
                    }
                }
                tsum += htext[y + geom.wsz] - htext[y];

                let px = &mut out.row_at_mut(y)[col];
                if tsum < params.texture_threshold {
                    if pass.bracket.is_none() {
                        *px = filtered;
                    }
                    continue;
                }

                if params.uniqueness_ratio > 0 {
                    let thresh = uniqueness_threshold(minsad, params.uniqueness_ratio);
                    let ambiguous = sad
                        .iter()
                        .enumerate()
                        .any(|(d, &s)| i64::from(s) <= thresh && d.abs_diff(mind) > 1);
                    if ambiguous {
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
                    sad[prev],
                    sad[mind],
                    sad[next],
                    mind,
                    nd,
                    params.min_disparity,
                );
            }
        }
        Ok(())
    }
}
