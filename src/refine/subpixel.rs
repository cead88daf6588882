//! Parabolic sub-pixel interpolation of the SAD minimum.

use crate::disparity::DISPARITY_SHIFT;

/// Indices of the two cost samples around `mind`, mirrored at the ends.
///
/// At index 0 the missing left neighbor is taken from index 1; at the last
/// index the missing right neighbor is taken from `num_disparities - 2`.
#[inline]
pub(crate) fn neighbor_indices(mind: usize, num_disparities: usize) -> (usize, usize) {
    let prev = if mind == 0 { 1 } else { mind - 1 };
    let next = if mind + 1 == num_disparities {
        num_disparities - 2
    } else {
        mind + 1
    };
    (prev, next)
}

/// Fixed-point disparity for the cost minimum at index `mind`.
///
/// `n`, `c`, `p` are the costs at `mind - 1`, `mind`, `mind + 1`. The
/// parabola vertex offset is computed in 1/256 units and rounded up to the
/// 1/16 output grid. A flat neighborhood gives the integer disparity.
#[inline]
pub(crate) fn subpixel_disparity(
    n: i32,
    c: i32,
    p: i32,
    mind: usize,
    num_disparities: usize,
    min_disparity: i32,
) -> i16 {
    let den = p + n - 2 * c;
    let frac = if den != 0 {
        ((i64::from(p) - i64::from(n)) * 128 / i64::from(den)) as i32
    } else {
        0
    };
    let whole = (num_disparities as i32 - mind as i32 - 1 + min_disparity) * 256;
    ((whole + frac + 15) >> DISPARITY_SHIFT) as i16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symmetric_costs_give_integer_disparity() {
        // Index 3 of 16 with min 0 is disparity 12.
        assert_eq!(subpixel_disparity(50, 10, 50, 3, 16, 0), 12 * 16);
    }

    #[test]
    fn flat_neighborhood_gives_integer_disparity() {
        assert_eq!(subpixel_disparity(10, 10, 10, 0, 16, -4), 11 * 16);
    }

    #[test]
    fn offset_points_toward_cheaper_neighbor() {
        // Cheaper cost at mind + 1 means a smaller disparity.
        let toward_next = subpixel_disparity(60, 10, 20, 5, 32, 0);
        let toward_prev = subpixel_disparity(20, 10, 60, 5, 32, 0);
        assert!(i32::from(toward_next) < 26 * 16);
        assert!(i32::from(toward_prev) > 26 * 16);
        assert!(toward_next < toward_prev);
    }

    #[test]
    fn neighbors_mirror_at_range_ends() {
        assert_eq!(neighbor_indices(0, 16), (1, 1));
        assert_eq!(neighbor_indices(15, 16), (14, 14));
        assert_eq!(neighbor_indices(7, 16), (6, 8));
    }
}
