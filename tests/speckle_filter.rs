use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use stereobm::{filter_speckles, ImageViewMut, SpeckleScratch};

const BAD: i16 = -16;

fn run(data: &mut [i16], w: usize, h: usize, size: usize, diff: i32) -> usize {
    let mut scratch = SpeckleScratch::new();
    let view = ImageViewMut::from_slice(data, w, h).unwrap();
    filter_speckles(view, BAD, size, diff, &mut scratch)
}

#[test]
fn removes_small_islands_and_keeps_large_regions() {
    let (w, h) = (12, 8);
    let mut data = vec![320i16; w * h];
    // A 2x2 island far from the background value.
    for y in 3..5 {
        for x in 5..7 {
            data[y * w + x] = 800;
        }
    }
    let removed = run(&mut data, w, h, 5, 16);
    assert_eq!(removed, 4);
    for y in 3..5 {
        for x in 5..7 {
            assert_eq!(data[y * w + x], BAD);
        }
    }
    assert_eq!(data.iter().filter(|&&v| v == 320).count(), w * h - 4);
}

#[test]
fn region_of_exactly_the_size_threshold_survives() {
    let (w, h) = (10, 6);
    let mut data = vec![BAD; w * h];
    for x in 2..6 {
        data[2 * w + x] = 100;
    }
    assert_eq!(run(&mut data, w, h, 4, 16), 0);
    assert_eq!(run(&mut data, w, h, 5, 16), 4);
    assert!(data.iter().all(|&v| v == BAD));
}

#[test]
fn neighbors_must_differ_by_strictly_less_than_range() {
    // 100 -> 116 differs by exactly 16 and does not connect.
    let mut data = vec![100i16, 100, 116, 116];
    assert_eq!(run(&mut data, 4, 1, 3, 16), 4);

    let mut data = vec![100i16, 100, 115, 115];
    assert_eq!(run(&mut data, 4, 1, 3, 16), 0);
}

#[test]
fn connectivity_is_four_neighbor() {
    let (w, h) = (3, 3);
    #[rustfmt::skip]
    let mut data = vec![
        50, BAD, BAD,
        BAD, 50, BAD,
        BAD, BAD, 50,
    ];
    // Diagonal pixels are separate single-pixel regions.
    assert_eq!(run(&mut data, w, h, 2, 100), 3);
}

#[test]
fn gradual_ramp_is_one_region() {
    let (w, h) = (20, 4);
    let mut data: Vec<i16> = (0..w * h).map(|i| ((i % w) * 8) as i16).collect();
    assert_eq!(run(&mut data, w, h, w * h, 9), 0);
}

#[test]
fn second_run_removes_nothing() {
    let (w, h) = (48, 32);
    let mut rng = StdRng::seed_from_u64(11);
    let mut data: Vec<i16> = (0..w * h)
        .map(|_| {
            if rng.random_bool(0.2) {
                BAD
            } else {
                rng.random_range(0..8i16) * 16
            }
        })
        .collect();
    let mut scratch = SpeckleScratch::new();
    let first = filter_speckles(
        ImageViewMut::from_slice(&mut data, w, h).unwrap(),
        BAD,
        12,
        16,
        &mut scratch,
    );
    let snapshot = data.clone();
    let second = filter_speckles(
        ImageViewMut::from_slice(&mut data, w, h).unwrap(),
        BAD,
        12,
        16,
        &mut scratch,
    );
    assert!(first > 0);
    assert_eq!(second, 0);
    assert_eq!(data, snapshot);
}
