use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use stereobm::lowlevel::{
    correlate_bands, BandPlan, BandScratch, PassInput, PassParams, ScalarKernel,
};
use stereobm::{DisparityFormat, ImageView, ImageViewMut, OwnedImage, StereoConfig, StereoMatcher};

fn random_pair(width: usize, height: usize, seed: u64) -> (Vec<u8>, Vec<u8>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let shift = 7;
    let src_width = width + shift;
    let src: Vec<u8> = (0..src_width * height).map(|_| rng.random()).collect();
    let mut left = Vec::with_capacity(width * height);
    let mut right = Vec::with_capacity(width * height);
    for y in 0..height {
        let row = &src[y * src_width..(y + 1) * src_width];
        left.extend_from_slice(&row[..width]);
        right.extend_from_slice(&row[shift..shift + width]);
    }
    // Flat patch so the texture gate fires inside some bands.
    for y in height / 3..height / 3 + 10 {
        left[y * width + 40..y * width + 70].fill(90);
        right[y * width + 40..y * width + 70].fill(90);
    }
    (left, right)
}

fn compute(cfg: StereoConfig, left: &[u8], right: &[u8], w: usize, h: usize) -> Vec<i16> {
    let lv = ImageView::from_slice(left, w, h).unwrap();
    let rv = ImageView::from_slice(right, w, h).unwrap();
    let mut matcher = StereoMatcher::new(cfg).unwrap();
    let disp = matcher.compute(lv, rv, DisparityFormat::Fixed16).unwrap();
    disp.as_fixed().unwrap().data().to_vec()
}

#[test]
fn band_count_does_not_change_output() {
    let (w, h) = (128, 97);
    let (left, right) = random_pair(w, h, 31);
    let base = StereoConfig {
        sad_window_size: 11,
        num_disparities: 32,
        uniqueness_ratio: 10,
        speckle_window_size: 30,
        speckle_range: 16,
        try_smaller_windows: true,
        ..StereoConfig::default()
    };
    let single = compute(
        StereoConfig {
            workers: 1,
            ..base.clone()
        },
        &left,
        &right,
        w,
        h,
    );
    for workers in [2, 3, 7, 0] {
        let banded = compute(
            StereoConfig {
                workers,
                ..base.clone()
            },
            &left,
            &right,
            w,
            h,
        );
        assert_eq!(single, banded, "workers = {workers}");
    }
}

#[test]
fn band_plan_partitions_every_row() {
    for (height, window, workers) in [(97, 11, 3), (480, 15, 16), (20, 21, 4), (64, 5, 64)] {
        let plan = BandPlan::new(height, window, workers);
        assert!(!plan.is_empty());
        assert_eq!(plan.bands()[0].start, 0);
        assert_eq!(plan.bands().last().unwrap().end, height);
        for pair in plan.bands().windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
        if plan.len() > 1 {
            assert!(plan.bands().iter().all(|b| b.len() >= window));
        }
    }
}

/// Random pre-filtered planes with a right plane padded by `num_disparities`.
fn random_planes(
    width: usize,
    height: usize,
    num_disparities: usize,
    cap: u8,
    seed: u64,
) -> (OwnedImage<u8>, OwnedImage<u8>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let max = 2 * cap;
    let left: Vec<u8> = (0..width * height).map(|_| rng.random_range(0..=max)).collect();
    let rw = width + num_disparities;
    let right: Vec<u8> = (0..rw * height).map(|_| rng.random_range(0..=max)).collect();
    (
        OwnedImage::new(left, width, height).unwrap(),
        OwnedImage::new(right, rw, height).unwrap(),
    )
}

fn params(window: usize, min_disparity: i32) -> PassParams {
    PassParams {
        window,
        num_disparities: 16,
        min_disparity,
        prefilter_cap: 31,
        texture_threshold: 10,
        uniqueness_ratio: 15,
    }
}

#[test]
fn lowlevel_bands_match_single_band() {
    let (w, h) = (70, 45);
    let (left, right) = random_planes(w, h, 16, 31, 5);
    for min_disparity in [0, -8, -20, 4] {
        let pass = PassInput {
            left: left.view(),
            right: right.view(),
            bracket: None,
            params: params(7, min_disparity),
        };

        let mut whole = vec![0i16; w * h];
        let mut scratch = vec![BandScratch::new()];
        correlate_bands::<ScalarKernel>(
            &pass,
            &[0..h],
            &mut scratch,
            ImageViewMut::from_slice(&mut whole, w, h).unwrap(),
        )
        .unwrap();

        let bands = [0..11, 11..23, 23..37, 37..45];
        let mut split = vec![0i16; w * h];
        let mut scratches: Vec<BandScratch> = (0..bands.len()).map(|_| BandScratch::new()).collect();
        correlate_bands::<ScalarKernel>(
            &pass,
            &bands,
            &mut scratches,
            ImageViewMut::from_slice(&mut split, w, h).unwrap(),
        )
        .unwrap();
        assert_eq!(whole, split, "min_disparity = {min_disparity}");
    }
}

#[cfg(feature = "rayon")]
#[test]
fn parallel_bands_match_sequential_bands() {
    use stereobm::lowlevel::correlate_bands_par;

    let (w, h) = (96, 80);
    let (left, right) = random_planes(w, h, 16, 31, 9);
    let pass = PassInput {
        left: left.view(),
        right: right.view(),
        bracket: None,
        params: params(9, 0),
    };
    let plan = BandPlan::new(h, 9, 6);

    let mut seq = vec![0i16; w * h];
    let mut scratches: Vec<BandScratch> = (0..plan.len()).map(|_| BandScratch::new()).collect();
    correlate_bands::<ScalarKernel>(
        &pass,
        plan.bands(),
        &mut scratches,
        ImageViewMut::from_slice(&mut seq, w, h).unwrap(),
    )
    .unwrap();

    let mut par = vec![0i16; w * h];
    correlate_bands_par::<ScalarKernel>(
        &pass,
        plan.bands(),
        &mut scratches,
        ImageViewMut::from_slice(&mut par, w, h).unwrap(),
    )
    .unwrap();
    assert_eq!(seq, par);
}
