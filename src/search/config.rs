//! Matcher configuration and validation.

use crate::disparity::DISPARITY_SCALE;
use crate::kernel::{KernelChoice, PassParams};
use crate::prefilter::{validate_prefilter, PreFilterKind};
use crate::util::{StereoError, StereoResult};

/// Block-matching parameters.
///
/// Defaults follow the classic block matcher setup: horizontal Sobel
/// pre-filter clipped at 31, a 15x15 window and 64 disparities from 0.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StereoConfig {
    pub prefilter: PreFilterKind,
    /// Box size of the normalized-response pre-filter (odd, 5..=255).
    pub prefilter_size: usize,
    /// Pre-filter clip level (1..=63).
    pub prefilter_cap: u8,
    /// SAD window size (odd, 5..=255, smaller than both image dimensions).
    pub sad_window_size: usize,
    pub min_disparity: i32,
    /// Search range size; positive multiple of 16.
    pub num_disparities: usize,
    /// Minimum texture energy of the window; weaker pixels are filtered.
    pub texture_threshold: i32,
    /// Required margin, in percent, between the best and any non-adjacent
    /// cost; 0 disables the check.
    pub uniqueness_ratio: i32,
    /// Regions smaller than this are removed; 0 disables speckle filtering.
    pub speckle_window_size: usize,
    /// Maximum neighbor difference inside a region, in 1/16 pixel units.
    /// Negative disables speckle filtering.
    pub speckle_range: i32,
    /// Re-run with a smaller window constrained by first-pass brackets.
    pub try_smaller_windows: bool,
    pub kernel: KernelChoice,
    /// Requested number of row bands; 0 picks the thread pool size.
    pub workers: usize,
}

impl Default for StereoConfig {
    fn default() -> Self {
        Self {
            prefilter: PreFilterKind::XSobel,
            prefilter_size: 9,
            prefilter_cap: 31,
            sad_window_size: 15,
            min_disparity: 0,
            num_disparities: 64,
            texture_threshold: 10,
            uniqueness_ratio: 15,
            speckle_window_size: 0,
            speckle_range: 0,
            try_smaller_windows: false,
            kernel: KernelChoice::Auto,
            workers: 0,
        }
    }
}

impl StereoConfig {
    /// Checks every image-independent constraint.
    pub fn validate(&self) -> StereoResult<()> {
        validate_prefilter(self.prefilter_size, self.prefilter_cap)?;
        if !(5..=255).contains(&self.sad_window_size) || self.sad_window_size % 2 == 0 {
            return Err(StereoError::ParamOutOfRange {
                name: "sad_window_size",
                reason: "must be odd and within 5..=255",
            });
        }
        if self.num_disparities == 0 || self.num_disparities % 16 != 0 {
            return Err(StereoError::ParamOutOfRange {
                name: "num_disparities",
                reason: "must be a positive multiple of 16",
            });
        }
        let scale = i64::from(DISPARITY_SCALE);
        let lowest = (i64::from(self.min_disparity) - 1) * scale;
        let highest = (i64::from(self.min_disparity) + self.num_disparities as i64) * scale;
        if lowest < i64::from(i16::MIN) || highest > i64::from(i16::MAX) {
            return Err(StereoError::ParamOutOfRange {
                name: "min_disparity",
                reason: "disparity range does not fit the 16-bit fixed-point encoding",
            });
        }
        if self.texture_threshold < 0 {
            return Err(StereoError::ParamOutOfRange {
                name: "texture_threshold",
                reason: "must be non-negative",
            });
        }
        if self.uniqueness_ratio < 0 {
            return Err(StereoError::ParamOutOfRange {
                name: "uniqueness_ratio",
                reason: "must be non-negative",
            });
        }
        self.kernel
            .resolve(self.prefilter_cap, self.sad_window_size)?;
        Ok(())
    }

    /// Pass parameters for a correlation window of `window`.
    pub fn pass_params(&self, window: usize) -> PassParams {
        PassParams {
            window,
            num_disparities: self.num_disparities,
            min_disparity: self.min_disparity,
            prefilter_cap: self.prefilter_cap,
            texture_threshold: self.texture_threshold,
            uniqueness_ratio: self.uniqueness_ratio,
        }
    }

    /// Whether speckle filtering runs after correlation.
    pub fn speckle_enabled(&self) -> bool {
        self.speckle_range >= 0 && self.speckle_window_size > 0
    }
}
