//! The block-matching pipeline.
//!
//! [`StereoMatcher`] owns the configuration and a grow-only scratch arena.
//! A call validates its inputs, pre-filters both images, runs the
//! correlation pass over row bands, optionally refines with a smaller
//! bracketed window, and finally removes speckles.

mod arena;
pub mod bands;
mod config;

pub use bands::{resolve_workers, BandPlan};
pub use config::StereoConfig;

use crate::disparity::{fixed_to_float, DisparityFormat, DisparityMap};
use crate::filter::filter_speckles;
use crate::image::{ensure_size, ImageView, ImageViewMut, OwnedImage};
use crate::kernel::{Bracket, KernelKind, PassInput};
use crate::refine::bracket::{build_brackets, small_window};
use crate::search::arena::ScratchArena;
use crate::search::bands::correlate_pass;
use crate::trace::{band_debug, enter_stage, stage_event};
use crate::util::{StereoError, StereoResult};

/// Kernels resolved for the main pass and the optional bracketed pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct PassKernels {
    main: KernelKind,
    /// Refinement window and its kernel.
    refine: Option<(usize, KernelKind)>,
}

/// Stereo block matcher with reusable working memory.
#[derive(Debug)]
pub struct StereoMatcher {
    config: StereoConfig,
    arena: ScratchArena,
}

impl StereoMatcher {
    /// Validates `config` and creates a matcher with an empty arena.
    pub fn new(config: StereoConfig) -> StereoResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            arena: ScratchArena::new(),
        })
    }

    pub fn config(&self) -> &StereoConfig {
        &self.config
    }

    /// Replaces the configuration, keeping the arena.
    pub fn set_config(&mut self, config: StereoConfig) -> StereoResult<()> {
        config.validate()?;
        self.config = config;
        Ok(())
    }

    /// Current arena size in bytes.
    pub fn arena_bytes(&self) -> usize {
        self.arena.bytes()
    }

    /// Computes a disparity map of the left view in the requested encoding.
    pub fn compute(
        &mut self,
        left: ImageView<'_, u8>,
        right: ImageView<'_, u8>,
        format: DisparityFormat,
    ) -> StereoResult<DisparityMap> {
        let (width, height) = (left.width(), left.height());
        match format {
            DisparityFormat::Fixed16 => {
                let mut out = OwnedImage::filled(width, height, 0i16)?;
                self.compute_into_fixed(left, right, out.view_mut())?;
                Ok(DisparityMap::Fixed(out))
            }
            DisparityFormat::Float32 => {
                let mut out = OwnedImage::filled(width, height, 0f32)?;
                self.compute_into_float(left, right, out.view_mut())?;
                Ok(DisparityMap::Float(out))
            }
        }
    }

    /// Writes fixed-point disparity (`value = disparity * 16`) into `out`.
    pub fn compute_into_fixed(
        &mut self,
        left: ImageView<'_, u8>,
        right: ImageView<'_, u8>,
        out: ImageViewMut<'_, i16>,
    ) -> StereoResult<()> {
        let kernels = self.check_inputs(left, right, out.width(), out.height())?;
        self.run(left, right, out, kernels)
    }

    /// Writes float disparity into `out`.
    pub fn compute_into_float(
        &mut self,
        left: ImageView<'_, u8>,
        right: ImageView<'_, u8>,
        out: ImageViewMut<'_, f32>,
    ) -> StereoResult<()> {
        let kernels = self.check_inputs(left, right, out.width(), out.height())?;
        let (width, height) = (left.width(), left.height());
        let mut disp = std::mem::replace(&mut self.arena.disp, OwnedImage::empty());
        disp.reshape(width, height, width, 0);
        let result = self
            .run(left, right, disp.view_mut(), kernels)
            .and_then(|()| fixed_to_float(disp.view(), out));
        self.arena.disp = disp;
        result
    }

    /// Checks images and output against the configuration and resolves the
    /// kernel of every pass before any output is written.
    fn check_inputs(
        &self,
        left: ImageView<'_, u8>,
        right: ImageView<'_, u8>,
        out_width: usize,
        out_height: usize,
    ) -> StereoResult<PassKernels> {
        let cfg = &self.config;
        let (width, height) = (left.width(), left.height());
        left.ensure_same_size(&right, "right image")?;
        ensure_size("disparity output", width, height, out_width, out_height)?;
        if cfg.sad_window_size >= width.min(height) {
            return Err(StereoError::ParamOutOfRange {
                name: "sad_window_size",
                reason: "must be smaller than the image width and height",
            });
        }
        let params = cfg.pass_params(cfg.sad_window_size);
        if params.lofs() >= width || params.rofs() >= width || params.valid_width(width) < 1 {
            return Err(StereoError::DegenerateGeometry {
                width,
                num_disparities: cfg.num_disparities,
                min_disparity: cfg.min_disparity,
            });
        }
        let main = cfg.kernel.resolve(cfg.prefilter_cap, cfg.sad_window_size)?;
        let small = small_window(cfg.sad_window_size);
        let refine = if cfg.try_smaller_windows && small < cfg.sad_window_size {
            Some((small, cfg.kernel.resolve(cfg.prefilter_cap, small)?))
        } else {
            None
        };
        Ok(PassKernels { main, refine })
    }

    fn run(
        &mut self,
        left: ImageView<'_, u8>,
        right: ImageView<'_, u8>,
        mut out: ImageViewMut<'_, i16>,
        kernels: PassKernels,
    ) -> StereoResult<()> {
        let cfg = &self.config;
        let arena = &mut self.arena;
        let height = left.height();
        enter_stage!(
            stereo_compute,
            width = left.width(),
            height = height,
            num_disparities = cfg.num_disparities,
        );

        {
            enter_stage!(prefilter);
            arena.prefilter_pair(left, right, cfg);
        }

        let plan = BandPlan::new(height, cfg.sad_window_size, cfg.workers);
        arena.ensure_bands(plan.len());
        stage_event!(band_plan, kernel = kernels.main.name(), bands = plan.len());
        for band in plan.bands() {
            band_debug!(band);
        }

        {
            enter_stage!(correlate_pass, window = cfg.sad_window_size);
            let pass = PassInput {
                left: arena.left.view(),
                right: arena.right.view(),
                bracket: None,
                params: cfg.pass_params(cfg.sad_window_size),
            };
            correlate_pass(kernels.main, &pass, &plan, &mut arena.bands, out.reborrow())?;
        }

        if let Some((small, small_kind)) = kernels.refine {
            enter_stage!(bracket, window = small);
            build_brackets(
                out.as_view(),
                cfg.min_disparity,
                small,
                &mut arena.dbmin,
                &mut arena.dbmax,
                &mut arena.morph_tmp,
            );
            stage_event!(bracket_pass, kernel = small_kind.name());
            let pass = PassInput {
                left: arena.left.view(),
                right: arena.right.view(),
                bracket: Some(Bracket {
                    min: arena.dbmin.view(),
                    max: arena.dbmax.view(),
                }),
                params: cfg.pass_params(small),
            };
            correlate_pass(small_kind, &pass, &plan, &mut arena.bands, out.reborrow())?;
        }

        if cfg.speckle_enabled() {
            enter_stage!(speckle);
            let removed = filter_speckles(
                out.reborrow(),
                cfg.pass_params(cfg.sad_window_size).filtered(),
                cfg.speckle_window_size,
                cfg.speckle_range,
                &mut arena.speckle,
            );
            stage_event!(speckle_removed, pixels = removed);
        }

        #[cfg(feature = "tracing")]
        {
            let filtered = cfg.pass_params(cfg.sad_window_size).filtered();
            let view = out.as_view();
            let count: usize = (0..height)
                .map(|y| view.row_at(y).iter().filter(|&&v| v == filtered).count())
                .sum();
            stage_event!(filtered_pixels, count = count, total = left.width() * height);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::KernelChoice;

    fn matcher(window: usize, try_smaller_windows: bool, kernel: KernelChoice) -> StereoMatcher {
        StereoMatcher::new(StereoConfig {
            sad_window_size: window,
            try_smaller_windows,
            kernel,
            ..StereoConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn both_pass_kernels_resolve_before_matching() {
        let data = vec![0u8; 96 * 48];
        let view = ImageView::from_slice(&data, 96, 48).unwrap();
        let resolve = |window, refine| {
            matcher(window, refine, KernelChoice::Scalar)
                .check_inputs(view, view, 96, 48)
                .unwrap()
        };

        let kernels = resolve(21, true);
        assert_eq!(kernels.main, KernelKind::Scalar);
        assert_eq!(kernels.refine, Some((11, KernelKind::Scalar)));
        assert_eq!(resolve(21, false).refine, None);
        assert_eq!(resolve(9, true).refine, None);
    }

    #[cfg(feature = "simd")]
    #[test]
    fn forced_vector_kernel_covers_the_bracketed_pass() {
        let data = vec![0u8; 96 * 48];
        let view = ImageView::from_slice(&data, 96, 48).unwrap();
        let kernels = matcher(21, true, KernelChoice::Simd)
            .check_inputs(view, view, 96, 48)
            .unwrap();
        assert_eq!(kernels.main, KernelKind::Simd);
        assert_eq!(kernels.refine, Some((11, KernelKind::Simd)));
    }
}
