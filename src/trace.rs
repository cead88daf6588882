//! Stage instrumentation for the matcher, compiled out without `tracing`.
//!
//! A call runs through the stages `stereo_compute` > `prefilter`,
//! `correlate_pass`, `bracket`, `speckle`. Each stage is an info span entered
//! for the rest of the enclosing block; per-stage counts are info events and
//! band layout is logged at debug level.

/// Enters an info span named after `$stage` until the end of the block.
#[cfg(feature = "tracing")]
macro_rules! enter_stage {
    ($stage:ident $(, $key:ident = $value:expr)* $(,)?) => {
        let _stage = tracing::info_span!(stringify!($stage) $(, $key = $value)*).entered();
    };
}

#[cfg(not(feature = "tracing"))]
macro_rules! enter_stage {
    ($stage:ident $(, $key:ident = $value:expr)* $(,)?) => {
        let _ = ($($value,)*);
    };
}

/// Info event for a per-stage count or choice.
#[cfg(feature = "tracing")]
macro_rules! stage_event {
    ($event:ident, $($key:ident = $value:expr),+ $(,)?) => {
        tracing::info!(name: stringify!($event), $($key = $value),+)
    };
}

#[cfg(not(feature = "tracing"))]
macro_rules! stage_event {
    ($event:ident, $($key:ident = $value:expr),+ $(,)?) => {
        let _ = ($($value,)+);
    };
}

/// Debug event with the row range of one correlation band.
#[cfg(feature = "tracing")]
macro_rules! band_debug {
    ($rows:expr) => {
        tracing::debug!(name: "band", row0 = $rows.start, row1 = $rows.end)
    };
}

#[cfg(not(feature = "tracing"))]
macro_rules! band_debug {
    ($rows:expr) => {
        let _ = &$rows;
    };
}

pub(crate) use band_debug;
pub(crate) use enter_stage;
pub(crate) use stage_event;
