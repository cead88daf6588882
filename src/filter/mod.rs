//! Post-filters applied to the fixed-point disparity map.

pub mod speckle;

pub use speckle::{filter_speckles, SpeckleScratch};
