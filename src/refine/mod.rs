//! Sub-pixel interpolation and bracketed refinement.

pub mod bracket;
pub(crate) mod subpixel;
