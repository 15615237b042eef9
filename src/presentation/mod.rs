//! Presentation helpers: display projections and media resolution.

pub mod media;
pub mod views;
