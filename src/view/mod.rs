//! View-side state: overlays and the decoration dispatcher that fills them.

pub mod decorations;
pub mod overlay;
