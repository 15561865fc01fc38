//! # glaze-text
//!
//! CPU-side font machinery for the Glaze painter: font parsing, lazy
//! glyph rasterization into a shelf-packed coverage atlas, and
//! pen-advance text layout. No GPU dependency — `glaze-render` uploads
//! the atlas and draws the quads this crate produces.
//!
//! ## Crate modules
//!
//! - [`atlas`] — single-channel glyph atlas with in-place growth
//! - [`font`] — `FontAsset`: parsed font + glyph raster cache
//! - [`layout`] — positioned glyph quads with wrapping

pub mod atlas;
pub mod font;
pub mod layout;

pub use atlas::{Atlas, AtlasRect, INITIAL_ATLAS_SIZE, MAX_ATLAS_SIZE};
pub use font::{FontAsset, FontError, GlyphSlot};
pub use layout::{layout_text, GlyphQuad, GlyphSource};
