//! Font asset — a parsed font plus its lazily-filled glyph atlas.
//!
//! Parsing and rasterization are delegated to `fontdue`; this module
//! owns the cache policy: glyphs are rasterized on first use at the
//! requested pixel size and blitted into the shelf-packed [`Atlas`].
//! Nothing is rasterized at load time, so startup cost and atlas
//! memory are bounded by the glyphs actually drawn.
//!
//! The asset is identified by a [`Uuid`]; a GPU context keys its
//! texture copy of the atlas on that id plus the atlas version.

use std::collections::HashMap;

use log::warn;
use thiserror::Error;
use uuid::Uuid;

use crate::atlas::{Atlas, AtlasRect, INITIAL_ATLAS_SIZE};

#[derive(Error, Debug)]
pub enum FontError {
    /// The byte buffer is not a font this library recognizes, or is
    /// truncated.
    #[error("unrecognized or truncated font data: {0}")]
    Parse(&'static str),
}

/// Cache key: character plus exact requested pixel size.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct GlyphKey {
    c: char,
    size_bits: u32,
}

impl GlyphKey {
    fn new(c: char, px: f32) -> Self {
        Self {
            c,
            size_bits: px.to_bits(),
        }
    }
}

/// A cached glyph: metrics plus its atlas placement.
///
/// `rect` is `None` for glyphs with no visible coverage (whitespace)
/// and for glyphs that could not fit the atlas at its growth cap.
#[derive(Clone, Copy, Debug)]
pub struct GlyphSlot {
    /// Horizontal pen advance in pixels.
    pub advance: f32,
    /// Left side bearing of the bitmap relative to the pen position.
    pub xmin: f32,
    /// Offset of the bitmap's bottom edge above the baseline.
    pub ymin: f32,
    /// Bitmap dimensions in pixels.
    pub width: f32,
    pub height: f32,
    /// Placement in the atlas, texel space.
    pub rect: Option<AtlasRect>,
}

/// A loaded font and its glyph raster cache.
pub struct FontAsset {
    id: Uuid,
    font: fontdue::Font,
    atlas: Atlas,
    glyphs: HashMap<GlyphKey, GlyphSlot>,
}

impl FontAsset {
    /// Parse a font from a raw byte buffer (TTF/OTF).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FontError> {
        let font = fontdue::Font::from_bytes(bytes, fontdue::FontSettings::default())
            .map_err(FontError::Parse)?;
        Ok(Self {
            id: Uuid::new_v4(),
            font,
            atlas: Atlas::new(INITIAL_ATLAS_SIZE),
            glyphs: HashMap::new(),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn atlas(&self) -> &Atlas {
        &self.atlas
    }

    /// Ascent above the baseline and baseline-to-baseline step for the
    /// given pixel size.
    pub fn line_metrics(&self, px: f32) -> (f32, f32) {
        match self.font.horizontal_line_metrics(px) {
            Some(m) => (m.ascent, m.new_line_size),
            // Fonts without horizontal metrics are exotic; approximate.
            None => (px, px * 1.2),
        }
    }

    /// Look up a glyph, rasterizing it into the atlas on first use.
    pub fn glyph(&mut self, c: char, px: f32) -> GlyphSlot {
        let key = GlyphKey::new(c, px);
        if let Some(slot) = self.glyphs.get(&key) {
            return *slot;
        }

        let (metrics, bitmap) = self.font.rasterize(c, px);
        let rect = if metrics.width > 0 && metrics.height > 0 {
            let placed =
                self.atlas
                    .insert(metrics.width as u32, metrics.height as u32, &bitmap);
            if placed.is_none() {
                warn!("glyph {c:?} at {px}px does not fit the atlas; skipped");
            }
            placed
        } else {
            None
        };

        let slot = GlyphSlot {
            advance: metrics.advance_width,
            xmin: metrics.xmin as f32,
            ymin: metrics.ymin as f32,
            width: metrics.width as f32,
            height: metrics.height as f32,
            rect,
        };
        self.glyphs.insert(key, slot);
        slot
    }

    /// Number of glyphs rasterized so far.
    pub fn cached_glyphs(&self) -> usize {
        self.glyphs.len()
    }
}

impl crate::layout::GlyphSource for FontAsset {
    fn line_metrics(&self, px: f32) -> (f32, f32) {
        FontAsset::line_metrics(self, px)
    }

    fn glyph(&mut self, c: char, px: f32) -> GlyphSlot {
        FontAsset::glyph(self, c, px)
    }
}

// ===================================================================
// Tests
// ===================================================================
