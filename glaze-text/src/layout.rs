//! Pen-advance text layout.
//!
//! Positions glyphs left to right from a (0,0) origin at the top-left
//! of the text block, stepping the pen by each glyph's advance.
//! Wrapping happens on `\n` and, when a non-zero wrap width is given,
//! before any glyph whose advance would carry the pen past it.

use crate::atlas::AtlasRect;
use crate::font::GlyphSlot;

/// Access to glyph metrics and atlas placements during layout.
///
/// Implemented by [`FontAsset`](crate::font::FontAsset); layout needs
/// only these two calls, so the pen and baseline arithmetic can be
/// exercised with fixed metrics as well.
pub trait GlyphSource {
    /// Ascent above the baseline and baseline-to-baseline step for the
    /// given pixel size.
    fn line_metrics(&self, px: f32) -> (f32, f32);
    /// Glyph metrics and atlas placement, rasterizing on first use.
    fn glyph(&mut self, c: char, px: f32) -> GlyphSlot;
}

/// A positioned glyph quad ready for batching.
///
/// `x`/`y` are the top-left corner in text-local pixels; `uv` is the
/// glyph's texel rect in the font's atlas.
#[derive(Clone, Copy, Debug)]
pub struct GlyphQuad {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub uv: AtlasRect,
}

/// Pen state for a layout pass.
struct Pen {
    x: f32,
    y: f32,
    line_step: f32,
    wrap_width: f32,
}

impl Pen {
    fn new(line_step: f32, wrap_width: f32) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            line_step,
            wrap_width,
        }
    }

    /// Whether placing a glyph with this advance must start a new line.
    /// Never wraps at the start of a line, so a single over-wide glyph
    /// still gets placed.
    fn should_wrap(&self, advance: f32) -> bool {
        self.wrap_width > 0.0 && self.x > 0.0 && self.x + advance > self.wrap_width
    }

    fn newline(&mut self) {
        self.x = 0.0;
        self.y += self.line_step;
    }
}

/// Lay out `text` at `size` pixels, wrapping at `wrap_width` (0 means
/// no wrapping). Rasterizes any glyphs not yet in the font's atlas.
///
/// Glyphs without coverage (spaces, control characters) advance the
/// pen but produce no quad; an empty string produces no quads at all.
pub fn layout_text(
    font: &mut impl GlyphSource,
    text: &str,
    size: f32,
    wrap_width: f32,
) -> Vec<GlyphQuad> {
    let (ascent, line_step) = font.line_metrics(size);
    let mut pen = Pen::new(line_step, wrap_width);
    let mut quads = Vec::with_capacity(text.len());

    for c in text.chars() {
        if c == '\n' {
            pen.newline();
            continue;
        }

        let slot = font.glyph(c, size);
        if pen.should_wrap(slot.advance) {
            pen.newline();
        }

        if let Some(rect) = slot.rect {
            quads.push(GlyphQuad {
                x: pen.x + slot.xmin,
                // ymin is measured upward from the baseline; flip into
                // y-down text-local space.
                y: pen.y + ascent - slot.ymin - slot.height,
                width: slot.width,
                height: slot.height,
                uv: rect,
            });
        }

        pen.x += slot.advance;
    }

    quads
}

// ===================================================================
// Tests
// ===================================================================

#[cfg(test)]
mod tests {
    use super::*;

    /// Every printable glyph is 8x8 with advance 10, xmin 1, ymin 2;
    /// spaces advance without coverage. Ascent 12, line step 20.
    struct FixedMetrics;

    impl GlyphSource for FixedMetrics {
        fn line_metrics(&self, _px: f32) -> (f32, f32) {
            (12.0, 20.0)
        }

        fn glyph(&mut self, c: char, _px: f32) -> GlyphSlot {
            if c == ' ' {
                GlyphSlot {
                    advance: 10.0,
                    xmin: 0.0,
                    ymin: 0.0,
                    width: 0.0,
                    height: 0.0,
                    rect: None,
                }
            } else {
                GlyphSlot {
                    advance: 10.0,
                    xmin: 1.0,
                    ymin: 2.0,
                    width: 8.0,
                    height: 8.0,
                    rect: Some(AtlasRect {
                        x: 0,
                        y: 0,
                        width: 8,
                        height: 8,
                    }),
                }
            }
        }
    }

    #[test]
    fn test_empty_string_produces_no_quads() {
        let quads = layout_text(&mut FixedMetrics, "", 16.0, 0.0);
        assert!(quads.is_empty());
    }

    #[test]
    fn test_glyphs_advance_and_sit_on_the_baseline() {
        let quads = layout_text(&mut FixedMetrics, "ab", 16.0, 0.0);
        assert_eq!(quads.len(), 2);
        // x = pen + xmin; y = ascent - ymin - height = 12 - 2 - 8.
        assert_eq!((quads[0].x, quads[0].y), (1.0, 2.0));
        assert_eq!((quads[1].x, quads[1].y), (11.0, 2.0));
    }

    #[test]
    fn test_newline_starts_a_new_line() {
        let quads = layout_text(&mut FixedMetrics, "a\nb", 16.0, 0.0);
        assert_eq!(quads.len(), 2);
        assert_eq!((quads[1].x, quads[1].y), (1.0, 22.0));
    }

    #[test]
    fn test_wrap_width_breaks_the_line() {
        // Advance 10 per glyph; the third glyph would end at 30 > 25.
        let quads = layout_text(&mut FixedMetrics, "abc", 16.0, 25.0);
        assert_eq!(quads.len(), 3);
        assert_eq!((quads[0].x, quads[0].y), (1.0, 2.0));
        assert_eq!((quads[1].x, quads[1].y), (11.0, 2.0));
        assert_eq!((quads[2].x, quads[2].y), (1.0, 22.0));
    }

    #[test]
    fn test_whitespace_advances_without_a_quad() {
        let quads = layout_text(&mut FixedMetrics, "a b", 16.0, 0.0);
        assert_eq!(quads.len(), 2);
        assert_eq!(quads[1].x, 21.0);
    }

    #[test]
    fn test_pen_advances_without_wrap() {
        let mut pen = Pen::new(20.0, 0.0);
        assert!(!pen.should_wrap(1000.0));
        pen.x += 1000.0;
        assert!(!pen.should_wrap(1000.0));
        assert_eq!(pen.y, 0.0);
    }

    #[test]
    fn test_pen_never_wraps_at_line_start() {
        let pen = Pen::new(20.0, 10.0);
        // A glyph wider than the wrap width is placed anyway.
        assert!(!pen.should_wrap(50.0));
    }

    #[test]
    fn test_pen_exact_fit_does_not_wrap() {
        let mut pen = Pen::new(20.0, 100.0);
        pen.x += 60.0;
        assert!(!pen.should_wrap(40.0));
        assert!(pen.should_wrap(40.1));
    }
}
