//! Command batch / geometry builder.
//!
//! Drawing calls are tessellated immediately, in the coordinate space
//! of the caller's current transform, and appended as vertex/index
//! data plus an ordered run list. A run is a contiguous index range
//! drawn with one pipeline (plain shapes, or glyphs sampling one
//! font's atlas); consecutive runs of the same kind merge so a frame
//! of N rects still costs one draw call.
//!
//! Pending CPU→GPU atlas uploads ride on the batch so that everything
//! a flush needs is in one place, and an abandoned frame (`clear()`)
//! drops them together with the geometry.
//!
//! Nothing here can fail: degenerate input (negative sizes, radii,
//! polygons with fewer than three sides) clamps to zero-area geometry
//! and records nothing, because aborting a frame over a cosmetic call
//! is worse than drawing nothing.

use bytemuck::{Pod, Zeroable};
use uuid::Uuid;

use glaze_text::GlyphQuad;

use crate::color::Color;
use crate::transform::Affine2;

/// A single vertex: screen-space position, atlas texel UV (unused by
/// the shape pipeline), and RGBA color.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 2],
    pub uv: [f32; 2],
    pub color: [f32; 4],
}

/// What a run is drawn with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunKind {
    /// Solid-color geometry.
    Shape,
    /// Glyph quads sampling the atlas texture of `font`.
    Glyph { font: Uuid },
}

/// A contiguous index range submitted as one draw call.
#[derive(Clone, Copy, Debug)]
pub struct DrawRun {
    pub kind: RunKind,
    pub index_start: u32,
    pub index_count: u32,
}

/// A CPU atlas snapshot the GPU context must upload before drawing the
/// batch's glyph runs.
pub struct AtlasUpload {
    pub font: Uuid,
    pub size: u32,
    pub version: u64,
    pub pixels: Vec<u8>,
}

/// Accumulated geometry for one frame.
#[derive(Default)]
pub struct Batch {
    vertices: Vec<Vertex>,
    indices: Vec<u32>,
    runs: Vec<DrawRun>,
    uploads: Vec<AtlasUpload>,
}

/// Segment count for a disk of radius `r`: radius-adaptive, never
/// below 32.
fn circle_segments(r: f32) -> u32 {
    ((r * 0.64).ceil() as u32).max(32)
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty() && self.uploads.is_empty()
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn runs(&self) -> &[DrawRun] {
        &self.runs
    }

    pub fn uploads(&self) -> &[AtlasUpload] {
        &self.uploads
    }

    /// Empty the batch without submitting anything.
    pub fn clear(&mut self) {
        self.vertices.clear();
        self.indices.clear();
        self.runs.clear();
        self.uploads.clear();
    }

    /// Quad with top-left at `(x, y)` before rotation, rotated by
    /// `angle` about its own center, then mapped by `transform`.
    pub fn add_rect(
        &mut self,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        angle: f32,
        color: Color,
        transform: &Affine2,
    ) {
        let width = width.max(0.0);
        let height = height.max(0.0);
        if width == 0.0 || height == 0.0 {
            return;
        }

        let rot = Affine2::rotation(angle);
        let (hw, hh) = (width / 2.0, height / 2.0);
        let (cx, cy) = (x + hw, y + hh);
        let rgba = color.to_array();

        let base = self.vertices.len() as u32;
        for (lx, ly) in [(-hw, -hh), (hw, -hh), (hw, hh), (-hw, hh)] {
            let r = rot.apply(lx, ly);
            let p = transform.apply(cx + r[0], cy + r[1]);
            self.vertices.push(Vertex {
                position: p,
                uv: [0.0, 0.0],
                color: rgba,
            });
        }
        self.indices
            .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        self.push_run(RunKind::Shape, 6);
    }

    /// Disk centered at `(x, y)`.
    pub fn add_circle(&mut self, x: f32, y: f32, r: f32, color: Color, transform: &Affine2) {
        if r <= 0.0 {
            return;
        }
        self.add_fan(x, y, r, circle_segments(r), color, transform);
    }

    /// Regular polygon centered at `(x, y)` with a vertex at angle 0.
    pub fn add_polygon(
        &mut self,
        x: f32,
        y: f32,
        r: f32,
        sides: u8,
        color: Color,
        transform: &Affine2,
    ) {
        if r <= 0.0 || sides < 3 {
            return;
        }
        self.add_fan(x, y, r, sides as u32, color, transform);
    }

    fn add_fan(&mut self, x: f32, y: f32, r: f32, segments: u32, color: Color, transform: &Affine2) {
        let rgba = color.to_array();
        let base = self.vertices.len() as u32;

        let center = transform.apply(x, y);
        self.vertices.push(Vertex {
            position: center,
            uv: [0.0, 0.0],
            color: rgba,
        });

        let step = std::f32::consts::TAU / segments as f32;
        for i in 0..segments {
            let theta = i as f32 * step;
            let p = transform.apply(x + theta.cos() * r, y + theta.sin() * r);
            self.vertices.push(Vertex {
                position: p,
                uv: [0.0, 0.0],
                color: rgba,
            });
        }

        for i in 0..segments {
            let next = (i + 1) % segments;
            self.indices
                .extend_from_slice(&[base, base + 1 + i, base + 1 + next]);
        }
        self.push_run(RunKind::Shape, segments * 3);
    }

    /// Append laid-out glyph quads, offset by `(x, y)` and mapped by
    /// `transform`. `uv` stays in texel space; the glyph shader divides
    /// by the atlas size at draw time, so later atlas growth cannot
    /// invalidate these records.
    pub fn add_glyphs(
        &mut self,
        font: Uuid,
        quads: &[GlyphQuad],
        x: f32,
        y: f32,
        color: Color,
        transform: &Affine2,
    ) {
        if quads.is_empty() {
            return;
        }
        let rgba = color.to_array();
        for q in quads {
            let base = self.vertices.len() as u32;
            let (u0, v0) = (q.uv.x as f32, q.uv.y as f32);
            let (u1, v1) = (u0 + q.uv.width as f32, v0 + q.uv.height as f32);
            let corners = [
                (q.x, q.y, u0, v0),
                (q.x + q.width, q.y, u1, v0),
                (q.x + q.width, q.y + q.height, u1, v1),
                (q.x, q.y + q.height, u0, v1),
            ];
            for (px, py, u, v) in corners {
                let p = transform.apply(x + px, y + py);
                self.vertices.push(Vertex {
                    position: p,
                    uv: [u, v],
                    color: rgba,
                });
            }
            self.indices
                .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }
        self.push_run(RunKind::Glyph { font }, quads.len() as u32 * 6);
    }

    /// Schedule a CPU atlas snapshot for upload at the next flush. A
    /// newer snapshot for the same font replaces an older pending one
    /// (the atlas only grows, so the newest is always a superset).
    pub fn push_atlas_upload(&mut self, upload: AtlasUpload) {
        if let Some(existing) = self.uploads.iter_mut().find(|u| u.font == upload.font) {
            *existing = upload;
        } else {
            self.uploads.push(upload);
        }
    }

    fn push_run(&mut self, kind: RunKind, index_count: u32) {
        if let Some(last) = self.runs.last_mut() {
            if last.kind == kind {
                last.index_count += index_count;
                return;
            }
        }
        let index_start = self.indices.len() as u32 - index_count;
        self.runs.push(DrawRun {
            kind,
            index_start,
            index_count,
        });
    }
}

// ===================================================================
// Tests
// ===================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use glaze_text::AtlasRect;
    use std::f32::consts::{FRAC_PI_2, PI};

    const EPS: f32 = 1e-4;

    fn bbox(vertices: &[Vertex]) -> (f32, f32, f32, f32) {
        let mut min = [f32::MAX, f32::MAX];
        let mut max = [f32::MIN, f32::MIN];
        for v in vertices {
            min[0] = min[0].min(v.position[0]);
            min[1] = min[1].min(v.position[1]);
            max[0] = max[0].max(v.position[0]);
            max[1] = max[1].max(v.position[1]);
        }
        (min[0], min[1], max[0], max[1])
    }

    #[test]
    fn test_axis_aligned_rect_bbox_is_exact() {
        let mut batch = Batch::new();
        batch.add_rect(10.0, 20.0, 30.0, 40.0, 0.0, Color::WHITE, &Affine2::IDENTITY);
        let (x0, y0, x1, y1) = bbox(batch.vertices());
        assert!((x0 - 10.0).abs() < EPS && (y0 - 20.0).abs() < EPS);
        assert!((x1 - 40.0).abs() < EPS && (y1 - 60.0).abs() < EPS);
        assert_eq!(batch.indices().len(), 6);
    }

    #[test]
    fn test_rotated_rect_preserves_center() {
        let mut batch = Batch::new();
        batch.add_rect(0.0, 0.0, 20.0, 10.0, 1.1, Color::WHITE, &Affine2::IDENTITY);
        let vs = batch.vertices();
        let cx: f32 = vs.iter().map(|v| v.position[0]).sum::<f32>() / 4.0;
        let cy: f32 = vs.iter().map(|v| v.position[1]).sum::<f32>() / 4.0;
        assert!((cx - 10.0).abs() < EPS);
        assert!((cy - 5.0).abs() < EPS);
    }

    #[test]
    fn test_rect_rotated_quarter_turn_swaps_extent() {
        let mut batch = Batch::new();
        batch.add_rect(0.0, 0.0, 20.0, 10.0, FRAC_PI_2, Color::WHITE, &Affine2::IDENTITY);
        let (x0, y0, x1, y1) = bbox(batch.vertices());
        assert!((x1 - x0 - 10.0).abs() < EPS);
        assert!((y1 - y0 - 20.0).abs() < EPS);
    }

    #[test]
    fn test_full_turn_equals_no_rotation() {
        let mut a = Batch::new();
        let mut b = Batch::new();
        a.add_rect(3.0, 4.0, 5.0, 6.0, 0.0, Color::WHITE, &Affine2::IDENTITY);
        b.add_rect(3.0, 4.0, 5.0, 6.0, 2.0 * PI, Color::WHITE, &Affine2::IDENTITY);
        for (va, vb) in a.vertices().iter().zip(b.vertices()) {
            assert!((va.position[0] - vb.position[0]).abs() < 1e-3);
            assert!((va.position[1] - vb.position[1]).abs() < 1e-3);
        }
    }

    #[test]
    fn test_degenerate_rect_records_nothing() {
        let mut batch = Batch::new();
        batch.add_rect(0.0, 0.0, -5.0, 10.0, 0.0, Color::WHITE, &Affine2::IDENTITY);
        batch.add_rect(0.0, 0.0, 10.0, 0.0, 0.0, Color::WHITE, &Affine2::IDENTITY);
        assert!(batch.is_empty());
    }

    #[test]
    fn test_circle_bbox_and_vertex_count() {
        let mut batch = Batch::new();
        batch.add_circle(100.0, 50.0, 10.0, Color::WHITE, &Affine2::IDENTITY);
        // Small radius: 32 segments (divisible by 4, so the extremes
        // land exactly on the axes) plus the center vertex.
        assert_eq!(batch.vertices().len(), 33);
        let (x0, y0, x1, y1) = bbox(batch.vertices());
        assert!((x0 - 90.0).abs() < EPS && (x1 - 110.0).abs() < EPS);
        assert!((y0 - 40.0).abs() < EPS && (y1 - 60.0).abs() < EPS);
    }

    #[test]
    fn test_circle_segments_scale_with_radius() {
        assert_eq!(circle_segments(1.0), 32);
        assert!(circle_segments(200.0) > 32);
    }

    #[test]
    fn test_negative_radius_records_nothing() {
        let mut batch = Batch::new();
        batch.add_circle(0.0, 0.0, -1.0, Color::WHITE, &Affine2::IDENTITY);
        batch.add_circle(0.0, 0.0, 0.0, Color::WHITE, &Affine2::IDENTITY);
        assert!(batch.is_empty());
    }

    #[test]
    fn test_polygon_needs_three_sides() {
        let mut batch = Batch::new();
        batch.add_polygon(0.0, 0.0, 10.0, 2, Color::WHITE, &Affine2::IDENTITY);
        assert!(batch.is_empty());
        batch.add_polygon(0.0, 0.0, 10.0, 3, Color::WHITE, &Affine2::IDENTITY);
        assert_eq!(batch.vertices().len(), 4);
        assert_eq!(batch.indices().len(), 9);
    }

    #[test]
    fn test_transform_applies_to_geometry() {
        let mut batch = Batch::new();
        let t = Affine2::translation(100.0, 200.0);
        batch.add_rect(0.0, 0.0, 10.0, 10.0, 0.0, Color::WHITE, &t);
        let (x0, y0, _, _) = bbox(batch.vertices());
        assert!((x0 - 100.0).abs() < EPS && (y0 - 200.0).abs() < EPS);
    }

    #[test]
    fn test_consecutive_shapes_merge_into_one_run() {
        let mut batch = Batch::new();
        batch.add_rect(0.0, 0.0, 1.0, 1.0, 0.0, Color::WHITE, &Affine2::IDENTITY);
        batch.add_circle(5.0, 5.0, 2.0, Color::WHITE, &Affine2::IDENTITY);
        batch.add_rect(9.0, 9.0, 1.0, 1.0, 0.0, Color::WHITE, &Affine2::IDENTITY);
        assert_eq!(batch.runs().len(), 1);
        assert_eq!(
            batch.runs()[0].index_count as usize,
            batch.indices().len()
        );
    }

    #[test]
    fn test_glyph_run_breaks_shape_run_in_order() {
        let font = Uuid::new_v4();
        let quad = GlyphQuad {
            x: 0.0,
            y: 0.0,
            width: 8.0,
            height: 8.0,
            uv: AtlasRect { x: 0, y: 0, width: 8, height: 8 },
        };
        let mut batch = Batch::new();
        batch.add_rect(0.0, 0.0, 1.0, 1.0, 0.0, Color::WHITE, &Affine2::IDENTITY);
        batch.add_glyphs(font, &[quad], 10.0, 10.0, Color::BLACK, &Affine2::IDENTITY);
        batch.add_rect(2.0, 2.0, 1.0, 1.0, 0.0, Color::WHITE, &Affine2::IDENTITY);

        let runs = batch.runs();
        assert_eq!(runs.len(), 3);
        assert_eq!(runs[0].kind, RunKind::Shape);
        assert_eq!(runs[1].kind, RunKind::Glyph { font });
        assert_eq!(runs[2].kind, RunKind::Shape);
        // Runs tile the index buffer in order.
        assert_eq!(runs[0].index_start, 0);
        assert_eq!(runs[1].index_start, 6);
        assert_eq!(runs[2].index_start, 12);
    }

    #[test]
    fn test_glyph_quad_positions_offset_by_origin() {
        let font = Uuid::new_v4();
        let quad = GlyphQuad {
            x: 2.0,
            y: 3.0,
            width: 4.0,
            height: 5.0,
            uv: AtlasRect { x: 16, y: 32, width: 4, height: 5 },
        };
        let mut batch = Batch::new();
        batch.add_glyphs(font, &[quad], 100.0, 200.0, Color::WHITE, &Affine2::IDENTITY);
        let v0 = batch.vertices()[0];
        assert_eq!(v0.position, [102.0, 203.0]);
        assert_eq!(v0.uv, [16.0, 32.0]);
    }

    #[test]
    fn test_atlas_upload_dedupes_by_font() {
        let font = Uuid::new_v4();
        let mut batch = Batch::new();
        batch.push_atlas_upload(AtlasUpload {
            font,
            size: 256,
            version: 1,
            pixels: vec![0; 256 * 256],
        });
        batch.push_atlas_upload(AtlasUpload {
            font,
            size: 512,
            version: 3,
            pixels: vec![0; 512 * 512],
        });
        assert_eq!(batch.uploads().len(), 1);
        assert_eq!(batch.uploads()[0].version, 3);
        assert_eq!(batch.uploads()[0].size, 512);
    }

    #[test]
    fn test_clear_empties_everything() {
        let mut batch = Batch::new();
        batch.add_rect(0.0, 0.0, 1.0, 1.0, 0.0, Color::WHITE, &Affine2::IDENTITY);
        batch.push_atlas_upload(AtlasUpload {
            font: Uuid::new_v4(),
            size: 256,
            version: 1,
            pixels: Vec::new(),
        });
        batch.clear();
        assert!(batch.is_empty());
        assert!(batch.vertices().is_empty());
        assert!(batch.indices().is_empty());
    }
}
