//! Painter facade — the public drawing surface.
//!
//! A `Surface` ties together one transform stack, one command batch,
//! and one GPU backend, and tracks the context-loss state machine:
//!
//! ```text
//! Ready --flush--> Ready | Lost
//! Lost  --regen--> Ready
//! any   --destroy--> Destroyed (terminal)
//! ```
//!
//! Drawing while `Lost` is permitted (commands accumulate normally)
//! but flushes return [`FlushResult::Lost`] without touching the GPU
//! until [`Surface::regen`] succeeds. One frame producer per surface;
//! sharing across threads needs external synchronization.

use std::ffi::c_void;

use log::warn;
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};
use uuid::Uuid;

use glaze_text::{layout_text, FontAsset};

use crate::batch::{AtlasUpload, Batch};
use crate::color::Color;
use crate::context::{BackendError, FlushResult, GlContext};
use crate::transform::{TransformError, TransformStack};

/// GPU operations the facade drives. [`GlContext`] is the production
/// implementation; the seam keeps the state machine independent of GL.
pub trait PaintBackend {
    fn set_clear_color(&mut self, color: Color);
    fn resize(&mut self, width: u32, height: u32);
    /// `(size, version)` of the backend's copy of a font atlas.
    fn atlas_state(&self, font: Uuid) -> Option<(u32, u64)>;
    fn release_font(&mut self, font: Uuid);
    fn flush(&mut self, batch: &Batch) -> FlushResult;
    fn regen(&mut self) -> Result<(), BackendError>;
    fn destroy(&mut self);
}

impl PaintBackend for GlContext {
    fn set_clear_color(&mut self, color: Color) {
        GlContext::set_clear_color(self, color);
    }

    fn resize(&mut self, width: u32, height: u32) {
        GlContext::resize(self, width, height);
    }

    fn atlas_state(&self, font: Uuid) -> Option<(u32, u64)> {
        GlContext::atlas_state(self, font)
    }

    fn release_font(&mut self, font: Uuid) {
        GlContext::release_font(self, font);
    }

    fn flush(&mut self, batch: &Batch) -> FlushResult {
        GlContext::flush(self, batch)
    }

    fn regen(&mut self) -> Result<(), BackendError> {
        GlContext::regen(self)
    }

    fn destroy(&mut self) {
        GlContext::destroy(self);
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SurfaceState {
    Ready,
    Lost,
    Destroyed,
}

pub struct Surface<B: PaintBackend = GlContext> {
    context: B,
    transforms: TransformStack,
    batch: Batch,
    state: SurfaceState,
}

impl Surface {
    /// Build on a GL context the host already made current.
    ///
    /// # Safety
    ///
    /// See [`GlContext::from_loader`].
    pub unsafe fn from_loader<F>(loader: F) -> Result<Self, BackendError>
    where
        F: FnMut(&str) -> *const c_void,
    {
        Ok(Self::with_backend(GlContext::from_loader(loader)?))
    }

    /// Build an owned context and swap chain on a native window.
    ///
    /// # Safety
    ///
    /// See [`GlContext::from_native_window`].
    pub unsafe fn from_native_window(
        display: RawDisplayHandle,
        window: RawWindowHandle,
        width: u32,
        height: u32,
    ) -> Result<Self, BackendError> {
        Ok(Self::with_backend(GlContext::from_native_window(
            display, window, width, height,
        )?))
    }
}

impl<B: PaintBackend> Surface<B> {
    fn with_backend(context: B) -> Self {
        Self {
            context,
            transforms: TransformStack::new(),
            batch: Batch::new(),
            state: SurfaceState::Ready,
        }
    }

    pub fn state(&self) -> SurfaceState {
        self.state
    }

    // ─── Drawing ────────────────────────────────────────────────────

    /// Rectangle with top-left at `(x, y)`, rotated by `angle` about
    /// its center, under the current transform.
    pub fn rect(&mut self, x: f32, y: f32, width: f32, height: f32, angle: f32, color: Color) {
        let t = *self.transforms.current();
        self.batch.add_rect(x, y, width, height, angle, color, &t);
    }

    pub fn circle(&mut self, x: f32, y: f32, r: f32, color: Color) {
        let t = *self.transforms.current();
        self.batch.add_circle(x, y, r, color, &t);
    }

    pub fn polygon(&mut self, x: f32, y: f32, r: f32, sides: u8, color: Color) {
        let t = *self.transforms.current();
        self.batch.add_polygon(x, y, r, sides, color, &t);
    }

    /// Draw `text` with its top-left at `(x, y)`. New glyphs are
    /// rasterized into the font's atlas; if that changed the atlas (or
    /// the GPU copy is stale, for instance after a regen) a fresh
    /// snapshot is staged for upload at the next flush.
    pub fn fill_text(
        &mut self,
        font: &mut FontAsset,
        text: &str,
        x: f32,
        y: f32,
        size: f32,
        color: Color,
        wrap_width: f32,
    ) {
        let quads = layout_text(font, text, size, wrap_width);
        if quads.is_empty() {
            return;
        }

        let atlas = font.atlas();
        if self.context.atlas_state(font.id()) != Some((atlas.size(), atlas.version())) {
            self.batch.push_atlas_upload(AtlasUpload {
                font: font.id(),
                size: atlas.size(),
                version: atlas.version(),
                pixels: atlas.pixels().to_vec(),
            });
        }

        let t = *self.transforms.current();
        self.batch.add_glyphs(font.id(), &quads, x, y, color, &t);
    }

    // ─── Transform stack ────────────────────────────────────────────

    pub fn save(&mut self) -> Result<(), TransformError> {
        self.transforms.save()
    }

    pub fn restore(&mut self) -> Result<(), TransformError> {
        self.transforms.restore()
    }

    pub fn translate(&mut self, dx: f32, dy: f32) {
        self.transforms.translate(dx, dy);
    }

    pub fn rotate(&mut self, theta: f32) {
        self.transforms.rotate(theta);
    }

    pub fn scale(&mut self, sx: f32, sy: f32) {
        self.transforms.scale(sx, sy);
    }

    pub fn reset(&mut self) {
        self.transforms.reset();
    }

    // ─── Frame control ──────────────────────────────────────────────

    pub fn set_clear_color(&mut self, color: Color) {
        self.context.set_clear_color(color);
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if self.state == SurfaceState::Destroyed {
            return;
        }
        self.context.resize(width, height);
    }

    /// Abandon the pending frame without submitting it.
    pub fn clear(&mut self) {
        self.batch.clear();
    }

    /// Submit and present the pending frame. The batch is emptied on
    /// every outcome; on `Lost` the surface stays lost until
    /// [`Surface::regen`].
    pub fn flush(&mut self) -> FlushResult {
        match self.state {
            SurfaceState::Destroyed => {
                self.batch.clear();
                return FlushResult::Error(BackendError::Destroyed);
            }
            SurfaceState::Lost => {
                self.batch.clear();
                return FlushResult::Lost;
            }
            SurfaceState::Ready => {}
        }

        let result = self.context.flush(&self.batch);
        self.batch.clear();
        match &result {
            FlushResult::Lost => {
                warn!("surface lost its GL context; call regen() to recover");
                self.state = SurfaceState::Lost;
            }
            FlushResult::Error(e) => {
                warn!("flush failed (transient): {e}");
            }
            FlushResult::Ok(_) => {}
        }
        result
    }

    /// Rebuild GPU state after a context loss.
    pub fn regen(&mut self) -> Result<(), BackendError> {
        if self.state == SurfaceState::Destroyed {
            return Err(BackendError::Destroyed);
        }
        self.context.regen()?;
        self.state = SurfaceState::Ready;
        Ok(())
    }

    /// Drop the GPU atlas texture for a font no longer in use. The
    /// caller keeps ownership of the asset itself.
    pub fn release_font(&mut self, font: &FontAsset) {
        if self.state == SurfaceState::Destroyed {
            return;
        }
        self.context.release_font(font.id());
    }

    /// Release all GPU resources. Terminal and idempotent; also run
    /// when the surface drops.
    pub fn destroy(&mut self) {
        self.batch.clear();
        self.context.destroy();
        self.state = SurfaceState::Destroyed;
    }
}

// ===================================================================
// Tests
// ===================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::FrameStats;
    use std::collections::VecDeque;

    /// Backend that plays back scripted flush results and records what
    /// reached it.
    #[derive(Default)]
    struct ScriptedBackend {
        script: VecDeque<FlushResult>,
        flushes: usize,
        last_vertices: usize,
        regens: usize,
        destroyed: bool,
    }

    impl PaintBackend for ScriptedBackend {
        fn set_clear_color(&mut self, _color: Color) {}

        fn resize(&mut self, _width: u32, _height: u32) {}

        fn atlas_state(&self, _font: Uuid) -> Option<(u32, u64)> {
            None
        }

        fn release_font(&mut self, _font: Uuid) {}

        fn flush(&mut self, batch: &Batch) -> FlushResult {
            self.flushes += 1;
            self.last_vertices = batch.vertices().len();
            self.script
                .pop_front()
                .unwrap_or(FlushResult::Ok(FrameStats::default()))
        }

        fn regen(&mut self) -> Result<(), BackendError> {
            self.regens += 1;
            Ok(())
        }

        fn destroy(&mut self) {
            self.destroyed = true;
        }
    }

    fn scripted(script: Vec<FlushResult>) -> Surface<ScriptedBackend> {
        Surface::with_backend(ScriptedBackend {
            script: script.into(),
            ..Default::default()
        })
    }

    #[test]
    fn test_successful_flush_consumes_the_batch() {
        let mut surface = scripted(vec![]);
        surface.rect(0.0, 0.0, 10.0, 10.0, 0.0, Color::WHITE);
        assert!(matches!(surface.flush(), FlushResult::Ok(_)));
        assert_eq!(surface.context.last_vertices, 4);
        assert_eq!(surface.state(), SurfaceState::Ready);

        // Nothing new drawn: the next flush submits zero vertices.
        assert!(matches!(surface.flush(), FlushResult::Ok(_)));
        assert_eq!(surface.context.last_vertices, 0);
    }

    #[test]
    fn test_lost_flush_clears_and_latches() {
        let mut surface = scripted(vec![FlushResult::Lost]);
        surface.rect(0.0, 0.0, 10.0, 10.0, 0.0, Color::WHITE);
        assert!(matches!(surface.flush(), FlushResult::Lost));
        assert_eq!(surface.state(), SurfaceState::Lost);
        assert_eq!(surface.context.flushes, 1);

        // While lost, flushes short-circuit without reaching the
        // backend, and pending geometry keeps getting dropped.
        surface.circle(5.0, 5.0, 2.0, Color::WHITE);
        assert!(matches!(surface.flush(), FlushResult::Lost));
        assert_eq!(surface.context.flushes, 1);
    }

    #[test]
    fn test_regen_restores_ready_and_flushing_resumes() {
        let mut surface = scripted(vec![FlushResult::Lost]);
        surface.rect(0.0, 0.0, 10.0, 10.0, 0.0, Color::WHITE);
        assert!(matches!(surface.flush(), FlushResult::Lost));

        surface.regen().unwrap();
        assert_eq!(surface.state(), SurfaceState::Ready);
        assert_eq!(surface.context.regens, 1);

        surface.rect(0.0, 0.0, 10.0, 10.0, 0.0, Color::WHITE);
        assert!(matches!(surface.flush(), FlushResult::Ok(_)));
        assert_eq!(surface.context.flushes, 2);
        // Only the redrawn frame reached the backend, not the one
        // pending when the context was lost.
        assert_eq!(surface.context.last_vertices, 4);
    }

    #[test]
    fn test_transient_error_does_not_latch() {
        let mut surface = scripted(vec![FlushResult::Error(BackendError::Allocation(
            "out of memory".to_string(),
        ))]);
        surface.rect(0.0, 0.0, 10.0, 10.0, 0.0, Color::WHITE);
        assert!(matches!(surface.flush(), FlushResult::Error(_)));
        // Still Ready: the caller just draws the next frame.
        assert_eq!(surface.state(), SurfaceState::Ready);
        assert!(matches!(surface.flush(), FlushResult::Ok(_)));
        assert_eq!(surface.context.last_vertices, 0);
    }

    #[test]
    fn test_destroyed_is_terminal() {
        let mut surface = scripted(vec![]);
        surface.destroy();
        assert_eq!(surface.state(), SurfaceState::Destroyed);
        assert!(surface.context.destroyed);

        surface.rect(0.0, 0.0, 10.0, 10.0, 0.0, Color::WHITE);
        assert!(matches!(
            surface.flush(),
            FlushResult::Error(BackendError::Destroyed)
        ));
        assert!(matches!(surface.regen(), Err(BackendError::Destroyed)));
        assert_eq!(surface.context.flushes, 0);
        assert_eq!(surface.context.regens, 0);

        // Idempotent.
        surface.destroy();
        assert_eq!(surface.state(), SurfaceState::Destroyed);
    }

    #[test]
    fn test_drawing_goes_through_the_transform_stack() {
        let mut surface = scripted(vec![]);
        surface.translate(100.0, 0.0);
        surface.save().unwrap();
        surface.translate(0.0, 50.0);
        surface.restore().unwrap();
        surface.rect(0.0, 0.0, 10.0, 10.0, 0.0, Color::WHITE);
        // The batch holds transformed vertices; the restore above
        // dropped the second translation.
        let v = surface.batch.vertices()[0];
        assert_eq!(v.position, [100.0, 0.0]);
    }
}
