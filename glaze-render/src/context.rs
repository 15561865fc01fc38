//! GL context — owns the glow handle, both pipelines, the shared
//! geometry buffers, and the per-font atlas textures.
//!
//! Two construction paths:
//!
//! 1. **Loader** (`GlContext::from_loader`) — the host has already made
//!    a GL context current and hands over a `name -> address` resolver.
//!    Presentation stays with the host.
//!
//! 2. **Native window** (`GlContext::from_native_window`) — raw display
//!    and window handles; the context builds its own EGL display,
//!    config, context, and swap-chain surface via glutin, and `flush`
//!    presents with `swap_buffers`.
//!
//! Context loss is reported through [`FlushResult::Lost`], never a
//! panic. After a loss, [`GlContext::regen`] rebuilds programs and
//! buffers and drops the atlas textures; their CPU copies are
//! re-uploaded on the next glyph draw.

use std::collections::HashMap;
use std::ffi::c_void;
use std::num::NonZeroU32;

use glow::HasContext;
use glutin::config::ConfigTemplateBuilder;
use glutin::context::{ContextAttributesBuilder, NotCurrentGlContext, PossiblyCurrentContext};
use glutin::display::{Display, DisplayApiPreference, GlDisplay};
use glutin::surface::{GlSurface, SurfaceAttributesBuilder, WindowSurface};
use log::{debug, info, warn};
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};
use thiserror::Error;
use uuid::Uuid;

use crate::batch::{AtlasUpload, Batch, RunKind, Vertex};
use crate::color::Color;
use crate::pipelines::{orthographic, GlyphPipeline, ShapePipeline};

/// `GL_CONTEXT_LOST`, reported by `glGetError` on drivers with
/// robustness-style resets.
const GL_CONTEXT_LOST: u32 = 0x0507;

/// Bound on error-queue draining; some drivers keep reporting the same
/// error indefinitely.
const MAX_ERROR_DRAIN: usize = 16;

/// Drain the GL error queue and report whether a context loss was
/// among the entries. A loss can sit behind unrelated queued errors,
/// so a single poll is not enough; unrelated entries are logged and
/// discarded.
fn error_queue_reports_loss(mut poll: impl FnMut() -> u32) -> bool {
    for _ in 0..MAX_ERROR_DRAIN {
        match poll() {
            glow::NO_ERROR => return false,
            GL_CONTEXT_LOST => return true,
            other => warn!("GL error during submission: 0x{other:04x}"),
        }
    }
    false
}

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("unsupported OpenGL version: {0}")]
    Version(String),
    #[error("shader compilation failed: {0}")]
    ShaderCompile(String),
    #[error("program link failed: {0}")]
    Link(String),
    #[error("GL resource allocation failed: {0}")]
    Allocation(String),
    #[error("window surface error: {0}")]
    Window(String),
    #[error("surface already destroyed")]
    Destroyed,
}

/// Per-frame submission counters.
#[derive(Clone, Copy, Debug, Default)]
pub struct FrameStats {
    pub draw_calls: u32,
    pub vertices: u32,
    pub indices: u32,
}

/// Outcome of a flush. `Lost` is a first-class status, not an error:
/// the caller clears its batch, calls [`GlContext::regen`], and redraws.
#[derive(Debug)]
pub enum FlushResult {
    Ok(FrameStats),
    Lost,
    Error(BackendError),
}

/// GPU copy of one font's atlas, keyed by the asset's id.
struct AtlasTexture {
    texture: glow::NativeTexture,
    size: u32,
    version: u64,
}

/// Owned EGL objects for the native-window path. Dropping them tears
/// the EGL state down in field order: surface before context before
/// display.
struct OwnedWindow {
    surface: glutin::surface::Surface<WindowSurface>,
    context: PossiblyCurrentContext,
    _display: Display,
}

pub struct GlContext {
    gl: glow::Context,
    window: Option<OwnedWindow>,
    shape: ShapePipeline,
    glyph: GlyphPipeline,
    vao: glow::NativeVertexArray,
    vbo: glow::NativeBuffer,
    ebo: glow::NativeBuffer,
    atlases: HashMap<Uuid, AtlasTexture>,
    clear_color: Color,
    width: u32,
    height: u32,
    destroyed: bool,
}

impl GlContext {
    /// Build on a GL context the host already made current.
    ///
    /// # Safety
    ///
    /// A GL context must be current on this thread, and `loader` must
    /// resolve entry points for that context. The returned value must
    /// only be used while that context remains current.
    pub unsafe fn from_loader<F>(loader: F) -> Result<Self, BackendError>
    where
        F: FnMut(&str) -> *const c_void,
    {
        let gl = glow::Context::from_loader_function(loader);
        // The host sized the drawable; start from its viewport.
        let mut vp = [0i32; 4];
        gl.get_parameter_i32_slice(glow::VIEWPORT, &mut vp);
        Self::with_gl(gl, None, vp[2].max(0) as u32, vp[3].max(0) as u32)
    }

    /// Build an owned EGL context and swap chain on a native window.
    ///
    /// # Safety
    ///
    /// `display` and `window` must be valid platform handles and must
    /// outlive the returned context.
    pub unsafe fn from_native_window(
        display: RawDisplayHandle,
        window: RawWindowHandle,
        width: u32,
        height: u32,
    ) -> Result<Self, BackendError> {
        let window_err = |e: glutin::error::Error| BackendError::Window(e.to_string());

        let egl = Display::new(display, DisplayApiPreference::Egl).map_err(window_err)?;
        let config = egl
            .find_configs(ConfigTemplateBuilder::new().build())
            .map_err(window_err)?
            .next()
            .ok_or_else(|| BackendError::Window("no matching EGL config".to_string()))?;

        let attrs = ContextAttributesBuilder::new().build(Some(window));
        let not_current = egl.create_context(&config, &attrs).map_err(window_err)?;

        let w = NonZeroU32::new(width.max(1)).unwrap_or(NonZeroU32::MIN);
        let h = NonZeroU32::new(height.max(1)).unwrap_or(NonZeroU32::MIN);
        let surface_attrs = SurfaceAttributesBuilder::<WindowSurface>::new().build(window, w, h);
        let surface = egl
            .create_window_surface(&config, &surface_attrs)
            .map_err(window_err)?;
        let context = not_current.make_current(&surface).map_err(window_err)?;

        let gl = glow::Context::from_loader_function_cstr(|name| egl.get_proc_address(name));
        let owned = OwnedWindow {
            surface,
            context,
            _display: egl,
        };
        Self::with_gl(gl, Some(owned), width, height)
    }

    fn with_gl(
        gl: glow::Context,
        window: Option<OwnedWindow>,
        width: u32,
        height: u32,
    ) -> Result<Self, BackendError> {
        let version = gl.version();
        if version.major < 3 {
            return Err(BackendError::Version(format!(
                "need GL 3.0+ / GLSL 330, got {}.{}{}",
                version.major,
                version.minor,
                if version.is_embedded { " ES" } else { "" },
            )));
        }
        info!(
            "GL context initialized: {} ({}x{})",
            unsafe { gl.get_parameter_string(glow::VERSION) },
            width,
            height,
        );

        unsafe {
            gl.enable(glow::BLEND);
            gl.blend_func(glow::SRC_ALPHA, glow::ONE_MINUS_SRC_ALPHA);
        }

        let (shape, glyph, vao, vbo, ebo) = Self::build_objects(&gl)?;
        Ok(Self {
            gl,
            window,
            shape,
            glyph,
            vao,
            vbo,
            ebo,
            atlases: HashMap::new(),
            clear_color: Color::BLACK,
            width,
            height,
            destroyed: false,
        })
    }

    /// Compile both pipelines and set up the shared vertex layout.
    fn build_objects(
        gl: &glow::Context,
    ) -> Result<
        (
            ShapePipeline,
            GlyphPipeline,
            glow::NativeVertexArray,
            glow::NativeBuffer,
            glow::NativeBuffer,
        ),
        BackendError,
    > {
        let shape = ShapePipeline::new(gl)?;
        let glyph = GlyphPipeline::new(gl)?;
        unsafe {
            let vao = gl.create_vertex_array().map_err(BackendError::Allocation)?;
            gl.bind_vertex_array(Some(vao));
            let vbo = gl.create_buffer().map_err(BackendError::Allocation)?;
            gl.bind_buffer(glow::ARRAY_BUFFER, Some(vbo));
            let ebo = gl.create_buffer().map_err(BackendError::Allocation)?;
            gl.bind_buffer(glow::ELEMENT_ARRAY_BUFFER, Some(ebo));

            let stride = std::mem::size_of::<Vertex>() as i32;
            gl.enable_vertex_attrib_array(0);
            gl.vertex_attrib_pointer_f32(0, 2, glow::FLOAT, false, stride, 0);
            gl.enable_vertex_attrib_array(1);
            gl.vertex_attrib_pointer_f32(1, 2, glow::FLOAT, false, stride, 8);
            gl.enable_vertex_attrib_array(2);
            gl.vertex_attrib_pointer_f32(2, 4, glow::FLOAT, false, stride, 16);

            Ok((shape, glyph, vao, vbo, ebo))
        }
    }

    pub fn set_clear_color(&mut self, color: Color) {
        self.clear_color = color;
    }

    /// Update the drawable size. Applied to the viewport at the next
    /// flush; the owned swap-chain surface (if any) resizes now.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.width = width;
        self.height = height;
        if let Some(win) = &self.window {
            let w = NonZeroU32::new(width).unwrap_or(NonZeroU32::MIN);
            let h = NonZeroU32::new(height).unwrap_or(NonZeroU32::MIN);
            win.surface.resize(&win.context, w, h);
        }
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// `(size, version)` of the GPU copy of a font's atlas, if one has
    /// been uploaded. The caller compares against the CPU atlas to
    /// decide whether a flush needs fresh pixels.
    pub fn atlas_state(&self, font: Uuid) -> Option<(u32, u64)> {
        self.atlases.get(&font).map(|t| (t.size, t.version))
    }

    /// Drop the GPU atlas texture for a font.
    pub fn release_font(&mut self, font: Uuid) {
        if let Some(atlas) = self.atlases.remove(&font) {
            unsafe {
                self.gl.delete_texture(atlas.texture);
            }
        }
    }

    /// Clear, submit every run in order, and present (owned-window
    /// mode). The batch is not consumed; the caller clears it based on
    /// the result.
    pub fn flush(&mut self, batch: &Batch) -> FlushResult {
        if self.destroyed {
            return FlushResult::Error(BackendError::Destroyed);
        }
        let gl = &self.gl;

        unsafe {
            gl.viewport(0, 0, self.width as i32, self.height as i32);
            let c = self.clear_color;
            gl.clear_color(c.r, c.g, c.b, c.a);
            gl.clear(glow::COLOR_BUFFER_BIT);
        }

        for upload in batch.uploads() {
            if let Err(e) = self.apply_atlas_upload(upload) {
                // An upload that failed because the context is gone
                // must surface as Lost, or the caller would retry
                // forever instead of regenerating.
                if error_queue_reports_loss(|| unsafe { self.gl.get_error() }) {
                    warn!("GL context lost during atlas upload");
                    return FlushResult::Lost;
                }
                return FlushResult::Error(e);
            }
        }

        let gl = &self.gl;
        let stats = FrameStats {
            draw_calls: batch.runs().len() as u32,
            vertices: batch.vertices().len() as u32,
            indices: batch.indices().len() as u32,
        };

        if !batch.runs().is_empty() {
            unsafe {
                gl.bind_vertex_array(Some(self.vao));
                gl.bind_buffer(glow::ARRAY_BUFFER, Some(self.vbo));
                gl.buffer_data_u8_slice(
                    glow::ARRAY_BUFFER,
                    bytemuck::cast_slice(batch.vertices()),
                    glow::STREAM_DRAW,
                );
                gl.bind_buffer(glow::ELEMENT_ARRAY_BUFFER, Some(self.ebo));
                gl.buffer_data_u8_slice(
                    glow::ELEMENT_ARRAY_BUFFER,
                    bytemuck::cast_slice(batch.indices()),
                    glow::STREAM_DRAW,
                );
            }

            let projection = orthographic(self.width as f32, self.height as f32);
            for run in batch.runs() {
                match run.kind {
                    RunKind::Shape => self.shape.bind(gl, &projection),
                    RunKind::Glyph { font } => {
                        let Some(atlas) = self.atlases.get(&font) else {
                            // No upload was staged for this font; skip
                            // the run rather than sample garbage.
                            warn!("glyph run references unknown font atlas {font}");
                            continue;
                        };
                        self.glyph.bind(gl, &projection, atlas.size as f32);
                        unsafe {
                            gl.active_texture(glow::TEXTURE0);
                            gl.bind_texture(glow::TEXTURE_2D, Some(atlas.texture));
                        }
                    }
                }
                unsafe {
                    gl.draw_elements(
                        glow::TRIANGLES,
                        run.index_count as i32,
                        glow::UNSIGNED_INT,
                        run.index_start as i32 * 4,
                    );
                }
            }
        }

        if error_queue_reports_loss(|| unsafe { gl.get_error() }) {
            warn!("GL context lost during submission");
            return FlushResult::Lost;
        }

        if let Some(win) = &self.window {
            if let Err(e) = win.surface.swap_buffers(&win.context) {
                if e.error_kind() == glutin::error::ErrorKind::ContextLost {
                    warn!("GL context lost on present");
                    return FlushResult::Lost;
                }
                return FlushResult::Error(BackendError::Window(e.to_string()));
            }
        }

        FlushResult::Ok(stats)
    }

    /// Create or refresh the GPU texture for one font's atlas.
    fn apply_atlas_upload(&mut self, upload: &AtlasUpload) -> Result<(), BackendError> {
        let gl = &self.gl;
        let current = self.atlases.get_mut(&upload.font);

        match current {
            Some(atlas) if atlas.size == upload.size => {
                if atlas.version >= upload.version {
                    return Ok(());
                }
                debug!(
                    "atlas refresh for font {} (v{} -> v{})",
                    upload.font, atlas.version, upload.version
                );
                unsafe {
                    gl.bind_texture(glow::TEXTURE_2D, Some(atlas.texture));
                    gl.pixel_store_i32(glow::UNPACK_ALIGNMENT, 1);
                    gl.tex_sub_image_2d(
                        glow::TEXTURE_2D,
                        0,
                        0,
                        0,
                        upload.size as i32,
                        upload.size as i32,
                        glow::RED,
                        glow::UNSIGNED_BYTE,
                        glow::PixelUnpackData::Slice(&upload.pixels),
                    );
                }
                atlas.version = upload.version;
                Ok(())
            }
            _ => {
                // First upload, or the atlas grew: (re)allocate.
                if let Some(old) = self.atlases.remove(&upload.font) {
                    unsafe {
                        gl.delete_texture(old.texture);
                    }
                }
                debug!(
                    "atlas texture for font {} ({size}x{size} v{version})",
                    upload.font,
                    size = upload.size,
                    version = upload.version,
                );
                let texture = unsafe {
                    let texture = gl.create_texture().map_err(BackendError::Allocation)?;
                    gl.bind_texture(glow::TEXTURE_2D, Some(texture));
                    gl.tex_parameter_i32(
                        glow::TEXTURE_2D,
                        glow::TEXTURE_MIN_FILTER,
                        glow::LINEAR as i32,
                    );
                    gl.tex_parameter_i32(
                        glow::TEXTURE_2D,
                        glow::TEXTURE_MAG_FILTER,
                        glow::LINEAR as i32,
                    );
                    gl.tex_parameter_i32(
                        glow::TEXTURE_2D,
                        glow::TEXTURE_WRAP_S,
                        glow::CLAMP_TO_EDGE as i32,
                    );
                    gl.tex_parameter_i32(
                        glow::TEXTURE_2D,
                        glow::TEXTURE_WRAP_T,
                        glow::CLAMP_TO_EDGE as i32,
                    );
                    gl.pixel_store_i32(glow::UNPACK_ALIGNMENT, 1);
                    gl.tex_image_2d(
                        glow::TEXTURE_2D,
                        0,
                        glow::R8 as i32,
                        upload.size as i32,
                        upload.size as i32,
                        0,
                        glow::RED,
                        glow::UNSIGNED_BYTE,
                        Some(&upload.pixels),
                    );
                    texture
                };
                self.atlases.insert(
                    upload.font,
                    AtlasTexture {
                        texture,
                        size: upload.size,
                        version: upload.version,
                    },
                );
                Ok(())
            }
        }
    }

    /// Rebuild programs and buffers after a context loss, dropping the
    /// atlas textures. Their CPU copies are re-staged by the next glyph
    /// draw. Idempotent when nothing was lost.
    pub fn regen(&mut self) -> Result<(), BackendError> {
        if self.destroyed {
            return Err(BackendError::Destroyed);
        }
        debug!("regenerating GPU objects");
        self.release_gpu_objects();
        let (shape, glyph, vao, vbo, ebo) = Self::build_objects(&self.gl)?;
        self.shape = shape;
        self.glyph = glyph;
        self.vao = vao;
        self.vbo = vbo;
        self.ebo = ebo;
        unsafe {
            self.gl.enable(glow::BLEND);
            self.gl.blend_func(glow::SRC_ALPHA, glow::ONE_MINUS_SRC_ALPHA);
        }
        Ok(())
    }

    /// Release every GL object. Idempotent; also run on Drop. The
    /// owned EGL state (if any) is torn down when the context drops.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.release_gpu_objects();
        self.destroyed = true;
    }

    fn release_gpu_objects(&mut self) {
        let gl = &self.gl;
        self.shape.destroy(gl);
        self.glyph.destroy(gl);
        unsafe {
            gl.delete_vertex_array(self.vao);
            gl.delete_buffer(self.vbo);
            gl.delete_buffer(self.ebo);
        }
        for (_, atlas) in self.atlases.drain() {
            unsafe {
                gl.delete_texture(atlas.texture);
            }
        }
    }
}

impl Drop for GlContext {
    fn drop(&mut self) {
        self.destroy();
    }
}

// ===================================================================
// Tests
// ===================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn poll_from(codes: Vec<u32>) -> impl FnMut() -> u32 {
        let mut iter = codes.into_iter();
        move || iter.next().unwrap_or(glow::NO_ERROR)
    }

    #[test]
    fn test_clean_queue_is_not_a_loss() {
        assert!(!error_queue_reports_loss(poll_from(vec![])));
    }

    #[test]
    fn test_loss_at_head_of_queue() {
        assert!(error_queue_reports_loss(poll_from(vec![GL_CONTEXT_LOST])));
    }

    #[test]
    fn test_loss_behind_unrelated_errors() {
        assert!(error_queue_reports_loss(poll_from(vec![
            glow::INVALID_ENUM,
            glow::OUT_OF_MEMORY,
            GL_CONTEXT_LOST,
        ])));
    }

    #[test]
    fn test_unrelated_errors_only_are_not_a_loss() {
        assert!(!error_queue_reports_loss(poll_from(vec![
            glow::INVALID_OPERATION,
            glow::INVALID_VALUE,
        ])));
    }

    #[test]
    fn test_draining_is_bounded() {
        // A driver stuck returning the same error must not hang us.
        assert!(!error_queue_reports_loss(|| glow::INVALID_ENUM));
    }
}
