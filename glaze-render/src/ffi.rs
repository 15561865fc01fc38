//! C ABI over the painter.
//!
//! Surfaces and fonts cross the boundary as opaque pointers owned by
//! the caller; `glz_destroy` / `glz_font_free` return ownership here.
//! Every entry point tolerates null handles (no-op, or a null/error
//! return), so a misbehaving host degrades instead of crashing.
//!
//! `glz_flush` returns 0 on success, 1 when the GL context was lost
//! (recover with `glz_clear` + `glz_regen`), 2 on a transient error.

use std::ffi::{c_char, c_void, CStr, CString};
use std::ptr::{self, NonNull};

use log::{error, warn};
use raw_window_handle::{
    RawDisplayHandle, RawWindowHandle, WaylandDisplayHandle, WaylandWindowHandle,
};

use glaze_text::FontAsset;

use crate::color::Color;
use crate::context::FlushResult;
use crate::surface::Surface;

pub const GLZ_FLUSH_OK: i32 = 0;
pub const GLZ_FLUSH_LOST: i32 = 1;
pub const GLZ_FLUSH_ERROR: i32 = 2;

// ─── Color ──────────────────────────────────────────────────────────

#[no_mangle]
pub extern "C" fn glz_colorf(r: f32, g: f32, b: f32, a: f32) -> Color {
    Color::from_f32(r, g, b, a)
}

#[no_mangle]
pub extern "C" fn glz_color8(r: u8, g: u8, b: u8, a: u8) -> Color {
    Color::from_u8(r, g, b, a)
}

// ─── Construction / teardown ────────────────────────────────────────

/// Create a surface on the host's current GL context. `loader`
/// resolves GL entry-point names. Returns null on failure.
#[no_mangle]
pub unsafe extern "C" fn glz_create_surface(
    loader: Option<unsafe extern "C" fn(*const c_char) -> *const c_void>,
) -> *mut Surface {
    let Some(loader) = loader else {
        return ptr::null_mut();
    };
    let result = Surface::from_loader(|name| {
        let name = CString::new(name).unwrap_or_default();
        // Unsafe hygiene does not extend into the closure body.
        unsafe { loader(name.as_ptr()) }
    });
    match result {
        Ok(surface) => Box::into_raw(Box::new(surface)),
        Err(e) => {
            error!("glz_create_surface: {e}");
            ptr::null_mut()
        }
    }
}

/// Create a surface with its own EGL context and swap chain.
/// `display` and `window` are interpreted as Wayland `wl_display` and
/// `wl_surface` pointers. Returns null on failure.
#[no_mangle]
pub unsafe extern "C" fn glz_create_surface_from_window(
    display: *mut c_void,
    window: *mut c_void,
    width: u32,
    height: u32,
) -> *mut Surface {
    let (Some(display), Some(window)) = (NonNull::new(display), NonNull::new(window)) else {
        return ptr::null_mut();
    };
    let rdh = RawDisplayHandle::Wayland(WaylandDisplayHandle::new(display));
    let rwh = RawWindowHandle::Wayland(WaylandWindowHandle::new(window));
    match Surface::from_native_window(rdh, rwh, width, height) {
        Ok(surface) => Box::into_raw(Box::new(surface)),
        Err(e) => {
            error!("glz_create_surface_from_window: {e}");
            ptr::null_mut()
        }
    }
}

/// Release the surface's GPU resources and free it. The pointer is
/// invalid afterwards.
#[no_mangle]
pub unsafe extern "C" fn glz_destroy(surface: *mut Surface) {
    if surface.is_null() {
        return;
    }
    let mut surface = Box::from_raw(surface);
    surface.destroy();
}

// ─── Fonts ──────────────────────────────────────────────────────────

/// Parse a font from `len` bytes at `data`. The buffer is copied; the
/// caller may free it immediately. Returns null on parse failure.
#[no_mangle]
pub unsafe extern "C" fn glz_font_from_buffer(data: *const u8, len: usize) -> *mut FontAsset {
    if data.is_null() {
        return ptr::null_mut();
    }
    let bytes = std::slice::from_raw_parts(data, len);
    match FontAsset::from_bytes(bytes) {
        Ok(font) => Box::into_raw(Box::new(font)),
        Err(e) => {
            error!("glz_font_from_buffer: {e}");
            ptr::null_mut()
        }
    }
}

/// Free a font asset. Any GPU atlas copy is released when the surface
/// holding it is destroyed.
#[no_mangle]
pub unsafe extern "C" fn glz_font_free(font: *mut FontAsset) {
    if !font.is_null() {
        drop(Box::from_raw(font));
    }
}

// ─── Drawing ────────────────────────────────────────────────────────

#[no_mangle]
pub unsafe extern "C" fn glz_rect(
    surface: *mut Surface,
    x: f32,
    y: f32,
    width: f32,
    height: f32,
    angle: f32,
    color: Color,
) {
    if let Some(surface) = surface.as_mut() {
        surface.rect(x, y, width, height, angle, color);
    }
}

#[no_mangle]
pub unsafe extern "C" fn glz_circle(surface: *mut Surface, x: f32, y: f32, r: f32, color: Color) {
    if let Some(surface) = surface.as_mut() {
        surface.circle(x, y, r, color);
    }
}

#[no_mangle]
pub unsafe extern "C" fn glz_polygon(
    surface: *mut Surface,
    x: f32,
    y: f32,
    r: f32,
    sides: u8,
    color: Color,
) {
    if let Some(surface) = surface.as_mut() {
        surface.polygon(x, y, r, sides, color);
    }
}

#[no_mangle]
pub unsafe extern "C" fn glz_fill_text(
    surface: *mut Surface,
    font: *mut FontAsset,
    text: *const c_char,
    x: f32,
    y: f32,
    size: f32,
    color: Color,
    wrap_width: f32,
) {
    let (Some(surface), Some(font)) = (surface.as_mut(), font.as_mut()) else {
        return;
    };
    if text.is_null() {
        return;
    }
    let text = CStr::from_ptr(text).to_string_lossy();
    surface.fill_text(font, &text, x, y, size, color, wrap_width);
}

// ─── Transform stack ────────────────────────────────────────────────

#[no_mangle]
pub unsafe extern "C" fn glz_save(surface: *mut Surface) {
    if let Some(surface) = surface.as_mut() {
        if let Err(e) = surface.save() {
            warn!("glz_save: {e}");
        }
    }
}

#[no_mangle]
pub unsafe extern "C" fn glz_restore(surface: *mut Surface) {
    if let Some(surface) = surface.as_mut() {
        if let Err(e) = surface.restore() {
            warn!("glz_restore: {e}");
        }
    }
}

#[no_mangle]
pub unsafe extern "C" fn glz_translate(surface: *mut Surface, dx: f32, dy: f32) {
    if let Some(surface) = surface.as_mut() {
        surface.translate(dx, dy);
    }
}

#[no_mangle]
pub unsafe extern "C" fn glz_rotate(surface: *mut Surface, theta: f32) {
    if let Some(surface) = surface.as_mut() {
        surface.rotate(theta);
    }
}

#[no_mangle]
pub unsafe extern "C" fn glz_scale(surface: *mut Surface, sx: f32, sy: f32) {
    if let Some(surface) = surface.as_mut() {
        surface.scale(sx, sy);
    }
}

#[no_mangle]
pub unsafe extern "C" fn glz_reset(surface: *mut Surface) {
    if let Some(surface) = surface.as_mut() {
        surface.reset();
    }
}

// ─── Frame control ──────────────────────────────────────────────────

#[no_mangle]
pub unsafe extern "C" fn glz_set_clear_color(surface: *mut Surface, color: Color) {
    if let Some(surface) = surface.as_mut() {
        surface.set_clear_color(color);
    }
}

#[no_mangle]
pub unsafe extern "C" fn glz_resize(surface: *mut Surface, width: u32, height: u32) {
    if let Some(surface) = surface.as_mut() {
        surface.resize(width, height);
    }
}

#[no_mangle]
pub unsafe extern "C" fn glz_clear(surface: *mut Surface) {
    if let Some(surface) = surface.as_mut() {
        surface.clear();
    }
}

#[no_mangle]
pub unsafe extern "C" fn glz_flush(surface: *mut Surface) -> i32 {
    let Some(surface) = surface.as_mut() else {
        return GLZ_FLUSH_ERROR;
    };
    match surface.flush() {
        FlushResult::Ok(_) => GLZ_FLUSH_OK,
        FlushResult::Lost => GLZ_FLUSH_LOST,
        FlushResult::Error(_) => GLZ_FLUSH_ERROR,
    }
}

/// Rebuild GPU state after `glz_flush` returned 1. Returns 0 on
/// success.
#[no_mangle]
pub unsafe extern "C" fn glz_regen(surface: *mut Surface) -> i32 {
    let Some(surface) = surface.as_mut() else {
        return -1;
    };
    match surface.regen() {
        Ok(()) => 0,
        Err(e) => {
            error!("glz_regen: {e}");
            -1
        }
    }
}

// ===================================================================
// Tests
// ===================================================================
