//! Glyph pipeline — shape pipeline plus a single-channel atlas sampler.
//!
//! The vertex stream carries texel-space UVs; `u_atlas_size` normalizes
//! them at draw time so an atlas that grew since the quads were recorded
//! still samples correctly.

use glow::HasContext;

use crate::context::BackendError;

use super::link_program;

pub struct GlyphPipeline {
    program: glow::NativeProgram,
    u_projection: Option<glow::NativeUniformLocation>,
    u_atlas: Option<glow::NativeUniformLocation>,
    u_atlas_size: Option<glow::NativeUniformLocation>,
}

impl GlyphPipeline {
    pub fn new(gl: &glow::Context) -> Result<Self, BackendError> {
        let program = link_program(
            gl,
            include_str!("../../shaders/glyph.vert"),
            include_str!("../../shaders/glyph.frag"),
        )?;
        unsafe {
            let u_projection = gl.get_uniform_location(program, "u_projection");
            let u_atlas = gl.get_uniform_location(program, "u_atlas");
            let u_atlas_size = gl.get_uniform_location(program, "u_atlas_size");
            Ok(Self {
                program,
                u_projection,
                u_atlas,
                u_atlas_size,
            })
        }
    }

    /// Make this the active program. The caller binds the atlas texture
    /// to unit 0.
    pub fn bind(&self, gl: &glow::Context, projection: &[f32; 16], atlas_size: f32) {
        unsafe {
            gl.use_program(Some(self.program));
            gl.uniform_matrix_4_f32_slice(self.u_projection.as_ref(), false, projection);
            gl.uniform_1_i32(self.u_atlas.as_ref(), 0);
            gl.uniform_1_f32(self.u_atlas_size.as_ref(), atlas_size);
        }
    }

    pub fn destroy(&self, gl: &glow::Context) {
        unsafe {
            gl.delete_program(self.program);
        }
    }
}
