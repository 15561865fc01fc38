//! Solid-color shape pipeline.

use glow::HasContext;

use crate::context::BackendError;

use super::link_program;

/// Owns the GL program for untextured geometry.
pub struct ShapePipeline {
    program: glow::NativeProgram,
    u_projection: Option<glow::NativeUniformLocation>,
}

impl ShapePipeline {
    pub fn new(gl: &glow::Context) -> Result<Self, BackendError> {
        let program = link_program(
            gl,
            include_str!("../../shaders/shape.vert"),
            include_str!("../../shaders/shape.frag"),
        )?;
        let u_projection = unsafe { gl.get_uniform_location(program, "u_projection") };
        Ok(Self {
            program,
            u_projection,
        })
    }

    /// Make this the active program for subsequent draws.
    pub fn bind(&self, gl: &glow::Context, projection: &[f32; 16]) {
        unsafe {
            gl.use_program(Some(self.program));
            gl.uniform_matrix_4_f32_slice(self.u_projection.as_ref(), false, projection);
        }
    }

    pub fn destroy(&self, gl: &glow::Context) {
        unsafe {
            gl.delete_program(self.program);
        }
    }
}
