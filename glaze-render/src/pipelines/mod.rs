//! GL programs for the two draw paths: solid shapes and atlas-sampled
//! glyphs. One file per pipeline; each owns its program and uniform
//! locations and knows how to bind itself for a run.

pub mod glyph;
pub mod shape;

pub use glyph::GlyphPipeline;
pub use shape::ShapePipeline;

use glow::HasContext;

use crate::context::BackendError;

/// Compile a vertex/fragment pair and link it into a program.
pub(crate) fn link_program(
    gl: &glow::Context,
    vert_src: &str,
    frag_src: &str,
) -> Result<glow::NativeProgram, BackendError> {
    unsafe {
        let program = gl.create_program().map_err(BackendError::Allocation)?;
        let mut shaders = Vec::with_capacity(2);

        for (stage, src) in [
            (glow::VERTEX_SHADER, vert_src),
            (glow::FRAGMENT_SHADER, frag_src),
        ] {
            let shader = match gl.create_shader(stage) {
                Ok(s) => s,
                Err(e) => {
                    cleanup(gl, program, &shaders);
                    return Err(BackendError::Allocation(e));
                }
            };
            gl.shader_source(shader, src);
            gl.compile_shader(shader);
            if !gl.get_shader_compile_status(shader) {
                let log = gl.get_shader_info_log(shader);
                gl.delete_shader(shader);
                cleanup(gl, program, &shaders);
                return Err(BackendError::ShaderCompile(log));
            }
            gl.attach_shader(program, shader);
            shaders.push(shader);
        }

        gl.link_program(program);
        for shader in shaders {
            gl.detach_shader(program, shader);
            gl.delete_shader(shader);
        }
        if !gl.get_program_link_status(program) {
            let log = gl.get_program_info_log(program);
            gl.delete_program(program);
            return Err(BackendError::Link(log));
        }
        Ok(program)
    }
}

unsafe fn cleanup(gl: &glow::Context, program: glow::NativeProgram, shaders: &[glow::NativeShader]) {
    for &shader in shaders {
        gl.delete_shader(shader);
    }
    gl.delete_program(program);
}

/// Column-major orthographic projection mapping y-down pixel space
/// `[0,w]×[0,h]` onto clip space, with (0,0) at the top-left.
pub(crate) fn orthographic(width: f32, height: f32) -> [f32; 16] {
    let w = width.max(1.0);
    let h = height.max(1.0);
    [
        2.0 / w, 0.0, 0.0, 0.0, //
        0.0, -2.0 / h, 0.0, 0.0, //
        0.0, 0.0, -1.0, 0.0, //
        -1.0, 1.0, 0.0, 1.0,
    ]
}

// ===================================================================
// Tests
// ===================================================================
