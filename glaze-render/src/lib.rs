//! # glaze-render
//!
//! GPU-backed 2D painter built on `glow`.
//!
//! ## Architecture
//!
//! ```text
//!  Surface (facade)
//!    │  rect/circle/polygon/fill_text under a TransformStack
//!    ▼
//!  Batch                     ◀─── tessellated vertices + draw runs
//!    │  flush()
//!    ▼
//!  GlContext                 ◀─── clear, upload, draw, present
//!    │
//!    ▼
//!  FlushResult::{Ok, Lost, Error}
//! ```
//!
//! On `Lost` the caller clears and calls [`Surface::regen`]; glyph
//! atlases are retained on the CPU (`glaze-text`) and re-uploaded
//! automatically.
//!
//! ## Crate modules
//!
//! - [`color`] — RGBA color value type
//! - [`transform`] — affine maps and the save/restore stack
//! - [`batch`] — geometry accumulation and draw-run merging
//! - [`pipelines`] — shape and glyph GL programs
//! - [`context`] — GL resource ownership and frame submission
//! - [`surface`] — the public painter facade
//! - [`ffi`] — C ABI (`glz_*`)

pub mod batch;
pub mod color;
pub mod context;
pub mod ffi;
pub mod pipelines;
pub mod surface;
pub mod transform;

// Re-exports for convenience
pub use batch::{AtlasUpload, Batch, DrawRun, RunKind, Vertex};
pub use color::Color;
pub use context::{BackendError, FlushResult, FrameStats, GlContext};
pub use surface::{PaintBackend, Surface, SurfaceState};
pub use transform::{Affine2, TransformError, TransformStack, MAX_STACK_DEPTH};
