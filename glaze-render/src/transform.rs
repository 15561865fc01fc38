//! 2D affine transforms and the save/restore transform stack.
//!
//! An [`Affine2`] is a 2×2 linear part plus a translation. Composition
//! follows canvas semantics: `current = current * op`, so each
//! operation applies in the current local frame — translate, then
//! rotate, then draw, draws in rotated-then-translated space.

use thiserror::Error;

/// Stack depth cap; a runaway save loop fails long before exhausting
/// memory.
pub const MAX_STACK_DEPTH: usize = 64;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum TransformError {
    /// More than [`MAX_STACK_DEPTH`] outstanding saves.
    #[error("transform stack overflow (depth cap {MAX_STACK_DEPTH})")]
    Overflow,
    /// Restore with no matching save; the base identity is never popped.
    #[error("transform stack underflow: restore without matching save")]
    Underflow,
}

/// Column-major 2D affine map: `p' = m * p + t`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Affine2 {
    /// Linear part, columns `[m[0], m[1]]` and `[m[2], m[3]]`.
    pub m: [f32; 4],
    /// Translation.
    pub t: [f32; 2],
}

impl Affine2 {
    pub const IDENTITY: Affine2 = Affine2 {
        m: [1.0, 0.0, 0.0, 1.0],
        t: [0.0, 0.0],
    };

    pub fn translation(dx: f32, dy: f32) -> Self {
        Self {
            m: [1.0, 0.0, 0.0, 1.0],
            t: [dx, dy],
        }
    }

    /// Rotation by `theta` radians. With the painter's y-down
    /// coordinates this turns positive angles clockwise on screen.
    pub fn rotation(theta: f32) -> Self {
        let (s, c) = theta.sin_cos();
        Self {
            m: [c, s, -s, c],
            t: [0.0, 0.0],
        }
    }

    pub fn scaling(sx: f32, sy: f32) -> Self {
        Self {
            m: [sx, 0.0, 0.0, sy],
            t: [0.0, 0.0],
        }
    }

    /// Compose: `(a.mul(b)).apply(p) == a.apply(b.apply(p))`.
    pub fn mul(self, rhs: Affine2) -> Self {
        let a = self.m;
        let b = rhs.m;
        Self {
            m: [
                a[0] * b[0] + a[2] * b[1],
                a[1] * b[0] + a[3] * b[1],
                a[0] * b[2] + a[2] * b[3],
                a[1] * b[2] + a[3] * b[3],
            ],
            t: [
                a[0] * rhs.t[0] + a[2] * rhs.t[1] + self.t[0],
                a[1] * rhs.t[0] + a[3] * rhs.t[1] + self.t[1],
            ],
        }
    }

    pub fn apply(&self, x: f32, y: f32) -> [f32; 2] {
        [
            self.m[0] * x + self.m[2] * y + self.t[0],
            self.m[1] * x + self.m[3] * y + self.t[1],
        ]
    }

    /// Component-wise comparison within `eps`.
    pub fn approx_eq(&self, other: &Affine2, eps: f32) -> bool {
        self.m
            .iter()
            .zip(other.m.iter())
            .chain(self.t.iter().zip(other.t.iter()))
            .all(|(a, b)| (a - b).abs() <= eps)
    }
}

/// Save/restore stack of affine transforms.
///
/// Always holds at least the base identity entry, which can never be
/// popped. Failed saves and restores are reported and leave the stack
/// untouched.
pub struct TransformStack {
    stack: Vec<Affine2>,
}

impl TransformStack {
    pub fn new() -> Self {
        Self {
            stack: vec![Affine2::IDENTITY],
        }
    }

    /// The current (top) transform.
    pub fn current(&self) -> &Affine2 {
        // Invariant: never empty.
        self.stack.last().expect("transform stack is never empty")
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Push a copy of the current transform.
    pub fn save(&mut self) -> Result<(), TransformError> {
        if self.stack.len() >= MAX_STACK_DEPTH {
            return Err(TransformError::Overflow);
        }
        self.stack.push(*self.current());
        Ok(())
    }

    /// Pop the current transform, discarding operations applied since
    /// the matching save.
    pub fn restore(&mut self) -> Result<(), TransformError> {
        if self.stack.len() == 1 {
            return Err(TransformError::Underflow);
        }
        self.stack.pop();
        Ok(())
    }

    pub fn translate(&mut self, dx: f32, dy: f32) {
        self.compose(Affine2::translation(dx, dy));
    }

    pub fn rotate(&mut self, theta: f32) {
        self.compose(Affine2::rotation(theta));
    }

    pub fn scale(&mut self, sx: f32, sy: f32) {
        self.compose(Affine2::scaling(sx, sy));
    }

    /// Collapse the whole stack back to a single identity entry.
    pub fn reset(&mut self) {
        self.stack.clear();
        self.stack.push(Affine2::IDENTITY);
    }

    fn compose(&mut self, op: Affine2) {
        let top = self.stack.last_mut().expect("transform stack is never empty");
        *top = top.mul(op);
    }
}

impl Default for TransformStack {
    fn default() -> Self {
        Self::new()
    }
}

// ===================================================================
// Tests
// ===================================================================
