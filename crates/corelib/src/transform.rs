//! Ordered transform stacks.
//!
//! A stack is folded left to right with post-multiplication (`m = m * step`),
//! so the last step is applied to the vertex first. Reordering steps changes
//! the result because rotation and translation do not commute.

use crate::{Mat4, Vec3};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    #[inline]
    pub fn unit(self) -> Vec3 {
        match self {
            Axis::X => Vec3::X,
            Axis::Y => Vec3::Y,
            Axis::Z => Vec3::Z,
        }
    }

    #[inline]
    fn pick(self, v: Vec3) -> f32 {
        match self {
            Axis::X => v.x,
            Axis::Y => v.y,
            Axis::Z => v.z,
        }
    }
}

/// One step of a transform stack.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TransformStep {
    /// Rotate about `axis` by the frame angle for that axis plus `offset_deg`.
    Rotate { axis: Axis, offset_deg: f32 },
    /// Uniform scale by `factor * scale_factor`.
    Scale(f32),
    /// Translate by `offset * scale_factor`.
    Translate(Vec3),
}

/// Per-frame values a step is evaluated against.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StepContext {
    /// Euler angles in degrees.
    pub angles_deg: Vec3,
    pub scale_factor: f32,
}

impl StepContext {
    /// Zero angles and unit scale: steps evaluate to their literal values.
    pub const IDENTITY: Self = Self {
        angles_deg: Vec3::ZERO,
        scale_factor: 1.0,
    };
}

impl TransformStep {
    pub fn matrix(&self, ctx: &StepContext) -> Mat4 {
        match *self {
            TransformStep::Rotate { axis, offset_deg } => {
                let angle = (axis.pick(ctx.angles_deg) + offset_deg).to_radians();
                Mat4::from_axis_angle(axis.unit(), angle)
            }
            TransformStep::Scale(factor) => {
                Mat4::from_scale(Vec3::splat(factor * ctx.scale_factor))
            }
            TransformStep::Translate(offset) => Mat4::from_translation(offset * ctx.scale_factor),
        }
    }
}

/// Rotate about X, then Y (with an extra offset), then Z.
pub fn rotate_xyz(y_offset_deg: f32) -> [TransformStep; 3] {
    [
        TransformStep::Rotate {
            axis: Axis::X,
            offset_deg: 0.0,
        },
        TransformStep::Rotate {
            axis: Axis::Y,
            offset_deg: y_offset_deg,
        },
        TransformStep::Rotate {
            axis: Axis::Z,
            offset_deg: 0.0,
        },
    ]
}

/// Fold `steps` onto `base` in order.
pub fn compose(base: Mat4, steps: &[TransformStep], ctx: &StepContext) -> Mat4 {
    steps.iter().fold(base, |m, step| m * step.matrix(ctx))
}
