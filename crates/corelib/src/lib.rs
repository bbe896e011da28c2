//! Core types: math re-exports, camera, transform stacks, frame state.

pub use glam::{Mat4, Vec3, Vec4, vec3};

pub mod camera;
pub mod frame;
pub mod transform;

pub use camera::Camera;
pub use frame::{Controls, FrameState, LightWave};
pub use transform::{Axis, StepContext, TransformStep};
