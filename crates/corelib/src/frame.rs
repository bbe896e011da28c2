//! Per-frame animation state and the runtime toggles that drive it.

use std::time::Duration;

use crate::camera::Camera;
use crate::transform::StepContext;
use crate::{Mat4, Vec3};

/// Eye position the scene is viewed from.
pub const DEFAULT_EYE: Vec3 = Vec3::new(40.0, 30.0, 30.0);

/// Milliseconds per degree of object rotation.
const MS_PER_DEGREE: f32 = 80.0;

/// Peak light displacement of the light animation.
const LIGHT_AMPLITUDE: f32 = 100.0;

/// Waveform of the light animation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LightWave {
    #[default]
    Sine,
    Cosine,
}

impl LightWave {
    #[inline]
    pub fn sample(self, t: f32) -> f32 {
        match self {
            LightWave::Sine => t.sin(),
            LightWave::Cosine => t.cos(),
        }
    }
}

/// Runtime toggles owned by the input layer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Controls {
    pub rotate: bool,
    pub animate_light: bool,
    pub scale_factor: f32,
}

impl Default for Controls {
    fn default() -> Self {
        Self {
            rotate: true,
            animate_light: false,
            scale_factor: 5.0,
        }
    }
}

/// Everything that changes between frames.
///
/// Written by [`FrameState::update`] and the camera step of the render pass,
/// read when composing instances. One owner, no shared access.
#[derive(Clone, Copy, Debug)]
pub struct FrameState {
    /// Object rotation as Euler angles in degrees.
    pub angles_deg: Vec3,
    pub light_offset: f32,
    pub light_wave: LightWave,
    pub eye: Vec3,
    pub view: Mat4,
    pub projection: Mat4,
}

impl Default for FrameState {
    fn default() -> Self {
        Self::new(DEFAULT_EYE, LightWave::default())
    }
}

impl FrameState {
    pub fn new(eye: Vec3, light_wave: LightWave) -> Self {
        Self {
            angles_deg: Vec3::ZERO,
            light_offset: 0.0,
            light_wave,
            eye,
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
        }
    }

    /// Advance the animation to `elapsed` since start.
    ///
    /// Disabled animations keep their last value.
    pub fn update(&mut self, elapsed: Duration, controls: &Controls) {
        let millis = elapsed.as_millis() as f32;
        if controls.rotate {
            self.angles_deg.y = millis / MS_PER_DEGREE;
        }
        if controls.animate_light {
            self.light_offset = self.light_wave.sample(millis / 1000.0) * LIGHT_AMPLITUDE;
        }
    }

    /// Recompute view and projection for a viewport of `width` x `height`.
    ///
    /// A zero height yields a degenerate projection; callers clamp it first.
    pub fn update_camera(&mut self, width: u32, height: u32) -> Camera {
        let camera = Camera::looking_at_origin(self.eye, width as f32 / height as f32);
        self.view = camera.view();
        self.projection = camera.proj();
        camera
    }

    #[inline]
    pub fn step_context(&self, scale_factor: f32) -> StepContext {
        StepContext {
            angles_deg: self.angles_deg,
            scale_factor,
        }
    }
}
