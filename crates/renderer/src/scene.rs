//! Scene composer: the fixed, ordered list of head instances and the render
//! pass that draws them.
//!
//! Each instance is declared as a base matrix plus a transform stack, a
//! shading model and a material. Every frame the composer evaluates the stacks
//! against the current [`FrameState`], fills each program's uniform block and
//! hands the draw to a [`DrawTarget`].

use anyhow::{Result, ensure};
use corelib::transform::{self, TransformStep, rotate_xyz};
use corelib::{Controls, FrameState, LightWave, Mat4, Vec3, Vec4};

use crate::bindings::{ProgramBindings, ResolvedProgram, UniformRole};
use crate::uniforms::UniformBlock;

/// Lighting model an instance is drawn with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Shading {
    /// Lighting evaluated per pixel (Phong).
    PerPixel,
    /// Lighting evaluated per vertex and interpolated (Gouraud).
    PerVertex,
}

/// One value per shading model.
#[derive(Clone, Debug, Default)]
pub struct PerShading<T> {
    pub per_pixel: T,
    pub per_vertex: T,
}

impl<T> PerShading<T> {
    pub fn new(per_pixel: T, per_vertex: T) -> Self {
        Self {
            per_pixel,
            per_vertex,
        }
    }

    pub fn get(&self, shading: Shading) -> &T {
        match shading {
            Shading::PerPixel => &self.per_pixel,
            Shading::PerVertex => &self.per_vertex,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Shading, &T)> {
        [
            (Shading::PerPixel, &self.per_pixel),
            (Shading::PerVertex, &self.per_vertex),
        ]
        .into_iter()
    }
}

pub type ProgramSet = PerShading<ResolvedProgram>;

/// Where an instance's light sits.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LightPlacement {
    /// At the origin.
    Origin,
    /// `(0, 25 * scale_factor + light_offset, -2)`, following the light animation.
    Orbit,
}

impl LightPlacement {
    pub fn position(self, frame: &FrameState, scale_factor: f32) -> Vec3 {
        match self {
            LightPlacement::Origin => Vec3::ZERO,
            LightPlacement::Orbit => Vec3::new(0.0, 25.0 * scale_factor + frame.light_offset, -2.0),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Material {
    pub diffuse: Vec4,
    pub shininess: f32,
    pub light: LightPlacement,
}

/// Matrix a transform stack starts from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Base {
    Identity,
    /// The already-composed model matrix of an earlier instance.
    Instance(usize),
}

#[derive(Clone, Debug, PartialEq)]
pub struct InstanceDesc {
    pub label: &'static str,
    pub base: Base,
    pub steps: Vec<TransformStep>,
    pub shading: Shading,
    pub material: Material,
}

/// Tunables left open by the scene design.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SceneConfig {
    pub main_shininess: f32,
    pub satellite_shininess: f32,
    pub light_wave: LightWave,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            main_shininess: 45.0,
            satellite_shininess: 25.0,
            light_wave: LightWave::Sine,
        }
    }
}

const WHITE: Vec4 = Vec4::new(1.0, 1.0, 1.0, 1.0);
const BLUE: Vec4 = Vec4::new(0.2, 0.35, 1.0, 1.0);
const RED: Vec4 = Vec4::new(1.0, 0.2, 0.2, 1.0);
const GREEN: Vec4 = Vec4::new(0.2, 0.9, 0.3, 1.0);
const GREY: Vec4 = Vec4::new(0.6, 0.6, 0.6, 1.0);

/// Satellite orbiting at `distance` scale-factor units with a Y offset of
/// `y_offset_deg`, its own spin, and a final size of `size` scale-factor units.
fn satellite(
    label: &'static str,
    y_offset_deg: f32,
    distance: f32,
    size: f32,
    colour: Vec4,
    shininess: f32,
) -> InstanceDesc {
    let mut steps = rotate_xyz(y_offset_deg).to_vec();
    steps.push(TransformStep::Scale(1.0));
    steps.push(TransformStep::Translate(Vec3::new(distance, 0.0, 0.0)));
    steps.extend(rotate_xyz(0.0));
    steps.push(TransformStep::Scale(size));
    InstanceDesc {
        label,
        base: Base::Identity,
        steps,
        shading: Shading::PerVertex,
        material: Material {
            diffuse: colour,
            shininess,
            light: LightPlacement::Orbit,
        },
    }
}

/// The main head followed by four satellites, in draw order.
pub fn default_instances(config: &SceneConfig) -> Vec<InstanceDesc> {
    let mut main_steps = rotate_xyz(0.0).to_vec();
    main_steps.push(TransformStep::Scale(2.0));

    let mut moon_steps = vec![TransformStep::Translate(Vec3::new(0.5, 0.0, 0.0))];
    moon_steps.extend(rotate_xyz(0.0));
    moon_steps.push(TransformStep::Scale(1.0 / 7.0));

    vec![
        InstanceDesc {
            label: "main",
            base: Base::Identity,
            steps: main_steps,
            shading: Shading::PerPixel,
            material: Material {
                diffuse: WHITE,
                shininess: config.main_shininess,
                light: LightPlacement::Origin,
            },
        },
        InstanceDesc {
            label: "moon",
            base: Base::Instance(0),
            steps: moon_steps,
            shading: Shading::PerVertex,
            material: Material {
                diffuse: BLUE,
                shininess: config.satellite_shininess,
                light: LightPlacement::Orbit,
            },
        },
        satellite("inner", 100.0, 1.0, 1.0 / 8.0, RED, config.satellite_shininess),
        satellite("middle", 1000.0, 1.5, 1.0 / 9.0, GREEN, config.satellite_shininess),
        satellite("outer", 2000.0, 2.0, 1.0 / 10.0, GREY, config.satellite_shininess),
    ]
}

/// An instance evaluated for one frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Instance {
    pub model: Mat4,
    pub shading: Shading,
    pub material: Material,
    pub light_pos: Vec3,
}

/// Sink for the composer's draw commands.
///
/// Calls arrive per instance in the order `use_program`, `upload_uniforms`,
/// `bind_attributes`, `draw_indexed`, `unbind_attributes`.
pub trait DrawTarget {
    fn use_program(&mut self, shading: Shading, program: &ResolvedProgram);
    fn upload_uniforms(&mut self, block: &UniformBlock);
    fn bind_attributes(&mut self, bindings: &ProgramBindings);
    fn draw_indexed(&mut self, index_count: u32);
    fn unbind_attributes(&mut self);
}

/// Counters for one rendered frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub draw_calls: u32,
    pub indices: u32,
}

#[derive(Clone, Debug)]
pub struct Scene {
    instances: Vec<InstanceDesc>,
    index_count: u32,
}

impl Scene {
    /// `index_count` is the length of the shared index buffer.
    /// Instances may only build on instances listed before them.
    pub fn new(instances: Vec<InstanceDesc>, index_count: u32) -> Result<Self> {
        for (i, inst) in instances.iter().enumerate() {
            if let Base::Instance(base) = inst.base {
                ensure!(
                    base < i,
                    "instance {} ('{}') builds on instance {} which is not drawn before it",
                    i,
                    inst.label,
                    base
                );
            }
        }
        Ok(Self {
            instances,
            index_count,
        })
    }

    pub fn with_defaults(config: &SceneConfig, index_count: u32) -> Self {
        Self {
            instances: default_instances(config),
            index_count,
        }
    }

    pub fn instances(&self) -> &[InstanceDesc] {
        &self.instances
    }

    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    /// Evaluate every instance's model matrix and light for this frame.
    pub fn resolve(&self, frame: &FrameState, controls: &Controls) -> Vec<Instance> {
        let ctx = frame.step_context(controls.scale_factor);
        let mut resolved: Vec<Instance> = Vec::with_capacity(self.instances.len());
        for desc in &self.instances {
            let base = match desc.base {
                Base::Identity => Mat4::IDENTITY,
                Base::Instance(i) => resolved[i].model,
            };
            resolved.push(Instance {
                model: transform::compose(base, &desc.steps, &ctx),
                shading: desc.shading,
                material: desc.material,
                light_pos: desc.material.light.position(frame, controls.scale_factor),
            });
        }
        resolved
    }

    /// Draw one frame: refresh the camera for `viewport`, then draw every
    /// instance in list order.
    pub fn render<T: DrawTarget>(
        &self,
        frame: &mut FrameState,
        viewport: (u32, u32),
        controls: &Controls,
        programs: &ProgramSet,
        target: &mut T,
    ) -> RenderStats {
        frame.update_camera(viewport.0, viewport.1);
        let mut stats = RenderStats::default();

        for instance in self.resolve(frame, controls) {
            let program = programs.get(instance.shading);
            let block = instance_uniforms(frame, &instance, program);

            target.use_program(instance.shading, program);
            target.upload_uniforms(&block);
            target.bind_attributes(&program.bindings);
            target.draw_indexed(self.index_count);
            target.unbind_attributes();

            stats.draw_calls += 1;
            stats.indices += self.index_count;
        }

        stats
    }
}

/// Fill a program's uniform block for one instance.
pub fn instance_uniforms(
    frame: &FrameState,
    instance: &Instance,
    program: &ResolvedProgram,
) -> UniformBlock {
    let b = &program.bindings;
    let mv = frame.view * instance.model;
    let mvp = frame.projection * mv;

    let mut block = UniformBlock::for_program(&program.program);
    block.set_mat4(b.uniform(UniformRole::Mvp), mvp);
    block.set_mat4(b.uniform(UniformRole::ModelView), mv);
    block.set_vec3(b.uniform(UniformRole::LightPos), instance.light_pos);
    block.set_vec3(b.uniform(UniformRole::EyePosition), frame.eye);
    block.set_vec4(b.uniform(UniformRole::DiffuseColour), instance.material.diffuse);
    block.set_f32(b.uniform(UniformRole::Shininess), instance.material.shininess);
    block
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shader::ShaderProgram;
    use asset::{LoadOptions, obj::load_obj_from_str};
    use corelib::transform::Axis;

    const PHONG_VS: &str = include_str!("../../../assets/shaders/phong_vertex.wgsl");
    const PHONG_FS: &str = include_str!("../../../assets/shaders/phong_fragment.wgsl");
    const GOURAUD_VS: &str = include_str!("../../../assets/shaders/gouraud_vertex.wgsl");
    const GOURAUD_FS: &str = include_str!("../../../assets/shaders/gouraud_fragment.wgsl");
    const CUBE: &str = include_str!("../../../assets/meshes/cube.obj");

    #[derive(Debug, PartialEq)]
    enum Call {
        UseProgram(Shading),
        Upload(UniformBlock),
        Bind(usize),
        Draw(u32),
        Unbind,
    }

    #[derive(Default)]
    struct Recorder {
        calls: Vec<Call>,
    }

    impl DrawTarget for Recorder {
        fn use_program(&mut self, shading: Shading, _program: &ResolvedProgram) {
            self.calls.push(Call::UseProgram(shading));
        }
        fn upload_uniforms(&mut self, block: &UniformBlock) {
            self.calls.push(Call::Upload(block.clone()));
        }
        fn bind_attributes(&mut self, bindings: &ProgramBindings) {
            self.calls.push(Call::Bind(bindings.bound_attributes().count()));
        }
        fn draw_indexed(&mut self, index_count: u32) {
            self.calls.push(Call::Draw(index_count));
        }
        fn unbind_attributes(&mut self) {
            self.calls.push(Call::Unbind);
        }
    }

    fn programs() -> ProgramSet {
        PerShading::new(
            ResolvedProgram::new(ShaderProgram::from_sources("phong", PHONG_VS, PHONG_FS).unwrap()),
            ResolvedProgram::new(
                ShaderProgram::from_sources("gouraud", GOURAUD_VS, GOURAUD_FS).unwrap(),
            ),
        )
    }

    fn read_mat4(block: &UniformBlock, program: &ResolvedProgram, role: UniformRole) -> Mat4 {
        let loc = program.bindings.uniform(role).unwrap();
        Mat4::from_cols_slice(&block.read_f32s(loc).unwrap())
    }

    #[test]
    fn cube_with_identity_transform_draws_36_indices() {
        let mesh = load_obj_from_str(CUBE, LoadOptions::new(true, false)).unwrap();
        for n in &mesh.normals {
            assert!((Vec3::from_array(*n).length() - 1.0).abs() < 1e-5);
        }

        let scene = Scene::new(
            vec![InstanceDesc {
                label: "cube",
                base: Base::Identity,
                steps: Vec::new(),
                shading: Shading::PerPixel,
                material: Material {
                    diffuse: WHITE,
                    shininess: 45.0,
                    light: LightPlacement::Origin,
                },
            }],
            mesh.index_count() as u32,
        )
        .unwrap();

        let programs = programs();
        let mut frame = FrameState::default();
        let mut rec = Recorder::default();
        let stats = scene.render(&mut frame, (800, 600), &Controls::default(), &programs, &mut rec);

        assert_eq!(stats, RenderStats { draw_calls: 1, indices: 36 });
        let draws: Vec<u32> = rec
            .calls
            .iter()
            .filter_map(|c| match c {
                Call::Draw(n) => Some(*n),
                _ => None,
            })
            .collect();
        assert_eq!(draws, vec![36]);

        let Call::Upload(block) = &rec.calls[1] else {
            panic!("expected upload, got {:?}", rec.calls[1]);
        };
        let mvp = read_mat4(block, &programs.per_pixel, UniformRole::Mvp);
        assert!(mvp.abs_diff_eq(frame.projection * frame.view, 1e-5));
        let mv = read_mat4(block, &programs.per_pixel, UniformRole::ModelView);
        assert!(mv.abs_diff_eq(frame.view, 1e-5));
    }

    #[test]
    fn default_scene_draws_main_then_satellites() {
        let scene = Scene::with_defaults(&SceneConfig::default(), 36);
        let programs = programs();
        let mut frame = FrameState::default();
        let mut rec = Recorder::default();
        let stats =
            scene.render(&mut frame, (1280, 720), &Controls::default(), &programs, &mut rec);

        assert_eq!(stats.draw_calls, 5);
        assert_eq!(rec.calls.len(), 25);
        for (i, chunk) in rec.calls.chunks(5).enumerate() {
            let expected = if i == 0 { Shading::PerPixel } else { Shading::PerVertex };
            assert_eq!(chunk[0], Call::UseProgram(expected));
            assert!(matches!(chunk[1], Call::Upload(_)));
            // Per-vertex programs take no texture coordinates.
            assert_eq!(chunk[2], Call::Bind(if i == 0 { 3 } else { 2 }));
            assert_eq!(chunk[3], Call::Draw(36));
            assert_eq!(chunk[4], Call::Unbind);
        }
    }

    #[test]
    fn uniforms_carry_material_light_and_eye() {
        let scene = Scene::with_defaults(&SceneConfig::default(), 36);
        let programs = programs();
        let mut frame = FrameState::default();
        frame.light_offset = 10.0;
        let controls = Controls::default();
        frame.update_camera(800, 600);
        let instances = scene.resolve(&frame, &controls);

        let main = instance_uniforms(&frame, &instances[0], &programs.per_pixel);
        let b = &programs.per_pixel.bindings;
        let read = |role| main.read_f32s(b.uniform(role).unwrap()).unwrap();
        assert_eq!(read(UniformRole::Shininess), vec![45.0]);
        assert_eq!(read(UniformRole::LightPos), vec![0.0, 0.0, 0.0]);
        assert_eq!(read(UniformRole::EyePosition), vec![40.0, 30.0, 30.0]);

        let grey = instance_uniforms(&frame, &instances[4], &programs.per_vertex);
        let b = &programs.per_vertex.bindings;
        let read = |role| grey.read_f32s(b.uniform(role).unwrap()).unwrap();
        // 25 * 5 + 10
        assert_eq!(read(UniformRole::LightPos), vec![0.0, 135.0, -2.0]);
        assert_eq!(read(UniformRole::DiffuseColour), GREY.to_array().to_vec());
        assert_eq!(read(UniformRole::Shininess), vec![25.0]);
    }

    #[test]
    fn main_head_is_rotated_then_scaled() {
        let scene = Scene::with_defaults(&SceneConfig::default(), 36);
        let mut frame = FrameState::default();
        frame.angles_deg = Vec3::new(0.0, 90.0, 0.0);
        let controls = Controls::default();
        let instances = scene.resolve(&frame, &controls);

        // Scale 2 * 5, then a quarter turn about Y.
        let p = instances[0].model.transform_point3(Vec3::X);
        assert!((p - Vec3::new(0.0, 0.0, -10.0)).length() < 1e-4);
    }

    #[test]
    fn moon_builds_on_the_main_head() {
        let scene = Scene::with_defaults(&SceneConfig::default(), 36);
        let frame = FrameState::default();
        let controls = Controls::default();
        let instances = scene.resolve(&frame, &controls);

        // Main head scales by 10; the moon sits 0.5 * 5 local units out.
        let centre = instances[1].model.transform_point3(Vec3::ZERO);
        assert!((centre - Vec3::new(25.0, 0.0, 0.0)).length() < 1e-3);
        let expected = instances[0].model
            * Mat4::from_translation(Vec3::new(2.5, 0.0, 0.0))
            * Mat4::from_scale(Vec3::splat(5.0 / 7.0));
        assert!(instances[1].model.abs_diff_eq(expected, 1e-4));
    }

    #[test]
    fn satellites_are_separated_by_their_angle_offsets() {
        let scene = Scene::with_defaults(&SceneConfig::default(), 36);
        let frame = FrameState::default();
        let instances = scene.resolve(&frame, &Controls::default());
        let red = instances[2].model.transform_point3(Vec3::ZERO);
        // Scale 5 then translate 5 along the rotated X axis: radius 25.
        let expected =
            Mat4::from_rotation_y(100f32.to_radians()).transform_point3(Vec3::new(25.0, 0.0, 0.0));
        assert!((red - expected).length() < 1e-3);

        let centres: Vec<Vec3> = instances[2..]
            .iter()
            .map(|i| i.model.transform_point3(Vec3::ZERO))
            .collect();
        assert!((centres[0] - centres[1]).length() > 1.0);
        assert!((centres[1] - centres[2]).length() > 1.0);
    }

    #[test]
    fn forward_base_references_are_rejected() {
        let mut instances = default_instances(&SceneConfig::default());
        instances[0].base = Base::Instance(1);
        assert!(Scene::new(instances, 36).is_err());
    }

    #[test]
    fn custom_stacks_follow_step_order() {
        let steps = vec![
            TransformStep::Rotate {
                axis: Axis::Y,
                offset_deg: 90.0,
            },
            TransformStep::Translate(Vec3::X),
        ];
        let scene = Scene::new(
            vec![InstanceDesc {
                label: "probe",
                base: Base::Identity,
                steps,
                shading: Shading::PerVertex,
                material: Material {
                    diffuse: WHITE,
                    shininess: 1.0,
                    light: LightPlacement::Origin,
                },
            }],
            3,
        )
        .unwrap();
        let controls = Controls {
            scale_factor: 1.0,
            ..Controls::default()
        };
        let instances = scene.resolve(&FrameState::default(), &controls);
        let origin = instances[0].model.transform_point3(Vec3::ZERO);
        assert!((origin - Vec3::new(0.0, 0.0, -1.0)).length() < 1e-5);
    }
}
