//! Renderer: shader programs, the scene composer and the wgpu state that
//! draws it. wgpu = 26.x, winit = 0.30.x

use std::sync::Arc;

use anyhow::{Context, Result};
use asset::{IndexedMesh, TextureData};
use corelib::{Controls, FrameState};
use wgpu::{
    Buffer, BufferUsages, CommandEncoderDescriptor, Device, DeviceDescriptor, Features, Instance,
    InstanceDescriptor, Limits, LoadOp, Operations, PowerPreference, PresentMode, Queue,
    RenderPassColorAttachment, RenderPassDescriptor, StoreOp, Surface, SurfaceConfiguration,
    SurfaceError, TextureUsages, TextureView,
};
use winit::{dpi::PhysicalSize, window::Window};

pub mod bindings;
pub mod pipeline;
pub mod resources;
pub mod scene;
pub mod shader;
pub mod uniforms;

use bindings::{ProgramBindings, ResolvedProgram};
use pipeline::{PipelineInputs, ProgramPipeline};
use resources::{DiffuseTexture, MeshBuffers, create_depth_view};
use scene::{DrawTarget, PerShading, ProgramSet, RenderStats, Scene, Shading};
use uniforms::UniformBlock;

/// Everything the renderer needs besides a window.
pub struct SceneAssets {
    pub mesh: IndexedMesh,
    pub texture: TextureData,
    pub programs: ProgramSet,
    pub scene: Scene,
}

const CLEAR_COLOR: wgpu::Color = wgpu::Color {
    r: 0.05,
    g: 0.05,
    b: 0.08,
    a: 1.0,
};

/// Bytes between consecutive per-draw uniform slots.
fn slot_stride(block_size: u32, alignment: u32) -> u32 {
    wgpu::util::align_to(block_size.max(1), alignment.max(1))
}

pub struct GpuState {
    // Surface
    surface: Surface<'static>,
    surface_config: SurfaceConfiguration,

    // Device/queue
    device: Device,
    queue: Queue,

    // Scene
    mesh: MeshBuffers,
    programs: ProgramSet,
    pipelines: PerShading<ProgramPipeline>,
    scene: Scene,

    // Per-draw uniforms
    uniform_buf: Buffer,
    staging: Vec<u8>,
    slot_stride: u32,
    slot_count: u32,

    // Depth
    depth_view: TextureView,

    // Size cache
    width: u32,
    height: u32,
}

impl GpuState {
    /// Create GPU state bound to an Arc<Window> and upload the scene assets.
    pub async fn new(
        window: Arc<Window>,
        backends: wgpu::Backends,
        assets: SceneAssets,
    ) -> Result<Self> {
        let PhysicalSize { width, height } = window.inner_size();
        let width = width.max(1);
        let height = height.max(1);

        // Instance & surface
        let instance = Instance::new(&InstanceDescriptor {
            backends,
            ..Default::default()
        });
        let surface: Surface<'static> = instance
            .create_surface(window.clone())
            .context("create_surface failed")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("No suitable GPU adapter")?;
        let info = adapter.get_info();
        log::info!("Adapter: {} ({:?})", info.name, info.backend);

        let (device, queue) = adapter
            .request_device(&DeviceDescriptor {
                label: Some("Orrery Device"),
                required_features: Features::empty(),
                required_limits: Limits::downlevel_webgl2_defaults()
                    .using_resolution(adapter.limits()),
                memory_hints: Default::default(),
                trace: Default::default(),
            })
            .await
            .context("request_device failed")?;

        // Surface format (prefer sRGB)
        let caps = surface.get_capabilities(&adapter);
        let surface_format = caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| caps.formats.first().copied())
            .context("surface reports no formats")?;
        let alpha_mode = caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let surface_config = SurfaceConfiguration {
            usage: TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width,
            height,
            present_mode: PresentMode::AutoVsync,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &surface_config);
        let depth_view = create_depth_view(&device, &surface_config);

        let SceneAssets {
            mesh,
            texture,
            programs,
            scene,
        } = assets;

        let mesh = MeshBuffers::upload(&device, &mesh)?;
        let texture = DiffuseTexture::upload(&device, &queue, &texture)?;

        // One slot per instance, each large enough for either program's block.
        let block_size = programs
            .iter()
            .map(|(_, p)| p.program.uniform_block_size())
            .max()
            .unwrap_or(0);
        let slot_stride =
            slot_stride(block_size, device.limits().min_uniform_buffer_offset_alignment);
        let slot_count = scene.instances().len().max(1) as u32;
        let uniform_buf = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Instance uniforms"),
            size: u64::from(slot_stride) * u64::from(slot_count),
            usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let inputs = PipelineInputs {
            surface_format,
            uniform_buffer: &uniform_buf,
            texture: &texture,
        };
        let pipelines = PerShading::new(
            ProgramPipeline::new(&device, programs.get(Shading::PerPixel), &inputs)?,
            ProgramPipeline::new(&device, programs.get(Shading::PerVertex), &inputs)?,
        );

        log::info!(
            "Renderer ready: {:?} surface, {}x{}, {} instances, uniform slot {} bytes",
            surface_format,
            width,
            height,
            slot_count,
            slot_stride
        );

        Ok(Self {
            surface,
            surface_config,
            device,
            queue,
            mesh,
            programs,
            pipelines,
            scene,
            uniform_buf,
            staging: vec![0; (slot_stride * slot_count) as usize],
            slot_stride,
            slot_count,
            depth_view,
            width,
            height,
        })
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Resize: reconfigure surface & recreate depth view.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width.max(1);
        self.height = height.max(1);
        self.surface_config.width = self.width;
        self.surface_config.height = self.height;
        self.surface.configure(&self.device, &self.surface_config);
        self.depth_view = create_depth_view(&self.device, &self.surface_config);
    }

    /// Render one frame: clear, then let the scene draw every instance.
    pub fn render(
        &mut self,
        frame: &mut FrameState,
        controls: &Controls,
    ) -> Result<RenderStats, SurfaceError> {
        let output = self.surface.get_current_texture()?;
        let view = output.texture.create_view(&Default::default());

        let mut encoder = self.device.create_command_encoder(&CommandEncoderDescriptor {
            label: Some("MainEncoder"),
        });

        let (stats, used) = {
            let mut rpass = encoder.begin_render_pass(&RenderPassDescriptor {
                label: Some("MainPass"),
                color_attachments: &[Some(RenderPassColorAttachment {
                    view: &view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: Operations {
                        load: LoadOp::Clear(CLEAR_COLOR),
                        store: StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(Operations {
                        load: LoadOp::Clear(1.0),
                        store: StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            let mut target = PassTarget {
                pass: &mut rpass,
                mesh: &self.mesh,
                pipelines: &self.pipelines,
                staging: &mut self.staging,
                slot_stride: self.slot_stride,
                slot_count: self.slot_count,
                next_slot: 0,
                current: None,
                skip_draw: false,
            };
            let stats = self
                .scene
                .render(frame, (self.width, self.height), controls, &self.programs, &mut target);
            (stats, target.next_slot * self.slot_stride)
        };

        // Applied before the submitted commands execute.
        if used > 0 {
            self.queue
                .write_buffer(&self.uniform_buf, 0, &self.staging[..used as usize]);
        }
        self.queue.submit(Some(encoder.finish()));
        output.present();
        Ok(stats)
    }

    pub fn is_surface_lost(err: &SurfaceError) -> bool {
        matches!(err, SurfaceError::Lost | SurfaceError::Outdated)
    }

    pub fn recreate_surface(&mut self) {
        self.resize(self.width, self.height);
    }
}

/// Records the scene's draws into a render pass.
///
/// Uniform blocks are staged into consecutive slots of the dynamic uniform
/// buffer; the caller uploads the staged bytes before submitting.
struct PassTarget<'a, 'p> {
    pass: &'a mut wgpu::RenderPass<'p>,
    mesh: &'a MeshBuffers,
    pipelines: &'a PerShading<ProgramPipeline>,
    staging: &'a mut Vec<u8>,
    slot_stride: u32,
    slot_count: u32,
    next_slot: u32,
    current: Option<Shading>,
    skip_draw: bool,
}

impl DrawTarget for PassTarget<'_, '_> {
    fn use_program(&mut self, shading: Shading, program: &ResolvedProgram) {
        log::trace!("use program '{}'", program.program.label());
        self.pass.set_pipeline(&self.pipelines.get(shading).pipeline);
        self.current = Some(shading);
    }

    fn upload_uniforms(&mut self, block: &UniformBlock) {
        let Some(shading) = self.current else {
            log::warn!("uniforms uploaded before a program was bound; draw skipped");
            self.skip_draw = true;
            return;
        };
        if self.next_slot >= self.slot_count || block.len() > self.slot_stride as usize {
            log::warn!("no uniform slot left for draw {}; draw skipped", self.next_slot);
            self.skip_draw = true;
            return;
        }
        let offset = self.next_slot * self.slot_stride;
        let start = offset as usize;
        self.staging[start..start + block.len()].copy_from_slice(block.as_bytes());
        self.pass.set_bind_group(
            shader::RESOURCE_GROUP,
            &self.pipelines.get(shading).bind_group,
            &[offset],
        );
        self.next_slot += 1;
        self.skip_draw = false;
    }

    fn bind_attributes(&mut self, _bindings: &ProgramBindings) {
        let Some(shading) = self.current else {
            return;
        };
        for (slot, role) in self.pipelines.get(shading).attribute_roles.iter().enumerate() {
            self.pass
                .set_vertex_buffer(slot as u32, self.mesh.buffer(*role).slice(..));
        }
        self.pass
            .set_index_buffer(self.mesh.indices.slice(..), wgpu::IndexFormat::Uint32);
    }

    fn draw_indexed(&mut self, index_count: u32) {
        if self.skip_draw {
            return;
        }
        self.pass.draw_indexed(0..index_count.min(self.mesh.index_count), 0, 0..1);
    }

    // Vertex buffer bindings are per pass state; the next bind replaces them.
    fn unbind_attributes(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_slots_respect_offset_alignment() {
        assert_eq!(slot_stride(176, 256), 256);
        assert_eq!(slot_stride(256, 256), 256);
        assert_eq!(slot_stride(300, 256), 512);
        assert_eq!(slot_stride(0, 256), 256);
    }

    #[test]
    fn surface_loss_is_recoverable() {
        assert!(GpuState::is_surface_lost(&SurfaceError::Lost));
        assert!(GpuState::is_surface_lost(&SurfaceError::Outdated));
        assert!(!GpuState::is_surface_lost(&SurfaceError::Timeout));
    }
}
