//! Render pipelines built from linked programs.

use std::num::NonZeroU64;

use anyhow::{Result, bail, ensure};
use wgpu::{
    BindGroup, BindGroupLayoutDescriptor, BindGroupLayoutEntry, BindingType, BlendState, Buffer,
    BufferBindingType, ColorTargetState, ColorWrites, DepthBiasState, DepthStencilState, Device,
    FragmentState, PipelineLayoutDescriptor, RenderPipeline, RenderPipelineDescriptor,
    ShaderModuleDescriptor, ShaderSource, ShaderStages, TextureFormat, VertexAttribute,
    VertexBufferLayout, VertexState, VertexStepMode,
};

use crate::bindings::{AttributeRole, ResolvedProgram};
use crate::resources::{DEPTH_FORMAT, DiffuseTexture, attribute_format};
use crate::shader::{
    FRAGMENT_ENTRY, SAMPLER_BINDING, TEXTURE_BINDING, UNIFORM_BINDING, VERTEX_ENTRY,
};

/// A pipeline plus the bind group its draws use.
///
/// Vertex buffer slot `i` is fed from `attribute_roles[i]`.
pub struct ProgramPipeline {
    pub pipeline: RenderPipeline,
    pub bind_group: BindGroup,
    pub attribute_roles: Vec<AttributeRole>,
}

/// Everything needed to turn a linked program into a pipeline.
pub struct PipelineInputs<'a> {
    pub surface_format: TextureFormat,
    /// Dynamic-offset buffer holding one uniform block per draw.
    pub uniform_buffer: &'a Buffer,
    pub texture: &'a DiffuseTexture,
}

impl ProgramPipeline {
    pub fn new(
        device: &Device,
        program: &ResolvedProgram,
        inputs: &PipelineInputs<'_>,
    ) -> Result<Self> {
        let label = program.program.label();
        let unsupplied = program.unsupplied_attributes();
        if !unsupplied.is_empty() {
            bail!(
                "program '{}' declares vertex inputs no mesh buffer provides: {}",
                label,
                unsupplied.join(", ")
            );
        }
        let block_size = NonZeroU64::new(program.program.uniform_block_size() as u64);
        ensure!(block_size.is_some(), "program '{}' declares no uniform block", label);

        let mut attribute_roles = Vec::new();
        let mut attributes = Vec::new();
        for (role, loc) in program.bindings.bound_attributes() {
            let (format, kind) = attribute_format(role);
            ensure!(
                loc.kind == kind,
                "program '{}' reads '{}' as {:?}, mesh stores {:?}",
                label,
                role.name(),
                loc.kind,
                kind
            );
            attribute_roles.push(role);
            attributes.push([VertexAttribute {
                format,
                offset: 0,
                shader_location: loc.location,
            }]);
        }
        let buffers: Vec<VertexBufferLayout<'_>> = attributes
            .iter()
            .map(|attr| VertexBufferLayout {
                array_stride: attr[0].format.size(),
                step_mode: VertexStepMode::Vertex,
                attributes: attr,
            })
            .collect();

        let samples_texture = program.program.samples_texture();
        let mut layout_entries = vec![BindGroupLayoutEntry {
            binding: UNIFORM_BINDING,
            visibility: ShaderStages::VERTEX_FRAGMENT,
            ty: BindingType::Buffer {
                ty: BufferBindingType::Uniform,
                has_dynamic_offset: true,
                min_binding_size: block_size,
            },
            count: None,
        }];
        let mut group_entries = vec![wgpu::BindGroupEntry {
            binding: UNIFORM_BINDING,
            resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                buffer: inputs.uniform_buffer,
                offset: 0,
                size: block_size,
            }),
        }];
        if samples_texture {
            layout_entries.push(BindGroupLayoutEntry {
                binding: TEXTURE_BINDING,
                visibility: ShaderStages::FRAGMENT,
                ty: BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            });
            layout_entries.push(BindGroupLayoutEntry {
                binding: SAMPLER_BINDING,
                visibility: ShaderStages::FRAGMENT,
                ty: BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            });
            group_entries.push(wgpu::BindGroupEntry {
                binding: TEXTURE_BINDING,
                resource: wgpu::BindingResource::TextureView(&inputs.texture.view),
            });
            group_entries.push(wgpu::BindGroupEntry {
                binding: SAMPLER_BINDING,
                resource: wgpu::BindingResource::Sampler(&inputs.texture.sampler),
            });
        }

        let bgl = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some(label),
            entries: &layout_entries,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout: &bgl,
            entries: &group_entries,
        });

        let vs = device.create_shader_module(ShaderModuleDescriptor {
            label: Some(label),
            source: ShaderSource::Wgsl(program.program.vertex_source().into()),
        });
        let fs = device.create_shader_module(ShaderModuleDescriptor {
            label: Some(label),
            source: ShaderSource::Wgsl(program.program.fragment_source().into()),
        });

        let pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some(label),
            bind_group_layouts: &[&bgl],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_render_pipeline(&RenderPipelineDescriptor {
            label: Some(label),
            layout: Some(&pipeline_layout),
            vertex: VertexState {
                module: &vs,
                entry_point: Some(VERTEX_ENTRY),
                buffers: &buffers,
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(FragmentState {
                module: &fs,
                entry_point: Some(FRAGMENT_ENTRY),
                targets: &[Some(ColorTargetState {
                    format: inputs.surface_format,
                    blend: Some(BlendState::REPLACE),
                    write_mask: ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            // Winding may be inverted at load time, so both faces are drawn.
            primitive: wgpu::PrimitiveState {
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: Some(DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        log::info!(
            "Built pipeline '{}': vertex buffers {:?}, textured={}",
            label,
            attribute_roles,
            samples_texture
        );

        Ok(Self {
            pipeline,
            bind_group,
            attribute_roles,
        })
    }
}
