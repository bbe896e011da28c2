//! GPU-resident copies of the shared scene assets.

use anyhow::{Result, ensure};
use asset::{IndexedMesh, TextureData};
use wgpu::util::DeviceExt;
use wgpu::{
    Buffer, BufferUsages, Device, Extent3d, Queue, Sampler, SurfaceConfiguration, TextureDescriptor,
    TextureDimension, TextureFormat, TextureUsages, TextureView, TextureViewDescriptor,
    VertexFormat,
};

use crate::bindings::AttributeRole;
use crate::shader::ValueKind;

pub const DEPTH_FORMAT: TextureFormat = TextureFormat::Depth32Float;

/// The diffuse texture is uploaded without a mip chain.
const DIFFUSE_MIP_LEVELS: u32 = 1;

/// Buffer format and shader-side kind each attribute role is stored as.
pub fn attribute_format(role: AttributeRole) -> (VertexFormat, ValueKind) {
    match role {
        AttributeRole::Position | AttributeRole::Normal => {
            (VertexFormat::Float32x3, ValueKind::Vec3)
        }
        AttributeRole::TextureCoords => (VertexFormat::Float32x2, ValueKind::Vec2),
    }
}

/// One vertex buffer per attribute plus a 32-bit index buffer, shared by all
/// instances.
pub struct MeshBuffers {
    positions: Buffer,
    texcoords: Buffer,
    normals: Buffer,
    pub indices: Buffer,
    pub index_count: u32,
}

impl MeshBuffers {
    pub fn upload(device: &Device, mesh: &IndexedMesh) -> Result<Self> {
        ensure!(mesh.is_valid(), "mesh arrays are inconsistent or reference missing vertices");
        ensure!(mesh.index_count() > 0, "mesh has no triangles");

        let vertex = |label: &str, contents: &[u8]| {
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents,
                usage: BufferUsages::VERTEX,
            })
        };

        let positions = vertex("Mesh positions", bytemuck::cast_slice(&mesh.positions));
        let texcoords = vertex("Mesh texcoords", bytemuck::cast_slice(&mesh.texcoords));
        let normals = vertex("Mesh normals", bytemuck::cast_slice(&mesh.normals));
        let indices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Mesh indices"),
            contents: bytemuck::cast_slice(&mesh.indices),
            usage: BufferUsages::INDEX,
        });

        log::info!(
            "Uploaded mesh: {} vertices, {} triangles",
            mesh.vertex_count(),
            mesh.triangle_count()
        );

        Ok(Self {
            positions,
            texcoords,
            normals,
            indices,
            index_count: mesh.index_count() as u32,
        })
    }

    pub fn buffer(&self, role: AttributeRole) -> &Buffer {
        match role {
            AttributeRole::Position => &self.positions,
            AttributeRole::TextureCoords => &self.texcoords,
            AttributeRole::Normal => &self.normals,
        }
    }
}

/// The diffuse texture with its sampler. Uploaded once, bound for every draw
/// that samples it.
pub struct DiffuseTexture {
    pub view: TextureView,
    pub sampler: Sampler,
}

impl DiffuseTexture {
    pub fn upload(device: &Device, queue: &Queue, data: &TextureData) -> Result<Self> {
        ensure!(data.is_valid(), "texture data does not match {}x{}", data.width, data.height);

        let size = Extent3d {
            width: data.width,
            height: data.height,
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&TextureDescriptor {
            label: Some("Diffuse texture"),
            size,
            mip_level_count: DIFFUSE_MIP_LEVELS,
            sample_count: 1,
            dimension: TextureDimension::D2,
            format: TextureFormat::Rgba8UnormSrgb,
            usage: TextureUsages::TEXTURE_BINDING | TextureUsages::COPY_DST,
            view_formats: &[],
        });
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &data.data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(data.bytes_per_row()),
                rows_per_image: Some(data.height),
            },
            size,
        );

        let sampler = device.create_sampler(&diffuse_sampler_descriptor());

        Ok(Self {
            view: texture.create_view(&TextureViewDescriptor::default()),
            sampler,
        })
    }
}

/// Bilinear, clamped. With a single mip level there is nothing to filter
/// between, so the mipmap filter stays at its default.
fn diffuse_sampler_descriptor() -> wgpu::SamplerDescriptor<'static> {
    wgpu::SamplerDescriptor {
        label: Some("Diffuse sampler"),
        address_mode_u: wgpu::AddressMode::ClampToEdge,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        ..Default::default()
    }
}

/// Create a depth texture view matching the surface config.
pub fn create_depth_view(device: &Device, sc: &SurfaceConfiguration) -> TextureView {
    let tex = device.create_texture(&TextureDescriptor {
        label: Some("DepthTex"),
        size: Extent3d {
            width: sc.width.max(1),
            height: sc.height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    tex.create_view(&TextureViewDescriptor::default())
}
