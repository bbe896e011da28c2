//! Command-line options.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use corelib::LightWave;
use renderer::scene::SceneConfig;

/// GPU API to request from wgpu.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum GpuBackend {
    /// Let wgpu pick.
    #[default]
    Auto,
    #[value(alias = "vk")]
    Vulkan,
    #[value(alias = "d3d12")]
    Dx12,
    #[value(alias = "mtl")]
    Metal,
    #[value(alias = "opengl", alias = "gles")]
    Gl,
}

impl From<GpuBackend> for wgpu::Backends {
    fn from(b: GpuBackend) -> Self {
        match b {
            GpuBackend::Auto => wgpu::Backends::all(),
            GpuBackend::Vulkan => wgpu::Backends::VULKAN,
            GpuBackend::Dx12 => wgpu::Backends::DX12,
            GpuBackend::Metal => wgpu::Backends::METAL,
            GpuBackend::Gl => wgpu::Backends::GL,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Wave {
    #[default]
    Sine,
    Cosine,
}

impl From<Wave> for LightWave {
    fn from(w: Wave) -> Self {
        match w {
            Wave::Sine => LightWave::Sine,
            Wave::Cosine => LightWave::Cosine,
        }
    }
}

/// Render a lit mesh and its orbiting copies.
#[derive(Parser, Debug)]
#[command(name = "orrery", version, about)]
pub struct Args {
    /// GPU API.
    #[arg(long, default_value = "auto", value_enum)]
    pub gpu_backend: GpuBackend,

    /// Initial window size, e.g. 800x600.
    #[arg(long, default_value = "800x600", value_parser = parse_size)]
    pub size: (u32, u32),

    /// OBJ mesh drawn by every instance.
    #[arg(long, default_value = "assets/meshes/cube.obj")]
    pub mesh: PathBuf,

    /// Diffuse texture for per-pixel shading; a checkerboard when omitted.
    #[arg(long)]
    pub texture: Option<PathBuf>,

    /// Directory holding `{phong,gouraud}_{vertex,fragment}.wgsl`.
    #[arg(long, default_value = "assets/shaders")]
    pub shader_dir: PathBuf,

    /// Reverse the winding of every loaded triangle.
    #[arg(long)]
    pub invert_winding: bool,

    /// Keep missing normals as zero vectors instead of generating them.
    #[arg(long)]
    pub no_generate_normals: bool,

    #[arg(long, default_value_t = 45.0)]
    pub main_shininess: f32,

    #[arg(long, default_value_t = 25.0)]
    pub satellite_shininess: f32,

    /// Waveform of the light animation.
    #[arg(long, default_value = "sine", value_enum)]
    pub light_wave: Wave,

    /// Show the frame rate in the window title.
    #[arg(long)]
    pub show_fps: bool,
}

impl Args {
    pub fn scene_config(&self) -> SceneConfig {
        SceneConfig {
            main_shininess: self.main_shininess,
            satellite_shininess: self.satellite_shininess,
            light_wave: self.light_wave.into(),
        }
    }
}

/// Parse `WIDTHxHEIGHT`; both must be non-zero.
fn parse_size(s: &str) -> Result<(u32, u32), String> {
    let (w, h) = s
        .split_once('x')
        .or_else(|| s.split_once('X'))
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{s}'"))?;
    let w: u32 = w.trim().parse().map_err(|e| format!("bad width '{w}': {e}"))?;
    let h: u32 = h.trim().parse().map_err(|e| format!("bad height '{h}': {e}"))?;
    if w == 0 || h == 0 {
        return Err(format!("size must be non-zero, got {w}x{h}"));
    }
    Ok((w, h))
}
