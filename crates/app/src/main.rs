//! Entry point for Orrery.

use anyhow::{Context, Result};
use asset::{LoadOptions, TextureData, load_obj_from_path};
use clap::Parser;
use corelib::FrameState;
use corelib::frame::DEFAULT_EYE;
use platform::PlatformConfig;
use renderer::SceneAssets;
use renderer::bindings::ResolvedProgram;
use renderer::scene::{PerShading, ProgramSet, Scene};
use renderer::shader::ShaderProgram;

mod args;

use args::Args;

/// Side length of the generated fallback texture.
const CHECKER_SIZE: u32 = 256;

fn load_program(args: &Args, name: &str) -> Result<ResolvedProgram> {
    let vs = args.shader_dir.join(format!("{name}_vertex.wgsl"));
    let fs = args.shader_dir.join(format!("{name}_fragment.wgsl"));
    let program = ShaderProgram::load(&vs, &fs)
        .with_context(|| format!("loading '{name}' program"))?;
    Ok(ResolvedProgram::new(program))
}

fn load_assets(args: &Args) -> Result<SceneAssets> {
    let options = LoadOptions::new(!args.no_generate_normals, args.invert_winding);
    let mesh = load_obj_from_path(&args.mesh, options)
        .with_context(|| format!("loading mesh {}", args.mesh.display()))?;

    let texture = match &args.texture {
        Some(path) => TextureData::load(path)?,
        None => {
            log::info!("No texture given; using a {CHECKER_SIZE}x{CHECKER_SIZE} checkerboard");
            TextureData::create_test_texture(CHECKER_SIZE)
        }
    };

    let programs: ProgramSet =
        PerShading::new(load_program(args, "phong")?, load_program(args, "gouraud")?);
    let scene = Scene::with_defaults(&args.scene_config(), mesh.index_count() as u32);

    Ok(SceneAssets {
        mesh,
        texture,
        programs,
        scene,
    })
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let (width, height) = args.size;
    log::info!(
        "Starting Orrery. Backend: {:?}, show_fps={}, window_size={}x{}",
        args.gpu_backend,
        args.show_fps,
        width,
        height
    );

    let assets = load_assets(&args)?;
    let config = PlatformConfig {
        width,
        height,
        backends: args.gpu_backend.into(),
        show_fps: args.show_fps,
        ..PlatformConfig::default()
    };
    let frame = FrameState::new(DEFAULT_EYE, args.scene_config().light_wave);

    platform::run_with_renderer(config, assets, frame)?;

    log::info!("Graceful shutdown. Bye!");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workspace_args(extra: &[&str]) -> Args {
        let root = concat!(env!("CARGO_MANIFEST_DIR"), "/../..");
        let mesh = format!("{root}/assets/meshes/cube.obj");
        let shaders = format!("{root}/assets/shaders");
        let mut argv = vec!["orrery", "--mesh", &mesh, "--shader-dir", &shaders];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn bundled_assets_load() {
        let assets = load_assets(&workspace_args(&[])).unwrap();
        assert_eq!(assets.mesh.index_count(), 36);
        assert_eq!(assets.scene.index_count(), 36);
        assert_eq!(assets.scene.instances().len(), 5);
        assert!(assets.programs.per_pixel.program.samples_texture());
        assert!(!assets.programs.per_vertex.program.samples_texture());
        assert!(assets.texture.is_valid());
    }

    #[test]
    fn missing_texture_is_fatal() {
        let args = workspace_args(&["--texture", "no/such/texture.png"]);
        assert!(load_assets(&args).is_err());
    }

    #[test]
    fn missing_shader_dir_is_fatal() {
        let args = workspace_args(&["--shader-dir", "no/such/dir"]);
        let err = load_assets(&args).err().unwrap();
        assert!(format!("{err:#}").contains("phong"));
    }
}
