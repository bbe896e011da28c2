//! Shader programs: a WGSL vertex/fragment pair compiled, linked and
//! reflected with naga.
//!
//! Each stage lives in its own self-contained WGSL source with a fixed entry
//! point (`vs_main` / `fs_main`). Compiling a stage parses and validates it on
//! its own; linking checks that the two stages agree on their interface and
//! on every resource binding they share. The linked program exposes named
//! lookups of vertex attributes and uniform block members.

use std::{
    collections::HashMap,
    fmt, fs, io,
    path::{Path, PathBuf},
};

use naga::{
    AddressSpace, Binding, ImageClass, ImageDimension, Module, ScalarKind, ShaderStage, TypeInner,
    VectorSize,
    valid::{Capabilities, ValidationFlags, Validator},
};
use thiserror::Error;

pub const VERTEX_ENTRY: &str = "vs_main";
pub const FRAGMENT_ENTRY: &str = "fs_main";

/// Bind group shared by all resources of a program.
pub const RESOURCE_GROUP: u32 = 0;
pub const UNIFORM_BINDING: u32 = 0;
pub const TEXTURE_BINDING: u32 = 1;
pub const SAMPLER_BINDING: u32 = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Stage {
    Vertex,
    Fragment,
}

impl Stage {
    pub fn entry_point(self) -> &'static str {
        match self {
            Stage::Vertex => VERTEX_ENTRY,
            Stage::Fragment => FRAGMENT_ENTRY,
        }
    }

    fn naga(self) -> ShaderStage {
        match self {
            Stage::Vertex => ShaderStage::Vertex,
            Stage::Fragment => ShaderStage::Fragment,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Vertex => f.write_str("vertex"),
            Stage::Fragment => f.write_str("fragment"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ShaderError {
    #[error("shader source not found: {}", path.display())]
    NotFound { path: PathBuf },
    #[error("failed to read shader source {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{stage} shader failed to compile:\n{diagnostic}")]
    Compile { stage: Stage, diagnostic: String },
    #[error("shader program failed to link:\n{diagnostic}")]
    Link { diagnostic: String },
}

pub type ShaderResult<T> = Result<T, ShaderError>;

/// Shape of a uniform member or vertex input as seen by the host.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueKind {
    Float,
    Vec2,
    Vec3,
    Vec4,
    Mat4,
    /// Anything the host does not write directly (integers, arrays, structs).
    Opaque,
}

impl ValueKind {
    fn of(inner: &TypeInner) -> Self {
        match *inner {
            TypeInner::Scalar(s) if s == naga::Scalar::F32 => ValueKind::Float,
            TypeInner::Vector { size, scalar } if scalar == naga::Scalar::F32 => match size {
                VectorSize::Bi => ValueKind::Vec2,
                VectorSize::Tri => ValueKind::Vec3,
                VectorSize::Quad => ValueKind::Vec4,
            },
            TypeInner::Matrix {
                columns: VectorSize::Quad,
                rows: VectorSize::Quad,
                scalar,
            } if scalar == naga::Scalar::F32 => ValueKind::Mat4,
            _ => ValueKind::Opaque,
        }
    }
}

/// Where a uniform lives inside the program's uniform block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UniformLocation {
    pub offset: u32,
    pub size: u32,
    pub kind: ValueKind,
}

/// Shader input slot of a vertex attribute.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AttributeLocation {
    pub location: u32,
    pub kind: ValueKind,
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct UniformMember {
    name: String,
    location: UniformLocation,
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct UniformLayout {
    span: u32,
    members: Vec<UniformMember>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum ResourceKind {
    UniformBlock(UniformLayout),
    Texture2d,
    Sampler,
    Unsupported(String),
}

#[derive(Clone, Debug)]
struct Resource {
    name: String,
    group: u32,
    binding: u32,
    kind: ResourceKind,
}

/// A `@location` on a stage boundary.
#[derive(Clone, Debug)]
struct Varying {
    location: u32,
    name: String,
    ty: TypeInner,
}

/// Interface of one compiled stage.
#[derive(Debug)]
struct CompiledStage {
    stage: Stage,
    inputs: Vec<Varying>,
    outputs: Vec<Varying>,
    resources: Vec<Resource>,
}

fn compile_error(stage: Stage, diagnostic: impl Into<String>) -> ShaderError {
    ShaderError::Compile {
        stage,
        diagnostic: diagnostic.into(),
    }
}

fn compile_stage(stage: Stage, source: &str) -> ShaderResult<CompiledStage> {
    let module = naga::front::wgsl::parse_str(source)
        .map_err(|e| compile_error(stage, e.emit_to_string(source)))?;

    let mut validator = Validator::new(ValidationFlags::all(), Capabilities::all());
    validator
        .validate(&module)
        .map_err(|e| compile_error(stage, e.emit_to_string(source)))?;

    let entry = module
        .entry_points
        .iter()
        .find(|ep| ep.stage == stage.naga() && ep.name == stage.entry_point())
        .ok_or_else(|| {
            compile_error(
                stage,
                format!("missing @{stage} entry point `{}`", stage.entry_point()),
            )
        })?;

    let mut inputs = Vec::new();
    for arg in &entry.function.arguments {
        let name = arg.name.clone().unwrap_or_default();
        collect_varyings(&module, &name, arg.ty, arg.binding.as_ref(), &mut inputs);
    }

    let mut outputs = Vec::new();
    if let Some(result) = &entry.function.result {
        collect_varyings(&module, "", result.ty, result.binding.as_ref(), &mut outputs);
    }

    let resources = module
        .global_variables
        .iter()
        .filter_map(|(_, var)| {
            let binding = var.binding.as_ref()?;
            Some(Resource {
                name: var.name.clone().unwrap_or_default(),
                group: binding.group,
                binding: binding.binding,
                kind: resource_kind(&module, var.space, var.ty),
            })
        })
        .collect();

    Ok(CompiledStage {
        stage,
        inputs,
        outputs,
        resources,
    })
}

/// Flatten an entry point argument or result into its `@location`s.
/// Builtins are not part of the linked interface.
fn collect_varyings(
    module: &Module,
    name: &str,
    ty: naga::Handle<naga::Type>,
    binding: Option<&Binding>,
    out: &mut Vec<Varying>,
) {
    let inner = &module.types[ty].inner;
    match binding {
        Some(Binding::Location { location, .. }) => out.push(Varying {
            location: *location,
            name: name.to_string(),
            ty: inner.clone(),
        }),
        Some(Binding::BuiltIn(_)) => {}
        None => {
            if let TypeInner::Struct { members, .. } = inner {
                for member in members {
                    let member_name = member.name.clone().unwrap_or_default();
                    collect_varyings(module, &member_name, member.ty, member.binding.as_ref(), out);
                }
            }
        }
    }
}

fn resource_kind(
    module: &Module,
    space: AddressSpace,
    ty: naga::Handle<naga::Type>,
) -> ResourceKind {
    let inner = &module.types[ty].inner;
    match (space, inner) {
        (AddressSpace::Uniform, TypeInner::Struct { members, span }) => {
            let members = members
                .iter()
                .map(|m| {
                    let member_inner = &module.types[m.ty].inner;
                    UniformMember {
                        name: m.name.clone().unwrap_or_default(),
                        location: UniformLocation {
                            offset: m.offset,
                            size: member_inner.size(module.to_ctx()),
                            kind: ValueKind::of(member_inner),
                        },
                    }
                })
                .collect();
            ResourceKind::UniformBlock(UniformLayout {
                span: *span,
                members,
            })
        }
        (
            AddressSpace::Handle,
            TypeInner::Image {
                dim: ImageDimension::D2,
                arrayed: false,
                class:
                    ImageClass::Sampled {
                        kind: ScalarKind::Float,
                        multi: false,
                    },
            },
        ) => ResourceKind::Texture2d,
        (AddressSpace::Handle, TypeInner::Sampler { comparison: false }) => ResourceKind::Sampler,
        (space, inner) => ResourceKind::Unsupported(format!("{space:?} {}", describe(inner))),
    }
}

fn describe(inner: &TypeInner) -> String {
    match *inner {
        TypeInner::Scalar(s) => format!("{:?}{}", s.kind, s.width as u32 * 8),
        TypeInner::Vector { size, scalar } => {
            format!("vec{}<{:?}{}>", size as u8, scalar.kind, scalar.width as u32 * 8)
        }
        ref other => format!("{other:?}"),
    }
}

/// Check that a vertex and a fragment stage form a usable program.
fn link(vs: &CompiledStage, fs: &CompiledStage) -> ShaderResult<()> {
    let mut problems = Vec::new();

    for input in &fs.inputs {
        match vs.outputs.iter().find(|o| o.location == input.location) {
            None => problems.push(format!(
                "fragment input `{}` @location({}) is not written by the vertex stage",
                input.name, input.location
            )),
            Some(output) if output.ty != input.ty => problems.push(format!(
                "@location({}) is {} in the vertex stage but {} in the fragment stage",
                input.location,
                describe(&output.ty),
                describe(&input.ty)
            )),
            Some(_) => {}
        }
    }

    for stage in [vs, fs] {
        for res in &stage.resources {
            let expected = match res.kind {
                ResourceKind::UniformBlock(_) => Some(UNIFORM_BINDING),
                ResourceKind::Texture2d => Some(TEXTURE_BINDING),
                ResourceKind::Sampler => Some(SAMPLER_BINDING),
                ResourceKind::Unsupported(ref what) => {
                    problems.push(format!(
                        "{} stage resource `{}` has unsupported type {what}",
                        stage.stage, res.name
                    ));
                    None
                }
            };
            if let Some(binding) = expected
                && (res.group != RESOURCE_GROUP || res.binding != binding)
            {
                let wanted = format!("@group({RESOURCE_GROUP}) @binding({binding})");
                problems.push(format!(
                    "{} stage resource `{}` is bound at @group({}) @binding({}), expected {wanted}",
                    stage.stage, res.name, res.group, res.binding
                ));
            }
        }
    }

    for res in &fs.resources {
        let shared = vs
            .resources
            .iter()
            .find(|v| v.group == res.group && v.binding == res.binding);
        if let Some(v) = shared {
            if v.kind != res.kind {
                problems.push(format!(
                    "@group({}) @binding({}) differs between stages (`{}` vs `{}`)",
                    res.group, res.binding, v.name, res.name
                ));
            }
        }
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(ShaderError::Link {
            diagnostic: problems.join("\n"),
        })
    }
}

/// A linked vertex + fragment program.
///
/// Lookups resolve against the linked interface and stay valid for the
/// program's lifetime. A name the program does not declare yields `None`;
/// that is not an error, as shader variants may drop unused inputs.
#[derive(Clone, Debug)]
pub struct ShaderProgram {
    label: String,
    vertex_source: String,
    fragment_source: String,
    uniform_block_size: u32,
    uniforms: HashMap<String, UniformLocation>,
    attributes: HashMap<String, AttributeLocation>,
    samples_texture: bool,
}

impl ShaderProgram {
    /// Read, compile and link a program from two WGSL files.
    pub fn load(
        vertex_path: impl AsRef<Path>,
        fragment_path: impl AsRef<Path>,
    ) -> ShaderResult<Self> {
        let vertex_path = vertex_path.as_ref();
        let fragment_path = fragment_path.as_ref();
        let vertex_source = read_source(vertex_path)?;
        let fragment_source = read_source(fragment_path)?;

        let label = vertex_path
            .file_stem()
            .map(|s| s.to_string_lossy().trim_end_matches("_vertex").to_string())
            .unwrap_or_else(|| "program".to_string());

        let program = Self::from_sources(label, vertex_source, fragment_source)?;
        log::info!(
            "Linked shader program '{}' ({} + {}): {} attributes, {} uniforms, block {} bytes",
            program.label,
            vertex_path.display(),
            fragment_path.display(),
            program.attributes.len(),
            program.uniforms.len(),
            program.uniform_block_size
        );
        Ok(program)
    }

    /// Compile and link a program from in-memory WGSL sources.
    pub fn from_sources(
        label: impl Into<String>,
        vertex_source: impl Into<String>,
        fragment_source: impl Into<String>,
    ) -> ShaderResult<Self> {
        let vertex_source = vertex_source.into();
        let fragment_source = fragment_source.into();

        let vs = compile_stage(Stage::Vertex, &vertex_source)?;
        let fs = compile_stage(Stage::Fragment, &fragment_source)?;
        link(&vs, &fs)?;

        let mut uniform_block_size = 0;
        let mut uniforms = HashMap::new();
        let mut samples_texture = false;
        for res in vs.resources.iter().chain(&fs.resources) {
            match &res.kind {
                ResourceKind::UniformBlock(layout) => {
                    uniform_block_size = layout.span;
                    for member in &layout.members {
                        uniforms.insert(member.name.clone(), member.location);
                    }
                }
                ResourceKind::Texture2d => samples_texture = true,
                ResourceKind::Sampler | ResourceKind::Unsupported(_) => {}
            }
        }

        let attributes = vs
            .inputs
            .iter()
            .map(|v| {
                (
                    v.name.clone(),
                    AttributeLocation {
                        location: v.location,
                        kind: ValueKind::of(&v.ty),
                    },
                )
            })
            .collect();

        Ok(Self {
            label: label.into(),
            vertex_source,
            fragment_source,
            uniform_block_size,
            uniforms,
            attributes,
            samples_texture,
        })
    }

    pub fn uniform_location(&self, name: &str) -> Option<UniformLocation> {
        self.uniforms.get(name).copied()
    }

    pub fn attribute_location(&self, name: &str) -> Option<AttributeLocation> {
        self.attributes.get(name).copied()
    }

    /// Size in bytes of the uniform block, `0` if the program declares none.
    pub fn uniform_block_size(&self) -> u32 {
        self.uniform_block_size
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, AttributeLocation)> {
        self.attributes.iter().map(|(name, loc)| (name.as_str(), *loc))
    }

    /// `true` if either stage samples the program texture.
    pub fn samples_texture(&self) -> bool {
        self.samples_texture
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn vertex_source(&self) -> &str {
        &self.vertex_source
    }

    pub fn fragment_source(&self) -> &str {
        &self.fragment_source
    }
}

fn read_source(path: &Path) -> ShaderResult<String> {
    fs::read_to_string(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => ShaderError::NotFound {
            path: path.to_path_buf(),
        },
        _ => ShaderError::Io {
            path: path.to_path_buf(),
            source: e,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const PHONG_VS: &str = include_str!("../../../assets/shaders/phong_vertex.wgsl");
    const PHONG_FS: &str = include_str!("../../../assets/shaders/phong_fragment.wgsl");
    const GOURAUD_VS: &str = include_str!("../../../assets/shaders/gouraud_vertex.wgsl");
    const GOURAUD_FS: &str = include_str!("../../../assets/shaders/gouraud_fragment.wgsl");

    const MINIMAL_VS: &str = r#"
struct Out {
    @builtin(position) pos: vec4<f32>,
    @location(0) tint: vec3<f32>,
};
@vertex
fn vs_main(@location(0) position: vec3<f32>) -> Out {
    var o: Out;
    o.pos = vec4<f32>(position, 1.0);
    o.tint = position;
    return o;
}
"#;

    #[test]
    fn phong_program_links_and_reflects() {
        let program = ShaderProgram::from_sources("phong", PHONG_VS, PHONG_FS).unwrap();
        assert_eq!(program.uniform_block_size(), 176);
        assert!(program.samples_texture());

        let mvp = program.uniform_location("mvp_matrix").unwrap();
        assert_eq!((mvp.offset, mvp.size, mvp.kind), (0, 64, ValueKind::Mat4));
        let light = program.uniform_location("light_pos").unwrap();
        assert_eq!((light.offset, light.kind), (128, ValueKind::Vec3));
        let shininess = program.uniform_location("shininess").unwrap();
        assert_eq!((shininess.offset, shininess.kind), (140, ValueKind::Float));
        let colour = program.uniform_location("diffuse_colour").unwrap();
        assert_eq!((colour.offset, colour.kind), (160, ValueKind::Vec4));

        let position = program.attribute_location("position").unwrap();
        assert_eq!((position.location, position.kind), (0, ValueKind::Vec3));
        let uv = program.attribute_location("texture_coords").unwrap();
        assert_eq!((uv.location, uv.kind), (1, ValueKind::Vec2));
        assert_eq!(program.attribute_location("normal").unwrap().location, 2);
    }

    #[test]
    fn gouraud_program_omits_texture_inputs() {
        let program = ShaderProgram::from_sources("gouraud", GOURAUD_VS, GOURAUD_FS).unwrap();
        assert!(!program.samples_texture());
        assert!(program.attribute_location("texture_coords").is_none());
        assert!(program.attribute_location("normal").is_some());
        assert!(program.uniform_location("eye_position").is_some());
    }

    #[test]
    fn absent_names_return_sentinel() {
        let program = ShaderProgram::from_sources("phong", PHONG_VS, PHONG_FS).unwrap();
        assert_eq!(program.uniform_location("nonexistent_name"), None);
        assert_eq!(program.attribute_location("nonexistent_name"), None);
    }

    #[test]
    fn invalid_fragment_source_is_a_fragment_compile_error() {
        let broken =
            "@fragment fn fs_main() -> @location(0) vec4<f32> { return vec4<f32>(1.0, oops); }";
        match ShaderProgram::from_sources("broken", MINIMAL_VS, broken) {
            Err(ShaderError::Compile { stage, diagnostic }) => {
                assert_eq!(stage, Stage::Fragment);
                assert!(!diagnostic.is_empty());
            }
            other => panic!("expected fragment compile error, got {other:?}"),
        }
    }

    #[test]
    fn invalid_vertex_source_is_a_vertex_compile_error() {
        let err = ShaderProgram::from_sources("broken", "fn vs_main( {", GOURAUD_FS).unwrap_err();
        assert!(matches!(err, ShaderError::Compile { stage: Stage::Vertex, .. }));
    }

    #[test]
    fn missing_entry_point_is_a_compile_error() {
        let fs = "@fragment fn main() -> @location(0) vec4<f32> { return vec4<f32>(1.0); }";
        let err = ShaderProgram::from_sources("p", MINIMAL_VS, fs).unwrap_err();
        match err {
            ShaderError::Compile { stage, diagnostic } => {
                assert_eq!(stage, Stage::Fragment);
                assert!(diagnostic.contains(FRAGMENT_ENTRY));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[rstest]
    #[case::unwritten_location(
        "@fragment fn fs_main(@location(1) x: vec3<f32>) -> @location(0) vec4<f32> { \
         return vec4<f32>(x, 1.0); }",
        "@location(1)"
    )]
    #[case::type_mismatch(
        "@fragment fn fs_main(@location(0) x: vec4<f32>) -> @location(0) vec4<f32> { return x; }",
        "@location(0)"
    )]
    #[case::wrong_binding(
        "@group(0) @binding(3) var t: texture_2d<f32>;
         @group(0) @binding(2) var s: sampler;
         @fragment fn fs_main(@location(0) x: vec3<f32>) -> @location(0) vec4<f32> {
             return textureSample(t, s, x.xy);
         }",
        "@binding(3)"
    )]
    fn interface_mismatch_is_a_link_error(#[case] fs: &str, #[case] needle: &str) {
        match ShaderProgram::from_sources("p", MINIMAL_VS, fs) {
            Err(ShaderError::Link { diagnostic }) => {
                assert!(diagnostic.contains(needle), "{diagnostic}")
            }
            other => panic!("expected link error, got {other:?}"),
        }
    }

    #[test]
    fn differing_uniform_layouts_do_not_link() {
        let vs = r#"
struct U { mvp_matrix: mat4x4<f32>, tint: vec4<f32> };
@group(0) @binding(0) var<uniform> u: U;
@vertex
fn vs_main(@location(0) position: vec3<f32>) -> @builtin(position) vec4<f32> {
    return u.mvp_matrix * vec4<f32>(position, 1.0);
}
"#;
        let fs = r#"
struct U { tint: vec4<f32> };
@group(0) @binding(0) var<uniform> u: U;
@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return u.tint;
}
"#;
        let err = ShaderProgram::from_sources("p", vs, fs).unwrap_err();
        assert!(matches!(err, ShaderError::Link { .. }));
    }

    #[test]
    fn load_reports_missing_files() {
        let err = ShaderProgram::load("no/such/vertex.wgsl", "no/such/fragment.wgsl").unwrap_err();
        assert!(matches!(err, ShaderError::NotFound { ref path } if path.ends_with("vertex.wgsl")));
    }

    #[test]
    fn load_reads_program_from_disk() {
        let dir = std::env::temp_dir().join(format!("orrery-shaders-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let vs = dir.join("gouraud_vertex.wgsl");
        let fs_path = dir.join("gouraud_fragment.wgsl");
        fs::write(&vs, GOURAUD_VS).unwrap();
        fs::write(&fs_path, GOURAUD_FS).unwrap();
        let program = ShaderProgram::load(&vs, &fs_path);
        fs::remove_dir_all(&dir).ok();
        let program = program.unwrap();
        assert_eq!(program.label(), "gouraud");
        assert_eq!(program.uniform_block_size(), 176);
    }
}
