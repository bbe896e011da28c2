//! Semantic-role lookups resolved once per linked program.

use crate::shader::{AttributeLocation, ShaderProgram, UniformLocation};

/// Per-vertex inputs the renderer supplies from the shared mesh buffers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AttributeRole {
    Position,
    TextureCoords,
    Normal,
}

impl AttributeRole {
    pub const ALL: [AttributeRole; 3] = [
        AttributeRole::Position,
        AttributeRole::TextureCoords,
        AttributeRole::Normal,
    ];

    /// Input name in the vertex stage.
    pub fn name(self) -> &'static str {
        match self {
            AttributeRole::Position => "position",
            AttributeRole::TextureCoords => "texture_coords",
            AttributeRole::Normal => "normal",
        }
    }
}

/// Per-draw values written into the uniform block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UniformRole {
    Mvp,
    ModelView,
    LightPos,
    EyePosition,
    DiffuseColour,
    Shininess,
}

impl UniformRole {
    pub const ALL: [UniformRole; 6] = [
        UniformRole::Mvp,
        UniformRole::ModelView,
        UniformRole::LightPos,
        UniformRole::EyePosition,
        UniformRole::DiffuseColour,
        UniformRole::Shininess,
    ];

    /// Member name in the uniform block.
    pub fn name(self) -> &'static str {
        match self {
            UniformRole::Mvp => "mvp_matrix",
            UniformRole::ModelView => "mv_matrix",
            UniformRole::LightPos => "light_pos",
            UniformRole::EyePosition => "eye_position",
            UniformRole::DiffuseColour => "diffuse_colour",
            UniformRole::Shininess => "shininess",
        }
    }
}

/// Locations of every role in one program; `None` where the program does
/// not declare it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProgramBindings {
    attributes: [Option<AttributeLocation>; 3],
    uniforms: [Option<UniformLocation>; 6],
}

impl ProgramBindings {
    pub fn resolve(program: &ShaderProgram) -> Self {
        let attributes = AttributeRole::ALL.map(|role| program.attribute_location(role.name()));
        let uniforms = UniformRole::ALL.map(|role| program.uniform_location(role.name()));

        for (role, loc) in AttributeRole::ALL.iter().zip(&attributes) {
            if loc.is_none() {
                log::debug!("program '{}' has no `{}` attribute", program.label(), role.name());
            }
        }
        for (role, loc) in UniformRole::ALL.iter().zip(&uniforms) {
            if loc.is_none() {
                log::debug!("program '{}' has no `{}` uniform", program.label(), role.name());
            }
        }

        Self {
            attributes,
            uniforms,
        }
    }

    #[inline]
    pub fn attribute(&self, role: AttributeRole) -> Option<AttributeLocation> {
        self.attributes[role as usize]
    }

    #[inline]
    pub fn uniform(&self, role: UniformRole) -> Option<UniformLocation> {
        self.uniforms[role as usize]
    }

    /// Roles with a shader input, in role order.
    pub fn bound_attributes(
        &self,
    ) -> impl Iterator<Item = (AttributeRole, AttributeLocation)> + '_ {
        AttributeRole::ALL
            .iter()
            .filter_map(|role| self.attribute(*role).map(|loc| (*role, loc)))
    }
}

/// A linked program together with its resolved roles.
#[derive(Clone, Debug)]
pub struct ResolvedProgram {
    pub program: ShaderProgram,
    pub bindings: ProgramBindings,
}

impl ResolvedProgram {
    pub fn new(program: ShaderProgram) -> Self {
        let bindings = ProgramBindings::resolve(&program);
        Self { program, bindings }
    }

    /// Vertex inputs that no mesh buffer can feed.
    pub fn unsupplied_attributes(&self) -> Vec<String> {
        self.program
            .attributes()
            .filter(|(name, _)| !AttributeRole::ALL.iter().any(|r| r.name() == *name))
            .map(|(name, _)| name.to_string())
            .collect()
    }
}
