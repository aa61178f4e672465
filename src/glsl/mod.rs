pub mod parser;

use serde::{Serialize, Serializer};
use smallvec::SmallVec;

/// GLSL profile of a shader source.
///
/// [`GlslVersion::Gl2`] is selected by a `#version 300 es` directive,
/// everything else is treated as [`GlslVersion::Gl1`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GlslVersion {
    Gl1,
    Gl2,
}

impl GlslVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            GlslVersion::Gl1 => "100",
            GlslVersion::Gl2 => "300 es",
        }
    }
}

/// Closed set of GLSL types the recognisers accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GlslType {
    Void,
    Float,
    Int,
    Uint,
    Bool,
    Vec2,
    Vec3,
    Vec4,
    IVec2,
    IVec3,
    IVec4,
    UVec2,
    UVec3,
    UVec4,
    BVec2,
    BVec3,
    BVec4,
    Mat2,
    Mat3,
    Mat4,
    Sampler2D,
    SamplerCube,
    Sampler3D,
    Sampler2DArray,
}

impl GlslType {
    /// Returns the GLSL spelling of the type.
    pub fn as_str(&self) -> &'static str {
        match self {
            GlslType::Void => "void",
            GlslType::Float => "float",
            GlslType::Int => "int",
            GlslType::Uint => "uint",
            GlslType::Bool => "bool",
            GlslType::Vec2 => "vec2",
            GlslType::Vec3 => "vec3",
            GlslType::Vec4 => "vec4",
            GlslType::IVec2 => "ivec2",
            GlslType::IVec3 => "ivec3",
            GlslType::IVec4 => "ivec4",
            GlslType::UVec2 => "uvec2",
            GlslType::UVec3 => "uvec3",
            GlslType::UVec4 => "uvec4",
            GlslType::BVec2 => "bvec2",
            GlslType::BVec3 => "bvec3",
            GlslType::BVec4 => "bvec4",
            GlslType::Mat2 => "mat2",
            GlslType::Mat3 => "mat3",
            GlslType::Mat4 => "mat4",
            GlslType::Sampler2D => "sampler2D",
            GlslType::SamplerCube => "samplerCube",
            GlslType::Sampler3D => "sampler3D",
            GlslType::Sampler2DArray => "sampler2DArray",
        }
    }

    /// Tries to find a GLSL type from its spelling.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "void" => Some(GlslType::Void),
            "float" => Some(GlslType::Float),
            "int" => Some(GlslType::Int),
            "uint" => Some(GlslType::Uint),
            "bool" => Some(GlslType::Bool),
            "vec2" => Some(GlslType::Vec2),
            "vec3" => Some(GlslType::Vec3),
            "vec4" => Some(GlslType::Vec4),
            "ivec2" => Some(GlslType::IVec2),
            "ivec3" => Some(GlslType::IVec3),
            "ivec4" => Some(GlslType::IVec4),
            "uvec2" => Some(GlslType::UVec2),
            "uvec3" => Some(GlslType::UVec3),
            "uvec4" => Some(GlslType::UVec4),
            "bvec2" => Some(GlslType::BVec2),
            "bvec3" => Some(GlslType::BVec3),
            "bvec4" => Some(GlslType::BVec4),
            "mat2" => Some(GlslType::Mat2),
            "mat3" => Some(GlslType::Mat3),
            "mat4" => Some(GlslType::Mat4),
            "sampler2D" => Some(GlslType::Sampler2D),
            "samplerCube" => Some(GlslType::SamplerCube),
            "sampler3D" => Some(GlslType::Sampler3D),
            "sampler2DArray" => Some(GlslType::Sampler2DArray),
            _ => None,
        }
    }
}

impl Serialize for GlslType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

/// A typed GLSL identifier, as it appears in parameter lists.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GlslVariable {
    pub name: String,
    pub ty: GlslType,
}

/// A `uniform` declaration recognised in a shader source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShaderUniform {
    pub name: String,
    pub ty: GlslType,
    /// Array size for `T name[N]` declarations.
    pub array_num: Option<usize>,
    /// 1-based source line of the declaration.
    pub line: usize,
}

/// An `#import` directive recognised in a shader source.
#[derive(Debug, Clone, PartialEq)]
pub struct ShaderImport {
    pub name: String,
    /// Local name the imported function is called by. Defaults to `name`.
    pub alias: String,
    pub module: String,
    pub line: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyKind {
    Function,
    Uniform,
}

/// A symbol reference found inside a function body.
///
/// `index` is the offset of the reference within the body, required for
/// deterministic rewrites. Every textual occurrence is recorded.
#[derive(Debug, Clone, PartialEq)]
pub struct Dependency {
    pub kind: DependencyKind,
    pub name: String,
    pub index: usize,
}

/// A function definition recognised in a shader source.
///
/// `body` is the exact substring of the source including the opening and
/// closing braces.
#[derive(Debug, Clone, PartialEq)]
pub struct ShaderFunction {
    pub name: String,
    pub return_type: GlslType,
    pub params: SmallVec<[GlslVariable; 4]>,
    pub body: String,
    pub dependencies: Vec<Dependency>,
    pub line: usize,
}

/// Everything the parser recognises in one shader source.
#[derive(Debug, Clone, PartialEq)]
pub struct ShaderParseResult {
    pub version: GlslVersion,
    pub imports: Vec<ShaderImport>,
    pub uniforms: Vec<ShaderUniform>,
    pub functions: Vec<ShaderFunction>,
}

impl ShaderParseResult {
    /// Finds a recognised function by name.
    pub fn function(&self, name: &str) -> Option<&ShaderFunction> {
        self.functions.iter().find(|f| f.name == name)
    }

    /// Finds a recognised uniform by name.
    pub fn uniform(&self, name: &str) -> Option<&ShaderUniform> {
        self.uniforms.iter().find(|u| u.name == name)
    }
}

/// Uniforms implicitly available to every shader. The driver pushes their
/// values every frame and their names are never namespaced.
pub const BUILTIN_UNIFORMS: [(&str, GlslType); 5] = [
    ("u_resolution", GlslType::Vec2),
    ("u_time", GlslType::Float),
    ("u_delta", GlslType::Float),
    ("u_mouse", GlslType::Vec2),
    ("u_frame", GlslType::Int),
];

/// Returns `true` if `name` is one of the built-in uniforms.
pub fn is_builtin_uniform(name: &str) -> bool {
    BUILTIN_UNIFORMS.iter().any(|(builtin, _)| *builtin == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_spellings_round() {
        for s in &["float", "ivec3", "mat4", "sampler2DArray", "void"] {
            assert_eq!(GlslType::from_str(s).unwrap().as_str(), *s);
        }
        assert!(GlslType::from_str("double").is_none());
        assert!(GlslType::from_str("Sampler2D").is_none());
    }

    #[test]
    fn test_builtin_uniforms() {
        assert!(is_builtin_uniform("u_time"));
        assert!(is_builtin_uniform("u_resolution"));
        assert!(!is_builtin_uniform("u_colors"));
        assert!(!is_builtin_uniform("time"));
    }
}
