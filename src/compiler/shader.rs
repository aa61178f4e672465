use std::borrow::Cow;

use rand::RngCore;

use super::{Compilable, Requirements};
use crate::error::Error;
use crate::glsl::{GlslVersion, ShaderUniform, BUILTIN_UNIFORMS};
use crate::module::registry::ModuleRegistry;

/// A user fragment shader.
///
/// A [`Compilable`] whose requirements are pre-seeded with the five
/// built-in uniforms, so they are declared in the output even when the
/// author never references them; drivers quietly drop any location the
/// GLSL compiler optimised away. Shaders host user code and trigger
/// compilation, they never contribute functions of their own.
pub struct Shader {
    inner: Compilable,
}

impl Shader {
    pub fn new<S>(source: S) -> Self
    where
        S: Into<Cow<'static, str>>,
    {
        Self {
            inner: Compilable::with_required_uniforms(source, builtin_requirements()),
        }
    }

    /// See [`Compilable::set_rng`].
    pub fn set_rng(&mut self, rng: Box<dyn RngCore>) {
        self.inner.set_rng(rng);
    }

    pub fn source(&self) -> &str {
        self.inner.source()
    }

    pub fn set_source<S>(&mut self, source: S)
    where
        S: Into<Cow<'static, str>>,
    {
        self.inner.set_source(source);
    }

    pub fn version(&self) -> GlslVersion {
        self.inner.version()
    }

    pub fn is_compiled(&self) -> bool {
        self.inner.is_compiled()
    }

    pub fn compiled_source(&self) -> Option<&str> {
        self.inner.compiled_source()
    }

    pub fn requirements(&self) -> &Requirements {
        self.inner.requirements()
    }

    /// Compiles the shader. The author must define at least one function.
    pub fn compile(&mut self, runtime: &mut ModuleRegistry) -> Result<&str, Error> {
        if self.inner.parse_original()?.functions.is_empty() {
            return Err(Error::NoFunctionDefined);
        }
        self.inner.compile(runtime)
    }

    pub fn recompile(&mut self, runtime: &mut ModuleRegistry) -> Result<&str, Error> {
        if self.inner.parse_original()?.functions.is_empty() {
            return Err(Error::NoFunctionDefined);
        }
        self.inner.recompile(runtime)
    }
}

fn builtin_requirements() -> Vec<ShaderUniform> {
    BUILTIN_UNIFORMS
        .iter()
        .map(|(name, ty)| ShaderUniform {
            name: (*name).to_string(),
            ty: *ty,
            array_num: None,
            line: 0,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::glsl::GlslType;

    #[test]
    fn test_builtins_declared_once_unprefixed() {
        let mut shader = Shader::new("void main() {\n    gl_FragColor = vec4(u_time);\n}\n");
        let mut runtime = ModuleRegistry::new();
        let compiled = shader.compile(&mut runtime).unwrap().to_string();

        for (name, ty) in BUILTIN_UNIFORMS.iter() {
            let declaration = format!("uniform {} {};", ty.as_str(), name);
            assert_eq!(
                compiled.matches(&declaration).count(),
                1,
                "{} declared once",
                name
            );
        }
        // declarations precede the author's code
        assert!(compiled.find("uniform vec2 u_resolution;").unwrap() < compiled.find("void main()").unwrap());
    }

    #[test]
    fn test_author_declaration_is_kept() {
        let mut shader = Shader::new("uniform float u_time;\nvoid main() {}\n");
        let mut runtime = ModuleRegistry::new();
        let compiled = shader.compile(&mut runtime).unwrap().to_string();

        assert_eq!(compiled.matches("uniform float u_time;").count(), 1);
    }

    #[test]
    fn test_builtin_type_conflict() {
        let mut shader = Shader::new("uniform vec4 u_time;\nvoid main() {}\n");
        let mut runtime = ModuleRegistry::new();

        match shader.compile(&mut runtime) {
            Err(Error::UniformTypeMismatch {
                name,
                expected,
                actual,
            }) => {
                assert_eq!(name, "u_time");
                assert_eq!(expected, GlslType::Float);
                assert_eq!(actual, GlslType::Vec4);
            }
            other => panic!("compiled: {:?}", other.map(|s| s.to_string())),
        }
    }

    #[test]
    fn test_author_must_define_a_function() {
        let mut shader = Shader::new("uniform float u_fade;\n");
        let mut runtime = ModuleRegistry::new();

        match shader.compile(&mut runtime) {
            Err(Error::NoFunctionDefined) => {}
            other => panic!("compiled: {:?}", other.map(|s| s.to_string())),
        }
    }

    #[test]
    fn test_version_follows_directive() {
        let shader = Shader::new("#version 300 es\nout vec4 o_color;\nvoid main() {}\n");
        assert_eq!(shader.version(), GlslVersion::Gl2);
        let shader = Shader::new("void main() {}\n");
        assert_eq!(shader.version(), GlslVersion::Gl1);
    }
}
