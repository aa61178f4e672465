use log::warn;

use crate::clock::ClockState;
use crate::error::Error;
use crate::glsl::{parser, GlslVersion};
use crate::module::registry::ModuleRegistry;
use crate::uniform::UniformValue;

/// Fixed full-screen vertex shader for GL1 fragment shaders.
pub const STANDARD_VERTEX_GL1: &str = "\
attribute vec2 a_position;

void main() {
    gl_Position = vec4(a_position, 0.0, 1.0);
}
";

/// Fixed full-screen vertex shader for GL2 fragment shaders.
pub const STANDARD_VERTEX_GL2: &str = "\
#version 300 es

in vec2 a_position;

void main() {
    gl_Position = vec4(a_position, 0.0, 1.0);
}
";

/// Returns the vertex shader matching a fragment shader profile.
pub fn standard_vertex_source(version: GlslVersion) -> &'static str {
    match version {
        GlslVersion::Gl1 => STANDARD_VERTEX_GL1,
        GlslVersion::Gl2 => STANDARD_VERTEX_GL2,
    }
}

/// Rejects shader pairs of differing GLSL profiles before they reach the
/// GPU compiler.
pub fn ensure_version_match(vertex_source: &str, fragment_source: &str) -> Result<(), Error> {
    let vertex = parser::detect_version(vertex_source);
    let fragment = parser::detect_version(fragment_source);
    if vertex != fragment {
        return Err(Error::VersionMismatch { vertex, fragment });
    }
    Ok(())
}

/// What the rendering collaborator implements.
///
/// The core never talks to the GPU; it hands the driver compiled sources
/// and namespaced uniform names. Drivers are expected to ignore uploads
/// for locations the GPU compiler optimised away, and to push the
/// built-in uniforms (which are never namespaced) every frame.
pub trait DriverContext {
    /// Compiles and links a program from the given pair of sources.
    /// Surfaces [`crate::error::ErrorCode::Program`] faults.
    fn compile_program(&mut self, vertex_source: &str, fragment_source: &str)
        -> Result<(), Error>;

    /// Uploads a uniform value under a (possibly namespaced) name.
    fn upload_uniform(&mut self, name: &str, value: &UniformValue) -> Result<(), Error>;
}

/// Maps a user-level option onto its namespaced uniform through the
/// runtime registry and uploads the value.
pub fn set_option<D>(
    driver: &mut D,
    runtime: &ModuleRegistry,
    key: &str,
    option: &str,
    value: &UniformValue,
) -> Result<(), Error>
where
    D: DriverContext + ?Sized,
{
    let options = match runtime.resolve_options(key) {
        Some(options) => options,
        None => {
            return Err(Error::NoSuchOption {
                key: key.to_string(),
                option: None,
            })
        }
    };
    let resolved = match options.get(option) {
        Some(resolved) => resolved,
        None => {
            return Err(Error::NoSuchOption {
                key: key.to_string(),
                option: Some(option.to_string()),
            })
        }
    };

    driver.upload_uniform(&resolved.uniform, value)
}

/// Uploads every option default registered in the runtime registry.
/// Options without a default are skipped.
pub fn upload_option_defaults<D>(driver: &mut D, runtime: &ModuleRegistry) -> Result<(), Error>
where
    D: DriverContext + ?Sized,
{
    for definition in runtime.available()? {
        for (_, options) in definition.options.iter() {
            for (name, option) in options.iter() {
                match &option.default {
                    Some(default) => driver.upload_uniform(&option.uniform, default)?,
                    None => warn!(
                        target: "Driver",
                        "option `{}` of `{}` has no default, skipped",
                        name,
                        definition.name
                    ),
                }
            }
        }
    }
    Ok(())
}

/// Pushes the five built-in uniforms for one frame.
pub fn upload_frame_uniforms<D>(
    driver: &mut D,
    state: &ClockState,
    resolution: (f32, f32),
    mouse: (f32, f32),
) -> Result<(), Error>
where
    D: DriverContext + ?Sized,
{
    driver.upload_uniform(
        "u_resolution",
        &UniformValue::Float2(resolution.0, resolution.1),
    )?;
    driver.upload_uniform("u_time", &UniformValue::Float1(state.time as f32))?;
    driver.upload_uniform("u_delta", &UniformValue::Float1(state.delta as f32))?;
    driver.upload_uniform("u_mouse", &UniformValue::Float2(mouse.0, mouse.1))?;
    driver.upload_uniform("u_frame", &UniformValue::Integer1(state.frame as i32))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct RecordingDriver {
        uploads: Vec<(String, UniformValue)>,
    }

    impl RecordingDriver {
        fn new() -> Self {
            Self {
                uploads: Vec::new(),
            }
        }
    }

    impl DriverContext for RecordingDriver {
        fn compile_program(&mut self, _: &str, _: &str) -> Result<(), Error> {
            Ok(())
        }

        fn upload_uniform(&mut self, name: &str, value: &UniformValue) -> Result<(), Error> {
            self.uploads.push((name.to_string(), value.clone()));
            Ok(())
        }
    }

    #[test]
    fn test_version_validation() {
        assert!(ensure_version_match(STANDARD_VERTEX_GL1, "void main() {}").is_ok());
        assert!(
            ensure_version_match(STANDARD_VERTEX_GL2, "#version 300 es\nvoid main() {}").is_ok()
        );

        match ensure_version_match(STANDARD_VERTEX_GL1, "#version 300 es\nvoid main() {}") {
            Err(Error::VersionMismatch { vertex, fragment }) => {
                assert_eq!(vertex, GlslVersion::Gl1);
                assert_eq!(fragment, GlslVersion::Gl2);
            }
            other => panic!("validated: {:?}", other),
        }
    }

    #[test]
    fn test_set_option_resolves_namespaced_uniform() {
        use crate::module::{Module, ModuleOptions};

        let options: ModuleOptions = serde_json::from_value(serde_json::json!({
            "blur": { "radius": { "uniform": "blur_a1b2c3_u_radius" } }
        }))
        .unwrap();
        let module = Module::new(
            "m",
            "uniform float u_radius;\nfloat blur(float t) { return t * u_radius; }",
            options,
        )
        .unwrap();

        let mut runtime = ModuleRegistry::new();
        runtime.register(module).unwrap();

        let mut driver = RecordingDriver::new();
        set_option(
            &mut driver,
            &runtime,
            "blur",
            "radius",
            &UniformValue::Float1(5.0),
        )
        .unwrap();

        assert_eq!(driver.uploads.len(), 1);
        assert_eq!(driver.uploads[0].0, "blur_a1b2c3_u_radius");

        match set_option(
            &mut driver,
            &runtime,
            "blur",
            "missing",
            &UniformValue::Float1(0.0),
        ) {
            Err(Error::NoSuchOption { key, option }) => {
                assert_eq!(key, "blur");
                assert_eq!(option.as_deref(), Some("missing"));
            }
            other => panic!("uploaded: {:?}", other),
        }
    }

    #[test]
    fn test_frame_uniforms_are_builtin_names() {
        let mut driver = RecordingDriver::new();
        let state = ClockState {
            time: 1.5,
            delta: 0.016,
            frame: 90,
            running: true,
            fps: 60.0,
        };

        upload_frame_uniforms(&mut driver, &state, (800.0, 600.0), (0.5, 0.5)).unwrap();

        let names = driver
            .uploads
            .iter()
            .map(|(name, _)| name.as_str())
            .collect::<Vec<_>>();
        assert_eq!(
            names,
            vec!["u_resolution", "u_time", "u_delta", "u_mouse", "u_frame"]
        );
    }
}
