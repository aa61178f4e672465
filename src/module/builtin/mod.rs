use serde_json::json;

use super::registry::ModuleRegistry;
use super::{Module, ModuleOptions};

const SANDBOX_SOURCE: &str = include_str!("sandbox.glsl");
const COLORS_SOURCE: &str = include_str!("colors.glsl");
const EFFECTS_SOURCE: &str = include_str!("effects.glsl");
const FILTERS_SOURCE: &str = include_str!("filters.glsl");

fn options(table: serde_json::Value) -> ModuleOptions {
    serde_json::from_value(table).expect("builtin option table must deserialize")
}

/// Builds the design-time seed: the bundled module library.
pub(crate) fn seeded_registry() -> ModuleRegistry {
    let bundled = vec![
        Module::new("sandbox", SANDBOX_SOURCE, ModuleOptions::new()),
        Module::new(
            "sandbox/colors",
            COLORS_SOURCE,
            options(json!({
                "gradient": {
                    "colors": {
                        "uniform": "u_colors",
                        "default": { "float_vector3_array": [[1.0, 1.0, 1.0], [1.0, 1.0, 1.0]] }
                    },
                    "gamma": {
                        "uniform": "u_gamma",
                        "default": { "float1": 1.0 }
                    }
                }
            })),
        ),
        Module::new(
            "sandbox/effects",
            EFFECTS_SOURCE,
            options(json!({
                "default": {
                    "intensity": {
                        "uniform": "u_intensity",
                        "default": { "float1": 1.0 }
                    }
                },
                "pulse": {
                    "speed": {
                        "uniform": "u_speed",
                        "default": { "float1": 1.0 }
                    }
                }
            })),
        ),
        Module::new(
            "sandbox/filters",
            FILTERS_SOURCE,
            options(json!({
                "default": {
                    "amount": {
                        "uniform": "u_amount",
                        "default": { "float1": 1.0 }
                    }
                }
            })),
        ),
    ];

    let mut registry = ModuleRegistry::new();
    for module in bundled {
        let module = module.expect("builtin module must parse");
        registry
            .register(module)
            .expect("builtin module registered once");
    }
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundled_modules_compile_and_list() {
        let registry = seeded_registry();
        let definitions = registry.available().unwrap();
        assert_eq!(definitions.len(), 4);

        let colors = definitions
            .iter()
            .find(|definition| definition.name == "sandbox/colors")
            .unwrap();
        assert!(colors.methods.contains(&"gradient".to_string()));
        assert!(!colors.methods.contains(&"main".to_string()));
    }

    #[test]
    fn test_bundled_functions_extract() {
        let registry = seeded_registry();
        let mut runtime = ModuleRegistry::new();

        let module = registry.resolve("sandbox").unwrap();
        let extraction = module.borrow_mut().extract("fbm", &mut runtime).unwrap();
        let helpers = extraction
            .dependencies
            .functions
            .iter()
            .map(|function| function.name.as_str())
            .collect::<Vec<_>>();
        assert_eq!(helpers, vec!["hash", "noise"]);

        let module = registry.resolve("sandbox/colors").unwrap();
        let extraction = module
            .borrow_mut()
            .extract("gradient", &mut runtime)
            .unwrap();
        let uniforms = extraction
            .dependencies
            .uniforms
            .iter()
            .map(|uniform| uniform.name.as_str())
            .collect::<Vec<_>>();
        assert_eq!(uniforms, vec!["u_colors", "u_gamma"]);
    }

    #[test]
    fn test_default_options_spread() {
        let registry = seeded_registry();
        let effects = registry.resolve("sandbox/effects").unwrap();
        let effects = effects.borrow();

        let pulse = effects.options().function("pulse").unwrap();
        assert!(pulse.contains_key("intensity"));
        assert!(pulse.contains_key("speed"));

        let glow = effects.options().function("glow").unwrap();
        assert!(glow.contains_key("intensity"));
        assert!(!glow.contains_key("speed"));

        assert!(effects.options().function("default").is_none());
    }
}
