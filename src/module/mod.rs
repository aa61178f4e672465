pub mod builtin;
pub mod registry;

use std::borrow::Cow;
use std::cell::RefCell;
use std::rc::Rc;

use hashbrown::HashSet;
use indexmap::IndexMap;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::compiler::Compilable;
use crate::error::Error;
use crate::glsl::{DependencyKind, ShaderFunction, ShaderParseResult, ShaderUniform};
use crate::uniform::UniformValue;

/// A user-facing knob mapped onto a GLSL uniform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleOption {
    pub uniform: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<UniformValue>,
}

/// Options of one function: option name to [`ModuleOption`].
pub type FunctionOptions = IndexMap<String, ModuleOption>;

/// Option tables of a module, keyed by function name.
///
/// The reserved key `default` holds options inherited by every function
/// that does not override them; it is folded away at construction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModuleOptions(IndexMap<String, FunctionOptions>);

impl ModuleOptions {
    pub fn new() -> Self {
        Self(IndexMap::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn function(&self, name: &str) -> Option<&FunctionOptions> {
        self.0.get(name)
    }

    pub fn insert(&mut self, function: String, options: FunctionOptions) {
        self.0.insert(function, options);
    }

    pub fn remove(&mut self, function: &str) -> Option<FunctionOptions> {
        self.0.shift_remove(function)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FunctionOptions)> {
        self.0.iter()
    }

    /// Spreads the `default` entry under every listed function, keeping
    /// per-function overrides on top, then drops the entry.
    fn normalised(mut self, functions: &[String]) -> Self {
        let defaults = match self.0.shift_remove("default") {
            Some(defaults) => defaults,
            None => return self,
        };

        for name in functions {
            if name == "main" || name == "default" {
                continue;
            }
            let mut merged = defaults.clone();
            if let Some(overrides) = self.0.shift_remove(name) {
                merged.extend(overrides);
            }
            self.0.insert(name.clone(), merged);
        }

        self
    }
}

/// Compiled summary of a module, for listings and tooling.
#[derive(Debug, Clone, Serialize)]
pub struct ModuleDefinition {
    pub name: String,
    pub methods: Vec<String>,
    pub uniforms: Vec<ShaderUniform>,
    pub options: ModuleOptions,
}

/// Dependency bag of an extracted function.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionDependencies {
    pub functions: Vec<ShaderFunction>,
    pub uniforms: Vec<ShaderUniform>,
}

/// A function pulled out of a module together with the transitive closure
/// of helpers and uniforms it uses.
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleFunctionExtraction {
    pub function: ShaderFunction,
    pub dependencies: ExtractionDependencies,
}

/// A registered, parseable GLSL unit with optional option-to-uniform
/// mappings.
pub struct Module {
    name: String,
    options: ModuleOptions,
    inner: Compilable,
}

impl Module {
    /// Wraps a GLSL source. Options are normalised against the parsed
    /// function list (see [`ModuleOptions`]); an unparseable source is
    /// rejected here rather than at first import.
    pub fn new<N, S>(name: N, source: S, options: ModuleOptions) -> Result<Self, Error>
    where
        N: Into<String>,
        S: Into<Cow<'static, str>>,
    {
        let mut inner = Compilable::new(source);
        let functions = inner
            .parse_original()?
            .functions
            .iter()
            .map(|function| function.name.clone())
            .collect::<Vec<_>>();

        Ok(Self {
            name: name.into(),
            options: options.normalised(&functions),
            inner,
        })
    }

    /// Defines a user module and registers it into the design-time
    /// registry. Reserved and occupied names are rejected.
    pub fn define<N, S>(
        name: N,
        source: S,
        options: ModuleOptions,
    ) -> Result<Rc<RefCell<Module>>, Error>
    where
        N: Into<String>,
        S: Into<Cow<'static, str>>,
    {
        let name: String = name.into();
        if name == "sandbox" || name.starts_with("sandbox/") {
            return Err(Error::ReservedModuleName(name));
        }

        registry::register_design(Module::new(name, source, options)?)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &str {
        self.inner.source()
    }

    pub fn options(&self) -> &ModuleOptions {
        &self.options
    }

    pub fn options_mut(&mut self) -> &mut ModuleOptions {
        &mut self.options
    }

    pub fn compiled_source(&self) -> Option<&str> {
        self.inner.compiled_source()
    }

    /// A new module over the same source with an independent options map.
    ///
    /// Compilation hands one of these to the runtime registry so option
    /// rewriting never touches the design-time module.
    pub fn copy(&self) -> Module {
        Module {
            name: self.name.clone(),
            options: self.options.clone(),
            inner: Compilable::new(self.inner.source().to_string()),
        }
    }

    /// Resolves the module's own imports. Idempotent until
    /// [`Module::recompile`].
    pub fn compile(&mut self, runtime: &mut registry::ModuleRegistry) -> Result<&str, Error> {
        self.inner.compile(runtime)
    }

    pub fn recompile(&mut self, runtime: &mut registry::ModuleRegistry) -> Result<&str, Error> {
        self.inner.recompile(runtime)
    }

    /// Compiles, then summarises the module: callable methods (everything
    /// but `main` and `default`), declared uniforms and option tables.
    pub fn definition(&mut self) -> Result<ModuleDefinition, Error> {
        let mut scratch = registry::ModuleRegistry::new();
        self.inner.compile(&mut scratch)?;
        let parsed = self.inner.parse_compiled()?;

        let methods = parsed
            .functions
            .iter()
            .filter(|function| function.name != "main" && function.name != "default")
            .map(|function| function.name.clone())
            .collect();

        Ok(ModuleDefinition {
            name: self.name.clone(),
            methods,
            uniforms: parsed.uniforms.clone(),
            options: self.options.clone(),
        })
    }

    /// Extracts a function and the transitive closure of helpers and
    /// uniforms it references, compiling the module first.
    ///
    /// Function references that match no parsed function are assumed to be
    /// GLSL built-ins and dropped; cycles stop the walk instead of
    /// failing.
    pub fn extract(
        &mut self,
        name: &str,
        runtime: &mut registry::ModuleRegistry,
    ) -> Result<ModuleFunctionExtraction, Error> {
        if name == "main" || name == "default" {
            return Err(Error::ReservedFunctionImport(name.to_string()));
        }

        self.inner.compile(runtime)?;
        let parsed = self.inner.parse_compiled()?.clone();
        let target = match parsed.function(name) {
            Some(target) => target,
            None => {
                return Err(Error::NoSuchMethod {
                    module: self.name.clone(),
                    method: name.to_string(),
                })
            }
        };

        let mut visited = HashSet::new();
        let mut functions = Vec::new();
        let mut uniforms = Vec::new();
        let mut seen_uniforms = HashSet::new();
        collect_dependencies(
            target,
            &parsed,
            &mut visited,
            &mut functions,
            &mut uniforms,
            &mut seen_uniforms,
        );

        Ok(ModuleFunctionExtraction {
            function: target.clone(),
            dependencies: ExtractionDependencies {
                functions,
                uniforms,
            },
        })
    }
}

/// Depth-first walk over the call graph. Helpers are accumulated in
/// post-order, so every helper lands ahead of its callers in the output.
fn collect_dependencies(
    function: &ShaderFunction,
    parsed: &ShaderParseResult,
    visited: &mut HashSet<String>,
    functions: &mut Vec<ShaderFunction>,
    uniforms: &mut Vec<ShaderUniform>,
    seen_uniforms: &mut HashSet<String>,
) {
    visited.insert(function.name.clone());

    for dependency in &function.dependencies {
        match dependency.kind {
            DependencyKind::Function => {
                if visited.contains(&dependency.name) {
                    continue;
                }
                match parsed.function(&dependency.name) {
                    Some(callee) => {
                        collect_dependencies(
                            callee,
                            parsed,
                            visited,
                            functions,
                            uniforms,
                            seen_uniforms,
                        );
                        functions.push(callee.clone());
                    }
                    None => debug!(
                        target: "Module",
                        "`{}` resolves to no function, assuming a GLSL built-in",
                        dependency.name
                    ),
                }
            }
            DependencyKind::Uniform => {
                if seen_uniforms.insert(dependency.name.clone()) {
                    if let Some(uniform) = parsed.uniform(&dependency.name) {
                        uniforms.push(uniform.clone());
                    }
                }
            }
        }
    }
}
