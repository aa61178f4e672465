pub mod shader;

pub use shader::Shader;

use std::borrow::Cow;

use hashbrown::{HashMap, HashSet};
use indexmap::IndexMap;
use line_span::LineSpanExt;
use log::warn;
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use regex::Regex;

use crate::error::Error;
use crate::glsl::parser::{self, Parser};
use crate::glsl::{
    is_builtin_uniform, Dependency, DependencyKind, GlslVersion, ShaderFunction, ShaderImport,
    ShaderParseResult, ShaderUniform,
};
use crate::module::registry::{self, ModuleRegistry};

/// Everything an import pulled into the output: uniforms and functions,
/// keyed by their namespaced names, in emission order.
pub struct Requirements {
    pub uniforms: IndexMap<String, ShaderUniform>,
    pub functions: IndexMap<String, ShaderFunction>,
}

impl Requirements {
    fn seeded(uniforms: &[ShaderUniform]) -> Self {
        let mut map = IndexMap::new();
        for uniform in uniforms {
            map.insert(uniform.name.clone(), uniform.clone());
        }
        Self {
            uniforms: map,
            functions: IndexMap::new(),
        }
    }
}

/// The compilation pipeline shared by shaders and modules.
///
/// Resolves every `#import` against the design-time registry, rewrites the
/// extracted helpers and uniforms into a per-import namespace, registers
/// option-rewritten module copies into the runtime registry and splices
/// the result back into the original text.
pub struct Compilable {
    original: Parser,
    compiled: Parser,
    is_compiled: bool,
    required_uniforms: Vec<ShaderUniform>,
    requirements: Requirements,
    rng: Box<dyn RngCore>,
}

impl Compilable {
    pub fn new<S>(source: S) -> Self
    where
        S: Into<Cow<'static, str>>,
    {
        Self::with_required_uniforms(source, Vec::new())
    }

    /// A compilable whose output always declares `uniforms`, referenced or
    /// not.
    pub fn with_required_uniforms<S>(source: S, uniforms: Vec<ShaderUniform>) -> Self
    where
        S: Into<Cow<'static, str>>,
    {
        Self {
            original: Parser::new(source),
            compiled: Parser::new(""),
            is_compiled: false,
            requirements: Requirements::seeded(&uniforms),
            required_uniforms: uniforms,
            rng: Box::new(StdRng::from_entropy()),
        }
    }

    /// Replaces the namespace-suffix randomness source. Tests inject a
    /// seeded generator to make compilation reproducible.
    pub fn set_rng(&mut self, rng: Box<dyn RngCore>) {
        self.rng = rng;
    }

    pub fn source(&self) -> &str {
        self.original.source()
    }

    /// Replaces the source and resets every compilation artifact.
    pub fn set_source<S>(&mut self, source: S)
    where
        S: Into<Cow<'static, str>>,
    {
        self.original.set_source(source);
        self.compiled.set_source("");
        self.is_compiled = false;
        self.requirements = Requirements::seeded(&self.required_uniforms);
    }

    pub fn is_compiled(&self) -> bool {
        self.is_compiled
    }

    pub fn version(&self) -> GlslVersion {
        self.original.version()
    }

    pub fn parse_original(&mut self) -> Result<&ShaderParseResult, Error> {
        self.original.parse()
    }

    /// Parse result of the compiled text. Meaningful once compiled.
    pub fn parse_compiled(&mut self) -> Result<&ShaderParseResult, Error> {
        self.compiled.parse()
    }

    pub fn compiled_source(&self) -> Option<&str> {
        if self.is_compiled {
            Some(self.compiled.source())
        } else {
            None
        }
    }

    pub fn requirements(&self) -> &Requirements {
        &self.requirements
    }

    /// Compiles the source. Idempotent: repeated calls return the memoised
    /// text until [`Compilable::recompile`] or [`Compilable::set_source`].
    pub fn compile(&mut self, runtime: &mut ModuleRegistry) -> Result<&str, Error> {
        if self.is_compiled {
            return Ok(self.compiled.source());
        }

        let parsed = self.original.parse()?.clone();
        for import in &parsed.imports {
            self.process_import(import, runtime)?;
        }

        let output = self.build()?;
        self.compiled.set_source(output);
        self.is_compiled = true;
        Ok(self.compiled.source())
    }

    /// Drops the memoised output and compiles again, with fresh namespace
    /// suffixes.
    pub fn recompile(&mut self, runtime: &mut ModuleRegistry) -> Result<&str, Error> {
        self.is_compiled = false;
        self.compiled.set_source("");
        self.requirements = Requirements::seeded(&self.required_uniforms);
        self.compile(runtime)
    }

    /// Resolves one import: extracts the function closure from its module,
    /// namespaces helpers and uniforms, collects them as requirements and
    /// registers the option-rewritten copy in the runtime registry.
    fn process_import(
        &mut self,
        import: &ShaderImport,
        runtime: &mut ModuleRegistry,
    ) -> Result<(), Error> {
        let design_module = registry::resolve_design(&import.module)?;

        let (extraction, pristine_options, copy) = {
            let mut module = design_module.borrow_mut();
            let extraction = module.extract(&import.name, runtime)?;
            let pristine_options = module.options().function(&import.name).cloned();
            let copy = module.copy();
            (extraction, pristine_options, copy)
        };

        // multiple aliases of one module share the first registered copy
        let runtime_module = if runtime.has(&import.module) {
            runtime.resolve(&import.module)?
        } else {
            runtime.register(copy)?
        };

        let unique = format!("{}_{}", import.alias, random_suffix(self.rng.as_mut()));
        let helper_names = extraction
            .dependencies
            .functions
            .iter()
            .map(|function| function.name.clone())
            .collect::<HashSet<_>>();

        for helper in &extraction.dependencies.functions {
            let mut rewritten = helper.clone();
            rewritten.body = rewrite_body(helper, &helper_names, &unique);
            rewritten.name = format!("{}_{}", unique, helper.name);
            rewritten.dependencies = Vec::new();
            self.requirements
                .functions
                .insert(rewritten.name.clone(), rewritten);
        }

        // the renamed main is the symbol the user's code calls
        let mut main = extraction.function.clone();
        main.body = rewrite_body(&extraction.function, &helper_names, &unique);
        main.name = import.alias.clone();
        main.dependencies = Vec::new();
        self.requirements.functions.insert(import.alias.clone(), main);

        let mut renamed: HashMap<String, String> = HashMap::new();
        for uniform in &extraction.dependencies.uniforms {
            if is_builtin_uniform(&uniform.name) {
                continue;
            }
            let name = format!("{}_{}", unique, uniform.name);
            renamed.insert(uniform.name.clone(), name.clone());
            let mut required = uniform.clone();
            required.name = name.clone();
            self.requirements.uniforms.insert(name, required);
        }

        if let Some(mut options) = pristine_options {
            let pristine = options.clone();
            for option in options.values_mut() {
                if let Some(namespaced) = renamed.get(&option.uniform) {
                    option.uniform = namespaced.clone();
                } else if !is_builtin_uniform(&option.uniform) {
                    warn!(
                        target: "Compiler",
                        "option uniform `{}` is not pulled by `{}`, mapping left untouched",
                        option.uniform,
                        import.name
                    );
                }
            }

            let mut module = runtime_module.borrow_mut();
            // moving the entry under the alias must not evict a rewritten
            // entry an earlier alias already owns
            if import.alias != import.name
                && module.options().function(&import.name) == Some(&pristine)
            {
                module.options_mut().remove(&import.name);
            }
            module.options_mut().insert(import.alias.clone(), options);
        }

        Ok(())
    }

    /// Splices requirements into the import-stripped original text.
    fn build(&mut self) -> Result<String, Error> {
        let mut text = strip_imports(self.original.source());

        let parsed = parse_text(&text)?;
        let mut declarations = Vec::new();
        for (name, required) in &self.requirements.uniforms {
            match parsed.uniform(name) {
                Some(existing) => {
                    if existing.ty != required.ty {
                        return Err(Error::UniformTypeMismatch {
                            name: name.clone(),
                            expected: required.ty,
                            actual: existing.ty,
                        });
                    }
                    if existing.array_num != required.array_num {
                        return Err(Error::UniformArraySizeMismatch {
                            name: name.clone(),
                            expected: required.array_num,
                            actual: existing.array_num,
                        });
                    }
                }
                None => declarations.push(render_uniform(required)),
            }
        }

        if !declarations.is_empty() {
            let (anchor, after_uniforms) = uniform_anchor(&text, &parsed);
            let mut block = String::new();
            if anchor > 0 && !text[..anchor].ends_with('\n') {
                block.push('\n');
            }
            block.push_str(&declarations.join("\n"));
            block.push('\n');
            if !after_uniforms {
                block.push('\n');
            }
            text.insert_str(anchor, &block);
        }

        if !self.requirements.functions.is_empty() {
            let parsed = parse_text(&text)?;
            let first = match parsed.functions.first() {
                Some(first) => first,
                None => return Err(Error::NoFunctionDefined),
            };

            let anchor = line_start(&text, first.line);
            let mut block = self
                .requirements
                .functions
                .values()
                .map(render_function)
                .collect::<Vec<_>>()
                .join("\n\n");
            block.push_str("\n\n");
            text.insert_str(anchor, &block);
        }

        Ok(collapse_newlines(&text))
    }
}

const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

fn random_suffix(rng: &mut dyn RngCore) -> String {
    (0..6)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect()
}

/// Applies the namespace prefix to every recorded reference of a body.
///
/// Rewrites run from the highest offset downward so earlier offsets stay
/// valid. Built-in uniforms and non-helper function references are left
/// untouched.
fn rewrite_body(function: &ShaderFunction, helpers: &HashSet<String>, unique: &str) -> String {
    let mut body = function.body.clone();
    let mut dependencies = function.dependencies.iter().collect::<Vec<&Dependency>>();
    dependencies.sort_by(|a, b| b.index.cmp(&a.index));

    for dependency in dependencies {
        let rename = match dependency.kind {
            DependencyKind::Function => helpers.contains(&dependency.name),
            DependencyKind::Uniform => !is_builtin_uniform(&dependency.name),
        };
        if !rename {
            continue;
        }
        body.replace_range(
            dependency.index..dependency.index + dependency.name.len(),
            &format!("{}_{}", unique, dependency.name),
        );
    }

    body
}

/// Drops every import line and a single blank line immediately following
/// it. Everything else is preserved byte for byte.
fn strip_imports(source: &str) -> String {
    let mut output = String::with_capacity(source.len());
    let mut skip_blank = false;

    for span in source.line_spans() {
        let line = &source[span.range()];
        if parser::is_import_line(line) {
            skip_blank = true;
            continue;
        }
        if skip_blank {
            skip_blank = false;
            if line.trim().is_empty() {
                continue;
            }
        }
        output.push_str(&source[span.range_with_ending()]);
    }

    output
}

fn parse_text(text: &str) -> Result<ShaderParseResult, Error> {
    Parser::new(text.to_string()).parse().map(|parsed| parsed.clone())
}

/// Where injected uniform declarations go: after the last declared
/// uniform, or past the version directive, precision qualifiers and
/// leading blank/comment lines.
fn uniform_anchor(text: &str, parsed: &ShaderParseResult) -> (usize, bool) {
    if let Some(last) = parsed.uniforms.last() {
        return (line_end(text, last.line), true);
    }

    let mut anchor = text.len();
    for span in text.line_spans() {
        let trimmed = text[span.range()].trim();
        let header = trimmed.is_empty()
            || trimmed.starts_with("#version")
            || trimmed.starts_with("precision")
            || trimmed.starts_with("//")
            || (trimmed.starts_with("/*") && trimmed.ends_with("*/"));
        if !header {
            anchor = span.start();
            break;
        }
    }
    (anchor, false)
}

/// Start offset of a 1-based line.
fn line_start(text: &str, line: usize) -> usize {
    text.line_spans()
        .nth(line - 1)
        .map(|span| span.start())
        .unwrap_or(0)
}

/// End offset of a 1-based line, including its ending.
fn line_end(text: &str, line: usize) -> usize {
    text.line_spans()
        .nth(line - 1)
        .map(|span| span.range_with_ending().end)
        .unwrap_or_else(|| text.len())
}

fn render_uniform(uniform: &ShaderUniform) -> String {
    match uniform.array_num {
        Some(num) => format!("uniform {} {}[{}];", uniform.ty.as_str(), uniform.name, num),
        None => format!("uniform {} {};", uniform.ty.as_str(), uniform.name),
    }
}

fn render_function(function: &ShaderFunction) -> String {
    let params = function
        .params
        .iter()
        .map(|param| format!("{} {}", param.ty.as_str(), param.name))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "{} {}({}) {}",
        function.return_type.as_str(),
        function.name,
        params,
        function.body
    )
}

thread_local! {
    static NEWLINE_RUNS: Regex = Regex::new(r"\n{3,}").unwrap();
}

fn collapse_newlines(text: &str) -> String {
    NEWLINE_RUNS.with(|runs| runs.replace_all(text, "\n\n").into_owned())
}
