use std::borrow::Cow;

use hashbrown::HashSet;
use line_span::LineSpanExt;
use log::debug;
use regex::Regex;
use smallvec::SmallVec;

use super::{
    Dependency, DependencyKind, GlslType, GlslVariable, GlslVersion, ShaderFunction, ShaderImport,
    ShaderParseResult, ShaderUniform,
};
use crate::error::Error;

struct Patterns {
    version: Regex,
    import: Regex,
    import_like: Regex,
    import_name: Regex,
    import_as: Regex,
    import_alias: Regex,
    import_from: Regex,
    import_module: Regex,
    uniform: Regex,
    function: Regex,
    identifier: Regex,
}

impl Patterns {
    fn new() -> Self {
        Self {
            version: Regex::new(r"(?m)^[ \t]*#version[ \t]+300[ \t]+es\b").unwrap(),
            import: Regex::new(
                r#"^[ \t]*#import[ \t]+(?P<name>[A-Za-z_]\w*)(?:[ \t]+as[ \t]+(?P<alias>[A-Za-z_]\w*))?[ \t]+from[ \t]+(?:'(?P<single>[^']+)'|"(?P<double>[^"]+)")[ \t]*;?[ \t]*$"#,
            )
            .unwrap(),
            import_like: Regex::new(r"^[ \t]*(?P<prefix>[^\w\s])?import\b").unwrap(),
            import_name: Regex::new(r"^[ \t]*#import[ \t]+(?P<name>[A-Za-z_]\w*)").unwrap(),
            import_as: Regex::new(r"\bas\b").unwrap(),
            import_alias: Regex::new(r"\bas[ \t]+(?P<alias>[A-Za-z_]\w*)").unwrap(),
            import_from: Regex::new(r"\bfrom\b").unwrap(),
            import_module: Regex::new(r#"\bfrom[ \t]+(?:'[^']*'|"[^"]*")[ \t]*;?[ \t]*$"#).unwrap(),
            uniform: Regex::new(
                r"^[ \t]*uniform[ \t]+(?:(?:highp|mediump|lowp)[ \t]+)?(?P<ty>\w+)[ \t]+(?P<name>[A-Za-z_]\w*)[ \t]*(?:\[[ \t]*(?P<num>\d+)[ \t]*\])?[ \t]*;",
            )
            .unwrap(),
            function: Regex::new(
                r"^[ \t]*(?:(?:highp|mediump|lowp)[ \t]+)?(?P<ret>\w+)[ \t]+(?P<name>[A-Za-z_]\w*)[ \t]*\((?P<params>[^)]*)\)[ \t]*\{",
            )
            .unwrap(),
            identifier: Regex::new(r"[A-Za-z_]\w*").unwrap(),
        }
    }
}

thread_local! {
    static PATTERNS: Patterns = Patterns::new();
}

/// Returns the GLSL profile a source targets. Only `#version 300 es`
/// selects [`GlslVersion::Gl2`].
pub fn detect_version(source: &str) -> GlslVersion {
    PATTERNS.with(|p| {
        if p.version.is_match(source) {
            GlslVersion::Gl2
        } else {
            GlslVersion::Gl1
        }
    })
}

/// A memoising scanner over one GLSL source.
///
/// The parse result is computed once and kept until [`Parser::set_source`]
/// replaces the text. The source itself is never mutated.
pub struct Parser {
    source: Cow<'static, str>,
    cache: Option<ShaderParseResult>,
}

impl Parser {
    pub fn new<S>(source: S) -> Self
    where
        S: Into<Cow<'static, str>>,
    {
        Self {
            source: source.into(),
            cache: None,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Replaces the source and drops the memoised parse.
    pub fn set_source<S>(&mut self, source: S)
    where
        S: Into<Cow<'static, str>>,
    {
        self.source = source.into();
        self.cache = None;
    }

    pub fn version(&self) -> GlslVersion {
        detect_version(&self.source)
    }

    /// Scans the source for imports, uniforms and functions.
    ///
    /// Repeated calls return the memoised result until the source is
    /// replaced.
    pub fn parse(&mut self) -> Result<&ShaderParseResult, Error> {
        if self.cache.is_none() {
            let version = detect_version(&self.source);
            let imports = scan_imports(&self.source)?;
            let uniforms = scan_uniforms(&self.source);
            let functions = scan_functions(&self.source, &uniforms);
            self.cache = Some(ShaderParseResult {
                version,
                imports,
                uniforms,
                functions,
            });
        }

        Ok(self.cache.as_ref().unwrap())
    }
}

/// Returns `true` for lines matching the strict import form. The compiler
/// strips these when building the output text.
pub(crate) fn is_import_line(line: &str) -> bool {
    PATTERNS.with(|p| p.import.is_match(line))
}

fn scan_imports(source: &str) -> Result<Vec<ShaderImport>, Error> {
    PATTERNS.with(|p| {
        let mut imports = Vec::new();
        let mut aliases: HashSet<String> = HashSet::new();

        for (i, span) in source.line_spans().enumerate() {
            let line = &source[span.range()];
            if let Some(captures) = p.import.captures(line) {
                let name = captures["name"].to_string();
                let alias = captures
                    .name("alias")
                    .map(|m| m.as_str().to_string())
                    .unwrap_or_else(|| name.clone());
                let module = captures
                    .name("single")
                    .or_else(|| captures.name("double"))
                    .unwrap()
                    .as_str()
                    .to_string();

                if !aliases.insert(alias.clone()) {
                    return Err(Error::DuplicateImportAlias { alias, line: i + 1 });
                }

                imports.push(ShaderImport {
                    name,
                    alias,
                    module,
                    line: i + 1,
                });
            } else if p.import_like.is_match(line) {
                return Err(diagnose_import(p, line, i + 1));
            }
        }

        Ok(imports)
    })
}

/// Explains why an import-looking line does not match the strict form.
fn diagnose_import(p: &Patterns, line: &str, line_number: usize) -> Error {
    Error::ImportSyntax {
        line: line_number,
        reason: import_fault_reason(p, line),
    }
}

fn import_fault_reason(p: &Patterns, line: &str) -> String {
    let captures = p.import_like.captures(line).unwrap();
    match captures.name("prefix") {
        None => return "Missing '#' before import".to_string(),
        Some(prefix) if prefix.as_str() != "#" => {
            return format!("Invalid prefix '{}', expected '#'", prefix.as_str());
        }
        Some(_) => {}
    }

    // `#import from 'm'` captures `from` as the function name
    let name = match p.import_name.captures(line) {
        Some(name) if &name["name"] != "from" => name,
        _ => return "Missing imported function name".to_string(),
    };
    let rest = &line[name.get(0).unwrap().end()..];

    let froms = p.import_from.find_iter(rest).count();
    if p.import_as.is_match(rest) {
        match p.import_alias.captures(rest) {
            Some(alias) if &alias["alias"] != "from" || froms > 1 => {}
            _ => return "Missing alias after 'as'".to_string(),
        }
    }

    if froms == 0 {
        return "Missing 'from' keyword".to_string();
    }
    if !p.import_module.is_match(rest) {
        return "Module path must be quoted".to_string();
    }

    "Malformed import statement".to_string()
}

fn scan_uniforms(source: &str) -> Vec<ShaderUniform> {
    PATTERNS.with(|p| {
        let mut uniforms = Vec::new();

        for (i, span) in source.line_spans().enumerate() {
            let line = &source[span.range()];
            let Some(captures) = p.uniform.captures(line) else {
                continue;
            };
            let Some(ty) = GlslType::from_str(&captures["ty"]) else {
                continue;
            };
            let array_num = captures
                .name("num")
                .and_then(|m| m.as_str().parse::<usize>().ok())
                .filter(|num| *num > 0);

            uniforms.push(ShaderUniform {
                name: captures["name"].to_string(),
                ty,
                array_num,
                line: i + 1,
            });
        }

        uniforms
    })
}

fn scan_functions(source: &str, uniforms: &[ShaderUniform]) -> Vec<ShaderFunction> {
    PATTERNS.with(|p| {
        let mut functions = Vec::new();
        // lines inside a recognised body are not scanned again
        let mut resume = 0;

        for (i, span) in source.line_spans().enumerate() {
            if span.start() < resume {
                continue;
            }
            let line = &source[span.range()];
            let Some(captures) = p.function.captures(line) else {
                continue;
            };
            let Some(return_type) = GlslType::from_str(&captures["ret"]) else {
                continue;
            };
            let Some(params) = parse_params(&captures["params"]) else {
                continue;
            };

            let open = span.start() + captures.get(0).unwrap().end() - 1;
            let Some(close) = matching_brace(source, open) else {
                debug!(
                    target: "Parser",
                    "function `{}` at line {} never closes its brace, ignored",
                    &captures["name"],
                    i + 1
                );
                continue;
            };

            let body = source[open..=close].to_string();
            let dependencies = scan_dependencies(&body, uniforms);
            functions.push(ShaderFunction {
                name: captures["name"].to_string(),
                return_type,
                params,
                body,
                dependencies,
                line: i + 1,
            });
            resume = close + 1;
        }

        functions
    })
}

fn parse_params(raw: &str) -> Option<SmallVec<[GlslVariable; 4]>> {
    let mut params = SmallVec::new();
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "void" {
        return Some(params);
    }

    for piece in trimmed.split(',') {
        let tokens = piece
            .split_whitespace()
            .filter(|token| {
                !matches!(
                    *token,
                    "in" | "out" | "inout" | "const" | "highp" | "mediump" | "lowp"
                )
            })
            .collect::<Vec<_>>();
        if tokens.len() != 2 {
            return None;
        }
        let ty = GlslType::from_str(tokens[0])?;
        params.push(GlslVariable {
            name: tokens[1].to_string(),
            ty,
        });
    }

    Some(params)
}

/// Finds the `}` matching the `{` at `open`, skipping line comments, block
/// comments and double-quoted runs.
fn matching_brace(source: &str, open: usize) -> Option<usize> {
    let bytes = source.as_bytes();
    let len = bytes.len();
    let mut depth = 0usize;
    let mut i = open;

    while i < len {
        let byte = bytes[i];
        if byte == b'/' && i + 1 < len && bytes[i + 1] == b'/' {
            i += 2;
            while i < len && bytes[i] != b'\n' {
                i += 1;
            }
        } else if byte == b'/' && i + 1 < len && bytes[i + 1] == b'*' {
            i += 2;
            while i + 1 < len && !(bytes[i] == b'*' && bytes[i + 1] == b'/') {
                i += 1;
            }
            i = (i + 2).min(len);
        } else if byte == b'"' {
            i += 1;
            while i < len && bytes[i] != b'"' {
                if bytes[i] == b'\\' {
                    i += 1;
                }
                i += 1;
            }
            i += 1;
        } else {
            if byte == b'{' {
                depth += 1;
            } else if byte == b'}' {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            i += 1;
        }
    }

    None
}

fn is_control_keyword(word: &str) -> bool {
    matches!(
        word,
        "if" | "else"
            | "for"
            | "while"
            | "do"
            | "switch"
            | "case"
            | "return"
            | "break"
            | "continue"
            | "discard"
    )
}

/// Records every function call and every declared-uniform reference inside
/// a body, with the offset each reference starts at.
fn scan_dependencies(body: &str, uniforms: &[ShaderUniform]) -> Vec<Dependency> {
    let uniform_names = uniforms
        .iter()
        .map(|uniform| uniform.name.as_str())
        .collect::<HashSet<_>>();

    PATTERNS.with(|p| {
        let mut dependencies = Vec::new();

        for m in p.identifier.find_iter(body) {
            let called = body[m.end()..]
                .chars()
                .find(|c| !c.is_whitespace())
                .map_or(false, |c| c == '(');

            if called {
                if !is_control_keyword(m.as_str()) {
                    dependencies.push(Dependency {
                        kind: DependencyKind::Function,
                        name: m.as_str().to_string(),
                        index: m.start(),
                    });
                }
            } else if uniform_names.contains(m.as_str()) {
                dependencies.push(Dependency {
                    kind: DependencyKind::Uniform,
                    name: m.as_str().to_string(),
                    index: m.start(),
                });
            }
        }

        dependencies
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_detection() {
        assert_eq!(detect_version("void main() {}"), GlslVersion::Gl1);
        assert_eq!(
            detect_version("#version 300 es\nvoid main() {}"),
            GlslVersion::Gl2
        );
        assert_eq!(
            detect_version("precision highp float;\n  #version 300 es"),
            GlslVersion::Gl2
        );
        assert_eq!(detect_version("#version 100"), GlslVersion::Gl1);
    }

    #[test]
    fn test_import_forms() {
        let mut parser = Parser::new(
            "#import gradient from 'sandbox/colors'\n\
             #import noise as n from \"sandbox\"\n\
             void main() {}\n",
        );
        let parsed = parser.parse().unwrap();

        assert_eq!(parsed.imports.len(), 2);
        assert_eq!(parsed.imports[0].name, "gradient");
        assert_eq!(parsed.imports[0].alias, "gradient");
        assert_eq!(parsed.imports[0].module, "sandbox/colors");
        assert_eq!(parsed.imports[0].line, 1);
        assert_eq!(parsed.imports[1].alias, "n");
        assert_eq!(parsed.imports[1].module, "sandbox");
    }

    #[test]
    fn test_import_diagnosis() {
        let cases: [(&str, &str); 5] = [
            ("@import x from 'm'", "Invalid prefix '@'"),
            ("import x from 'm'", "Missing '#'"),
            ("#import from 'm'", "Missing imported function name"),
            ("#import x as from 'm'", "Missing alias after 'as'"),
            ("#import x from m", "Module path must be quoted"),
        ];

        for (source, expected) in cases.iter() {
            let mut parser = Parser::new(source.to_string());
            match parser.parse() {
                Err(Error::ImportSyntax { line, reason }) => {
                    assert_eq!(line, 1, "line for {:?}", source);
                    assert!(
                        reason.contains(expected),
                        "{:?} diagnosed as {:?}",
                        source,
                        reason
                    );
                }
                other => panic!("{:?} parsed as {:?}", source, other),
            }
        }

        let mut parser = Parser::new("#import x 'm'");
        match parser.parse() {
            Err(Error::ImportSyntax { reason, .. }) => {
                assert!(reason.contains("Missing 'from'"), "{:?}", reason)
            }
            other => panic!("parsed as {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_alias() {
        let mut parser = Parser::new(
            "#import a as x from 'm'\n\
             #import b as x from 'm'\n",
        );
        match parser.parse() {
            Err(Error::DuplicateImportAlias { alias, line }) => {
                assert_eq!(alias, "x");
                assert_eq!(line, 2);
            }
            other => panic!("parsed as {:?}", other),
        }
    }

    #[test]
    fn test_uniform_forms() {
        let mut parser = Parser::new(
            "uniform float u_amount;\n\
             uniform highp vec3 u_colors[2];\n\
             uniform sampler2D u_texture;\n\
             uniform unknown u_skipped;\n",
        );
        let parsed = parser.parse().unwrap();

        assert_eq!(parsed.uniforms.len(), 3);
        assert_eq!(parsed.uniforms[0].ty, GlslType::Float);
        assert_eq!(parsed.uniforms[0].array_num, None);
        assert_eq!(parsed.uniforms[1].name, "u_colors");
        assert_eq!(parsed.uniforms[1].ty, GlslType::Vec3);
        assert_eq!(parsed.uniforms[1].array_num, Some(2));
        assert_eq!(parsed.uniforms[1].line, 2);
        assert_eq!(parsed.uniforms[2].ty, GlslType::Sampler2D);
    }

    #[test]
    fn test_function_bodies_and_params() {
        let source = "\
uniform float u_amount;

vec3 tint(in vec3 color, const float k) {
    // a '}' in a comment } should not end the body
    /* nor in a block } */
    return color * k * u_amount;
}

void main() {
    vec3 c = tint(vec3(1.0), 0.5);
}
";
        let mut parser = Parser::new(source);
        let parsed = parser.parse().unwrap();

        assert_eq!(parsed.functions.len(), 2);
        let tint = parsed.function("tint").unwrap();
        assert_eq!(tint.return_type, GlslType::Vec3);
        assert_eq!(tint.line, 3);
        assert_eq!(tint.params.len(), 2);
        assert_eq!(tint.params[0].name, "color");
        assert_eq!(tint.params[0].ty, GlslType::Vec3);
        assert_eq!(tint.params[1].name, "k");
        assert!(tint.body.starts_with('{'));
        assert!(tint.body.ends_with('}'));
        assert!(tint.body.contains("u_amount"));

        let main = parsed.function("main").unwrap();
        assert!(main.params.is_empty());
    }

    #[test]
    fn test_unterminated_function_ignored() {
        let mut parser = Parser::new("vec3 broken(float t) {\n    return vec3(t);\n");
        let parsed = parser.parse().unwrap();
        assert!(parsed.functions.is_empty());
    }

    #[test]
    fn test_dependency_scan() {
        let source = "\
uniform float u_speed;
uniform vec2 u_origin;

float wave(float t) {
    if (t > 1.0) {
        return sin(t * u_speed);
    }
    return fract(t + u_origin.x);
}
";
        let mut parser = Parser::new(source);
        let parsed = parser.parse().unwrap();
        let wave = parsed.function("wave").unwrap();

        let functions = wave
            .dependencies
            .iter()
            .filter(|dep| dep.kind == DependencyKind::Function)
            .map(|dep| dep.name.as_str())
            .collect::<Vec<_>>();
        // control keywords are not calls
        assert_eq!(functions, vec!["sin", "fract"]);

        let uniforms = wave
            .dependencies
            .iter()
            .filter(|dep| dep.kind == DependencyKind::Uniform)
            .collect::<Vec<_>>();
        assert_eq!(uniforms.len(), 2);
        for dep in &uniforms {
            assert_eq!(&wave.body[dep.index..dep.index + dep.name.len()], dep.name);
        }
    }

    #[test]
    fn test_parse_memoised_until_source_replaced() {
        let mut parser = Parser::new("void main() {}");
        let first = parser.parse().unwrap() as *const ShaderParseResult;
        let second = parser.parse().unwrap() as *const ShaderParseResult;
        assert_eq!(first, second);

        parser.set_source("float f() { return 1.0; }");
        let parsed = parser.parse().unwrap();
        assert!(parsed.function("f").is_some());
        assert!(parsed.function("main").is_none());
    }
}
