use uuid::Uuid;

use crate::glsl::{GlslType, GlslVersion};

/// Stable error codes surfaced to the embedding driver.
///
/// Every [`Error`] variant maps onto exactly one code via [`Error::code`],
/// so drivers can route faults without matching on variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    Context,
    Shader,
    Module,
    Validation,
    Program,
    Unknown,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::Context => "CONTEXT_ERROR",
            ErrorCode::Shader => "SHADER_ERROR",
            ErrorCode::Module => "MODULE_ERROR",
            ErrorCode::Validation => "VALIDATION_ERROR",
            ErrorCode::Program => "PROGRAM_ERROR",
            ErrorCode::Unknown => "UNKNOWN_ERROR",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    WebGL2Unsupported,
    CreateContextFailure,
    ImportSyntax {
        line: usize,
        reason: String,
    },
    DuplicateImportAlias {
        alias: String,
        line: usize,
    },
    ReservedFunctionImport(String),
    NoFunctionDefined,
    UniformTypeMismatch {
        name: String,
        expected: GlslType,
        actual: GlslType,
    },
    UniformArraySizeMismatch {
        name: String,
        expected: Option<usize>,
        actual: Option<usize>,
    },
    NoSuchModule(String),
    NoSuchMethod {
        module: String,
        method: String,
    },
    ReservedModuleName(String),
    ModuleOccupied(String),
    NoSuchOption {
        key: String,
        option: Option<String>,
    },
    VersionMismatch {
        vertex: GlslVersion,
        fragment: GlslVersion,
    },
    CompileShaderFailure(Option<String>),
    CompileProgramFailure(Option<String>),
    HookCallbackFailure {
        hook: Uuid,
        message: String,
    },
}

impl Error {
    /// Returns the stable taxonomy code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::WebGL2Unsupported | Error::CreateContextFailure => ErrorCode::Context,
            Error::ImportSyntax { .. }
            | Error::DuplicateImportAlias { .. }
            | Error::ReservedFunctionImport(_)
            | Error::NoFunctionDefined
            | Error::UniformTypeMismatch { .. }
            | Error::UniformArraySizeMismatch { .. } => ErrorCode::Shader,
            Error::NoSuchModule(_)
            | Error::NoSuchMethod { .. }
            | Error::ReservedModuleName(_)
            | Error::ModuleOccupied(_)
            | Error::NoSuchOption { .. } => ErrorCode::Module,
            Error::VersionMismatch { .. } => ErrorCode::Validation,
            Error::CompileShaderFailure(_) | Error::CompileProgramFailure(_) => ErrorCode::Program,
            Error::HookCallbackFailure { .. } => ErrorCode::Unknown,
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::WebGL2Unsupported => write!(f, "WebGL 2 is not supported by this platform"),
            Error::CreateContextFailure => write!(f, "failed to create rendering context"),
            Error::ImportSyntax { line, reason } => {
                write!(f, "invalid import statement at line {}: {}", line, reason)
            }
            Error::DuplicateImportAlias { alias, line } => {
                write!(f, "duplicate import alias `{}` at line {}", alias, line)
            }
            Error::ReservedFunctionImport(name) => {
                write!(f, "function `{}` cannot be imported", name)
            }
            Error::NoFunctionDefined => write!(f, "shader source defines no function"),
            Error::UniformTypeMismatch {
                name,
                expected,
                actual,
            } => write!(
                f,
                "uniform `{}` is declared as `{}` but `{}` is required",
                name,
                actual.as_str(),
                expected.as_str()
            ),
            Error::UniformArraySizeMismatch {
                name,
                expected,
                actual,
            } => write!(
                f,
                "uniform `{}` array size mismatched, expected {:?} but found {:?}",
                name, expected, actual
            ),
            Error::NoSuchModule(name) => write!(f, "module `{}` not found", name),
            Error::NoSuchMethod { module, method } => {
                write!(f, "method `{}` not found in module `{}`", method, module)
            }
            Error::ReservedModuleName(name) => {
                write!(f, "module name `{}` is reserved", name)
            }
            Error::ModuleOccupied(name) => {
                write!(f, "module `{}` is already defined", name)
            }
            Error::NoSuchOption { key, option } => match option {
                Some(option) => write!(f, "option `{}` not found under `{}`", option, key),
                None => write!(f, "no options registered under `{}`", key),
            },
            Error::VersionMismatch { vertex, fragment } => write!(
                f,
                "vertex shader version `{}` mismatches fragment shader version `{}`",
                vertex.as_str(),
                fragment.as_str()
            ),
            Error::CompileShaderFailure(msg) => match msg {
                Some(msg) => write!(f, "failed to compile shader: {}", msg),
                None => write!(f, "failed to compile shader"),
            },
            Error::CompileProgramFailure(msg) => match msg {
                Some(msg) => write!(f, "failed to link program: {}", msg),
                None => write!(f, "failed to link program"),
            },
            Error::HookCallbackFailure { hook, message } => {
                write!(f, "hook callback `{}` raised: {}", hook, message)
            }
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(Error::NoFunctionDefined.code().as_str(), "SHADER_ERROR");
        assert_eq!(
            Error::NoSuchModule("m".to_string()).code().as_str(),
            "MODULE_ERROR"
        );
        assert_eq!(
            Error::VersionMismatch {
                vertex: GlslVersion::Gl1,
                fragment: GlslVersion::Gl2,
            }
            .code(),
            ErrorCode::Validation
        );
        assert_eq!(
            Error::CompileProgramFailure(None).code(),
            ErrorCode::Program
        );
    }
}
