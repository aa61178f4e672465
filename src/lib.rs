pub mod clock;
pub mod compiler;
pub mod driver;
pub mod error;
pub mod glsl;
pub mod hooks;
pub mod module;
pub mod uniform;

pub use compiler::{Compilable, Shader};
pub use error::{Error, ErrorCode};
pub use module::{Module, ModuleOptions};

/// Bootstraps a `[LEVEL][target] message` logger to stdout.
pub fn init_logger(level: log::LevelFilter) {
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{}][{}] {}",
                record.level(),
                record.target(),
                message
            ))
        })
        .level(level)
        .chain(std::io::stdout())
        .apply()
        .expect("failed to init logger");
}
