//! SPIR-V backend for NESL assemblies.
//!
//! Lowers the methods reachable from a set of entry points into one binary
//! SPIR-V module. Function materialization runs on a rayon pool; types,
//! constants, variables and functions are interned so each is declared once
//! per run regardless of which worker asks first.
//!
//! ```text
//! header | capabilities + memory model + entry points + execution modes
//!        | annotations | types, constants, variables | function bodies
//! ```
//!
//! # Debug Environment Variables
//!
//! - `RUST_LOG=nesl_spirv=debug`: one event per declared type, constant,
//!   variable and function.
//! - `RUST_LOG=nesl_spirv=trace`: additionally, every translated IL
//!   instruction.

mod builtin_types;
mod compiler;
mod config;
mod constant;
mod error;
mod function;
mod generator;
mod id;
mod il;
mod layout;
mod module;
mod registry;
mod types;
mod variable;

pub use compiler::SpirVCompiler;
pub use config::{CompilerConfig, DEFAULT_GENERATOR, DEFAULT_VERSION};
pub use error::{CompileError, Result};
pub use function::{FunctionKey, SpirVFunction};
pub use id::SpirVId;
pub use module::{RawInstruction, SpirVModule};
pub use types::SpirVType;
pub use variable::SpirVVariable;

use std::sync::Once;

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for debug output.
///
/// Safe to call multiple times. Does nothing unless `RUST_LOG` is set.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        if std::env::var("RUST_LOG").is_ok() {
            tracing_subscriber::registry()
                .with(fmt::layer().with_target(true).with_level(true))
                .with(EnvFilter::from_default_env())
                .init();
        }
    });
}
