//! minicc compiles a subset of C to textual LLVM IR.
//!
//! The pipeline is: parse (via `minicc-syntax`) -> semantic analysis
//! ([`sema`]) -> IR emission ([`codegen`]). The [`driver`] module ties the
//! stages together and optionally hands the emitted IR to an external
//! clang for assembly and linking.

pub mod codegen;
pub mod driver;
pub mod sema;
pub mod symtab;

use std::io;
use std::process::ExitStatus;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("syntax error: {0}")]
    Syntax(#[from] minicc_syntax::parser::ParseError),
    #[error("{count} semantic error(s); compilation stopped (use -f to force emission)")]
    Semantic { count: usize },
    #[error("external toolchain failed with {0}")]
    Toolchain(ExitStatus),
    #[error("could not run external toolchain: {0}")]
    ToolchainSpawn(io::Error),
}
