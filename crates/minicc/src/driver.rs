//! Compilation driver: file in, IR (or executable) out.
//!
//! The driver owns the stage ordering and the exit policy: semantic
//! errors stop the pipeline unless `-f` forces best-effort emission, in
//! which case the process reports success-with-warnings. Linking shells
//! out to clang on the emitted `.ll` file, the way the usual
//! assemble-and-link step expects.

use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::Command;

use minicc_syntax::parser;

use crate::codegen::{self, EmitReport};
use crate::{sema, Error};

#[derive(Debug, Clone)]
pub struct Options {
    pub input: PathBuf,
    /// Output path; defaults to stdout for IR and `a.out` for executables.
    pub output: Option<PathBuf>,
    /// Compile and link via the external toolchain (`-c`).
    pub link: bool,
    /// Optimization level forwarded to the external toolchain (`-O`).
    pub opt_level: u8,
    /// Emit IR even when the semantic pass reported errors (`-f`).
    pub force: bool,
    /// Stop after semantic analysis (`-t`).
    pub type_check_only: bool,
    /// Dump the parsed AST to stderr (`-d`).
    pub dump_ast: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    /// Compilation finished but diagnostics were produced (forced
    /// emission, or fail-open problems during codegen).
    Warnings,
}

pub fn run(options: &Options) -> Result<Outcome, Error> {
    let source = fs::read_to_string(&options.input)?;
    let mut program = parser::parse(&source)?;
    log::info!("parsed {}", options.input.display());

    if options.dump_ast {
        eprintln!("{:#?}", program);
    }

    let errors = sema::check(&mut program);
    for error in &errors {
        eprintln!("error: {}", error);
    }
    if !errors.is_empty() {
        if !options.force {
            return Err(Error::Semantic {
                count: errors.len(),
            });
        }
        log::warn!("forcing emission despite {} semantic error(s)", errors.len());
    }

    if options.type_check_only {
        return Ok(if errors.is_empty() {
            Outcome::Success
        } else {
            Outcome::Warnings
        });
    }

    let report = if options.link {
        self::link(options, &program)?
    } else {
        emit_ir(options, &program)?
    };

    if errors.is_empty() && report.diagnostics == 0 {
        Ok(Outcome::Success)
    } else {
        Ok(Outcome::Warnings)
    }
}

fn emit_ir(options: &Options, program: &minicc_syntax::ast::Program) -> Result<EmitReport, Error> {
    match &options.output {
        Some(path) => {
            let mut file = fs::File::create(path)?;
            let report = codegen::generate(program, &mut file)?;
            file.flush()?;
            log::info!("IR written to {}", path.display());
            Ok(report)
        }
        None => {
            let stdout = io::stdout();
            let mut lock = stdout.lock();
            Ok(codegen::generate(program, &mut lock)?)
        }
    }
}

fn link(options: &Options, program: &minicc_syntax::ast::Program) -> Result<EmitReport, Error> {
    // IR goes to a sibling temporary, which clang then assembles.
    let ir_path = PathBuf::from(format!("{}.ll", options.input.display()));
    let report = {
        let mut file = fs::File::create(&ir_path)?;
        let report = codegen::generate(program, &mut file)?;
        file.flush()?;
        report
    };

    let exe = options
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from("a.out"));
    let mut command = Command::new("clang");
    command
        .arg(format!("-O{}", options.opt_level))
        .arg("-o")
        .arg(&exe)
        .arg(&ir_path);
    log::info!("running {:?}", command);

    let status = command.status().map_err(Error::ToolchainSpawn);
    let _ = fs::remove_file(&ir_path);
    let status = status?;
    if !status.success() {
        return Err(Error::Toolchain(status));
    }
    log::info!("executable written to {}", exe.display());
    Ok(report)
}
