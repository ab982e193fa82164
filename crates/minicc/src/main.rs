use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;

use minicc::driver::{self, Options, Outcome};

/// Compile a C source file to LLVM IR
#[derive(Clone, Debug, Parser)]
#[command(name = "minicc", version)]
struct Args {
    /// input C source file
    input: PathBuf,
    /// output file (default: stdout for IR, a.out for executables)
    #[arg(short)]
    output: Option<PathBuf>,
    /// emit LLVM IR only (default)
    #[arg(short = 'S')]
    emit_ir: bool,
    /// compile and link an executable via the external toolchain
    #[arg(short = 'c')]
    compile: bool,
    /// optimization level forwarded to the external toolchain
    #[arg(short = 'O', value_name = "LEVEL", default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=3))]
    opt_level: u8,
    /// force IR emission despite semantic errors
    #[arg(short = 'f')]
    force: bool,
    /// run the semantic pass only, emit nothing
    #[arg(short = 't', long = "type-check")]
    type_check: bool,
    /// dump the parsed AST to stderr
    #[arg(short = 'd', long = "debug")]
    debug: bool,
    /// increase logging verbosity (-v, -vv)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let filter = match args.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();

    let options = Options {
        input: args.input.clone(),
        output: args.output,
        // an explicit -S wins over -c
        link: args.compile && !args.emit_ir,
        opt_level: args.opt_level,
        force: args.force,
        type_check_only: args.type_check,
        dump_ast: args.debug,
    };

    let result = driver::run(&options)
        .with_context(|| format!("failed to compile {}", args.input.display()));
    match result {
        Ok(Outcome::Success) => ExitCode::SUCCESS,
        Ok(Outcome::Warnings) => ExitCode::from(2),
        Err(error) => {
            eprintln!("error: {:#}", error);
            ExitCode::FAILURE
        }
    }
}
