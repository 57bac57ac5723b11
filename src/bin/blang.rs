//! blang command line driver.
//!
//! Compiles one or more `.b` files into a single LLVM IR module. Assembling and
//! linking the output is left to the LLVM toolchain.

use blang::{CompilationSession, CompileError, CompileOptions};
use clap::Parser;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "blang", version, about = "Compile B programs to LLVM IR")]
struct Args {
    /// B source files, compiled in order into one module.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Output file; `-` writes to stdout. Defaults to the first input with `.ll`.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Bytes per machine word.
    #[arg(long, default_value_t = 8, value_parser = clap::value_parser!(u8).range(1..=8))]
    word_size: u8,

    /// Print session statistics to stderr.
    #[arg(long)]
    stats: bool,

    /// Enable debug logging (RUST_LOG overrides).
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();
    let default_level = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("blang: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<(), CompileError> {
    for input in &args.inputs {
        if input.extension().and_then(|e| e.to_str()) != Some("b") {
            return Err(CompileError::Io {
                path: input.clone(),
                source: io::Error::new(io::ErrorKind::InvalidInput, "expected a .b source file"),
            });
        }
    }

    let module_name = args.inputs[0].display().to_string();
    let options = CompileOptions {
        word_size: usize::from(args.word_size),
        module_name,
    };
    let mut session = CompilationSession::new(options);
    for input in &args.inputs {
        session.compile_file(input)?;
    }
    if args.stats {
        eprint!("{}", session.stats());
    }
    let ir = session.finish().to_string();

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| args.inputs[0].with_extension("ll"));
    write_output(&output, &ir)
}

fn write_output(path: &Path, ir: &str) -> Result<(), CompileError> {
    let io_error = |source: io::Error| CompileError::Io {
        path: path.to_path_buf(),
        source,
    };
    if path == Path::new("-") {
        let mut stdout = io::stdout().lock();
        stdout.write_all(ir.as_bytes()).map_err(io_error)?;
        return stdout.flush().map_err(io_error);
    }
    log::info!("Writing {}", path.display());
    fs::write(path, ir).map_err(io_error)
}
