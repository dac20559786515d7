use std::path::PathBuf;

use clap::{CommandFactory, Parser as ClapParser, error::ErrorKind};
use colored::Colorize;
use glyphc::{
    driver::{self, Artifact, CompileOptions, Emit},
    frontend::{SourceFile, SourceFileOrigin},
};
use tracing_subscriber::EnvFilter;

#[derive(Debug, ClapParser)]
#[command(version, about, long_about = None)]
pub struct Args {
    source_files: Vec<PathBuf>,
    /// Stage of the pipeline to print
    #[arg(long, value_enum, default_value_t = Emit::Js)]
    emit: Emit,
    /// Generate code straight from the analyzed program
    #[arg(long)]
    no_optimize: bool,
    /// Log more of what the compiler is doing, repeat for more detail
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() {
    let args = Args::parse();

    install_logging(args.verbose);

    if args.source_files.is_empty() {
        Args::command()
            .error(ErrorKind::MissingRequiredArgument, "Missing source files!")
            .exit();
    }

    for source_file in &args.source_files {
        if !source_file.exists() {
            Args::command()
                .error(
                    ErrorKind::InvalidValue,
                    format!("Source file '{}' does not exist!", source_file.display()),
                )
                .exit()
        }

        if !source_file.is_file() {
            Args::command()
                .error(
                    ErrorKind::InvalidValue,
                    format!("Input path '{}' is not a file!", source_file.display()),
                )
                .exit()
        }
    }

    /* Read in source files */

    let mut source_files = Vec::with_capacity(args.source_files.len());

    for path in args.source_files {
        match std::fs::read_to_string(&path) {
            Ok(contents) => source_files.push(SourceFile {
                contents,
                origin: SourceFileOrigin::File(path),
            }),
            Err(error) => Args::command()
                .error(
                    ErrorKind::Io,
                    format!("Failed to read '{}': {error}", path.display()),
                )
                .exit(),
        }
    }

    let options = CompileOptions {
        emit: args.emit,
        optimize: !args.no_optimize,
    };

    let mut failed = false;

    for source_file in &source_files {
        match driver::compile(source_file, &options) {
            Ok(Artifact::Parsed(module)) => println!("{module:#?}"),
            Ok(Artifact::Analyzed(program) | Artifact::Optimized(program)) => {
                println!("{program:#?}")
            }
            Ok(Artifact::JavaScript(output)) => print!("{output}"),
            Err(error) => {
                eprintln!(
                    "{}: {} (at {})",
                    "error".red().bold(),
                    error,
                    source_file.format_span_position(error.span())
                );
                source_file.highlight_span(error.span());
                failed = true;
            }
        }
    }

    if failed {
        std::process::exit(1);
    }
}

fn install_logging(verbosity: u8) {
    let default_level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
