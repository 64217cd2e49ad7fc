use clap::{Parser, Subcommand};
use sable_syntax::Span;
use sable_typeck::SableError;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Stack for the evaluation thread. Evaluation recurses on the native stack, so this bounds
/// how deep user recursion can go.
const INTERPRETER_STACK_SIZE: usize = 256 * 1024 * 1024;

#[derive(Parser)]
#[command(name = "sable", about = "The Sable programming language")]
struct Cli {
    #[command(subcommand)]
    command: Command,
    /// Do not prepend the bundled prelude
    #[arg(long, global = true)]
    no_prelude: bool,
    /// Log filter (e.g. `debug`, `sable_typeck=trace`); overrides SABLE_LOG
    #[arg(long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Parse a .sable file and dump the syntax tree
    Parse {
        /// Path to the .sable source file
        file: PathBuf,
    },
    /// Type-check a .sable file without running it
    Check {
        /// Path to the .sable source file
        file: PathBuf,
    },
    /// Type-check and evaluate a .sable file, printing the result
    Run {
        /// Path to the .sable source file
        file: PathBuf,
    },
}

fn init_logging(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_env("SABLE_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Source text as handed to the front end, plus where the user's file starts in it.
struct Input {
    source: String,
    offset: u32,
}

impl Input {
    fn read(file: &Path, no_prelude: bool) -> Result<Input, ()> {
        let text = std::fs::read_to_string(file).map_err(|e| {
            eprintln!("error: could not read {}: {}", file.display(), e);
        })?;
        Ok(if no_prelude {
            Input {
                source: text,
                offset: 0,
            }
        } else {
            Input {
                source: sable_interp::with_prelude(&text),
                offset: sable_interp::PRELUDE_OFFSET,
            }
        })
    }

    fn report(&self, file: &Path, kind: &str, span: Span, message: &str) {
        let span = span.rebase(self.offset);
        eprintln!(
            "{}:{}:{}: {}: {}",
            file.display(),
            span.start,
            span.end,
            kind,
            message
        );
    }

    fn check(&self, file: &Path) -> Result<sable_typeck::Program, ()> {
        let name = file.display().to_string();
        sable_typeck::check(&name, &self.source).map_err(|e| match e {
            SableError::Parse(errors) => {
                for error in &errors {
                    self.report(file, "parse error", error.span, &error.message);
                }
            }
            SableError::TypeCheck(error) => {
                self.report(file, "type error", error.span, &error.message);
            }
        })
    }
}

fn parse_command(file: &Path) -> Result<(), ()> {
    let input = Input::read(file, true)?;
    let (tree, errors) = sable_parser::parse(&input.source);
    for error in &errors {
        input.report(file, "parse error", error.span, &error.message);
    }
    print!("{}", sable_syntax::pretty_print(&tree));
    if errors.is_empty() {
        Ok(())
    } else {
        Err(())
    }
}

fn check_command(file: &Path, no_prelude: bool) -> Result<(), ()> {
    let input = Input::read(file, no_prelude)?;
    let program = input.check(file)?;
    info!(file = %file.display(), decls = program.decls.len(), "checked");
    println!("OK");
    Ok(())
}

fn run_command(file: &Path, no_prelude: bool) -> Result<(), ()> {
    let input = Input::read(file, no_prelude)?;
    let program = input.check(file)?;
    debug!(file = %file.display(), "evaluating");
    match sable_interp::evaluate_program(&program) {
        Ok(value) => {
            println!("{}", value);
            Ok(())
        }
        Err(e) => {
            match e.span {
                Some(span) => input.report(file, "runtime error", span, &e.message),
                None => eprintln!("{}: runtime error: {}", file.display(), e.message),
            }
            Err(())
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.log_level.as_deref());

    let no_prelude = cli.no_prelude;
    let result = match cli.command {
        Command::Parse { file } => parse_command(&file),
        Command::Check { file } => check_command(&file, no_prelude),
        Command::Run { file } => std::thread::Builder::new()
            .name("sable-run".into())
            .stack_size(INTERPRETER_STACK_SIZE)
            .spawn(move || run_command(&file, no_prelude))
            .map_err(|e| eprintln!("error: could not start interpreter: {}", e))
            .and_then(|handle| {
                handle
                    .join()
                    .map_err(|_| eprintln!("error: interpreter panicked"))
            })
            .and_then(|result| result),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(()) => ExitCode::FAILURE,
    }
}
