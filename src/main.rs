use std::fs::File;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser as ClapParser;
use clap::Subcommand;
use env_logger::Builder;
use log::{debug, info};

use rox::ast_printer::AstPrinter;
use rox::driver;
use rox::error::{LoxError, EXIT_IO_ERROR, EXIT_STATIC_ERROR};
use rox::interpreter::Interpreter;
use rox::scanner::Scanner;

#[derive(ClapParser, Debug)]
#[command(version, about = "Lox language interpreter", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    commands: Commands,

    /// Enable logging to app.log
    #[arg(long, global = true)]
    log: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Tokenizes input from a file, printing each token
    Tokenize {
        filename: Option<PathBuf>,

        /// Print one JSON object per token
        #[arg(long)]
        json: bool,
    },

    /// Parses input from a file as a single expression and prints its AST
    Parse { filename: Option<PathBuf> },

    /// Evaluates input from a file as a single expression and prints the result
    Evaluate { filename: Option<PathBuf> },

    /// Runs input from a file as a Lox program; starts a prompt without one
    Run { filename: Option<PathBuf> },
}

fn init_logger() -> Result<()> {
    let log_file = File::create("app.log").context("Failed to create app.log")?;

    Builder::new()
        .format(|buf, record| {
            let module = record
                .module_path()
                .unwrap_or("<unnamed>")
                .strip_prefix("rox::")
                .unwrap_or(record.module_path().unwrap_or("<unnamed>"));
            writeln!(
                buf,
                "[{}:{}] - {}",
                module,
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .filter(None, log::LevelFilter::Debug) // Default to Debug, override with RUST_LOG
        .parse_default_env()
        .init();

    info!("Logger initialized, writing to app.log");
    Ok(())
}

/// Unreadable input ends the process with the I/O exit status.
fn read_file(filename: &Path) -> String {
    match driver::read_source(filename)
        .with_context(|| format!("Failed to read file {:?}", filename))
    {
        Ok(source) => source,
        Err(e) => {
            eprintln!("{:#}", e);
            std::process::exit(EXIT_IO_ERROR);
        }
    }
}

fn report(errors: &[LoxError]) {
    for err in errors {
        debug!("Reporting: {}", err);
        eprintln!("{}", err);
    }
}

fn no_input() -> ! {
    info!("No filepath provided");
    println!("No input filepath was provided. Exiting...");
    std::process::exit(0);
}

fn tokenize(filename: &Path, json: bool) -> Result<()> {
    let source = read_file(filename);
    let mut tokenized = true;

    for token in Scanner::new(&source) {
        match token {
            Ok(token) => {
                if json {
                    println!("{}", serde_json::to_string(&token)?);
                } else {
                    println!("{}", token);
                }
            }

            Err(e) => {
                tokenized = false;
                eprintln!("{}", e);
            }
        }
    }

    if !tokenized {
        debug!("Tokenization failed, exiting with code 65");
        std::process::exit(EXIT_STATIC_ERROR);
    }

    Ok(())
}

fn parse(filename: &Path) -> Result<()> {
    let source = read_file(filename);

    match driver::parse_expression(&source) {
        Ok(expr) => {
            let ast_str = AstPrinter::print(&expr);
            debug!("AST: {}", ast_str);
            println!("{}", ast_str);
            Ok(())
        }

        Err(errors) => {
            report(&errors);
            std::process::exit(driver::exit_code(&errors));
        }
    }
}

fn evaluate(filename: &Path) -> Result<()> {
    let source = read_file(filename);
    let mut interpreter = Interpreter::new();

    let expr = match driver::parse_expression(&source) {
        Ok(expr) => expr,
        Err(errors) => {
            report(&errors);
            std::process::exit(driver::exit_code(&errors));
        }
    };

    match interpreter.evaluate(&expr) {
        Ok(value) => {
            debug!("Evaluated to: {}", value);
            println!("{}", value);
            Ok(())
        }

        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(e.exit_code());
        }
    }
}

fn run_file(filename: &Path) -> Result<()> {
    let source = read_file(filename);
    info!("Provided input:\n {}", source);

    let mut interpreter = Interpreter::new();

    if let Err(errors) = driver::run_source(&mut interpreter, &source) {
        report(&errors);
        std::process::exit(driver::exit_code(&errors));
    }

    info!("Program executed successfully");
    Ok(())
}

/// Interactive session: one interpreter for the whole session so globals
/// persist; errors are reported and the prompt continues.
fn run_prompt() -> Result<()> {
    info!("Starting interactive prompt");

    let mut interpreter = Interpreter::new();
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        print!("> ");
        io::stdout().flush()?;

        let Some(line) = lines.next() else {
            break;
        };
        let line = line.context("Failed to read from stdin")?;

        if let Err(errors) = driver::run_source(&mut interpreter, &line) {
            report(&errors);
        }
    }

    println!();
    Ok(())
}

fn main() -> Result<()> {
    let args: Cli = Cli::parse();

    if args.log {
        init_logger()?;
    } else {
        // Initialize a minimal logger to avoid "no logger" errors
        env_logger::Builder::new()
            .filter_level(log::LevelFilter::Off)
            .init();
    }

    info!("CLI arguments: {:?}", args);

    match args.commands {
        Commands::Tokenize { filename, json } => match filename {
            Some(filename) => tokenize(&filename, json),
            None => no_input(),
        },

        Commands::Parse { filename } => match filename {
            Some(filename) => parse(&filename),
            None => no_input(),
        },

        Commands::Evaluate { filename } => match filename {
            Some(filename) => evaluate(&filename),
            None => no_input(),
        },

        Commands::Run { filename } => match filename {
            Some(filename) => run_file(&filename),
            None => run_prompt(),
        },
    }
}
