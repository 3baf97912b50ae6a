//! parsesync CLI entry point.

use clap::Parser;
use parsesync::cli::commands;
use parsesync::cli::{Cli, Commands};
use parsesync::error::Error;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    // Set up tracing based on verbosity
    init_tracing(cli.verbose, cli.quiet);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if cli.json {
                eprintln!("{}", e.to_structured_json());
            } else if !cli.quiet {
                if let Some(hint) = e.hint() {
                    eprintln!("Error: {e}\n  Hint: {hint}");
                } else {
                    eprintln!("Error: {e}");
                }
            }
            ExitCode::from(e.exit_code())
        }
    }
}

fn init_tracing(verbose: u8, quiet: bool) {
    use tracing_subscriber::EnvFilter;

    if quiet {
        return;
    }

    // Honor RUST_LOG if set, otherwise use verbosity flag
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        match verbose {
            0 => EnvFilter::new("warn"),
            1 => EnvFilter::new("info"),
            2 => EnvFilter::new("debug,rusqlite=info,reqwest=info"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn run(cli: &Cli) -> Result<(), Error> {
    let config = cli.config.as_deref();
    let db = cli.db.as_deref();
    let (json, quiet) = (cli.json, cli.quiet);

    match &cli.command {
        Commands::Version => commands::version::execute(json),

        // Sync
        Commands::Import(args) => commands::sync::import(args, config, db, json, quiet),
        Commands::Pull(args) => commands::sync::pull(args, config, db, json, quiet),
        Commands::Push(args) => commands::sync::push(args, config, db, json, quiet),
        Commands::Delete { kind, object_id } => {
            commands::sync::delete(kind, object_id, config, db, json, quiet)
        }

        // Inspection
        Commands::Status => commands::status::execute(config, db, json),
        Commands::Kinds => commands::kinds::execute(config, json),

        // Shell completions
        Commands::Completions { shell } => commands::completions::execute(shell),
    }
}
