#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::struct_excessive_bools)]

mod commands;
mod logging;

use clap::Parser;
use miette::Result;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "ndepe")]
#[command(author, version, about = "Emit a pruned production node_modules from a file trace", long_about = None)]
struct Cli {
    /// Increase logging verbosity (-v for DEBUG, -vv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit JSON formatted output (stable, machine-readable)
    #[arg(long, global = true)]
    json: bool,

    /// Override the working directory (the app directory)
    #[arg(long, global = true, value_name = "PATH")]
    cwd: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Print version information
    Version,

    /// Trace entries and write node_modules and package.json into the source directory
    Emit {
        /// Directory holding the entry scripts (relative to the app directory)
        #[arg(long, value_name = "DIR")]
        source_dir: Option<PathBuf>,

        /// Config file (defaults to ndepe.config.json in the app directory)
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Extra entry file (repeatable)
        #[arg(long = "include", value_name = "FILE")]
        include: Vec<PathBuf>,

        /// Glob excluding discovered entry files (repeatable)
        #[arg(long = "exclude", value_name = "GLOB")]
        exclude: Vec<String>,

        /// Glob on package names copied as whole directories (repeatable)
        #[arg(long = "copy-whole", value_name = "GLOB")]
        copy_whole: Vec<String>,

        /// Glob for files the tracer records as ignored (repeatable)
        #[arg(long = "ignore", value_name = "GLOB")]
        ignore: Vec<String>,

        /// Enable all tracer caches
        #[arg(long)]
        cache: bool,

        /// Cache directory (relative to the app directory)
        #[arg(long, value_name = "DIR")]
        cache_dir: Option<PathBuf>,

        /// Use a trace graph JSON file instead of the static tracer
        #[arg(long, value_name = "FILE")]
        trace_file: Option<PathBuf>,
    },

    /// Print the trace graph of the given entries as JSON
    Trace {
        /// Entry files; defaults to every script in --source-dir
        entries: Vec<PathBuf>,

        /// Directory scanned for entries when none are given
        #[arg(long, value_name = "DIR")]
        source_dir: Option<PathBuf>,

        /// Glob for files recorded as ignored (repeatable)
        #[arg(long = "ignore", value_name = "GLOB")]
        ignore: Vec<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let cwd = cli
        .cwd
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));

    logging::init(cli.verbose, cli.json);

    match cli.command {
        Some(Commands::Version) | None => commands::version::run(cli.json),
        Some(Commands::Emit {
            source_dir,
            config,
            include,
            exclude,
            copy_whole,
            ignore,
            cache,
            cache_dir,
            trace_file,
        }) => {
            let span = tracing::info_span!("emit", cmd = "emit", cwd = %cwd.display());
            let _guard = span.enter();
            let action = commands::emit::EmitAction {
                cwd: cwd.clone(),
                source_dir,
                config,
                include,
                exclude,
                copy_whole,
                ignore,
                cache,
                cache_dir,
                trace_file,
            };
            commands::emit::run(action, cli.json)
        }
        Some(Commands::Trace {
            entries,
            source_dir,
            ignore,
        }) => {
            let action = commands::trace::TraceAction {
                cwd: cwd.clone(),
                entries,
                source_dir,
                ignore,
            };
            commands::trace::run(action)
        }
    }
}
