#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

mod commands;
mod logging;

use clap::Parser;
use commands::setup::PresetArgs;
use nodeshim_core::Config;
use miette::Result;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "nodeshim")]
#[command(author, version, about = "Node.js built-in compatibility for sandboxed bundles", long_about = None)]
struct Cli {
    /// Increase logging verbosity (-v for DEBUG, -vv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit JSON formatted output (stable, machine-readable)
    #[arg(long, global = true)]
    json: bool,

    /// Override the working directory
    #[arg(long, global = true, value_name = "PATH")]
    cwd: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Print version information
    Version,

    /// Print the compatibility preset for a date and flags
    Preset {
        #[command(flatten)]
        preset: PresetArgs,
    },

    /// Run one pass over the given specifiers and print how each resolves
    Resolve {
        /// Specifiers to resolve, in order
        #[arg(required = true)]
        specifiers: Vec<String>,

        /// How the specifiers are reached (import, require, dynamic)
        #[arg(long, default_value = "import")]
        kind: String,

        /// Importing module reported in diagnostics
        #[arg(long, value_name = "PATH")]
        importer: Option<String>,

        /// Output format of the bundle (esm, cjs, iife)
        #[arg(long)]
        format: Option<String>,

        /// Enumerate built-in modules with `node` instead of the static list
        #[arg(long)]
        builtins_from_node: bool,

        #[command(flatten)]
        preset: PresetArgs,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Determine working directory
    let cwd = cli
        .cwd
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));

    // Build config
    let config = Config::new(cwd.clone())
        .with_verbosity(cli.verbose)
        .with_json_logs(cli.json);

    logging::init(config.verbosity, config.json_logs);

    match cli.command {
        Some(Commands::Version) | None => commands::version::run(),
        Some(Commands::Preset { preset }) => {
            let span = tracing::info_span!("preset", cmd = "preset", cwd = %cwd.display());
            let _guard = span.enter();
            commands::preset::run(&config, &preset)
        }
        Some(Commands::Resolve {
            specifiers,
            kind,
            importer,
            format,
            builtins_from_node,
            preset,
        }) => {
            let span = tracing::info_span!("resolve", cmd = "resolve", cwd = %cwd.display());
            let _guard = span.enter();
            let action = commands::resolve::ResolveAction {
                specifiers,
                kind,
                importer,
                format,
                builtins_from_node,
                preset,
            };
            commands::resolve::run(&config, action)
        }
    }
}
