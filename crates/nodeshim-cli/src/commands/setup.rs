//! Shared setup for commands that need a compatibility preset.

use nodeshim_core::compat::preset::default_compatibility_date;
use nodeshim_core::compat::{
    FilePresetProvider, NodePresetProvider, PresetProvider, PresetRequest,
};
use nodeshim_core::{CompatOptions, Config};
use serde::Serialize;
use std::path::PathBuf;
use tracing::warn;

/// Preset selection flags.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct PresetArgs {
    /// Target runtime compatibility date (YYYY-MM-DD)
    #[arg(long, value_name = "DATE")]
    pub date: Option<String>,

    /// Compatibility flag (repeatable, order is kept)
    #[arg(long = "flag", value_name = "FLAG")]
    pub flags: Vec<String>,

    /// Read the preset from a JSON file instead of querying `node`
    #[arg(long, value_name = "PATH")]
    pub preset_file: Option<PathBuf>,

    /// Install the preset packages with this package manager first
    #[arg(long, value_name = "PM")]
    pub install_with: Option<String>,
}

/// Error payload for JSON output.
#[derive(Serialize)]
pub struct ErrorJson {
    pub code: String,
    pub message: String,
}

/// Error result for JSON output.
#[derive(Serialize)]
struct ErrorResult {
    ok: bool,
    error: ErrorJson,
}

/// Report a failure and exit with status 1.
pub fn fail(json: bool, code: &str, message: &str) -> ! {
    if json {
        let result = ErrorResult {
            ok: false,
            error: ErrorJson {
                code: code.to_string(),
                message: message.to_string(),
            },
        };
        match serde_json::to_string(&result) {
            Ok(text) => println!("{text}"),
            Err(_) => eprintln!("error: {code}: {message}"),
        }
    } else {
        eprintln!("error: {code}: {message}");
    }
    std::process::exit(1);
}

/// Project options with command-line overrides applied.
pub fn options(config: &Config, args: &PresetArgs) -> CompatOptions {
    let mut options = match CompatOptions::load(&config.cwd) {
        Ok(options) => options,
        Err(e) => fail(config.json_logs, e.code(), &e.to_string()),
    };

    if args.date.is_some() {
        options.compatibility_date.clone_from(&args.date);
    }
    if !args.flags.is_empty() {
        options.compatibility_flags.clone_from(&args.flags);
    }
    if args.install_with.is_some() {
        options.install_with.clone_from(&args.install_with);
    }
    options
}

/// Preset request for the project.
pub fn request(config: &Config, options: &CompatOptions) -> PresetRequest {
    let date = options.compatibility_date.clone().unwrap_or_else(|| {
        let today = default_compatibility_date();
        warn!(date = %today, "no compatibility date configured, using today");
        today
    });

    match PresetRequest::new(
        &date,
        options.compatibility_flags.clone(),
        config.cwd.clone(),
    ) {
        Ok(request) => request,
        Err(e) => fail(config.json_logs, e.code(), &e.to_string()),
    }
}

/// Provider selected by the flags.
pub fn provider(
    config: &Config,
    args: &PresetArgs,
    options: &CompatOptions,
) -> Box<dyn PresetProvider> {
    match &args.preset_file {
        Some(path) => Box::new(FilePresetProvider::new(config.cwd.join(path))),
        None => Box::new(
            NodePresetProvider::new()
                .with_timeout(options.process_timeout())
                .with_install(options.install_with.clone()),
        ),
    }
}
