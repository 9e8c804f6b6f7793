use super::setup::{self, PresetArgs};
use miette::{IntoDiagnostic, Result};
use nodeshim_core::compat::{InjectSource, PresetConfig};
use nodeshim_core::Config;
use serde::Serialize;

#[derive(Serialize)]
struct PresetResult<'a> {
    ok: bool,
    compatibility_date: &'a str,
    compatibility_flags: &'a [String],
    preset: &'a PresetConfig,
}

/// Run the preset command.
pub fn run(config: &Config, args: &PresetArgs) -> Result<()> {
    let options = setup::options(config, args);
    let request = setup::request(config, &options);
    let provider = setup::provider(config, args, &options);

    let preset = match provider.fetch(&request) {
        Ok(preset) => preset,
        Err(e) => setup::fail(config.json_logs, e.code(), &e.to_string()),
    };

    if config.json_logs {
        let result = PresetResult {
            ok: true,
            compatibility_date: request.compatibility_date(),
            compatibility_flags: request.compatibility_flags(),
            preset: &preset,
        };
        println!("{}", serde_json::to_string(&result).into_diagnostic()?);
        return Ok(());
    }

    println!(
        "preset for {} [{}]",
        request.compatibility_date(),
        request.compatibility_flags().join(", ")
    );
    println!("alias ({}):", preset.alias.len());
    for (name, target) in &preset.alias {
        let marker = if preset.is_external(target) {
            " (external)"
        } else {
            ""
        };
        println!("  {name} -> {target}{marker}");
    }
    println!("inject ({}):", preset.inject.len());
    for (global, source) in &preset.inject {
        println!("  {global} <- {}", describe(source));
    }
    println!("polyfill ({}):", preset.polyfill.len());
    for module in &preset.polyfill {
        println!("  {module}");
    }
    Ok(())
}

fn describe(source: &InjectSource) -> String {
    match source {
        InjectSource::Default { module } => format!("{module} (default)"),
        InjectSource::Named { module, export } => format!("{module} ({export})"),
        InjectSource::Renamed {
            module,
            export,
            local,
        } => format!("{module} ({export} as {local})"),
    }
}
