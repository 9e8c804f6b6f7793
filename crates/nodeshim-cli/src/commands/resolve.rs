use super::setup::{self, PresetArgs};
use miette::{IntoDiagnostic, Result};
use nodeshim_core::compat::{
    Classifier, ExternalFilesPlugin, NodeCompat, NodeCompatPlugin, NodeOracle,
    RuntimeModulesPlugin,
};
use nodeshim_core::host::{
    BuildOptions, BuildPass, LoadArgs, Message, OutputFormat, PluginContainer, PluginError,
    ResolveArgs, ResolveKind,
};
use nodeshim_core::Config;
use serde::Serialize;
use std::str::FromStr;

/// Parameters of the resolve command.
#[derive(Debug)]
pub struct ResolveAction {
    pub specifiers: Vec<String>,
    pub kind: String,
    pub importer: Option<String>,
    pub format: Option<String>,
    pub builtins_from_node: bool,
    pub preset: PresetArgs,
}

#[derive(Serialize)]
struct ModuleJson {
    namespace: String,
    path: String,
    loader: &'static str,
    contents: String,
}

#[derive(Serialize)]
struct ResolutionJson {
    specifier: String,
    kind: &'static str,
    handled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<String>,
    external: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    module: Option<ModuleJson>,
}

#[derive(Serialize)]
struct ResolveResult {
    ok: bool,
    format: &'static str,
    inject: Vec<String>,
    resolutions: Vec<ResolutionJson>,
    preludes: Vec<ModuleJson>,
    warnings: Vec<Message>,
    errors: Vec<Message>,
}

/// Run the resolve command.
pub fn run(config: &Config, action: ResolveAction) -> Result<()> {
    let json = config.json_logs;
    let kind = ResolveKind::from_str(&action.kind)
        .unwrap_or_else(|e| setup::fail(json, "NODESHIM_INVALID_ARGUMENT", &e));

    let options = setup::options(config, &action.preset);
    let format = match &action.format {
        Some(format) => OutputFormat::from_str(format)
            .unwrap_or_else(|e| setup::fail(json, "NODESHIM_INVALID_ARGUMENT", &e)),
        None => options.format,
    };
    let request = setup::request(config, &options);
    let provider = setup::provider(config, &action.preset, &options);
    let oracle = NodeOracle::new("node", options.process_timeout());
    let classifier = if action.builtins_from_node {
        Classifier::from_oracle(&oracle)
    } else {
        Classifier::node_default()
    };

    let compat = NodeCompat::setup(&request, provider.as_ref(), &oracle, classifier)
        .unwrap_or_else(|e| setup::fail(json, e.code(), &e.to_string()));

    let mut container = PluginContainer::new();
    container.add(Box::new(ExternalFilesPlugin::new(
        options.external_extensions.iter().cloned(),
    )));
    container.add(Box::new(RuntimeModulesPlugin::new(
        options.runtime_prefixes.clone(),
        options.runtime_externals.clone(),
    )));
    container.add(Box::new(NodeCompatPlugin::new(compat)));

    let build_options = container
        .configure(BuildOptions::new(config.cwd.clone(), format))
        .unwrap_or_else(|e| plugin_fail(json, &e));
    let pass = BuildPass::start(&container, &build_options).unwrap_or_else(|e| plugin_fail(json, &e));

    let mut resolutions = Vec::with_capacity(action.specifiers.len());
    for specifier in &action.specifiers {
        let mut args = ResolveArgs::new(specifier.clone(), kind).in_dir(config.cwd.clone());
        if let Some(importer) = &action.importer {
            args = args.with_importer(importer.clone());
        }
        resolutions.push(resolve_one(&pass, &args, json));
    }

    let mut preludes = Vec::new();
    for path in pass.inject() {
        let args = ResolveArgs::new(path.clone(), ResolveKind::Import).in_dir(config.cwd.clone());
        if let Some(module) = resolve_one(&pass, &args, json).module {
            preludes.push(module);
        }
    }

    let inject = pass.inject().to_vec();
    let report = pass.finish().unwrap_or_else(|e| plugin_fail(json, &e));
    let ok = report.is_ok();

    if json {
        let result = ResolveResult {
            ok,
            format: format.as_str(),
            inject,
            resolutions,
            preludes,
            warnings: report.warnings,
            errors: report.errors,
        };
        println!("{}", serde_json::to_string(&result).into_diagnostic()?);
    } else {
        for r in &resolutions {
            println!("{} ({}) -> {}", r.specifier, r.kind, describe(r));
            if let Some(module) = &r.module {
                print_module(module);
            }
        }
        for module in &preludes {
            println!("inject {}", module.path);
            print_module(module);
        }
        for warning in &report.warnings {
            eprintln!("warning: [{}] {}", warning.plugin, warning.text);
        }
        for error in &report.errors {
            eprintln!("error: [{}] {}", error.plugin, error.text);
        }
    }

    if ok {
        Ok(())
    } else {
        std::process::exit(1);
    }
}

fn resolve_one(pass: &BuildPass<'_>, args: &ResolveArgs, json: bool) -> ResolutionJson {
    let result = pass.resolve(args).unwrap_or_else(|e| plugin_fail(json, &e));

    let mut resolution = ResolutionJson {
        specifier: args.specifier.clone(),
        kind: args.kind.as_str(),
        handled: result.is_some(),
        id: None,
        namespace: None,
        external: false,
        module: None,
    };
    let Some(result) = result else {
        return resolution;
    };

    if !result.external {
        let loaded = pass
            .load(&LoadArgs::from(&result))
            .unwrap_or_else(|e| plugin_fail(json, &e));
        resolution.module = loaded.map(|load| ModuleJson {
            namespace: result.namespace.clone(),
            path: result.id.clone(),
            loader: load.loader.as_str(),
            contents: load.code,
        });
    }
    resolution.id = Some(result.id);
    resolution.namespace = Some(result.namespace);
    resolution.external = result.external;
    resolution
}

fn describe(resolution: &ResolutionJson) -> String {
    match (&resolution.id, &resolution.namespace) {
        (Some(id), _) if resolution.external => format!("external {id}"),
        (Some(id), Some(namespace)) => format!("{namespace}:{id}"),
        _ => "unhandled".to_string(),
    }
}

fn print_module(module: &ModuleJson) {
    for line in module.contents.lines() {
        println!("    {line}");
    }
}

fn plugin_fail(json: bool, e: &PluginError) -> ! {
    setup::fail(json, "NODESHIM_PLUGIN_ERROR", &e.to_string())
}
