//! Global injection.
//!
//! Every distinct inject source module gets one prelude module that imports
//! the needed exports and assigns them onto `globalThis`. Polyfills get a
//! side-effect-only prelude. All preludes are registered as always-inject
//! modules so they load before user code.

use super::error::CompatError;
use super::module::{js_string, VirtualModule};
use super::preset::InjectSource;
use crate::host::FILE_NAMESPACE;
use regex_lite::Regex;
use std::collections::BTreeMap;
use std::fmt::Write;
use std::path::{Path, PathBuf};

/// File name prefix of every prelude module.
pub const VIRTUAL_MARKER: &str = "_virtual_unenv_global_polyfill-";

/// One global assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Binding {
    global: String,
    export: String,
    local: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Prelude {
    Assign {
        module: String,
        bindings: Vec<Binding>,
    },
    SideEffect {
        module: PathBuf,
    },
}

/// Registered prelude modules for a build.
#[derive(Debug, Clone)]
pub struct GlobalInjector {
    preludes: BTreeMap<String, Prelude>,
    order: Vec<String>,
    pattern: Option<Regex>,
}

impl GlobalInjector {
    /// Register preludes for `inject` and the already-resolved `polyfills`.
    ///
    /// `polyfills` pairs each polyfill specifier with its absolute path.
    pub fn new(
        base_dir: &Path,
        inject: &BTreeMap<String, InjectSource>,
        polyfills: &[(String, PathBuf)],
    ) -> Self {
        let mut by_module: BTreeMap<&str, Vec<Binding>> = BTreeMap::new();
        for (global, source) in inject {
            let local = match source.local_name() {
                "default" => "defaultExport",
                other => other,
            };
            by_module.entry(source.module()).or_default().push(Binding {
                global: global.clone(),
                export: source.export_name().to_string(),
                local: local.to_string(),
            });
        }

        let mut injector = Self {
            preludes: BTreeMap::new(),
            order: Vec::new(),
            pattern: Regex::new(&format!("{}(.+)$", regex_lite::escape(VIRTUAL_MARKER))).ok(),
        };

        for (module, mut bindings) in by_module {
            disambiguate_locals(&mut bindings);
            injector.register(
                base_dir,
                module,
                Prelude::Assign {
                    module: module.to_string(),
                    bindings,
                },
            );
        }

        for (specifier, resolved) in polyfills {
            let assigned = injector.preludes.values().any(
                |p| matches!(p, Prelude::Assign { module, .. } if module == specifier),
            );
            let registered = injector.preludes.values().any(
                |p| matches!(p, Prelude::SideEffect { module } if module == resolved),
            );
            if assigned || registered {
                continue;
            }
            injector.register(
                base_dir,
                specifier,
                Prelude::SideEffect {
                    module: resolved.clone(),
                },
            );
        }

        injector
    }

    fn register(&mut self, base_dir: &Path, module: &str, prelude: Prelude) {
        let stem = format!("{VIRTUAL_MARKER}{}", module.replace('/', "-"));
        let mut path = base_dir.join(&stem).to_string_lossy().into_owned();
        let mut n = 1;
        while self.preludes.contains_key(&path) {
            n += 1;
            path = base_dir
                .join(format!("{stem}-{n}"))
                .to_string_lossy()
                .into_owned();
        }
        self.order.push(path.clone());
        self.preludes.insert(path, prelude);
    }

    /// Always-inject paths, assign preludes first then polyfills.
    #[must_use]
    pub fn inject_paths(&self) -> &[String] {
        &self.order
    }

    /// Whether `path` names a prelude module.
    #[must_use]
    pub fn matches(&self, path: &str) -> bool {
        match &self.pattern {
            Some(re) => re.is_match(path),
            None => path.contains(VIRTUAL_MARKER),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.preludes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.preludes.is_empty()
    }

    /// Generate the prelude registered at `path`.
    pub fn generate(&self, path: &str) -> Result<VirtualModule, CompatError> {
        let prelude = self
            .preludes
            .get(path)
            .ok_or_else(|| CompatError::UnregisteredVirtualModule {
                namespace: FILE_NAMESPACE.to_string(),
                path: path.to_string(),
            })?;

        let contents = match prelude {
            Prelude::Assign { module, bindings } => assign_body(module, bindings),
            Prelude::SideEffect { module } => {
                format!("import {};\n", js_string(&module.to_string_lossy()))
            }
        };
        Ok(VirtualModule::js(FILE_NAMESPACE, path, contents))
    }
}

/// Give every distinct export of one module its own local binding.
///
/// A local already taken by another export gets a `$n` suffix.
fn disambiguate_locals(bindings: &mut [Binding]) {
    let mut taken: BTreeMap<String, String> = BTreeMap::new();
    for binding in bindings.iter_mut() {
        let mut local = binding.local.clone();
        let mut n = 1;
        loop {
            match taken.get(&local) {
                None => {
                    taken.insert(local.clone(), binding.export.clone());
                    break;
                }
                Some(export) if *export == binding.export => break,
                Some(_) => {
                    n += 1;
                    local = format!("{}${n}", binding.local);
                }
            }
        }
        binding.local = local;
    }
}

fn assign_body(module: &str, bindings: &[Binding]) -> String {
    let mut imports: Vec<String> = Vec::new();
    for binding in bindings {
        let item = if binding.export == binding.local {
            binding.export.clone()
        } else {
            format!("{} as {}", binding.export, binding.local)
        };
        if !imports.contains(&item) {
            imports.push(item);
        }
    }

    let mut body = format!("import {{ {} }} from {};\n", imports.join(", "), js_string(module));
    for binding in bindings {
        if is_identifier(&binding.global) {
            let _ = writeln!(body, "globalThis.{} = {};", binding.global, binding.local);
        } else {
            let _ = writeln!(
                body,
                "globalThis[{}] = {};",
                js_string(&binding.global),
                binding.local
            );
        }
    }
    body
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inject(entries: &[(&str, InjectSource)]) -> BTreeMap<String, InjectSource> {
        entries
            .iter()
            .map(|(g, s)| ((*g).to_string(), s.clone()))
            .collect()
    }

    fn default(module: &str) -> InjectSource {
        InjectSource::Default {
            module: module.to_string(),
        }
    }

    #[test]
    fn test_default_inject_prelude() {
        let injector = GlobalInjector::new(
            Path::new("/app"),
            &inject(&[("process", default("unenv/node/process"))]),
            &[],
        );
        assert_eq!(
            injector.inject_paths(),
            ["/app/_virtual_unenv_global_polyfill-unenv-node-process"]
        );

        let module = injector.generate(&injector.inject_paths()[0]).unwrap();
        assert_eq!(
            module.contents,
            "import { default as defaultExport } from \"unenv/node/process\";\n\
             globalThis.process = defaultExport;\n"
        );
    }

    #[test]
    fn test_groups_by_module_and_renames() {
        let injector = GlobalInjector::new(
            Path::new("/app"),
            &inject(&[
                (
                    "Buffer",
                    InjectSource::Named {
                        module: "unenv/node/buffer".to_string(),
                        export: "Buffer".to_string(),
                    },
                ),
                (
                    "performance",
                    InjectSource::Renamed {
                        module: "unenv/node/buffer".to_string(),
                        export: "performance".to_string(),
                        local: "perf".to_string(),
                    },
                ),
                ("global.x", default("unenv/node/buffer")),
            ]),
            &[],
        );
        assert_eq!(injector.len(), 1);

        let module = injector.generate(&injector.inject_paths()[0]).unwrap();
        assert_eq!(
            module.contents,
            "import { Buffer, default as defaultExport, performance as perf } from \"unenv/node/buffer\";\n\
             globalThis.Buffer = Buffer;\n\
             globalThis[\"global.x\"] = defaultExport;\n\
             globalThis.performance = perf;\n"
        );
    }

    #[test]
    fn test_colliding_locals_get_distinct_bindings() {
        let injector = GlobalInjector::new(
            Path::new("/app"),
            &inject(&[
                (
                    "Blob",
                    InjectSource::Renamed {
                        module: "unenv/node/buffer".to_string(),
                        export: "Blob".to_string(),
                        local: "Buffer".to_string(),
                    },
                ),
                (
                    "Buffer",
                    InjectSource::Named {
                        module: "unenv/node/buffer".to_string(),
                        export: "Buffer".to_string(),
                    },
                ),
                (
                    "SlowBuffer",
                    InjectSource::Named {
                        module: "unenv/node/buffer".to_string(),
                        export: "Buffer".to_string(),
                    },
                ),
            ]),
            &[],
        );

        let module = injector.generate(&injector.inject_paths()[0]).unwrap();
        assert_eq!(
            module.contents,
            "import { Blob as Buffer, Buffer as Buffer$2 } from \"unenv/node/buffer\";\n\
             globalThis.Blob = Buffer;\n\
             globalThis.Buffer = Buffer$2;\n\
             globalThis.SlowBuffer = Buffer$2;\n"
        );
    }

    #[test]
    fn test_polyfills_are_side_effect_only() {
        let injector = GlobalInjector::new(
            Path::new("/app"),
            &inject(&[("process", default("unenv/node/process"))]),
            &[
                (
                    "unenv/polyfill/timers".to_string(),
                    PathBuf::from("/app/node_modules/unenv/polyfill/timers.mjs"),
                ),
                (
                    "unenv/node/process".to_string(),
                    PathBuf::from("/app/node_modules/unenv/node/process.mjs"),
                ),
            ],
        );
        assert_eq!(injector.inject_paths().len(), 2);

        let polyfill = injector.generate(&injector.inject_paths()[1]).unwrap();
        assert_eq!(
            polyfill.contents,
            "import \"/app/node_modules/unenv/polyfill/timers.mjs\";\n"
        );
    }

    #[test]
    fn test_colliding_paths_get_suffixes() {
        let injector = GlobalInjector::new(
            Path::new("/app"),
            &inject(&[("a", default("x/y")), ("b", default("x-y"))]),
            &[],
        );
        let paths = injector.inject_paths();
        assert_eq!(paths.len(), 2);
        assert_ne!(paths[0], paths[1]);
        assert!(paths[1].ends_with("-2"));
    }

    #[test]
    fn test_unregistered_path_is_fault() {
        let injector = GlobalInjector::new(Path::new("/app"), &BTreeMap::new(), &[]);
        let path = "/app/_virtual_unenv_global_polyfill-nothing";
        assert!(injector.matches(path));
        assert!(!injector.matches("/app/index.js"));

        let err = injector.generate(path).unwrap_err();
        assert!(matches!(err, CompatError::UnregisteredVirtualModule { .. }));
    }

    #[test]
    fn test_generation_is_deterministic() {
        let entries = inject(&[
            ("process", default("unenv/node/process")),
            ("Buffer", default("unenv/node/buffer")),
            ("global", default("unenv/node/process")),
        ]);
        let a = GlobalInjector::new(Path::new("/app"), &entries, &[]);
        let b = GlobalInjector::new(Path::new("/app"), &entries, &[]);

        assert_eq!(a.inject_paths(), b.inject_paths());
        for path in a.inject_paths() {
            assert_eq!(a.generate(path).unwrap(), b.generate(path).unwrap());
        }
    }
}
