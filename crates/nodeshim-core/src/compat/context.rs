//! Per-pass mutable state.

use super::error::CompatError;
use super::guard::ImporterMap;
use super::module::VirtualModule;
use crate::host::{ResolveArgs, ResolveIdResult, ResolveKind};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ResolveKey {
    specifier: String,
    kind: ResolveKind,
    resolve_dir: PathBuf,
    importer: Option<String>,
    importer_namespace: String,
}

impl From<&ResolveArgs> for ResolveKey {
    fn from(args: &ResolveArgs) -> Self {
        Self {
            specifier: args.specifier.clone(),
            kind: args.kind,
            resolve_dir: args.resolve_dir.clone(),
            importer: args.importer.clone(),
            importer_namespace: args.importer_namespace.clone(),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A memo cell filled at most once. Empty until a computation succeeds.
type Slot<T> = Arc<Mutex<Option<T>>>;

/// State of one build pass, created at pass start.
///
/// Hooks may run concurrently; every map sits behind its own mutex.
#[derive(Debug, Default)]
pub struct PassContext {
    resolved: Mutex<HashMap<ResolveKey, Slot<Option<ResolveIdResult>>>>,
    externalized: Mutex<ImporterMap>,
    unshimmed: Mutex<ImporterMap>,
    modules: Mutex<HashMap<(String, String), Arc<VirtualModule>>>,
    resolutions: AtomicUsize,
}

impl PassContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve `args` at most once per pass.
    ///
    /// Each request key has its own slot. Concurrent identical requests wait
    /// for the first one while other keys resolve in parallel. Errors are not
    /// memoized.
    pub fn resolve_once<F>(
        &self,
        args: &ResolveArgs,
        compute: F,
    ) -> Result<Option<ResolveIdResult>, CompatError>
    where
        F: FnOnce() -> Result<Option<ResolveIdResult>, CompatError>,
    {
        let slot = Arc::clone(
            lock(&self.resolved)
                .entry(ResolveKey::from(args))
                .or_default(),
        );
        let mut slot = lock(&slot);
        if let Some(result) = slot.as_ref() {
            return Ok(result.clone());
        }

        self.resolutions.fetch_add(1, Ordering::SeqCst);
        let result = compute()?;
        *slot = Some(result.clone());
        Ok(result)
    }

    /// Number of times full resolution logic ran.
    #[must_use]
    pub fn resolution_count(&self) -> usize {
        self.resolutions.load(Ordering::SeqCst)
    }

    /// Record a built-in that stays an external import.
    pub fn record_external(&self, specifier: &str, importer: &str) {
        lock(&self.externalized)
            .entry(specifier.to_string())
            .or_default()
            .insert(importer.to_string());
    }

    /// Record a built-in left external without any shim.
    pub fn record_unshimmed(&self, specifier: &str, importer: &str) {
        lock(&self.unshimmed)
            .entry(specifier.to_string())
            .or_default()
            .insert(importer.to_string());
    }

    #[must_use]
    pub fn externalized(&self) -> ImporterMap {
        lock(&self.externalized).clone()
    }

    #[must_use]
    pub fn unshimmed(&self) -> ImporterMap {
        lock(&self.unshimmed).clone()
    }

    /// Virtual module for (`namespace`, `path`), generated on first request.
    pub fn module<F>(
        &self,
        namespace: &str,
        path: &str,
        generate: F,
    ) -> Result<Arc<VirtualModule>, CompatError>
    where
        F: FnOnce() -> Result<VirtualModule, CompatError>,
    {
        let key = (namespace.to_string(), path.to_string());
        let mut modules = lock(&self.modules);
        if let Some(module) = modules.get(&key) {
            return Ok(Arc::clone(module));
        }
        let module = Arc::new(generate()?);
        modules.insert(key, Arc::clone(&module));
        Ok(module)
    }

    /// Number of virtual modules generated in this pass.
    #[must_use]
    pub fn module_count(&self) -> usize {
        lock(&self.modules).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compat::module::REQUIRED_BUILTIN_NAMESPACE;

    #[test]
    fn test_resolve_once_memoizes_by_full_key() {
        let pass = PassContext::new();
        let args = ResolveArgs::new("fs", ResolveKind::Require)
            .with_importer("/app/a.js")
            .in_dir("/app");

        for _ in 0..3 {
            let result = pass
                .resolve_once(&args, || Ok(Some(ResolveIdResult::external("fs"))))
                .unwrap();
            assert_eq!(result, Some(ResolveIdResult::external("fs")));
        }
        assert_eq!(pass.resolution_count(), 1);

        let other_importer = args.clone().with_importer("/app/b.js");
        pass.resolve_once(&other_importer, || Ok(None)).unwrap();
        let other_kind = ResolveArgs {
            kind: ResolveKind::Import,
            ..args
        };
        pass.resolve_once(&other_kind, || Ok(None)).unwrap();
        assert_eq!(pass.resolution_count(), 3);
    }

    #[test]
    fn test_errors_are_not_memoized() {
        let pass = PassContext::new();
        let args = ResolveArgs::new("fs", ResolveKind::Import);
        assert!(pass
            .resolve_once(&args, || Err(CompatError::MissingPassContext))
            .is_err());
        assert!(pass.resolve_once(&args, || Ok(None)).unwrap().is_none());
        assert_eq!(pass.resolution_count(), 2);
    }

    #[test]
    fn test_distinct_requests_resolve_in_parallel() {
        use std::sync::mpsc;
        use std::time::Duration;

        let pass = PassContext::new();
        let (to_b, from_a) = mpsc::channel();
        let (to_a, from_b) = mpsc::channel();
        let wait = Duration::from_secs(5);

        std::thread::scope(|scope| {
            let a = scope.spawn(|| {
                pass.resolve_once(&ResolveArgs::new("fs", ResolveKind::Import), move || {
                    to_b.send(()).ok();
                    from_b.recv_timeout(wait).map_err(|_| CompatError::MissingPassContext)?;
                    Ok(None)
                })
            });
            let b = scope.spawn(|| {
                pass.resolve_once(&ResolveArgs::new("path", ResolveKind::Import), move || {
                    to_a.send(()).ok();
                    from_a.recv_timeout(wait).map_err(|_| CompatError::MissingPassContext)?;
                    Ok(None)
                })
            });
            a.join().unwrap().unwrap();
            b.join().unwrap().unwrap();
        });
        assert_eq!(pass.resolution_count(), 2);
    }

    #[test]
    fn test_importers_are_collected_per_specifier() {
        let pass = PassContext::new();
        pass.record_external("fs", "/app/b.js");
        pass.record_external("fs", "/app/a.js");
        pass.record_external("fs", "/app/a.js");

        let externalized = pass.externalized();
        assert_eq!(externalized.len(), 1);
        assert_eq!(
            externalized["fs"].iter().collect::<Vec<_>>(),
            ["/app/a.js", "/app/b.js"]
        );
        assert!(pass.unshimmed().is_empty());
    }

    #[test]
    fn test_modules_are_generated_once() {
        let pass = PassContext::new();
        let make = || {
            Ok(VirtualModule::js(
                REQUIRED_BUILTIN_NAMESPACE,
                "fs",
                "x".to_string(),
            ))
        };
        let a = pass.module(REQUIRED_BUILTIN_NAMESPACE, "fs", make).unwrap();
        let b = pass
            .module(REQUIRED_BUILTIN_NAMESPACE, "fs", || {
                Err(CompatError::MissingPassContext)
            })
            .unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(pass.module_count(), 1);
    }
}
