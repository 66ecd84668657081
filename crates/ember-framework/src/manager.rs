//! Default extension manager.
//!
//! [`DefaultExtensionManager`] discovers extensions, orders them and drives
//! their activation:
//!
//! - Core extensions come from a compiled-in catalog of
//!   [`ExtensionDescriptor`]s, filtered by `core_extensions`.
//! - Every repo path and extra extension directory is scanned for `.plug`
//!   manifests with `capability = "extension"`. A manifest's `module` names
//!   a catalog entry.
//! - Declared dependencies missing from the discovered set are pulled from
//!   the catalog when `autoinstall_deps` is on, and are load errors
//!   otherwise.
//! - Activation runs in dependency **layers**; all extensions of one layer
//!   activate concurrently.
//!
//! Failures never abort the pass: they are collected in the returned
//! [`ExtensionLoadReport`].

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use ember_core::{
    Extension, ExtensionConstructor, ExtensionDescriptor, ExtensionLoadReport, ExtensionManager,
    ExtensionManagerSettings, Storage, StorageResult,
};
use futures::future;
use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::plugin::builtin::CORE_EXTENSIONS;
use crate::plugin::{Capability, load_manifests};

/// Namespace holding every extension's configuration section.
pub const EXTENSION_CONFIG_NAMESPACE: &str = "extensions";

/// Namespace of an extension's private store.
pub fn extension_namespace(name: &str) -> String {
    format!("ext.{name}")
}

// =============================================================================
// Topological sort utility
// =============================================================================

/// Computes activation **layers** via Kahn's algorithm.
///
/// `deps[i]` lists the indices `i` depends on. Each returned layer contains
/// indices that may activate in parallel, sorted ascending so the caller's
/// ordering is kept within a layer. The second value lists indices caught in
/// a dependency cycle.
fn topological_layers(deps: &[Vec<usize>]) -> (Vec<Vec<usize>>, Vec<usize>) {
    let n = deps.len();
    let mut in_degree: Vec<usize> = vec![0; n];
    let mut dependents: Vec<Vec<usize>> = vec![vec![]; n];

    for (i, list) in deps.iter().enumerate() {
        for &dep in list {
            dependents[dep].push(i);
            in_degree[i] += 1;
        }
    }

    let mut layers: Vec<Vec<usize>> = Vec::new();
    let mut current: Vec<usize> = (0..n).filter(|&i| in_degree[i] == 0).collect();

    while !current.is_empty() {
        let mut next: Vec<usize> = Vec::new();
        for &i in &current {
            for &j in &dependents[i] {
                in_degree[j] -= 1;
                if in_degree[j] == 0 {
                    next.push(j);
                }
            }
        }
        next.sort_unstable();
        layers.push(current);
        current = next;
    }

    let cyclic = (0..n).filter(|&i| in_degree[i] > 0).collect();
    (layers, cyclic)
}

// =============================================================================
// Candidates
// =============================================================================

/// An extension found during discovery, not yet constructed.
#[derive(Debug, Clone)]
struct Candidate {
    name: String,
    depends_on: Vec<String>,
    create: ExtensionConstructor,
    origin: String,
}

impl Candidate {
    fn from_descriptor(descriptor: &ExtensionDescriptor) -> Self {
        Self {
            name: descriptor.name.to_string(),
            depends_on: descriptor.depends_on.iter().map(|d| d.to_string()).collect(),
            create: descriptor.create,
            origin: "core".to_string(),
        }
    }
}

struct LoadedExtension {
    name: String,
    instance: Arc<dyn Extension>,
}

// =============================================================================
// DefaultExtensionManager
// =============================================================================

pub struct DefaultExtensionManager {
    settings: ExtensionManagerSettings,
    catalog: Vec<ExtensionDescriptor>,
    configs: Arc<dyn Storage>,
    active: RwLock<Vec<LoadedExtension>>,
}

impl DefaultExtensionManager {
    /// Creates a manager whose catalog is the built-in core extensions.
    pub fn new(settings: ExtensionManagerSettings) -> StorageResult<Self> {
        Self::with_catalog(settings, &CORE_EXTENSIONS)
    }

    pub fn with_catalog(
        settings: ExtensionManagerSettings,
        catalog: &[ExtensionDescriptor],
    ) -> StorageResult<Self> {
        let configs = settings.storage.open(EXTENSION_CONFIG_NAMESPACE)?;
        Ok(Self {
            settings,
            catalog: catalog.to_vec(),
            configs,
            active: RwLock::new(Vec::new()),
        })
    }

    fn catalog_entry(&self, module: &str) -> Option<&ExtensionDescriptor> {
        self.catalog
            .iter()
            .find(|d| d.name.eq_ignore_ascii_case(module))
    }

    fn is_active(&self, name: &str) -> bool {
        self.active.read().iter().any(|e| e.name == name)
    }

    /// The stored configuration section of `extension`.
    pub fn extension_config(&self, extension: &str) -> StorageResult<Option<Value>> {
        self.configs.get(extension)
    }

    // ─── Discovery ───────────────────────────────────────────────────────────

    fn discover(&self, paths: &[PathBuf], report: &mut ExtensionLoadReport) -> Vec<Candidate> {
        let mut found: Vec<Candidate> = Vec::new();

        let wanted_core = |name: &str| match &self.settings.core_extensions {
            None => true,
            Some(list) => list.iter().any(|n| n == name),
        };
        for descriptor in self.catalog.iter().filter(|d| wanted_core(d.name)) {
            found.push(Candidate::from_descriptor(descriptor));
        }

        let dirs = paths.iter().chain(self.settings.extra_dirs.iter());
        for dir in dirs {
            self.scan_dir(dir, &mut found, report);
        }

        found.retain(|c| !self.is_active(&c.name));
        found
    }

    fn scan_dir(&self, dir: &Path, found: &mut Vec<Candidate>, report: &mut ExtensionLoadReport) {
        let manifests = match load_manifests(dir) {
            Ok(manifests) => manifests,
            Err(e) => {
                warn!(
                    path = %dir.display(),
                    error = %e,
                    "Extension directory could not be scanned"
                );
                report.record_error(dir.display().to_string(), e.to_string());
                return;
            }
        };

        for (path, manifest) in manifests {
            if manifest.core.capability != Capability::Extension {
                continue;
            }
            let name = manifest.core.name;
            let origin = path.display().to_string();
            let existing = found.iter().find(|c| c.name == name);
            // Clashes are keyed by origin; the first definition keeps the name.
            let error_key = match existing {
                Some(_) => format!("{name} ({origin})"),
                None => name.clone(),
            };

            let Some(descriptor) = self.catalog_entry(&manifest.core.module) else {
                report.record_error(
                    &error_key,
                    format!(
                        "extension '{name}' ({origin}) uses unknown module '{}'",
                        manifest.core.module
                    ),
                );
                continue;
            };

            if let Some(existing) = existing {
                report.record_error(
                    &error_key,
                    format!(
                        "extension '{name}' is defined by both {} and {origin}",
                        existing.origin
                    ),
                );
                continue;
            }

            let mut depends_on: Vec<String> =
                descriptor.depends_on.iter().map(|d| d.to_string()).collect();
            for dep in manifest.core.depends_on {
                if !depends_on.contains(&dep) {
                    depends_on.push(dep);
                }
            }

            debug!(extension = %name, origin = %origin, "Extension discovered");
            found.push(Candidate {
                name,
                depends_on,
                create: descriptor.create,
                origin,
            });
        }
    }

    /// Satisfies or rejects missing dependencies until the set is closed.
    fn close_dependencies(
        &self,
        mut candidates: Vec<Candidate>,
        report: &mut ExtensionLoadReport,
    ) -> Vec<Candidate> {
        loop {
            let known: HashSet<String> = candidates
                .iter()
                .map(|c| c.name.clone())
                .chain(self.active.read().iter().map(|e| e.name.clone()))
                .collect();

            let mut rejected: Vec<usize> = Vec::new();
            let mut installed: Vec<Candidate> = Vec::new();

            for (i, candidate) in candidates.iter().enumerate() {
                for dep in &candidate.depends_on {
                    if known.contains(dep) || installed.iter().any(|c| &c.name == dep) {
                        continue;
                    }
                    match self.catalog_entry(dep) {
                        Some(descriptor) if self.settings.autoinstall_deps => {
                            info!(
                                extension = %candidate.name,
                                dependency = %descriptor.name,
                                "Installing missing dependency from core catalog"
                            );
                            installed.push(Candidate::from_descriptor(descriptor));
                        }
                        _ => {
                            report.record_error(
                                &candidate.name,
                                format!(
                                    "extension '{}' depends on '{dep}', which is not available",
                                    candidate.name
                                ),
                            );
                            rejected.push(i);
                            break;
                        }
                    }
                }
            }

            if rejected.is_empty() && installed.is_empty() {
                return candidates;
            }
            for i in rejected.into_iter().rev() {
                candidates.remove(i);
            }
            candidates.extend(installed);
        }
    }

    // ─── Activation ──────────────────────────────────────────────────────────

    async fn activate_all(&self, candidates: Vec<Candidate>, report: &mut ExtensionLoadReport) {
        // Callback order decides the base ordering; dependencies refine it.
        let names: Vec<&str> = candidates.iter().map(|c| c.name.as_str()).collect();
        let arranged = self.settings.callback_order.arrange(&names);
        let mut by_name: HashMap<String, Candidate> =
            candidates.into_iter().map(|c| (c.name.clone(), c)).collect();
        let ordered: Vec<Candidate> = arranged
            .iter()
            .filter_map(|name| by_name.remove(name))
            .collect();

        let index: HashMap<&str, usize> = ordered
            .iter()
            .enumerate()
            .map(|(i, c)| (c.name.as_str(), i))
            .collect();
        let deps: Vec<Vec<usize>> = ordered
            .iter()
            .map(|c| {
                c.depends_on
                    .iter()
                    .filter_map(|d| index.get(d.as_str()).copied())
                    .collect()
            })
            .collect();

        let (layers, cyclic) = topological_layers(&deps);
        if !cyclic.is_empty() {
            let names: Vec<&str> = cyclic.iter().map(|&i| ordered[i].name.as_str()).collect();
            error!("Extension dependency cycle detected among: {}", names.join(", "));
            for &i in &cyclic {
                report.record_error(
                    &ordered[i].name,
                    format!(
                        "extension '{}' is part of a dependency cycle ({})",
                        ordered[i].name,
                        names.join(", ")
                    ),
                );
            }
        }

        // Only names that will not be activated count as failed dependencies.
        let scheduled: HashSet<&str> = layers
            .iter()
            .flatten()
            .map(|&i| ordered[i].name.as_str())
            .collect();
        let mut failed: HashSet<String> = report
            .errors
            .keys()
            .filter(|name| !scheduled.contains(name.as_str()))
            .cloned()
            .collect();

        for layer in layers {
            // ── 1. Construct, skipping anything whose dependency failed ──────
            let mut to_activate: Vec<(String, Arc<dyn Extension>)> = Vec::new();
            for i in layer {
                let candidate = &ordered[i];
                if let Some(dep) = candidate.depends_on.iter().find(|d| failed.contains(*d)) {
                    report.record_error(
                        &candidate.name,
                        format!(
                            "extension '{}' not loaded: dependency '{dep}' failed",
                            candidate.name
                        ),
                    );
                    failed.insert(candidate.name.clone());
                    continue;
                }

                match (self.settings.factory)(candidate.name.as_str(), candidate.create) {
                    Ok(instance) => {
                        to_activate.push((candidate.name.clone(), Arc::from(instance)))
                    }
                    Err(e) => {
                        error!(
                            extension = %candidate.name,
                            error = %e,
                            "Extension construction failed"
                        );
                        report.record_error(
                            &candidate.name,
                            format!("failed to construct extension '{}': {e}", candidate.name),
                        );
                        failed.insert(candidate.name.clone());
                    }
                }
            }

            if to_activate.is_empty() {
                continue;
            }

            // ── 2. Activate the whole layer in parallel ──────────────────────
            let results = future::join_all(to_activate.iter().map(|(_, ext)| {
                let ext = Arc::clone(ext);
                async move { ext.activate().await }
            }))
            .await;

            // ── 3. Record outcomes ───────────────────────────────────────────
            let mut active = self.active.write();
            for ((name, instance), result) in to_activate.into_iter().zip(results) {
                match result {
                    Ok(()) => {
                        info!(extension = %name, "Extension activated");
                        report.record_loaded(&name);
                        active.push(LoadedExtension { name, instance });
                    }
                    Err(e) => {
                        error!(extension = %name, error = %e, "Extension activation failed");
                        report.record_error(
                            &name,
                            format!("failed to activate extension '{name}': {e}"),
                        );
                        failed.insert(name);
                    }
                }
            }
        }
    }
}

#[async_trait]
impl ExtensionManager for DefaultExtensionManager {
    async fn update_extension_places(&self, paths: &[PathBuf]) -> ExtensionLoadReport {
        let mut report = ExtensionLoadReport::default();
        let candidates = self.discover(paths, &mut report);
        let candidates = self.close_dependencies(candidates, &mut report);
        debug!(count = candidates.len(), "Activating extensions");
        self.activate_all(candidates, &mut report).await;
        report
    }

    fn loaded_extensions(&self) -> Vec<String> {
        self.active.read().iter().map(|e| e.name.clone()).collect()
    }

    fn set_extension_config(&self, extension: &str, config: Value) -> StorageResult<()> {
        self.configs.set(extension, config)?;
        debug!(extension = %extension, "Extension configuration stored");
        Ok(())
    }

    fn set_extension_value(&self, extension: &str, key: &str, value: Value) -> StorageResult<()> {
        self.settings
            .storage
            .open(&extension_namespace(extension))?
            .set(key, value)
    }

    async fn deactivate_all(&self) {
        let active: Vec<LoadedExtension> = self.active.write().drain(..).rev().collect();
        for extension in active {
            match extension.instance.deactivate().await {
                Ok(()) => info!(extension = %extension.name, "Extension deactivated"),
                Err(e) => {
                    warn!(extension = %extension.name, error = %e, "Extension deactivation failed")
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::sync::Weak;

    use ember_core::{BoxError, CallbackOrder, ExtensionContext, ExtensionFactory, StoragePlugin};

    use super::*;
    use crate::plugin::builtin::MemoryStorage;

    struct Plain(String);

    #[async_trait]
    impl Extension for Plain {
        fn name(&self) -> &str {
            &self.0
        }
    }

    struct Sulky(String);

    #[async_trait]
    impl Extension for Sulky {
        fn name(&self) -> &str {
            &self.0
        }

        async fn activate(&self) -> Result<(), BoxError> {
            Err("refuses to start".into())
        }
    }

    fn plain(ctx: ExtensionContext) -> Result<Box<dyn Extension>, BoxError> {
        Ok(Box::new(Plain(ctx.name().to_string())))
    }

    fn sulky(ctx: ExtensionContext) -> Result<Box<dyn Extension>, BoxError> {
        Ok(Box::new(Sulky(ctx.name().to_string())))
    }

    fn broken(_: ExtensionContext) -> Result<Box<dyn Extension>, BoxError> {
        Err("missing api key".into())
    }

    const CATALOG: [ExtensionDescriptor; 5] = [
        ExtensionDescriptor {
            name: "Base",
            description: "",
            depends_on: &[],
            create: plain,
        },
        ExtensionDescriptor {
            name: "Echo",
            description: "",
            depends_on: &[],
            create: plain,
        },
        ExtensionDescriptor {
            name: "Broken",
            description: "",
            depends_on: &[],
            create: broken,
        },
        ExtensionDescriptor {
            name: "Sulky",
            description: "",
            depends_on: &[],
            create: sulky,
        },
        ExtensionDescriptor {
            name: "Stacked",
            description: "",
            depends_on: &["Base"],
            create: plain,
        },
    ];

    fn detached_factory() -> ExtensionFactory {
        Arc::new(|name: &str, create: ExtensionConstructor| {
            create(ExtensionContext::new(name, Weak::new()))
        })
    }

    fn settings(storage: Arc<dyn StoragePlugin>, autoinstall: bool) -> ExtensionManagerSettings {
        ExtensionManagerSettings {
            storage,
            extra_dirs: vec![],
            autoinstall_deps: autoinstall,
            core_extensions: Some(vec![]),
            factory: detached_factory(),
            callback_order: CallbackOrder::Unordered,
        }
    }

    fn manager(autoinstall: bool) -> DefaultExtensionManager {
        DefaultExtensionManager::with_catalog(
            settings(Arc::new(MemoryStorage::new()), autoinstall),
            &CATALOG,
        )
        .unwrap()
    }

    fn write_ext(dir: &Path, name: &str, module: &str, depends_on: &[&str]) {
        fs::create_dir_all(dir).unwrap();
        let deps = depends_on
            .iter()
            .map(|d| format!("\"{d}\""))
            .collect::<Vec<_>>()
            .join(", ");
        fs::write(
            dir.join(format!("{name}.plug")),
            format!(
                "[core]\nname = \"{name}\"\nmodule = \"{module}\"\ncapability = \"extension\"\n\
                 depends_on = [{deps}]\n"
            ),
        )
        .unwrap();
    }

    #[test]
    fn test_topological_layers_orders_dependencies() {
        // 0 <- 1 <- 2, 3 independent
        let (layers, cyclic) = topological_layers(&[vec![], vec![0], vec![1], vec![]]);
        assert_eq!(layers, vec![vec![0, 3], vec![1], vec![2]]);
        assert!(cyclic.is_empty());
    }

    #[test]
    fn test_topological_layers_reports_cycles() {
        let (layers, cyclic) = topological_layers(&[vec![1], vec![0], vec![]]);
        assert_eq!(layers, vec![vec![2]]);
        assert_eq!(cyclic, vec![0, 1]);
    }

    #[tokio::test]
    async fn test_failures_are_reported_not_raised() {
        let root = tempfile::tempdir().unwrap();
        let (a, b, c) = (
            root.path().join("a"),
            root.path().join("b"),
            root.path().join("c"),
        );
        write_ext(&a, "Echo", "echo", &[]);
        write_ext(&b, "Broken", "broken", &[]);
        write_ext(&c, "Sulky", "sulky", &[]);

        let manager = manager(false);
        let report = manager.update_extension_places(&[a, b, c]).await;

        assert_eq!(report.loaded, vec!["Echo"]);
        assert_eq!(report.errors.len(), 2);
        assert!(report.errors["Broken"].contains("missing api key"));
        assert!(report.errors["Sulky"].contains("refuses to start"));
        assert_eq!(manager.loaded_extensions(), vec!["Echo"]);
    }

    #[tokio::test]
    async fn test_dependencies_activate_first() {
        let root = tempfile::tempdir().unwrap();
        write_ext(root.path(), "Top", "echo", &["Base"]);
        write_ext(root.path(), "Base", "base", &[]);

        let manager = manager(false);
        let report = manager
            .update_extension_places(&[root.path().to_path_buf()])
            .await;

        assert!(report.is_clean());
        assert_eq!(manager.loaded_extensions(), vec!["Base", "Top"]);
    }

    #[tokio::test]
    async fn test_missing_dependency_without_autoinstall() {
        let root = tempfile::tempdir().unwrap();
        write_ext(root.path(), "Stacked", "stacked", &[]);

        let manager = manager(false);
        let report = manager
            .update_extension_places(&[root.path().to_path_buf()])
            .await;

        assert!(report.loaded.is_empty());
        assert!(report.errors["Stacked"].contains("depends on 'Base'"));
    }

    #[tokio::test]
    async fn test_missing_dependency_with_autoinstall() {
        let root = tempfile::tempdir().unwrap();
        write_ext(root.path(), "Stacked", "stacked", &[]);

        let manager = manager(true);
        let report = manager
            .update_extension_places(&[root.path().to_path_buf()])
            .await;

        assert!(report.is_clean());
        assert_eq!(manager.loaded_extensions(), vec!["Base", "Stacked"]);
    }

    #[tokio::test]
    async fn test_failed_dependency_blocks_dependents() {
        let root = tempfile::tempdir().unwrap();
        write_ext(root.path(), "Broken", "broken", &[]);
        write_ext(root.path(), "Needy", "echo", &["Broken"]);

        let manager = manager(false);
        let report = manager
            .update_extension_places(&[root.path().to_path_buf()])
            .await;

        assert!(report.errors["Needy"].contains("dependency 'Broken' failed"));
        assert!(manager.loaded_extensions().is_empty());
    }

    #[tokio::test]
    async fn test_callback_order_and_core_filter() {
        let mut settings = settings(Arc::new(MemoryStorage::new()), false);
        settings.core_extensions = Some(vec!["Echo".into(), "Base".into()]);
        settings.callback_order = CallbackOrder::from_slots(["Echo", "*"]).unwrap();
        let manager = DefaultExtensionManager::with_catalog(settings, &CATALOG).unwrap();

        let report = manager.update_extension_places(&[]).await;

        assert!(report.is_clean());
        assert_eq!(manager.loaded_extensions(), vec!["Echo", "Base"]);
    }

    #[tokio::test]
    async fn test_reloading_skips_active_extensions() {
        let root = tempfile::tempdir().unwrap();
        write_ext(root.path(), "Echo", "echo", &[]);
        let paths = [root.path().to_path_buf()];

        let manager = manager(false);
        manager.update_extension_places(&paths).await;
        let second = manager.update_extension_places(&paths).await;

        assert!(second.loaded.is_empty());
        assert!(second.is_clean());
        assert_eq!(manager.loaded_extensions(), vec!["Echo"]);
    }

    #[tokio::test]
    async fn test_deactivate_all_clears_active_set() {
        let mut settings = settings(Arc::new(MemoryStorage::new()), false);
        settings.core_extensions = Some(vec!["Echo".into()]);
        let manager = DefaultExtensionManager::with_catalog(settings, &CATALOG).unwrap();

        manager.update_extension_places(&[]).await;
        assert_eq!(manager.loaded_extensions(), vec!["Echo"]);

        manager.deactivate_all().await;
        assert!(manager.loaded_extensions().is_empty());
    }

    #[tokio::test]
    async fn test_shadowing_manifest_keeps_core_extension_usable() {
        let root = tempfile::tempdir().unwrap();
        write_ext(root.path(), "Base", "echo", &[]);
        let mut settings = settings(Arc::new(MemoryStorage::new()), false);
        settings.core_extensions = Some(vec!["Base".into(), "Stacked".into()]);
        let manager = DefaultExtensionManager::with_catalog(settings, &CATALOG).unwrap();

        let report = manager
            .update_extension_places(&[root.path().to_path_buf()])
            .await;

        assert_eq!(report.loaded, vec!["Base", "Stacked"]);
        assert!(!report.errors.contains_key("Base"));
        assert!(!report.errors.contains_key("Stacked"));
        assert_eq!(report.errors.len(), 1);
        let (key, message) = report.errors.iter().next().unwrap();
        assert!(key.starts_with("Base ("));
        assert!(message.contains("defined by both core and"));
        assert_eq!(manager.loaded_extensions(), vec!["Base", "Stacked"]);
    }

    #[test]
    fn test_config_and_values_land_in_storage() {
        let storage: Arc<dyn StoragePlugin> = Arc::new(MemoryStorage::new());
        let manager =
            DefaultExtensionManager::with_catalog(settings(Arc::clone(&storage), false), &CATALOG)
                .unwrap();

        manager
            .set_extension_config("Echo", serde_json::json!({ "loud": true }))
            .unwrap();
        manager
            .set_extension_value("Echo", "count", Value::from(3))
            .unwrap();

        assert_eq!(
            manager.extension_config("Echo").unwrap(),
            Some(serde_json::json!({ "loud": true }))
        );
        assert_eq!(
            storage.open("ext.Echo").unwrap().get("count").unwrap(),
            Some(Value::from(3))
        );
    }
}
