//! Name-based plugin resolution across search roots.
//!
//! Search roots are the compiled-in [`ModuleTable`] and any number of extra
//! directories holding `.plug` manifests. [`SearchOrder`] decides which side
//! is searched first; the first root that knows the name wins.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use ember_core::BotConfig;
use ember_core::config::SearchOrder;
use tracing::debug;

use super::manifest::{PluginManifest, load_manifests};
use super::{Capability, ModuleTable, PluginCapability, PluginDescriptor};
use crate::error::{PluginError, PluginResult};

/// Where a resolved plugin was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PluginSource {
    Builtin,
    Manifest(PathBuf),
}

impl fmt::Display for PluginSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Builtin => write!(f, "builtin"),
            Self::Manifest(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Identity of a resolved plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginInfo {
    pub name: String,
    pub module: String,
    pub capability: Capability,
    pub description: String,
    pub source: PluginSource,
}

/// A freshly constructed plugin together with its identity.
pub struct Resolved<T> {
    pub instance: T,
    pub info: PluginInfo,
}

enum SearchRoot<'a> {
    Core,
    Dir(&'a Path),
}

impl fmt::Display for SearchRoot<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Core => write!(f, "builtin plugins"),
            Self::Dir(path) => write!(f, "{}", path.display()),
        }
    }
}

enum Candidate<'a> {
    Builtin(&'a PluginDescriptor),
    Manifest(PathBuf, PluginManifest),
}

/// Resolves plugin names to constructed instances.
///
/// Resolution only reads: each call builds a new instance and leaves no
/// state behind.
pub struct PluginResolver<'a> {
    modules: &'a ModuleTable,
    extra_roots: Vec<PathBuf>,
    order: SearchOrder,
}

impl<'a> PluginResolver<'a> {
    pub fn new(modules: &'a ModuleTable, extra_roots: Vec<PathBuf>, order: SearchOrder) -> Self {
        Self {
            modules,
            extra_roots,
            order,
        }
    }

    fn roots(&self) -> Vec<SearchRoot<'_>> {
        let extras = self.extra_roots.iter().map(|p| SearchRoot::Dir(p.as_path()));
        match self.order {
            SearchOrder::ExtraFirst => extras.chain([SearchRoot::Core]).collect(),
            SearchOrder::CoreFirst => [SearchRoot::Core].into_iter().chain(extras).collect(),
        }
    }

    fn find_in_root(
        &self,
        root: &SearchRoot<'_>,
        name: &str,
    ) -> PluginResult<Option<Candidate<'a>>> {
        let mut matches: Vec<Candidate<'a>> = match root {
            SearchRoot::Core => self.modules.named(name).map(Candidate::Builtin).collect(),
            SearchRoot::Dir(dir) => load_manifests(dir)?
                .into_iter()
                .filter(|(_, manifest)| manifest.core.name == name)
                .map(|(path, manifest)| Candidate::Manifest(path, manifest))
                .collect(),
        };

        match matches.len() {
            0 => Ok(None),
            1 => Ok(matches.pop()),
            _ => Err(PluginError::Ambiguous {
                name: name.to_string(),
                root: root.to_string(),
            }),
        }
    }

    /// Resolves `name` as a plugin of capability `C` and constructs it.
    pub fn resolve<C: PluginCapability>(
        &self,
        name: &str,
        config: &BotConfig,
    ) -> PluginResult<Resolved<C::Instance>> {
        let roots = self.roots();
        for root in &roots {
            if let Some(candidate) = self.find_in_root(root, name)? {
                debug!(plugin = %name, root = %root, "Plugin located");
                return self.instantiate::<C>(name, candidate, config);
            }
        }

        Err(PluginError::NotFound {
            name: name.to_string(),
            capability: C::CAPABILITY,
            searched: roots
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", "),
        })
    }

    fn instantiate<C: PluginCapability>(
        &self,
        name: &str,
        candidate: Candidate<'a>,
        config: &BotConfig,
    ) -> PluginResult<Resolved<C::Instance>> {
        let mismatch = |found| PluginError::TypeMismatch {
            name: name.to_string(),
            expected: C::CAPABILITY,
            found,
        };

        let (descriptor, info) = match candidate {
            Candidate::Builtin(descriptor) => {
                if descriptor.capability() != C::CAPABILITY {
                    return Err(mismatch(descriptor.capability()));
                }
                (descriptor, builtin_info(descriptor))
            }
            Candidate::Manifest(path, manifest) => {
                if manifest.core.capability != C::CAPABILITY {
                    return Err(mismatch(manifest.core.capability));
                }
                let descriptor = self
                    .modules
                    .module(&manifest.core.module, C::CAPABILITY)
                    .ok_or_else(|| PluginError::UnknownModule {
                        name: name.to_string(),
                        module: manifest.core.module.clone(),
                    })?;
                let info = PluginInfo {
                    name: manifest.core.name,
                    module: manifest.core.module,
                    capability: manifest.core.capability,
                    description: manifest.documentation.description,
                    source: PluginSource::Manifest(path),
                };
                (descriptor, info)
            }
        };

        let instance = C::construct(&descriptor.factory, config)
            .ok_or_else(|| mismatch(descriptor.capability()))?
            .map_err(|source| PluginError::Construct {
                name: name.to_string(),
                source,
            })?;

        Ok(Resolved { instance, info })
    }

    /// Lists every plugin of `capability` reachable from the search roots,
    /// without constructing any. Shadowed entries are omitted.
    pub fn catalog(&self, capability: Capability) -> PluginResult<Vec<PluginInfo>> {
        let mut seen: BTreeMap<String, PluginInfo> = BTreeMap::new();
        for root in self.roots() {
            let found: Vec<PluginInfo> = match root {
                SearchRoot::Core => self
                    .modules
                    .descriptors()
                    .iter()
                    .filter(|d| d.capability() == capability)
                    .map(builtin_info)
                    .collect(),
                SearchRoot::Dir(dir) => load_manifests(dir)?
                    .into_iter()
                    .filter(|(_, m)| m.core.capability == capability)
                    .map(|(path, m)| PluginInfo {
                        name: m.core.name,
                        module: m.core.module,
                        capability: m.core.capability,
                        description: m.documentation.description,
                        source: PluginSource::Manifest(path),
                    })
                    .collect(),
            };
            for info in found {
                seen.entry(info.name.clone()).or_insert(info);
            }
        }
        Ok(seen.into_values().collect())
    }
}

fn builtin_info(descriptor: &PluginDescriptor) -> PluginInfo {
    PluginInfo {
        name: descriptor.name.to_string(),
        module: descriptor.module.to_string(),
        capability: descriptor.capability(),
        description: descriptor.description.to_string(),
        source: PluginSource::Builtin,
    }
}
