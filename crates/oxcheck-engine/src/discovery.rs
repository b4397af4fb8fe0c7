//! Service discovery and the merge of discovered services into the
//! persisted autochecks of a host.

use crate::crash::panic_message;
use crate::sections::SectionFailure;
use oxcheck_common::params::LegacyParameters;
use oxcheck_common::types::{AutocheckEntry, ServiceId};
use oxcheck_plugin::{PluginRegistry, SectionSet, Service};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::panic::{catch_unwind, AssertUnwindSafe};

/// What a discovery run may change in the persisted autochecks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryMode {
    /// Add new services; vanished ones stay and are reported stale.
    #[default]
    New,
    /// Remove vanished services; add nothing.
    Remove,
    /// Add new and remove vanished services.
    FixAll,
}

impl std::fmt::Display for DiscoveryMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiscoveryMode::New => write!(f, "new"),
            DiscoveryMode::Remove => write!(f, "remove"),
            DiscoveryMode::FixAll => write!(f, "fix_all"),
        }
    }
}

impl std::str::FromStr for DiscoveryMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "new" => Ok(DiscoveryMode::New),
            "remove" => Ok(DiscoveryMode::Remove),
            "fix_all" | "fixall" | "refresh" => Ok(DiscoveryMode::FixAll),
            _ => Err(format!("unknown discovery mode: {s}")),
        }
    }
}

impl DiscoveryMode {
    fn adds_new(self) -> bool {
        matches!(self, DiscoveryMode::New | DiscoveryMode::FixAll)
    }

    fn removes_vanished(self) -> bool {
        matches!(self, DiscoveryMode::Remove | DiscoveryMode::FixAll)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    New,
    Kept,
    /// Kept with refreshed service labels.
    Changed,
    /// No longer discovered but retained.
    Vanished,
    Removed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServiceTransition {
    pub id: ServiceId,
    pub transition: Transition,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveryFailure {
    pub plugin: String,
    pub error: String,
}

/// Services found in the current sections, keyed by identity.
pub type Candidates = BTreeMap<ServiceId, Service>;

/// Runs the discovery function of every plugin that has at least one of its
/// sections present.
///
/// A failing or panicking discovery function is recorded and skipped.
/// Candidates with an equal identity overwrite earlier ones.
pub fn discover_services(
    registry: &PluginRegistry,
    host: &str,
    sections: &SectionSet,
) -> (Candidates, Vec<DiscoveryFailure>) {
    let mut candidates = Candidates::new();
    let mut failures = Vec::new();

    for descriptor in registry.all() {
        if !descriptor.sections().iter().any(|s| sections.contains(s)) {
            continue;
        }
        let plugin = descriptor.name();
        let subset = sections.subset(descriptor.sections());
        let outcome = catch_unwind(AssertUnwindSafe(|| descriptor.plugin().discover(&subset)));
        let services = match outcome {
            Ok(Ok(services)) => services,
            Ok(Err(e)) => {
                let error = format!("{e:#}");
                tracing::warn!(host, plugin, error = %error, "Discovery failed");
                failures.push(DiscoveryFailure {
                    plugin: plugin.to_string(),
                    error,
                });
                continue;
            }
            Err(panic) => {
                let error = panic_message(panic.as_ref());
                tracing::error!(host, plugin, error = %error, "Discovery panicked");
                failures.push(DiscoveryFailure {
                    plugin: plugin.to_string(),
                    error,
                });
                continue;
            }
        };

        for service in services {
            if service.item.is_some() != descriptor.has_item() {
                let error = match &service.item {
                    Some(item) => format!("item '{item}' for a service without item"),
                    None => "missing item".to_string(),
                };
                tracing::warn!(host, plugin, error = %error, "Invalid discovered service");
                failures.push(DiscoveryFailure {
                    plugin: plugin.to_string(),
                    error,
                });
                continue;
            }
            let id = ServiceId::new(plugin, service.item.as_deref());
            if candidates.insert(id.clone(), service).is_some() {
                tracing::debug!(host, service = %id, "Duplicate discovered service, keeping the later one");
            }
        }
    }

    (candidates, failures)
}

/// Merges discovered candidates into the existing autochecks.
///
/// Existing entries keep their parameters; their labels are replaced by the
/// discovered ones. Entries for which `preserve(plugin)` holds are kept
/// untouched (plugins that are not registered or whose discovery failed).
/// The result is sorted by identity.
pub fn merge_autochecks(
    existing: Vec<AutocheckEntry>,
    candidates: Candidates,
    mode: DiscoveryMode,
    preserve: impl Fn(&str) -> bool,
) -> (Vec<AutocheckEntry>, Vec<ServiceTransition>) {
    let mut merged: BTreeMap<ServiceId, AutocheckEntry> = BTreeMap::new();
    let mut transitions = Vec::new();
    let mut candidates = candidates;

    let existing: BTreeMap<ServiceId, AutocheckEntry> =
        existing.into_iter().map(|e| (e.id(), e)).collect();

    for (id, mut entry) in existing {
        if let Some(service) = candidates.remove(&id) {
            let transition = if entry.service_labels == service.labels {
                Transition::Kept
            } else {
                entry.service_labels = service.labels;
                Transition::Changed
            };
            transitions.push(ServiceTransition {
                id: id.clone(),
                transition,
            });
            merged.insert(id, entry);
        } else if preserve(&entry.check_plugin_name) {
            merged.insert(id, entry);
        } else if mode.removes_vanished() {
            transitions.push(ServiceTransition {
                id,
                transition: Transition::Removed,
            });
        } else {
            transitions.push(ServiceTransition {
                id: id.clone(),
                transition: Transition::Vanished,
            });
            merged.insert(id, entry);
        }
    }

    if mode.adds_new() {
        for (id, service) in candidates {
            transitions.push(ServiceTransition {
                id: id.clone(),
                transition: Transition::New,
            });
            merged.insert(
                id.clone(),
                AutocheckEntry {
                    check_plugin_name: id.plugin,
                    item: id.item,
                    parameters: LegacyParameters::Structured(service.parameters),
                    service_labels: service.labels,
                },
            );
        }
    }

    transitions.sort_by(|a, b| a.id.cmp(&b.id));
    (merged.into_values().collect(), transitions)
}

/// Outcome of one discovery run on one host.
#[derive(Debug, Clone)]
pub struct DiscoveryReport {
    pub host: String,
    pub mode: DiscoveryMode,
    /// The autochecks after the merge.
    pub entries: Vec<AutocheckEntry>,
    pub transitions: Vec<ServiceTransition>,
    pub failures: Vec<DiscoveryFailure>,
    pub section_failures: Vec<SectionFailure>,
    /// Whether the persisted autochecks were rewritten.
    pub changed: bool,
}

impl DiscoveryReport {
    pub fn count(&self, transition: Transition) -> usize {
        self.transitions
            .iter()
            .filter(|t| t.transition == transition)
            .count()
    }

    pub fn services_with(&self, transition: Transition) -> Vec<&ServiceId> {
        self.transitions
            .iter()
            .filter(|t| t.transition == transition)
            .map(|t| &t.id)
            .collect()
    }
}

/// Plugins whose existing entries must not be touched by this run.
pub(crate) fn preserved_plugins(
    registry: &PluginRegistry,
    existing: &[AutocheckEntry],
    failures: &[DiscoveryFailure],
) -> BTreeSet<String> {
    let failed: BTreeSet<&str> = failures.iter().map(|f| f.plugin.as_str()).collect();
    existing
        .iter()
        .map(|e| e.check_plugin_name.as_str())
        .filter(|name| !registry.has_plugin(name) || failed.contains(name))
        .map(str::to_string)
        .collect()
}
