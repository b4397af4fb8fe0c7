use crate::checking::{evaluate, Evaluation, MISSING_DATA};
use crate::crash::CrashCounters;
use crate::discovery::{
    discover_services, merge_autochecks, preserved_plugins, DiscoveryMode, DiscoveryReport,
    Transition,
};
use crate::parameters::{ParameterResolver, RulePrecedence, RulesetSource};
use crate::sections::{parse_sections, RawSections, SectionFailure};
use chrono::{DateTime, Utc};
use oxcheck_common::types::{service_description, ServiceId, ServiceResult};
use oxcheck_plugin::{CheckContext, PluginRegistry};
use oxcheck_storage::error::StorageError;
use oxcheck_storage::{AutocheckStore, HostGuard, HostLocks, ValueStoreBackend};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Another cycle of the same host is still running.
    #[error("Engine: host '{0}' is busy")]
    HostBusy(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Last published result of every service, used when a service goes stale.
#[derive(Debug, Default)]
pub struct ResultCache {
    results: Mutex<HashMap<String, BTreeMap<ServiceId, ServiceResult>>>,
}

impl ResultCache {
    fn lock_results(&self) -> MutexGuard<'_, HashMap<String, BTreeMap<ServiceId, ServiceResult>>> {
        self.results
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get(&self, host: &str, id: &ServiceId) -> Option<ServiceResult> {
        self.lock_results().get(host)?.get(id).cloned()
    }

    pub fn store(&self, host: &str, id: &ServiceId, result: ServiceResult) {
        self.lock_results()
            .entry(host.to_string())
            .or_default()
            .insert(id.clone(), result);
    }

    pub fn host_results(&self, host: &str) -> BTreeMap<ServiceId, ServiceResult> {
        self.lock_results().get(host).cloned().unwrap_or_default()
    }

    /// Forgets services of the host that are no longer monitored.
    fn retain(&self, host: &str, keep: impl Fn(&ServiceId) -> bool) {
        if let Some(results) = self.lock_results().get_mut(host) {
            results.retain(|id, _| keep(id));
        }
    }
}

/// One service of a host cycle.
#[derive(Debug, Clone)]
pub struct ServiceReport {
    pub id: ServiceId,
    pub description: String,
    pub evaluation: Evaluation,
    /// The result to publish: the fresh one, or the previous one for stale
    /// services.
    pub result: Option<ServiceResult>,
}

#[derive(Debug, Clone)]
pub struct HostCheckReport {
    pub host: String,
    pub time: DateTime<Utc>,
    pub services: Vec<ServiceReport>,
    pub section_failures: Vec<SectionFailure>,
}

impl HostCheckReport {
    pub fn service(&self, id: &ServiceId) -> Option<&ServiceReport> {
        self.services.iter().find(|s| &s.id == id)
    }

    pub fn crashed(&self) -> usize {
        self.services
            .iter()
            .filter(|s| s.evaluation.is_crash())
            .count()
    }

    pub fn stale(&self) -> usize {
        self.services
            .iter()
            .filter(|s| s.evaluation.is_stale())
            .count()
    }
}

/// Runs discovery and check cycles of hosts against shared, read-only
/// plugins and rules and the persisted per-host state.
pub struct Engine {
    registry: Arc<PluginRegistry>,
    rules: Arc<dyn RulesetSource>,
    precedence: RulePrecedence,
    autochecks: Arc<dyn AutocheckStore>,
    value_stores: Arc<dyn ValueStoreBackend>,
    locks: HostLocks,
    results: ResultCache,
    crashes: CrashCounters,
}

impl Engine {
    pub fn new(
        registry: Arc<PluginRegistry>,
        rules: Arc<dyn RulesetSource>,
        autochecks: Arc<dyn AutocheckStore>,
        value_stores: Arc<dyn ValueStoreBackend>,
    ) -> Self {
        Self {
            registry,
            rules,
            precedence: RulePrecedence::default(),
            autochecks,
            value_stores,
            locks: HostLocks::default(),
            results: ResultCache::default(),
            crashes: CrashCounters::default(),
        }
    }

    pub fn with_precedence(mut self, precedence: RulePrecedence) -> Self {
        self.precedence = precedence;
        self
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    pub fn results(&self) -> &ResultCache {
        &self.results
    }

    pub fn crashes(&self) -> &CrashCounters {
        &self.crashes
    }

    pub fn autochecks(&self) -> &dyn AutocheckStore {
        self.autochecks.as_ref()
    }

    /// Per-host cycle locks; a host held here is reported as busy.
    pub fn locks(&self) -> &HostLocks {
        &self.locks
    }

    fn claim(&self, host: &str) -> Result<HostGuard, EngineError> {
        self.locks
            .try_lock(host)
            .ok_or_else(|| EngineError::HostBusy(host.to_string()))
    }

    /// Discovers the services of a host and persists the merged autochecks.
    ///
    /// The autocheck file is only rewritten when the merge changed it.
    pub fn discover_host(
        &self,
        host: &str,
        raw: &RawSections,
        mode: DiscoveryMode,
    ) -> Result<DiscoveryReport, EngineError> {
        let _guard = self.claim(host)?;
        let parsed = parse_sections(&self.registry, host, raw);
        let existing = self.autochecks.read(host)?;

        let (candidates, failures) = discover_services(&self.registry, host, &parsed.sections);
        let preserved = preserved_plugins(&self.registry, &existing, &failures);
        let (entries, transitions) = merge_autochecks(existing.clone(), candidates, mode, |plugin| {
            preserved.contains(plugin)
        });

        let changed = entries != existing;
        if changed {
            self.autochecks.write(host, &entries)?;
        }

        let report = DiscoveryReport {
            host: host.to_string(),
            mode,
            entries,
            transitions,
            failures,
            section_failures: parsed.failures,
            changed,
        };
        tracing::info!(
            host,
            mode = %mode,
            services = report.entries.len(),
            new = report.count(Transition::New),
            removed = report.count(Transition::Removed),
            vanished = report.count(Transition::Vanished),
            failures = report.failures.len(),
            "Discovery finished"
        );
        Ok(report)
    }

    /// Evaluates every autocheck of a host for the cycle at `now`.
    ///
    /// Plugin failures never fail the cycle; only persistence errors do, and
    /// then nothing of this cycle is written.
    pub fn check_host(
        &self,
        host: &str,
        raw: &RawSections,
        now: DateTime<Utc>,
    ) -> Result<HostCheckReport, EngineError> {
        let _guard = self.claim(host)?;
        let parsed = parse_sections(&self.registry, host, raw);
        let entries = self.autochecks.read(host)?;
        let mut host_store = self.value_stores.load(host)?;
        let resolver =
            ParameterResolver::new(&self.registry, self.rules.as_ref()).with_precedence(self.precedence);

        let mut services = Vec::with_capacity(entries.len());
        for entry in &entries {
            let id = entry.id();
            let item = entry.item.as_deref();

            let Some(descriptor) = self.registry.get(&entry.check_plugin_name) else {
                let result = ServiceResult::unknown(format!(
                    "Check plugin '{}' is not available",
                    entry.check_plugin_name
                ));
                let description = id.to_string();
                services.push(self.report(host, id, description, Evaluation::Completed(result)));
                continue;
            };
            let description = service_description(descriptor.service_name(), item);

            let evaluation = if !descriptor
                .sections()
                .iter()
                .any(|s| parsed.contains(s))
            {
                Evaluation::Stale {
                    reason: MISSING_DATA.to_string(),
                }
            } else {
                match resolver.resolve(host, descriptor, item, &entry.parameters) {
                    Ok(params) => {
                        let sections = parsed.sections.subset(descriptor.sections());
                        let mut ctx = CheckContext::new(host, now, host_store.service_mut(&id));
                        evaluate(descriptor, &mut ctx, item, &params, &sections)
                    }
                    Err(e) => {
                        tracing::warn!(host, service = %id, error = %e, "Parameter resolution failed");
                        Evaluation::Completed(ServiceResult::unknown(e.to_string()))
                    }
                }
            };

            if evaluation.is_crash() {
                self.crashes.record(descriptor.name());
            }
            services.push(self.report(host, id, description, evaluation));
        }

        host_store.retain(|id| entries.iter().any(|e| &e.id() == id));
        self.value_stores.save(host, &host_store)?;

        self.results
            .retain(host, |id| entries.iter().any(|e| &e.id() == id));
        for service in &services {
            if let Some(result) = service.evaluation.result() {
                self.results.store(host, &service.id, result.clone());
            }
        }

        let report = HostCheckReport {
            host: host.to_string(),
            time: now,
            services,
            section_failures: parsed.failures,
        };
        tracing::info!(
            host,
            services = report.services.len(),
            crashed = report.crashed(),
            stale = report.stale(),
            "Check cycle finished"
        );
        Ok(report)
    }

    fn report(
        &self,
        host: &str,
        id: ServiceId,
        description: String,
        evaluation: Evaluation,
    ) -> ServiceReport {
        let result = match evaluation.result() {
            Some(result) => Some(result.clone()),
            None => self.results.get(host, &id),
        };
        ServiceReport {
            id,
            description,
            evaluation,
            result,
        }
    }
}
