//! Plugin API and registry for check plugins.
//!
//! A check plugin bundles three steps: a [`SectionPlugin`] turns a raw string
//! table into a typed [`Section`], and a [`CheckPlugin`] discovers services
//! from parsed sections and evaluates them against parameters. Plugins are
//! collected into an immutable [`registry::PluginRegistry`] at startup and
//! looked up by name for the rest of the process lifetime.

pub mod error;
pub mod levels;
pub mod plugins;
pub mod rate;
pub mod registry;
pub mod value_store;

#[cfg(test)]
mod tests;

use chrono::{DateTime, Utc};
use oxcheck_common::params::Parameters;
use oxcheck_common::types::{CheckOutput, RawSection, Row, ServiceLabels};
use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;

pub use error::{CheckError, RegistryError};
pub use registry::{PluginDescriptor, PluginRegistry};
pub use value_store::ValueStore;

/// Parses the raw string table of one section into a plugin-defined value.
///
/// Parse functions must be pure. Returning `Ok(None)` means the host does
/// not have this section; discovery and checking then skip it.
pub trait SectionPlugin: Send + Sync {
    /// Section name as it appears in agent output (e.g., `"tsm_drives"`).
    fn name(&self) -> &str;

    fn parse(&self, raw: &RawSection) -> anyhow::Result<Option<Section>>;
}

/// A check plugin: discovery and evaluation of one kind of service.
///
/// Implementations are registered in the [`PluginRegistry`] and selected by
/// [`name`](CheckPlugin::name) from configuration and persisted autochecks.
pub trait CheckPlugin: Send + Sync {
    /// Unique plugin name, optionally with a sub-check suffix
    /// (e.g., `"tsm_drives"` or `"netapp_volumes.counters"`).
    fn name(&self) -> &str;

    /// Names of the sections this plugin consumes. Defaults to the plugin
    /// name without its sub-check suffix.
    fn sections(&self) -> Vec<String> {
        let name = self.name();
        vec![name.split_once('.').map_or(name, |(base, _)| base).to_string()]
    }

    /// Service-name template; `%s` is replaced by the item.
    fn service_name(&self) -> &str;

    fn default_parameters(&self) -> Parameters {
        Parameters::new()
    }

    /// Ruleset that supplies parameters for this plugin, if any.
    fn ruleset_name(&self) -> Option<&str> {
        None
    }

    /// Yields one [`Service`] per monitorable item found in the sections.
    fn discover(&self, sections: &SectionSet) -> anyhow::Result<Vec<Service>>;

    /// Evaluates one service. The returned sequence must be finite; an empty
    /// sequence means the item was not found in the sections.
    fn check<'a>(
        &'a self,
        ctx: &'a mut CheckContext<'_>,
        item: Option<&'a str>,
        params: &'a Parameters,
        sections: &'a SectionSet,
    ) -> CheckResults<'a>;
}

/// Lazily produced partial results of one check invocation.
pub type CheckResults<'a> = Box<dyn Iterator<Item = Result<CheckOutput, CheckError>> + 'a>;

/// Yields every output in order.
pub fn yield_all(outputs: Vec<CheckOutput>) -> CheckResults<'static> {
    Box::new(outputs.into_iter().map(Ok))
}

/// Yields nothing, which reports the item as not found.
pub fn yield_nothing() -> CheckResults<'static> {
    Box::new(std::iter::empty())
}

/// Yields a single error.
pub fn yield_error(err: impl Into<CheckError>) -> CheckResults<'static> {
    Box::new(std::iter::once(Err(err.into())))
}

/// Adapts an eagerly computed check body to [`CheckResults`].
pub fn into_results(outcome: Result<Vec<CheckOutput>, CheckError>) -> CheckResults<'static> {
    match outcome {
        Ok(outputs) => yield_all(outputs),
        Err(e) => yield_error(e),
    }
}

/// A parsed section. Opaque to the runtime; plugins downcast to the type
/// their parse function produced.
#[derive(Clone)]
pub struct Section(Arc<dyn Any + Send + Sync>);

impl Section {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Arc::new(value))
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }
}

impl std::fmt::Debug for Section {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Section(..)")
    }
}

/// Parsed sections handed to one plugin, keyed by section name.
#[derive(Debug, Clone, Default)]
pub struct SectionSet {
    sections: BTreeMap<String, Section>,
}

impl SectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, section: Section) {
        self.sections.insert(name.into(), section);
    }

    pub fn get(&self, name: &str) -> Option<&Section> {
        self.sections.get(name)
    }

    /// Typed access to a section.
    pub fn get_as<T: Any>(&self, name: &str) -> Option<&T> {
        self.sections.get(name)?.downcast_ref::<T>()
    }

    /// Rows of a section that was passed through without a parse function.
    pub fn string_table(&self, name: &str) -> Option<&[Row]> {
        self.get_as::<RawSection>(name).map(RawSection::table)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.sections.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.sections.keys().map(String::as_str)
    }

    /// Restricts the set to the given section names.
    pub fn subset(&self, names: &[String]) -> SectionSet {
        let sections = names
            .iter()
            .filter_map(|name| Some((name.clone(), self.sections.get(name)?.clone())))
            .collect();
        SectionSet { sections }
    }
}

/// A discovery candidate.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Service {
    pub item: Option<String>,
    pub parameters: Parameters,
    pub labels: ServiceLabels,
}

impl Service {
    pub fn new(item: Option<&str>) -> Self {
        Self {
            item: item.map(str::to_string),
            ..Self::default()
        }
    }

    pub fn with_parameters(mut self, parameters: Parameters) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_label(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(name.into(), value.into());
        self
    }
}

/// What a check function may see of the running cycle.
pub struct CheckContext<'a> {
    host_name: &'a str,
    now: DateTime<Utc>,
    value_store: &'a mut ValueStore,
}

impl<'a> CheckContext<'a> {
    pub fn new(host_name: &'a str, now: DateTime<Utc>, value_store: &'a mut ValueStore) -> Self {
        Self {
            host_name,
            now,
            value_store,
        }
    }

    pub fn host_name(&self) -> &str {
        self.host_name
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    /// Cycle time as epoch seconds, the time base of the rate helpers.
    pub fn timestamp(&self) -> f64 {
        self.now.timestamp_millis() as f64 / 1000.0
    }

    /// State of the current service, persisted across cycles.
    pub fn value_store(&mut self) -> &mut ValueStore {
        &mut *self.value_store
    }
}

/// Registry with the bundled plugins.
///
/// # Examples
///
/// ```
/// let registry = oxcheck_plugin::builtin_registry().unwrap();
/// assert!(registry.get("tsm_drives").is_some());
/// assert!(registry.get("nonexistent").is_none());
/// ```
pub fn builtin_registry() -> Result<PluginRegistry, RegistryError> {
    let mut builder = PluginRegistry::builder();
    plugins::register_all(&mut builder)?;
    Ok(builder.build())
}
