use crate::error::RegistryError;
use crate::{CheckPlugin, SectionPlugin};
use oxcheck_common::params::Parameters;
use serde_json::Value;
use std::collections::HashMap;

/// Converts a legacy positional parameter value into a mapping.
///
/// The function receives a private copy of the value; mutating it is
/// tolerated but reported as a warning by the parameter resolution.
pub type ParameterTransform = fn(&mut Value) -> anyhow::Result<Parameters>;

/// Validated check plugin name, optionally carrying a sub-check suffix.
///
/// # Examples
///
/// ```
/// use oxcheck_plugin::registry::CheckPluginName;
///
/// let name = CheckPluginName::parse("netapp_volumes.counters").unwrap();
/// assert_eq!(name.base(), "netapp_volumes");
/// assert_eq!(name.subcheck(), Some("counters"));
/// assert!(CheckPluginName::parse("Bad-Name").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CheckPluginName(String);

impl CheckPluginName {
    pub fn parse(name: &str) -> Result<Self, RegistryError> {
        let invalid = |reason| RegistryError::InvalidPluginName {
            name: name.to_string(),
            reason,
        };
        if name.is_empty() {
            return Err(invalid("empty name"));
        }
        if name.matches('.').count() > 1 {
            return Err(invalid("more than one sub-check separator"));
        }
        for part in name.split('.') {
            if part.is_empty() {
                return Err(invalid("empty name component"));
            }
            if !part
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
            {
                return Err(invalid("only lowercase letters, digits and '_' are allowed"));
            }
        }
        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn base(&self) -> &str {
        self.0.split_once('.').map_or(&self.0, |(base, _)| base)
    }

    pub fn subcheck(&self) -> Option<&str> {
        self.0.split_once('.').map(|(_, sub)| sub)
    }
}

impl std::fmt::Display for CheckPluginName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A registered check plugin together with its metadata, frozen at
/// registration time.
pub struct PluginDescriptor {
    name: CheckPluginName,
    sections: Vec<String>,
    service_name: String,
    default_parameters: Parameters,
    ruleset_name: Option<String>,
    plugin: Box<dyn CheckPlugin>,
}

impl PluginDescriptor {
    fn new(plugin: Box<dyn CheckPlugin>) -> Result<Self, RegistryError> {
        let name = CheckPluginName::parse(plugin.name())?;
        let service_name = plugin.service_name().to_string();
        if service_name.trim().is_empty() || service_name.matches("%s").count() > 1 {
            return Err(RegistryError::InvalidServiceName {
                plugin: name.to_string(),
                template: service_name,
            });
        }
        Ok(Self {
            sections: plugin.sections(),
            default_parameters: plugin.default_parameters(),
            ruleset_name: plugin.ruleset_name().map(str::to_string),
            name,
            service_name,
            plugin,
        })
    }

    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    pub fn plugin_name(&self) -> &CheckPluginName {
        &self.name
    }

    pub fn sections(&self) -> &[String] {
        &self.sections
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// `true` when services of this plugin carry an item.
    pub fn has_item(&self) -> bool {
        self.service_name.contains("%s")
    }

    pub fn default_parameters(&self) -> &Parameters {
        &self.default_parameters
    }

    pub fn ruleset_name(&self) -> Option<&str> {
        self.ruleset_name.as_deref()
    }

    pub fn plugin(&self) -> &dyn CheckPlugin {
        self.plugin.as_ref()
    }
}

impl std::fmt::Debug for PluginDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginDescriptor")
            .field("name", &self.name)
            .field("sections", &self.sections)
            .field("service_name", &self.service_name)
            .field("ruleset_name", &self.ruleset_name)
            .finish()
    }
}

/// Collects plugin registrations; duplicates are rejected immediately.
#[derive(Default)]
pub struct RegistryBuilder {
    sections: HashMap<String, Box<dyn SectionPlugin>>,
    checks: Vec<PluginDescriptor>,
    index: HashMap<String, usize>,
    transforms: HashMap<String, ParameterTransform>,
}

impl RegistryBuilder {
    pub fn register_section(&mut self, plugin: Box<dyn SectionPlugin>) -> Result<(), RegistryError> {
        let name = plugin.name().to_string();
        if self.sections.contains_key(&name) {
            return Err(RegistryError::DuplicateSection(name));
        }
        self.sections.insert(name, plugin);
        Ok(())
    }

    pub fn register_check(&mut self, plugin: Box<dyn CheckPlugin>) -> Result<(), RegistryError> {
        let descriptor = PluginDescriptor::new(plugin)?;
        let name = descriptor.name().to_string();
        if self.index.contains_key(&name) {
            return Err(RegistryError::DuplicateCheckPlugin(name));
        }
        self.index.insert(name, self.checks.len());
        self.checks.push(descriptor);
        Ok(())
    }

    pub fn register_transform(
        &mut self,
        ruleset_name: &str,
        transform: ParameterTransform,
    ) -> Result<(), RegistryError> {
        if self.transforms.contains_key(ruleset_name) {
            return Err(RegistryError::DuplicateTransform(ruleset_name.to_string()));
        }
        self.transforms.insert(ruleset_name.to_string(), transform);
        Ok(())
    }

    pub fn build(self) -> PluginRegistry {
        PluginRegistry {
            sections: self.sections,
            checks: self.checks,
            index: self.index,
            transforms: self.transforms,
        }
    }
}

/// Immutable name-keyed map of section parsers, check plugins and ruleset
/// transforms. Built once at startup and shared read-only.
///
/// # Examples
///
/// ```
/// use oxcheck_plugin::registry::PluginRegistry;
///
/// let registry = PluginRegistry::builder().build();
/// assert!(registry.is_empty());
/// assert!(registry.get("tsm_drives").is_none());
/// ```
pub struct PluginRegistry {
    sections: HashMap<String, Box<dyn SectionPlugin>>,
    checks: Vec<PluginDescriptor>,
    index: HashMap<String, usize>,
    transforms: HashMap<String, ParameterTransform>,
}

impl PluginRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    pub fn get(&self, name: &str) -> Option<&PluginDescriptor> {
        self.index.get(name).map(|&i| &self.checks[i])
    }

    /// All check plugins in registration order.
    pub fn all(&self) -> impl Iterator<Item = &PluginDescriptor> {
        self.checks.iter()
    }

    pub fn section(&self, name: &str) -> Option<&dyn SectionPlugin> {
        self.sections.get(name).map(|p| p.as_ref())
    }

    pub fn transform(&self, ruleset_name: &str) -> Option<ParameterTransform> {
        self.transforms.get(ruleset_name).copied()
    }

    pub fn plugins_for_section<'a>(
        &'a self,
        section: &'a str,
    ) -> impl Iterator<Item = &'a PluginDescriptor> + 'a {
        self.checks
            .iter()
            .filter(move |d| d.sections().iter().any(|s| s == section))
    }

    pub fn has_plugin(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn plugin_names(&self) -> Vec<&str> {
        self.checks.iter().map(PluginDescriptor::name).collect()
    }

    pub fn len(&self) -> usize {
        self.checks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }
}
