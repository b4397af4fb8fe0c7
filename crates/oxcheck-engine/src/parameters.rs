//! Layered resolution of the parameters handed to a check function.
//!
//! Layers, lowest to highest precedence: plugin defaults, matching ruleset
//! values, the autocheck's persisted parameters. Mappings are deep-merged;
//! positional values are converted by the ruleset's transform first.

use oxcheck_common::params::{LegacyParameters, Parameters, LEGACY_KEY};
use oxcheck_common::types::service_description;
use oxcheck_plugin::{PluginDescriptor, PluginRegistry};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Consumed output of the rule matcher: the values of all rules of a
/// ruleset that match a service, ordered from least to most specific.
pub trait RulesetSource: Send + Sync {
    fn values(
        &self,
        ruleset: &str,
        host: &str,
        item: Option<&str>,
        service_description: &str,
    ) -> Vec<Value>;
}

/// A source without any rules.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRules;

impl RulesetSource for NoRules {
    fn values(&self, _: &str, _: &str, _: Option<&str>, _: &str) -> Vec<Value> {
        Vec::new()
    }
}

/// Which of several matching rules wins where their keys overlap.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RulePrecedence {
    /// The last (most specific) rule overrides earlier ones.
    #[default]
    LastWins,
    /// The first matching rule overrides later ones.
    FirstWins,
}

#[derive(Debug, thiserror::Error)]
pub enum ParameterError {
    #[error("Parameters: transform of ruleset '{ruleset}' failed: {source:#}")]
    Transform {
        ruleset: String,
        source: anyhow::Error,
    },
}

enum Layer {
    Merge(Parameters),
    Override(Value),
}

/// Resolves parameters against a registry and a rule source.
pub struct ParameterResolver<'a> {
    registry: &'a PluginRegistry,
    rules: &'a dyn RulesetSource,
    precedence: RulePrecedence,
}

impl<'a> ParameterResolver<'a> {
    pub fn new(registry: &'a PluginRegistry, rules: &'a dyn RulesetSource) -> Self {
        Self {
            registry,
            rules,
            precedence: RulePrecedence::default(),
        }
    }

    pub fn with_precedence(mut self, precedence: RulePrecedence) -> Self {
        self.precedence = precedence;
        self
    }

    /// Final parameter mapping for one service.
    ///
    /// A positional value without transform replaces everything resolved so
    /// far and is carried under [`LEGACY_KEY`].
    pub fn resolve(
        &self,
        host: &str,
        descriptor: &PluginDescriptor,
        item: Option<&str>,
        autocheck: &LegacyParameters,
    ) -> Result<Parameters, ParameterError> {
        let mut resolved = descriptor.default_parameters().clone();

        if let Some(ruleset) = descriptor.ruleset_name() {
            let description = service_description(descriptor.service_name(), item);
            let mut values = self.rules.values(ruleset, host, item, &description);
            if self.precedence == RulePrecedence::FirstWins {
                values.reverse();
            }
            for value in values {
                let layer = self.normalize(descriptor, LegacyParameters::from(value))?;
                apply(&mut resolved, layer);
            }
        }

        if !autocheck.is_empty() {
            let layer = self.normalize(descriptor, autocheck.clone())?;
            apply(&mut resolved, layer);
        }

        Ok(resolved)
    }

    fn normalize(
        &self,
        descriptor: &PluginDescriptor,
        value: LegacyParameters,
    ) -> Result<Layer, ParameterError> {
        let positional = match value {
            LegacyParameters::Structured(params) => return Ok(Layer::Merge(params)),
            LegacyParameters::Positional(value) => value,
        };

        let Some((ruleset, transform)) = descriptor
            .ruleset_name()
            .and_then(|r| Some((r, self.registry.transform(r)?)))
        else {
            return Ok(Layer::Override(positional));
        };

        let mut input = positional.clone();
        let params = transform(&mut input).map_err(|source| ParameterError::Transform {
            ruleset: ruleset.to_string(),
            source,
        })?;
        if input != positional {
            tracing::warn!(
                plugin = descriptor.name(),
                ruleset,
                "Parameter transform modified its input"
            );
        }
        Ok(Layer::Merge(params))
    }
}

fn apply(resolved: &mut Parameters, layer: Layer) {
    match layer {
        Layer::Merge(params) => resolved.merge(&params),
        Layer::Override(value) => {
            let mut params = Parameters::new();
            params.insert(LEGACY_KEY, value);
            *resolved = params;
        }
    }
}
