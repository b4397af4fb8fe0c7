use oxcheck_common::types::ServiceId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Persisted key/value state of one service, carried across cycles.
///
/// Keys are chosen by the plugin (e.g., `"check_mcafee_webgateway.infections"`);
/// values are arbitrary JSON so a plugin may store tuples of timestamp and
/// counter or running averages.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValueStore(BTreeMap<String, Value>);

impl ValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }
}

impl FromIterator<(String, Value)> for ValueStore {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// All value stores of one host, one per service.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HostValueStore {
    services: BTreeMap<ServiceId, ValueStore>,
}

impl HostValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn service(&self, id: &ServiceId) -> Option<&ValueStore> {
        self.services.get(id)
    }

    /// The store of one service, created on first access.
    pub fn service_mut(&mut self, id: &ServiceId) -> &mut ValueStore {
        self.services.entry(id.clone()).or_default()
    }

    pub fn insert(&mut self, id: ServiceId, store: ValueStore) {
        self.services.insert(id, store);
    }

    /// Drops stores of services that are no longer monitored.
    pub fn retain(&mut self, mut keep: impl FnMut(&ServiceId) -> bool) {
        self.services.retain(|id, _| keep(id));
    }

    /// Flattened `(service, key, value)` triples for persistence. Empty
    /// per-service stores are skipped.
    pub fn entries(&self) -> impl Iterator<Item = (&ServiceId, &String, &Value)> {
        self.services
            .iter()
            .flat_map(|(id, store)| store.iter().map(move |(k, v)| (id, k, v)))
    }

    pub fn is_empty(&self) -> bool {
        self.services.values().all(ValueStore::is_empty)
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }
}
