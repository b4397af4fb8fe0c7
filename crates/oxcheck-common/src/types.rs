use crate::params::LegacyParameters;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One row of raw agent or SNMP output, already split into tokens.
pub type Row = Vec<String>;

/// The universal raw transport format: a sequence of token rows.
pub type StringTable = Vec<Row>;

/// Service labels attached to a discovered service.
pub type ServiceLabels = BTreeMap<String, String>;

/// Raw data for one section as delivered by the transport layer.
///
/// Agent sections and plain SNMP fetches arrive as a single table; SNMP
/// sections that fetch several trees arrive as one table per tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawSection {
    Table(StringTable),
    Multi(Vec<StringTable>),
}

impl RawSection {
    /// Returns `true` when the section carries no rows at all.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Table(table) => table.is_empty(),
            Self::Multi(tables) => tables.iter().all(Vec::is_empty),
        }
    }

    /// The single table of an agent section, or the first tree of a
    /// multi-table SNMP section.
    pub fn table(&self) -> &[Row] {
        match self {
            Self::Table(table) => table,
            Self::Multi(tables) => tables.first().map(Vec::as_slice).unwrap_or(&[]),
        }
    }
}

impl From<StringTable> for RawSection {
    fn from(table: StringTable) -> Self {
        Self::Table(table)
    }
}

/// Builds a [`StringTable`] from string literals; handy for fixtures.
///
/// # Examples
///
/// ```
/// use oxcheck_common::types::string_table;
///
/// let table = string_table(&[&["eth0", "up"], &["eth1", "down"]]);
/// assert_eq!(table[1][1], "down");
/// ```
pub fn string_table(rows: &[&[&str]]) -> StringTable {
    rows.iter()
        .map(|row| row.iter().map(|token| (*token).to_string()).collect())
        .collect()
}

/// Monitoring state of a service, ordered by ordinal (OK < WARN < CRIT < UNKNOWN).
///
/// # Examples
///
/// ```
/// use oxcheck_common::types::State;
///
/// let state: State = "warn".parse().unwrap();
/// assert_eq!(state, State::Warn);
/// assert_eq!(state.to_string(), "WARN");
/// assert!(State::Unknown > State::Crit);
/// ```
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum State {
    #[default]
    Ok,
    Warn,
    Crit,
    Unknown,
}

impl State {
    pub fn ordinal(self) -> u8 {
        match self {
            State::Ok => 0,
            State::Warn => 1,
            State::Crit => 2,
            State::Unknown => 3,
        }
    }

    pub fn from_ordinal(value: i64) -> Option<Self> {
        match value {
            0 => Some(State::Ok),
            1 => Some(State::Warn),
            2 => Some(State::Crit),
            3 => Some(State::Unknown),
            _ => None,
        }
    }

    /// Classic summary marker appended to non-OK partial results.
    pub fn marker(self) -> &'static str {
        match self {
            State::Ok => "",
            State::Warn => "(!)",
            State::Crit => "(!!)",
            State::Unknown => "(?)",
        }
    }
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            State::Ok => write!(f, "OK"),
            State::Warn => write!(f, "WARN"),
            State::Crit => write!(f, "CRIT"),
            State::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

impl std::str::FromStr for State {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ok" | "0" => Ok(State::Ok),
            "warn" | "warning" | "1" => Ok(State::Warn),
            "crit" | "critical" | "2" => Ok(State::Crit),
            "unknown" | "3" => Ok(State::Unknown),
            _ => Err(format!("unknown state: {s}")),
        }
    }
}

/// A named numeric value with optional levels and boundaries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub name: String,
    pub value: f64,
    /// (warn, crit)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub levels: Option<(f64, f64)>,
    /// (min, max)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boundaries: Option<(Option<f64>, Option<f64>)>,
}

impl Metric {
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value,
            levels: None,
            boundaries: None,
        }
    }

    pub fn with_levels(mut self, levels: Option<(f64, f64)>) -> Self {
        self.levels = levels;
        self
    }

    pub fn with_boundaries(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.boundaries = Some((min, max));
        self
    }
}

/// One partial result produced by a check function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CheckOutput {
    Result {
        state: State,
        summary: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        details: Option<String>,
    },
    Metric(Metric),
}

impl CheckOutput {
    pub fn result(state: State, summary: impl Into<String>) -> Self {
        Self::Result {
            state,
            summary: summary.into(),
            details: None,
        }
    }

    pub fn metric(name: impl Into<String>, value: f64) -> Self {
        Self::Metric(Metric::new(name, value))
    }

    /// Expands the legacy `(state, text, perfdata)` tuple form into parts.
    pub fn from_legacy(state: State, text: &str, perfdata: &[(&str, f64)]) -> Vec<Self> {
        let mut outputs = Vec::with_capacity(perfdata.len() + 1);
        outputs.push(Self::result(state, text));
        outputs.extend(
            perfdata
                .iter()
                .map(|(name, value)| Self::metric(*name, *value)),
        );
        outputs
    }
}

/// The aggregated outcome of one service for one cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceResult {
    pub state: State,
    pub summary: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub metrics: Vec<Metric>,
}

impl ServiceResult {
    pub fn new(state: State, summary: impl Into<String>) -> Self {
        Self {
            state,
            summary: summary.into(),
            details: Vec::new(),
            metrics: Vec::new(),
        }
    }

    pub fn unknown(summary: impl Into<String>) -> Self {
        Self::new(State::Unknown, summary)
    }

    pub fn metric(&self, name: &str) -> Option<&Metric> {
        self.metrics.iter().find(|m| m.name == name)
    }
}

/// Identity of a service on a host: the check plugin plus its item.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ServiceId {
    pub plugin: String,
    pub item: Option<String>,
}

impl ServiceId {
    pub fn new(plugin: impl Into<String>, item: Option<&str>) -> Self {
        Self {
            plugin: plugin.into(),
            item: item.map(str::to_string),
        }
    }
}

impl std::fmt::Display for ServiceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.item {
            Some(item) => write!(f, "{}/{}", self.plugin, item),
            None => write!(f, "{}", self.plugin),
        }
    }
}

/// Fills the `%s` placeholder of a service-name template with the item.
///
/// # Examples
///
/// ```
/// use oxcheck_common::types::service_description;
///
/// assert_eq!(service_description("TSM Drive %s", Some("LIB / D1")), "TSM Drive LIB / D1");
/// assert_eq!(service_description("Sessions", None), "Sessions");
/// ```
pub fn service_description(template: &str, item: Option<&str>) -> String {
    match item {
        Some(item) => template.replacen("%s", item, 1),
        None => template.to_string(),
    }
}

/// A persisted discovered service of one host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutocheckEntry {
    pub check_plugin_name: String,
    pub item: Option<String>,
    #[serde(default)]
    pub parameters: LegacyParameters,
    #[serde(default)]
    pub service_labels: ServiceLabels,
}

impl AutocheckEntry {
    pub fn id(&self) -> ServiceId {
        ServiceId::new(&self.check_plugin_name, self.item.as_deref())
    }
}
