use crate::crash::panic_message;
use oxcheck_common::types::RawSection;
use oxcheck_plugin::{PluginRegistry, Section, SectionSet};
use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Raw data of one host, keyed by section name.
pub type RawSections = BTreeMap<String, RawSection>;

/// A section whose parse function failed on this host.
#[derive(Debug, Clone, PartialEq)]
pub struct SectionFailure {
    pub section: String,
    pub error: String,
}

/// Parsed sections of one host plus the sections that failed to parse.
#[derive(Debug, Default)]
pub struct ParsedSections {
    pub sections: SectionSet,
    pub failures: Vec<SectionFailure>,
}

impl ParsedSections {
    pub fn contains(&self, name: &str) -> bool {
        self.sections.contains(name)
    }
}

/// Parses one section.
///
/// Without a registered parse function the raw table is passed through
/// unchanged, and an empty table counts as absent. `Ok(None)` means the host
/// does not have the section.
pub fn parse_section(
    registry: &PluginRegistry,
    name: &str,
    raw: &RawSection,
) -> Result<Option<Section>, SectionFailure> {
    let Some(parser) = registry.section(name) else {
        if raw.is_empty() {
            return Ok(None);
        }
        return Ok(Some(Section::new(raw.clone())));
    };

    let failure = |error: String| SectionFailure {
        section: name.to_string(),
        error,
    };
    match catch_unwind(AssertUnwindSafe(|| parser.parse(raw))) {
        Ok(Ok(section)) => Ok(section),
        Ok(Err(e)) => Err(failure(format!("{e:#}"))),
        Err(panic) => Err(failure(panic_message(panic.as_ref()))),
    }
}

/// Parses every section of a host. A failing section is recorded and
/// treated as absent; it never affects the other sections.
pub fn parse_sections(registry: &PluginRegistry, host: &str, raw: &RawSections) -> ParsedSections {
    let mut parsed = ParsedSections::default();
    for (name, table) in raw {
        match parse_section(registry, name, table) {
            Ok(Some(section)) => parsed.sections.insert(name.clone(), section),
            Ok(None) => {
                tracing::debug!(host, section = %name, "Section absent");
            }
            Err(failure) => {
                tracing::warn!(
                    host,
                    section = %name,
                    error = %failure.error,
                    "Section parse failed"
                );
                parsed.failures.push(failure);
            }
        }
    }
    parsed
}
