//! Reader for agent output spooled to disk.
//!
//! ```text
//! <<<tsm_drives>>>
//! tsmfarm3 LIBRARY3 DRIVE01 LOADED YES 000782XXXX
//! <<<winperf_ts_sessions:sep(9)>>>
//! 1385714515.93	2102
//! <<<>>>
//! ```
//!
//! Rows split on whitespace unless the header carries `sep(N)`, in which case
//! they split on the character with code `N`. `<<<>>>` closes the current
//! section. A header that repeats appends to the existing section.

use anyhow::Result;
use oxcheck_common::types::{RawSection, Row, StringTable};
use oxcheck_engine::RawSections;
use std::collections::BTreeMap;
use std::path::Path;

pub const SPOOL_EXTENSION: &str = "txt";

struct Header {
    name: String,
    separator: Option<char>,
}

fn parse_header(line: &str) -> Option<Option<Header>> {
    let inner = line.trim().strip_prefix("<<<")?.strip_suffix(">>>")?;
    if inner.is_empty() {
        return Some(None);
    }
    let mut parts = inner.split(':');
    let name = parts.next()?.trim().to_string();
    if name.is_empty() {
        return Some(None);
    }
    let separator = parts
        .filter_map(|opt| opt.strip_prefix("sep(")?.strip_suffix(')')?.parse::<u8>().ok())
        .map(char::from)
        .last();
    Some(Some(Header { name, separator }))
}

fn split_row(line: &str, separator: Option<char>) -> Row {
    match separator {
        Some(sep) => line.split(sep).map(str::to_string).collect(),
        None => line.split_whitespace().map(str::to_string).collect(),
    }
}

/// Splits agent output into raw section tables.
///
/// # Examples
///
/// ```
/// use oxcheck_server::agent_output::parse_agent_output;
///
/// let sections = parse_agent_output("<<<df>>>\n/dev/sda1 100 50\n<<<uptime>>>\n1234\n");
/// assert_eq!(sections["df"].table()[0], vec!["/dev/sda1", "100", "50"]);
/// assert_eq!(sections["uptime"].table()[0][0], "1234");
/// ```
pub fn parse_agent_output(text: &str) -> RawSections {
    let mut tables: BTreeMap<String, StringTable> = BTreeMap::new();
    let mut current: Option<Header> = None;

    for line in text.lines() {
        if let Some(header) = parse_header(line) {
            if let Some(header) = &header {
                tables.entry(header.name.clone()).or_default();
            }
            current = header;
            continue;
        }
        let Some(header) = &current else {
            continue;
        };
        if line.trim().is_empty() {
            continue;
        }
        let row = split_row(line, header.separator);
        tables.entry(header.name.clone()).or_default().push(row);
    }

    tables
        .into_iter()
        .map(|(name, table)| (name, RawSection::Table(table)))
        .collect()
}

/// Reads and parses `<spool_dir>/<host>.txt`.
pub fn read_spool(spool_dir: &Path, host: &str) -> Result<RawSections> {
    let path = spool_dir.join(format!("{host}.{SPOOL_EXTENSION}"));
    let text = std::fs::read_to_string(&path)
        .map_err(|e| anyhow::anyhow!("Failed to read agent output '{}': {e}", path.display()))?;
    Ok(parse_agent_output(&text))
}

/// Hosts with a spool file, sorted by name.
pub fn list_hosts(spool_dir: &Path) -> Result<Vec<String>> {
    let mut hosts = Vec::new();
    for entry in std::fs::read_dir(spool_dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some(SPOOL_EXTENSION) {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            if !stem.starts_with('.') {
                hosts.push(stem.to_string());
            }
        }
    }
    hosts.sort();
    Ok(hosts)
}
