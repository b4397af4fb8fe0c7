//! Terminal Services session counters from Windows performance data.
//!
//! ```text
//! <<<winperf_ts_sessions>>>
//! 1385714515.93 2102
//! 2 20 rawcount
//! 4 18 rawcount
//! 6 2 rawcount
//! ```
//!
//! Counters relative to the base id: 2 = total, 4 = active, 6 = inactive.
//! Newer Windows versions report them as active, inactive, total.
//!
//! Levels are `(warn, crit)` upper bounds, like every other levels pair:
//! a count above `crit` is CRIT, above `warn` is WARN. Older rule sets that
//! stored the pair as `(crit, warn)` must be swapped when they are migrated.

use crate::{into_results, CheckContext, CheckError, CheckPlugin, CheckResults, SectionSet, Service};
use anyhow::{anyhow, Context};
use oxcheck_common::params::Parameters;
use oxcheck_common::types::{CheckOutput, Row, State};
use serde_json::{json, Value};

const SECTION: &str = "winperf_ts_sessions";
pub const RULESET: &str = "winperf_ts_sessions";

pub struct WinperfTsSessions;

/// Converts the positional `[[active_warn, active_crit], [inactive_warn,
/// inactive_crit]]` form into the `{"active": .., "inactive": ..}` mapping.
/// A `null` pair leaves the corresponding levels unset.
pub fn transform_params(value: &mut Value) -> anyhow::Result<Parameters> {
    if let Value::Object(map) = value {
        return Ok(Parameters::from(map.clone()));
    }
    let pairs = value
        .as_array()
        .filter(|pairs| pairs.len() == 2)
        .ok_or_else(|| anyhow!("expected a pair of levels, got {value}"))?;

    let mut params = Parameters::new();
    for (key, levels) in ["active", "inactive"].into_iter().zip(pairs) {
        match levels {
            Value::Null => {}
            Value::Array(pair) if pair.len() == 2 && pair.iter().all(Value::is_number) => {
                params.insert(key, json!(pair));
            }
            other => return Err(anyhow!("invalid levels for '{key}': {other}")),
        }
    }
    Ok(params)
}

fn counter(row: &Row) -> anyhow::Result<i64> {
    let raw = row
        .get(1)
        .ok_or_else(|| anyhow!("counter line without value: {row:?}"))?;
    raw.parse::<i64>()
        .with_context(|| format!("invalid counter value '{raw}'"))
}

fn check_sessions(params: &Parameters, rows: &[Row]) -> Result<Vec<CheckOutput>, CheckError> {
    if rows.len() <= 1 {
        return Ok(vec![CheckOutput::result(
            State::Unknown,
            "Performance counters not available",
        )]);
    }
    if rows.len() < 4 {
        return Err(anyhow!("expected three counter lines, got {}", rows.len() - 1).into());
    }

    let (total, active, inactive) = (counter(&rows[1])?, counter(&rows[2])?, counter(&rows[3])?);
    let (active, inactive) = if active + inactive == total {
        (active, inactive)
    } else {
        (total, active)
    };

    let mut state = State::Ok;
    let mut texts = Vec::with_capacity(2);
    for (value, key, title) in [(active, "active", "Active"), (inactive, "inactive", "Inactive")] {
        let mut text = format!("{value} {title}");
        if let Some((warn, crit)) = params.get_levels(key) {
            let value = value as f64;
            if value > crit {
                state = State::Crit;
                text.push_str(State::Crit.marker());
            } else if value > warn {
                state = state.max(State::Warn);
                text.push_str(State::Warn.marker());
            }
        }
        texts.push(text);
    }

    Ok(CheckOutput::from_legacy(
        state,
        &texts.join(", "),
        &[("active", active as f64), ("inactive", inactive as f64)],
    ))
}

impl CheckPlugin for WinperfTsSessions {
    fn name(&self) -> &str {
        "winperf_ts_sessions"
    }

    fn service_name(&self) -> &str {
        "Sessions"
    }

    fn ruleset_name(&self) -> Option<&str> {
        Some(RULESET)
    }

    fn discover(&self, sections: &SectionSet) -> anyhow::Result<Vec<Service>> {
        let rows = sections.string_table(SECTION).unwrap_or_default();
        if rows.len() > 1 {
            Ok(vec![Service::new(None)])
        } else {
            Ok(Vec::new())
        }
    }

    fn check<'a>(
        &'a self,
        _ctx: &'a mut CheckContext<'_>,
        _item: Option<&'a str>,
        params: &'a Parameters,
        sections: &'a SectionSet,
    ) -> CheckResults<'a> {
        let rows = sections.string_table(SECTION).unwrap_or_default();
        into_results(check_sessions(params, rows))
    }
}
