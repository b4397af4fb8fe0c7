//! Counter rates and moving averages backed by the service value store.

use crate::value_store::ValueStore;
use serde_json::{json, Value};

/// Why no rate could be computed in this cycle.
///
/// Every variant is recoverable: the caller's results for this cycle are
/// ignored and the next observation produces a rate.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GetRateError {
    #[error("Initialized: '{0}'")]
    Initialized(String),

    #[error("No time difference for '{0}'")]
    NoTimeDifference(String),

    #[error("Time anomaly for '{key}': {elapsed} seconds")]
    TimeAnomaly { key: String, elapsed: f64 },

    #[error("Value overflow for '{key}': {previous} -> {current}")]
    Overflow {
        key: String,
        previous: f64,
        current: f64,
    },
}

fn read_pair(value: Option<&Value>) -> Option<(f64, f64)> {
    match value? {
        Value::Array(pair) if pair.len() == 2 => Some((pair[0].as_f64()?, pair[1].as_f64()?)),
        _ => None,
    }
}

/// Per-second rate of a monotonic counter.
///
/// The observation `(now, value)` is always stored, whatever the outcome.
/// A decreasing counter is reported as [`GetRateError::Overflow`] when
/// `raise_overflow` is set and clamped to `0.0` otherwise.
///
/// # Examples
///
/// ```
/// use oxcheck_plugin::rate::{get_rate, GetRateError};
/// use oxcheck_plugin::ValueStore;
///
/// let mut store = ValueStore::new();
/// assert!(matches!(
///     get_rate(&mut store, "k", 0.0, 100.0, false),
///     Err(GetRateError::Initialized(_))
/// ));
/// assert_eq!(get_rate(&mut store, "k", 10.0, 150.0, false), Ok(5.0));
/// ```
pub fn get_rate(
    store: &mut ValueStore,
    key: &str,
    now: f64,
    value: f64,
    raise_overflow: bool,
) -> Result<f64, GetRateError> {
    let previous = read_pair(store.get(key));
    store.insert(key, json!([now, value]));

    let Some((last_time, last_value)) = previous else {
        return Err(GetRateError::Initialized(key.to_string()));
    };

    let elapsed = now - last_time;
    if elapsed == 0.0 {
        return Err(GetRateError::NoTimeDifference(key.to_string()));
    }
    if elapsed < 0.0 {
        return Err(GetRateError::TimeAnomaly {
            key: key.to_string(),
            elapsed,
        });
    }

    if value < last_value {
        if raise_overflow {
            return Err(GetRateError::Overflow {
                key: key.to_string(),
                previous: last_value,
                current: value,
            });
        }
        return Ok(0.0);
    }

    Ok((value - last_value) / elapsed)
}

/// Exponentially weighted moving average with a half-life of
/// `backlog_minutes`.
///
/// The first observation initializes the average to `value`. Observations
/// that do not advance time return the stored average unchanged.
pub fn get_average(
    store: &mut ValueStore,
    key: &str,
    now: f64,
    value: f64,
    backlog_minutes: f64,
) -> f64 {
    let stored = match store.get(key) {
        Some(Value::Array(triple)) if triple.len() == 3 => triple
            .iter()
            .map(Value::as_f64)
            .collect::<Option<Vec<f64>>>(),
        _ => None,
    };

    let Some(stored) = stored else {
        store.insert(key, json!([now, now, value]));
        return value;
    };
    let (start_time, last_time, last_average) = (stored[0], stored[1], stored[2]);

    let elapsed = now - last_time;
    if elapsed <= 0.0 || backlog_minutes <= 0.0 {
        return last_average;
    }

    let weight = 0.5_f64.powf(elapsed / (backlog_minutes * 60.0));
    let average = (1.0 - weight) * value + weight * last_average;
    store.insert(key, json!([start_time, now, average]));
    average
}
