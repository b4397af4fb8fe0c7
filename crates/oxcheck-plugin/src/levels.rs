//! Threshold evaluation and value rendering shared by check plugins.

use oxcheck_common::types::{CheckOutput, Metric, State};

/// Renders a value for a summary line.
pub type Render = fn(f64) -> String;

pub fn render_float(value: f64) -> String {
    format!("{value:.2}")
}

pub fn render_count(value: f64) -> String {
    format!("{}", value.round() as i64)
}

pub fn render_percent(value: f64) -> String {
    format!("{value:.2}%")
}

pub fn render_per_second(value: f64) -> String {
    format!("{value:.2}/s")
}

/// Compares `value` against optional upper and lower `(warn, crit)` levels.
///
/// Upper levels trigger at or above the threshold, lower levels strictly
/// below it. Returns the result part followed by the metric part when a
/// metric name is given.
///
/// # Examples
///
/// ```
/// use oxcheck_common::types::{CheckOutput, State};
/// use oxcheck_plugin::levels::{check_levels, render_count};
///
/// let parts = check_levels(12.0, Some((10.0, 20.0)), None, Some("active"), render_count, Some("Active"));
/// assert!(matches!(&parts[0], CheckOutput::Result { state: State::Warn, .. }));
/// assert_eq!(parts.len(), 2);
/// ```
pub fn check_levels(
    value: f64,
    levels_upper: Option<(f64, f64)>,
    levels_lower: Option<(f64, f64)>,
    metric_name: Option<&str>,
    render: Render,
    label: Option<&str>,
) -> Vec<CheckOutput> {
    let rendered = render(value);
    let mut summary = match label {
        Some(label) => format!("{label}: {rendered}"),
        None => rendered,
    };

    let (upper_state, upper_text) = check_upper(value, levels_upper, render);
    let (lower_state, lower_text) = check_lower(value, levels_lower, render);
    let state = upper_state.max(lower_state);
    let text = if upper_state >= lower_state {
        upper_text
    } else {
        lower_text
    };
    if let Some(text) = text {
        summary.push_str(&text);
    }

    let mut outputs = vec![CheckOutput::result(state, summary)];
    if let Some(name) = metric_name {
        outputs.push(CheckOutput::Metric(
            Metric::new(name, value).with_levels(levels_upper),
        ));
    }
    outputs
}

fn check_upper(value: f64, levels: Option<(f64, f64)>, render: Render) -> (State, Option<String>) {
    let Some((warn, crit)) = levels else {
        return (State::Ok, None);
    };
    let state = if value >= crit {
        State::Crit
    } else if value >= warn {
        State::Warn
    } else {
        return (State::Ok, None);
    };
    (
        state,
        Some(format!(" (warn/crit at {}/{})", render(warn), render(crit))),
    )
}

fn check_lower(value: f64, levels: Option<(f64, f64)>, render: Render) -> (State, Option<String>) {
    let Some((warn, crit)) = levels else {
        return (State::Ok, None);
    };
    let state = if value < crit {
        State::Crit
    } else if value < warn {
        State::Warn
    } else {
        return (State::Ok, None);
    };
    (
        state,
        Some(format!(" (warn/crit below {}/{})", render(warn), render(crit))),
    )
}
