//! Evaluation of a single service and aggregation of its partial results.

use crate::crash::panic_message;
use oxcheck_common::params::Parameters;
use oxcheck_common::types::{CheckOutput, Metric, ServiceResult, State};
use oxcheck_plugin::{CheckContext, CheckError, CheckResults, PluginDescriptor, SectionSet};
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Upper bound on the partial results a single check invocation may yield.
pub const MAX_CHECK_OUTPUTS: usize = 10_000;

pub const ITEM_NOT_FOUND: &str = "Item not found in monitoring data";
pub const MISSING_DATA: &str = "Missing monitoring data";

/// Outcome of evaluating one service in one cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum Evaluation {
    /// A fresh result for this cycle.
    Completed(ServiceResult),
    /// The check failed; the UNKNOWN result carries the error text.
    Crashed {
        result: ServiceResult,
        crash_id: String,
    },
    /// No result this cycle; the previous one stays valid.
    Stale { reason: String },
}

impl Evaluation {
    /// The fresh result of this cycle, if any.
    pub fn result(&self) -> Option<&ServiceResult> {
        match self {
            Evaluation::Completed(result) | Evaluation::Crashed { result, .. } => Some(result),
            Evaluation::Stale { .. } => None,
        }
    }

    pub fn is_crash(&self) -> bool {
        matches!(self, Evaluation::Crashed { .. })
    }

    pub fn is_stale(&self) -> bool {
        matches!(self, Evaluation::Stale { .. })
    }
}

/// Runs the check function of `descriptor` and folds its output into one
/// [`Evaluation`].
///
/// Errors and panics of the check function are contained here and turned
/// into an UNKNOWN result with a crash id; ignore-results signals (including
/// rate initialization) become [`Evaluation::Stale`].
pub fn evaluate(
    descriptor: &PluginDescriptor,
    ctx: &mut CheckContext<'_>,
    item: Option<&str>,
    params: &Parameters,
    sections: &SectionSet,
) -> Evaluation {
    let plugin = descriptor.name();
    let host = ctx.host_name().to_string();

    let outcome = catch_unwind(AssertUnwindSafe(|| {
        collect_outputs(descriptor.plugin().check(ctx, item, params, sections))
    }));

    let error = match outcome {
        Ok(Ok(outputs)) if outputs.is_empty() => {
            return Evaluation::Completed(ServiceResult::unknown(ITEM_NOT_FOUND));
        }
        Ok(Ok(outputs)) => return Evaluation::Completed(aggregate(outputs)),
        Ok(Err(e)) if e.is_ignore_results() => {
            tracing::debug!(host = %host, plugin, item, reason = %e, "Check results ignored");
            return Evaluation::Stale {
                reason: e.to_string(),
            };
        }
        Ok(Err(e)) => format!("{e:#}"),
        Err(panic) => panic_message(panic.as_ref()),
    };

    let crash_id = oxcheck_common::id::next_id();
    tracing::error!(
        host = %host,
        plugin,
        item,
        crash_id = %crash_id,
        error = %error,
        "Check crashed"
    );
    Evaluation::Crashed {
        result: ServiceResult::unknown(format!(
            "check failed - {error} (Crash-ID: {crash_id})"
        )),
        crash_id,
    }
}

fn collect_outputs(results: CheckResults<'_>) -> Result<Vec<CheckOutput>, CheckError> {
    let mut outputs = Vec::new();
    for output in results {
        if outputs.len() == MAX_CHECK_OUTPUTS {
            return Err(anyhow::anyhow!(
                "check yielded more than {MAX_CHECK_OUTPUTS} results"
            )
            .into());
        }
        outputs.push(output?);
    }
    Ok(outputs)
}

/// Folds partial results into one service result.
///
/// The state is the worst state of all parts. Non-empty summaries are joined
/// in yield order, each non-OK one marked with its state unless it already
/// carries the marker. Metrics are united; a repeated name replaces the
/// earlier value.
///
/// # Examples
///
/// ```
/// use oxcheck_common::types::{CheckOutput, State};
/// use oxcheck_engine::checking::aggregate;
///
/// let result = aggregate(vec![
///     CheckOutput::result(State::Ok, "a"),
///     CheckOutput::result(State::Warn, "b"),
///     CheckOutput::result(State::Ok, "c"),
/// ]);
/// assert_eq!(result.state, State::Warn);
/// assert_eq!(result.summary, "a, b(!), c");
/// ```
pub fn aggregate(outputs: Vec<CheckOutput>) -> ServiceResult {
    let mut state = State::Ok;
    let mut summaries = Vec::new();
    let mut details = Vec::new();
    let mut metrics: Vec<Metric> = Vec::new();

    for output in outputs {
        match output {
            CheckOutput::Result {
                state: part_state,
                summary,
                details: part_details,
            } => {
                state = state.max(part_state);
                if !summary.is_empty() {
                    let marker = part_state.marker();
                    if summary.contains(marker) {
                        summaries.push(summary);
                    } else {
                        summaries.push(format!("{summary}{marker}"));
                    }
                }
                details.extend(part_details);
            }
            CheckOutput::Metric(metric) => {
                match metrics.iter_mut().find(|m| m.name == metric.name) {
                    Some(existing) => *existing = metric,
                    None => metrics.push(metric),
                }
            }
        }
    }

    ServiceResult {
        state,
        summary: summaries.join(", "),
        details,
        metrics,
    }
}
