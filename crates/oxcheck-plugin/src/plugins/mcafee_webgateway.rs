//! Infection and blocked-connection rates of a McAfee Web Gateway (SNMP).

use crate::levels::{check_levels, render_per_second};
use crate::rate::get_rate;
use crate::{
    into_results, CheckContext, CheckError, CheckPlugin, CheckResults, Section, SectionPlugin,
    SectionSet, Service,
};
use oxcheck_common::params::Parameters;
use oxcheck_common::types::{CheckOutput, RawSection};

const SECTION: &str = "mcafee_webgateway";
pub const RULESET: &str = "mcafee_web_gateway";

pub const INFECTIONS_KEY: &str = "check_mcafee_webgateway.infections";
pub const CONNECTIONS_BLOCKED_KEY: &str = "check_mcafee_webgateway.connections_blocked";

/// Parsed counters. A counter the device did not report as a plain number
/// is `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GatewaySection {
    pub infections: Option<u64>,
    pub connections_blocked: Option<u64>,
}

fn counter(token: Option<&String>) -> Option<u64> {
    let token = token?;
    if !token.is_empty() && token.chars().all(|c| c.is_ascii_digit()) {
        token.parse().ok()
    } else {
        None
    }
}

pub struct McafeeWebgatewaySection;

impl SectionPlugin for McafeeWebgatewaySection {
    fn name(&self) -> &str {
        SECTION
    }

    fn parse(&self, raw: &RawSection) -> anyhow::Result<Option<Section>> {
        let Some(row) = raw.table().first() else {
            return Ok(None);
        };
        Ok(Some(Section::new(GatewaySection {
            infections: counter(row.first()),
            connections_blocked: counter(row.get(1)),
        })))
    }
}

pub struct McafeeWebgateway;

fn compute_rate(
    rate: Option<Result<f64, CheckError>>,
    levels: Option<(f64, f64)>,
    metric_name: &str,
    label: &str,
) -> Result<Vec<CheckOutput>, CheckError> {
    match rate {
        None => Ok(Vec::new()),
        Some(rate) => Ok(check_levels(
            rate?,
            levels,
            None,
            Some(metric_name),
            render_per_second,
            Some(label),
        )),
    }
}

fn check_gateway(
    ctx: &mut CheckContext<'_>,
    params: &Parameters,
    section: &GatewaySection,
) -> Result<Vec<CheckOutput>, CheckError> {
    let now = ctx.timestamp();
    let store = ctx.value_store();

    // Both counters must be stored before either error surfaces.
    let infections = section
        .infections
        .map(|v| get_rate(store, INFECTIONS_KEY, now, v as f64, false).map_err(CheckError::from));
    let blocked = section.connections_blocked.map(|v| {
        get_rate(store, CONNECTIONS_BLOCKED_KEY, now, v as f64, false).map_err(CheckError::from)
    });

    let mut outputs = compute_rate(
        infections,
        params.get_levels("infections"),
        "infections_rate",
        "Infections",
    )?;
    outputs.extend(compute_rate(
        blocked,
        params.get_levels("connections_blocked"),
        "connections_blocked_rate",
        "Connections blocked",
    )?);
    Ok(outputs)
}

impl CheckPlugin for McafeeWebgateway {
    fn name(&self) -> &str {
        "mcafee_webgateway"
    }

    fn service_name(&self) -> &str {
        "Web gateway statistics"
    }

    fn ruleset_name(&self) -> Option<&str> {
        Some(RULESET)
    }

    fn discover(&self, sections: &SectionSet) -> anyhow::Result<Vec<Service>> {
        if sections.get_as::<GatewaySection>(SECTION).is_some() {
            Ok(vec![Service::new(None)])
        } else {
            Ok(Vec::new())
        }
    }

    fn check<'a>(
        &'a self,
        ctx: &'a mut CheckContext<'_>,
        _item: Option<&'a str>,
        params: &'a Parameters,
        sections: &'a SectionSet,
    ) -> CheckResults<'a> {
        match sections.get_as::<GatewaySection>(SECTION) {
            Some(section) => into_results(check_gateway(ctx, params, section)),
            None => crate::yield_nothing(),
        }
    }
}
