use crate::levels::{check_levels, render_float};
use crate::plugins::mcafee_webgateway::{
    GatewaySection, McafeeWebgateway, McafeeWebgatewaySection, INFECTIONS_KEY,
};
use crate::plugins::tsm_drives::TsmDrives;
use crate::plugins::winperf_ts_sessions::{transform_params, WinperfTsSessions};
use crate::rate::{get_average, get_rate, GetRateError};
use crate::registry::{CheckPluginName, PluginRegistry};
use crate::{
    builtin_registry, yield_nothing, CheckContext, CheckError, CheckPlugin, CheckResults,
    RegistryError, SectionPlugin, SectionSet, Service, ValueStore,
};
use chrono::{TimeZone, Utc};
use oxcheck_common::params::Parameters;
use oxcheck_common::types::{string_table, CheckOutput, RawSection, State};
use serde_json::json;

fn raw_sections(name: &str, rows: &[&[&str]]) -> SectionSet {
    let mut sections = SectionSet::new();
    sections.insert(name, crate::Section::new(RawSection::Table(string_table(rows))));
    sections
}

fn run_check(
    plugin: &dyn CheckPlugin,
    store: &mut ValueStore,
    epoch: i64,
    item: Option<&str>,
    params: &Parameters,
    sections: &SectionSet,
) -> Vec<Result<CheckOutput, CheckError>> {
    let now = Utc.timestamp_opt(epoch, 0).unwrap();
    let mut ctx = CheckContext::new("host-01", now, store);
    plugin.check(&mut ctx, item, params, sections).collect()
}

fn states(outputs: &[Result<CheckOutput, CheckError>]) -> Vec<State> {
    outputs
        .iter()
        .filter_map(|o| match o {
            Ok(CheckOutput::Result { state, .. }) => Some(*state),
            _ => None,
        })
        .collect()
}

fn summaries(outputs: &[Result<CheckOutput, CheckError>]) -> Vec<String> {
    outputs
        .iter()
        .filter_map(|o| match o {
            Ok(CheckOutput::Result { summary, .. }) => Some(summary.clone()),
            _ => None,
        })
        .collect()
}

struct Dummy(&'static str);

impl CheckPlugin for Dummy {
    fn name(&self) -> &str {
        self.0
    }

    fn service_name(&self) -> &str {
        "Dummy %s"
    }

    fn discover(&self, _sections: &SectionSet) -> anyhow::Result<Vec<Service>> {
        Ok(Vec::new())
    }

    fn check<'a>(
        &'a self,
        _ctx: &'a mut CheckContext<'_>,
        _item: Option<&'a str>,
        _params: &'a Parameters,
        _sections: &'a SectionSet,
    ) -> CheckResults<'a> {
        yield_nothing()
    }
}

// ---- rate ----

#[test]
fn rate_first_call_initializes() {
    let mut store = ValueStore::new();
    let err = get_rate(&mut store, "k", 0.0, 100.0, false).unwrap_err();
    assert_eq!(err, GetRateError::Initialized("k".into()));
    assert_eq!(store.get("k"), Some(&json!([0.0, 100.0])));
}

#[test]
fn rate_same_timestamp_is_recoverable() {
    let mut store = ValueStore::new();
    let _ = get_rate(&mut store, "k", 7.0, 100.0, false);
    let err = get_rate(&mut store, "k", 7.0, 100.0, false).unwrap_err();
    assert!(matches!(err, GetRateError::NoTimeDifference(_)));
    assert!(CheckError::from(err).is_ignore_results());
}

#[test]
fn rate_steady_state() {
    let mut store = ValueStore::new();
    let _ = get_rate(&mut store, "k", 0.0, 100.0, false);
    assert_eq!(get_rate(&mut store, "k", 10.0, 150.0, false), Ok(5.0));
}

#[test]
fn rate_counter_wrap_with_overflow_raising() {
    let mut store = ValueStore::new();
    let _ = get_rate(&mut store, "k", 0.0, 100.0, true);
    let err = get_rate(&mut store, "k", 10.0, 50.0, true).unwrap_err();
    assert!(matches!(err, GetRateError::Overflow { .. }));
    // the new observation is stored regardless
    assert_eq!(store.get("k"), Some(&json!([10.0, 50.0])));
    assert_eq!(get_rate(&mut store, "k", 20.0, 70.0, true), Ok(2.0));
}

#[test]
fn rate_counter_wrap_without_overflow_raising_clamps() {
    let mut store = ValueStore::new();
    let _ = get_rate(&mut store, "k", 0.0, 100.0, false);
    assert_eq!(get_rate(&mut store, "k", 10.0, 50.0, false), Ok(0.0));
}

#[test]
fn rate_time_going_backwards() {
    let mut store = ValueStore::new();
    let _ = get_rate(&mut store, "k", 100.0, 1.0, false);
    let err = get_rate(&mut store, "k", 90.0, 2.0, false).unwrap_err();
    assert!(matches!(err, GetRateError::TimeAnomaly { .. }));
}

#[test]
fn average_converges_with_half_life() {
    let mut store = ValueStore::new();
    assert_eq!(get_average(&mut store, "avg", 0.0, 10.0, 1.0), 10.0);
    // one half-life later the average is halfway to the new value
    let avg = get_average(&mut store, "avg", 60.0, 20.0, 1.0);
    assert!((avg - 15.0).abs() < 1e-9);
    // no time advance keeps the average
    assert_eq!(get_average(&mut store, "avg", 60.0, 1000.0, 1.0), avg);
}

// ---- levels ----

#[test]
fn check_levels_upper_and_lower() {
    let parts = check_levels(95.0, Some((80.0, 90.0)), None, Some("usage"), render_float, Some("Usage"));
    assert_eq!(
        parts[0],
        CheckOutput::result(State::Crit, "Usage: 95.00 (warn/crit at 80.00/90.00)")
    );
    assert!(matches!(&parts[1], CheckOutput::Metric(m) if m.levels == Some((80.0, 90.0))));

    let parts = check_levels(5.0, None, Some((10.0, 2.0)), None, render_float, None);
    assert_eq!(parts.len(), 1);
    assert_eq!(
        parts[0],
        CheckOutput::result(State::Warn, "5.00 (warn/crit below 10.00/2.00)")
    );

    let parts = check_levels(50.0, Some((80.0, 90.0)), Some((10.0, 2.0)), None, render_float, None);
    assert_eq!(parts[0], CheckOutput::result(State::Ok, "50.00"));
}

// ---- registry ----

#[test]
fn plugin_name_validation() {
    assert!(CheckPluginName::parse("tsm_drives").is_ok());
    assert!(CheckPluginName::parse("a.b.c").is_err());
    assert!(CheckPluginName::parse("Upper").is_err());
    assert!(CheckPluginName::parse("trailing.").is_err());
    assert_eq!(CheckPluginName::parse("if64").unwrap().subcheck(), None);
}

#[test]
fn duplicate_check_plugin_is_rejected() {
    let mut builder = PluginRegistry::builder();
    builder.register_check(Box::new(Dummy("dummy"))).unwrap();
    let err = builder.register_check(Box::new(Dummy("dummy"))).unwrap_err();
    assert!(matches!(err, RegistryError::DuplicateCheckPlugin(name) if name == "dummy"));
}

#[test]
fn duplicate_section_and_transform_are_rejected() {
    let mut builder = PluginRegistry::builder();
    builder.register_section(Box::new(McafeeWebgatewaySection)).unwrap();
    assert!(matches!(
        builder.register_section(Box::new(McafeeWebgatewaySection)),
        Err(RegistryError::DuplicateSection(_))
    ));
    builder.register_transform("r", transform_params).unwrap();
    assert!(matches!(
        builder.register_transform("r", transform_params),
        Err(RegistryError::DuplicateTransform(_))
    ));
}

#[test]
fn invalid_plugin_name_fails_registration() {
    let mut builder = PluginRegistry::builder();
    let err = builder.register_check(Box::new(Dummy("Not-Valid"))).unwrap_err();
    assert!(matches!(err, RegistryError::InvalidPluginName { .. }));
}

#[test]
fn builtin_registry_lookup() {
    let registry = builtin_registry().unwrap();
    assert_eq!(
        registry.plugin_names(),
        vec!["tsm_drives", "winperf_ts_sessions", "mcafee_webgateway"]
    );
    let tsm = registry.get("tsm_drives").unwrap();
    assert!(tsm.has_item());
    assert_eq!(tsm.sections(), ["tsm_drives".to_string()]);
    assert_eq!(registry.get("winperf_ts_sessions").unwrap().ruleset_name(), Some("winperf_ts_sessions"));
    assert!(registry.section("mcafee_webgateway").is_some());
    assert!(registry.section("tsm_drives").is_none());
    assert!(registry.transform("winperf_ts_sessions").is_some());
    assert_eq!(registry.plugins_for_section("mcafee_webgateway").count(), 1);
}

#[test]
fn subcheck_defaults_to_base_section() {
    let plugin = Dummy("netapp_volumes.counters");
    assert_eq!(plugin.sections(), vec!["netapp_volumes".to_string()]);
}

// ---- tsm_drives ----

#[test]
fn tsm_drives_discovers_and_checks() {
    let sections = raw_sections(
        "tsm_drives",
        &[
            &["tsmfarm3", "LIBRARY3", "DRIVE01", "LOADED", "YES", "000782XXXX"],
            &["tsmfarm3", "LIBRARY3", "DRIVE04", "EMPTY", "NO", "000784XXXX"],
            &["default", "GPFSFILE", "GPFSFILE1", "UNKNOWN", "YES", "1"],
            &["default", "GPFSFILE", "SHORT", "UNKNOWN", "YES"],
        ],
    );
    let items: Vec<_> = TsmDrives
        .discover(&sections)
        .unwrap()
        .into_iter()
        .map(|s| s.item.unwrap())
        .collect();
    assert_eq!(
        items,
        vec!["tsmfarm3 / LIBRARY3 / DRIVE01", "tsmfarm3 / LIBRARY3 / DRIVE04", "GPFSFILE / GPFSFILE1"]
    );

    let mut store = ValueStore::new();
    let params = Parameters::new();
    let out = run_check(&TsmDrives, &mut store, 0, Some("tsmfarm3 / LIBRARY3 / DRIVE01"), &params, &sections);
    assert_eq!(states(&out), vec![State::Ok]);
    assert_eq!(summaries(&out), vec!["[000782XXXX] state: LOADED, online: YES"]);

    let out = run_check(&TsmDrives, &mut store, 0, Some("LIBRARY3 / DRIVE04"), &params, &sections);
    assert_eq!(summaries(&out), vec!["[000784XXXX] state: EMPTY, online: NO(!!)"]);
    assert_eq!(states(&out), vec![State::Crit]);

    let out = run_check(&TsmDrives, &mut store, 0, Some("GPFSFILE / SHORT"), &params, &sections);
    assert_eq!(summaries(&out), vec!["state: UNKNOWN(!!), online: YES"]);

    assert!(run_check(&TsmDrives, &mut store, 0, Some("nope"), &params, &sections).is_empty());
}

// ---- winperf_ts_sessions ----

#[test]
fn winperf_ts_sessions_levels_and_swap() {
    let sections = raw_sections(
        "winperf_ts_sessions",
        &[
            &["1385714515.93", "2102"],
            &["2", "20", "rawcount"],
            &["4", "18", "rawcount"],
            &["6", "2", "rawcount"],
        ],
    );
    assert_eq!(WinperfTsSessions.discover(&sections).unwrap(), vec![Service::new(None)]);

    let params = Parameters::from_value(json!({"active": [15, 25]})).unwrap();
    let mut store = ValueStore::new();
    let out = run_check(&WinperfTsSessions, &mut store, 0, None, &params, &sections);
    assert_eq!(states(&out), vec![State::Warn]);
    assert_eq!(summaries(&out), vec!["18 Active(!), 2 Inactive"]);
    assert_eq!(out.len(), 3);

    // newer ordering: active, inactive, total
    let swapped = raw_sections(
        "winperf_ts_sessions",
        &[&["0", "2102"], &["2", "18"], &["4", "2"], &["6", "20"]],
    );
    let out = run_check(&WinperfTsSessions, &mut store, 0, None, &Parameters::new(), &swapped);
    assert_eq!(summaries(&out), vec!["18 Active, 2 Inactive"]);
}

#[test]
fn winperf_ts_sessions_levels_are_warn_then_crit() {
    let sections = raw_sections(
        "winperf_ts_sessions",
        &[&["0", "2102"], &["2", "20"], &["4", "18"], &["6", "2"]],
    );
    let mut store = ValueStore::new();
    let check = |store: &mut ValueStore, levels: serde_json::Value| {
        let params = Parameters::from_value(levels).unwrap();
        let out = run_check(&WinperfTsSessions, store, 0, None, &params, &sections);
        (states(&out)[0], summaries(&out)[0].clone())
    };

    assert_eq!(
        check(&mut store, json!({"active": [10, 15]})),
        (State::Crit, "18 Active(!!), 2 Inactive".to_string())
    );
    assert_eq!(
        check(&mut store, json!({"active": [18, 25]})),
        (State::Ok, "18 Active, 2 Inactive".to_string())
    );
    assert_eq!(
        check(&mut store, json!({"active": [20, 30], "inactive": [1, 5]})),
        (State::Warn, "18 Active, 2 Inactive(!)".to_string())
    );
}

#[test]
fn winperf_ts_sessions_without_counters() {
    let sections = raw_sections("winperf_ts_sessions", &[&["1385714515.93", "2102"]]);
    assert!(WinperfTsSessions.discover(&sections).unwrap().is_empty());
    let mut store = ValueStore::new();
    let out = run_check(&WinperfTsSessions, &mut store, 0, None, &Parameters::new(), &sections);
    assert_eq!(states(&out), vec![State::Unknown]);
}

#[test]
fn winperf_ts_sessions_garbage_counter_is_an_error() {
    let sections = raw_sections(
        "winperf_ts_sessions",
        &[&["0", "2102"], &["2", "x"], &["4", "2"], &["6", "20"]],
    );
    let mut store = ValueStore::new();
    let out = run_check(&WinperfTsSessions, &mut store, 0, None, &Parameters::new(), &sections);
    assert!(matches!(out.as_slice(), [Err(CheckError::Other(_))]));
}

#[test]
fn winperf_transform_converts_positional_levels() {
    let mut value = json!([[10, 20], null]);
    let params = transform_params(&mut value).unwrap();
    assert_eq!(params, Parameters::from_value(json!({"active": [10, 20]})).unwrap());
    assert!(transform_params(&mut json!("nonsense")).is_err());
    assert!(transform_params(&mut json!([[1, 2], ["a", 3]])).is_err());
}

// ---- mcafee_webgateway ----

#[test]
fn mcafee_parse() {
    let raw = RawSection::Table(string_table(&[&["10", "abc"]]));
    let section = McafeeWebgatewaySection.parse(&raw).unwrap().unwrap();
    assert_eq!(
        section.downcast_ref::<GatewaySection>(),
        Some(&GatewaySection { infections: Some(10), connections_blocked: None })
    );
    assert!(McafeeWebgatewaySection.parse(&RawSection::Table(vec![])).unwrap().is_none());
}

#[test]
fn mcafee_rates_across_cycles() {
    let section = |infections, blocked| {
        let mut sections = SectionSet::new();
        sections.insert(
            "mcafee_webgateway",
            crate::Section::new(GatewaySection {
                infections: Some(infections),
                connections_blocked: Some(blocked),
            }),
        );
        sections
    };
    let params = Parameters::from_value(json!({"infections": [1.0, 5.0]})).unwrap();
    let mut store = ValueStore::new();

    let first = run_check(&McafeeWebgateway, &mut store, 0, None, &params, &section(100, 0));
    assert!(matches!(first.as_slice(), [Err(e)] if e.is_ignore_results()));
    // both counters were initialized in the first cycle
    assert_eq!(store.len(), 2);
    assert!(store.contains_key(INFECTIONS_KEY));

    let second = run_check(&McafeeWebgateway, &mut store, 60, None, &params, &section(220, 60));
    assert_eq!(states(&second), vec![State::Warn, State::Ok]);
    assert_eq!(
        summaries(&second),
        vec![
            "Infections: 2.00/s (warn/crit at 1.00/s/5.00/s)".to_string(),
            "Connections blocked: 1.00/s".to_string(),
        ]
    );
}
