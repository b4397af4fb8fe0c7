use crate::params::{LegacyParameters, Parameters};
use crate::types::{
    service_description, string_table, AutocheckEntry, CheckOutput, RawSection, ServiceId, State,
};
use serde_json::json;

fn params(value: serde_json::Value) -> Parameters {
    Parameters::from_value(value).unwrap()
}

#[test]
fn state_orders_by_ordinal() {
    let mut states = vec![State::Unknown, State::Ok, State::Crit, State::Warn];
    states.sort();
    assert_eq!(states, vec![State::Ok, State::Warn, State::Crit, State::Unknown]);
    assert_eq!(State::from_ordinal(2), Some(State::Crit));
    assert_eq!(State::from_ordinal(4), None);
    assert_eq!(State::Crit.ordinal(), 2);
}

#[test]
fn state_parses_long_and_short_names() {
    assert_eq!("critical".parse::<State>().unwrap(), State::Crit);
    assert_eq!("WARNING".parse::<State>().unwrap(), State::Warn);
    assert!("bogus".parse::<State>().is_err());
}

#[test]
fn deep_merge_layers_defaults_rules_and_autochecks() {
    let mut resolved = params(json!({"levels": [1, 2]}));
    resolved.merge(&params(json!({"levels": [3, 4], "x": 1})));
    resolved.merge(&params(json!({"x": 2})));
    assert_eq!(resolved, params(json!({"levels": [3, 4], "x": 2})));
}

#[test]
fn deep_merge_recurses_into_nested_mappings_only() {
    let mut base = params(json!({"nested": {"a": 1, "b": 2}, "list": [1, 2, 3]}));
    base.merge(&params(json!({"nested": {"b": 20, "c": 30}, "list": [9]})));
    assert_eq!(
        base,
        params(json!({"nested": {"a": 1, "b": 20, "c": 30}, "list": [9]}))
    );
}

#[test]
fn merging_non_mapping_over_mapping_replaces_it() {
    let mut base = params(json!({"levels": {"upper": [1, 2]}}));
    base.merge(&params(json!({"levels": [5, 6]})));
    assert_eq!(base.get_levels("levels"), Some((5.0, 6.0)));
}

#[test]
fn legacy_parameters_deserialize_either_form() {
    let structured: LegacyParameters = serde_json::from_value(json!({"active": [1, 2]})).unwrap();
    assert!(matches!(structured, LegacyParameters::Structured(_)));

    let positional: LegacyParameters = serde_json::from_value(json!([10, 20])).unwrap();
    assert_eq!(positional, LegacyParameters::Positional(json!([10, 20])));

    let null: LegacyParameters = serde_json::from_value(json!(null)).unwrap();
    assert!(null.is_empty());
}

#[test]
fn autocheck_entry_defaults_missing_fields() {
    let entry: AutocheckEntry = serde_json::from_value(json!({
        "check_plugin_name": "tsm_drives",
        "item": "LIB / D1",
    }))
    .unwrap();
    assert!(entry.parameters.is_empty());
    assert!(entry.service_labels.is_empty());
    assert_eq!(entry.id(), ServiceId::new("tsm_drives", Some("LIB / D1")));
    assert_eq!(entry.id().to_string(), "tsm_drives/LIB / D1");
}

#[test]
fn raw_section_emptiness() {
    assert!(RawSection::Table(vec![]).is_empty());
    assert!(RawSection::Multi(vec![vec![], vec![]]).is_empty());
    let raw = RawSection::Multi(vec![string_table(&[&["1", "2"]]), vec![]]);
    assert!(!raw.is_empty());
    assert_eq!(raw.table()[0][1], "2");
}

#[test]
fn legacy_tuple_expands_into_result_and_metrics() {
    let parts = CheckOutput::from_legacy(State::Warn, "2 Active", &[("active", 2.0)]);
    assert_eq!(parts.len(), 2);
    assert_eq!(parts[0], CheckOutput::result(State::Warn, "2 Active"));
    assert_eq!(parts[1], CheckOutput::metric("active", 2.0));
}

#[test]
fn service_description_only_replaces_first_placeholder() {
    assert_eq!(service_description("Disk %s", Some("C:")), "Disk C:");
    assert_eq!(service_description("Disk %s %s", Some("C:")), "Disk C: %s");
}
