//! Integration tests for option sources and dependent dropdowns.

#[allow(dead_code)]
mod helpers;

use form_engine::{EngineConfig, EngineError, FormEngine};
use serde_json::json;

use helpers::{LOCATION, StaticOptions, intake_engine, location_config, location_sources, status_rows};

fn option_values(engine: &FormEngine, control_id: &str) -> Vec<serde_json::Value> {
    engine
        .options_for(control_id)
        .unwrap_or_default()
        .iter()
        .map(|o| o.value.clone())
        .collect()
}

#[test]
fn static_options_map_value_and_label() {
    let engine = intake_engine();
    let decision = engine.options_for("decision").expect("decision has options");
    assert_eq!(decision.len(), 2);
    assert_eq!(decision[0].value, json!("A"));
    assert_eq!(decision[0].label, "Approve");
    assert!(engine.option_state("decision").expect("bound").loaded);
}

#[test]
fn async_status_reconciles_numeric_value() {
    let mut engine = intake_engine();
    engine.set_value("status", json!(3)).expect("status exists");
    assert!(engine.control("closeReason").expect("exists").visible);

    let requests = engine.pending_option_requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].source, "status");
    assert_eq!(requests[0].module_hints, vec!["crm".to_string()]);
    assert!(engine.options_for("status").expect("bound").is_empty(), "no options while pending");

    let changes = engine.receive_options(requests[0].generation, "status", Ok(status_rows()));
    assert_eq!(engine.value("status"), Some(&json!("3")));
    assert!(changes.control("status").is_some_and(|c| c.value_changed));
    assert_eq!(engine.options_for("status").map(|o| o.len()), Some(3));
    assert_eq!(engine.options_for("status").expect("loaded")[2].label, "Closed");
}

#[test]
fn responses_after_teardown_are_discarded() {
    let mut engine = intake_engine();
    let request = engine.pending_option_requests().remove(0);
    engine.set_step(Some("review"));

    let changes = engine.receive_options(request.generation, "status", Ok(status_rows()));
    assert!(changes.is_empty());
    assert!(engine.options_for("status").expect("still rendered").is_empty());

    let fresh = engine.pending_option_requests();
    assert_eq!(fresh.len(), 1);
    assert!(fresh[0].generation > request.generation);
}

#[test]
fn failed_fetch_shows_no_options() {
    let mut engine = intake_engine();
    let request = engine.pending_option_requests().remove(0);
    let failure = Err(EngineError::collaborator("options", "503"));
    engine.receive_options(request.generation, "status", failure);
    let state = engine.option_state("status").expect("bound");
    assert!(state.loaded);
    assert!(state.available.is_empty());
}

#[test]
fn resolve_options_fetches_each_source_once() {
    let mut engine = FormEngine::from_json(LOCATION, location_config());
    let mut sources = location_sources();
    engine.resolve_options(&mut sources);
    assert_eq!(sources.calls, vec!["cities", "countries", "regions"]);

    engine.resolve_options(&mut sources);
    assert_eq!(sources.calls.len(), 3, "cached sources are not fetched again");
}

#[test]
fn empty_parent_locks_child() {
    let mut engine = FormEngine::from_json(LOCATION, location_config());
    engine.resolve_options(&mut location_sources());

    let region = engine.control("region").expect("exists");
    assert!(region.dependency_locked);
    assert!(region.disabled);
    assert!(option_values(&engine, "region").is_empty());
    assert_eq!(option_values(&engine, "country").len(), 2);
}

#[test]
fn child_options_filter_by_link_property() {
    let mut engine = FormEngine::from_json(LOCATION, location_config());
    engine.resolve_options(&mut location_sources());

    let changes = engine.set_value("country", json!("5")).expect("exists");
    assert!(changes.control("region").is_some_and(|c| c.enabled));
    assert_eq!(option_values(&engine, "region"), vec![json!("r1")]);

    engine.set_value("country", json!("6")).expect("exists");
    assert_eq!(option_values(&engine, "region"), vec![json!("r1")], "array link matches any member");

    engine.set_value("country", json!(7)).expect("exists");
    assert_eq!(option_values(&engine, "region"), vec![json!("r2")]);
}

#[test]
fn parent_change_clears_invalid_children_down_the_chain() {
    let mut engine = FormEngine::from_json(LOCATION, location_config());
    engine.resolve_options(&mut location_sources());
    engine.set_value("country", json!("5")).expect("exists");
    engine.set_value("region", json!("r1")).expect("exists");
    engine.set_value("city", json!("c1")).expect("exists");
    assert_eq!(option_values(&engine, "city"), vec![json!("c1")]);

    let changes = engine.set_value("country", json!("7")).expect("exists");
    assert_eq!(engine.value("region"), Some(&json!(null)));
    assert_eq!(engine.value("city"), Some(&json!(null)));
    assert!(changes.control("region").is_some_and(|c| c.value_changed));
    let city = changes.control("city").expect("city change reported");
    assert!(city.value_changed);
    assert!(!city.enabled);
}

#[test]
fn persisted_child_value_survives_until_options_arrive() {
    let mut engine = FormEngine::from_json(LOCATION, location_config());
    engine.load_document(Some(r#"{ "country": "5", "region": "r1" }"#));
    assert_eq!(engine.value("region"), Some(&json!("r1")));

    engine.resolve_options(&mut location_sources());
    assert_eq!(engine.value("region"), Some(&json!("r1")));
    assert!(engine.control("region").expect("exists").enabled());
}

#[test]
fn yes_no_set_is_voided_for_wider_fields() {
    let json = r#"{ "sections": [{ "title": "Flags", "fields": [
        { "id": "flags", "type": "multiselect", "dataSource": "flags", "maxOptions": 4 }
    ] }] }"#;
    let mut engine = FormEngine::from_json(json, EngineConfig::default());
    let mut sources = StaticOptions::default().with(
        "flags",
        vec![json!({ "id": "Y", "name": "Yes" }), json!({ "id": "N", "name": "No" })],
    );
    engine.resolve_options(&mut sources);
    assert!(option_values(&engine, "flags").is_empty());
}
