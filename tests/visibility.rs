//! Integration tests for visibility and enablement after value changes.

#[allow(dead_code)]
mod helpers;

use form_engine::{EngineConfig, FormEngine};
use serde_json::json;

use helpers::intake_engine;

const COMPANY: &str = r#"{ "sections": [
    { "title": "Main", "fields": [{ "id": "kind", "type": "select", "options": ["person", "company"] }] },
    { "title": "Company", "conditions": [{ "fieldId": "kind", "kind": "equals", "value": "company" }],
      "fields": [{ "id": "orgNo", "name": "Org No", "required": true }],
      "subsections": [{ "title": "Board", "fields": [{ "id": "chair" }] }] },
    { "title": "Hidden Only", "fields": [
      { "id": "secret", "conditions": [{ "fieldId": "kind", "kind": "hasValue" }] }
    ] }
] }"#;

#[test]
fn unresolvable_reference_fails_open() {
    let engine = intake_engine();
    let note = engine.control("reviewNote").expect("review note renders without a step");
    assert!(note.visible);
    assert!(note.enabled());
}

#[test]
fn hiding_a_field_disables_and_clears_it() {
    let mut engine = intake_engine();
    assert!(!engine.control("escalation").expect("exists").visible);

    let changes = engine.set_value("priority", json!("High")).expect("priority exists");
    let shown = changes.control("escalation").expect("escalation change reported");
    assert!(shown.visible && shown.enabled);

    engine.set_value("escalation", json!("call the manager")).expect("exists");
    let changes = engine.set_value("priority", json!("Low")).expect("exists");
    let hidden = changes.control("escalation").expect("escalation change reported");
    assert!(!hidden.visible);
    assert!(!hidden.enabled);
    assert!(hidden.value_changed);
    assert_eq!(engine.value("escalation"), Some(&json!(null)));
    assert!(changes.control("priority").is_none(), "requested change is not echoed");
}

#[test]
fn template_disabled_control_keeps_its_value() {
    let engine = intake_engine();
    let urgent = engine.control("urgent").expect("exists");
    assert!(urgent.visible);
    assert!(urgent.disabled);
    assert_eq!(urgent.value, json!(false));
}

#[test]
fn required_only_counts_when_visible() {
    let mut engine = intake_engine();
    engine.set_value("contacts_1_name", json!("Ann")).expect("exists");
    let ids: Vec<String> = engine.validate().into_iter().map(|v| v.control_id).collect();
    assert_eq!(ids, vec!["status"], "hidden close reason is not required yet");

    engine.set_value("status", json!("3")).expect("exists");
    let ids: Vec<String> = engine.validate().into_iter().map(|v| v.control_id).collect();
    assert_eq!(ids, vec!["closeReason"]);
}

#[test]
fn group_visibility_follows_conditions_and_descendants() {
    let mut engine = FormEngine::from_json(COMPANY, EngineConfig::default());
    assert!(engine.is_group_visible("main"));
    assert!(!engine.is_group_visible("company"));
    assert!(!engine.is_group_visible("board"), "children inherit a hidden parent");
    assert!(!engine.is_group_visible("hidden_only"), "no visible field inside");
    assert!(engine.control("chair").expect("exists").disabled);
    assert!(engine.validate().is_empty());

    let changes = engine.set_value("kind", json!("company")).expect("exists");
    assert_eq!(changes.group("company").map(|g| g.visible), Some(true));
    assert_eq!(changes.group("board").map(|g| g.visible), Some(true));
    assert_eq!(changes.group("hidden_only").map(|g| g.visible), Some(true));
    assert_eq!(engine.validate()[0].label, "Org No");

    engine.set_value("orgNo", json!("991")).expect("exists");
    engine.set_value("kind", json!("person")).expect("exists");
    assert!(!engine.is_group_visible("company"));
    assert_eq!(engine.value("orgNo"), Some(&json!(null)));
}

#[test]
fn cascading_clears_settle() {
    let json = r#"{ "sections": [{ "title": "Chain", "fields": [
        { "id": "a" },
        { "id": "b", "conditions": [{ "fieldId": "a", "kind": "hasValue" }] },
        { "id": "c", "conditions": [{ "fieldId": "b", "kind": "hasValue" }] }
    ] }] }"#;
    let mut engine = FormEngine::from_json(json, EngineConfig::default());
    engine.set_value("a", json!("x")).expect("exists");
    engine.set_value("b", json!("y")).expect("exists");
    engine.set_value("c", json!("z")).expect("exists");

    let changes = engine.set_value("a", json!("")).expect("exists");
    assert_eq!(engine.value("b"), Some(&json!(null)));
    assert_eq!(engine.value("c"), Some(&json!(null)));
    assert!(!engine.control("c").expect("exists").visible);
    assert!(changes.control("c").is_some_and(|c| c.value_changed));
}

#[test]
fn or_combinator_and_multiselect_membership() {
    let json = r#"{ "sections": [{ "title": "Tags", "fields": [
        { "id": "tags", "type": "multiselect", "options": ["red", "blue", "green"] },
        { "id": "size" },
        { "id": "note", "conditions": [
            { "fieldId": "tags", "kind": "equals", "value": "blue" },
            { "fieldId": "size", "kind": "equals", "value": 10, "combinator": "or" }
        ] }
    ] }] }"#;
    let mut engine = FormEngine::from_json(json, EngineConfig::default());
    assert_eq!(engine.value("tags"), Some(&json!([])));
    assert!(!engine.control("note").expect("exists").visible);

    engine.set_value("tags", json!(["red", "blue"])).expect("exists");
    assert!(engine.control("note").expect("exists").visible);

    engine.set_value("tags", json!([])).expect("exists");
    engine.set_value("size", json!("10.0")).expect("exists");
    assert!(engine.control("note").expect("exists").visible);
}

#[test]
fn unknown_control_is_an_error() {
    let mut engine = intake_engine();
    let err = engine.set_value("ghost", json!(1)).expect_err("unknown control");
    assert_eq!(err.code(), "C001");
    assert!(engine.touch("ghost").is_err());
    engine.touch("status").expect("status exists");
    assert!(engine.control("status").expect("exists").touched);
}
