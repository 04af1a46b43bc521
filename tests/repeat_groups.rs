//! Integration tests for repeat groups: bounds, add/remove, contiguous reindexing.

#[allow(dead_code)]
mod helpers;

use form_engine::{EngineConfig, FormEngine};
use serde_json::json;

use helpers::intake_engine;

fn contact_ids(engine: &FormEngine) -> Vec<String> {
    engine
        .controls()
        .ids()
        .iter()
        .filter(|id| id.starts_with("contacts_") && id.ends_with("_name"))
        .cloned()
        .collect()
}

#[test]
fn default_count_renders_one_instance() {
    let engine = intake_engine();
    assert_eq!(contact_ids(&engine), vec!["contacts_1_name"]);

    let status = &engine.repeat_groups()[0];
    assert_eq!(status.key, "contacts");
    assert_eq!((status.count, status.min, status.max), (1, 1, 3));
    assert!(status.can_add);
    assert!(!status.can_remove);
}

#[test]
fn instances_carry_labels() {
    let mut engine = intake_engine();
    engine.add_instance("contacts");
    let people = engine
        .tree()
        .all_groups()
        .into_iter()
        .find(|g| g.key == "contacts")
        .expect("contacts group should render");
    let labels: Vec<_> = people.instances.iter().map(|i| i.label.as_deref()).collect();
    assert_eq!(labels, vec![Some("Contact 1"), Some("Contact 2")]);
}

#[test]
fn add_then_save_is_blocked_by_empty_required_instance() {
    let mut engine = intake_engine();
    engine.set_value("status", json!("1")).expect("status exists");
    engine.set_value("contacts_1_name", json!("Ann")).expect("first contact exists");
    assert!(engine.validate().is_empty());

    assert!(engine.add_instance("contacts"));
    assert_eq!(contact_ids(&engine), vec!["contacts_1_name", "contacts_2_name"]);
    assert_eq!(engine.value("contacts_1_name"), Some(&json!("Ann")), "existing values survive");
    assert_eq!(engine.value("contacts_2_name"), Some(&json!(null)), "new instance starts empty");

    let err = engine.prepare_save().expect_err("empty required contact blocks save");
    assert_eq!(err.code(), "S001");
    let violations = engine.validate();
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].control_id, "contacts_2_name");
    assert_eq!(violations[0].label, "Name");
}

#[test]
fn add_stops_at_max() {
    let mut engine = intake_engine();
    assert!(engine.add_instance("contacts"));
    assert!(engine.add_instance("contacts"));
    assert!(!engine.add_instance("contacts"));
    assert_eq!(contact_ids(&engine).len(), 3);
    assert!(!engine.add_instance("nope"));
}

#[test]
fn remove_shifts_later_instances_down() {
    let mut engine = intake_engine();
    engine.add_instance("contacts");
    engine.add_instance("contacts");
    for (i, name) in ["Ann", "Bob", "Cid"].iter().enumerate() {
        engine
            .set_value(&format!("contacts_{}_name", i + 1), json!(name))
            .expect("instance exists");
    }
    engine.set_value("contacts_3_email", json!("cid@example.test")).expect("exists");

    assert!(engine.remove_instance("contacts", 1));
    assert_eq!(contact_ids(&engine), vec!["contacts_1_name", "contacts_2_name"]);
    assert_eq!(engine.value("contacts_1_name"), Some(&json!("Bob")));
    assert_eq!(engine.value("contacts_2_name"), Some(&json!("Cid")));
    assert_eq!(engine.value("contacts_2_email"), Some(&json!("cid@example.test")));
    assert!(!engine.controls().contains("contacts_3_name"));
}

#[test]
fn remove_respects_min_and_range() {
    let mut engine = intake_engine();
    assert!(!engine.remove_instance("contacts", 1), "already at min");
    engine.add_instance("contacts");
    assert!(!engine.remove_instance("contacts", 0));
    assert!(!engine.remove_instance("contacts", 3));
    assert!(!engine.remove_instance("unknown", 1));
    assert!(engine.remove_instance("contacts", 2));
    assert_eq!(contact_ids(&engine).len(), 1);
}

#[test]
fn count_inferred_from_persisted_document() {
    let mut engine = intake_engine();
    engine.load_document(Some(
        r#"{ "contacts_1_name": "A", "contacts_2_name": "B", "contacts_3_name": "C" }"#,
    ));
    assert_eq!(contact_ids(&engine).len(), 3);
    assert_eq!(engine.value("contacts_3_name"), Some(&json!("C")));
}

#[test]
fn removed_slot_is_dropped_from_merged_document() {
    let mut engine = intake_engine();
    engine.load_document(Some(
        r#"{ "status": "1", "contacts_1_name": "A", "contacts_2_name": "B", "elsewhere": 1 }"#,
    ));
    assert!(engine.remove_instance("contacts", 1));

    let merged = engine.merged_document();
    assert_eq!(merged.get("contacts_1_name"), Some(&json!("B")));
    assert!(merged.get("contacts_2_name").is_none());
    assert_eq!(merged.get("elsewhere"), Some(&json!(1)));
}

#[test]
fn nested_repeat_counts_follow_their_outer_instance() {
    let json = r#"{ "sections": [{ "title": "Orders", "repeat": { "enabled": true, "min": 1, "max": 3, "defaultCount": 2 },
        "fields": [{ "id": "ref" }],
        "subsections": [{ "title": "Lines", "repeat": { "enabled": true, "min": 1, "max": 5 },
            "fields": [{ "id": "sku" }] }] }] }"#;
    let mut engine = FormEngine::from_json(json, EngineConfig::default());
    assert!(engine.add_instance("orders_2_lines"));
    engine.set_value("orders_2_lines_2_sku", json!("B-2")).expect("nested instance exists");

    assert!(engine.remove_instance("orders", 1));
    let ids: Vec<&str> = engine.controls().ids().iter().map(String::as_str).collect();
    assert_eq!(ids, vec!["orders_1_ref", "orders_1_lines_1_sku", "orders_1_lines_2_sku"]);
    assert_eq!(engine.value("orders_1_lines_2_sku"), Some(&json!("B-2")));
}

#[test]
fn removing_outer_instance_drops_its_persisted_nested_rows() {
    let json = r#"{ "sections": [{ "title": "Orders", "repeat": { "enabled": true, "min": 1, "max": 3 },
        "fields": [{ "id": "ref" }],
        "subsections": [{ "title": "Lines", "repeat": { "enabled": true, "min": 1, "max": 5 },
            "fields": [{ "id": "sku" }] }] }] }"#;
    let mut engine = FormEngine::from_json(json, EngineConfig::default());
    engine.load_document(Some(
        r#"{ "orders_1_ref": "A", "orders_1_lines_1_sku": "a1", "orders_1_lines_2_sku": "a2",
             "orders_1_lines_3_sku": "a3", "orders_2_ref": "B", "orders_2_lines_1_sku": "b1" }"#,
    ));
    assert!(engine.remove_instance("orders", 1));

    let merged = engine.merged_document();
    insta::assert_json_snapshot!(merged, @r#"
    {
      "orders_1_lines_1_sku": "b1",
      "orders_1_ref": "B"
    }
    "#);

    let mut reloaded = FormEngine::from_json(json, EngineConfig::default());
    let document = serde_json::to_string(&merged).expect("document serializes");
    reloaded.load_document(Some(&document));
    let ids: Vec<&str> = reloaded.controls().ids().iter().map(String::as_str).collect();
    assert_eq!(ids, vec!["orders_1_ref", "orders_1_lines_1_sku"]);
}
