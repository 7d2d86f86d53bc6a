//! Contract tests for the export payload shape.

use blackbox::handlers::export::build_export;
use blackbox::models::{AiGeneration, Decision, UserPreferences};
use chrono::{NaiveDate, NaiveDateTime};
use uuid::Uuid;

fn at(day: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 6, day)
        .unwrap()
        .and_hms_opt(9, 30, 0)
        .unwrap()
}

fn decision(user_id: Uuid, title: &str, day: u32) -> Decision {
    Decision {
        id: Uuid::new_v4(),
        user_id,
        title: title.to_string(),
        decision_made: "decision body".to_string(),
        context: "context body".to_string(),
        trade_offs: "trade-offs body".to_string(),
        biggest_risk: "risk body".to_string(),
        stakeholders: Some("the team".to_string()),
        confidence_level: Some(6),
        tags: vec!["infra".to_string()],
        source: "web".to_string(),
        is_locked: true,
        locked_at: Some(at(day)),
        original_input: Some("raw notes".to_string()),
        ai_structured: true,
        created_at: at(day),
        updated_at: at(day),
    }
}

#[test]
fn export_contains_all_sections_and_consistent_counts() {
    let user_id = Uuid::new_v4();

    let decisions = vec![
        decision(user_id, "one", 1),
        decision(user_id, "two", 2),
        decision(user_id, "three", 3),
    ];
    let preferences = Some(UserPreferences {
        user_id,
        current_role: Some("Staff Engineer".to_string()),
        updated_at: at(3),
    });
    let generations = vec![AiGeneration {
        id: Uuid::new_v4(),
        user_id,
        generation_type: "structure".to_string(),
        input_tokens: None,
        output_tokens: None,
        cost_cents: None,
        created_at: at(1),
    }];

    let payload = build_export(decisions, preferences, generations, at(4));
    let json = serde_json::to_value(&payload).unwrap();

    // All documented sections are present.
    for section in ["decisions", "preferences", "ai_generations", "metadata"] {
        assert!(json.get(section).is_some(), "missing section {}", section);
    }

    // metadata.total_decisions mirrors the decision array length.
    assert_eq!(
        json["metadata"]["total_decisions"].as_u64().unwrap() as usize,
        json["decisions"].as_array().unwrap().len()
    );

    // The usage log keeps its null token/cost columns in the dump.
    let generation = &json["ai_generations"][0];
    assert!(generation["input_tokens"].is_null());
    assert!(generation["output_tokens"].is_null());
    assert!(generation["cost_cents"].is_null());

    // Round-trips as valid JSON text.
    let text = serde_json::to_string(&payload).unwrap();
    let reparsed: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(reparsed["metadata"]["total_decisions"], 3);
}

#[test]
fn empty_account_exports_cleanly() {
    let payload = build_export(vec![], None, vec![], at(1));
    let json = serde_json::to_value(&payload).unwrap();

    assert_eq!(json["metadata"]["total_decisions"], 0);
    assert!(json["preferences"].is_null());
    assert_eq!(json["decisions"].as_array().unwrap().len(), 0);
}
