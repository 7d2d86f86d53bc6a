//! Contract tests for decision payload validation.
//!
//! These exercise the exact boundaries the API documents: field lengths,
//! tag limits, and serde defaults.

use blackbox::handlers::decisions::{
    escape_like, parse_tag_filter, CreateDecisionRequest, UpdateDecisionRequest,
};
use validator::Validate;

fn base_payload() -> serde_json::Value {
    serde_json::json!({
        "title": "Moved ingestion to a queue",
        "decision_made": "All ingestion now flows through a durable queue.",
        "context": "Spiky traffic was overloading the synchronous path.",
        "trade_offs": "Added operational surface and eventual consistency.",
        "biggest_risk": "Queue backlog hiding a downstream outage."
    })
}

fn create(value: serde_json::Value) -> CreateDecisionRequest {
    serde_json::from_value(value).expect("payload should deserialize")
}

#[test]
fn accepts_a_fully_valid_payload() {
    let mut payload = base_payload();
    payload["stakeholders"] = serde_json::json!("Data platform, SRE");
    payload["confidence_level"] = serde_json::json!(8);
    payload["tags"] = serde_json::json!(["infra", "queues"]);
    payload["source"] = serde_json::json!("chrome_extension");

    assert!(create(payload).validate().is_ok());
}

#[test]
fn decision_made_length_nine_rejected_ten_accepted() {
    let mut payload = base_payload();
    payload["decision_made"] = serde_json::json!("123456789");
    assert!(create(payload).validate().is_err());

    let mut payload = base_payload();
    payload["decision_made"] = serde_json::json!("1234567890");
    assert!(create(payload).validate().is_ok());
}

#[test]
fn all_long_fields_share_the_upper_bound() {
    for field in ["decision_made", "context", "trade_offs", "biggest_risk"] {
        let mut payload = base_payload();
        payload[field] = serde_json::json!("x".repeat(5000));
        assert!(create(payload).validate().is_ok(), "{} at 5000 should pass", field);

        let mut payload = base_payload();
        payload[field] = serde_json::json!("x".repeat(5001));
        assert!(create(payload).validate().is_err(), "{} at 5001 should fail", field);
    }
}

#[test]
fn tags_default_to_empty_and_ai_structured_to_false() {
    let request = create(base_payload());
    assert!(request.tags.is_empty());
    assert!(!request.ai_structured);
}

#[test]
fn sixth_tag_is_rejected() {
    let mut payload = base_payload();
    payload["tags"] = serde_json::json!(["a", "b", "c", "d", "e", "f"]);
    assert!(create(payload).validate().is_err());
}

#[test]
fn fifty_one_character_tag_is_rejected() {
    let mut payload = base_payload();
    payload["tags"] = serde_json::json!(["t".repeat(50)]);
    assert!(create(payload).validate().is_ok());

    let mut payload = base_payload();
    payload["tags"] = serde_json::json!(["t".repeat(51)]);
    assert!(create(payload).validate().is_err());
}

#[test]
fn stakeholders_cap_is_500() {
    let mut payload = base_payload();
    payload["stakeholders"] = serde_json::json!("s".repeat(500));
    assert!(create(payload).validate().is_ok());

    let mut payload = base_payload();
    payload["stakeholders"] = serde_json::json!("s".repeat(501));
    assert!(create(payload).validate().is_err());
}

#[test]
fn update_payload_shares_the_same_bounds() {
    let request: UpdateDecisionRequest = serde_json::from_value(serde_json::json!({
        "title": "t",
        "decision_made": "123456789",
        "context": "long enough context",
        "trade_offs": "long enough trade-offs",
        "biggest_risk": "long enough risk"
    }))
    .unwrap();
    assert!(request.validate().is_err());
}

#[test]
fn like_escaping_neutralizes_wildcards() {
    assert_eq!(escape_like("100%"), "100\\%");
    assert_eq!(escape_like("snake_case"), "snake\\_case");
    assert_eq!(escape_like("a\\b%c_d"), "a\\\\b\\%c\\_d");
    assert_eq!(escape_like("ordinary"), "ordinary");
}

#[test]
fn tag_filter_parsing_trims_and_drops_empties() {
    assert_eq!(parse_tag_filter(" infra , queues "), vec!["infra", "queues"]);
    assert!(parse_tag_filter(",,,").is_empty());
}
