//! End-to-end compilation of JSON segmentation payloads.

use segment_compiler::{compile, SegmentationPayload};
use segment_core::SegmentError;
use serde_json::json;

fn compile_json(value: serde_json::Value) -> Result<String, SegmentError> {
    let payload: SegmentationPayload = serde_json::from_value(value)?;
    compile(&payload)
}

#[test]
fn count_only_base_conditions() {
    let sql = compile_json(json!({
        "store_id": "s1",
        "base_conditions": {
            "logic": "AND",
            "conditions": [{ "field": "total_spend", "operator": "greater_than", "value": 25 }]
        },
        "return_count_only": true
    }))
    .unwrap();
    assert_eq!(
        sql,
        "SELECT count(*) as total FROM subscribers s WHERE s.store_id = 's1' AND `total_spend` > 25"
    );
}

#[test]
fn excluded_event_filter() {
    let sql = compile_json(json!({
        "store_id": "s1",
        "event_filters": [{
            "table": "events",
            "exclude": true,
            "timeframe": { "relative": "last_7_days" },
            "conditions": {
                "logic": "AND",
                "conditions": [{ "field": "event_type", "operator": "equals", "value": "purchase" }]
            }
        }],
        "return_count_only": true
    }))
    .unwrap();
    assert_eq!(
        sql,
        "SELECT count(*) as total FROM subscribers s WHERE s.store_id = 's1' \
         AND s.id NOT IN (SELECT subscriber_id FROM `events` WHERE store_id = 's1' \
         AND timestamp >= now() - toIntervalDay(7) AND `event_type` = 'purchase')"
    );
}

#[test]
fn email_engagement_with_having() {
    let sql = compile_json(json!({
        "store_id": "store-1",
        "name": "Email Engagement Segmentation",
        "base_conditions": {
            "logic": "AND",
            "conditions": [
                { "field": "is_email_optin", "operator": "equals", "value": 1 },
                { "field": "order_count", "operator": "greater_equal", "value": 2 }
            ]
        },
        "event_filters": [{
            "table": "analytics",
            "timeframe": { "relative": "last_30_days" },
            "conditions": {
                "logic": "AND",
                "conditions": [
                    { "field": "channel", "operator": "equals", "value": "email" },
                    { "field": "event_type", "operator": "equals", "value": "opened" }
                ]
            },
            "aggregation": {
                "type": "count",
                "having": { "field": "count", "operator": "greater_than", "value": 3 }
            }
        }],
        "limit": 30,
        "return_count_only": false
    }))
    .unwrap();
    assert_eq!(
        sql,
        "SELECT * FROM subscribers s WHERE s.store_id = 'store-1' \
         AND `is_email_optin` = 1 AND `order_count` >= 2 \
         AND s.id IN (SELECT subscriber_id FROM `analytics` WHERE store_id = 'store-1' \
         AND timestamp >= now() - toIntervalDay(30) \
         AND `channel` = 'email' AND `event_type` = 'opened' \
         GROUP BY subscriber_id HAVING count(*) > 3) \
         ORDER BY s.updated_at DESC LIMIT 30"
    );
}

#[test]
fn event_filters_are_anded_in_order() {
    let sql = compile_json(json!({
        "store_id": "store-1",
        "event_filters": [
            { "table": "pixel_events", "conditions": { "conditions": [
                { "field": "event_type", "operator": "equals", "value": "add_to_cart" }
            ]}},
            { "table": "pixel_events", "exclude": true, "conditions": { "conditions": [
                { "field": "event_type", "operator": "equals", "value": "purchase" }
            ]}}
        ]
    }))
    .unwrap();
    let include = sql.find("s.id IN (").unwrap();
    let exclude = sql.find("s.id NOT IN (").unwrap();
    assert!(include < exclude);
    assert_eq!(sql.matches("SELECT subscriber_id").count(), 2);
}

#[test]
fn list_and_array_operators() {
    let sql = compile_json(json!({
        "store_id": "store-1",
        "base_conditions": {
            "logic": "AND",
            "conditions": [
                { "field": "country", "operator": "in", "value": ["Austria", "Belgium"] },
                { "field": "tags", "operator": "has_any", "value": ["vip", "high-value"] },
                { "field": "created_at", "operator": "greater_than", "value": "2025-06-18" }
            ]
        },
        "limit": 50
    }))
    .unwrap();
    assert!(sql.contains(
        "`country` IN ('Austria', 'Belgium') AND hasAny(`tags`, ['vip', 'high-value']) \
         AND `created_at` > '2025-06-18'"
    ));
}

#[test]
fn compilation_is_deterministic() {
    let payload = json!({
        "store_id": "store-1",
        "base_conditions": {
            "logic": "OR",
            "conditions": [
                { "field": "city", "operator": "equals", "value": "Paris" },
                { "field": "city", "operator": "equals", "value": "Lyon" }
            ],
            "groups": [{ "logic": "AND", "conditions": [
                { "field": "order_count", "operator": "between", "value": 1, "value2": 5 }
            ]}]
        },
        "event_filters": [{
            "table": "pixel_events",
            "timeframe": { "start": "2025-01-01", "end": "2025-03-31" },
            "aggregation": { "type": "sum", "field": "revenue",
                "having": { "field": "sum", "operator": "greater_than", "value": 99.5 } }
        }],
        "limit": 10,
        "offset": 20
    });
    let first = compile_json(payload.clone()).unwrap();
    let second = compile_json(payload).unwrap();
    assert_eq!(first, second);
    assert!(first.contains("HAVING sum(`revenue`) > 99.5"));
}

#[test]
fn count_only_ignores_pagination() {
    let sql = compile_json(json!({
        "store_id": "store-1",
        "limit": 50,
        "offset": 100,
        "return_count_only": true
    }))
    .unwrap();
    assert!(!sql.contains("ORDER BY"));
    assert!(!sql.contains("LIMIT"));
    assert!(!sql.contains("OFFSET"));
}

/// An OR-joined base group is emitted without parentheses next to the store
/// predicate, so it binds as `store AND a OR b`: rows from other stores can
/// match through `b`.
#[test]
fn top_level_or_group_is_not_parenthesized() {
    let sql = compile_json(json!({
        "store_id": "s1",
        "base_conditions": {
            "logic": "OR",
            "conditions": [
                { "field": "country", "operator": "equals", "value": "France" },
                { "field": "country", "operator": "equals", "value": "Spain" }
            ]
        },
        "return_count_only": true
    }))
    .unwrap();
    assert!(sql.ends_with("WHERE s.store_id = 's1' AND `country` = 'France' OR `country` = 'Spain'"));
}

/// Wrapping the OR in a nested group keeps it a single operand of the AND chain.
#[test]
fn nested_or_group_keeps_precedence() {
    let sql = compile_json(json!({
        "store_id": "s1",
        "base_conditions": {
            "groups": [{
                "logic": "OR",
                "conditions": [
                    { "field": "country", "operator": "equals", "value": "France" },
                    { "field": "country", "operator": "equals", "value": "Spain" }
                ]
            }]
        },
        "return_count_only": true
    }))
    .unwrap();
    assert!(sql.ends_with("WHERE s.store_id = 's1' AND (`country` = 'France' OR `country` = 'Spain')"));
}

#[test]
fn errors_surface_unchanged() {
    let err = compile_json(json!({ "base_conditions": {} })).unwrap_err();
    assert!(matches!(err, SegmentError::InvalidPayload(_)));

    let err = compile_json(json!({
        "store_id": "s1",
        "base_conditions": { "conditions": [
            { "field": "email", "operator": "fuzzy_match", "value": "x" }
        ]}
    }))
    .unwrap_err();
    assert!(matches!(err, SegmentError::UnsupportedOperator { ref operator, .. } if operator == "fuzzy_match"));

    let err = compile_json(json!({
        "store_id": "s1",
        "event_filters": [{ "table": "analytics", "aggregation": { "type": "p99", "field": "time_to_open" } }]
    }))
    .unwrap_err();
    assert!(matches!(err, SegmentError::UnsupportedAggregationType(_)));
}
