//! Field schema registry — static column types for the base entity table and
//! the event tables. Drives every escaping decision in the compiler.

use serde::{Deserialize, Serialize};

/// Base entity table and the alias it is selected under.
pub const BASE_TABLE: &str = "subscribers";
pub const BASE_ALIAS: &str = "s";
/// Identifier column of the base entity.
pub const BASE_ID_COLUMN: &str = "id";
/// Column in every event table that references `subscribers.id`.
pub const CORRELATING_ID_COLUMN: &str = "subscriber_id";
pub const STORE_COLUMN: &str = "store_id";
pub const TIMESTAMP_COLUMN: &str = "timestamp";
/// Base column used for the deterministic row ordering.
pub const ORDER_COLUMN: &str = "updated_at";

pub const PIXEL_EVENTS_TABLE: &str = "pixel_events";
pub const ANALYTICS_TABLE: &str = "analytics";

/// Semantic column type as seen by the value escaper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    String,
    /// UInt32 / Int32 columns.
    Integer,
    /// Decimal / Float32 / Float64 columns.
    Decimal,
    /// UInt8 flags stored as 0/1.
    Boolean,
    StringArray,
    DateTime,
    Date,
}

impl FieldType {
    /// Whether literals of this type are rendered single-quoted.
    pub fn is_quoted(self) -> bool {
        matches!(self, Self::String | Self::DateTime | Self::Date)
    }

    pub fn is_array(self) -> bool {
        matches!(self, Self::StringArray)
    }
}

use FieldType as T;

const SUBSCRIBERS: &[(&str, FieldType)] = &[
    ("id", T::String),
    ("store_id", T::String),
    ("first_name", T::String),
    ("last_name", T::String),
    ("email", T::String),
    ("phone", T::String),
    ("country", T::String),
    ("state", T::String),
    ("city", T::String),
    ("zip_code", T::String),
    ("order_count", T::Integer),
    ("total_spend", T::Decimal),
    ("last_order_value", T::Decimal),
    ("last_order_date", T::DateTime),
    ("first_order_date", T::DateTime),
    ("average_order_value", T::Decimal),
    ("days_since_last_order", T::Integer),
    ("tags", T::StringArray),
    ("is_email_optin", T::Boolean),
    ("is_push_optin", T::Boolean),
    ("is_sms_optin", T::Boolean),
    ("is_active", T::Boolean),
    ("lifecycle_stage", T::String),
    ("customer_tier", T::String),
    ("created_at", T::DateTime),
    ("updated_at", T::DateTime),
];

const PIXEL_EVENTS: &[(&str, FieldType)] = &[
    ("id", T::String),
    ("store_id", T::String),
    ("subscriber_id", T::String),
    ("session_id", T::String),
    ("event_type", T::String),
    ("event_name", T::String),
    ("page_url", T::String),
    ("referrer_url", T::String),
    ("device_type", T::String),
    ("browser", T::String),
    ("operating_system", T::String),
    ("utm_source", T::String),
    ("utm_medium", T::String),
    ("utm_campaign", T::String),
    ("product_id", T::String),
    ("category", T::String),
    ("product_name", T::String),
    ("product_price", T::Decimal),
    ("currency", T::String),
    ("quantity", T::Integer),
    ("cart_value", T::Decimal),
    ("order_id", T::String),
    ("revenue", T::Decimal),
    ("timestamp", T::DateTime),
    ("date", T::Date),
];

const ANALYTICS: &[(&str, FieldType)] = &[
    ("id", T::String),
    ("store_id", T::String),
    ("subscriber_id", T::String),
    ("campaign_id", T::String),
    ("message_id", T::String),
    ("channel", T::String),
    ("event_type", T::String),
    ("subject", T::String),
    ("content_type", T::String),
    ("template_id", T::String),
    ("link_url", T::String),
    ("device_type", T::String),
    ("client", T::String),
    ("operating_system", T::String),
    ("location_country", T::String),
    ("location_region", T::String),
    ("location_city", T::String),
    ("engagement_score", T::Decimal),
    ("time_to_open", T::Integer),
    ("time_to_click", T::Integer),
    ("bounce_category", T::String),
    ("timestamp", T::DateTime),
    ("date", T::Date),
];

fn columns(table: &str) -> &'static [(&'static str, FieldType)] {
    match table {
        BASE_TABLE => SUBSCRIBERS,
        PIXEL_EVENTS_TABLE => PIXEL_EVENTS,
        ANALYTICS_TABLE => ANALYTICS,
        _ => &[],
    }
}

/// Registered type of `table.field`, if any.
pub fn lookup(table: &str, field: &str) -> Option<FieldType> {
    columns(table)
        .iter()
        .find(|(name, _)| *name == field)
        .map(|(_, ty)| *ty)
}

/// Type used for escaping `table.field`. Unregistered pairs are treated as
/// strings rather than rejected.
pub fn type_of(table: &str, field: &str) -> FieldType {
    lookup(table, field).unwrap_or(FieldType::String)
}

pub fn is_known(table: &str, field: &str) -> bool {
    lookup(table, field).is_some()
}

pub fn is_event_table(table: &str) -> bool {
    matches!(table, PIXEL_EVENTS_TABLE | ANALYTICS_TABLE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registered_types() {
        assert_eq!(type_of("subscribers", "total_spend"), FieldType::Decimal);
        assert_eq!(type_of("subscribers", "tags"), FieldType::StringArray);
        assert_eq!(type_of("subscribers", "is_sms_optin"), FieldType::Boolean);
        assert_eq!(type_of("pixel_events", "quantity"), FieldType::Integer);
        assert_eq!(type_of("analytics", "date"), FieldType::Date);
    }

    #[test]
    fn test_unknown_pairs_default_to_string() {
        assert_eq!(type_of("subscribers", "favorite_color"), FieldType::String);
        assert_eq!(type_of("orders", "total"), FieldType::String);
        assert!(!is_known("orders", "total"));
        assert!(is_known("analytics", "channel"));
    }

    #[test]
    fn test_event_tables() {
        assert!(is_event_table("pixel_events"));
        assert!(is_event_table("analytics"));
        assert!(!is_event_table("subscribers"));
    }
}
