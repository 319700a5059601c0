//! Normalized e-commerce events consumed by the cube engine
//!
//! Sources hand rows to the engine as [`RawEvent`]s, loosely typed records
//! where every column is an optional string. [`Event::try_from`] turns a raw
//! row into an immutable [`Event`] or rejects the whole row with
//! [`CubeError::MalformedEvent`]; no field of a rejected row ever reaches the
//! cube.

use crate::error::{CubeError, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;

// Export EventBuilder for tests
pub use builder::EventBuilder;

/// Module with event builder for testing
pub mod builder;

/// Sentinel used for absent category and brand values
pub const UNKNOWN: &str = "unknown";

/// Kind of shopper interaction
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventType {
    /// Product page view
    View,
    /// Product added to cart
    Cart,
    /// Completed purchase
    Purchase,
    /// Any other interaction, kept verbatim (e.g. `remove_from_cart`)
    Other(String),
}

impl EventType {
    /// Wire name of the event type
    pub fn as_str(&self) -> &str {
        match self {
            EventType::View => "view",
            EventType::Cart => "cart",
            EventType::Purchase => "purchase",
            EventType::Other(s) => s,
        }
    }
}

impl From<&str> for EventType {
    fn from(s: &str) -> Self {
        match s.trim() {
            "view" => EventType::View,
            "cart" => EventType::Cart,
            "purchase" => EventType::Purchase,
            other => EventType::Other(other.to_string()),
        }
    }
}

impl From<String> for EventType {
    fn from(s: String) -> Self {
        EventType::from(s.as_str())
    }
}

impl From<EventType> for String {
    fn from(t: EventType) -> Self {
        t.as_str().to_string()
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single normalized event.
///
/// Fields are private so an `Event` can only come out of validation:
/// `category_code` and `brand` are never empty (absent values become
/// [`UNKNOWN`]) and `price` is finite and non-negative.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    #[serde(rename = "event_time")]
    timestamp: DateTime<Utc>,
    event_type: EventType,
    category_code: String,
    brand: String,
    product_id: i64,
    price: f64,
    user_id: i64,
}

impl Event {
    /// Event time
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Interaction kind
    pub fn event_type(&self) -> &EventType {
        &self.event_type
    }

    /// Category path such as `electronics.smartphone`, or `unknown`
    pub fn category_code(&self) -> &str {
        &self.category_code
    }

    /// Brand name, or `unknown`
    pub fn brand(&self) -> &str {
        &self.brand
    }

    /// Product identifier
    pub fn product_id(&self) -> i64 {
        self.product_id
    }

    /// Price of the product at event time
    pub fn price(&self) -> f64 {
        self.price
    }

    /// Shopper identifier
    pub fn user_id(&self) -> i64 {
        self.user_id
    }
}

/// Row as read from a source, before validation.
///
/// Column names follow the public e-commerce behaviour dataset. Columns the
/// cube does not use (`category_id`, `user_session`) are accepted and
/// ignored.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RawEvent {
    /// Event time, `YYYY-MM-DD HH:MM:SS[ UTC]` or RFC 3339
    pub event_time: Option<String>,
    /// Interaction kind
    pub event_type: Option<String>,
    /// Product identifier
    pub product_id: Option<String>,
    /// Category identifier (unused)
    pub category_id: Option<String>,
    /// Category path
    pub category_code: Option<String>,
    /// Brand name
    pub brand: Option<String>,
    /// Price
    pub price: Option<String>,
    /// Shopper identifier
    pub user_id: Option<String>,
    /// Session identifier (unused)
    pub user_session: Option<String>,
}

impl RawEvent {
    /// Build a raw row from a JSON object.
    ///
    /// Numbers and booleans are stringified so that JSON and CSV rows share
    /// one validation path; `null` counts as absent.
    pub fn from_json(value: JsonValue) -> Result<Self> {
        let JsonValue::Object(mut map) = value else {
            return Err(CubeError::MalformedEvent(
                "expected a JSON object".to_string(),
            ));
        };
        let mut take = |key: &str| match map.remove(key) {
            Some(JsonValue::String(s)) => Some(s),
            Some(JsonValue::Number(n)) => Some(n.to_string()),
            Some(JsonValue::Bool(b)) => Some(b.to_string()),
            _ => None,
        };
        Ok(Self {
            event_time: take("event_time"),
            event_type: take("event_type"),
            product_id: take("product_id"),
            category_id: take("category_id"),
            category_code: take("category_code"),
            brand: take("brand"),
            price: take("price"),
            user_id: take("user_id"),
            user_session: take("user_session"),
        })
    }
}

impl TryFrom<RawEvent> for Event {
    type Error = CubeError;

    fn try_from(raw: RawEvent) -> Result<Self> {
        let event_time = required("event_time", raw.event_time.as_deref())?;
        let timestamp = parse_event_time(event_time)?;
        let event_type = EventType::from(required("event_type", raw.event_type.as_deref())?);
        let product_id = parse_id("product_id", raw.product_id.as_deref())?;
        let user_id = parse_id("user_id", raw.user_id.as_deref())?;
        let price = parse_price(raw.price.as_deref())?;

        Ok(Self {
            timestamp,
            event_type,
            category_code: dimension_or_unknown(raw.category_code),
            brand: dimension_or_unknown(raw.brand),
            product_id,
            price,
            user_id,
        })
    }
}

/// Parse an `event_time` column into a UTC instant.
///
/// Accepts the dataset's `2019-11-01 00:00:00 UTC` form (suffix optional,
/// fractional seconds allowed) and RFC 3339.
pub fn parse_event_time(input: &str) -> Result<DateTime<Utc>> {
    let trimmed = input.trim();
    let naive = trimmed.strip_suffix(" UTC").unwrap_or(trimmed);

    if let Ok(dt) = NaiveDateTime::parse_from_str(naive, "%Y-%m-%d %H:%M:%S%.f") {
        return Ok(dt.and_utc());
    }
    DateTime::parse_from_rfc3339(trimmed)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| CubeError::MalformedEvent(format!("invalid event_time '{}': {}", input, e)))
}

fn required<'a>(field: &str, value: Option<&'a str>) -> Result<&'a str> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(CubeError::MalformedEvent(format!("missing {}", field))),
    }
}

fn parse_id(field: &str, value: Option<&str>) -> Result<i64> {
    let v = required(field, value)?;
    v.parse::<i64>()
        .map_err(|_| CubeError::MalformedEvent(format!("invalid {} '{}'", field, v)))
}

fn parse_price(value: Option<&str>) -> Result<f64> {
    let v = required("price", value)?;
    let price = v
        .parse::<f64>()
        .map_err(|_| CubeError::MalformedEvent(format!("invalid price '{}'", v)))?;
    validate_price(price)?;
    Ok(price)
}

pub(crate) fn validate_price(price: f64) -> Result<()> {
    if !price.is_finite() || price < 0.0 {
        return Err(CubeError::MalformedEvent(format!(
            "price must be finite and non-negative, got {}",
            price
        )));
    }
    Ok(())
}

pub(crate) fn dimension_or_unknown(value: Option<String>) -> String {
    match value {
        Some(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => UNKNOWN.to_string(),
    }
}
