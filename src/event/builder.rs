use super::{dimension_or_unknown, validate_price, Event, EventType};
use crate::error::Result;
use chrono::{DateTime, Utc};

/// Builder for creating test events
///
/// Unset fields default to a `view` of product 0 by user 0 at the Unix
/// epoch, price 0, unknown category and brand.
pub struct EventBuilder {
    timestamp: DateTime<Utc>,
    event_type: EventType,
    category_code: Option<String>,
    brand: Option<String>,
    product_id: i64,
    price: f64,
    user_id: i64,
}

impl EventBuilder {
    /// Create a new EventBuilder
    pub fn new() -> Self {
        Self {
            timestamp: DateTime::<Utc>::default(),
            event_type: EventType::View,
            category_code: None,
            brand: None,
            product_id: 0,
            price: 0.0,
            user_id: 0,
        }
    }

    /// Set the timestamp for the event
    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Set the interaction kind
    pub fn event_type(mut self, event_type: impl Into<EventType>) -> Self {
        self.event_type = event_type.into();
        self
    }

    /// Set the category path
    pub fn category(mut self, category_code: impl Into<String>) -> Self {
        self.category_code = Some(category_code.into());
        self
    }

    /// Set the brand
    pub fn brand(mut self, brand: impl Into<String>) -> Self {
        self.brand = Some(brand.into());
        self
    }

    /// Set the product identifier
    pub fn product(mut self, product_id: i64) -> Self {
        self.product_id = product_id;
        self
    }

    /// Set the price
    pub fn price(mut self, price: f64) -> Self {
        self.price = price;
        self
    }

    /// Set the shopper identifier
    pub fn user(mut self, user_id: i64) -> Self {
        self.user_id = user_id;
        self
    }

    /// Build the Event, applying the same checks as source rows
    pub fn build(self) -> Result<Event> {
        validate_price(self.price)?;
        Ok(Event {
            timestamp: self.timestamp,
            event_type: self.event_type,
            category_code: dimension_or_unknown(self.category_code),
            brand: dimension_or_unknown(self.brand),
            product_id: self.product_id,
            price: self.price,
            user_id: self.user_id,
        })
    }
}

impl Default for EventBuilder {
    fn default() -> Self {
        Self::new()
    }
}
