use super::Measures;
use crate::event::Event;
use std::collections::HashSet;

/// All-time accumulator for one cube cell
///
/// Nothing ever leaves this accumulator, so plain sets suffice for the
/// distinct counts.
#[derive(Debug, Clone, Default)]
pub struct CumulativeAccumulator {
    users: HashSet<i64>,
    products: HashSet<i64>,
    price_sum: f64,
    event_count: u64,
}

impl CumulativeAccumulator {
    /// Create an empty accumulator
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an event's contribution
    pub fn add(&mut self, event: &Event) {
        self.users.insert(event.user_id());
        self.products.insert(event.product_id());
        self.price_sum += event.price();
        self.event_count += 1;
    }

    /// Events seen so far
    pub fn event_count(&self) -> u64 {
        self.event_count
    }

    /// Current all-time measures
    pub fn snapshot(&self) -> Measures {
        Measures::from_parts(
            self.users.len(),
            self.products.len(),
            self.price_sum,
            self.event_count,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventBuilder;

    #[test]
    fn test_accumulates_everything() {
        let mut acc = CumulativeAccumulator::new();
        assert_eq!(acc.snapshot().price_mean, None);

        for (user, product, price) in [(1, 10, 5.0), (2, 10, 7.0), (1, 11, 3.0)] {
            let event = EventBuilder::new()
                .user(user)
                .product(product)
                .price(price)
                .build()
                .unwrap();
            acc.add(&event);
        }

        let m = acc.snapshot();
        assert_eq!(m.user_count, 2);
        assert_eq!(m.product_count, 2);
        assert_eq!(m.price_sum, 15.0);
        assert_eq!(m.price_mean, Some(5.0));
        assert_eq!(acc.event_count(), 3);
    }
}
