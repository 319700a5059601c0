use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;
use std::collections::{BTreeMap, HashSet};
use std::time::Duration as StdDuration;
use stream_cube::{CubeEngine, EngineConfig, Event, EventBuilder};

const WINDOW_SECS: i64 = 60;
const TOLERANCE: f64 = 1e-6;

fn t(secs: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2019, 11, 1, 0, 0, 0).unwrap() + Duration::seconds(secs)
}

fn engine() -> CubeEngine {
    let config = EngineConfig::new(
        ["event_type"],
        [
            "user_count",
            "product_count",
            "price_sum",
            "price_mean",
            "user_count_windowed",
            "product_count_windowed",
            "price_sum_windowed",
            "price_mean_windowed",
        ],
        StdDuration::from_secs(WINDOW_SECS as u64),
    );
    CubeEngine::configure(&config).unwrap()
}

/// Non-decreasing timestamps built from gaps, spread over three event types
fn arb_events() -> impl Strategy<Value = Vec<Event>> {
    prop::collection::vec(
        (0i64..25, 0usize..3, 0i64..6, 0i64..6, 0u32..50_000),
        1..80,
    )
    .prop_map(|rows| {
        let mut now = 0;
        rows.into_iter()
            .map(|(gap, kind, user, product, cents)| {
                now += gap;
                EventBuilder::new()
                    .timestamp(t(now))
                    .event_type(["view", "cart", "purchase"][kind])
                    .user(user)
                    .product(product)
                    .price(f64::from(cents) / 100.0)
                    .build()
                    .unwrap()
            })
            .collect()
    })
}

/// Events interleaved with reads: each step may be followed by a snapshot
/// some seconds past the latest event
fn arb_interleaved() -> impl Strategy<Value = Vec<(Event, Option<i64>)>> {
    prop::collection::vec(
        (
            0i64..40,
            0usize..3,
            0i64..6,
            0u32..50_000,
            prop::option::of(0i64..120),
        ),
        1..60,
    )
    .prop_map(|rows| {
        let mut now = 0;
        rows.into_iter()
            .map(|(gap, kind, user, cents, read)| {
                now += gap;
                let event = EventBuilder::new()
                    .timestamp(t(now))
                    .event_type(["view", "cart", "purchase"][kind])
                    .user(user)
                    .product(user + 1)
                    .price(f64::from(cents) / 100.0)
                    .build()
                    .unwrap();
                (event, read)
            })
            .collect()
    })
}

struct Expected {
    users: usize,
    products: usize,
    sum: f64,
    count: usize,
}

fn brute_force_window(events: &[Event], now: DateTime<Utc>) -> BTreeMap<String, Expected> {
    let lower = now - Duration::seconds(WINDOW_SECS);
    let mut groups: BTreeMap<String, Vec<&Event>> = BTreeMap::new();
    for e in events {
        groups.entry(e.event_type().to_string()).or_default().push(e);
    }
    groups
        .into_iter()
        .map(|(key, group)| {
            let inside: Vec<&Event> = group
                .into_iter()
                .filter(|e| e.timestamp() > lower && e.timestamp() <= now)
                .collect();
            let expected = Expected {
                users: inside.iter().map(|e| e.user_id()).collect::<HashSet<_>>().len(),
                products: inside.iter().map(|e| e.product_id()).collect::<HashSet<_>>().len(),
                sum: inside.iter().map(|e| e.price()).sum(),
                count: inside.len(),
            };
            (key, expected)
        })
        .collect()
}

proptest! {
    #[test]
    fn windowed_measures_match_brute_force(events in arb_events(), extra in 0i64..90) {
        let mut engine = engine();
        for e in &events {
            engine.ingest(e).unwrap();
        }
        let last = events.last().map(Event::timestamp).unwrap();
        let now = last + Duration::seconds(extra);

        let snapshot = engine.snapshot(now);
        let expected = brute_force_window(&events, now);
        prop_assert_eq!(snapshot.rows.len(), expected.len());

        for row in &snapshot.rows {
            let want = &expected[&row.key.values()[0]];
            prop_assert_eq!(row.windowed.user_count, want.users);
            prop_assert_eq!(row.windowed.product_count, want.products);
            prop_assert!((row.windowed.price_sum - want.sum).abs() < TOLERANCE);
            match row.windowed.price_mean {
                Some(mean) => {
                    prop_assert!(want.count > 0);
                    prop_assert!((mean - want.sum / want.count as f64).abs() < TOLERANCE);
                }
                None => prop_assert_eq!(want.count, 0),
            }
        }
    }

    #[test]
    fn reads_between_ingests_match_brute_force(steps in arb_interleaved()) {
        let mut engine = engine();
        let mut applied: Vec<Event> = Vec::new();
        let mut watermark: Option<DateTime<Utc>> = None;

        for (event, read) in steps {
            engine.ingest(&event).unwrap();
            applied.push(event);
            let Some(extra) = read else { continue };

            // reads never move the ingest clock, so every later event is accepted
            let now = engine.clock().unwrap() + Duration::seconds(extra);
            let anchor = watermark.map_or(now, |w| w.max(now));
            watermark = Some(anchor);

            let snapshot = engine.snapshot(now);
            prop_assert_eq!(snapshot.taken_at, Some(anchor));
            let expected = brute_force_window(&applied, anchor);
            prop_assert_eq!(snapshot.rows.len(), expected.len());
            for row in &snapshot.rows {
                let want = &expected[&row.key.values()[0]];
                prop_assert_eq!(row.windowed.user_count, want.users);
                prop_assert_eq!(row.windowed.product_count, want.products);
                prop_assert!((row.windowed.price_sum - want.sum).abs() < TOLERANCE);
            }
        }
        prop_assert_eq!(engine.stats().ingested, applied.len() as u64);
        prop_assert_eq!(engine.stats().dropped_out_of_order, 0);
    }

    #[test]
    fn all_time_user_count_never_decreases(events in arb_events()) {
        let mut engine = engine();
        let mut seen: BTreeMap<String, usize> = BTreeMap::new();

        for e in &events {
            engine.ingest(e).unwrap();
            for row in engine.current_snapshot().rows {
                let key = row.key.to_string();
                let previous = seen.get(&key).copied().unwrap_or(0);
                prop_assert!(row.all_time.user_count >= previous);
                seen.insert(key, row.all_time.user_count);
            }
        }
    }

    #[test]
    fn snapshot_is_idempotent(events in arb_events(), extra in 0i64..200) {
        let mut engine = engine();
        for e in &events {
            engine.ingest(e).unwrap();
        }
        let now = events.last().map(Event::timestamp).unwrap() + Duration::seconds(extra);
        let first = engine.snapshot(now);
        let second = engine.snapshot(now);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn window_drains_after_quiet_period(events in arb_events()) {
        let mut engine = engine();
        for e in &events {
            engine.ingest(e).unwrap();
        }
        let total: f64 = events.iter().map(Event::price).sum();
        let now = events.last().map(Event::timestamp).unwrap() + Duration::seconds(WINDOW_SECS + 1);

        let snapshot = engine.snapshot(now);
        let mut all_time_sum = 0.0;
        for row in &snapshot.rows {
            prop_assert_eq!(row.windowed.user_count, 0);
            prop_assert_eq!(row.windowed.product_count, 0);
            prop_assert_eq!(row.windowed.price_sum, 0.0);
            prop_assert_eq!(row.windowed.price_mean, None);
            all_time_sum += row.all_time.price_sum;
        }
        prop_assert!((all_time_sum - total).abs() < TOLERANCE * events.len() as f64);
        prop_assert_eq!(engine.store().window_entries(), 0);
    }
}
