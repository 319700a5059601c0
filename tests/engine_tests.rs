use chrono::{DateTime, Duration, TimeZone, Utc};
use pretty_assertions::assert_eq;
use rstest::rstest;
use std::time::Duration as StdDuration;
use stream_cube::{
    CubeEngine, CubeError, DimensionKey, EngineConfig, Event, EventBuilder, Measure, MeasureKind,
    MeasureValue, Measures, RawEvent, Scope,
};

fn t(secs: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2019, 11, 1, 0, 0, 0).unwrap() + Duration::seconds(secs)
}

fn all_measures() -> Vec<String> {
    Measure::all().iter().map(ToString::to_string).collect()
}

fn engine(dimensions: &[&str]) -> CubeEngine {
    let config = EngineConfig::new(
        dimensions.iter().copied(),
        all_measures(),
        StdDuration::from_secs(60),
    );
    CubeEngine::configure(&config).unwrap()
}

fn event(secs: i64, user: i64, product: i64, price: f64) -> EventBuilder {
    EventBuilder::new()
        .timestamp(t(secs))
        .user(user)
        .product(product)
        .price(price)
}

#[test]
fn test_reference_scenario_rows() {
    let mut engine = engine(&["category_code"]);
    for e in [
        event(0, 1, 10, 5.0),
        event(10, 2, 10, 7.0),
        event(70, 1, 11, 3.0),
    ] {
        let e = e
            .category("electronics.smartphone")
            .brand("samsung")
            .build()
            .unwrap();
        engine.ingest(&e).unwrap();
    }

    let snapshot = engine.snapshot(t(70));
    assert_eq!(snapshot.rows.len(), 1);
    let row = &snapshot.rows[0];
    assert_eq!(
        row.key,
        DimensionKey::new(["electronics.smartphone", "samsung"])
    );
    assert_eq!(
        row.all_time,
        Measures {
            user_count: 2,
            product_count: 2,
            price_sum: 15.0,
            price_mean: Some(5.0),
        }
    );
    assert_eq!(
        row.windowed,
        Measures {
            user_count: 1,
            product_count: 1,
            price_sum: 3.0,
            price_mean: Some(3.0),
        }
    );
}

#[test]
fn test_unknown_dimensions_share_a_cell() {
    let mut engine = engine(&["category_code"]);
    engine.ingest(&event(0, 1, 1, 1.0).build().unwrap()).unwrap();
    engine
        .ingest(&event(1, 2, 2, 2.0).category("").brand(" ").build().unwrap())
        .unwrap();

    let snapshot = engine.snapshot(t(1));
    assert_eq!(snapshot.rows.len(), 1);
    assert_eq!(snapshot.rows[0].key, DimensionKey::new(["unknown", "unknown"]));
    assert_eq!(snapshot.rows[0].all_time.user_count, 2);
}

#[test]
fn test_window_excludes_its_lower_bound() {
    let mut engine = engine(&["event_type"]);
    engine.ingest(&event(0, 1, 1, 4.0).build().unwrap()).unwrap();
    engine.ingest(&event(1, 2, 2, 6.0).build().unwrap()).unwrap();

    let at_59 = engine.snapshot(t(59));
    assert_eq!(at_59.rows[0].windowed.price_sum, 10.0);

    // (T - W, T]: the t=0 event is gone at exactly T = 60
    let at_60 = engine.snapshot(t(60));
    assert_eq!(at_60.rows[0].windowed.price_sum, 6.0);
    assert_eq!(at_60.rows[0].windowed.user_count, 1);
}

#[test]
fn test_window_empties_without_new_events() {
    let mut engine = engine(&["event_type"]);
    for secs in 0..10 {
        engine
            .ingest(&event(secs, secs, secs, 1.5).build().unwrap())
            .unwrap();
    }

    let snapshot = engine.snapshot(t(9 + 61));
    let row = &snapshot.rows[0];
    assert_eq!(row.windowed.user_count, 0);
    assert_eq!(row.windowed.product_count, 0);
    assert_eq!(row.windowed.price_sum, 0.0);
    assert_eq!(row.windowed.price_mean, None);
    assert_eq!(
        row.value(Measure::new(MeasureKind::PriceMean, Scope::Windowed)),
        MeasureValue::Undefined
    );
    assert_eq!(row.all_time.price_sum, 15.0);
}

#[test]
fn test_distinct_counts_survive_partial_expiry() {
    let mut engine = engine(&["event_type"]);
    // user 1 at t=0 and t=30, user 2 only at t=0
    engine.ingest(&event(0, 1, 1, 1.0).build().unwrap()).unwrap();
    engine.ingest(&event(0, 2, 1, 1.0).build().unwrap()).unwrap();
    engine.ingest(&event(30, 1, 2, 1.0).build().unwrap()).unwrap();

    let snapshot = engine.snapshot(t(61));
    let row = &snapshot.rows[0];
    assert_eq!(row.windowed.user_count, 1);
    assert_eq!(row.windowed.product_count, 1);
    assert_eq!(row.all_time.user_count, 2);
    assert_eq!(row.all_time.product_count, 2);
}

#[test]
fn test_snapshot_is_idempotent() {
    let mut engine = engine(&["event_type", "category_code"]);
    engine
        .ingest(&event(0, 1, 1, 1.0).category("a").build().unwrap())
        .unwrap();
    engine
        .ingest(&event(20, 2, 1, 2.0).event_type("cart").category("a").build().unwrap())
        .unwrap();

    let first = engine.snapshot(t(65));
    let second = engine.snapshot(t(65));
    assert_eq!(first, second);
    assert_eq!(first, engine.current_snapshot());
}

#[test]
fn test_rows_ordered_by_key() {
    let mut engine = engine(&["event_type", "brand"]);
    for (secs, kind, brand) in [
        (0, "view", "zara"),
        (1, "cart", "apple"),
        (2, "view", "apple"),
        (3, "purchase", "nike"),
    ] {
        engine
            .ingest(&event(secs, 1, 1, 1.0).event_type(kind).brand(brand).build().unwrap())
            .unwrap();
    }

    let keys: Vec<String> = engine
        .snapshot(t(3))
        .rows
        .iter()
        .map(|r| r.key.to_string())
        .collect();
    assert_eq!(
        keys,
        vec![
            "(cart, apple)",
            "(purchase, nike)",
            "(view, apple)",
            "(view, zara)"
        ]
    );
}

#[test]
fn test_out_of_order_beyond_tolerance_changes_nothing() {
    let config = EngineConfig::new(["category_code"], all_measures(), StdDuration::from_secs(60))
        .with_late_tolerance(StdDuration::from_secs(10));
    let mut engine = CubeEngine::configure(&config).unwrap();

    engine.ingest(&event(100, 1, 1, 1.0).build().unwrap()).unwrap();
    engine.ingest(&event(95, 2, 2, 2.0).build().unwrap()).unwrap();
    let before = engine.snapshot(t(100));

    let err = engine
        .ingest(&event(89, 3, 3, 3.0).build().unwrap())
        .unwrap_err();
    assert!(matches!(err, CubeError::OutOfOrderEvent { .. }));
    assert_eq!(engine.snapshot(t(100)), before);

    let stats = engine.stats();
    assert_eq!(stats.ingested, 2);
    assert_eq!(stats.late_accepted, 1);
    assert_eq!(stats.dropped_out_of_order, 1);
    assert_eq!(stats.cells, 1);
    assert_eq!(before.rows[0].windowed.price_sum, 3.0);
}

#[rstest]
#[case::missing_time(|r: &mut RawEvent| r.event_time = None)]
#[case::bad_time(|r: &mut RawEvent| r.event_time = Some("2019-13-45 99:00:00".into()))]
#[case::bad_product(|r: &mut RawEvent| r.product_id = Some("abc".into()))]
#[case::missing_user(|r: &mut RawEvent| r.user_id = Some("".into()))]
#[case::negative_price(|r: &mut RawEvent| r.price = Some("-0.01".into()))]
#[case::infinite_price(|r: &mut RawEvent| r.price = Some("inf".into()))]
fn test_malformed_rows_rejected_whole(#[case] corrupt: fn(&mut RawEvent)) {
    let mut raw = RawEvent {
        event_time: Some("2019-11-01 00:00:00 UTC".into()),
        event_type: Some("view".into()),
        product_id: Some("1".into()),
        price: Some("1.00".into()),
        user_id: Some("1".into()),
        ..Default::default()
    };
    assert!(Event::try_from(raw.clone()).is_ok());

    corrupt(&mut raw);
    let err = Event::try_from(raw).unwrap_err();
    assert!(matches!(err, CubeError::MalformedEvent(_)));
}

#[rstest]
#[case(&["category_code"], &["category_code", "brand"])]
#[case(&["event_type", "category_code"], &["event_type", "category_code", "brand"])]
#[case(&["brand"], &["brand"])]
#[case(&["user_id", "product_id"], &["user_id", "product_id"])]
fn test_hierarchy_columns(#[case] configured: &[&str], #[case] expected: &[&str]) {
    let mut engine = engine(configured);
    let columns: Vec<String> = engine
        .current_snapshot()
        .dimensions
        .iter()
        .map(ToString::to_string)
        .collect();
    assert_eq!(columns, expected);
}
