//! EventDriver interface tests.
//!
//! These tests verify the contract of the EventDriver trait.
//! Each driver implementation should run these tests. Every test works on
//! its own stream names and categories so a single backend can be shared.

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use serde_json::json;
use uuid::Uuid;

use tidemark::events::{Event, EventEnvelope, EventTypes};
use tidemark::selector::Selector;
use tidemark::storage::{EventDriver, StorageError};

/// Event types every driver under test must be built with.
///
/// `TestUnregistered` is deliberately left out.
pub fn test_types() -> Arc<EventTypes> {
    let mut types = EventTypes::new();
    types.register("TestEvent", &[]).unwrap();
    types.register("TestCreated", &["TestEvent"]).unwrap();
    types.register("TestChanged", &["TestEvent"]).unwrap();
    types.register("TestOther", &[]).unwrap();
    Arc::new(types)
}

/// Stream name unique to one test run.
pub fn unique(prefix: &str) -> String {
    format!("{}-{}", prefix, Uuid::new_v4().simple())
}

fn categories(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

async fn read_ids<D: EventDriver + ?Sized>(driver: &D, selector: &str) -> Vec<String> {
    driver
        .stream(&Selector::parse(selector).expect("valid selector"))
        .await
        .expect("stream should succeed")
        .try_collect_all()
        .await
        .expect("reading should succeed")
        .iter()
        .map(|event| event.event_id().to_string())
        .collect()
}

// =============================================================================
// EventDriver::attach tests
// =============================================================================

pub async fn test_versions_start_at_zero<D: EventDriver + ?Sized>(driver: &D) {
    let stream = unique("versions");

    for expected in 0..3u64 {
        let version = driver
            .attach(&stream, &EventEnvelope::new("TestCreated"), &[])
            .await
            .expect("attach should succeed");
        assert_eq!(version, Some(expected), "versions should be sequential");
    }

    let other = unique("versions");
    let version = driver
        .attach(&other, &EventEnvelope::new("TestCreated"), &[])
        .await
        .expect("attach should succeed");
    assert_eq!(version, Some(0), "new stream should start at 0");
}

pub async fn test_duplicate_event_id_is_atomic<D: EventDriver + ?Sized>(driver: &D) {
    let stream = unique("duplicate");
    let event = EventEnvelope::new("TestCreated");

    driver
        .attach(&stream, &event, &[])
        .await
        .expect("first attach should succeed");

    let result = driver.attach(&stream, &event, &[]).await;
    assert!(
        matches!(result, Err(StorageError::DuplicateEvent { .. })),
        "re-used event id should be rejected, got {:?}",
        result
    );

    // The failed append neither wrote a record nor consumed a version.
    let version = driver
        .attach(&stream, &EventEnvelope::new("TestChanged"), &[])
        .await
        .expect("attach after failure should succeed");
    assert_eq!(version, Some(1));

    let ids = read_ids(driver, &format!("${}", stream)).await;
    assert_eq!(ids.len(), 2);
}

pub async fn test_invalid_literals_are_rejected<D: EventDriver + ?Sized>(driver: &D) {
    let stream = unique("literals");

    let result = driver
        .attach(&stream, &EventEnvelope::new("TestCreated"), &categories(&["a,b"]))
        .await;
    assert!(matches!(result, Err(StorageError::InvalidLiteral(_))));

    let result = driver
        .attach(&format!("{}/*", stream), &EventEnvelope::new("TestCreated"), &[])
        .await;
    assert!(matches!(result, Err(StorageError::InvalidLiteral(_))));

    assert!(read_ids(driver, &format!("${}", stream)).await.is_empty());
}

// =============================================================================
// EventDriver::stream tests
// =============================================================================

pub async fn test_payload_round_trip<D: EventDriver + ?Sized>(driver: &D) {
    let stream = unique("payload");
    let aggregate = Uuid::new_v4();
    let created_at = Utc
        .with_ymd_and_hms(2024, 3, 1, 12, 30, 5)
        .unwrap()
        .checked_add_signed(Duration::microseconds(123_456))
        .unwrap();

    let event = EventEnvelope::new("TestCreated")
        .with_created_at(created_at)
        .with_aggregate_id(aggregate)
        .with_data(json!({"name": "widget", "tags": ["a", "b"]}))
        .with_metadata(json!({"user": "alice"}));

    driver
        .attach(&stream, &event, &categories(&["billing"]))
        .await
        .expect("attach should succeed");

    let events = driver
        .stream(&Selector::parse(&format!("${}", stream)).unwrap())
        .await
        .expect("stream should succeed")
        .try_collect_all()
        .await
        .expect("reading should succeed");

    assert_eq!(events.len(), 1);
    let read = &events[0];
    assert_eq!(read.event_id(), event.event_id());
    assert_eq!(read.event_type(), "TestCreated");
    assert_eq!(read.version(), Some(0));
    assert_eq!(read.created_at(), created_at, "microseconds should survive");
    assert_eq!(read.aggregate_id(), Some(aggregate));
    assert_eq!(read.data(), Some(&json!({"name": "widget", "tags": ["a", "b"]})));
    assert_eq!(
        tidemark::events::StorableEvent::metadata(read),
        Some(&json!({"user": "alice"}))
    );
}

pub async fn test_absent_payload_reads_back_absent<D: EventDriver + ?Sized>(driver: &D) {
    let stream = unique("absent");
    driver
        .attach(&stream, &EventEnvelope::new("TestCreated"), &[])
        .await
        .expect("attach should succeed");

    let events = driver
        .stream(&Selector::parse(&format!("${}", stream)).unwrap())
        .await
        .unwrap()
        .try_collect_all()
        .await
        .unwrap();
    assert_eq!(events.len(), 1);
    assert!(events[0].data().is_none());
    assert!(events[0].aggregate_id().is_none());
}

pub async fn test_stream_prefix_selection<D: EventDriver + ?Sized>(driver: &D) {
    let base = unique("orders");
    let first = EventEnvelope::new("TestCreated");
    let second = EventEnvelope::new("TestCreated");
    let sibling = EventEnvelope::new("TestCreated");

    driver.attach(&format!("{}/1", base), &first, &[]).await.unwrap();
    driver.attach(&format!("{}/2", base), &second, &[]).await.unwrap();
    driver.attach(&format!("{}x/1", base), &sibling, &[]).await.unwrap();

    let ids = read_ids(driver, &format!("${}/*", base)).await;
    assert_eq!(ids, [first.event_id(), second.event_id()]);

    let ids = read_ids(driver, &format!("${}/1", base)).await;
    assert_eq!(ids, [first.event_id()]);
}

pub async fn test_prefix_escapes_like_wildcards<D: EventDriver + ?Sized>(driver: &D) {
    let tag = Uuid::new_v4().simple().to_string();
    let literal = EventEnvelope::new("TestCreated");
    let lookalike = EventEnvelope::new("TestCreated");

    driver.attach(&format!("a_{}/1", tag), &literal, &[]).await.unwrap();
    driver.attach(&format!("ab{}/1", tag), &lookalike, &[]).await.unwrap();

    let ids = read_ids(driver, &format!("$a_{}/*", tag)).await;
    assert_eq!(ids, [literal.event_id()]);
}

pub async fn test_category_selection<D: EventDriver + ?Sized>(driver: &D) {
    let stream = unique("categories");
    let tag = Uuid::new_v4().simple().to_string();
    let a = format!("{}a", tag);
    let b = format!("{}b", tag);
    let bb = format!("{}bb", tag);
    let x = format!("{}x", tag);
    let z = format!("{}z", tag);

    let first = EventEnvelope::new("TestCreated");
    let second = EventEnvelope::new("TestCreated");
    let third = EventEnvelope::new("TestCreated");
    let fourth = EventEnvelope::new("TestCreated");

    driver.attach(&stream, &first, &[a.clone(), b.clone()]).await.unwrap();
    driver.attach(&stream, &second, &[z.clone()]).await.unwrap();
    driver
        .attach(&stream, &third, &[x.clone(), b.clone(), z.clone()])
        .await
        .unwrap();
    driver.attach(&stream, &fourth, &[bb.clone()]).await.unwrap();

    // Leading, trailing and infix positions all match; "bb" does not match "b".
    assert_eq!(read_ids(driver, &format!(".{}", a)).await, [first.event_id()]);
    assert_eq!(
        read_ids(driver, &format!(".{}", b)).await,
        [first.event_id(), third.event_id()]
    );
    assert_eq!(
        read_ids(driver, &format!(".{}", z)).await,
        [second.event_id(), third.event_id()]
    );

    // Categories are OR-combined.
    assert_eq!(
        read_ids(driver, &format!(".{}.{}", a, z)).await,
        [first.event_id(), second.event_id(), third.event_id()]
    );

    // And AND-combined with the stream.
    let ids = read_ids(driver, &format!("${}.{}", unique("elsewhere"), a)).await;
    assert!(ids.is_empty());
}

pub async fn test_event_type_narrowing<D: EventDriver + ?Sized>(driver: &D) {
    let stream = unique("narrowing");
    let created = EventEnvelope::new("TestCreated");
    let changed = EventEnvelope::new("TestChanged");
    let other = EventEnvelope::new("TestOther");

    driver.attach(&stream, &created, &[]).await.unwrap();
    driver.attach(&stream, &changed, &[]).await.unwrap();
    driver.attach(&stream, &other, &[]).await.unwrap();

    let ids = read_ids(driver, &format!("${}[TestCreated]", stream)).await;
    assert_eq!(ids, [created.event_id()]);

    // Supertype literals admit registered subtypes.
    let ids = read_ids(driver, &format!("${}[TestEvent]", stream)).await;
    assert_eq!(ids, [created.event_id(), changed.event_id()]);

    let ids = read_ids(driver, &format!("${}[TestOther,TestChanged]", stream)).await;
    assert_eq!(ids, [changed.event_id(), other.event_id()]);
}

pub async fn test_all_selector_reads_everything<D: EventDriver + ?Sized>(driver: &D) {
    let stream = unique("all");
    let event = EventEnvelope::new("TestCreated");
    driver.attach(&stream, &event, &[]).await.unwrap();

    let ids = read_ids(driver, "*").await;
    assert!(ids.iter().any(|id| id == event.event_id()));
}

pub async fn test_invalid_selection<D: EventDriver + ?Sized>(driver: &D) {
    let result = driver
        .stream(&Selector::parse("[TestCreated]").unwrap())
        .await;
    assert!(matches!(result, Err(StorageError::InvalidSelection(_))));

    let result = driver.stream(&Selector::parse("~relative").unwrap()).await;
    assert!(matches!(result, Err(StorageError::InvalidSelection(_))));
}

pub async fn test_unknown_type_ends_stream<D: EventDriver + ?Sized>(driver: &D) {
    let stream = unique("unknown");
    let first = EventEnvelope::new("TestCreated");

    driver.attach(&stream, &first, &[]).await.unwrap();
    driver
        .attach(&stream, &EventEnvelope::new("TestUnregistered"), &[])
        .await
        .unwrap();
    driver
        .attach(&stream, &EventEnvelope::new("TestCreated"), &[])
        .await
        .unwrap();

    let ids = read_ids(driver, &format!("${}", stream)).await;
    assert_eq!(ids, [first.event_id()]);
}

pub async fn test_stream_cursor<D: EventDriver + ?Sized>(driver: &D) {
    let stream = unique("cursor");
    let first = EventEnvelope::new("TestCreated");
    let second = EventEnvelope::new("TestChanged");
    driver.attach(&stream, &first, &[]).await.unwrap();
    driver.attach(&stream, &second, &[]).await.unwrap();

    let selector = format!("${}", stream);
    let mut events = driver
        .stream(&Selector::parse(&selector).unwrap())
        .await
        .unwrap();
    assert_eq!(events.name(), selector);
    assert_eq!(events.key(), Some(first.event_id()));

    events.advance().await.unwrap();
    events.rewind();
    assert_eq!(events.key(), Some(second.event_id()));
    assert_eq!(events.current().unwrap().version(), Some(1));

    events.advance().await.unwrap();
    assert!(!events.has_current());
    assert!(events.key().is_none());
}

pub async fn test_abandoned_stream<D: EventDriver + ?Sized>(driver: &D) {
    let stream = unique("abandoned");
    for _ in 0..50 {
        driver
            .attach(&stream, &EventEnvelope::new("TestCreated"), &[])
            .await
            .unwrap();
    }

    // Dropping a partially read stream must not hold up later operations.
    let events = driver
        .stream(&Selector::parse(&format!("${}", stream)).unwrap())
        .await
        .unwrap();
    assert!(events.has_current());
    drop(events);

    let version = driver
        .attach(&stream, &EventEnvelope::new("TestCreated"), &[])
        .await
        .unwrap();
    assert_eq!(version, Some(50));
}

pub async fn test_is_available<D: EventDriver + ?Sized>(driver: &D) {
    assert!(driver.is_available().await);
}

/// Macro to run all EventDriver tests against a driver.
#[macro_export]
macro_rules! run_driver_tests {
    ($driver:expr) => {
        use $crate::storage::driver_tests::*;

        // attach tests
        test_versions_start_at_zero($driver).await;
        println!("  test_versions_start_at_zero: PASSED");

        test_duplicate_event_id_is_atomic($driver).await;
        println!("  test_duplicate_event_id_is_atomic: PASSED");

        test_invalid_literals_are_rejected($driver).await;
        println!("  test_invalid_literals_are_rejected: PASSED");

        // stream tests
        test_payload_round_trip($driver).await;
        println!("  test_payload_round_trip: PASSED");

        test_absent_payload_reads_back_absent($driver).await;
        println!("  test_absent_payload_reads_back_absent: PASSED");

        test_stream_prefix_selection($driver).await;
        println!("  test_stream_prefix_selection: PASSED");

        test_prefix_escapes_like_wildcards($driver).await;
        println!("  test_prefix_escapes_like_wildcards: PASSED");

        test_category_selection($driver).await;
        println!("  test_category_selection: PASSED");

        test_event_type_narrowing($driver).await;
        println!("  test_event_type_narrowing: PASSED");

        test_all_selector_reads_everything($driver).await;
        println!("  test_all_selector_reads_everything: PASSED");

        test_invalid_selection($driver).await;
        println!("  test_invalid_selection: PASSED");

        test_unknown_type_ends_stream($driver).await;
        println!("  test_unknown_type_ends_stream: PASSED");

        test_stream_cursor($driver).await;
        println!("  test_stream_cursor: PASSED");

        test_abandoned_stream($driver).await;
        println!("  test_abandoned_stream: PASSED");

        // availability
        test_is_available($driver).await;
        println!("  test_is_available: PASSED");
    };
}
