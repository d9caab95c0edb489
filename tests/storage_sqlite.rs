//! SQLite storage integration tests.
//!
//! Run with: cargo test --test storage_sqlite --features sqlite
//!
//! Uses a temporary database file, no external dependencies required.

mod storage;

use std::sync::Arc;

use tempfile::TempDir;

use tidemark::events::EventEnvelope;
use tidemark::storage::sql::sqlite::connect;
use tidemark::storage::{EventDriver, SqliteDriver};

use storage::driver_tests::test_types;

/// Open a driver on a fresh database file inside `dir`.
async fn open_driver(dir: &TempDir) -> SqliteDriver {
    let path = dir.path().join("events.db");
    let pool = connect(&format!("sqlite:{}", path.display()), 5)
        .await
        .expect("Failed to connect to SQLite");

    let driver = SqliteDriver::new(pool, test_types());
    driver.init().await.expect("Failed to create schema");
    driver
}

#[tokio::test]
async fn test_sqlite_event_driver() {
    println!("=== SQLite EventDriver Tests ===");

    let dir = TempDir::new().unwrap();
    let driver = open_driver(&dir).await;

    run_driver_tests!(&driver);

    println!("=== All SQLite EventDriver tests PASSED ===");
}

#[tokio::test]
async fn test_sqlite_init_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let driver = open_driver(&dir).await;

    driver
        .attach("orders/1", &EventEnvelope::new("TestCreated"), &[])
        .await
        .unwrap();
    driver.init().await.expect("second init should succeed");

    let version = driver
        .attach("orders/1", &EventEnvelope::new("TestCreated"), &[])
        .await
        .unwrap();
    assert_eq!(version, Some(1), "init must not drop existing events");
}

#[tokio::test]
async fn test_sqlite_omits_absent_columns() {
    let dir = TempDir::new().unwrap();
    let driver = open_driver(&dir).await;

    driver
        .attach("orders/1", &EventEnvelope::new("TestCreated"), &[])
        .await
        .unwrap();

    let (categories, data, aggregate): (Option<String>, Option<String>, Option<String>) =
        sqlx::query_as("SELECT event_categories, data, aggregate_id FROM sys_event_store")
            .fetch_one(driver.pool())
            .await
            .unwrap();
    assert!(categories.is_none());
    assert!(data.is_none());
    assert!(aggregate.is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_sqlite_concurrent_appends_get_unique_versions() {
    const WRITERS: u64 = 10;

    let dir = TempDir::new().unwrap();
    let driver = Arc::new(open_driver(&dir).await);

    let mut handles = Vec::new();
    for _ in 0..WRITERS {
        let driver = driver.clone();
        handles.push(tokio::spawn(async move {
            driver
                .attach("contended", &EventEnvelope::new("TestCreated"), &[])
                .await
        }));
    }

    let mut versions = Vec::new();
    for handle in handles {
        let version = handle.await.unwrap().expect("append should succeed");
        versions.push(version.unwrap());
    }
    versions.sort_unstable();
    assert_eq!(versions, (0..WRITERS).collect::<Vec<_>>());
}
