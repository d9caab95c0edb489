//! Tidemark - append-only event store
//!
//! Events are appended to named streams under per-stream versioning and read
//! back through selectors, a compact pattern language over stream names,
//! categories and event types.
//!
//! - [`selector`]: selector grammar and containment matching
//! - [`events`]: event model and explicit type registry
//! - [`storage`]: driver contract, SQL / memory / null drivers, event streams
//! - [`store`]: named stores, fan-out bundles and the store pool

pub mod config;
pub mod events;
pub mod selector;
pub mod storage;
pub mod store;
pub mod utils;
