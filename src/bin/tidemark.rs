//! tidemark: store availability probe
//!
//! Loads the configuration, opens the configured storage backend (creating
//! its schema if missing) and reports each enrolled store with the scope it
//! is concerned with and whether its backend answers.
//!
//! ## Usage
//! ```text
//! tidemark [CONFIG_PATH]
//! ```
//!
//! ## Configuration
//! - TIDEMARK_CONFIG: configuration file (optional)
//! - TIDEMARK__STORAGE__TYPE etc.: overrides of individual settings
//! - TIDEMARK_LOG: log filter (default: info)
//!
//! Exits with status 1 if any store is unavailable.

use std::sync::Arc;

use tracing::{error, info};

use tidemark::config::Config;
use tidemark::events::EventTypes;
use tidemark::store::EventStorePool;
use tidemark::utils::bootstrap::init_tracing;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let path = std::env::args().nth(1);
    let config = Config::load(path.as_deref())?;

    let pool = EventStorePool::from_config(&config, Arc::new(EventTypes::new())).await?;

    let mut unavailable = 0;
    for (concerning, store) in pool.enrolments() {
        let available = store.is_available().await;
        if available {
            info!(store = %store.name(), concerning = %concerning, "Store available");
        } else {
            error!(store = %store.name(), concerning = %concerning, "Store unavailable");
            unavailable += 1;
        }
        println!(
            "{}\t{}\t{}",
            store.name(),
            concerning,
            if available { "available" } else { "unavailable" }
        );
    }

    if unavailable > 0 {
        std::process::exit(1);
    }
    Ok(())
}
