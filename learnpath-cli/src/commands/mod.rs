pub mod config;
pub mod seed;
pub mod serve;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use learnpath_store::TursoStore;

use crate::config::StoreConfig;

/// Auth token for a remote `libsql://` database.
const DATABASE_TOKEN_ENV: &str = "LEARNPATH_DATABASE_TOKEN";

pub(crate) async fn open_store(config: &StoreConfig) -> Result<Arc<TursoStore>> {
    let store = if config.database == ":memory:" {
        TursoStore::new_memory().await
    } else if config.is_remote() {
        let token = std::env::var(DATABASE_TOKEN_ENV).unwrap_or_default();
        TursoStore::new_remote(&config.database, &token).await
    } else {
        TursoStore::new_local(Path::new(&config.database)).await
    };
    let store = store.with_context(|| format!("failed to open database {}", config.database))?;
    Ok(Arc::new(store))
}
