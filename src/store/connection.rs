//! Process-lifetime store handle.
//!
//! A [`Database`] is built once at startup and carried in the application
//! state. The first call to [`Database::connect`] opens the store; every later
//! call gets the same handle back. Concurrent first callers wait on a single
//! in-flight attempt, and a failed attempt leaves nothing cached so the next
//! caller tries again.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::OnceCell;

use super::{SqliteStore, Store};
use crate::error::{Error, Result};

/// Opens a store. Called at most once per successful connection.
pub trait Connector: Send + Sync + 'static {
    fn connect(&self) -> Result<Arc<dyn Store>>;
}

/// Connects to a SQLite database named by a connection string.
///
/// Accepts `sqlite://<path>`, `sqlite:<path>`, a bare path, or `:memory:`.
#[derive(Debug, Clone)]
pub struct SqliteConnector {
    url: String,
}

impl SqliteConnector {
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    fn location(&self) -> Result<Option<PathBuf>> {
        let raw = self
            .url
            .strip_prefix("sqlite://")
            .or_else(|| self.url.strip_prefix("sqlite:"))
            .unwrap_or(&self.url);

        match raw {
            "" => Err(Error::Config("database url is empty".to_string())),
            ":memory:" => Ok(None),
            path => Ok(Some(PathBuf::from(path))),
        }
    }
}

impl Connector for SqliteConnector {
    fn connect(&self) -> Result<Arc<dyn Store>> {
        let store = match self.location()? {
            Some(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent)?;
                }
                SqliteStore::new(&path)?
            }
            None => SqliteStore::in_memory()?,
        };
        store.initialize()?;
        Ok(Arc::new(store))
    }
}

pub struct Database {
    connector: Arc<dyn Connector>,
    handle: OnceCell<Arc<dyn Store>>,
}

impl Database {
    pub fn new(connector: impl Connector) -> Self {
        Self {
            connector: Arc::new(connector),
            handle: OnceCell::new(),
        }
    }

    /// Returns the shared store handle, opening it on first use.
    pub async fn connect(&self) -> Result<Arc<dyn Store>> {
        let store = self
            .handle
            .get_or_try_init(|| async {
                let connector = Arc::clone(&self.connector);
                tracing::info!("Connecting to store");
                let store = tokio::task::spawn_blocking(move || connector.connect())
                    .await
                    .map_err(|e| Error::Connection(e.to_string()))?
                    .inspect_err(|e| tracing::warn!("Store connection failed: {e}"))?;
                tracing::info!("Store connected");
                Ok::<_, Error>(store)
            })
            .await?;
        Ok(Arc::clone(store))
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.handle.initialized()
    }
}
