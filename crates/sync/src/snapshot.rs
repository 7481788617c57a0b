//! One-shot roster fetch.

use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::store::{EntityRecord, EntityStore};
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use tracing::info;

/// Where the initial entity set comes from
#[async_trait]
pub trait RosterSource: Send + Sync {
    /// Perform exactly one roster request.
    async fn fetch(&self) -> Result<Vec<EntityRecord>, SyncError>;

    /// Human-readable location, for logs
    fn describe(&self) -> String;
}

/// Roster served as a JSON array over HTTP
pub struct HttpRosterSource {
    client: Client,
    url: String,
}

impl HttpRosterSource {
    pub fn new(url: impl Into<String>, config: &SyncConfig) -> Self {
        Self {
            client: Client::builder()
                .http1_only()
                .timeout(config.request_timeout())
                .build()
                .unwrap_or_else(|_| Client::new()),
            url: url.into(),
        }
    }

    pub fn from_config(config: &SyncConfig) -> Self {
        Self::new(config.snapshot_url(), config)
    }
}

#[async_trait]
impl RosterSource for HttpRosterSource {
    async fn fetch(&self) -> Result<Vec<EntityRecord>, SyncError> {
        info!("Fetching roster snapshot from: {}", self.url);
        let response = self
            .client
            .get(&self.url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| SyncError::transport(&self.url, format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(SyncError::transport(
                &self.url,
                format!("roster endpoint returned {}: {}", status, error_text),
            ));
        }

        response
            .json::<Vec<EntityRecord>>()
            .await
            .map_err(|e| SyncError::transport(&self.url, format!("roster json parse failed: {}", e)))
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

/// Seeds the entity store from a roster source. Never retries on its own.
#[derive(Clone)]
pub struct SnapshotLoader {
    source: Arc<dyn RosterSource>,
}

impl SnapshotLoader {
    pub fn new(source: Arc<dyn RosterSource>) -> Self {
        Self { source }
    }

    pub fn from_config(config: &SyncConfig) -> Self {
        Self::new(Arc::new(HttpRosterSource::from_config(config)))
    }

    /// Fetch the full roster.
    pub async fn load(&self) -> Result<Vec<EntityRecord>, SyncError> {
        let records = self.source.fetch().await?;
        info!(
            "Roster snapshot from {} has {} records",
            self.source.describe(),
            records.len()
        );
        Ok(records)
    }

    /// Fetch and fully replace `store`. On failure `store` is left as it was.
    pub async fn load_into(&self, store: &mut EntityStore) -> Result<usize, SyncError> {
        let records = self.load().await?;
        Ok(store.replace_all(records))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio_test::{assert_err, assert_ok};

    struct CountingRoster {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl RosterSource for CountingRoster {
        async fn fetch(&self) -> Result<Vec<EntityRecord>, SyncError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(SyncError::transport("mem://roster", "connection refused"))
            } else {
                Ok(vec![EntityRecord::new("F1", "Alice", "10", "A")])
            }
        }

        fn describe(&self) -> String {
            "mem://roster".to_string()
        }
    }

    #[tokio::test]
    async fn load_into_replaces_store_with_one_request() {
        let source = Arc::new(CountingRoster {
            calls: AtomicUsize::new(0),
            fail: false,
        });
        let loader = SnapshotLoader::new(source.clone());
        let mut store = EntityStore::new();
        store.replace_all(vec![EntityRecord::new("OLD", "Stale", "9", "Z")]);

        let count = assert_ok!(loader.load_into(&mut store).await);

        assert_eq!(count, 1);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert!(store.get("OLD").is_none());
        assert!(store.get("F1").is_some());
    }

    #[tokio::test]
    async fn failed_load_leaves_store_untouched() {
        let source = Arc::new(CountingRoster {
            calls: AtomicUsize::new(0),
            fail: true,
        });
        let loader = SnapshotLoader::new(source.clone());
        let mut store = EntityStore::new();

        let err = assert_err!(loader.load_into(&mut store).await);

        assert!(matches!(err, SyncError::Transport { .. }));
        assert!(store.is_empty());
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unreachable_http_roster_is_a_transport_error() {
        let config = SyncConfig::default();
        // Port 9 (discard) on loopback is not expected to serve HTTP.
        let source = HttpRosterSource::new("http://127.0.0.1:9/students", &config);
        let err = assert_err!(source.fetch().await);
        assert!(matches!(err, SyncError::Transport { .. }));
    }
}
