//! Remote cloud sink
//!
//! The remote store is an opaque per-user document endpoint: load the whole
//! catalogue, save the whole catalogue. `HttpRemote` talks to it over JSON;
//! `MemoryRemote` backs tests with call counting and failure injection.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::catalog::Catalog;
use crate::error::{Error, Result};

#[async_trait]
pub trait RemoteSink: Send + Sync {
    /// Fetch the user's document; `None` when the user has no data yet.
    async fn load(&self) -> Result<Option<Catalog>>;

    /// Replace the user's document.
    async fn save(&self, catalog: &Catalog) -> Result<()>;
}

// ============================================================================
// HttpRemote
// ============================================================================

/// JSON document store over HTTP: GET/PUT `{base}/v1/log/{user}`.
pub struct HttpRemote {
    client: reqwest::Client,
    base_url: String,
    user: String,
}

impl HttpRemote {
    pub fn new(base_url: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            user: user.into(),
        }
    }

    fn document_url(&self) -> String {
        format!("{}/v1/log/{}", self.base_url.trim_end_matches('/'), self.user)
    }
}

#[async_trait]
impl RemoteSink for HttpRemote {
    async fn load(&self) -> Result<Option<Catalog>> {
        let response = self
            .client
            .get(self.document_url())
            .send()
            .await
            .map_err(|e| Error::RemoteSync(format!("load request failed: {}", e)))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(Error::RemoteSync(format!(
                "load returned {}",
                response.status()
            )));
        }

        let catalog = response
            .json::<Catalog>()
            .await
            .map_err(|e| Error::RemoteSync(format!("load body unreadable: {}", e)))?;
        Ok(Some(catalog))
    }

    async fn save(&self, catalog: &Catalog) -> Result<()> {
        let response = self
            .client
            .put(self.document_url())
            .json(catalog)
            .send()
            .await
            .map_err(|e| Error::RemoteSync(format!("save request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::RemoteSync(format!(
                "save returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}

// ============================================================================
// MemoryRemote
// ============================================================================

/// Test double: stores the last saved catalogue, counts calls, and can be
/// told to fail.
#[derive(Default)]
pub struct MemoryRemote {
    document: Mutex<Option<Catalog>>,
    save_count: AtomicUsize,
    load_count: AtomicUsize,
    fail_saves: AtomicBool,
    fail_loads: AtomicBool,
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(catalog: Catalog) -> Self {
        let remote = Self::default();
        *remote.document.lock().unwrap() = Some(catalog);
        remote
    }

    pub fn save_count(&self) -> usize {
        self.save_count.load(Ordering::SeqCst)
    }

    pub fn load_count(&self) -> usize {
        self.load_count.load(Ordering::SeqCst)
    }

    pub fn document(&self) -> Option<Catalog> {
        self.document.lock().unwrap().clone()
    }

    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_loads(&self, fail: bool) {
        self.fail_loads.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl RemoteSink for MemoryRemote {
    async fn load(&self) -> Result<Option<Catalog>> {
        self.load_count.fetch_add(1, Ordering::SeqCst);
        if self.fail_loads.load(Ordering::SeqCst) {
            return Err(Error::RemoteSync("injected load failure".into()));
        }
        Ok(self.document.lock().unwrap().clone())
    }

    async fn save(&self, catalog: &Catalog) -> Result<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(Error::RemoteSync("injected save failure".into()));
        }
        self.save_count.fetch_add(1, Ordering::SeqCst);
        *self.document.lock().unwrap() = Some(catalog.clone());
        Ok(())
    }
}
