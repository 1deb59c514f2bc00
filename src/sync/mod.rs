//! Persistence coordination
//!
//! Keeps the in-memory catalogue eventually consistent with two sinks: a
//! synchronous local store mirrored on every change, and an optional remote
//! store written through a debounced flush. Two failure modes are designed
//! out here: a fresh page load must never overwrite the user's remote data
//! with an empty default, and rapid edits must never turn into a remote
//! write storm.
//!
//! The in-memory catalogue is always the source of truth for the current
//! session; persistence is best-effort relative to it and never rolls a
//! mutation back.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use crate::catalog::Catalog;
use crate::error::Result;

pub mod local;
pub mod remote;

pub use local::{FileStore, LocalSink, MemoryStore};
pub use remote::{HttpRemote, MemoryRemote, RemoteSink};

/// Default local-sink payload cap: past this the write is skipped and a
/// warning surfaced, never a silent truncation.
pub const DEFAULT_LOCAL_LIMIT_BYTES: usize = 4 * 1024 * 1024;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(1500);

/// Coordinator configuration, created once per application session. No
/// ambient globals: everything the coordinator needs rides in here.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub debounce: Duration,
    pub local_limit_bytes: usize,
    /// Key the catalogue document is stored under in the local sink.
    pub local_key: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            local_limit_bytes: DEFAULT_LOCAL_LIMIT_BYTES,
            local_key: "session-log".to_string(),
        }
    }
}

/// Which sink supplied the initial catalogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadSource {
    Remote,
    Local,
    Empty,
}

#[derive(Debug, Clone)]
pub struct LoadOutcome {
    pub catalog: Catalog,
    pub source: LoadSource,
}

/// Outcome of the unconditional local mirror on a change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalWrite {
    Written,
    /// Serialized payload exceeded the configured limit; nothing written.
    SkippedOversize { size: usize },
    /// The sink rejected the write (quota). Reported, not retried.
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoadState {
    NotLoaded,
    Loading,
    Loaded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlushState {
    Idle,
    Dirty,
    Flushing,
}

struct Inner {
    load_state: LoadState,
    flush_state: FlushState,
    /// Count of user edits not yet confirmed written to the remote sink.
    pending: u64,
    /// Bumped on every qualifying change; a debounce timer only fires if its
    /// generation is still current (reset, not accumulate).
    generation: u64,
    latest: Catalog,
    /// Serialization of the last state the remote sink confirmed.
    last_synced: Option<String>,
}

pub struct SyncCoordinator {
    local: Arc<dyn LocalSink>,
    remote: Option<Arc<dyn RemoteSink>>,
    config: SyncConfig,
    inner: Mutex<Inner>,
}

impl SyncCoordinator {
    pub fn new(
        local: Arc<dyn LocalSink>,
        remote: Option<Arc<dyn RemoteSink>>,
        config: SyncConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            local,
            remote,
            config,
            inner: Mutex::new(Inner {
                load_state: LoadState::NotLoaded,
                flush_state: FlushState::Idle,
                pending: 0,
                generation: 0,
                latest: Catalog::default(),
                last_synced: None,
            }),
        })
    }

    pub fn remote_enabled(&self) -> bool {
        self.remote.is_some()
    }

    /// Initial load. Performs sink I/O exactly once per coordinator; repeat
    /// calls (duplicate mounts) return the in-memory snapshot.
    ///
    /// With the remote sink enabled it is the sole authority: a remote
    /// failure yields an empty catalogue, never a stale or foreign local
    /// copy. With it disabled, the local sink is consulted.
    pub async fn load(&self) -> LoadOutcome {
        let mut inner = self.inner.lock().await;
        if inner.load_state == LoadState::Loaded {
            return LoadOutcome {
                catalog: inner.latest.clone(),
                source: LoadSource::Empty,
            };
        }
        inner.load_state = LoadState::Loading;

        let outcome = match &self.remote {
            Some(remote) => match remote.load().await {
                Ok(Some(catalog)) => {
                    log::info!("load: adopted remote document ({} objects)", catalog.objects.len());
                    inner.last_synced = serde_json::to_string(&catalog).ok();
                    LoadOutcome {
                        catalog,
                        source: LoadSource::Remote,
                    }
                }
                Ok(None) => {
                    log::info!("load: remote has no document yet");
                    LoadOutcome {
                        catalog: Catalog::default(),
                        source: LoadSource::Empty,
                    }
                }
                Err(e) => {
                    log::error!("load: remote failed, starting empty: {}", e);
                    LoadOutcome {
                        catalog: Catalog::default(),
                        source: LoadSource::Empty,
                    }
                }
            },
            None => match self.local.get(&self.config.local_key) {
                Some(raw) if !raw.is_empty() => match serde_json::from_str::<Catalog>(&raw) {
                    Ok(catalog) => {
                        log::info!("load: adopted local document ({} objects)", catalog.objects.len());
                        LoadOutcome {
                            catalog,
                            source: LoadSource::Local,
                        }
                    }
                    Err(e) => {
                        log::warn!("load: local document unparseable, starting empty: {}", e);
                        LoadOutcome {
                            catalog: Catalog::default(),
                            source: LoadSource::Empty,
                        }
                    }
                },
                _ => LoadOutcome {
                    catalog: Catalog::default(),
                    source: LoadSource::Empty,
                },
            },
        };

        inner.latest = outcome.catalog.clone();
        inner.load_state = LoadState::Loaded;
        outcome
    }

    /// Record a user mutation: snapshot the catalogue, mirror it to the
    /// local sink (size-guarded), and schedule a debounced remote flush.
    /// Each call resets the debounce window.
    pub async fn note_change(self: &Arc<Self>, catalog: Catalog) -> Result<LocalWrite> {
        let (generation, serialized) = {
            let mut inner = self.inner.lock().await;
            if inner.load_state != LoadState::Loaded {
                log::warn!("note_change: change recorded before initial load completed");
            }
            inner.latest = catalog;
            inner.pending += 1;
            inner.generation += 1;
            inner.flush_state = FlushState::Dirty;
            (inner.generation, serde_json::to_string(&inner.latest)?)
        };

        let local_write = if serialized.len() > self.config.local_limit_bytes {
            log::warn!(
                "note_change: payload is {} bytes, over the {} byte local limit; local write skipped",
                serialized.len(),
                self.config.local_limit_bytes
            );
            LocalWrite::SkippedOversize {
                size: serialized.len(),
            }
        } else {
            match self.local.set(&self.config.local_key, &serialized) {
                Ok(()) => LocalWrite::Written,
                Err(e) => {
                    log::warn!("note_change: local write failed: {}", e);
                    LocalWrite::Failed(e.to_string())
                }
            }
        };

        if self.remote.is_some() {
            let coordinator = Arc::clone(self);
            tokio::spawn(async move {
                tokio::time::sleep(coordinator.config.debounce).await;
                if let Err(e) = coordinator.flush_if_current(generation).await {
                    log::error!("debounced flush failed, will retry on next change: {}", e);
                }
            });
        }

        Ok(local_write)
    }

    /// Schedule a debounced flush without marking anything dirty. A render
    /// pass right after load goes through here and must produce zero remote
    /// writes.
    pub fn nudge(self: &Arc<Self>) {
        if self.remote.is_none() {
            return;
        }
        let coordinator = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(coordinator.config.debounce).await;
            let generation = coordinator.inner.lock().await.generation;
            if let Err(e) = coordinator.flush_if_current(generation).await {
                log::error!("nudged flush failed: {}", e);
            }
        });
    }

    /// Immediate remote write bypassing the debounce. Used after bulk
    /// operations where the caller needs a definitive success/failure.
    pub async fn force_sync(&self) -> Result<()> {
        let (snapshot, generation) = {
            let mut inner = self.inner.lock().await;
            inner.flush_state = FlushState::Flushing;
            (inner.latest.clone(), inner.generation)
        };
        self.write_remote(snapshot, generation).await
    }

    /// Best-effort flush of any pending state before teardown.
    pub async fn shutdown(&self) {
        let pending = self.inner.lock().await.pending;
        if pending == 0 {
            return;
        }
        if let Err(e) = self.force_sync().await {
            log::warn!("shutdown: final flush failed, {} changes unsynced: {}", pending, e);
        }
    }

    /// User edits not yet confirmed written to the remote sink.
    pub async fn pending_changes(&self) -> u64 {
        self.inner.lock().await.pending
    }

    /// Current in-memory snapshot held by the coordinator.
    pub async fn latest(&self) -> Catalog {
        self.inner.lock().await.latest.clone()
    }

    async fn flush_if_current(&self, generation: u64) -> Result<()> {
        let snapshot = {
            let mut inner = self.inner.lock().await;
            if inner.generation != generation {
                return Ok(()); // superseded by a newer change's timer
            }
            if inner.pending == 0 {
                return Ok(()); // load or no-op re-render, not a user edit
            }
            if inner.flush_state == FlushState::Flushing {
                return Ok(());
            }
            inner.flush_state = FlushState::Flushing;
            inner.latest.clone()
        };
        self.write_remote(snapshot, generation).await
    }

    async fn write_remote(&self, snapshot: Catalog, generation: u64) -> Result<()> {
        let Some(remote) = &self.remote else {
            let mut inner = self.inner.lock().await;
            inner.flush_state = FlushState::Idle;
            inner.pending = 0;
            return Ok(());
        };

        let serialized = serde_json::to_string(&snapshot)?;
        {
            let mut inner = self.inner.lock().await;
            if inner.last_synced.as_deref() == Some(serialized.as_str()) {
                // Nothing new to write; counts as success.
                inner.flush_state = FlushState::Idle;
                if inner.generation == generation {
                    inner.pending = 0;
                }
                return Ok(());
            }
        }

        match remote.save(&snapshot).await {
            Ok(()) => {
                let mut inner = self.inner.lock().await;
                inner.last_synced = Some(serialized);
                if inner.generation == generation {
                    // No edit raced the in-flight save; all pending changes
                    // are in the snapshot just written.
                    inner.pending = 0;
                    inner.flush_state = FlushState::Idle;
                } else {
                    inner.flush_state = FlushState::Dirty;
                }
                log::info!("sync: remote write ok");
                Ok(())
            }
            Err(e) => {
                let mut inner = self.inner.lock().await;
                inner.flush_state = FlushState::Dirty;
                Err(e)
            }
        }
    }
}
