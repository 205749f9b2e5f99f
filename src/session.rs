//! The engine's front door.
//!
//! A `PhotoSession` wires the collection, the permission gate, the save
//! coordinator, the search provider and the three acquisition flows
//! together and carries the mutable search state (current keyword and page
//! size). All methods take `&self`; the session is meant to be shared
//! across UI tasks.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use tokio::sync::watch;

use crate::collection::PhotoCollection;
use crate::device::Platform;
use crate::error::{EngineError, EngineResult};
use crate::models::{
    BatchSaveReport, Capability, PermissionState, PhotoReference, SaveState, SearchOutcome,
    StartReport,
};
use crate::permissions::PermissionGate;
use crate::persist::PersistenceCoordinator;
use crate::search::{RemoteSearchClient, SearchConfig, SearchProvider};
use crate::sources::{CaptureSource, LibraryScanner, PickerSource};

const DEFAULT_PER_PAGE: u8 = 10;
const MIN_PER_PAGE: u8 = 1;
const MAX_PER_PAGE: u8 = 50;

/// Configuration for a photo session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Remote provider settings
    pub search: SearchConfig,
    /// Initial search page size; adjustable later through `set_per_page`
    pub per_page: u8,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            search: SearchConfig::default(),
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

struct SessionState {
    query: String,
    per_page: u8,
}

/// One user-facing photo session over a platform
pub struct PhotoSession {
    collection: PhotoCollection,
    gate: PermissionGate,
    coordinator: PersistenceCoordinator,
    provider: Arc<dyn SearchProvider>,
    capture: CaptureSource,
    picker: PickerSource,
    scanner: LibraryScanner,
    state: Mutex<SessionState>,
}

impl PhotoSession {
    /// Create a session with the default configuration
    pub fn new(platform: Platform) -> Self {
        Self::with_config(platform, SessionConfig::default())
    }

    /// Create a session with a custom configuration
    pub fn with_config(platform: Platform, config: SessionConfig) -> Self {
        let provider = Arc::new(RemoteSearchClient::new(config.search));
        let session = Self::with_provider(platform, provider);
        session.set_per_page(config.per_page);
        session
    }

    /// Create a session over a caller-supplied search provider
    pub fn with_provider(platform: Platform, provider: Arc<dyn SearchProvider>) -> Self {
        let gate = PermissionGate::new(platform.permissions.clone());
        let collection = PhotoCollection::new();
        let coordinator = PersistenceCoordinator::new(
            gate.clone(),
            platform.store.clone(),
            collection.clone(),
        );
        let capture = CaptureSource::new(gate.clone(), platform.camera.clone());
        let picker = PickerSource::new(gate.clone(), platform.picker.clone());
        let scanner = LibraryScanner::new(gate.clone(), platform.store.clone());
        Self {
            collection,
            gate,
            coordinator,
            provider,
            capture,
            picker,
            scanner,
            state: Mutex::new(SessionState {
                query: String::new(),
                per_page: DEFAULT_PER_PAGE,
            }),
        }
    }

    /// Scans the device library once and merges it into the collection.
    ///
    /// A declined prompt or an unavailable library never fails the start;
    /// the report carries a user-facing advisory instead and the session
    /// stays fully usable.
    pub async fn start(&self) -> StartReport {
        log::info!("Starting photo session");
        let (library_photos, advisory) = match self.scanner.scan().await {
            Ok(scanned) => {
                let added = self.collection.ingest(scanned);
                let advisory = match self.gate.state(Capability::LibraryRead) {
                    PermissionState::Denied => Some(
                        "Library access was declined; photos already on this device are not shown."
                            .to_string(),
                    ),
                    _ => None,
                };
                (added, advisory)
            }
            Err(e) => {
                log::warn!("Library scan failed: {}", e);
                (0, Some(e.user_message()))
            }
        };
        StartReport {
            library_photos,
            library_permission: self.gate.state(Capability::LibraryRead),
            advisory,
        }
    }

    /// Searches the remote provider with the current keyword and page size.
    ///
    /// Hits are merged into the collection additively; earlier photos are
    /// never replaced or reordered. Overlapping searches are independent
    /// and merge in arrival order.
    pub async fn search(&self) -> EngineResult<SearchOutcome> {
        let (keyword, per_page) = {
            let state = self.lock_state();
            (state.query.clone(), state.per_page)
        };

        let outcome = self.provider.search(&keyword, per_page).await?;
        match &outcome {
            SearchOutcome::Hits(hits) => {
                let added = self.collection.ingest(hits.clone());
                log::info!(
                    "Search for \"{}\" returned {} photos, {} new",
                    keyword,
                    hits.len(),
                    added
                );
            }
            SearchOutcome::NoResults => {
                log::info!("Search for \"{}\" returned no results", keyword);
            }
        }
        Ok(outcome)
    }

    /// Takes a photo and saves it to the device library in one flow.
    ///
    /// The captured photo joins the collection before the save, so a failed
    /// save leaves it in the collection as unsaved and retryable.
    pub async fn capture_and_save(&self) -> EngineResult<PhotoReference> {
        let reference = self.capture.capture().await?;
        self.collection.ingest(vec![reference.clone()]);
        let saved_at = self.coordinator.save(&reference).await?;
        Ok(PhotoReference {
            saved_at: Some(saved_at),
            ..reference
        })
    }

    /// Opens the gallery picker and merges the selection into the collection.
    pub async fn pick(&self) -> EngineResult<Vec<PhotoReference>> {
        let picked = self.picker.pick().await?;
        if !picked.is_empty() {
            self.collection.ingest(picked.clone());
        }
        Ok(picked)
    }

    /// Saves one collection member to the device library.
    pub async fn save(&self, locator: &str) -> EngineResult<DateTime<Utc>> {
        let reference = self
            .collection
            .get(locator)
            .ok_or_else(|| EngineError::NotFound(locator.to_string()))?;
        Ok(self.coordinator.save(&reference).await?)
    }

    /// Saves every collection member, reporting the aggregate outcome.
    pub async fn save_all(&self) -> BatchSaveReport {
        self.coordinator.save_all(&self.collection.all()).await
    }

    pub fn photos(&self) -> Vec<PhotoReference> {
        self.collection.all()
    }

    pub fn photo_count(&self) -> usize {
        self.collection.len()
    }

    /// Revision feed for the presentation layer; ticks on every collection
    /// mutation.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.collection.subscribe()
    }

    /// Save state of one locator, durable references included.
    pub fn save_state(&self, locator: &str) -> SaveState {
        match self.collection.get(locator).and_then(|r| r.saved_at) {
            Some(saved_at) => SaveState::Saved(saved_at),
            None => self.coordinator.state(locator),
        }
    }

    /// Last observed permission state, without prompting.
    pub fn permission(&self, capability: Capability) -> PermissionState {
        self.gate.state(capability)
    }

    pub fn query(&self) -> String {
        self.lock_state().query.clone()
    }

    pub fn set_query(&self, query: String) {
        self.lock_state().query = query;
    }

    pub fn per_page(&self) -> u8 {
        self.lock_state().per_page
    }

    /// Sets the search page size, clamped to the provider's 1 to 50 window.
    pub fn set_per_page(&self, per_page: u8) {
        let clamped = per_page.clamp(MIN_PER_PAGE, MAX_PER_PAGE);
        if clamped != per_page {
            log::debug!("Clamped page size {} to {}", per_page, clamped);
        }
        self.lock_state().per_page = clamped;
    }

    fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
