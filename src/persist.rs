//! Save coordination against the device store.
//!
//! The coordinator owns the per-locator save lifecycle
//! (Unsaved -> Saving -> Saved | Failed) and guarantees at most one
//! in-flight device write per locator: a second save of the same locator
//! while one is running joins the running attempt and observes its outcome
//! instead of issuing a duplicate write. Saves of different locators run
//! fully in parallel; there is no global lock and no ordering among their
//! completions.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinSet;

use crate::collection::PhotoCollection;
use crate::device::DeviceStore;
use crate::models::{BatchSaveReport, Capability, PermissionState, PhotoReference, SaveState};
use crate::permissions::PermissionGate;

/// Result type for save operations
pub type SaveResult<T> = Result<T, SaveError>;

/// Errors that can occur while persisting a reference
#[derive(Debug, Clone, PartialEq)]
pub enum SaveError {
    /// Library write permission is not granted
    PermissionMissing(Capability),
    /// The device store rejected the write for this locator
    Write { locator: String, cause: String },
}

impl std::fmt::Display for SaveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SaveError::PermissionMissing(capability) => {
                write!(f, "Permission missing: {}", capability.display_name())
            }
            SaveError::Write { locator, cause } => {
                write!(f, "Saving {} failed: {}", locator, cause)
            }
        }
    }
}

impl std::error::Error for SaveError {}

/// Outcome broadcast to callers that joined an in-flight save
type SaveSignal = Option<Result<DateTime<Utc>, String>>;

enum Slot {
    Saving(watch::Receiver<SaveSignal>),
    Saved(DateTime<Utc>),
    Failed(String),
}

enum Claim {
    /// The locator is already durable
    Done(DateTime<Utc>),
    /// Another call is writing this locator; observe its outcome
    Join(watch::Receiver<SaveSignal>),
    /// This call owns the write
    Perform(watch::Sender<SaveSignal>),
}

/// Coordinates writes into the device store
///
/// Cheap to clone; clones share the same lifecycle map.
#[derive(Clone)]
pub struct PersistenceCoordinator {
    gate: PermissionGate,
    store: Arc<dyn DeviceStore>,
    collection: PhotoCollection,
    slots: Arc<Mutex<HashMap<String, Slot>>>,
}

impl PersistenceCoordinator {
    /// Create a new coordinator writing into `store`
    pub fn new(
        gate: PermissionGate,
        store: Arc<dyn DeviceStore>,
        collection: PhotoCollection,
    ) -> Self {
        Self {
            gate,
            store,
            collection,
            slots: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Saves one reference to the device store.
    ///
    /// A reference that is already durable returns its existing timestamp
    /// without touching the device or the permission gate. Without write
    /// permission the reference never leaves Unsaved. A failed attempt may
    /// be retried by calling save again; nothing retries automatically.
    pub async fn save(&self, reference: &PhotoReference) -> SaveResult<DateTime<Utc>> {
        if let Some(saved_at) = reference.saved_at {
            return Ok(saved_at);
        }

        if self.gate.ensure(Capability::LibraryWrite).await != PermissionState::Granted {
            log::info!(
                "Save of {} blocked: library write not granted",
                reference.locator
            );
            return Err(SaveError::PermissionMissing(Capability::LibraryWrite));
        }

        let locator = reference.locator.clone();
        let claim = {
            let mut slots = self.lock();
            match slots.get(&locator) {
                Some(Slot::Saved(saved_at)) => Claim::Done(*saved_at),
                Some(Slot::Saving(pending)) => Claim::Join(pending.clone()),
                Some(Slot::Failed(_)) | None => {
                    let (outcome, pending) = watch::channel(None);
                    slots.insert(locator.clone(), Slot::Saving(pending));
                    Claim::Perform(outcome)
                }
            }
        };

        match claim {
            Claim::Done(saved_at) => Ok(saved_at),
            Claim::Join(mut pending) => {
                log::debug!("Joining in-flight save for {}", locator);
                let signal = match pending.wait_for(|signal| signal.is_some()).await {
                    Ok(signal) => (*signal).clone(),
                    Err(_) => None,
                };
                match signal {
                    Some(Ok(saved_at)) => Ok(saved_at),
                    Some(Err(cause)) => Err(SaveError::Write { locator, cause }),
                    None => Err(SaveError::Write {
                        locator,
                        cause: "save attempt ended without a result".to_string(),
                    }),
                }
            }
            Claim::Perform(outcome) => self.perform(locator, outcome).await,
        }
    }

    /// Saves every reference concurrently and reports the aggregate outcome.
    ///
    /// One failure does not stop the others and nothing is rolled back;
    /// references written before a failure stay written. An empty input is
    /// an AllSucceeded of zero.
    pub async fn save_all(&self, references: &[PhotoReference]) -> BatchSaveReport {
        let total = references.len();
        log::info!("Saving {} photos to the device store", total);

        let mut tasks = JoinSet::new();
        for reference in references {
            let coordinator = self.clone();
            let reference = reference.clone();
            tasks.spawn(async move {
                let locator = reference.locator.clone();
                let outcome = coordinator.save(&reference).await;
                (locator, outcome)
            });
        }

        let mut succeeded = HashSet::new();
        let mut failed = HashMap::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((locator, Ok(_))) => {
                    succeeded.insert(locator);
                }
                Ok((locator, Err(e))) => {
                    failed.insert(locator, e.to_string());
                }
                Err(e) => {
                    log::error!("Save task failed: {}", e);
                }
            }
        }

        if failed.is_empty() {
            log::info!("Saved all {} photos", total);
            BatchSaveReport::AllSucceeded {
                saved: succeeded.len(),
            }
        } else {
            log::warn!(
                "Saved {} of {} photos, {} failed",
                succeeded.len(),
                total,
                failed.len()
            );
            BatchSaveReport::PartialFailure { succeeded, failed }
        }
    }

    /// Save state for one locator.
    ///
    /// Only attempts made through this coordinator are tracked; references
    /// that were already durable on arrival never appear here.
    pub fn state(&self, locator: &str) -> SaveState {
        let slots = self.lock();
        match slots.get(locator) {
            Some(Slot::Saving(_)) => SaveState::Saving,
            Some(Slot::Saved(saved_at)) => SaveState::Saved(*saved_at),
            Some(Slot::Failed(cause)) => SaveState::Failed(cause.clone()),
            None => SaveState::Unsaved,
        }
    }

    async fn perform(
        &self,
        locator: String,
        outcome: watch::Sender<SaveSignal>,
    ) -> SaveResult<DateTime<Utc>> {
        log::debug!("Saving {} to the device store", locator);

        match self.store.save_to_library(&locator).await {
            Ok(()) => {
                let saved_at = Utc::now();
                self.lock().insert(locator.clone(), Slot::Saved(saved_at));
                self.collection.mark_saved(&locator, saved_at);
                log::info!("Saved {}", locator);
                let _ = outcome.send(Some(Ok(saved_at)));
                Ok(saved_at)
            }
            Err(e) => {
                let cause = e.to_string();
                self.lock()
                    .insert(locator.clone(), Slot::Failed(cause.clone()));
                log::error!("Saving {} failed: {}", locator, cause);
                let _ = outcome.send(Some(Err(cause.clone())));
                Err(SaveError::Write { locator, cause })
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Slot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockDeviceStore, MockPermissions};
    use std::time::Duration;

    fn init_logging() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn coordinator_with(
        permissions: Arc<MockPermissions>,
        store: Arc<MockDeviceStore>,
    ) -> (PersistenceCoordinator, PhotoCollection) {
        let collection = PhotoCollection::new();
        let gate = PermissionGate::new(permissions);
        let coordinator = PersistenceCoordinator::new(gate, store, collection.clone());
        (coordinator, collection)
    }

    fn remote(locator: &str) -> PhotoReference {
        PhotoReference::remote(locator.to_string())
    }

    #[tokio::test]
    async fn test_save_writes_and_stamps() {
        let permissions = Arc::new(MockPermissions::granting());
        let store = Arc::new(MockDeviceStore::new());
        let (coordinator, collection) = coordinator_with(permissions, store.clone());

        let reference = remote("https://cdn.example.com/a.jpg");
        collection.ingest(vec![reference.clone()]);

        let saved_at = coordinator.save(&reference).await.unwrap();
        assert_eq!(store.saved(), vec!["https://cdn.example.com/a.jpg"]);
        assert_eq!(
            coordinator.state("https://cdn.example.com/a.jpg"),
            SaveState::Saved(saved_at)
        );
        assert_eq!(
            collection.get("https://cdn.example.com/a.jpg").unwrap().saved_at,
            Some(saved_at)
        );
    }

    #[tokio::test]
    async fn test_denied_save_stays_unsaved() {
        let permissions = Arc::new(MockPermissions::denying());
        let store = Arc::new(MockDeviceStore::new());
        let (coordinator, collection) = coordinator_with(permissions, store.clone());

        let reference = remote("x");
        collection.ingest(vec![reference.clone()]);

        let result = coordinator.save(&reference).await;
        assert_eq!(
            result,
            Err(SaveError::PermissionMissing(Capability::LibraryWrite))
        );
        assert_eq!(coordinator.state("x"), SaveState::Unsaved);
        assert_eq!(store.total_saves(), 0);
        assert!(collection.get("x").unwrap().saved_at.is_none());
    }

    #[tokio::test]
    async fn test_double_tap_is_one_device_write() {
        init_logging();
        let permissions = Arc::new(MockPermissions::granting());
        let store = Arc::new(MockDeviceStore::new());
        store.set_latency(Duration::from_millis(30));
        let (coordinator, collection) = coordinator_with(permissions, store.clone());

        let reference = remote("x");
        collection.ingest(vec![reference.clone()]);

        let (first, second) = tokio::join!(
            coordinator.save(&reference),
            coordinator.save(&reference),
        );
        let first = first.unwrap();
        let second = second.unwrap();
        assert_eq!(first, second);
        assert_eq!(store.save_count("x"), 1);
    }

    #[tokio::test]
    async fn test_failed_save_can_be_retried() {
        let permissions = Arc::new(MockPermissions::granting());
        let store = Arc::new(MockDeviceStore::new());
        store.fail_saves("x", 1);
        let (coordinator, collection) = coordinator_with(permissions, store.clone());

        let reference = remote("x");
        collection.ingest(vec![reference.clone()]);

        let first = coordinator.save(&reference).await;
        assert!(matches!(first, Err(SaveError::Write { .. })));
        assert!(matches!(coordinator.state("x"), SaveState::Failed(_)));

        let retried = coordinator.save(&reference).await;
        assert!(retried.is_ok());
        assert!(matches!(coordinator.state("x"), SaveState::Saved(_)));
        assert_eq!(store.save_count("x"), 1);
    }

    #[tokio::test]
    async fn test_durable_reference_is_not_rewritten() {
        let permissions = Arc::new(MockPermissions::granting());
        let store = Arc::new(MockDeviceStore::new());
        let (coordinator, _collection) = coordinator_with(permissions.clone(), store.clone());

        let observed_at = Utc::now();
        let reference = PhotoReference::library("old.jpg".to_string(), observed_at);

        let saved_at = coordinator.save(&reference).await.unwrap();
        assert_eq!(saved_at, observed_at);
        assert_eq!(store.total_saves(), 0);
        // No write intent, so no permission dialog either.
        assert_eq!(permissions.request_count(), 0);
    }

    #[tokio::test]
    async fn test_second_save_after_completion_reuses_timestamp() {
        let permissions = Arc::new(MockPermissions::granting());
        let store = Arc::new(MockDeviceStore::new());
        let (coordinator, collection) = coordinator_with(permissions, store.clone());

        let reference = remote("x");
        collection.ingest(vec![reference.clone()]);

        let first = coordinator.save(&reference).await.unwrap();
        // The caller may still hold the unsaved snapshot; the coordinator
        // remembers the completed write.
        let second = coordinator.save(&reference).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(store.save_count("x"), 1);
    }

    #[tokio::test]
    async fn test_save_all_reports_all_succeeded() {
        let permissions = Arc::new(MockPermissions::granting());
        let store = Arc::new(MockDeviceStore::new());
        let (coordinator, collection) = coordinator_with(permissions, store.clone());

        let refs = vec![remote("a"), remote("b"), remote("c")];
        collection.ingest(refs.clone());

        let report = coordinator.save_all(&refs).await;
        assert_eq!(report, BatchSaveReport::AllSucceeded { saved: 3 });
        assert_eq!(store.total_saves(), 3);
    }

    #[tokio::test]
    async fn test_save_all_partial_failure() {
        let permissions = Arc::new(MockPermissions::granting());
        let store = Arc::new(MockDeviceStore::new());
        store.fail_saves("b", 1);
        let (coordinator, collection) = coordinator_with(permissions, store.clone());

        let refs = vec![remote("a"), remote("b"), remote("c")];
        collection.ingest(refs.clone());

        let report = coordinator.save_all(&refs).await;
        match report {
            BatchSaveReport::PartialFailure { succeeded, failed } => {
                assert!(succeeded.contains("a"));
                assert!(succeeded.contains("c"));
                assert_eq!(succeeded.len(), 2);
                assert_eq!(failed.len(), 1);
                assert!(failed.contains_key("b"));
            }
            BatchSaveReport::AllSucceeded { .. } => panic!("expected a partial failure"),
        }

        assert!(matches!(coordinator.state("a"), SaveState::Saved(_)));
        assert!(matches!(coordinator.state("b"), SaveState::Failed(_)));
        assert!(matches!(coordinator.state("c"), SaveState::Saved(_)));
        // The failed photo is retryable and nothing was rolled back.
        assert_eq!(store.save_count("a"), 1);
        assert_eq!(store.save_count("c"), 1);
    }

    #[tokio::test]
    async fn test_save_all_empty_input() {
        let permissions = Arc::new(MockPermissions::granting());
        let store = Arc::new(MockDeviceStore::new());
        let (coordinator, _collection) = coordinator_with(permissions, store);

        let report = coordinator.save_all(&[]).await;
        assert_eq!(report, BatchSaveReport::AllSucceeded { saved: 0 });
    }

    #[tokio::test]
    async fn test_save_all_skips_durable_references() {
        let permissions = Arc::new(MockPermissions::granting());
        let store = Arc::new(MockDeviceStore::new());
        let (coordinator, collection) = coordinator_with(permissions, store.clone());

        let library = PhotoReference::library("old.jpg".to_string(), Utc::now());
        let fresh = remote("new.jpg");
        collection.ingest(vec![library.clone(), fresh.clone()]);

        let report = coordinator.save_all(&collection.all()).await;
        assert_eq!(report, BatchSaveReport::AllSucceeded { saved: 2 });
        assert_eq!(store.saved(), vec!["new.jpg"]);
    }

    #[tokio::test]
    async fn test_save_all_without_permission_shows_one_dialog() {
        let permissions = Arc::new(MockPermissions::denying());
        permissions.set_latency(Duration::from_millis(20));
        let store = Arc::new(MockDeviceStore::new());
        let (coordinator, collection) = coordinator_with(permissions.clone(), store.clone());

        let refs = vec![remote("a"), remote("b"), remote("c")];
        collection.ingest(refs.clone());

        let report = coordinator.save_all(&refs).await;
        match report {
            BatchSaveReport::PartialFailure { succeeded, failed } => {
                assert!(succeeded.is_empty());
                assert_eq!(failed.len(), 3);
            }
            BatchSaveReport::AllSucceeded { .. } => panic!("expected a partial failure"),
        }
        assert_eq!(store.total_saves(), 0);
        assert_eq!(permissions.request_count(), 1);
    }
}
