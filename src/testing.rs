//! Scripted collaborator doubles for tests.
//!
//! Each mock records its calls behind a `Mutex` so tests can assert how
//! often (and with what) the engine reached the platform boundary.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::device::{
    Camera, DeviceError, DeviceStore, GalleryPicker, PermissionRequester, Platform,
};
use crate::models::{Capability, PermissionState, PhotoReference, SearchOutcome};
use crate::search::{SearchError, SearchProvider, SearchResult};

/// Permission dialog double with a fixed default answer and optional
/// per-capability scripts consumed in order
pub struct MockPermissions {
    default: PermissionState,
    scripted: Mutex<HashMap<Capability, VecDeque<Result<PermissionState, String>>>>,
    requests: Mutex<usize>,
    latency: Mutex<Duration>,
}

impl MockPermissions {
    /// Every dialog resolves Granted unless scripted otherwise.
    pub fn granting() -> Self {
        Self::with_default(PermissionState::Granted)
    }

    /// Every dialog resolves Denied unless scripted otherwise.
    pub fn denying() -> Self {
        Self::with_default(PermissionState::Denied)
    }

    fn with_default(default: PermissionState) -> Self {
        Self {
            default,
            scripted: Mutex::new(HashMap::new()),
            requests: Mutex::new(0),
            latency: Mutex::new(Duration::ZERO),
        }
    }

    /// Queues one scripted answer for the capability.
    pub fn script(&self, capability: Capability, state: PermissionState) {
        self.scripted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(capability)
            .or_default()
            .push_back(Ok(state));
    }

    /// Queues one scripted platform failure for the capability.
    pub fn script_failure(&self, capability: Capability, cause: &str) {
        self.scripted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(capability)
            .or_default()
            .push_back(Err(cause.to_string()));
    }

    /// Makes every dialog take this long to resolve.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap_or_else(PoisonError::into_inner) = latency;
    }

    /// How many dialogs were shown.
    pub fn request_count(&self) -> usize {
        *self.requests.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl PermissionRequester for MockPermissions {
    async fn request(&self, capability: Capability) -> Result<PermissionState, DeviceError> {
        *self.requests.lock().unwrap_or_else(PoisonError::into_inner) += 1;
        let latency = *self.latency.lock().unwrap_or_else(PoisonError::into_inner);
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        let scripted = self
            .scripted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(&capability)
            .and_then(VecDeque::pop_front);
        match scripted {
            Some(Ok(state)) => Ok(state),
            Some(Err(cause)) => Err(DeviceError::Unavailable(cause)),
            None => Ok(self.default),
        }
    }
}

/// Device store double that records successful writes in completion order
#[derive(Default)]
pub struct MockDeviceStore {
    library: Mutex<Vec<String>>,
    saved: Mutex<Vec<String>>,
    save_failures: Mutex<HashMap<String, usize>>,
    enumerate_failure: Mutex<Option<String>>,
    enumerations: Mutex<usize>,
    latency: Mutex<Duration>,
}

impl MockDeviceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Presets the locators `enumerate` reports.
    pub fn set_library(&self, locators: &[&str]) {
        *self.library.lock().unwrap_or_else(PoisonError::into_inner) =
            locators.iter().map(|l| l.to_string()).collect();
    }

    /// Makes every store call take this long.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap_or_else(PoisonError::into_inner) = latency;
    }

    /// Fails the next `times` saves of this locator.
    pub fn fail_saves(&self, locator: &str, times: usize) {
        self.save_failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(locator.to_string(), times);
    }

    /// Fails every enumeration.
    pub fn fail_enumerate(&self, cause: &str) {
        *self
            .enumerate_failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(cause.to_string());
    }

    /// Successfully written locators, in completion order.
    pub fn saved(&self) -> Vec<String> {
        self.saved
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Successful writes of one locator.
    pub fn save_count(&self, locator: &str) -> usize {
        self.saved
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|saved| saved.as_str() == locator)
            .count()
    }

    /// Successful writes overall.
    pub fn total_saves(&self) -> usize {
        self.saved
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// How often the library was enumerated.
    pub fn enumerate_count(&self) -> usize {
        *self
            .enumerations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl DeviceStore for MockDeviceStore {
    async fn save_to_library(&self, locator: &str) -> Result<(), DeviceError> {
        let latency = *self.latency.lock().unwrap_or_else(PoisonError::into_inner);
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        {
            let mut failures = self
                .save_failures
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if let Some(remaining) = failures.get_mut(locator) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(DeviceError::Unavailable(format!(
                        "scripted save failure for {}",
                        locator
                    )));
                }
            }
        }
        self.saved
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(locator.to_string());
        Ok(())
    }

    async fn enumerate(&self) -> Result<Vec<String>, DeviceError> {
        *self
            .enumerations
            .lock()
            .unwrap_or_else(PoisonError::into_inner) += 1;
        let failure = self
            .enumerate_failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(cause) = failure {
            return Err(DeviceError::Unavailable(cause));
        }
        Ok(self
            .library
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }
}

/// Camera double that serves scripted shots in order
pub struct MockCamera {
    shots: Mutex<VecDeque<String>>,
    failure: Option<String>,
    captures: Mutex<usize>,
}

impl MockCamera {
    pub fn with_shots(locators: &[&str]) -> Self {
        Self {
            shots: Mutex::new(locators.iter().map(|l| l.to_string()).collect()),
            failure: None,
            captures: Mutex::new(0),
        }
    }

    /// Every shutter press fails with this cause.
    pub fn failing(cause: &str) -> Self {
        Self {
            shots: Mutex::new(VecDeque::new()),
            failure: Some(cause.to_string()),
            captures: Mutex::new(0),
        }
    }

    pub fn capture_count(&self) -> usize {
        *self.captures.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Camera for MockCamera {
    async fn capture_photo(&self) -> Result<String, DeviceError> {
        *self.captures.lock().unwrap_or_else(PoisonError::into_inner) += 1;
        if let Some(cause) = &self.failure {
            return Err(DeviceError::Unavailable(cause.clone()));
        }
        self.shots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .ok_or_else(|| DeviceError::Unavailable("no more scripted shots".to_string()))
    }
}

/// Gallery picker double with a fixed selection
pub struct MockPicker {
    selection: Vec<String>,
    picks: Mutex<usize>,
}

impl MockPicker {
    pub fn with_selection(locators: &[&str]) -> Self {
        Self {
            selection: locators.iter().map(|l| l.to_string()).collect(),
            picks: Mutex::new(0),
        }
    }

    /// The user dismisses every picker dialog.
    pub fn cancelling() -> Self {
        Self::with_selection(&[])
    }

    pub fn pick_count(&self) -> usize {
        *self.picks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl GalleryPicker for MockPicker {
    async fn pick_photos(&self) -> Result<Vec<String>, DeviceError> {
        *self.picks.lock().unwrap_or_else(PoisonError::into_inner) += 1;
        Ok(self.selection.clone())
    }
}

struct ScriptedSearch {
    delay: Duration,
    outcome: Result<SearchOutcome, String>,
}

/// Search provider double serving scripted outcomes in call order
///
/// An exhausted script answers NoResults.
pub struct MockSearchProvider {
    responses: Mutex<VecDeque<ScriptedSearch>>,
    requests: Mutex<Vec<(String, u8)>>,
}

impl MockSearchProvider {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queues a hit list answering the next search.
    pub fn script_hits(&self, locators: &[&str]) {
        self.script_hits_after(locators, Duration::ZERO);
    }

    /// Queues a hit list that takes `delay` to arrive.
    pub fn script_hits_after(&self, locators: &[&str], delay: Duration) {
        let hits = locators
            .iter()
            .map(|l| PhotoReference::remote(l.to_string()))
            .collect();
        self.push(ScriptedSearch {
            delay,
            outcome: Ok(SearchOutcome::Hits(hits)),
        });
    }

    /// Queues an empty result.
    pub fn script_no_results(&self) {
        self.push(ScriptedSearch {
            delay: Duration::ZERO,
            outcome: Ok(SearchOutcome::NoResults),
        });
    }

    /// Queues a failed request.
    pub fn script_failure(&self, cause: &str) {
        self.push(ScriptedSearch {
            delay: Duration::ZERO,
            outcome: Err(cause.to_string()),
        });
    }

    /// The `(keyword, per_page)` pairs searched so far.
    pub fn requests(&self) -> Vec<(String, u8)> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn push(&self, scripted: ScriptedSearch) {
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(scripted);
    }
}

impl Default for MockSearchProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SearchProvider for MockSearchProvider {
    async fn search(&self, keyword: &str, per_page: u8) -> SearchResult<SearchOutcome> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((keyword.to_string(), per_page));
        let scripted = self
            .responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        match scripted {
            Some(scripted) => {
                if !scripted.delay.is_zero() {
                    tokio::time::sleep(scripted.delay).await;
                }
                scripted.outcome.map_err(|cause| SearchError::Request {
                    keyword: keyword.to_string(),
                    cause,
                })
            }
            None => Ok(SearchOutcome::NoResults),
        }
    }
}

/// The four platform collaborators as one scripted bundle
pub struct MockPlatform {
    pub permissions: Arc<MockPermissions>,
    pub store: Arc<MockDeviceStore>,
    pub camera: Arc<MockCamera>,
    pub picker: Arc<MockPicker>,
}

impl MockPlatform {
    /// Every permission dialog resolves Granted.
    pub fn granting() -> Self {
        Self::with_permissions(MockPermissions::granting())
    }

    /// Every permission dialog resolves Denied.
    pub fn denying() -> Self {
        Self::with_permissions(MockPermissions::denying())
    }

    fn with_permissions(permissions: MockPermissions) -> Self {
        Self {
            permissions: Arc::new(permissions),
            store: Arc::new(MockDeviceStore::new()),
            camera: Arc::new(MockCamera::with_shots(&[])),
            picker: Arc::new(MockPicker::cancelling()),
        }
    }

    /// Assembles the collaborators into a `Platform` handle.
    pub fn platform(&self) -> Platform {
        Platform {
            permissions: self.permissions.clone(),
            store: self.store.clone(),
            camera: self.camera.clone(),
            picker: self.picker.clone(),
        }
    }
}
