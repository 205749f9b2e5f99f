//! Photo acquisition flows: camera capture, gallery picker and the
//! startup library scan. Each flow gates on its capability, talks to one
//! platform collaborator and maps the result into references; ingesting
//! those references into the collection is the session's job.

use std::sync::Arc;

use chrono::Utc;

use crate::device::{Camera, DeviceStore, GalleryPicker};
use crate::error::{EngineError, EngineResult};
use crate::models::{Capability, PermissionState, PhotoReference};
use crate::permissions::PermissionGate;

/// Takes photos with the device camera
pub struct CaptureSource {
    gate: PermissionGate,
    camera: Arc<dyn Camera>,
}

impl CaptureSource {
    pub fn new(gate: PermissionGate, camera: Arc<dyn Camera>) -> Self {
        Self { gate, camera }
    }

    /// One shutter press, one new Capture-origin reference.
    ///
    /// Without camera permission no device call is made. The captured photo
    /// is not saved to the library here.
    pub async fn capture(&self) -> EngineResult<PhotoReference> {
        if self.gate.ensure(Capability::Camera).await != PermissionState::Granted {
            log::info!("Capture blocked: camera not granted");
            return Err(EngineError::PermissionMissing(Capability::Camera));
        }

        let locator = self.camera.capture_photo().await?;
        log::info!("Captured {}", locator);
        Ok(PhotoReference::captured(locator))
    }
}

/// Presents the system gallery picker
pub struct PickerSource {
    gate: PermissionGate,
    picker: Arc<dyn GalleryPicker>,
}

impl PickerSource {
    pub fn new(gate: PermissionGate, picker: Arc<dyn GalleryPicker>) -> Self {
        Self { gate, picker }
    }

    /// Lets the user select photos from the device gallery.
    ///
    /// Closing the picker without a selection is an empty `Ok`, not an
    /// error.
    pub async fn pick(&self) -> EngineResult<Vec<PhotoReference>> {
        if self.gate.ensure(Capability::LibraryRead).await != PermissionState::Granted {
            log::info!("Picker blocked: library read not granted");
            return Err(EngineError::PermissionMissing(Capability::LibraryRead));
        }

        let selection = self.picker.pick_photos().await?;
        if selection.is_empty() {
            log::debug!("Picker closed without a selection");
        } else {
            log::info!("Picked {} photos", selection.len());
        }
        Ok(selection
            .into_iter()
            .map(PhotoReference::picked)
            .collect())
    }
}

/// Enumerates photos already present in the device library
pub struct LibraryScanner {
    gate: PermissionGate,
    store: Arc<dyn DeviceStore>,
}

impl LibraryScanner {
    pub fn new(gate: PermissionGate, store: Arc<dyn DeviceStore>) -> Self {
        Self { gate, store }
    }

    /// Lists the library as Library-origin references.
    ///
    /// Every reference carries the same enumeration timestamp as its
    /// `saved_at`; these photos are durable already. A declined library
    /// prompt is not an error here, the session reports it as an advisory.
    /// Enumeration failures do propagate.
    pub async fn scan(&self) -> EngineResult<Vec<PhotoReference>> {
        if self.gate.ensure(Capability::LibraryRead).await != PermissionState::Granted {
            log::info!("Library scan skipped: library read not granted");
            return Ok(Vec::new());
        }

        let locators = self.store.enumerate().await?;
        let observed_at = Utc::now();
        log::info!("Library scan found {} photos", locators.len());
        Ok(locators
            .into_iter()
            .map(|locator| PhotoReference::library(locator, observed_at))
            .collect())
    }
}
