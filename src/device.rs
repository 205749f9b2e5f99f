//! Platform collaborator seams.
//!
//! Everything the engine needs from the device (permission dialogs, the
//! media store, the camera, the gallery picker) sits behind these traits,
//! so the engine itself stays platform-free. Applications plug in their
//! platform bindings; tests plug in the mocks from [`crate::testing`].

use std::sync::Arc;

use async_trait::async_trait;

use crate::models::{Capability, PermissionState};

/// Errors reported by platform collaborators
#[derive(Debug)]
pub enum DeviceError {
    Io(std::io::Error),
    /// The platform API is missing or not ready (e.g. no camera on this device)
    Unavailable(String),
    Other(String),
}

impl std::fmt::Display for DeviceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceError::Io(e) => write!(f, "IO error: {}", e),
            DeviceError::Unavailable(msg) => write!(f, "Platform unavailable: {}", msg),
            DeviceError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for DeviceError {}

impl From<std::io::Error> for DeviceError {
    fn from(err: std::io::Error) -> Self {
        DeviceError::Io(err)
    }
}

/// Shows the platform permission dialog for a capability
#[async_trait]
pub trait PermissionRequester: Send + Sync {
    /// May show at most one dialog; resolves with the state the user left behind.
    async fn request(&self, capability: Capability) -> Result<PermissionState, DeviceError>;
}

/// The device's persistent photo library, the system of record for saved photos
///
/// Idempotency across sessions is the store's own concern; the engine only
/// prevents redundant calls within a session.
#[async_trait]
pub trait DeviceStore: Send + Sync {
    /// Writes the photo behind `locator` into the library.
    async fn save_to_library(&self, locator: &str) -> Result<(), DeviceError>;

    /// Lists the locators already present in the library.
    async fn enumerate(&self) -> Result<Vec<String>, DeviceError>;
}

/// The platform camera session
#[async_trait]
pub trait Camera: Send + Sync {
    /// One shutter press, one local file locator.
    async fn capture_photo(&self) -> Result<String, DeviceError>;
}

/// The platform gallery picker dialog
#[async_trait]
pub trait GalleryPicker: Send + Sync {
    /// Zero or more selections; a dismissed dialog is an empty list, not an error.
    async fn pick_photos(&self) -> Result<Vec<String>, DeviceError>;
}

/// Handles to the platform collaborators a session runs against
#[derive(Clone)]
pub struct Platform {
    pub permissions: Arc<dyn PermissionRequester>,
    pub store: Arc<dyn DeviceStore>,
    pub camera: Arc<dyn Camera>,
    pub picker: Arc<dyn GalleryPicker>,
}
