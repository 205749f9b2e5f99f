use std::fmt;

use crate::device::DeviceError;
use crate::models::Capability;
use crate::persist::SaveError;
use crate::search::SearchError;

/// Result type for session-level operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Central error type for the photo engine
#[derive(Debug)]
pub enum EngineError {
    /// A required permission was not granted
    PermissionMissing(Capability),
    /// Remote search failure
    Search(SearchError),
    /// Device store write failure
    Save(SaveError),
    /// Platform collaborator failure (camera, picker, library)
    Device(DeviceError),
    /// Locator not present in the collection
    NotFound(String),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EngineError::PermissionMissing(capability) => {
                write!(f, "Permission missing: {}", capability.display_name())
            }
            EngineError::Search(e) => write!(f, "Search error: {}", e),
            EngineError::Save(e) => write!(f, "Save error: {}", e),
            EngineError::Device(e) => write!(f, "Device error: {}", e),
            EngineError::NotFound(locator) => write!(f, "Not found: {}", locator),
        }
    }
}

impl std::error::Error for EngineError {}

// Conversions from component error types
impl From<SearchError> for EngineError {
    fn from(e: SearchError) -> Self {
        EngineError::Search(e)
    }
}

impl From<DeviceError> for EngineError {
    fn from(e: DeviceError) -> Self {
        EngineError::Device(e)
    }
}

impl From<SaveError> for EngineError {
    fn from(e: SaveError) -> Self {
        match e {
            SaveError::PermissionMissing(capability) => EngineError::PermissionMissing(capability),
            other => EngineError::Save(other),
        }
    }
}

/// User-friendly error messages for the presentation layer
impl EngineError {
    pub fn user_message(&self) -> String {
        match self {
            EngineError::PermissionMissing(Capability::Camera) => {
                "Camera access is required to take photos.".to_string()
            }
            EngineError::PermissionMissing(Capability::LibraryRead) => {
                "Photo library access is required to show your photos.".to_string()
            }
            EngineError::PermissionMissing(Capability::LibraryWrite) => {
                "Photo library access is required to save photos.".to_string()
            }
            EngineError::Search(_) => {
                "The search failed. Please check your connection and try again.".to_string()
            }
            EngineError::Save(_) => "The photo could not be saved. Please try again.".to_string(),
            EngineError::Device(_) => "The device reported an error. Please try again.".to_string(),
            EngineError::NotFound(locator) => format!("{} was not found.", locator),
        }
    }
}
