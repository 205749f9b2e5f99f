use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where a photo reference came from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PhotoOrigin {
    Remote,
    Capture,
    Picker,
    Library,
}

impl PhotoOrigin {
    pub fn as_str(&self) -> &str {
        match self {
            PhotoOrigin::Remote => "remote",
            PhotoOrigin::Capture => "capture",
            PhotoOrigin::Picker => "picker",
            PhotoOrigin::Library => "library",
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            PhotoOrigin::Remote => "Search result",
            PhotoOrigin::Capture => "Camera",
            PhotoOrigin::Picker => "Picked",
            PhotoOrigin::Library => "Library",
        }
    }

    /// Rank used to settle ordering ties inside one ingest batch.
    /// Library entries come first, then captures, picks and search results.
    pub(crate) fn merge_rank(&self) -> u8 {
        match self {
            PhotoOrigin::Library => 0,
            PhotoOrigin::Capture => 1,
            PhotoOrigin::Picker => 2,
            PhotoOrigin::Remote => 3,
        }
    }
}

/// Represents a photo anywhere in the engine
///
/// The locator is an opaque identity key (remote URL or local file handle);
/// the engine never parses it for structure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PhotoReference {
    pub locator: String,
    pub origin: PhotoOrigin,
    /// Set exactly once when a save completes; never cleared afterwards
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<DateTime<Utc>>,
}

impl PhotoReference {
    /// Reference produced by a remote search hit
    pub fn remote(locator: String) -> Self {
        Self {
            locator,
            origin: PhotoOrigin::Remote,
            saved_at: None,
        }
    }

    /// Reference produced by a camera shutter press
    pub fn captured(locator: String) -> Self {
        Self {
            locator,
            origin: PhotoOrigin::Capture,
            saved_at: None,
        }
    }

    /// Reference produced by a gallery picker selection
    pub fn picked(locator: String) -> Self {
        Self {
            locator,
            origin: PhotoOrigin::Picker,
            saved_at: None,
        }
    }

    /// Reference found in the device store during a library scan
    ///
    /// Scanned entries are durable by definition, so `saved_at` starts set.
    pub fn library(locator: String, observed_at: DateTime<Utc>) -> Self {
        Self {
            locator,
            origin: PhotoOrigin::Library,
            saved_at: Some(observed_at),
        }
    }

    pub fn is_saved(&self) -> bool {
        self.saved_at.is_some()
    }
}

/// Protected platform abilities the engine has to ask for before use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Camera,
    LibraryRead,
    LibraryWrite,
}

impl Capability {
    pub fn as_str(&self) -> &str {
        match self {
            Capability::Camera => "camera",
            Capability::LibraryRead => "library_read",
            Capability::LibraryWrite => "library_write",
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            Capability::Camera => "Camera",
            Capability::LibraryRead => "Photo library access",
            Capability::LibraryWrite => "Photo library write access",
        }
    }
}

/// Cached answer for one capability
///
/// Starts Unknown; only an explicit request transitions it. Denied stays
/// Denied until a new user-driven request observes something else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionState {
    Unknown,
    Granted,
    Denied,
}

/// Per-locator save lifecycle: Unsaved -> Saving -> Saved | Failed.
/// Failed may re-enter Saving on an explicit retry; Saved is terminal.
#[derive(Debug, Clone, PartialEq)]
pub enum SaveState {
    Unsaved,
    Saving,
    Saved(DateTime<Utc>),
    Failed(String),
}

/// Result of a remote search
///
/// Zero hits is an ordinary outcome, not an error; the caller renders a
/// neutral empty state instead of an alarm.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    Hits(Vec<PhotoReference>),
    NoResults,
}

/// Aggregate outcome of a batch save
///
/// A partial failure is not rolled back; references written before a
/// failure stay written.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchSaveReport {
    AllSucceeded {
        saved: usize,
    },
    PartialFailure {
        succeeded: HashSet<String>,
        /// Locator to rendered cause
        failed: HashMap<String, String>,
    },
}

impl BatchSaveReport {
    pub fn is_all_succeeded(&self) -> bool {
        matches!(self, BatchSaveReport::AllSucceeded { .. })
    }

    pub fn saved_count(&self) -> usize {
        match self {
            BatchSaveReport::AllSucceeded { saved } => *saved,
            BatchSaveReport::PartialFailure { succeeded, .. } => succeeded.len(),
        }
    }

    pub fn failed_count(&self) -> usize {
        match self {
            BatchSaveReport::AllSucceeded { .. } => 0,
            BatchSaveReport::PartialFailure { failed, .. } => failed.len(),
        }
    }
}

/// What the one-shot library scan at session start produced
#[derive(Debug, Clone, PartialEq)]
pub struct StartReport {
    /// Library references newly ingested into the collection
    pub library_photos: usize,
    pub library_permission: PermissionState,
    /// Non-fatal notice for the user when the library was unavailable
    pub advisory: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors_fix_origin() {
        assert_eq!(
            PhotoReference::remote("https://example.com/a.jpg".to_string()).origin,
            PhotoOrigin::Remote
        );
        assert_eq!(
            PhotoReference::captured("file:///shot.jpg".to_string()).origin,
            PhotoOrigin::Capture
        );
        assert_eq!(
            PhotoReference::picked("file:///pick.jpg".to_string()).origin,
            PhotoOrigin::Picker
        );
        let library = PhotoReference::library("file:///old.jpg".to_string(), Utc::now());
        assert_eq!(library.origin, PhotoOrigin::Library);
        assert!(library.is_saved());
    }

    #[test]
    fn test_fresh_references_are_unsaved() {
        assert!(!PhotoReference::remote("https://example.com/a.jpg".to_string()).is_saved());
        assert!(!PhotoReference::captured("file:///shot.jpg".to_string()).is_saved());
        assert!(!PhotoReference::picked("file:///pick.jpg".to_string()).is_saved());
    }

    #[test]
    fn test_merge_rank_priority() {
        assert!(PhotoOrigin::Library.merge_rank() < PhotoOrigin::Capture.merge_rank());
        assert!(PhotoOrigin::Capture.merge_rank() < PhotoOrigin::Picker.merge_rank());
        assert!(PhotoOrigin::Picker.merge_rank() < PhotoOrigin::Remote.merge_rank());
    }

    #[test]
    fn test_batch_report_counts() {
        let all = BatchSaveReport::AllSucceeded { saved: 3 };
        assert!(all.is_all_succeeded());
        assert_eq!(all.saved_count(), 3);
        assert_eq!(all.failed_count(), 0);

        let mut succeeded = HashSet::new();
        succeeded.insert("a".to_string());
        let mut failed = HashMap::new();
        failed.insert("b".to_string(), "write failed".to_string());
        let partial = BatchSaveReport::PartialFailure { succeeded, failed };
        assert!(!partial.is_all_succeeded());
        assert_eq!(partial.saved_count(), 1);
        assert_eq!(partial.failed_count(), 1);
    }
}
