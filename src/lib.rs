//! # Photo Stash
//!
//! Photo aggregation and persistence engine: merges photos from remote
//! search, camera capture, the gallery picker and library scans into one
//! ordered collection and coordinates permission-gated saves into the
//! device library.
//!
//! - Grow-only, deduplicated photo collection with stable ordering
//! - Keyword search against a remote photo provider
//! - Capture, pick and library-scan acquisition flows
//! - Cached permission gate showing one dialog per capability at a time
//! - Concurrent saves with at most one device write per photo
//!
//! ## Platform Separation
//!
//! The engine stays platform-free: everything it needs from the device sits
//! behind the traits in [`device`]. Applications plug in their platform
//! bindings; [`FsMediaStore`] is a ready-made filesystem store for desktop
//! use, and [`testing`] carries scripted doubles for tests.
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use photo_stash::{PhotoSession, SearchConfig, SessionConfig};
//!
//! let config = SessionConfig {
//!     search: SearchConfig {
//!         endpoint: "https://pixabay.com/api/".to_string(),
//!         api_key: std::env::var("PIXABAY_API_KEY").unwrap_or_default(),
//!     },
//! };
//!
//! let session = PhotoSession::with_config(platform, config);
//! let report = session.start().await;
//! ```

pub mod collection;
pub mod device;
pub mod error;
pub mod fs_store;
pub mod models;
pub mod permissions;
pub mod persist;
pub mod search;
pub mod session;
pub mod sources;
pub mod testing;

pub use collection::PhotoCollection;
pub use device::{Camera, DeviceError, DeviceStore, GalleryPicker, PermissionRequester, Platform};
pub use error::{EngineError, EngineResult};
pub use fs_store::FsMediaStore;
pub use models::{
    BatchSaveReport, Capability, PermissionState, PhotoOrigin, PhotoReference, SaveState,
    SearchOutcome, StartReport,
};
pub use permissions::PermissionGate;
pub use persist::{PersistenceCoordinator, SaveError, SaveResult};
pub use search::{RemoteSearchClient, SearchConfig, SearchError, SearchProvider, SearchResult};
pub use session::{PhotoSession, SessionConfig};
pub use sources::{CaptureSource, LibraryScanner, PickerSource};
