//! The aggregation engine: one ordered, deduplicated collection of photo
//! references from all sources.
//!
//! The collection only ever grows. New references append in ingest order;
//! a locator that was seen before is ignored, whatever its origin. There
//! is no replace and no remove: results from earlier searches, captures and
//! picks stay visible until the session ends.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use tokio::sync::watch;

use crate::models::PhotoReference;

struct Inner {
    photos: Vec<PhotoReference>,
    /// Locator to position in `photos`
    index: HashMap<String, usize>,
}

/// Ordered, deduplicated set of photo references from all sources
///
/// Cheap to clone; clones share the same underlying collection.
#[derive(Clone)]
pub struct PhotoCollection {
    inner: Arc<Mutex<Inner>>,
    revision: Arc<watch::Sender<u64>>,
}

impl PhotoCollection {
    /// Create an empty collection
    pub fn new() -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            inner: Arc::new(Mutex::new(Inner {
                photos: Vec::new(),
                index: HashMap::new(),
            })),
            revision: Arc::new(revision),
        }
    }

    /// Adds references the collection has not seen yet.
    ///
    /// Ingest order is preserved. Within one call, references are ranked by
    /// origin (Library, Capture, Picker, Remote; stable within one origin)
    /// before appending, which settles the startup merge of a library scan
    /// with an immediately-following search. A locator already present
    /// leaves the collection untouched. Returns how many references were
    /// actually added.
    pub fn ingest(&self, refs: Vec<PhotoReference>) -> usize {
        if refs.is_empty() {
            return 0;
        }

        let mut batch = refs;
        batch.sort_by_key(|reference| reference.origin.merge_rank());

        let added = {
            let mut guard = self.lock();
            let inner = &mut *guard;
            let mut added = 0;
            for reference in batch {
                if inner.index.contains_key(&reference.locator) {
                    continue;
                }
                let position = inner.photos.len();
                inner.index.insert(reference.locator.clone(), position);
                inner.photos.push(reference);
                added += 1;
            }
            added
        };

        if added > 0 {
            log::debug!("Ingested {} new photos", added);
            self.bump();
        }
        added
    }

    /// Snapshot of the collection in display order
    pub fn all(&self) -> Vec<PhotoReference> {
        self.lock().photos.clone()
    }

    pub fn len(&self) -> usize {
        self.lock().photos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().photos.is_empty()
    }

    pub fn contains(&self, locator: &str) -> bool {
        self.lock().index.contains_key(locator)
    }

    /// Looks up one reference by locator
    pub fn get(&self, locator: &str) -> Option<PhotoReference> {
        let guard = self.lock();
        guard
            .index
            .get(locator)
            .map(|&position| guard.photos[position].clone())
    }

    /// Records the save timestamp for a locator.
    ///
    /// The timestamp sticks on first write; later calls leave it untouched.
    /// Returns whether anything changed.
    pub fn mark_saved(&self, locator: &str, saved_at: DateTime<Utc>) -> bool {
        let changed = {
            let mut guard = self.lock();
            let inner = &mut *guard;
            match inner.index.get(locator).copied() {
                Some(position) => {
                    let photo = &mut inner.photos[position];
                    if photo.saved_at.is_none() {
                        photo.saved_at = Some(saved_at);
                        true
                    } else {
                        false
                    }
                }
                None => false,
            }
        };

        if changed {
            self.bump();
        }
        changed
    }

    /// Subscribe to revision bumps, one per observable mutation.
    ///
    /// The presentation layer re-reads `all()` whenever the value changes.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    fn bump(&self) {
        self.revision.send_modify(|revision| *revision += 1);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for PhotoCollection {
    fn default() -> Self {
        Self::new()
    }
}
