//! Filesystem rendition of the device store.
//!
//! Desktop and demo builds persist photos as plain files in one flat root
//! directory. A save copies a local file (or fetches an `http(s)` locator)
//! into the root under a fresh uuid name; enumeration lists the image files
//! found there in name order. Duplicate content across sessions is the
//! caller's concern.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use crate::device::{DeviceError, DeviceStore};

const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "gif", "webp"];

/// Photo library backed by one flat directory
pub struct FsMediaStore {
    root: PathBuf,
}

impl FsMediaStore {
    /// Create a store rooted at `root`; the directory is created on first save
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn target_path(&self, locator: &str) -> PathBuf {
        // Query and fragment parts would otherwise leak into the extension.
        let clean = locator.split(['?', '#']).next().unwrap_or(locator);
        let extension = Path::new(clean)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .filter(|e| IMAGE_EXTENSIONS.contains(&e.as_str()))
            .unwrap_or_else(|| "jpg".to_string());
        self.root.join(format!("{}.{}", Uuid::new_v4(), extension))
    }

    async fn fetch_remote(&self, locator: &str) -> Result<Vec<u8>, DeviceError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| DeviceError::Other(format!("HTTP client error: {}", e)))?;

        let response = client
            .get(locator)
            .send()
            .await
            .map_err(|e| DeviceError::Unavailable(format!("Download failed: {}", e)))?;
        if !response.status().is_success() {
            return Err(DeviceError::Unavailable(format!(
                "Download failed with status {}",
                response.status()
            )));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| DeviceError::Unavailable(format!("Download failed: {}", e)))?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl DeviceStore for FsMediaStore {
    async fn save_to_library(&self, locator: &str) -> Result<(), DeviceError> {
        tokio::fs::create_dir_all(&self.root).await?;
        let target = self.target_path(locator);

        if locator.starts_with("http://") || locator.starts_with("https://") {
            let bytes = self.fetch_remote(locator).await?;
            tokio::fs::write(&target, &bytes).await?;
        } else {
            tokio::fs::copy(locator, &target).await?;
        }

        log::info!("Saved {} as {}", locator, target.display());
        Ok(())
    }

    async fn enumerate(&self) -> Result<Vec<String>, DeviceError> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let mut entries = tokio::fs::read_dir(&self.root).await?;
        let mut locators = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let path = entry.path();
            let is_image = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
                .unwrap_or(false);
            if is_image {
                locators.push(path.to_string_lossy().into_owned());
            }
        }
        locators.sort();
        Ok(locators)
    }
}
