// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! On-disk snapshot files, one JPEG per camera.
//!
//! Every camera's file exists from startup on (seeded from the placeholder), so
//! readers never see a missing image. Only the fetcher replaces files, and it
//! does so by renaming a completed `.part` file over the old one.

use std::io;
use std::path::{Path, PathBuf};

use hapcam_core::HapCamError;

#[derive(Debug, Clone)]
pub struct SnapshotCache {
    dir: PathBuf,
    placeholder: PathBuf,
}

impl SnapshotCache {
    pub fn new(dir: impl Into<PathBuf>, placeholder: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into(), placeholder: placeholder.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, camera_key: &str) -> PathBuf {
        self.dir.join(format!("{camera_key}.jpg"))
    }

    /// Scratch file an in-flight transfer writes to.
    pub fn partial_path_for(&self, camera_key: &str) -> PathBuf {
        self.dir.join(format!("{camera_key}.jpg.part"))
    }

    /// Copies the placeholder into every camera's slot. Returns how many were seeded.
    ///
    /// # Errors
    ///
    /// Returns `HapCamError::Io` if the cache directory cannot be created or the
    /// placeholder cannot be copied.
    pub fn seed<'a>(&self, camera_keys: impl IntoIterator<Item = &'a str>) -> Result<usize, HapCamError> {
        std::fs::create_dir_all(&self.dir)?;
        let mut seeded = 0;
        for key in camera_keys {
            std::fs::copy(&self.placeholder, self.path_for(key))?;
            seeded += 1;
        }
        tracing::info!(dir = %self.dir.display(), seeded, "Seeded snapshot cache from placeholder");
        Ok(seeded)
    }

    /// Reads the latest image for a camera.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error (e.g. a camera that was never seeded).
    pub fn read(&self, camera_key: &str) -> io::Result<Vec<u8>> {
        std::fs::read(self.path_for(camera_key))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_and_read() {
        let tmp = tempfile::tempdir().unwrap();
        let placeholder = tmp.path().join("snapshot.jpg");
        std::fs::write(&placeholder, b"placeholder-jpeg").unwrap();

        let cache = SnapshotCache::new(tmp.path().join("cameras"), &placeholder);
        assert_eq!(cache.seed(["porch", "drive"]).unwrap(), 2);

        assert_eq!(cache.read("porch").unwrap(), b"placeholder-jpeg");
        assert_eq!(cache.read("drive").unwrap(), b"placeholder-jpeg");
        assert!(cache.read("garage").is_err());
        assert_eq!(cache.path_for("porch"), tmp.path().join("cameras").join("porch.jpg"));
    }

    #[test]
    fn test_seed_without_placeholder_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = SnapshotCache::new(tmp.path().join("cameras"), tmp.path().join("missing.jpg"));
        let err = cache.seed(["porch"]).unwrap_err();
        assert!(matches!(err, HapCamError::Io(ref e) if e.kind() == io::ErrorKind::NotFound));
    }
}
