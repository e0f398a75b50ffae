//! Profile image storage
//!
//! Each user has at most one image, stored as `{user_id}.{ext}` under
//! `<static>/images` and served from `/static/images`.

use std::fs;
use std::path::PathBuf;

use tracing::{debug, warn};

use econnect_core::{EconnectError, EconnectResult};

/// URL path images are served under
pub const PUBLIC_PREFIX: &str = "static/images";

const DEFAULT_EXTENSION: &str = "jpg";

/// An uploaded image
#[derive(Debug, Clone, Default)]
pub struct ImageUpload {
    pub filename: Option<String>,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    /// Extension from the uploaded filename, `jpg` when absent or odd
    pub fn extension(&self) -> String {
        self.filename
            .as_deref()
            .and_then(|name| name.rsplit_once('.'))
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .filter(|ext| !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
            .unwrap_or_else(|| DEFAULT_EXTENSION.to_string())
    }

    /// Browsers send an empty part when no file was chosen
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Filesystem store for profile images
#[derive(Debug, Clone)]
pub struct ProfileImageStore {
    dir: PathBuf,
}

impl ProfileImageStore {
    /// Store images under `<static_root>/images`
    pub fn new(static_root: impl Into<PathBuf>) -> Self {
        Self {
            dir: static_root.into().join("images"),
        }
    }

    /// Write the user's image and return its public path
    ///
    /// The bytes go to a temporary file that is renamed into place, so a
    /// failed write never leaves a truncated image behind. Images stored
    /// under other extensions are kept until [`Self::remove_stale`].
    pub fn save(&self, user_id: i64, upload: &ImageUpload) -> EconnectResult<String> {
        fs::create_dir_all(&self.dir).map_err(|e| {
            EconnectError::internal(format!("Failed to create image directory: {}", e))
        })?;

        let filename = format!("{}.{}", user_id, upload.extension());
        let target = self.dir.join(&filename);
        let tmp = self.dir.join(format!("{}.tmp", filename));

        let written = fs::write(&tmp, &upload.bytes).and_then(|()| fs::rename(&tmp, &target));
        if let Err(e) = written {
            let _ = fs::remove_file(&tmp);
            return Err(EconnectError::internal(format!("Failed to write image: {}", e)));
        }

        debug!("Saved profile image {} for user {}", filename, user_id);
        Ok(format!("{}/{}", PUBLIC_PREFIX, filename))
    }

    /// Remove the user's images other than the one at public path `keep`
    pub fn remove_stale(&self, user_id: i64, keep: &str) {
        let keep = keep.rsplit('/').next().unwrap_or(keep);
        self.remove_matching(user_id, Some(keep));
    }

    /// Remove every stored image of the user; failures are only logged
    pub fn delete(&self, user_id: i64) {
        self.remove_matching(user_id, None);
    }

    fn remove_matching(&self, user_id: i64, keep: Option<&str>) {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(_) => return,
        };

        let prefix = format!("{}.", user_id);
        for entry in entries.flatten() {
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if !name.starts_with(&prefix) || keep == Some(name) {
                continue;
            }
            match fs::remove_file(entry.path()) {
                Ok(()) => debug!("Deleted old profile image {} of user {}", name, user_id),
                Err(e) => warn!("Failed to delete profile image {} of user {}: {}", name, user_id, e),
            }
        }
    }
}
