/// MediaVault: materializes message media into the scratch directory.
///
/// Files are named after the message id with a fixed extension per kind, so
/// a message never owns more than one file.
use std::path::{Path, PathBuf};

use crate::error::GuardError;
use crate::runtime::MediaSource;
use crate::types::{MediaAttachment, MediaKind};

#[derive(Debug, Clone)]
pub struct MediaVault {
    dir: PathBuf,
}

impl MediaVault {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Deterministic path for a message's media.
    ///
    /// Ids made only of `[A-Za-z0-9-]` are used as-is. Anything else is
    /// hex-encoded behind an `x_` prefix, which keeps the file inside the
    /// scratch directory and distinct ids on distinct files.
    pub fn path_for(&self, message_id: &str, kind: MediaKind) -> PathBuf {
        let plain = !message_id.is_empty()
            && message_id
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-');
        let stem = if plain {
            message_id.to_string()
        } else {
            format!("x_{}", hex::encode(message_id))
        };
        self.dir.join(format!("{stem}.{}", kind.extension()))
    }

    /// Download the media and write it to its deterministic path.
    pub async fn persist<S: MediaSource + ?Sized>(
        &self,
        source: &S,
        media: &MediaAttachment,
        message_id: &str,
    ) -> Result<PathBuf, GuardError> {
        let bytes = source
            .fetch(media)
            .await
            .map_err(|reason| GuardError::MediaFetch {
                message_id: message_id.to_string(),
                reason,
            })?;

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| GuardError::MediaWrite {
                path: self.dir.clone(),
                source,
            })?;

        let path = self.path_for(message_id, media.kind);
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|source| GuardError::MediaWrite {
                path: path.clone(),
                source,
            })?;

        tracing::debug!(message_id, path = %path.display(), bytes = bytes.len(), "vault: media stored");
        Ok(path)
    }

    /// Whether a file is still present.
    pub async fn exists(path: &Path) -> bool {
        tokio::fs::try_exists(path).await.unwrap_or(false)
    }

    /// Delete a file. Returns `Ok(false)` if it was already gone.
    pub async fn remove(path: &Path) -> Result<bool, GuardError> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(GuardError::FileCleanup {
                path: path.to_path_buf(),
                source,
            }),
        }
    }
}
