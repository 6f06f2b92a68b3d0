//! Filesystem store for note attachments.
//!
//! Attachments are keyed by the owning note id plus the extension of the
//! uploaded file name, so one note always maps to at most one blob and two
//! notes never share a path. They are published read-only under [`URL_PREFIX`].

use tokio::fs;

use std::{
    io,
    path::{Path, PathBuf},
    sync::atomic::{AtomicU64, Ordering},
};

pub const URL_PREFIX: &str = "/uploads";

/// Longer extensions are dropped from the key.
const MAX_EXT_LEN: usize = 16;

#[derive(Debug, thiserror::Error)]
pub enum BlobError {
    #[error("failed to write attachment '{key}': {source}")]
    Write { key: String, source: io::Error },

    #[error("failed to remove attachment '{key}': {source}")]
    Remove { key: String, source: io::Error },
}

/// Uploaded file as received from the client.
#[derive(Debug, Clone)]
pub struct Attachment {
    pub file_name: String,
    pub data: Vec<u8>,
}

#[derive(Debug)]
pub struct BlobStore {
    root: PathBuf,
    tmp_counter: AtomicU64,
}

impl BlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            tmp_counter: AtomicU64::new(0),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn ensure_root(&self) -> io::Result<()> {
        fs::create_dir_all(&self.root).await
    }

    /// Stores `attachment` as the blob of note `note_id`, replacing any previous
    /// blob under the same key, and returns its public URL.
    ///
    /// The bytes are written to a temporary file first and renamed into place.
    pub async fn put(&self, note_id: i64, attachment: &Attachment) -> Result<String, BlobError> {
        let key = blob_key(note_id, &attachment.file_name);
        let target = self.root.join(&key);
        let tmp = self.root.join(format!(
            ".{key}.{}.{}.tmp",
            std::process::id(),
            self.tmp_counter.fetch_add(1, Ordering::Relaxed)
        ));

        let written = async {
            fs::write(&tmp, &attachment.data).await?;
            fs::rename(&tmp, &target).await
        }
        .await;

        if let Err(source) = written {
            let _ = fs::remove_file(&tmp).await;
            return Err(BlobError::Write { key, source });
        }

        tracing::debug!(key = %key, size = attachment.data.len(), "attachment stored");

        Ok(format!("{URL_PREFIX}/{key}"))
    }

    /// Removes the blob behind a public URL. URLs outside this store and
    /// blobs that are already gone are ignored.
    pub async fn remove(&self, url: &str) -> Result<(), BlobError> {
        let Some(key) = key_from_url(url) else {
            return Ok(());
        };

        match fs::remove_file(self.root.join(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(BlobError::Remove {
                key: key.to_string(),
                source,
            }),
        }
    }

    /// Best-effort [`remove`](Self::remove) used for compensation; failures are logged.
    pub async fn discard(&self, url: &str) {
        if let Err(e) = self.remove(url).await {
            tracing::warn!("failed to discard attachment {url}: {e}");
        }
    }
}

/// `{note_id}.{ext}`, or just `{note_id}` when the name carries no usable extension.
/// Extensions longer than [`MAX_EXT_LEN`] are not usable.
fn blob_key(note_id: i64, file_name: &str) -> String {
    let ext = Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| {
            !ext.is_empty()
                && ext.len() <= MAX_EXT_LEN
                && ext.chars().all(|c| c.is_ascii_alphanumeric())
        })
        .map(str::to_ascii_lowercase);

    match ext {
        Some(ext) => format!("{note_id}.{ext}"),
        None => note_id.to_string(),
    }
}

fn key_from_url(url: &str) -> Option<&str> {
    let key = url.strip_prefix(URL_PREFIX)?.strip_prefix('/')?;
    let plain = !key.is_empty()
        && !key.starts_with('.')
        && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '.');

    plain.then_some(key)
}
