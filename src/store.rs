//! Storage for interim results.
//!
//! Objects are addressed by bucket and key and hold the JSON encoding of a
//! [`ConversationResult`].

use crate::results::ConversationResult;
use std::{
    collections::HashMap,
    fs,
    io,
    path::{Component, Path, PathBuf},
    sync::Mutex,
};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("object not found: {bucket}/{key}")]
    NotFound { bucket: String, key: String },

    #[error("invalid object key: {0}")]
    InvalidKey(String),

    #[error("io: {0}")]
    Io(#[from] io::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}

pub trait ResultStore {
    fn read(&self, bucket: &str, key: &str) -> Result<ConversationResult, Error>;

    fn write(&self, bucket: &str, key: &str, result: &ConversationResult) -> Result<(), Error>;
}

impl<S: ResultStore + ?Sized> ResultStore for &S {
    fn read(&self, bucket: &str, key: &str) -> Result<ConversationResult, Error> {
        (**self).read(bucket, key)
    }

    fn write(&self, bucket: &str, key: &str, result: &ConversationResult) -> Result<(), Error> {
        (**self).write(bucket, key, result)
    }
}

/// Stores each object as a file at `<root>/<bucket>/<key>`.
#[derive(Clone, Debug)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path(&self, bucket: &str, key: &str) -> Result<PathBuf, Error> {
        let mut path = self.root.clone();
        for part in [bucket, key] {
            let relative = Path::new(part);
            let valid = !part.is_empty()
                && relative
                    .components()
                    .all(|component| matches!(component, Component::Normal(_)));
            if !valid {
                return Err(Error::InvalidKey(part.to_string()));
            }
            path.push(relative);
        }
        Ok(path)
    }
}

impl ResultStore for FsStore {
    fn read(&self, bucket: &str, key: &str) -> Result<ConversationResult, Error> {
        let path = self.path(bucket, key)?;
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(Error::NotFound {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                })
            }
            Err(err) => return Err(err.into()),
        };
        debug!("Read {} bytes from {}", bytes.len(), path.display());
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn write(&self, bucket: &str, key: &str, result: &ConversationResult) -> Result<(), Error> {
        let path = self.path(bucket, key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let bytes = serde_json::to_vec(result)?;
        fs::write(&path, &bytes)?;
        debug!("Wrote {} bytes to {}", bytes.len(), path.display());
        Ok(())
    }
}

/// Keeps encoded objects in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: Mutex<HashMap<(String, String), Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, bucket: &str, key: &str, result: &ConversationResult) -> Result<(), Error> {
        self.write(bucket, key, result)
    }

    pub fn get(&self, bucket: &str, key: &str) -> Option<ConversationResult> {
        self.read(bucket, key).ok()
    }

    fn objects(&self) -> std::sync::MutexGuard<'_, HashMap<(String, String), Vec<u8>>> {
        // A poisoned map is still a consistent map of complete objects.
        self.objects
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ResultStore for MemoryStore {
    fn read(&self, bucket: &str, key: &str) -> Result<ConversationResult, Error> {
        let objects = self.objects();
        let bytes = objects
            .get(&(bucket.to_string(), key.to_string()))
            .ok_or_else(|| Error::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })?;
        Ok(serde_json::from_slice(bytes)?)
    }

    fn write(&self, bucket: &str, key: &str, result: &ConversationResult) -> Result<(), Error> {
        let bytes = serde_json::to_vec(result)?;
        self.objects()
            .insert((bucket.to_string(), key.to_string()), bytes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::{SpeakerLabel, SpeechSegment};
    use pretty_assertions::assert_eq;

    fn record() -> ConversationResult {
        let mut result = ConversationResult::default();
        result.conversation_analytics.speaker_labels = vec![SpeakerLabel::new("spk_0", "Agent")];
        result.speech_segments = vec![SpeechSegment::new("spk_0", "hello")];
        result
    }

    #[test]
    fn fs_store_writes_under_bucket() -> Result<(), Error> {
        let dir = tempfile::tempdir()?;
        let store = FsStore::new(dir.path());

        store.write("pca-output", "interimResults/call.json", &record())?;

        assert!(dir.path().join("pca-output/interimResults/call.json").is_file());
        assert_eq!(store.read("pca-output", "interimResults/call.json")?, record());

        Ok(())
    }

    #[test]
    fn fs_store_missing_object() -> Result<(), Error> {
        let dir = tempfile::tempdir()?;
        let store = FsStore::new(dir.path());

        let result = store.read("pca-output", "interimResults/none.json");

        assert!(matches!(result, Err(Error::NotFound { .. })));

        Ok(())
    }

    #[test]
    fn fs_store_rejects_escaping_keys() -> Result<(), Error> {
        let dir = tempfile::tempdir()?;
        let store = FsStore::new(dir.path());

        for key in ["../outside.json", "/etc/passwd", "a/../../b.json", ""] {
            let result = store.write("pca-output", key, &record());
            assert!(matches!(result, Err(Error::InvalidKey(_))), "key {:?}", key);
        }

        Ok(())
    }

    #[test]
    fn memory_store_overwrites() -> Result<(), Error> {
        let store = MemoryStore::new();
        store.insert("pca-output", "k.json", &ConversationResult::default())?;
        store.write("pca-output", "k.json", &record())?;

        assert_eq!(store.get("pca-output", "k.json"), Some(record()));
        assert_eq!(store.get("other", "k.json"), None);

        Ok(())
    }
}
