//! File-per-key backend.
//!
//! Each key is stored in its own file inside a 0700 directory. File names
//! are the hex encoding of the key, so any key maps to a portable name and
//! a prefix scan is a directory listing plus decode. Writes go to a temp
//! file that is fsynced and renamed over the target.

use std::path::{Path, PathBuf};

use super::{KvBackend, StorageError};
use crate::fs::{create_private_dir, write_atomic};

/// Longest file name most filesystems accept.
const MAX_FILE_NAME: usize = 255;

/// Suffix used while a write is in flight.
const TMP_SUFFIX: &str = ".tmp";

/// Backend storing each key as a file under one directory.
#[derive(Debug, Clone)]
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    /// Open (creating if needed) a backend rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        create_private_dir(&dir).map_err(|e| StorageError::Io {
            key: dir.display().to_string(),
            source: e,
        })?;
        Ok(Self { dir })
    }

    /// Directory holding the record files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        let name = hex::encode(key.as_bytes());
        if name.len() + TMP_SUFFIX.len() > MAX_FILE_NAME {
            return Err(StorageError::InvalidKey(format!(
                "key too long for file backend: {} bytes",
                key.len()
            )));
        }
        Ok(self.dir.join(name))
    }

    fn io_error(key: &str, source: std::io::Error) -> StorageError {
        StorageError::Io {
            key: key.to_string(),
            source,
        }
    }
}

impl KvBackend for FileBackend {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let path = self.path_for(key)?;
        match std::fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Self::io_error(key, e)),
        }
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        write_atomic(&path, value).map_err(|e| Self::io_error(key, e))
    }

    fn delete(&self, key: &str) -> Result<bool, StorageError> {
        let path = self.path_for(key)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Self::io_error(key, e)),
        }
    }

    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let entries = std::fs::read_dir(&self.dir).map_err(|e| Self::io_error(prefix, e))?;

        let mut keys = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| Self::io_error(prefix, e))?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            // Leftover temp files and foreign files are not records
            let Ok(bytes) = hex::decode(name) else {
                continue;
            };
            let Ok(key) = String::from_utf8(bytes) else {
                continue;
            };
            if key.starts_with(prefix) {
                keys.push(key);
            }
        }
        keys.sort();
        Ok(keys)
    }
}
