//! File-based key/value storage for the clinotes local mirror.
//!
//! Each key is one file under the data directory:
//!
//! ```text
//! .clinotes/
//!   .lock                    # Lock file for atomic operations
//!   store/
//!     clientNotes.json
//! ```

use fs2::FileExt;
use regex::Regex;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use clinotes_core::{Error, KeyValueStore};

/// Keys become file names, so they may not contain separators or start with a dot.
const KEY_PATTERN: &str = r"^[A-Za-z0-9_-][A-Za-z0-9_.-]*$";

/// File-backed key/value store.
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Open a store in the given data directory, creating it if needed.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self, Error> {
        let root = root.as_ref().to_path_buf();

        fs::create_dir_all(root.join("store"))
            .map_err(|e| Error::Storage(format!("Failed to create store dir: {}", e)))?;

        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn lock(&self, exclusive: bool) -> Result<FileLock, Error> {
        let lock_path = self.root.join(".lock");
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .map_err(|e| Error::Storage(format!("Failed to open lock file: {}", e)))?;

        let locked = if exclusive {
            file.lock_exclusive()
        } else {
            file.lock_shared()
        };
        locked.map_err(|e| Error::Storage(format!("Failed to acquire lock: {}", e)))?;

        Ok(FileLock { file })
    }

    /// Path of the file holding `key`. Keys are plain names, never paths.
    fn key_path(&self, key: &str) -> Result<PathBuf, Error> {
        let re = Regex::new(KEY_PATTERN)
            .map_err(|e| Error::Internal(format!("invalid key pattern: {}", e)))?;
        if !re.is_match(key) {
            return Err(Error::Storage(format!("Invalid key: {:?}", key)));
        }
        Ok(self.root.join("store").join(format!("{}.json", key)))
    }
}

struct FileLock {
    file: File,
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, Error> {
        let path = self.key_path(key)?;
        let _lock = self.lock(false)?;

        let mut file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::Storage(format!("Failed to open {}: {}", key, e))),
        };

        let mut contents = Vec::new();
        file.read_to_end(&mut contents)
            .map_err(|e| Error::Storage(format!("Failed to read {}: {}", key, e)))?;
        Ok(Some(contents))
    }

    /// Write the value atomically: temp file, fsync, rename.
    fn set(&self, key: &str, value: &[u8]) -> Result<(), Error> {
        let path = self.key_path(key)?;
        let temp_path = path.with_extension("json.tmp");
        let _lock = self.lock(true)?;

        let mut file = File::create(&temp_path)
            .map_err(|e| Error::Storage(format!("Failed to create temp file: {}", e)))?;

        file.write_all(value)
            .map_err(|e| Error::Storage(format!("Failed to write temp file: {}", e)))?;

        file.sync_all()
            .map_err(|e| Error::Storage(format!("Failed to sync temp file: {}", e)))?;

        fs::rename(&temp_path, &path)
            .map_err(|e| Error::Storage(format!("Failed to rename temp file: {}", e)))?;

        Ok(())
    }
}
