//! Example database for reusing failing buffers across runs.
//!
//! A database maps keys to sets of opaque byte strings. The runner saves
//! every interesting buffer it finds under the test's key and replays them
//! before generating anything new, so a failure found once keeps failing
//! until it is fixed.
//!
//! Two backends are provided:
//! - `InMemoryDatabase`: a map of sets, for tests and ephemeral runs
//! - `DirectoryDatabase`: one directory per key and one file per value,
//!   with content-addressed names and atomic writes
//!
//! `ReadOnlyDatabase` wraps either one and refuses writes.

use std::collections::{HashMap, HashSet};
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Type alias for database operation results
pub type DatabaseResult<T> = Result<T, DatabaseError>;

#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Database is read-only")]
    ReadOnly,
}

/// Identifies the examples belonging to one test.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DatabaseKey {
    /// SHA-256 of the test's identifying bytes
    pub primary_hash: [u8; 32],
    /// Optional sub-key, e.g. for the secondary corpus
    pub sub_key: Option<String>,
}

impl DatabaseKey {
    pub fn new(identifier: &[u8]) -> Self {
        DatabaseKey {
            primary_hash: Sha256::digest(identifier).into(),
            sub_key: None,
        }
    }

    /// Key for a test function, optionally salted with extra data such as a
    /// source digest.
    pub fn from_function(function_name: &str, additional_data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(function_name.as_bytes());
        hasher.update(additional_data);
        DatabaseKey {
            primary_hash: hasher.finalize().into(),
            sub_key: None,
        }
    }

    pub fn with_sub_key(&self, sub_key: &str) -> Self {
        DatabaseKey {
            primary_hash: self.primary_hash,
            sub_key: Some(sub_key.to_string()),
        }
    }

    /// Where replaced examples go once a smaller one is found.
    pub fn secondary(&self) -> Self {
        self.with_sub_key("secondary")
    }

    pub fn to_hex(&self) -> String {
        let primary_hex = hex::encode(self.primary_hash);
        match &self.sub_key {
            Some(sub) => format!("{}.{}", primary_hex, sub),
            None => primary_hex,
        }
    }
}

/// Storage counts, mostly useful in tests and logs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatabaseStats {
    pub total_keys: usize,
    pub total_examples: usize,
    pub total_size_bytes: u64,
}

/// Abstract key to set-of-bytes store.
///
/// No ordering is guaranteed within or across keys, and no concurrent
/// writers are supported.
pub trait ExampleDatabase: Send {
    /// Add `value` under `key`. Saving a value twice stores it once.
    fn save(&mut self, key: &DatabaseKey, value: &[u8]) -> DatabaseResult<()>;

    /// Values stored under `key`, produced lazily. Every call starts a fresh
    /// pass over the stored values.
    fn fetch<'a>(
        &'a self,
        key: &DatabaseKey,
    ) -> DatabaseResult<Box<dyn Iterator<Item = Vec<u8>> + 'a>>;

    /// Remove `value` from `key`. Removing an absent value is not an error.
    fn delete(&mut self, key: &DatabaseKey, value: &[u8]) -> DatabaseResult<()>;

    /// Move `value` from `src_key` to `dest_key`.
    ///
    /// The value is saved under the destination before it is removed from
    /// the source, so a failure part way leaves it stored under at least one
    /// of the two keys.
    fn move_value(
        &mut self,
        src_key: &DatabaseKey,
        dest_key: &DatabaseKey,
        value: &[u8],
    ) -> DatabaseResult<()> {
        if src_key == dest_key {
            return self.save(src_key, value);
        }
        self.save(dest_key, value)?;
        self.delete(src_key, value)
    }

    fn stats(&self) -> DatabaseResult<DatabaseStats>;
}

#[derive(Debug, Default)]
pub struct InMemoryDatabase {
    data: HashMap<DatabaseKey, HashSet<Vec<u8>>>,
}

impl InMemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key_count(&self) -> usize {
        self.data.len()
    }

    pub fn example_count(&self) -> usize {
        self.data.values().map(|set| set.len()).sum()
    }
}

impl ExampleDatabase for InMemoryDatabase {
    fn save(&mut self, key: &DatabaseKey, value: &[u8]) -> DatabaseResult<()> {
        self.data.entry(key.clone()).or_default().insert(value.to_vec());
        Ok(())
    }

    fn fetch<'a>(
        &'a self,
        key: &DatabaseKey,
    ) -> DatabaseResult<Box<dyn Iterator<Item = Vec<u8>> + 'a>> {
        match self.data.get(key) {
            Some(set) => Ok(Box::new(set.iter().cloned())),
            None => Ok(Box::new(std::iter::empty())),
        }
    }

    fn delete(&mut self, key: &DatabaseKey, value: &[u8]) -> DatabaseResult<()> {
        if let Some(set) = self.data.get_mut(key) {
            set.remove(value);
            if set.is_empty() {
                self.data.remove(key);
            }
        }
        Ok(())
    }

    fn stats(&self) -> DatabaseResult<DatabaseStats> {
        Ok(DatabaseStats {
            total_keys: self.data.len(),
            total_examples: self.example_count(),
            total_size_bytes: self
                .data
                .values()
                .flat_map(|set| set.iter())
                .map(|bytes| bytes.len() as u64)
                .sum(),
        })
    }
}

const EXAMPLE_EXTENSION: &str = "example";

/// File-based database.
///
/// Layout: `<base>/<hash(key)>/<hash(value)>.example`, with both hashes the
/// first 8 bytes of SHA-256 in hex. File names are content addressed, so
/// saving is idempotent and deleting needs no index.
#[derive(Debug, Clone)]
pub struct DirectoryDatabase {
    base_path: PathBuf,
}

impl DirectoryDatabase {
    /// Open (creating if needed) a database rooted at `base_path`.
    pub fn new<P: AsRef<Path>>(base_path: P) -> DatabaseResult<Self> {
        let base_path = base_path.as_ref().to_path_buf();
        if !base_path.exists() {
            fs::create_dir_all(&base_path)?;
        }
        Ok(DirectoryDatabase { base_path })
    }

    pub fn path(&self) -> &Path {
        &self.base_path
    }

    fn key_dir(&self, key: &DatabaseKey) -> PathBuf {
        let digest = Sha256::digest(key.to_hex().as_bytes());
        self.base_path.join(hex::encode(&digest[..8]))
    }

    fn value_path(&self, key: &DatabaseKey, value: &[u8]) -> PathBuf {
        let digest = Sha256::digest(value);
        self.key_dir(key)
            .join(format!("{}.{}", hex::encode(&digest[..8]), EXAMPLE_EXTENSION))
    }

    /// Write through a temporary file and rename, so readers never see a
    /// partial value.
    fn atomic_write(&self, path: &Path, data: &[u8]) -> DatabaseResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let temp_path = path.with_extension("tmp");
        {
            let mut file = BufWriter::new(File::create(&temp_path)?);
            file.write_all(data)?;
            file.flush()?;
        }
        fs::rename(&temp_path, path)?;
        Ok(())
    }

    fn remove_key_dir_if_empty(&self, key: &DatabaseKey) {
        let key_dir = self.key_dir(key);
        if let Ok(mut entries) = fs::read_dir(&key_dir) {
            if entries.next().is_none() {
                let _ = fs::remove_dir(&key_dir);
            }
        }
    }
}

fn is_example_file(path: &Path) -> bool {
    path.extension().map_or(false, |ext| ext == EXAMPLE_EXTENSION)
}

impl ExampleDatabase for DirectoryDatabase {
    fn save(&mut self, key: &DatabaseKey, value: &[u8]) -> DatabaseResult<()> {
        let path = self.value_path(key, value);
        if path.exists() {
            return Ok(());
        }
        log::debug!("saving {} byte example under {}", value.len(), key.to_hex());
        self.atomic_write(&path, value)
    }

    fn fetch<'a>(
        &'a self,
        key: &DatabaseKey,
    ) -> DatabaseResult<Box<dyn Iterator<Item = Vec<u8>> + 'a>> {
        let key_dir = self.key_dir(key);
        if !key_dir.is_dir() {
            return Ok(Box::new(std::iter::empty()));
        }
        let entries = fs::read_dir(&key_dir)?;
        Ok(Box::new(entries.filter_map(|entry| {
            let path = entry.ok()?.path();
            if !is_example_file(&path) {
                return None;
            }
            match fs::read(&path) {
                Ok(data) => Some(data),
                Err(e) => {
                    // Another process may have deleted it since the listing.
                    log::debug!("skipping unreadable example {:?}: {}", path, e);
                    None
                }
            }
        })))
    }

    fn delete(&mut self, key: &DatabaseKey, value: &[u8]) -> DatabaseResult<()> {
        let path = self.value_path(key, value);
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        }
        self.remove_key_dir_if_empty(key);
        Ok(())
    }

    /// Renames the value's file into the destination key directory. If the
    /// rename fails (the source is missing, or the two keys live on
    /// different filesystems) it falls back to save then delete.
    fn move_value(
        &mut self,
        src_key: &DatabaseKey,
        dest_key: &DatabaseKey,
        value: &[u8],
    ) -> DatabaseResult<()> {
        if src_key == dest_key {
            return self.save(src_key, value);
        }
        let src_path = self.value_path(src_key, value);
        let dest_path = self.value_path(dest_key, value);
        let renamed = fs::create_dir_all(self.key_dir(dest_key))
            .and_then(|()| fs::rename(&src_path, &dest_path));
        match renamed {
            Ok(()) => {
                self.remove_key_dir_if_empty(src_key);
                Ok(())
            }
            Err(e) => {
                log::debug!("rename of {:?} failed ({}); copying instead", src_path, e);
                self.save(dest_key, value)?;
                self.delete(src_key, value)
            }
        }
    }

    fn stats(&self) -> DatabaseResult<DatabaseStats> {
        let mut stats = DatabaseStats::default();
        for entry in fs::read_dir(&self.base_path)? {
            let path = entry?.path();
            if !path.is_dir() {
                continue;
            }
            let mut key_examples = 0;
            for file in fs::read_dir(&path)? {
                let file_path = file?.path();
                if is_example_file(&file_path) {
                    key_examples += 1;
                    stats.total_size_bytes += file_path.metadata()?.len();
                }
            }
            if key_examples > 0 {
                stats.total_keys += 1;
                stats.total_examples += key_examples;
            }
        }
        Ok(stats)
    }
}

/// Serves reads from the wrapped database and rejects every write with
/// [`DatabaseError::ReadOnly`].
#[derive(Debug)]
pub struct ReadOnlyDatabase<D> {
    inner: D,
}

impl<D: ExampleDatabase> ReadOnlyDatabase<D> {
    pub fn new(inner: D) -> Self {
        ReadOnlyDatabase { inner }
    }

    pub fn into_inner(self) -> D {
        self.inner
    }
}

impl<D: ExampleDatabase> ExampleDatabase for ReadOnlyDatabase<D> {
    fn save(&mut self, _key: &DatabaseKey, _value: &[u8]) -> DatabaseResult<()> {
        Err(DatabaseError::ReadOnly)
    }

    fn fetch<'a>(
        &'a self,
        key: &DatabaseKey,
    ) -> DatabaseResult<Box<dyn Iterator<Item = Vec<u8>> + 'a>> {
        self.inner.fetch(key)
    }

    fn delete(&mut self, _key: &DatabaseKey, _value: &[u8]) -> DatabaseResult<()> {
        Err(DatabaseError::ReadOnly)
    }

    fn move_value(
        &mut self,
        _src: &DatabaseKey,
        _dest: &DatabaseKey,
        _value: &[u8],
    ) -> DatabaseResult<()> {
        Err(DatabaseError::ReadOnly)
    }

    fn stats(&self) -> DatabaseResult<DatabaseStats> {
        self.inner.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn sorted(db: &dyn ExampleDatabase, key: &DatabaseKey) -> Vec<Vec<u8>> {
        let mut values: Vec<Vec<u8>> = db.fetch(key).unwrap().collect();
        values.sort();
        values
    }

    #[test]
    fn test_key_sub_keys() {
        let key = DatabaseKey::from_function("test_function", b"additional_data");
        assert_eq!(key.sub_key, None);
        let secondary = key.secondary();
        assert_eq!(secondary.sub_key.as_deref(), Some("secondary"));
        assert_eq!(secondary.primary_hash, key.primary_hash);
        assert_ne!(secondary.to_hex(), key.to_hex());
        assert!(secondary.to_hex().ends_with(".secondary"));
    }

    #[test]
    fn test_in_memory_database() {
        let mut db = InMemoryDatabase::new();
        let key = DatabaseKey::new(b"test");

        db.save(&key, b"one").unwrap();
        db.save(&key, b"one").unwrap();
        db.save(&key, b"two").unwrap();
        assert_eq!(sorted(&db, &key), vec![b"one".to_vec(), b"two".to_vec()]);

        db.delete(&key, b"one").unwrap();
        db.delete(&key, b"absent").unwrap();
        assert_eq!(sorted(&db, &key), vec![b"two".to_vec()]);

        db.delete(&key, b"two").unwrap();
        assert_eq!(db.key_count(), 0);
    }

    #[test]
    fn test_fetch_is_restartable() {
        let mut db = InMemoryDatabase::new();
        let key = DatabaseKey::new(b"test");
        db.save(&key, b"a").unwrap();
        db.save(&key, b"b").unwrap();

        let mut first = db.fetch(&key).unwrap();
        assert!(first.next().is_some());
        assert_eq!(db.fetch(&key).unwrap().count(), 2);
    }

    #[test]
    fn test_move_value() {
        let mut db = InMemoryDatabase::new();
        let key = DatabaseKey::new(b"test");
        db.save(&key, b"value").unwrap();
        db.move_value(&key, &key.secondary(), b"value").unwrap();
        assert!(sorted(&db, &key).is_empty());
        assert_eq!(sorted(&db, &key.secondary()), vec![b"value".to_vec()]);
    }

    #[test]
    fn test_directory_database() {
        let temp_dir = tempdir().unwrap();
        let mut db = DirectoryDatabase::new(temp_dir.path()).unwrap();
        let key = DatabaseKey::new(b"test");

        db.save(&key, b"example_data").unwrap();
        db.save(&key, b"example_data").unwrap();
        db.save(&key, b"").unwrap();
        assert_eq!(sorted(&db, &key), vec![b"".to_vec(), b"example_data".to_vec()]);

        // Persistence across instances.
        let db2 = DirectoryDatabase::new(temp_dir.path()).unwrap();
        assert_eq!(sorted(&db2, &key).len(), 2);

        db.delete(&key, b"").unwrap();
        db.delete(&key, b"never saved").unwrap();
        assert_eq!(sorted(&db, &key), vec![b"example_data".to_vec()]);

        let stats = db.stats().unwrap();
        assert_eq!(stats.total_keys, 1);
        assert_eq!(stats.total_examples, 1);
        assert_eq!(stats.total_size_bytes, 12);
    }

    #[test]
    fn test_directory_database_keys_are_separate() {
        let temp_dir = tempdir().unwrap();
        let mut db = DirectoryDatabase::new(temp_dir.path().join("nested")).unwrap();
        let key = DatabaseKey::new(b"test");
        db.save(&key, b"primary").unwrap();
        db.move_value(&key, &key.secondary(), b"primary").unwrap();

        assert!(sorted(&db, &key).is_empty());
        assert_eq!(sorted(&db, &key.secondary()), vec![b"primary".to_vec()]);
        assert!(sorted(&db, &DatabaseKey::new(b"other")).is_empty());
        assert!(!db.key_dir(&key).exists());
    }

    #[test]
    fn test_directory_move_keeps_value_when_destination_is_unwritable() {
        let temp_dir = tempdir().unwrap();
        let mut db = DirectoryDatabase::new(temp_dir.path()).unwrap();
        let key = DatabaseKey::new(b"test");
        db.save(&key, b"v").unwrap();

        // A plain file where the destination directory should go.
        fs::write(db.key_dir(&key.secondary()), b"in the way").unwrap();

        assert!(db.move_value(&key, &key.secondary(), b"v").is_err());
        assert_eq!(sorted(&db, &key), vec![b"v".to_vec()]);
    }

    #[test]
    fn test_directory_move_of_missing_value_still_stores_it() {
        let temp_dir = tempdir().unwrap();
        let mut db = DirectoryDatabase::new(temp_dir.path()).unwrap();
        let key = DatabaseKey::new(b"test");
        db.move_value(&key, &key.secondary(), b"fresh").unwrap();
        assert!(sorted(&db, &key).is_empty());
        assert_eq!(sorted(&db, &key.secondary()), vec![b"fresh".to_vec()]);
    }

    #[test]
    fn test_read_only_database_rejects_writes() {
        let mut inner = InMemoryDatabase::new();
        let key = DatabaseKey::new(b"test");
        inner.save(&key, b"kept").unwrap();

        let mut db = ReadOnlyDatabase::new(inner);
        assert!(matches!(db.save(&key, b"new"), Err(DatabaseError::ReadOnly)));
        assert!(matches!(db.delete(&key, b"kept"), Err(DatabaseError::ReadOnly)));
        assert_eq!(sorted(&db, &key), vec![b"kept".to_vec()]);
    }
}
