//! Single-file snapshot backend.
//!
//! Every commit rewrites the snapshot: a new file is written next to the
//! current one, synced, then renamed over it. The directory is held with an
//! exclusive lock for the lifetime of the store.
//!
//! Snapshot layout:
//! ```text
//! magic (4) | version (1) | body length (8, LE) | body (MessagePack) | crc32 of body (4, LE)
//! ```

use super::{ChangeSet, PersistentStore, StoreState, StoredObject};
use crate::error::{Result, StoreError};
use crate::types::ObjectId;
use fs2::FileExt;
use parking_lot::{Mutex, RwLock};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Magic bytes for the snapshot file.
const SNAPSHOT_MAGIC: &[u8; 4] = b"EST\0";

/// Current snapshot format version.
const SNAPSHOT_VERSION: u8 = 1;

const SNAPSHOT_FILE: &str = "objects.bin";
const SNAPSHOT_TMP_FILE: &str = "objects.bin.tmp";
const LOCK_FILE: &str = "LOCK";

/// Header size: magic + version + body length.
const HEADER_SIZE: usize = 4 + 1 + 8;

/// Backend that persists all objects to one snapshot file in a directory.
pub struct FileStore {
    /// Store directory.
    dir: PathBuf,

    /// Lock file for exclusive access.
    _lock_file: File,

    /// Committed state, mirrored on disk.
    state: RwLock<StoreState>,

    /// Serializes commits so snapshots are written one at a time.
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Open the store in `dir`, creating the directory if allowed.
    pub fn open(dir: impl AsRef<Path>, create_if_missing: bool) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();

        if !dir.exists() {
            if !create_if_missing {
                return Err(StoreError::Io(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("store directory {} does not exist", dir.display()),
                )));
            }
            fs::create_dir_all(&dir)?;
        }

        let lock_file = Self::acquire_lock(&dir)?;

        let snapshot_path = dir.join(SNAPSHOT_FILE);
        let state = if snapshot_path.exists() {
            Self::read_snapshot(&snapshot_path)?
        } else {
            StoreState::default()
        };

        debug!(path = %dir.display(), objects = state.len(), "opened file store");

        Ok(Self {
            dir,
            _lock_file: lock_file,
            state: RwLock::new(state),
            write_lock: Mutex::new(()),
        })
    }

    /// Store directory.
    pub fn path(&self) -> &Path {
        &self.dir
    }

    fn acquire_lock(dir: &Path) -> Result<File> {
        let lock_file = File::create(dir.join(LOCK_FILE))?;

        lock_file
            .try_lock_exclusive()
            .map_err(|_| StoreError::Locked)?;

        Ok(lock_file)
    }

    fn write_snapshot(&self, state: &StoreState) -> Result<()> {
        let encoded = rmp_serde::to_vec(state)?;
        let checksum = crc32fast::hash(&encoded);

        let tmp_path = self.dir.join(SNAPSHOT_TMP_FILE);
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&tmp_path)?;

        file.write_all(SNAPSHOT_MAGIC)?;
        file.write_all(&[SNAPSHOT_VERSION])?;
        file.write_all(&(encoded.len() as u64).to_le_bytes())?;
        file.write_all(&encoded)?;
        file.write_all(&checksum.to_le_bytes())?;
        file.sync_all()?;

        fs::rename(&tmp_path, self.dir.join(SNAPSHOT_FILE))?;
        Ok(())
    }

    fn read_snapshot(path: &Path) -> Result<StoreState> {
        let mut bytes = Vec::new();
        File::open(path)?.read_to_end(&mut bytes)?;

        if bytes.len() < HEADER_SIZE + 4 {
            return Err(StoreError::InvalidFormat("Snapshot file truncated".into()));
        }

        if &bytes[0..4] != SNAPSHOT_MAGIC {
            return Err(StoreError::InvalidFormat("Invalid snapshot magic".into()));
        }

        if bytes[4] != SNAPSHOT_VERSION {
            return Err(StoreError::InvalidFormat(format!(
                "Unsupported snapshot version: {}",
                bytes[4]
            )));
        }

        let mut len_bytes = [0u8; 8];
        len_bytes.copy_from_slice(&bytes[5..HEADER_SIZE]);
        let len = u64::from_le_bytes(len_bytes) as usize;

        if bytes.len() != HEADER_SIZE + len + 4 {
            return Err(StoreError::InvalidFormat(format!(
                "Snapshot length mismatch: header says {} bytes, file has {}",
                len,
                bytes.len().saturating_sub(HEADER_SIZE + 4)
            )));
        }

        let body = &bytes[HEADER_SIZE..HEADER_SIZE + len];
        let mut checksum_bytes = [0u8; 4];
        checksum_bytes.copy_from_slice(&bytes[HEADER_SIZE + len..]);
        let stored = u32::from_le_bytes(checksum_bytes);
        let computed = crc32fast::hash(body);
        if stored != computed {
            return Err(StoreError::ChecksumMismatch {
                expected: stored,
                got: computed,
            });
        }

        Ok(rmp_serde::from_slice(body)?)
    }
}

impl PersistentStore for FileStore {
    fn load(&self, entity: &str) -> Result<Vec<StoredObject>> {
        Ok(self.state.read().load(entity))
    }

    fn get(&self, id: ObjectId) -> Result<Option<StoredObject>> {
        Ok(self.state.read().get(id))
    }

    fn commit(&self, changes: ChangeSet) -> Result<()> {
        let _lock = self.write_lock.lock();

        let count = changes.len();
        let mut next = self.state.read().clone();
        next.apply(changes);

        // Disk first; the in-memory state only moves once the snapshot is durable
        self.write_snapshot(&next)?;
        let mut live = self.state.write();
        next.catch_up_ids(&live);
        *live = next;
        drop(live);

        debug!(changes = count, "file store committed");
        Ok(())
    }

    fn next_object_id(&self) -> ObjectId {
        self.state.write().allocate_id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::attributes;
    use serde_json::json;
    use tempfile::TempDir;

    fn insert(store: &FileStore, title: &str) -> ObjectId {
        let id = store.next_object_id();
        store
            .commit(ChangeSet {
                inserted: vec![StoredObject {
                    id,
                    entity: "Task".into(),
                    attributes: attributes([("title", json!(title)), ("done", json!(false))]),
                }],
                ..Default::default()
            })
            .unwrap();
        id
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store");

        let id = {
            let store = FileStore::open(&path, true).unwrap();
            insert(&store, "buy milk")
        };

        let store = FileStore::open(&path, false).unwrap();
        let object = store.get(id).unwrap().unwrap();
        assert_eq!(object.attributes["title"], json!("buy milk"));
        assert_eq!(object.attributes["done"], json!(false));

        // Counter resumes after the highest committed id
        assert!(store.next_object_id() > id);
    }

    #[test]
    fn test_ids_reserved_before_commit_stay_reserved() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path().join("store"), true).unwrap();

        let reserved = store.next_object_id();
        let committed = insert(&store, "buy milk");
        assert_ne!(reserved, committed);

        let fresh = store.next_object_id();
        assert!(fresh > reserved && fresh > committed);
    }

    #[test]
    fn test_creates_directory() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("store");

        let store = FileStore::open(&path, true).unwrap();
        assert_eq!(store.path(), path.as_path());
        assert!(path.join(LOCK_FILE).exists());
        // No snapshot until the first commit
        assert!(!path.join(SNAPSHOT_FILE).exists());
    }

    #[test]
    fn test_missing_directory_without_create() {
        let dir = TempDir::new().unwrap();
        let result = FileStore::open(dir.path().join("absent"), false);
        assert!(matches!(result, Err(StoreError::Io(_))));
    }

    #[test]
    fn test_exclusive_lock() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store");

        let _first = FileStore::open(&path, true).unwrap();
        let second = FileStore::open(&path, true);
        assert!(matches!(second, Err(StoreError::Locked)));
    }

    #[test]
    fn test_checksum_mismatch_detected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store");

        {
            let store = FileStore::open(&path, true).unwrap();
            insert(&store, "buy milk");
        }

        let snapshot = path.join(SNAPSHOT_FILE);
        let mut bytes = fs::read(&snapshot).unwrap();
        bytes[HEADER_SIZE] ^= 0xFF;
        fs::write(&snapshot, bytes).unwrap();

        let result = FileStore::open(&path, false);
        assert!(matches!(result, Err(StoreError::ChecksumMismatch { .. })));
    }

    #[test]
    fn test_bad_magic() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store");
        fs::create_dir_all(&path).unwrap();
        fs::write(path.join(SNAPSHOT_FILE), b"NOPE\x01\0\0\0\0\0\0\0\0\0\0\0\0").unwrap();

        let result = FileStore::open(&path, false);
        assert!(matches!(result, Err(StoreError::InvalidFormat(_))));
    }

    #[test]
    fn test_delete_persists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store");

        {
            let store = FileStore::open(&path, true).unwrap();
            let id = insert(&store, "buy milk");
            insert(&store, "walk dog");
            store
                .commit(ChangeSet {
                    deleted: vec![id],
                    ..Default::default()
                })
                .unwrap();
        }

        let store = FileStore::open(&path, false).unwrap();
        let remaining = store.load("Task").unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].attributes["title"], json!("walk dog"));
    }
}
