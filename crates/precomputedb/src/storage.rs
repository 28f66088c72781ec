//! Storage engine implementation
//!
//! File layout:
//! - `precompute.db`: header followed by append-only witness records
//!
//! The in-memory index is rebuilt on open by replaying every record; the
//! last record written for a key wins.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use ahash::RandomState;
use memmap2::Mmap;
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::key::Hash256;
use crate::parser::{create_header, encode_record, parse_header, parse_record, HEADER_LEN, PCDB_VERSION};

/// Maximum value size (1 MB)
pub const MAX_VALUE_SIZE: usize = 1024 * 1024;

/// Name of the data file inside the store directory
pub const DATA_FILE_NAME: &str = "precompute.db";

/// Location of a value inside the data file
#[derive(Debug, Clone, Copy)]
struct Location {
    offset: u64,
    len: u32,
}

/// PrecomputeDb is the durable store for witness records
pub struct PrecomputeDb {
    /// Path to the data file
    path: PathBuf,

    /// Data file handle
    data_file: RwLock<File>,

    /// In-memory index: key -> latest value location
    index: RwLock<HashMap<Hash256, Location, RandomState>>,

    /// Current data file size
    db_size: RwLock<u64>,

    /// Is the store closed?
    closed: RwLock<bool>,
}

impl PrecomputeDb {
    /// Open or create a store at the given directory
    ///
    /// # Arguments
    /// * `path` - Directory holding the data file
    ///
    /// # Returns
    /// * `Result<PrecomputeDb>` - Store handle
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        std::fs::create_dir_all(path)?;

        let data_path = path.join(DATA_FILE_NAME);

        let (data_file, index, db_size) = if data_path.exists() {
            Self::open_existing(&data_path)?
        } else {
            Self::create_new(&data_path)?
        };

        info!(path = %data_path.display(), records = index.len(), bytes = db_size, "Opened precompute store");

        Ok(PrecomputeDb {
            path: data_path,
            data_file: RwLock::new(data_file),
            index: RwLock::new(index),
            db_size: RwLock::new(db_size),
            closed: RwLock::new(false),
        })
    }

    fn open_existing(data_path: &Path) -> Result<(File, HashMap<Hash256, Location, RandomState>, u64)> {
        let data_file = OpenOptions::new().read(true).write(true).open(data_path)?;

        let file_len = data_file.metadata()?.len();
        if file_len < HEADER_LEN as u64 {
            return Err(Error::Parse("Data file shorter than header".to_string()));
        }

        let mut index = HashMap::with_hasher(RandomState::new());

        // SAFETY: the map is read-only and dropped before the file is
        // truncated or appended to below.
        let mmap = unsafe { Mmap::map(&data_file)? };
        parse_header(&mmap[..HEADER_LEN])?;

        let mut rest = &mmap[HEADER_LEN..];
        let mut replayed = 0usize;
        while !rest.is_empty() {
            match parse_record(rest) {
                Ok((remaining, record)) => {
                    let end = mmap.len() - remaining.len();
                    let offset = end - record.value.len();
                    index.insert(
                        record.key,
                        Location {
                            offset: offset as u64,
                            len: record.value.len() as u32,
                        },
                    );
                    replayed += 1;
                    rest = remaining;
                }
                Err(_) => break,
            }
        }

        let valid_len = (mmap.len() - rest.len()) as u64;
        drop(mmap);

        if valid_len < file_len {
            warn!(
                path = %data_path.display(),
                dropped = file_len - valid_len,
                "Truncated trailing partial record"
            );
            data_file.set_len(valid_len)?;
            data_file.sync_all()?;
        }

        debug!(records = replayed, keys = index.len(), "Replayed data file");

        Ok((data_file, index, valid_len))
    }

    fn create_new(data_path: &Path) -> Result<(File, HashMap<Hash256, Location, RandomState>, u64)> {
        let mut data_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(data_path)?;

        let header = create_header(PCDB_VERSION);
        data_file.write_all(&header)?;

        Ok((data_file, HashMap::with_hasher(RandomState::new()), header.len() as u64))
    }

    /// Append a witness record, replacing any earlier value for the key
    ///
    /// # Arguments
    /// * `key` - 256-bit record key
    /// * `value` - Serialized witness data
    pub fn write(&self, key: &Hash256, value: &[u8]) -> Result<()> {
        if *self.closed.read() {
            return Err(Error::Closed);
        }

        if value.len() > MAX_VALUE_SIZE {
            return Err(Error::ValueTooLarge(value.len()));
        }

        let record = encode_record(key, value);

        let mut db_size = self.db_size.write();
        let mut data_file = self.data_file.write();

        // Append at the end of the last whole record so bytes left behind by
        // a failed write are overwritten rather than followed.
        let offset = data_file.seek(SeekFrom::Start(*db_size))?;
        if let Err(err) = data_file.write_all(&record) {
            warn!(key = %key, offset, error = %err, "Append failed, rolling back partial record");
            let _ = data_file.set_len(offset);
            return Err(err.into());
        }

        let end = offset + record.len() as u64;
        self.index.write().insert(
            *key,
            Location {
                offset: end - value.len() as u64,
                len: value.len() as u32,
            },
        );
        *db_size = end;

        Ok(())
    }

    /// Read the latest value stored for a key
    ///
    /// # Returns
    /// * `Result<Option<Vec<u8>>>` - `None` if the key was never written
    pub fn read(&self, key: &Hash256) -> Result<Option<Vec<u8>>> {
        if *self.closed.read() {
            return Err(Error::Closed);
        }

        let location = match self.index.read().get(key) {
            Some(location) => *location,
            None => return Ok(None),
        };

        let mut data_file = self.data_file.write();
        data_file.seek(SeekFrom::Start(location.offset))?;

        let mut value = vec![0u8; location.len as usize];
        data_file.read_exact(&mut value)?;

        Ok(Some(value))
    }

    /// Check whether a key has been written
    pub fn contains(&self, key: &Hash256) -> bool {
        self.index.read().contains_key(key)
    }

    /// Snapshot of every stored key
    pub fn keys(&self) -> Vec<Hash256> {
        self.index.read().keys().copied().collect()
    }

    /// Get the number of distinct keys in the store
    pub fn len(&self) -> usize {
        self.index.read().len()
    }

    /// Check if the store is empty
    pub fn is_empty(&self) -> bool {
        self.index.read().is_empty()
    }

    /// Size of the data file in bytes
    pub fn file_size(&self) -> u64 {
        *self.db_size.read()
    }

    /// Path of the data file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flush appended records to disk
    pub fn sync(&self) -> Result<()> {
        if *self.closed.read() {
            return Err(Error::Closed);
        }
        self.data_file.read().sync_data()?;
        Ok(())
    }

    /// Close the store and fsync all changes
    pub fn close(&mut self) -> Result<()> {
        if *self.closed.read() {
            return Ok(());
        }

        self.data_file.write().sync_all()?;
        *self.closed.write() = true;

        debug!(path = %self.path.display(), "Closed precompute store");
        Ok(())
    }
}

impl Drop for PrecomputeDb {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::KEY_SIZE;
    use crate::parser::RECORD_OVERHEAD;
    use tempfile::TempDir;

    fn key(n: u8) -> Hash256 {
        Hash256::new([n; KEY_SIZE])
    }

    #[test]
    fn test_create_and_open() {
        let dir = TempDir::new().unwrap();
        let mut db = PrecomputeDb::open(dir.path()).unwrap();

        assert_eq!(db.len(), 0);
        assert!(db.is_empty());
        assert_eq!(db.file_size(), HEADER_LEN as u64);

        db.close().unwrap();

        // Reopen
        let db = PrecomputeDb::open(dir.path()).unwrap();
        assert_eq!(db.len(), 0);
    }

    #[test]
    fn test_write_and_read() {
        let dir = TempDir::new().unwrap();
        let db = PrecomputeDb::open(dir.path()).unwrap();

        db.write(&key(1), b"witness data").unwrap();

        assert_eq!(db.len(), 1);
        assert!(db.contains(&key(1)));
        assert_eq!(db.read(&key(1)).unwrap().unwrap(), b"witness data");
        assert_eq!(db.file_size(), (HEADER_LEN + RECORD_OVERHEAD + 12) as u64);
    }

    #[test]
    fn test_read_not_found() {
        let dir = TempDir::new().unwrap();
        let db = PrecomputeDb::open(dir.path()).unwrap();

        assert!(db.read(&key(4)).unwrap().is_none());
        assert!(!db.contains(&key(4)));
    }

    #[test]
    fn test_overwrite_keeps_latest() {
        let dir = TempDir::new().unwrap();
        let db = PrecomputeDb::open(dir.path()).unwrap();

        db.write(&key(1), b"first").unwrap();
        db.write(&key(1), b"second value").unwrap();

        assert_eq!(db.len(), 1);
        assert_eq!(db.read(&key(1)).unwrap().unwrap(), b"second value");
    }

    #[test]
    fn test_value_too_large() {
        let dir = TempDir::new().unwrap();
        let db = PrecomputeDb::open(dir.path()).unwrap();

        let large = vec![b'x'; MAX_VALUE_SIZE + 1];
        let result = db.write(&key(1), &large);
        assert!(matches!(result, Err(Error::ValueTooLarge(_))));
        assert!(db.is_empty());
    }

    #[test]
    fn test_persistence() {
        let dir = TempDir::new().unwrap();

        {
            let mut db = PrecomputeDb::open(dir.path()).unwrap();
            db.write(&key(1), b"one").unwrap();
            db.write(&key(2), b"two").unwrap();
            db.write(&key(1), b"one again").unwrap();
            db.close().unwrap();
        }

        {
            let db = PrecomputeDb::open(dir.path()).unwrap();
            assert_eq!(db.len(), 2);
            assert_eq!(db.read(&key(1)).unwrap().unwrap(), b"one again");
            assert_eq!(db.read(&key(2)).unwrap().unwrap(), b"two");

            let mut keys = db.keys();
            keys.sort();
            assert_eq!(keys, vec![key(1), key(2)]);
        }
    }

    #[test]
    fn test_truncated_tail_is_dropped() {
        let dir = TempDir::new().unwrap();
        let full_len;

        {
            let mut db = PrecomputeDb::open(dir.path()).unwrap();
            db.write(&key(1), b"complete").unwrap();
            full_len = db.file_size();
            db.write(&key(2), b"partially written").unwrap();
            db.close().unwrap();
        }

        // Simulate a crash halfway through the second append
        let data_path = dir.path().join(DATA_FILE_NAME);
        let file = OpenOptions::new().write(true).open(&data_path).unwrap();
        file.set_len(full_len + 10).unwrap();
        drop(file);

        let db = PrecomputeDb::open(dir.path()).unwrap();
        assert_eq!(db.len(), 1);
        assert_eq!(db.read(&key(1)).unwrap().unwrap(), b"complete");
        assert!(!db.contains(&key(2)));
        assert_eq!(db.file_size(), full_len);
        assert_eq!(std::fs::metadata(&data_path).unwrap().len(), full_len);

        // Appends continue after the recovered tail
        db.write(&key(3), b"after recovery").unwrap();
        assert_eq!(db.read(&key(3)).unwrap().unwrap(), b"after recovery");
    }

    #[test]
    fn test_write_after_partial_append_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let data_path = dir.path().join(DATA_FILE_NAME);

        {
            let mut db = PrecomputeDb::open(dir.path()).unwrap();
            db.write(&key(1), b"complete").unwrap();
            let whole_len = db.file_size();

            // Leftover bytes from an append that failed partway
            let partial = encode_record(&key(2), b"never acknowledged");
            let mut file = OpenOptions::new().append(true).open(&data_path).unwrap();
            file.write_all(&partial[..20]).unwrap();
            drop(file);

            db.write(&key(3), b"acknowledged").unwrap();
            assert_eq!(db.file_size(), whole_len + (RECORD_OVERHEAD + 12) as u64);
            assert_eq!(db.read(&key(3)).unwrap().unwrap(), b"acknowledged");
            db.close().unwrap();
        }

        let db = PrecomputeDb::open(dir.path()).unwrap();
        let mut keys = db.keys();
        keys.sort();
        assert_eq!(keys, vec![key(1), key(3)]);
        assert_eq!(db.read(&key(3)).unwrap().unwrap(), b"acknowledged");
    }

    #[test]
    fn test_corrupt_header() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(DATA_FILE_NAME), b"NOTADB00\x01\x00\x00\x00").unwrap();

        let result = PrecomputeDb::open(dir.path());
        assert!(matches!(result, Err(Error::Parse(_))));
    }

    #[test]
    fn test_close_twice() {
        let dir = TempDir::new().unwrap();
        let mut db = PrecomputeDb::open(dir.path()).unwrap();

        db.close().unwrap();
        db.close().unwrap(); // Should not error
    }

    #[test]
    fn test_write_after_close() {
        let dir = TempDir::new().unwrap();
        let mut db = PrecomputeDb::open(dir.path()).unwrap();

        db.close().unwrap();

        assert!(matches!(db.write(&key(1), b"late"), Err(Error::Closed)));
        assert!(matches!(db.read(&key(1)), Err(Error::Closed)));
    }
}
