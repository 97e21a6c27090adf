use std::fs::OpenOptions;
use std::path::Path;

use memmap2::MmapMut;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::error::{Error, Result};

pub(crate) const INDEX_FILE_NAME: &str = ".index";

/// The on-disk layout of the 24-byte index header: six native-endian `u32`
/// fields at fixed offsets. This is the single source of truth for queue
/// size and for the head/tail cursor positions — the paged byte log reads
/// and writes it, never its own copy.
#[derive(FromBytes, IntoBytes, KnownLayout, Immutable, Debug, Clone, Copy)]
#[repr(C)]
struct IndexRecord {
    size: u32,
    capacity: u32,
    head_file: u32,
    head_offset: u32,
    tail_file: u32,
    tail_offset: u32,
}

const RECORD_SIZE: usize = std::mem::size_of::<IndexRecord>();

/// A memory-mapped wrapper around the queue's `.index` file.
#[derive(Debug)]
pub struct Index {
    mmap: MmapMut,
}

impl Index {
    /// Initial cursors point at page id 1, offset 0.
    pub fn create(directory: &Path, capacity: u32) -> Result<Self> {
        let path = directory.join(INDEX_FILE_NAME);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;
        file.set_len(RECORD_SIZE as u64)?;

        let mut mmap = unsafe { MmapMut::map_mut(&file)? };

        let record = IndexRecord {
            size: 0,
            capacity,
            head_file: 1,
            head_offset: 0,
            tail_file: 1,
            tail_offset: 0,
        };
        record.write_to(&mut mmap[..]).expect("record fits exactly");
        mmap.flush()?;

        Ok(Self { mmap })
    }

    pub fn open(directory: &Path) -> Result<Self> {
        let path = directory.join(INDEX_FILE_NAME);
        if !path.exists() {
            return Err(Error::NotAQueue(directory.to_path_buf()));
        }

        let file = OpenOptions::new().read(true).write(true).open(&path)?;
        let len = file.metadata()?.len();
        if len != RECORD_SIZE as u64 {
            return Err(Error::NotAQueue(directory.to_path_buf()));
        }

        let mmap = unsafe { MmapMut::map_mut(&file)? };
        Ok(Self { mmap })
    }

    fn record(&self) -> IndexRecord {
        IndexRecord::read_from_bytes(&self.mmap[..]).expect("index file is exactly RECORD_SIZE")
    }

    fn with_record_mut(&mut self, f: impl FnOnce(&mut IndexRecord)) {
        let mut record = self.record();
        f(&mut record);
        record
            .write_to(&mut self.mmap[..])
            .expect("record fits exactly");
    }

    pub fn size(&self) -> u32 {
        self.record().size
    }

    pub fn set_size(&mut self, size: u32) {
        self.with_record_mut(|r| r.size = size);
    }

    pub fn capacity(&self) -> u32 {
        self.record().capacity
    }

    pub fn head(&self) -> (u32, u32) {
        let r = self.record();
        (r.head_file, r.head_offset)
    }

    pub fn set_head(&mut self, file: u32, offset: u32) {
        self.with_record_mut(|r| {
            r.head_file = file;
            r.head_offset = offset;
        });
    }

    pub fn tail(&self) -> (u32, u32) {
        let r = self.record();
        (r.tail_file, r.tail_offset)
    }

    pub fn set_tail(&mut self, file: u32, offset: u32) {
        self.with_record_mut(|r| {
            r.tail_file = file;
            r.tail_offset = offset;
        });
    }

    pub fn flush(&self) -> Result<()> {
        self.mmap.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn create_initializes_fresh_state() {
        let dir = TempDir::new().unwrap();
        let index = Index::create(dir.path(), 42).unwrap();

        assert_eq!(index.size(), 0);
        assert_eq!(index.capacity(), 42);
        assert_eq!(index.head(), (1, 0));
        assert_eq!(index.tail(), (1, 0));
    }

    #[test]
    fn open_missing_index_fails_as_not_a_queue() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(Index::open(dir.path()), Err(Error::NotAQueue(_))));
    }

    #[test]
    fn mutations_persist_across_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let mut index = Index::create(dir.path(), 10).unwrap();
            index.set_size(3);
            index.set_head(2, 100);
            index.set_tail(5, 200);
            index.flush().unwrap();
        }

        let index = Index::open(dir.path()).unwrap();
        assert_eq!(index.size(), 3);
        assert_eq!(index.capacity(), 10);
        assert_eq!(index.head(), (2, 100));
        assert_eq!(index.tail(), (5, 200));
    }

    #[test]
    fn opening_existing_queue_ignores_passed_capacity() {
        let dir = TempDir::new().unwrap();
        Index::create(dir.path(), 10).unwrap();

        // Reopening with a different desired capacity is a no-op on-disk;
        // callers are expected to call `open`, not `create`, and read
        // `capacity()` back rather than trust what they asked for.
        let index = Index::open(dir.path()).unwrap();
        assert_eq!(index.capacity(), 10);
    }
}
