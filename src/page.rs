use std::fs::{File, OpenOptions};
use std::path::Path;

use memmap2::MmapMut;

use crate::error::{Error, Result};

/// A fixed-size memory-mapped region backing one page file.
///
/// The final 4 bytes of the mapping hold the `next_page` pointer (0 = no
/// successor); `[0, page_size - 4)` is addressable payload. Pages never
/// reference each other by object identity, only by `id` — the page graph
/// is an arena-with-indices, not a tree of pointers.
#[derive(Debug)]
pub struct Page {
    id: u32,
    mmap: MmapMut,
}

impl Page {
    pub(crate) fn create(path: &Path, id: u32, page_size: u32) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.set_len(page_size as u64)?;

        let mut page = Self::map(file, id)?;
        page.set_next_page(0);
        Ok(page)
    }

    pub(crate) fn open(path: &Path, id: u32) -> Result<Self> {
        if !path.exists() {
            return Err(Error::PageNotFound(id));
        }

        let file = OpenOptions::new().read(true).write(true).open(path)?;
        Self::map(file, id)
    }

    fn map(file: File, id: u32) -> Result<Self> {
        let mmap = unsafe { MmapMut::map_mut(&file)? };
        Ok(Self { id, mmap })
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    fn payload_len(&self) -> usize {
        self.mmap.len() - NEXT_PAGE_FIELD_SIZE
    }

    /// Payload bytes still addressable starting at `offset`.
    pub fn remaining(&self, offset: u32) -> u32 {
        self.payload_len() as u32 - offset
    }

    pub fn read(&self, offset: u32, dst: &mut [u8]) {
        let offset = offset as usize;
        dst.copy_from_slice(&self.mmap[offset..offset + dst.len()]);
    }

    pub fn write(&mut self, offset: u32, src: &[u8]) {
        let offset = offset as usize;
        self.mmap[offset..offset + src.len()].copy_from_slice(src);
    }

    pub fn next_page(&self) -> u32 {
        let start = self.payload_len();
        let mut buf = [0u8; NEXT_PAGE_FIELD_SIZE];
        buf.copy_from_slice(&self.mmap[start..start + NEXT_PAGE_FIELD_SIZE]);
        u32::from_ne_bytes(buf)
    }

    pub fn set_next_page(&mut self, id: u32) {
        let start = self.payload_len();
        self.mmap[start..start + NEXT_PAGE_FIELD_SIZE].copy_from_slice(&id.to_ne_bytes());
    }

    /// Flush the mapping to disk. Called on release and on queue close.
    pub(crate) fn flush(&self) -> Result<()> {
        self.mmap.flush()?;
        Ok(())
    }
}

const NEXT_PAGE_FIELD_SIZE: usize = 4;

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn read_write_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("1");
        let mut page = Page::create(&path, 1, 1 << 19).unwrap();

        page.write(0, b"hello");
        let mut buf = [0u8; 5];
        page.read(0, &mut buf);
        assert_eq!(&buf, b"hello");
    }

    #[test]
    fn next_page_pointer_round_trips() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("1");
        let mut page = Page::create(&path, 1, 1 << 19).unwrap();

        assert_eq!(page.next_page(), 0);
        page.set_next_page(7);
        assert_eq!(page.next_page(), 7);
    }

    #[test]
    fn remaining_matches_invariant() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("1");
        let page_size = 1 << 19;
        let page = Page::create(&path, 1, page_size).unwrap();

        for offset in [0u32, 10, page_size - 4] {
            assert_eq!(page.remaining(offset), page_size - 4 - offset);
        }
    }

    #[test]
    fn open_missing_file_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("404");
        assert!(Page::open(&path, 404).is_err());
    }
}
