use log::debug;

use crate::allocator::PageAllocator;
use crate::error::Result;
use crate::index::Index;
use crate::page::Page;

/// Read/write helpers that traverse pages via the embedded next-page
/// pointer: advancing the head on read (releasing consumed pages back to
/// the allocator) and extending the tail with fresh pages on write.
///
/// Both primitives run under the queue's lock; the caller (the queue core)
/// owns that invariant, not this type.
#[derive(Debug)]
pub struct PagedLog {
    head: Page,
    tail: Page,
}

impl PagedLog {
    pub fn open(allocator: &mut PageAllocator, index: &Index) -> Result<Self> {
        let (head_file, _) = index.head();
        let (tail_file, _) = index.tail();

        let head = allocator.acquire_id(head_file)?;
        let tail = allocator.acquire_id(tail_file)?;

        Ok(Self { head, tail })
    }

    pub fn write(&mut self, allocator: &mut PageAllocator, index: &mut Index, data: &[u8]) -> Result<()> {
        let mut offset = index.tail().1;
        let mut written = 0usize;
        let len = data.len();

        while written < len {
            let avail = self.tail.remaining(offset);
            let need = (len - written) as u32;

            if avail < need {
                self.tail
                    .write(offset, &data[written..written + avail as usize]);

                let next = allocator.acquire()?;
                self.tail.set_next_page(next.id());
                self.tail.flush()?;

                written += avail as usize;
                self.tail = next;
                offset = 0;
            } else {
                self.tail
                    .write(offset, &data[written..written + need as usize]);
                offset += need;
                written += need as usize;
            }
        }

        index.set_tail(self.tail.id(), offset);
        Ok(())
    }

    /// Releases drained pages back to the allocator as the cursor crosses
    /// into a successor.
    pub fn read(&mut self, allocator: &mut PageAllocator, index: &mut Index, len: usize) -> Result<Vec<u8>> {
        let mut offset = index.head().1;
        let mut out = vec![0u8; len];
        let mut have = 0usize;

        while have < len {
            let avail = self.head.remaining(offset);
            let need = (len - have) as u32;

            if avail < need {
                self.head
                    .read(offset, &mut out[have..have + avail as usize]);
                have += avail as usize;

                let next_id = self.head.next_page();
                let next = allocator.acquire_id(next_id)?;
                let drained = std::mem::replace(&mut self.head, next);
                let drained_id = drained.id();
                allocator.release(drained)?;
                debug!("released drained page {drained_id}, head now {next_id}");

                offset = 0;
            } else {
                self.head.read(offset, &mut out[have..have + need as usize]);
                offset += need;
                have += need as usize;
            }
        }

        index.set_head(self.head.id(), offset);
        Ok(out)
    }

    /// Read `len` bytes starting at the head cursor without mutating it and
    /// without releasing any page. Crossing a page boundary opens a
    /// temporary mapping of the successor rather than touching `self.head`.
    pub fn peek(&self, allocator: &mut PageAllocator, index: &Index, len: usize) -> Result<Vec<u8>> {
        let (data, _end) = self.peek_at(allocator, index.head(), len)?;
        Ok(data)
    }

    /// Read `len` bytes starting at an arbitrary `(file, offset)` cursor,
    /// without mutating the real head and without releasing any page.
    /// Returns the bytes read and the cursor position just past them, so a
    /// caller (the snapshot iterator) can chain calls to walk the whole log.
    pub fn peek_at(
        &self,
        allocator: &mut PageAllocator,
        start: (u32, u32),
        len: usize,
    ) -> Result<(Vec<u8>, (u32, u32))> {
        let (mut cur_id, mut offset) = start;
        let mut out = vec![0u8; len];
        let mut have = 0usize;

        while have < len {
            let page = allocator.acquire_id(cur_id)?;
            let avail = page.remaining(offset);
            let need = (len - have) as u32;

            if avail < need {
                page.read(offset, &mut out[have..have + avail as usize]);
                have += avail as usize;
                cur_id = page.next_page();
                offset = 0;
            } else {
                page.read(offset, &mut out[have..have + need as usize]);
                have += need as usize;
                offset += need;
            }
        }

        Ok((out, (cur_id, offset)))
    }

    pub fn flush(&self) -> Result<()> {
        self.head.flush()?;
        self.tail.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_log(dir: &std::path::Path, page_size: u32) -> (PageAllocator, Index, PagedLog) {
        let mut allocator = PageAllocator::open(dir, page_size, 16).unwrap();
        let index = Index::create(dir, u32::MAX).unwrap();
        let log = PagedLog::open(&mut allocator, &index).unwrap();
        (allocator, index, log)
    }

    #[test]
    fn write_then_read_small_element() {
        let dir = TempDir::new().unwrap();
        let (mut alloc, mut index, mut log) = open_log(dir.path(), 1 << 19);

        log.write(&mut alloc, &mut index, b"hello world").unwrap();
        let out = log.read(&mut alloc, &mut index, b"hello world".len()).unwrap();

        assert_eq!(out, b"hello world");
    }

    #[test]
    fn write_spans_multiple_pages() {
        let dir = TempDir::new().unwrap();
        let page_size = 1 << 19;
        let (mut alloc, mut index, mut log) = open_log(dir.path(), page_size);

        let data = vec![0xABu8; (page_size as usize) * 3];
        log.write(&mut alloc, &mut index, &data).unwrap();
        let out = log.read(&mut alloc, &mut index, data.len()).unwrap();

        assert_eq!(out, data);
    }

    #[test]
    fn peek_does_not_advance_or_release() {
        let dir = TempDir::new().unwrap();
        let (mut alloc, mut index, mut log) = open_log(dir.path(), 1 << 19);

        log.write(&mut alloc, &mut index, b"abc").unwrap();

        let head_before = index.head();
        let peeked = log.peek(&mut alloc, &index, 3).unwrap();
        assert_eq!(peeked, b"abc");
        assert_eq!(index.head(), head_before);

        let read = log.read(&mut alloc, &mut index, 3).unwrap();
        assert_eq!(read, b"abc");
    }

    #[test]
    fn sequential_elements_preserve_fifo_order() {
        let dir = TempDir::new().unwrap();
        let (mut alloc, mut index, mut log) = open_log(dir.path(), 1 << 19);

        for chunk in [&b"one"[..], &b"two"[..], &b"three"[..]] {
            log.write(&mut alloc, &mut index, chunk).unwrap();
        }

        assert_eq!(log.read(&mut alloc, &mut index, 3).unwrap(), b"one");
        assert_eq!(log.read(&mut alloc, &mut index, 3).unwrap(), b"two");
        assert_eq!(log.read(&mut alloc, &mut index, 5).unwrap(), b"three");
    }
}
