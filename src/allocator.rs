use std::collections::{HashMap, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, trace};

use crate::error::Result;
use crate::page::Page;

/// Owns a directory of page files: hands out pages by id, reclaims released
/// ids into a bounded idle cache, and issues fresh ids from a monotonic
/// counter recovered by scanning the directory at startup.
///
/// Idle eviction is FIFO rather than LRU: the oldest released page is the
/// first evicted, which keeps the page either side of the queue just
/// vacated hot for the other side to reuse.
#[derive(Debug)]
pub struct PageAllocator {
    directory: PathBuf,
    page_size: u32,
    max_idle: usize,
    next_id: u32,
    idle_order: VecDeque<u32>,
    idle: HashMap<u32, Page>,
}

impl PageAllocator {
    pub fn open(directory: &Path, page_size: u32, max_idle: usize) -> Result<Self> {
        let next_id = scan_next_id(directory)?;

        Ok(Self {
            directory: directory.to_path_buf(),
            page_size,
            max_idle,
            next_id,
            idle_order: VecDeque::new(),
            idle: HashMap::new(),
        })
    }

    fn page_path(&self, id: u32) -> PathBuf {
        self.directory.join(id.to_string())
    }

    /// Return a fresh page: reuse the oldest idle page's id if one is
    /// available, otherwise allocate a brand new id and file.
    pub fn acquire(&mut self) -> Result<Page> {
        if let Some(id) = self.idle_order.pop_front() {
            let mut page = self.idle.remove(&id).expect("idle_order/idle desynced");
            // The page's `next_page` trailer may still carry a pointer from
            // its previous life in the chain; a fresh page must start with
            // no successor until a write actually chains one on.
            page.set_next_page(0);
            trace!("reusing idle page {id}");
            return Ok(page);
        }

        let id = self.next_id;
        self.next_id += 1;

        debug!("allocating new page {id}");
        Page::create(&self.page_path(id), id, self.page_size)
    }

    /// Return the page with this specific id, whether idle or on disk.
    pub fn acquire_id(&mut self, id: u32) -> Result<Page> {
        if let Some(page) = self.idle.remove(&id) {
            self.idle_order.retain(|&x| x != id);
            trace!("acquiring idle page {id} by id");
            return Ok(page);
        }

        Page::open(&self.page_path(id), id)
    }

    /// Mark a page idle for reuse. Evicts the oldest idle page first if the
    /// cache is full.
    pub fn release(&mut self, page: Page) -> Result<()> {
        let id = page.id();

        if self.max_idle == 0 {
            page.flush()?;
            drop(page);
            fs::remove_file(self.page_path(id))?;
            debug!("evicted released page {id} immediately, max_idle_pages is 0");
            return Ok(());
        }

        if self.idle_order.len() >= self.max_idle {
            if let Some(evicted_id) = self.idle_order.pop_front() {
                if let Some(evicted) = self.idle.remove(&evicted_id) {
                    evicted.flush()?;
                    drop(evicted);
                    fs::remove_file(self.page_path(evicted_id))?;
                    debug!("evicted idle page {evicted_id}");
                }
            }
        }

        self.idle_order.push_back(id);
        self.idle.insert(id, page);
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn idle_len(&self) -> usize {
        self.idle.len()
    }
}

fn scan_next_id(directory: &Path) -> Result<u32> {
    let mut max_id = 0u32;

    if directory.exists() {
        for entry in fs::read_dir(directory)? {
            let entry = entry?;
            if let Some(name) = entry.file_name().to_str() {
                if let Ok(id) = name.parse::<u32>() {
                    max_id = max_id.max(id);
                }
            }
        }
    }

    Ok(max_id + 1)
}
