use crate::error::{Error, Result};

pub const MIN_PAGE_SIZE: u32 = 1 << 19;
/// `memmap2` mappings above a gigabyte are platform-sensitive and untested
/// here, so this crate caps below the nominal `2^31`.
pub const MAX_PAGE_SIZE: u32 = 1 << 30;

pub const DEFAULT_PAGE_SIZE: u32 = 1 << 27;
pub const DEFAULT_MAX_IDLE_PAGES: usize = 16;

/// Construction-time configuration for a [`crate::PersistentQueue`].
#[derive(Debug, Clone, Copy)]
pub struct QueueOptions {
    pub capacity: u32,
    pub page_size: u32,
    pub max_idle_pages: usize,
}

impl Default for QueueOptions {
    fn default() -> Self {
        Self {
            capacity: u32::MAX,
            page_size: DEFAULT_PAGE_SIZE,
            max_idle_pages: DEFAULT_MAX_IDLE_PAGES,
        }
    }
}

impl QueueOptions {
    pub(crate) fn validate(&self) -> Result<()> {
        if self.page_size < MIN_PAGE_SIZE || self.page_size > MAX_PAGE_SIZE {
            return Err(Error::InvalidArgument(format!(
                "page_size {} out of range [{MIN_PAGE_SIZE}, {MAX_PAGE_SIZE}]",
                self.page_size
            )));
        }

        Ok(())
    }
}
