use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use log::{debug, trace, warn};
use parking_lot::{Condvar, Mutex};

use crate::allocator::PageAllocator;
use crate::bytelog::PagedLog;
use crate::cancel::CancellationToken;
use crate::codec::{BincodeCodec, Codec};
use crate::error::{Error, Result};
use crate::index::Index;
use crate::options::QueueOptions;

const LENGTH_PREFIX_SIZE: usize = 4;

/// Cancellation is cooperative; a cancelled token doesn't wake the condvar
/// by itself, so indefinite waits re-check it on a short poll interval.
const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(20);

struct Inner {
    allocator: PageAllocator,
    index: Index,
    log: PagedLog,
}

impl Inner {
    fn size(&self) -> u32 {
        self.index.size()
    }

    fn capacity(&self) -> u32 {
        self.index.capacity()
    }

    fn is_full(&self) -> bool {
        self.size() >= self.capacity()
    }

    fn is_empty(&self) -> bool {
        self.size() == 0
    }

    fn push_raw(&mut self, data: &[u8]) -> Result<()> {
        let len = data.len() as u32;
        self.log.write(&mut self.allocator, &mut self.index, &len.to_ne_bytes())?;
        self.log.write(&mut self.allocator, &mut self.index, data)?;
        self.index.set_size(self.size() + 1);
        Ok(())
    }

    fn pop_raw(&mut self) -> Result<Vec<u8>> {
        let prefix = self.log.read(&mut self.allocator, &mut self.index, LENGTH_PREFIX_SIZE)?;
        let len = u32::from_ne_bytes(prefix.try_into().expect("4 bytes")) as usize;
        let data = self.log.read(&mut self.allocator, &mut self.index, len)?;
        self.index.set_size(self.size() - 1);
        Ok(data)
    }

}

fn peek_frame(log: &PagedLog, allocator: &mut PageAllocator, start: (u32, u32)) -> Result<(Vec<u8>, (u32, u32))> {
    let (prefix, after_prefix) = log.peek_at(allocator, start, LENGTH_PREFIX_SIZE)?;
    let len = u32::from_ne_bytes(prefix.try_into().expect("4 bytes")) as usize;
    log.peek_at(allocator, after_prefix, len)
}

/// A persistent, bounded, blocking FIFO queue backed by a directory of
/// memory-mapped pages. Operations serialize on a single
/// [`parking_lot::Mutex`]; the blocking variants wait on a
/// [`parking_lot::Condvar`] and re-check their predicate on every wake.
pub struct PersistentQueue<T, C = BincodeCodec> {
    directory: PathBuf,
    codec: C,
    inner: Mutex<Inner>,
    not_empty: Condvar,
    not_full: Condvar,
    _marker: PhantomData<fn() -> T>,
}

impl<T> PersistentQueue<T, BincodeCodec>
where
    T: serde::Serialize + serde::de::DeserializeOwned + Send + Sync,
{
    pub fn open(directory: impl AsRef<Path>, options: QueueOptions) -> Result<Self> {
        Self::open_with_codec(directory, options, BincodeCodec)
    }
}

impl<T, C> PersistentQueue<T, C>
where
    C: Codec<T>,
{
    pub fn open_with_codec(directory: impl AsRef<Path>, options: QueueOptions, codec: C) -> Result<Self> {
        options.validate()?;

        let directory = directory.as_ref().to_path_buf();
        let fresh = is_fresh_directory(&directory)?;

        if fresh {
            std::fs::create_dir_all(&directory)?;
        }

        let index = if fresh {
            debug!("initializing fresh queue at {}", directory.display());
            Index::create(&directory, options.capacity)?
        } else {
            trace!("opening existing queue at {}", directory.display());
            Index::open(&directory)?
        };

        let mut allocator = PageAllocator::open(&directory, options.page_size, options.max_idle_pages)?;

        if fresh {
            // Materialize page id 1 on disk so the log's initial head/tail
            // cursor, which the index already points at, resolves to a real
            // file; dropped rather than released so this doesn't depend on
            // `max_idle_pages` (which may be 0).
            let first = allocator.acquire()?;
            debug_assert_eq!(first.id(), 1, "first page allocated in a fresh directory must be id 1");
            drop(first);
        }

        let log = PagedLog::open(&mut allocator, &index)?;

        Ok(Self {
            directory,
            codec,
            inner: Mutex::new(Inner { allocator, index, log }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            _marker: PhantomData,
        })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn size(&self) -> u32 {
        self.inner.lock().size()
    }

    pub fn remaining_capacity(&self) -> u32 {
        let inner = self.inner.lock();
        inner.capacity() - inner.size()
    }

    pub fn capacity(&self) -> u32 {
        self.inner.lock().capacity()
    }

    /// Block until there is room, then enqueue `elem`.
    pub fn put(&self, elem: T) -> Result<()> {
        self.put_cancelable(elem, &CancellationToken::new())
    }

    pub fn put_cancelable(&self, elem: T, token: &CancellationToken) -> Result<()> {
        let data = self.codec.encode(&elem)?;

        let mut guard = self.inner.lock();
        while guard.is_full() {
            if token.is_cancelled() {
                return Err(Error::Cancelled);
            }
            self.not_full.wait_for(&mut guard, CANCEL_POLL_INTERVAL);
        }

        guard.push_raw(&data)?;
        drop(guard);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Enqueue `elem` if there is room, returning `false` immediately if full.
    pub fn offer(&self, elem: T) -> Result<bool> {
        let data = self.codec.encode(&elem)?;

        let mut guard = self.inner.lock();
        if guard.is_full() {
            return Ok(false);
        }

        guard.push_raw(&data)?;
        drop(guard);
        self.not_empty.notify_one();
        Ok(true)
    }

    pub fn offer_timeout(&self, elem: T, timeout: Duration) -> Result<bool> {
        self.offer_timeout_cancelable(elem, timeout, &CancellationToken::new())
    }

    pub fn offer_timeout_cancelable(
        &self,
        elem: T,
        timeout: Duration,
        token: &CancellationToken,
    ) -> Result<bool> {
        let data = self.codec.encode(&elem)?;
        let deadline = Instant::now() + timeout;

        let mut guard = self.inner.lock();
        while guard.is_full() {
            if token.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(false);
            }

            self.not_full.wait_for(&mut guard, remaining);
        }

        guard.push_raw(&data)?;
        drop(guard);
        self.not_empty.notify_one();
        Ok(true)
    }

    /// Block until there is an element, then dequeue it.
    pub fn take(&self) -> Result<T> {
        self.take_cancelable(&CancellationToken::new())
    }

    pub fn take_cancelable(&self, token: &CancellationToken) -> Result<T> {
        let mut guard = self.inner.lock();
        while guard.is_empty() {
            if token.is_cancelled() {
                return Err(Error::Cancelled);
            }
            self.not_empty.wait_for(&mut guard, CANCEL_POLL_INTERVAL);
        }

        let data = guard.pop_raw()?;
        drop(guard);
        self.not_full.notify_one();
        self.codec.decode(&data)
    }

    /// Dequeue an element if one is available, returning `None` if empty.
    pub fn poll(&self) -> Result<Option<T>> {
        let mut guard = self.inner.lock();
        if guard.is_empty() {
            return Ok(None);
        }

        let data = guard.pop_raw()?;
        drop(guard);
        self.not_full.notify_one();
        self.codec.decode(&data).map(Some)
    }

    pub fn poll_timeout(&self, timeout: Duration) -> Result<Option<T>> {
        self.poll_timeout_cancelable(timeout, &CancellationToken::new())
    }

    pub fn poll_timeout_cancelable(
        &self,
        timeout: Duration,
        token: &CancellationToken,
    ) -> Result<Option<T>> {
        let deadline = Instant::now() + timeout;

        let mut guard = self.inner.lock();
        while guard.is_empty() {
            if token.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }

            self.not_empty.wait_for(&mut guard, remaining);
        }

        let data = guard.pop_raw()?;
        drop(guard);
        self.not_full.notify_one();
        self.codec.decode(&data).map(Some)
    }

    /// Return the head element without removing it or releasing any page.
    pub fn peek(&self) -> Result<Option<T>> {
        let mut guard = self.inner.lock();
        if guard.is_empty() {
            return Ok(None);
        }

        let head = guard.index.head();
        let Inner { log, allocator, .. } = &mut *guard;
        let (data, _end) = peek_frame(log, allocator, head)?;
        drop(guard);
        self.codec.decode(&data).map(Some)
    }

    /// Elements already popped are lost if `sink` panics partway through.
    pub fn drain_to(&self, sink: &mut impl Extend<T>, max: u32) -> Result<u32> {
        let mut guard = self.inner.lock();
        let count = max.min(guard.size());

        let mut drained = Vec::with_capacity(count as usize);
        for _ in 0..count {
            drained.push(guard.pop_raw()?);
        }
        drop(guard);

        if count > 0 {
            self.not_full.notify_one();
        }

        for data in drained {
            sink.extend(std::iter::once(self.codec.decode(&data)?));
        }

        Ok(count)
    }

    /// Snapshot of the current contents, taken under the lock at call time.
    pub fn iter(&self) -> Result<std::vec::IntoIter<Result<T>>> {
        let mut guard = self.inner.lock();
        let count = guard.size();
        let mut cursor = guard.index.head();

        let mut frames = Vec::with_capacity(count as usize);
        {
            let Inner { log, allocator, .. } = &mut *guard;
            for _ in 0..count {
                let (data, end) = peek_frame(log, allocator, cursor)?;
                frames.push(data);
                cursor = end;
            }
        }
        drop(guard);

        let decoded: Vec<Result<T>> = frames.into_iter().map(|data| self.codec.decode(&data)).collect();
        Ok(decoded.into_iter())
    }

    pub fn close(&self) -> Result<()> {
        let guard = self.inner.lock();
        guard.log.flush()?;
        guard.index.flush()?;
        Ok(())
    }
}

impl<T, C> Drop for PersistentQueue<T, C> {
    fn drop(&mut self) {
        let guard = self.inner.lock();
        if let Err(e) = guard.log.flush() {
            warn!("failed to flush paged log on drop: {e}");
        }
        if let Err(e) = guard.index.flush() {
            warn!("failed to flush index on drop: {e}");
        }
    }
}

fn is_fresh_directory(directory: &Path) -> Result<bool> {
    if !directory.exists() {
        return Ok(true);
    }

    let mut entries = std::fs::read_dir(directory)?;
    Ok(entries.next().is_none())
}
