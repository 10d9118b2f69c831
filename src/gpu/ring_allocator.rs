//! Paged CPU-visible ring staging allocator (C5).
//!
//! Grounded in
//! `original_source/engine/src/renderer/AsyncLoaderStagingManager.cpp`. The
//! source guards `m_head`/pages under one mutex (`m_ringMutex`) but reads
//! page batch ids from `waitForPages` under a *different* mutex
//! (`m_batchMutex`) — a data race. This port uses a single mutex around
//! `{head, pages}` so waiting and marking can never observe a torn page
//! state (documented as a resolved "Open question" in `DESIGN.md`).

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::errors::{EngineError, Result};

const ALIGNMENT: u64 = 256;
const WAIT_TIMEOUT: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy, Default)]
struct Page {
    last_batch_id: u64,
}

struct Inner {
    head: u64,
    pages: Vec<Page>,
}

struct TemporaryBufferSlot {
    size: u64,
    in_use: Arc<AtomicBool>,
}

/// A successful reservation: either a slice of the ring or a standalone
/// oversize buffer (spec §4.5).
pub struct Reservation {
    pub offset: u64,
    pub size: u64,
    pub is_temporary: bool,
    pub batch_id: u64,
    temp_in_use: Option<Arc<AtomicBool>>,
}

impl Reservation {
    /// Releases a temporary (oversize) reservation back to the pool. No-op
    /// for ring-path reservations — those are reclaimed implicitly once the
    /// ring wraps past them.
    pub fn release(&self) {
        if let Some(flag) = &self.temp_in_use {
            flag.store(false, Ordering::Release);
        }
    }
}

/// Fixed-capacity CPU-visible ring buffer divided into fixed-size pages,
/// reclaimed per-page by GPU batch completion (spec §4.5).
pub struct RingStagingAllocator {
    capacity: u64,
    page_size: u64,
    page_count: usize,
    max_temporary_buffers: usize,
    inner: Mutex<Inner>,
    batch_cv: Condvar,
    completed_batch_id: AtomicU64,
    next_batch_id: AtomicU64,
    temporary_buffers: Mutex<Vec<TemporaryBufferSlot>>,
}

impl RingStagingAllocator {
    pub fn new(capacity: u64, page_size: u64, max_temporary_buffers: usize) -> Self {
        let page_count = (capacity / page_size) as usize;
        Self {
            capacity,
            page_size,
            page_count,
            max_temporary_buffers,
            inner: Mutex::new(Inner { head: 0, pages: vec![Page::default(); page_count] }),
            batch_cv: Condvar::new(),
            completed_batch_id: AtomicU64::new(0),
            next_batch_id: AtomicU64::new(1),
            temporary_buffers: Mutex::new(Vec::new()),
        }
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    pub fn completed_batch_id(&self) -> u64 {
        self.completed_batch_id.load(Ordering::Acquire)
    }

    /// Allocates a fresh monotonic batch id.
    pub fn begin_batch(&self) -> u64 {
        self.next_batch_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Reserves `size` bytes for `batch_id`, per the algorithm in spec §4.5.
    pub fn reserve(&self, size: u64, batch_id: u64) -> Result<Reservation> {
        if size > self.capacity / 2 {
            return self.allocate_temporary(size);
        }

        let (start, start_page, end_page) = {
            let inner = self.inner.lock();
            let mut start = (inner.head + (ALIGNMENT - 1)) & !(ALIGNMENT - 1);
            if start + size > self.capacity {
                start = 0;
            }
            let start_page = (start / self.page_size) as usize;
            let end_page = (((start + size).div_ceil(self.page_size)) as usize).min(self.page_count);
            (start, start_page, end_page)
        };

        self.wait_for_pages(start_page, end_page, batch_id, size)?;

        let mut inner = self.inner.lock();
        inner.head = start + size;

        Ok(Reservation { offset: start, size, is_temporary: false, batch_id, temp_in_use: None })
    }

    fn wait_for_pages(&self, start_page: usize, end_page: usize, batch_id: u64, requested: u64) -> Result<()> {
        let mut inner = self.inner.lock();
        for i in start_page..end_page {
            let page_batch = inner.pages[i].last_batch_id;
            if page_batch == 0 {
                continue;
            }
            if page_batch >= batch_id {
                log::error!(
                    "ring allocator: page {i} owned by batch {page_batch} >= current batch {batch_id}"
                );
                return Err(EngineError::StagingCapacityExceeded { requested });
            }
            while self.completed_batch_id.load(Ordering::Acquire) < page_batch {
                self.batch_cv.wait_for(&mut inner, WAIT_TIMEOUT);
            }
        }
        Ok(())
    }

    /// Stamps every page covered by `[offset, offset+size)` with
    /// `max(lastBatchId, batch_id)`.
    pub fn mark_pages(&self, offset: u64, size: u64, batch_id: u64) {
        let mut inner = self.inner.lock();
        let start_page = (offset / self.page_size) as usize;
        let end_page = (((offset + size).div_ceil(self.page_size)) as usize).min(self.page_count);
        for i in start_page..end_page {
            inner.pages[i].last_batch_id = inner.pages[i].last_batch_id.max(batch_id);
        }
    }

    /// Monotonically advances `completedBatchId` and wakes every waiter.
    pub fn notify_batch_complete(&self, batch_id: u64) {
        let mut current = self.completed_batch_id.load(Ordering::Acquire);
        while batch_id > current {
            match self.completed_batch_id.compare_exchange_weak(
                current,
                batch_id,
                Ordering::Release,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(observed) => current = observed,
            }
        }
        self.batch_cv.notify_all();
    }

    fn allocate_temporary(&self, size: u64) -> Result<Reservation> {
        let mut temp = self.temporary_buffers.lock();

        for slot in temp.iter() {
            if slot.size >= size && slot.in_use.compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed).is_ok() {
                return Ok(Reservation {
                    offset: 0,
                    size,
                    is_temporary: true,
                    batch_id: 0,
                    temp_in_use: Some(slot.in_use.clone()),
                });
            }
        }

        if temp.len() >= self.max_temporary_buffers {
            log::warn!("ring allocator: maximum temporary staging buffers reached ({})", self.max_temporary_buffers);
            return Err(EngineError::TemporaryBufferPoolExhausted { max: self.max_temporary_buffers });
        }

        let in_use = Arc::new(AtomicBool::new(true));
        temp.push(TemporaryBufferSlot { size, in_use: in_use.clone() });
        Ok(Reservation { offset: 0, size, is_temporary: true, batch_id: 0, temp_in_use: Some(in_use) })
    }

    pub fn active_temporary_buffer_count(&self) -> usize {
        self.temporary_buffers.lock().iter().filter(|s| s.in_use.load(Ordering::Relaxed)).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc as StdArc;
    use std::thread;

    #[test]
    fn reserve_aligns_to_256_bytes() {
        let alloc = RingStagingAllocator::new(4096, 1024, 4);
        let batch = alloc.begin_batch();
        let r1 = alloc.reserve(100, batch).unwrap();
        assert_eq!(r1.offset, 0);
        alloc.mark_pages(r1.offset, r1.size, batch);
        let r2 = alloc.reserve(10, batch).unwrap();
        assert_eq!(r2.offset, 256);
    }

    #[test]
    fn oversize_request_uses_temporary_pool() {
        let alloc = RingStagingAllocator::new(4096, 1024, 4);
        let r = alloc.reserve(4096, 1).unwrap();
        assert!(r.is_temporary);
        assert_eq!(alloc.active_temporary_buffer_count(), 1);
        r.release();
        assert_eq!(alloc.active_temporary_buffer_count(), 0);
    }

    #[test]
    fn temporary_pool_exhaustion_errors() {
        let alloc = RingStagingAllocator::new(4096, 1024, 1);
        let _r1 = alloc.reserve(4096, 1).unwrap();
        let err = alloc.reserve(4096, 2);
        assert!(matches!(err, Err(EngineError::TemporaryBufferPoolExhausted { max: 1 })));
    }

    #[test]
    fn ring_buffer_overwrite_guard_waits_then_succeeds() {
        // Spec §8 concrete scenario 3.
        let alloc = StdArc::new(RingStagingAllocator::new(4096, 1024, 4));

        let r1 = alloc.reserve(1024, 1).unwrap();
        alloc.mark_pages(r1.offset, r1.size, 1);
        let r2 = alloc.reserve(1024, 2).unwrap();
        alloc.mark_pages(r2.offset, r2.size, 2);
        let r3 = alloc.reserve(1024, 3).unwrap();
        alloc.mark_pages(r3.offset, r3.size, 3);

        let waiter_alloc = alloc.clone();
        let waiter = thread::spawn(move || waiter_alloc.reserve(1024, 4).unwrap());

        thread::sleep(Duration::from_millis(30));
        alloc.notify_batch_complete(1);

        let r4 = waiter.join().unwrap();
        assert_eq!(r4.offset, 0);
    }

    #[test]
    fn wrap_around_when_tail_does_not_fit() {
        let alloc = RingStagingAllocator::new(2048, 1024, 4);
        let r1 = alloc.reserve(1536, 1).unwrap();
        assert_eq!(r1.offset, 0);
        alloc.mark_pages(r1.offset, r1.size, 1);
        alloc.notify_batch_complete(1);
        // head is now 1536; a 600-byte request would overflow capacity, wraps to 0.
        let r2 = alloc.reserve(600, 2).unwrap();
        assert_eq!(r2.offset, 0);
    }
}
