//! Bounded slot table handing out ref-counted frame handles.

use log::{error, warn};
use parking_lot::Mutex;

use crate::{Frame, FrameHandle, FrameHeaders, FrameInit, HeaderKind, PoolError, PoolResult};

/// Default cap on the number of slots a pool will grow to.
pub const DEFAULT_MAX_FRAMES: usize = 10;

struct Slot {
    handle: FrameHandle,
    frame: Frame,
    refcount: i32,
    free: bool,
}

struct PoolInner {
    slots: Vec<Slot>,
    cap: usize,
    next_handle: i64,
}

impl PoolInner {
    fn slot_mut(&mut self, handle: FrameHandle) -> Option<&mut Slot> {
        if !handle.is_valid() {
            return None;
        }
        self.slots
            .iter_mut()
            .find(|slot| !slot.free && slot.handle == handle)
    }

    fn acquire(&mut self, headers: FrameHeaders) -> PoolResult<FrameHandle> {
        let handle = FrameHandle::from_raw(self.next_handle);
        // First-fit scan in insertion order; reuse keeps the slot's buffer
        // allocation in place.
        if let Some(slot) = self.slots.iter_mut().find(|slot| slot.free) {
            slot.handle = handle;
            slot.frame.reset(headers);
            slot.refcount = 1;
            slot.free = false;
        } else if self.slots.len() < self.cap {
            self.slots.push(Slot {
                handle,
                frame: Frame::create(headers),
                refcount: 1,
                free: false,
            });
        } else {
            return Err(PoolError::Exhausted { cap: self.cap });
        }
        self.next_handle += 1;
        Ok(handle)
    }
}

/// Bounded pool of reference-counted media frames.
///
/// All slot-table operations run under one mutex; the critical section
/// covers bookkeeping only, never transport I/O. Buffer access goes through
/// [`FramePool::with_frame`] so no borrow outlives the lock.
pub struct FramePool {
    inner: Mutex<PoolInner>,
}

impl FramePool {
    /// Creates a pool with the default slot cap.
    pub fn new() -> Self {
        Self::with_cap(DEFAULT_MAX_FRAMES)
    }

    /// Creates a pool capped at `cap` slots.
    pub fn with_cap(cap: usize) -> Self {
        FramePool {
            inner: Mutex::new(PoolInner {
                slots: Vec::new(),
                cap,
                next_handle: 0,
            }),
        }
    }

    /// Acquires a frame with empty headers; ref count starts at one.
    ///
    /// Reuses the first free slot in insertion order, grows the table up to
    /// the cap otherwise, and fails with [`PoolError::Exhausted`] beyond it.
    pub fn acquire(&self) -> PoolResult<FrameHandle> {
        let result = self.inner.lock().acquire(FrameHeaders::default());
        if let Err(err) = &result {
            error!("frame acquire failed: {err}");
        }
        result
    }

    /// Validates `init`, then acquires a frame populated from it.
    ///
    /// The buffer is sized to the resolved media size. Validation failures
    /// leave the pool untouched.
    pub fn acquire_with_init(&self, init: &FrameInit) -> PoolResult<FrameHandle> {
        let headers = match init.resolve() {
            Ok(headers) => headers,
            Err(err) => {
                error!("frame init rejected: {err}");
                return Err(err);
            }
        };
        let result = self.inner.lock().acquire(headers);
        if let Err(err) = &result {
            error!("frame acquire failed: {err}");
        }
        result
    }

    /// Increments the ref count; returns the new count, or `-1` when the
    /// handle is unknown.
    pub fn addref(&self, handle: FrameHandle) -> i32 {
        let mut inner = self.inner.lock();
        match inner.slot_mut(handle) {
            Some(slot) => {
                slot.refcount += 1;
                slot.refcount
            }
            None => {
                error!("addref on unknown frame handle {handle}");
                -1
            }
        }
    }

    /// Decrements the ref count; at zero the slot is marked free and its
    /// handle cleared. Returns the new count, or `-1` when the handle is
    /// unknown. A negative result is a caller logic error: it is logged and
    /// the slot is left untouched.
    pub fn release(&self, handle: FrameHandle) -> i32 {
        let mut inner = self.inner.lock();
        let Some(slot) = inner.slot_mut(handle) else {
            error!("release on unknown frame handle {handle}");
            return -1;
        };
        let next = slot.refcount - 1;
        if next > 0 {
            slot.refcount = next;
        } else if next == 0 {
            slot.refcount = 0;
            slot.free = true;
            slot.handle = FrameHandle::INVALID;
        } else {
            warn!("release below zero (refcount={next}) for frame [{handle}]");
        }
        next
    }

    /// Runs `f` against the frame named by `handle` under the pool mutex.
    ///
    /// Returns `None` when the handle is unknown. Keep the closure to frame
    /// access only; callbacks and transport I/O belong outside the lock.
    pub fn with_frame<R>(&self, handle: FrameHandle, f: impl FnOnce(&mut Frame) -> R) -> Option<R> {
        let mut inner = self.inner.lock();
        inner.slot_mut(handle).map(|slot| f(&mut slot.frame))
    }

    /// Payload size of a live frame.
    pub fn media_size(&self, handle: FrameHandle) -> Option<u64> {
        self.with_frame(handle, |frame| frame.media_size())
    }

    /// Reads one header field of a live frame.
    pub fn header(&self, handle: FrameHandle, kind: HeaderKind) -> Option<i64> {
        self.with_frame(handle, |frame| frame.get_header(kind)).flatten()
    }

    /// Stores one header field of a live frame.
    pub fn set_header(&self, handle: FrameHandle, kind: HeaderKind, value: i64) -> PoolResult<()> {
        match self.with_frame(handle, |frame| frame.set_header(kind, value)) {
            Some(result) => result,
            None => {
                error!("set_header on unknown frame handle {handle}");
                Err(PoolError::NotFound(handle))
            }
        }
    }

    /// Number of slots currently in the list, free or live.
    pub fn slot_count(&self) -> usize {
        self.inner.lock().slots.len()
    }

    /// Number of live (non-free) slots.
    pub fn live_count(&self) -> usize {
        self.inner.lock().slots.iter().filter(|s| !s.free).count()
    }

    /// Configured slot cap.
    pub fn cap(&self) -> usize {
        self.inner.lock().cap
    }

    /// Adjusts the slot cap. Shrinking below the current slot count only
    /// prevents further growth; existing slots stay in the list.
    pub fn set_cap(&self, cap: usize) {
        self.inner.lock().cap = cap;
    }
}

impl Default for FramePool {
    fn default() -> Self {
        Self::new()
    }
}
