//! Reusable byte buffers for staging upload bodies.
//!
//! # Design
//! `BufferPool` is a mutex-guarded free-list. `acquire` pops a buffer (or
//! allocates one) and wraps it in a `PooledBuffer` guard that owns it
//! exclusively; dropping the guard clears the buffer and pushes it back, so
//! every exit path releases. The lock is held only for the push or pop.
//!
//! A buffer hands out `BufferReader`s: single-pass cursors over its current
//! content that borrow it, so it cannot be written or released while a read
//! is in flight.

use std::io::{self, Read, Write};
use std::ops::{Deref, DerefMut};
use std::sync::{Mutex, PoisonError};

use tracing::trace;

/// A growable byte buffer.
#[derive(Debug, Default)]
pub struct Buffer {
    bytes: Vec<u8>,
}

impl Buffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.bytes.capacity()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    pub fn extend_from_slice(&mut self, data: &[u8]) {
        self.bytes.extend_from_slice(data);
    }

    /// Empty the buffer, keeping its allocation.
    pub fn reset(&mut self) {
        self.bytes.clear();
    }

    /// A fresh cursor over the current content, starting at byte zero.
    pub fn reader(&self) -> BufferReader<'_> {
        BufferReader {
            bytes: &self.bytes,
            offset: 0,
        }
    }
}

impl Write for Buffer {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.bytes.extend_from_slice(data);
        Ok(data.len())
    }

    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        self.bytes.extend_from_slice(data);
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Sequential reader over a `Buffer`. Returns `Ok(0)` once exhausted.
#[derive(Debug)]
pub struct BufferReader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl Read for BufferReader<'_> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        let rest = &self.bytes[self.offset..];
        let n = rest.len().min(out.len());
        out[..n].copy_from_slice(&rest[..n]);
        self.offset += n;
        Ok(n)
    }
}

/// Shared free-list of `Buffer`s.
#[derive(Debug)]
pub struct BufferPool {
    free: Mutex<Vec<Buffer>>,
    max_idle: usize,
    max_retained_capacity: usize,
}

impl BufferPool {
    pub const DEFAULT_MAX_IDLE: usize = 8;
    pub const DEFAULT_MAX_RETAINED_CAPACITY: usize = 16 << 20;

    pub fn new() -> Self {
        Self::with_limits(Self::DEFAULT_MAX_IDLE, Self::DEFAULT_MAX_RETAINED_CAPACITY)
    }

    /// At most `max_idle` buffers are kept; buffers that grew beyond
    /// `max_retained_capacity` are freed on release instead of kept.
    pub fn with_limits(max_idle: usize, max_retained_capacity: usize) -> Self {
        Self {
            free: Mutex::new(Vec::new()),
            max_idle,
            max_retained_capacity,
        }
    }

    /// Take an empty buffer. It goes back to the pool when the guard drops.
    pub fn acquire(&self) -> PooledBuffer<'_> {
        let reused = self.lock().pop();
        let buffer = match reused {
            Some(buffer) => {
                trace!(capacity = buffer.capacity(), "reusing pooled buffer");
                buffer
            }
            None => Buffer::new(),
        };
        PooledBuffer { pool: self, buffer }
    }

    /// Return a buffer now rather than at the end of its scope.
    pub fn release(&self, buffer: PooledBuffer<'_>) {
        debug_assert!(std::ptr::eq(buffer.pool, self), "buffer released to a foreign pool");
        drop(buffer);
    }

    /// Number of buffers waiting on the free-list.
    pub fn idle(&self) -> usize {
        self.lock().len()
    }

    fn put(&self, mut buffer: Buffer) {
        if buffer.capacity() > self.max_retained_capacity {
            trace!(capacity = buffer.capacity(), "dropping oversized buffer");
            return;
        }
        buffer.reset();
        let mut free = self.lock();
        if free.len() < self.max_idle {
            free.push(buffer);
        }
    }

    // A panic while holding the lock cannot leave the Vec half-updated.
    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Buffer>> {
        self.free.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new()
    }
}

/// Exclusive handle on a pooled `Buffer`.
#[derive(Debug)]
pub struct PooledBuffer<'a> {
    pool: &'a BufferPool,
    buffer: Buffer,
}

impl Deref for PooledBuffer<'_> {
    type Target = Buffer;

    fn deref(&self) -> &Buffer {
        &self.buffer
    }
}

impl DerefMut for PooledBuffer<'_> {
    fn deref_mut(&mut self) -> &mut Buffer {
        &mut self.buffer
    }
}

impl Drop for PooledBuffer<'_> {
    fn drop(&mut self) {
        // An empty Vec does not allocate.
        let buffer = std::mem::take(&mut self.buffer);
        self.pool.put(buffer);
    }
}
