//! Free lists reusing the allocations of the logging hot path.
//!
//! Values are reset when they are returned, so an acquired value always starts out empty
//! while keeping the capacity it grew to. A value whose retained capacity exceeds the pool's
//! high-water mark is dropped instead of being pooled, so a single outsized message cannot
//! keep a large allocation alive for every later caller.

use std::{
    fmt,
    ops::{Deref, DerefMut},
};

use parking_lot::Mutex;

/// A value that can be cleared and reused.
pub(crate) trait Recycle: Default {
    /// Clears the value, keeping its allocations.
    fn reset(&mut self);

    /// Number of bytes kept alive by the value's buffers.
    fn retained_bytes(&self) -> usize;
}

impl Recycle for Vec<u8> {
    fn reset(&mut self) {
        self.clear();
    }

    fn retained_bytes(&self) -> usize {
        self.capacity()
    }
}

/// A bounded free list.
///
/// The lock only guards the list itself and is held for a push or a pop. A miss allocates a
/// fresh value, so acquiring never waits for a value to be released.
pub(crate) struct Pool<T> {
    free: Mutex<Vec<Box<T>>>,
    max_idle: usize,
    high_water: usize,
}

impl<T: Recycle> Pool<T> {
    /// Creates a pool keeping at most `max_idle` values, each retaining at most `high_water`
    /// bytes.
    pub(crate) fn new(max_idle: usize, high_water: usize) -> Self {
        Self {
            free: Mutex::new(Vec::with_capacity(max_idle)),
            max_idle,
            high_water,
        }
    }

    /// Takes a value out of the pool, allocating one if the pool is empty.
    pub(crate) fn acquire(&self) -> Pooled<'_, T> {
        let value = self.free.lock().pop().unwrap_or_default();
        Pooled {
            pool: self,
            value: Some(value),
        }
    }

    fn release(&self, mut value: Box<T>) {
        value.reset();
        if value.retained_bytes() > self.high_water {
            return;
        }

        let mut free = self.free.lock();
        if free.len() < self.max_idle {
            free.push(value);
        }
    }

    /// Number of values currently waiting in the pool.
    #[cfg(test)]
    pub(crate) fn idle(&self) -> usize {
        self.free.lock().len()
    }
}

impl<T> fmt::Debug for Pool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("idle", &self.free.lock().len())
            .field("max_idle", &self.max_idle)
            .field("high_water", &self.high_water)
            .finish()
    }
}

/// A value borrowed from a [`Pool`], returned to it when dropped.
///
/// Returning happens in `Drop`, so the value goes back to the pool on every exit path,
/// unwinding included.
pub(crate) struct Pooled<'p, T: Recycle> {
    pool: &'p Pool<T>,
    value: Option<Box<T>>,
}

impl<T: Recycle> Deref for Pooled<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        #[allow(clippy::expect_used)]
        self.value
            .as_deref()
            .expect("pooled value is only taken out in `drop()`")
    }
}

impl<T: Recycle> DerefMut for Pooled<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        #[allow(clippy::expect_used)]
        self.value
            .as_deref_mut()
            .expect("pooled value is only taken out in `drop()`")
    }
}

impl<T: Recycle> Drop for Pooled<'_, T> {
    fn drop(&mut self) {
        if let Some(value) = self.value.take() {
            self.pool.release(value);
        }
    }
}

impl<T: Recycle + fmt::Debug> fmt::Debug for Pooled<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.value, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn released_values_are_reset_and_keep_their_capacity() {
        let pool = Pool::<Vec<u8>>::new(4, 1024);
        {
            let mut buffer = pool.acquire();
            buffer.extend_from_slice(b"first use of the buffer");
        }
        assert_eq!(pool.idle(), 1);

        let buffer = pool.acquire();
        assert!(buffer.is_empty());
        assert!(buffer.capacity() >= b"first use of the buffer".len());
        assert_eq!(pool.idle(), 0);
    }

    #[test]
    fn values_above_the_high_water_mark_are_dropped() {
        let pool = Pool::<Vec<u8>>::new(4, 64);
        {
            let mut buffer = pool.acquire();
            buffer.resize(4096, b'x');
        }
        assert_eq!(pool.idle(), 0);
    }

    #[test]
    fn idle_values_are_bounded() {
        let pool = Pool::<Vec<u8>>::new(2, 1024);
        let values: Vec<_> = (0..5).map(|_| pool.acquire()).collect();
        drop(values);
        assert_eq!(pool.idle(), 2);
    }

    #[test]
    fn values_are_released_while_unwinding() {
        let pool = Pool::<Vec<u8>>::new(4, 1024);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let mut buffer = pool.acquire();
            buffer.push(1);
            panic!("boom");
        }));
        assert!(result.is_err());
        assert_eq!(pool.idle(), 1);
    }

    #[test]
    fn concurrent_acquire_and_release() {
        let pool = Pool::<Vec<u8>>::new(16, 1024);
        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    for i in 0..500_u32 {
                        let mut buffer = pool.acquire();
                        assert!(buffer.is_empty());
                        buffer.extend_from_slice(&i.to_le_bytes());
                    }
                });
            }
        });
        assert!(pool.idle() <= 16);
    }
}
