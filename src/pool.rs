//! Free-list object pools for samples and series buffers
//!
//! Ownership is explicit: `acquire` hands out an owned value and `release`
//! takes it back by value, so an object can only be returned once every
//! borrow of it has ended.

use parking_lot::Mutex;

/// Objects that can be cleared for reuse
pub trait Recycle: Default {
    /// Drop all contents but keep allocations
    fn reset(&mut self);
}

/// Bounded free list of reusable objects
pub struct ObjectPool<T: Recycle> {
    free: Mutex<Vec<T>>,
    max_idle: usize,
}

impl<T: Recycle> ObjectPool<T> {
    /// Create a pool that keeps at most `max_idle` released objects
    pub fn new(max_idle: usize) -> Self {
        Self {
            free: Mutex::new(Vec::with_capacity(max_idle.min(1024))),
            max_idle,
        }
    }

    /// Take an object from the free list, or build a fresh one
    pub fn acquire(&self) -> T {
        self.free.lock().pop().unwrap_or_default()
    }

    /// Reset an object and return it to the free list
    pub fn release(&self, mut item: T) {
        item.reset();
        let mut free = self.free.lock();
        if free.len() < self.max_idle {
            free.push(item);
        }
    }

    /// Number of idle objects currently held
    pub fn idle(&self) -> usize {
        self.free.lock().len()
    }

    pub fn max_idle(&self) -> usize {
        self.max_idle
    }
}

impl<T: Recycle> Default for ObjectPool<T> {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Sample, SparseSeries};
    use std::sync::Arc;

    #[test]
    fn test_release_resets_and_reuses() {
        let pool: ObjectPool<Sample> = ObjectPool::new(4);

        let mut sample = pool.acquire();
        sample.fill("servers.web1.cpu", 1.5, 100);
        pool.release(sample);
        assert_eq!(pool.idle(), 1);

        let reused = pool.acquire();
        assert_eq!(reused, Sample::default());
        assert_eq!(pool.idle(), 0);
    }

    #[test]
    fn test_idle_bound() {
        let pool: ObjectPool<SparseSeries> = ObjectPool::new(2);
        for _ in 0..5 {
            pool.release(SparseSeries::with_len(8));
        }
        assert_eq!(pool.idle(), 2);
    }

    #[test]
    fn test_concurrent_acquire_release() {
        let pool: Arc<ObjectPool<Sample>> = Arc::new(ObjectPool::new(64));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let pool = Arc::clone(&pool);
                std::thread::spawn(move || {
                    for j in 0..100 {
                        let mut sample = pool.acquire();
                        assert!(sample.path.is_empty());
                        sample.fill("a.b", i as f64, j);
                        pool.release(sample);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert!(pool.idle() <= 64);
    }
}
