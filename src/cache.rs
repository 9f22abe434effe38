//! Decoded-source cache with single-flight acquisition.
//!
//! Decoding is the expensive part of a downscale request: a large JPEG or a
//! network fetch dwarfs the box filter itself. This module makes sure each
//! source is decoded **at most once**, even when many requests for it arrive
//! while the first decode is still running.
//!
//! # Design
//!
//! Every [`SourceKey`] maps to one entry, which is either
//!
//! ```text
//!   lookup (miss)          Reservation::resolve
//!  ───────────────► Pending ───────────────────► Ready ──(LRU)──► evicted
//!                      │
//!                      └── Reservation::fail / drop ──► removed (retry allowed)
//! ```
//!
//! - **Pending** holds the waiters of requests that arrived while the source
//!   was being acquired. They are notified once, in arrival order.
//! - **Ready** holds the decoded buffer behind an `Arc`, shared by every
//!   request that uses it.
//!
//! [`SourceCache::lookup_or_reserve`] never blocks. It returns the ready
//! buffer, a [`Subscription`] to await, or a [`Reservation`] that makes the
//! caller responsible for acquisition. A reservation that is dropped without
//! being resolved fails its waiters, so a pending entry can never be stranded.
//!
//! ## Eviction
//!
//! Without a capacity the cache keeps every decoded source for the life of
//! the process. With one, the least recently used **Ready** entries are
//! evicted once there are more of them than the capacity. Pending entries are
//! never evicted.
//!
//! ## Locking
//!
//! The entry table sits behind a `std::sync::Mutex` that is only held for
//! table updates, never across an `.await`. Waiters are `tokio::sync::oneshot`
//! channels, sent to after the lock is released.

use crate::error::CacheError;
use crate::imaging::PixelBuffer;
use crate::source::SourceKey;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::num::NonZeroUsize;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};
use tokio::sync::oneshot;
use tracing::debug;

type Delivery = Result<Arc<PixelBuffer>, CacheError>;

/// Counters for cache activity.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered by a Ready entry.
    pub hits: u32,
    /// Lookups that subscribed to a Pending entry.
    pub waits: u32,
    /// Lookups that reserved a new entry (one acquisition each).
    pub misses: u32,
    pub evictions: u32,
}

impl CacheStats {
    pub fn total(&self) -> u32 {
        self.hits + self.waits + self.misses
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.hits > 0 || self.waits > 0 {
            write!(
                f,
                "{} cached, {} shared, {} decoded ({} total)",
                self.hits,
                self.waits,
                self.misses,
                self.total()
            )?;
        } else {
            write!(f, "{} decoded", self.misses)?;
        }
        if self.evictions > 0 {
            write!(f, ", {} evicted", self.evictions)?;
        }
        Ok(())
    }
}

enum Entry {
    Pending {
        waiters: Vec<oneshot::Sender<Delivery>>,
    },
    Ready {
        buffer: Arc<PixelBuffer>,
        last_used: u64,
    },
}

#[derive(Default)]
struct Table {
    entries: HashMap<SourceKey, Entry>,
    stats: CacheStats,
    /// Monotonic use counter for LRU ordering.
    tick: u64,
}

impl Table {
    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    fn ready_count(&self) -> usize {
        self.entries
            .values()
            .filter(|e| matches!(e, Entry::Ready { .. }))
            .count()
    }

    /// Evict least recently used Ready entries until at most `capacity` remain.
    fn evict_over(&mut self, capacity: usize) {
        while self.ready_count() > capacity {
            let oldest = self
                .entries
                .iter()
                .filter_map(|(key, entry)| match entry {
                    Entry::Ready { last_used, .. } => Some((*last_used, key)),
                    Entry::Pending { .. } => None,
                })
                .min_by_key(|(last_used, _)| *last_used)
                .map(|(_, key)| key.clone());
            let Some(key) = oldest else { break };
            self.entries.remove(&key);
            self.stats.evictions += 1;
            debug!(%key, "evicted decoded source");
        }
    }
}

struct Shared {
    table: Mutex<Table>,
    capacity: Option<NonZeroUsize>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Table> {
        // Every critical section leaves the table consistent, so a panic
        // elsewhere cannot have corrupted it.
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Outcome of [`SourceCache::lookup_or_reserve`].
pub enum Lookup {
    /// Decoded and cached.
    Ready(Arc<PixelBuffer>),
    /// Another request is acquiring the source; await the subscription.
    Pending(Subscription),
    /// Nothing cached: the caller must acquire the source and resolve or fail
    /// the reservation.
    Reserved(Reservation),
}

impl fmt::Debug for Lookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready(buffer) => write!(f, "Ready({}x{})", buffer.width(), buffer.height()),
            Self::Pending(_) => write!(f, "Pending"),
            Self::Reserved(r) => write!(f, "Reserved({})", r.key),
        }
    }
}

/// Single-flight store of decoded sources.
///
/// Cloning is cheap and yields a handle to the same table.
#[derive(Clone)]
pub struct SourceCache {
    shared: Arc<Shared>,
}

impl SourceCache {
    /// Cache that never evicts.
    pub fn new() -> Self {
        Self::with_capacity(None)
    }

    /// Cache keeping at most `capacity` decoded sources (`None` = unbounded).
    pub fn with_capacity(capacity: Option<NonZeroUsize>) -> Self {
        Self {
            shared: Arc::new(Shared {
                table: Mutex::new(Table::default()),
                capacity,
            }),
        }
    }

    pub fn capacity(&self) -> Option<NonZeroUsize> {
        self.shared.capacity
    }

    /// Look up `key`, subscribing to or reserving its entry when it is not Ready.
    pub fn lookup_or_reserve(&self, key: &SourceKey) -> Lookup {
        let mut guard = self.shared.lock();
        let table = &mut *guard;
        let tick = table.next_tick();

        match table.entries.get_mut(key) {
            Some(Entry::Ready { buffer, last_used }) => {
                *last_used = tick;
                let buffer = Arc::clone(buffer);
                table.stats.hits += 1;
                debug!(%key, "cache hit");
                Lookup::Ready(buffer)
            }
            Some(Entry::Pending { waiters }) => {
                let (tx, rx) = oneshot::channel();
                waiters.push(tx);
                table.stats.waits += 1;
                debug!(%key, "joined pending acquisition");
                Lookup::Pending(Subscription { rx })
            }
            None => {
                table.entries.insert(
                    key.clone(),
                    Entry::Pending {
                        waiters: Vec::new(),
                    },
                );
                table.stats.misses += 1;
                debug!(%key, "cache miss, reserved");
                Lookup::Reserved(Reservation {
                    shared: Arc::clone(&self.shared),
                    key: key.clone(),
                    settled: false,
                })
            }
        }
    }

    /// Whether an entry (Pending or Ready) exists for `key`.
    pub fn contains(&self, key: &SourceKey) -> bool {
        self.shared.lock().entries.contains_key(key)
    }

    /// Whether `key` is decoded and cached.
    pub fn is_ready(&self, key: &SourceKey) -> bool {
        matches!(
            self.shared.lock().entries.get(key),
            Some(Entry::Ready { .. })
        )
    }

    /// Number of entries, Pending and Ready.
    pub fn len(&self) -> usize {
        self.shared.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        self.shared.lock().stats
    }

    /// Drop every Ready entry. Pending entries and their waiters are untouched.
    pub fn clear_ready(&self) -> usize {
        let mut table = self.shared.lock();
        let before = table.entries.len();
        table
            .entries
            .retain(|_, entry| matches!(entry, Entry::Pending { .. }));
        before - table.entries.len()
    }
}

impl Default for SourceCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Exclusive right (and duty) to acquire one source.
///
/// Must be settled with [`resolve`](Self::resolve) or [`fail`](Self::fail);
/// dropping it unsettled fails every waiter.
pub struct Reservation {
    shared: Arc<Shared>,
    key: SourceKey,
    settled: bool,
}

impl Reservation {
    pub fn key(&self) -> &SourceKey {
        &self.key
    }

    /// Register a waiter on this reservation's own entry.
    ///
    /// The request that reserved an entry uses this to receive the result the
    /// same way every other waiter does.
    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = oneshot::channel();
        let mut table = self.shared.lock();
        match table.entries.get_mut(&self.key) {
            Some(Entry::Pending { waiters }) => waiters.push(tx),
            _ => debug_assert!(false, "reserved entry {} is not pending", self.key),
        }
        Subscription { rx }
    }

    /// Store the decoded buffer and notify every waiter in arrival order.
    pub fn resolve(mut self, buffer: PixelBuffer) -> Arc<PixelBuffer> {
        self.settled = true;
        let buffer = Arc::new(buffer);

        let waiters = {
            let mut table = self.shared.lock();
            let tick = table.next_tick();
            let previous = table.entries.insert(
                self.key.clone(),
                Entry::Ready {
                    buffer: Arc::clone(&buffer),
                    last_used: tick,
                },
            );
            if let Some(capacity) = self.shared.capacity {
                table.evict_over(capacity.get());
            }
            match previous {
                Some(Entry::Pending { waiters }) => waiters,
                _ => Vec::new(),
            }
        };

        debug!(key = %self.key, waiters = waiters.len(), "source ready");
        for waiter in waiters {
            // A closed channel means that waiter was dropped.
            let _ = waiter.send(Ok(Arc::clone(&buffer)));
        }
        buffer
    }

    /// Remove the entry and reject every waiter with `reason`.
    pub fn fail(mut self, reason: impl Into<String>) {
        self.settled = true;
        self.reject(reason.into());
    }

    fn reject(&self, reason: String) {
        let waiters = match self.shared.lock().entries.remove(&self.key) {
            Some(Entry::Pending { waiters }) => waiters,
            _ => Vec::new(),
        };

        debug!(key = %self.key, waiters = waiters.len(), %reason, "acquisition failed");
        let error = CacheError::AcquisitionFailed(reason);
        for waiter in waiters {
            let _ = waiter.send(Err(error.clone()));
        }
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        if !self.settled {
            self.reject(format!("acquisition of {} was abandoned", self.key));
        }
    }
}

impl fmt::Debug for Reservation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reservation").field("key", &self.key).finish()
    }
}

/// Pending result of another request's acquisition.
///
/// Dropping it detaches this waiter only.
#[derive(Debug)]
pub struct Subscription {
    rx: oneshot::Receiver<Delivery>,
}

impl Future for Subscription {
    type Output = Result<Arc<PixelBuffer>, CacheError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx).poll(cx).map(|delivery| {
            delivery.unwrap_or_else(|_| {
                Err(CacheError::AcquisitionFailed(
                    "cache entry was dropped".to_string(),
                ))
            })
        })
    }
}
