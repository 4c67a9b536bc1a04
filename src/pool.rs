//! Pool of transient, single-frame images.
//!
//! Images are handed out as [`Transient`] handles. A handle is not `Clone`
//! and [`TransientPool::release`] takes it by value, so releasing the same
//! image twice does not compile. Releasing a handle that belongs to another
//! pool (or was forged from a stale id) is reported as
//! [`Error::UnknownTransient`].

use std::sync::atomic::{AtomicU64, Ordering};

use smallvec::SmallVec;

use crate::util::{Error, Extent, Result};

/// Default cap on simultaneously outstanding images.
pub const DEFAULT_POOL_LIMIT: usize = 8;

static NEXT_POOL_ID: AtomicU64 = AtomicU64::new(1);

/// Single-owner handle to a pooled image.
#[derive(Debug)]
pub struct Transient<I> {
    pool: u64,
    id: u64,
    extent: Extent,
    image: I,
}

impl<I> Transient<I> {
    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[inline]
    pub fn image(&self) -> &I {
        &self.image
    }

    #[inline]
    pub fn image_mut(&mut self) -> &mut I {
        &mut self.image
    }
}

/// Lifetime counters of a pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Successful acquires.
    pub acquired: u64,
    /// Successful releases.
    pub released: u64,
    /// Acquires that had to create a new image.
    pub allocated: u64,
    /// Acquires served from the free list.
    pub reused: u64,
}

impl PoolStats {
    /// Every acquired image has been released.
    #[inline]
    pub fn is_balanced(&self) -> bool {
        self.acquired == self.released
    }
}

/// Free list of frame-scoped images keyed by extent.
#[derive(Debug)]
pub struct TransientPool<I> {
    pool_id: u64,
    free: Vec<(Extent, I)>,
    outstanding: SmallVec<[u64; 4]>,
    next_id: u64,
    limit: usize,
    stats: PoolStats,
}

impl<I> Default for TransientPool<I> {
    fn default() -> Self {
        Self::with_limit(DEFAULT_POOL_LIMIT)
    }
}

impl<I> TransientPool<I> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pool that refuses to hand out more than `limit` images at once.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            pool_id: NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed),
            free: Vec::new(),
            outstanding: SmallVec::new(),
            next_id: 1,
            limit,
            stats: PoolStats::default(),
        }
    }

    /// Take an image of `extent`, reusing a free one or calling `create`.
    pub fn acquire(&mut self, extent: Extent, create: impl FnOnce(Extent) -> I) -> Result<Transient<I>> {
        if self.outstanding.len() >= self.limit {
            return Err(Error::PoolExhausted { limit: self.limit });
        }

        let image = match self.free.iter().position(|(e, _)| *e == extent) {
            Some(idx) => {
                self.stats.reused += 1;
                self.free.swap_remove(idx).1
            }
            None => {
                self.stats.allocated += 1;
                tracing::debug!("Transient pool: new {} image ({} free)", extent, self.free.len());
                create(extent)
            }
        };

        let id = self.next_id;
        self.next_id += 1;
        self.outstanding.push(id);
        self.stats.acquired += 1;
        Ok(Transient { pool: self.pool_id, id, extent, image })
    }

    /// Return an image to the free list.
    ///
    /// A handle acquired from another pool is rejected and dropped; the
    /// owning pool keeps counting it as outstanding.
    pub fn release(&mut self, transient: Transient<I>) -> Result<()> {
        if transient.pool != self.pool_id {
            return Err(Error::UnknownTransient(transient.id));
        }
        let Some(pos) = self.outstanding.iter().position(|&id| id == transient.id) else {
            return Err(Error::UnknownTransient(transient.id));
        };
        self.outstanding.swap_remove(pos);
        self.stats.released += 1;
        self.free.push((transient.extent, transient.image));
        Ok(())
    }

    /// Images currently handed out.
    #[inline]
    pub fn outstanding(&self) -> usize {
        self.outstanding.len()
    }

    /// Images waiting on the free list.
    #[inline]
    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    #[inline]
    pub fn stats(&self) -> PoolStats {
        self.stats
    }

    /// Drop free images whose size differs from `keep`.
    pub fn trim(&mut self, keep: Extent) {
        let before = self.free.len();
        self.free.retain(|(e, _)| *e == keep);
        let dropped = before - self.free.len();
        if dropped > 0 {
            tracing::debug!("Transient pool: dropped {} stale images", dropped);
        }
    }

    /// Drop every free image. Outstanding handles stay valid.
    pub fn clear(&mut self) {
        self.free.clear();
    }
}

/// Transients acquired during one pipeline cycle.
///
/// Everything acquired through the scope is released when it drops, on every
/// exit path of the cycle.
pub struct FrameScope<'p, I> {
    pool: &'p mut TransientPool<I>,
    held: SmallVec<[Transient<I>; 2]>,
}

/// Index of a transient inside a [`FrameScope`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot(usize);

impl<'p, I> FrameScope<'p, I> {
    pub fn new(pool: &'p mut TransientPool<I>) -> Self {
        Self { pool, held: SmallVec::new() }
    }

    pub fn acquire(&mut self, extent: Extent, create: impl FnOnce(Extent) -> I) -> Result<Slot> {
        let transient = self.pool.acquire(extent, create)?;
        self.held.push(transient);
        Ok(Slot(self.held.len() - 1))
    }

    #[inline]
    pub fn image(&self, slot: Slot) -> &I {
        self.held[slot.0].image()
    }

    #[inline]
    pub fn image_mut(&mut self, slot: Slot) -> &mut I {
        self.held[slot.0].image_mut()
    }

    #[inline]
    pub fn held(&self) -> usize {
        self.held.len()
    }

    /// Release everything now and report the first failure.
    pub fn finish(mut self) -> Result<()> {
        self.release_all()
    }

    fn release_all(&mut self) -> Result<()> {
        let mut first_err = None;
        for transient in self.held.drain(..) {
            if let Err(e) = self.pool.release(transient) {
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}

impl<I> Drop for FrameScope<'_, I> {
    fn drop(&mut self) {
        if let Err(e) = self.release_all() {
            tracing::error!("Transient release failed: {e}");
        }
    }
}
