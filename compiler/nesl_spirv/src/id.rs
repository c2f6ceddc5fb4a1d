//! Result identifiers and their per-run allocator.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

/// A SPIR-V result id. Never zero for a real entity.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[repr(transparent)]
pub struct SpirVId(u32);

impl SpirVId {
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    #[cfg(test)]
    pub(crate) const fn from_raw(raw: u32) -> Self {
        SpirVId(raw)
    }
}

impl fmt::Debug for SpirVId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

/// Issues strictly increasing ids, starting at 1, for one compilation run.
#[derive(Default)]
pub(crate) struct IdAllocator {
    last: AtomicU32,
}

impl IdAllocator {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub(crate) fn next(&self) -> SpirVId {
        SpirVId(self.last.fetch_add(1, Ordering::Relaxed) + 1)
    }

    /// One past the highest id issued so far.
    pub(crate) fn bound(&self) -> u32 {
        self.last.load(Ordering::Relaxed) + 1
    }
}
