//! Identifiers for host items.

use serde::{Deserialize, Serialize};

/// Opaque handle to a host item. Dense indices improve cache locality;
/// the numeric value carries no meaning outside the owning scene.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct ItemId(pub u32);

/// Monotonic allocator for ItemId. Ids are never reused within a scene, so
/// a stale handle to a deleted item can be detected instead of aliasing.
#[derive(Default, Debug, Clone)]
pub struct IdAllocator {
    next: u32,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn alloc(&mut self) -> ItemId {
        let id = ItemId(self.next);
        self.next = self.next.wrapping_add(1);
        id
    }

    #[inline]
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_monotonic() {
        let mut alloc = IdAllocator::new();
        assert_eq!(alloc.alloc(), ItemId(0));
        assert_eq!(alloc.alloc(), ItemId(1));
        assert_eq!(alloc.alloc(), ItemId(2));
    }
}
