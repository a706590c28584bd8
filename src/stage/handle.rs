//! Prim id allocation.

use std::collections::BTreeSet;

/// Hands out non-zero `u64` ids.
///
/// Fresh ids increase monotonically from 1. Released ids go to a free set
/// and are reused lowest first, so an id is never live twice.
#[derive(Clone, Debug)]
pub struct HandleAllocator {
    next: u64,
    free: BTreeSet<u64>,
}

impl Default for HandleAllocator {
    fn default() -> Self {
        Self {
            next: 1,
            free: BTreeSet::new(),
        }
    }
}

impl HandleAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self) -> u64 {
        if let Some(id) = self.free.pop_first() {
            return id;
        }
        let id = self.next;
        self.next += 1;
        id
    }

    /// Return `id` to the pool. `false` if it was never handed out or is
    /// already free.
    pub fn release(&mut self, id: u64) -> bool {
        if id == 0 || id >= self.next {
            return false;
        }
        self.free.insert(id)
    }

    pub fn is_live(&self, id: u64) -> bool {
        id != 0 && id < self.next && !self.free.contains(&id)
    }

    /// Number of ids currently handed out.
    pub fn live_count(&self) -> usize {
        (self.next - 1) as usize - self.free.len()
    }
}
