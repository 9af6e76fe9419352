//! Generation-stamped visited set for graph traversal.
//!
//! A `HashSet<u32>` per search would allocate on every query. Instead each
//! node gets one byte stamped with the current generation; `clear` bumps
//! the generation and only memsets once every 255 clears when the counter
//! wraps.

pub struct VisitedSet {
    stamps: Vec<u8>,
    generation: u8,
}

impl VisitedSet {
    pub fn new(capacity: usize) -> Self {
        Self {
            stamps: vec![0u8; capacity],
            generation: 1,
        }
    }

    pub fn clear(&mut self) {
        if self.generation == u8::MAX {
            self.stamps.fill(0);
            self.generation = 1;
        } else {
            self.generation += 1;
        }
    }

    pub fn ensure_capacity(&mut self, cap: usize) {
        if cap > self.stamps.len() {
            self.stamps.resize(cap, 0);
        }
    }

    /// Marks `id` visited. Returns `true` when it was not yet visited.
    #[inline]
    pub fn insert(&mut self, id: u32) -> bool {
        let slot = &mut self.stamps[id as usize];
        if *slot == self.generation {
            false
        } else {
            *slot = self.generation;
            true
        }
    }
}
