//! Reservoir shuffle
//!
//! Bounded-memory approximate randomization. The buffer fills to capacity;
//! after that every incoming item evicts one buffered item chosen uniformly
//! at random. Displacement is bounded by the capacity, so this is not a
//! uniform permutation of the whole stream.

use crate::domain::Item;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

/// Default reservoir size
pub const DEFAULT_SHUFFLE_CAPACITY: usize = 5000;

pub struct ShuffleBuffer<R: Rng = StdRng> {
    reservoir: Vec<Item>,
    capacity: usize,
    enabled: bool,
    rng: R,
}

impl ShuffleBuffer<StdRng> {
    /// Create a buffer seeded from the OS
    pub fn new(capacity: usize, enabled: bool) -> Self {
        Self::with_rng(capacity, enabled, StdRng::from_entropy())
    }
}

impl<R: Rng> ShuffleBuffer<R> {
    pub fn with_rng(capacity: usize, enabled: bool, rng: R) -> Self {
        let capacity = capacity.max(1);
        Self {
            reservoir: Vec::with_capacity(if enabled { capacity } else { 0 }),
            capacity,
            enabled,
            rng,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Items currently held back
    pub fn len(&self) -> usize {
        self.reservoir.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reservoir.is_empty()
    }

    /// Offer an item; returns the item to emit now, if any
    ///
    /// Disabled buffers hand every item straight back.
    pub fn push(&mut self, item: Item) -> Option<Item> {
        if !self.enabled {
            return Some(item);
        }
        if self.reservoir.len() < self.capacity {
            self.reservoir.push(item);
            return None;
        }
        let index = self.rng.gen_range(0..self.reservoir.len());
        Some(std::mem::replace(&mut self.reservoir[index], item))
    }

    /// Drain the reservoir in random order at end of stream
    pub fn finish(&mut self) -> Vec<Item> {
        let mut rest = std::mem::take(&mut self.reservoir);
        rest.shuffle(&mut self.rng);
        rest
    }
}
