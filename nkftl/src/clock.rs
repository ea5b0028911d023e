//! A monotonic counter ticked on every external write, used to order log
//! blocks by recency for GC victim selection; see DESIGN.md for why reads
//! and discards don't advance it.

use std::cell::Cell;

#[derive(Debug, Default)]
pub struct Clock {
    ticks: Cell<u64>,
}

impl Clock {
    pub fn new() -> Self {
        Clock {
            ticks: Cell::new(0),
        }
    }

    /// Advance the clock by one write and return the new value.
    pub fn tick(&self) -> u64 {
        let next = self.ticks.get() + 1;
        self.ticks.set(next);
        next
    }
}
