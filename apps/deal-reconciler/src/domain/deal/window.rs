//! Rolling window of recent live deals.

use std::collections::VecDeque;

use super::DealRecord;

/// Default number of deals kept per account.
pub const STREAM_WINDOW_CAPACITY: usize = 50;

/// Capacity-bounded, newest-first sequence of deals for one account.
#[derive(Debug, Clone)]
pub struct StreamWindow {
    capacity: usize,
    deals: VecDeque<DealRecord>,
}

impl Default for StreamWindow {
    fn default() -> Self {
        Self::new(STREAM_WINDOW_CAPACITY)
    }
}

impl StreamWindow {
    /// Create an empty window.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            deals: VecDeque::with_capacity(capacity),
        }
    }

    /// Prepend a batch, keeping its internal order, then evict the oldest
    /// deals beyond capacity.
    pub fn push_batch(&mut self, batch: Vec<DealRecord>) {
        for deal in batch.into_iter().rev() {
            self.deals.push_front(deal);
        }
        self.deals.truncate(self.capacity);
    }

    /// Copy of the current contents, newest first.
    #[must_use]
    pub fn snapshot(&self) -> Vec<DealRecord> {
        self.deals.iter().cloned().collect()
    }

    /// Iterate newest first.
    pub fn iter(&self) -> impl Iterator<Item = &DealRecord> {
        self.deals.iter()
    }

    /// Number of deals held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.deals.len()
    }

    /// Whether the window is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.deals.is_empty()
    }

    /// Maximum number of deals held.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop everything.
    pub fn clear(&mut self) {
        self.deals.clear();
    }
}
