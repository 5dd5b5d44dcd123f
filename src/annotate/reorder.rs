use std::collections::BTreeMap;

/// Restores sequence order for items that complete out of order.
///
/// Items are pushed with the sequence number they were issued under and
/// popped strictly in sequence, starting from zero. The buffer only ever
/// holds items that arrived ahead of a gap, so its size is bounded by the
/// number of items in flight.
#[derive(Debug)]
pub struct ReorderBuffer<T> {
    next: u64,
    pending: BTreeMap<u64, T>,
}

impl<T> Default for ReorderBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ReorderBuffer<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            next: 0,
            pending: BTreeMap::new(),
        }
    }

    /// Hold an item until every earlier sequence number has been popped.
    /// Sequence numbers already popped are ignored.
    pub fn push(&mut self, sequence: u64, item: T) {
        if sequence >= self.next {
            self.pending.insert(sequence, item);
        }
    }

    /// Next item in sequence, if it has arrived
    pub fn pop_ready(&mut self) -> Option<T> {
        let item = self.pending.remove(&self.next)?;
        self.next += 1;
        Some(item)
    }

    /// Sequence number the buffer is waiting for
    #[must_use]
    pub fn next_sequence(&self) -> u64 {
        self.next
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
