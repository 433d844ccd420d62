//! FIFO queue with deferred stable sorting.
//!
//! Requests accumulate in arrival order and are only reordered when the
//! owner explicitly asks for a sort. Pushing after a sort marks the queue
//! unsorted again, so callers can tell whether the front element is
//! currently the highest-priority one.

use std::cmp::Ordering;
use std::collections::VecDeque;

/// First-in-first-out queue whose contents can be stably re-sorted on
/// demand.
#[derive(Debug, Clone)]
pub struct SortableQueue<T> {
    items: VecDeque<T>,
    sorted: bool,
}

impl<T> SortableQueue<T> {
    /// Creates an empty queue. A queue with nothing in it counts as
    /// sorted.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            items: VecDeque::new(),
            sorted: true,
        }
    }

    /// Appends an element at the back and clears the sorted flag.
    pub fn push(&mut self, item: T) {
        self.items.push_back(item);
        self.sorted = false;
    }

    /// Removes and returns the front element, if any.
    pub fn pop(&mut self) -> Option<T> {
        self.items.pop_front()
    }

    /// Returns a reference to the front element without removing it.
    #[must_use]
    pub fn peek(&self) -> Option<&T> {
        self.items.front()
    }

    /// Number of queued elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the queue holds no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Whether the contents are known to be in sorted order.
    #[must_use]
    pub const fn is_sorted(&self) -> bool {
        self.sorted
    }

    /// Drops every queued element.
    pub fn clear(&mut self) {
        self.items.clear();
        self.sorted = true;
    }

    /// Iterates over the queued elements in front-to-back order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    /// Stably sorts the contents with the given comparator and marks the
    /// queue sorted. Elements that compare equal keep their arrival
    /// order.
    pub fn sort_by<F>(&mut self, mut compare: F)
    where
        F: FnMut(&T, &T) -> Ordering,
    {
        let mut items: Vec<T> = self.items.drain(..).collect();
        items.sort_by(&mut compare);
        self.items.extend(items);
        self.sorted = true;
    }
}

impl<T> Default for SortableQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
