//! The bounded outbound FIFO.
//!
//! `push` never blocks: on overflow the oldest element is dropped (and
//! returned so the caller can log it) before the new one is enqueued.
//! Thread safety is the daemon's concern; this is plain state.

use crate::editor_state::EditorState;
use std::collections::VecDeque;

pub struct SendQueue {
    capacity: usize,
    items: VecDeque<EditorState>,
}

impl SendQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            items: VecDeque::with_capacity(capacity),
        }
    }

    /// Contract capacity: 100.
    pub fn with_defaults() -> Self {
        Self::new(100)
    }

    /// Enqueue, returning the dropped head on overflow.
    pub fn push(&mut self, state: EditorState) -> Option<EditorState> {
        let dropped = if self.items.len() >= self.capacity {
            self.items.pop_front()
        } else {
            None
        };
        self.items.push_back(state);
        dropped
    }

    pub fn pop(&mut self) -> Option<EditorState> {
        self.items.pop_front()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor_state::{Caret, IdeFamily, SyncAction};

    fn state(line: u32) -> EditorState {
        EditorState::new(SyncAction::Navigate, "/f", Caret::new(line, 0), IdeFamily::A, true)
    }

    #[test]
    fn test_fifo_order() {
        let mut q = SendQueue::new(10);
        q.push(state(1));
        q.push(state(2));
        q.push(state(3));
        assert_eq!(q.pop().unwrap().line, 1);
        assert_eq!(q.pop().unwrap().line, 2);
        assert_eq!(q.pop().unwrap().line, 3);
        assert!(q.pop().is_none());
    }

    #[test]
    fn test_overflow_drops_head() {
        let mut q = SendQueue::new(3);
        q.push(state(1));
        q.push(state(2));
        q.push(state(3));
        let dropped = q.push(state(4));
        assert_eq!(dropped.unwrap().line, 1);
        assert_eq!(q.len(), 3);
        assert_eq!(q.pop().unwrap().line, 2);
    }

    #[test]
    fn test_length_never_exceeds_capacity() {
        let mut q = SendQueue::new(100);
        for i in 0..250 {
            q.push(state(i));
            assert!(q.len() <= 100);
        }
        // Oldest 150 were dropped.
        assert_eq!(q.pop().unwrap().line, 150);
    }

    #[test]
    fn test_clear() {
        let mut q = SendQueue::new(3);
        q.push(state(1));
        q.clear();
        assert!(q.is_empty());
    }
}
