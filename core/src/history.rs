use std::collections::VecDeque;

pub const DEFAULT_MAX_HISTORY: usize = 20;

/// Linear undo/redo over snapshots of `S`. `past` is bounded to
/// `max_history` entries; the oldest are dropped first.
#[derive(Debug, Clone)]
pub struct History<S> {
    present: S,
    past: VecDeque<S>,
    future: VecDeque<S>,
    max_history: usize,
}

impl<S: Clone> History<S> {
    #[must_use]
    pub fn new(initial: S) -> Self {
        Self::with_max_history(initial, DEFAULT_MAX_HISTORY)
    }

    #[must_use]
    pub fn with_max_history(initial: S, max_history: usize) -> Self {
        Self {
            present: initial,
            past: VecDeque::new(),
            future: VecDeque::new(),
            max_history,
        }
    }

    #[must_use]
    pub fn present(&self) -> &S {
        &self.present
    }

    /// Record the current state and install `next`. Clears redo.
    pub fn set_state(&mut self, next: S) {
        let prev = std::mem::replace(&mut self.present, next);
        self.past.push_back(prev);
        while self.past.len() > self.max_history {
            self.past.pop_front();
        }
        self.future.clear();
    }

    /// `set_state` with a value derived from the current state.
    pub fn update<F: FnOnce(&S) -> S>(&mut self, f: F) {
        let next = f(&self.present);
        self.set_state(next);
    }

    /// Swap in a state without touching history.
    pub fn replace(&mut self, state: S) {
        self.present = state;
    }

    /// Returns false when there is nothing to undo.
    pub fn undo(&mut self) -> bool {
        let Some(prev) = self.past.pop_back() else {
            return false;
        };
        let current = std::mem::replace(&mut self.present, prev);
        self.future.push_front(current);
        true
    }

    /// Returns false when there is nothing to redo.
    pub fn redo(&mut self) -> bool {
        let Some(next) = self.future.pop_front() else {
            return false;
        };
        let current = std::mem::replace(&mut self.present, next);
        self.past.push_back(current);
        true
    }

    #[must_use]
    pub fn can_undo(&self) -> bool {
        !self.past.is_empty()
    }

    #[must_use]
    pub fn can_redo(&self) -> bool {
        !self.future.is_empty()
    }

    pub fn clear_history(&mut self) {
        self.past.clear();
        self.future.clear();
    }

    #[must_use]
    pub fn undo_depth(&self) -> usize {
        self.past.len()
    }

    #[must_use]
    pub fn redo_depth(&self) -> usize {
        self.future.len()
    }

    #[must_use]
    pub fn max_history(&self) -> usize {
        self.max_history
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_undo_redo_round_trip() {
        let mut h = History::new(0);
        for i in 1..=5 {
            h.set_state(i);
        }
        for _ in 0..5 {
            assert!(h.undo());
        }
        assert_eq!(*h.present(), 0);
        assert!(!h.can_undo());

        assert!(h.redo());
        assert_eq!(*h.present(), 1);
        assert!(h.redo());
        assert_eq!(*h.present(), 2);
    }

    #[test]
    fn test_undo_on_empty_is_noop() {
        let mut h = History::new("a");
        assert!(!h.undo());
        assert!(!h.redo());
        assert_eq!(*h.present(), "a");
    }

    #[test]
    fn test_set_state_discards_future() {
        let mut h = History::new(0);
        h.set_state(1);
        h.set_state(2);
        h.undo();
        assert!(h.can_redo());
        h.set_state(10);
        assert!(!h.can_redo());
        assert!(!h.redo());
        h.undo();
        assert_eq!(*h.present(), 1);
    }

    #[test]
    fn test_history_bound() {
        let mut h = History::with_max_history(0, 20);
        for i in 1..=30 {
            h.set_state(i);
        }
        assert_eq!(h.undo_depth(), 20);
        let mut undone = 0;
        while h.undo() {
            undone += 1;
        }
        assert_eq!(undone, 20);
        assert_eq!(*h.present(), 10);
    }

    #[test]
    fn test_update_and_replace() {
        let mut h = History::new(vec![1]);
        h.update(|v| {
            let mut v = v.clone();
            v.push(2);
            v
        });
        assert_eq!(h.present(), &vec![1, 2]);

        h.replace(vec![9]);
        assert_eq!(h.undo_depth(), 1);
        h.undo();
        assert_eq!(h.present(), &vec![1]);
    }

    #[test]
    fn test_clear_history() {
        let mut h = History::new(0);
        h.set_state(1);
        h.set_state(2);
        h.undo();
        h.clear_history();
        assert!(!h.can_undo());
        assert!(!h.can_redo());
        assert_eq!(*h.present(), 1);
    }
}
