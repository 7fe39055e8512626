//! Bounded sliding window of output chunks for the currently running task.
//!
//! The reader thread pushes from one side while observers drain from the
//! other, so the deque sits behind a plain mutex. When the window is full
//! the oldest chunk is dropped first; observers that poll too slowly lose
//! history, never freshness.

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::config::OUTPUT_WINDOW_CAPACITY;

/// A mutex-guarded, capacity-bounded FIFO of raw output chunks.
#[derive(Debug)]
pub struct OutputWindow {
    chunks: Mutex<VecDeque<Vec<u8>>>,
    capacity: usize,
}

impl OutputWindow {
    pub fn new() -> Self {
        Self::with_capacity(OUTPUT_WINDOW_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            chunks: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Append one chunk, dropping the oldest entry when at capacity.
    pub fn push(&self, chunk: Vec<u8>) {
        if chunk.is_empty() {
            return;
        }
        let mut chunks = self.chunks.lock().expect("output window lock poisoned");
        if chunks.len() >= self.capacity {
            chunks.pop_front();
        }
        chunks.push_back(chunk);
    }

    /// Atomically move every buffered chunk out, oldest first.
    pub fn drain(&self) -> Vec<Vec<u8>> {
        let mut chunks = self.chunks.lock().expect("output window lock poisoned");
        chunks.drain(..).collect()
    }

    /// Discard all buffered chunks.
    pub fn clear(&self) {
        self.chunks
            .lock()
            .expect("output window lock poisoned")
            .clear();
    }

    pub fn len(&self) -> usize {
        self.chunks.lock().expect("output window lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for OutputWindow {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_drain_preserve_order() {
        let window = OutputWindow::new();
        window.push(b"one".to_vec());
        window.push(b"two".to_vec());
        window.push(b"three".to_vec());

        let drained = window.drain();
        assert_eq!(drained, vec![b"one".to_vec(), b"two".to_vec(), b"three".to_vec()]);
        assert!(window.is_empty());
    }

    #[test]
    fn test_overflow_drops_oldest() {
        let window = OutputWindow::with_capacity(3);
        for i in 0..5 {
            window.push(vec![i]);
        }
        assert_eq!(window.len(), 3);
        assert_eq!(window.drain(), vec![vec![2], vec![3], vec![4]]);
    }

    #[test]
    fn test_empty_chunks_are_ignored() {
        let window = OutputWindow::new();
        window.push(Vec::new());
        assert!(window.is_empty());
    }

    #[test]
    fn test_clear() {
        let window = OutputWindow::new();
        window.push(b"data".to_vec());
        window.clear();
        assert!(window.drain().is_empty());
    }

    #[test]
    fn test_len_never_exceeds_capacity_under_contention() {
        use std::sync::Arc;

        let window = Arc::new(OutputWindow::with_capacity(8));
        let mut handles = Vec::new();
        for t in 0..4 {
            let w = Arc::clone(&window);
            handles.push(std::thread::spawn(move || {
                for i in 0..100u8 {
                    w.push(vec![t, i]);
                    assert!(w.len() <= 8);
                }
            }));
        }
        for h in handles {
            h.join().expect("pusher thread panicked");
        }
        assert!(window.len() <= 8);
    }
}
