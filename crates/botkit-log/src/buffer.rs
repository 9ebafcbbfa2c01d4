//! Fixed-capacity ring of recently formatted log lines.

use std::collections::VecDeque;

use parking_lot::Mutex;

/// Keeps the last `capacity` lines handed to the backend, oldest first.
/// Appending to a full buffer evicts exactly the single oldest line.
#[derive(Debug)]
pub struct LogBuffer {
    lines: Mutex<VecDeque<String>>,
    capacity: usize,
}

impl LogBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: Mutex::new(VecDeque::new()),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.lines.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.lock().is_empty()
    }

    pub fn append(&self, line: impl Into<String>) {
        if self.capacity == 0 {
            return;
        }
        let mut lines = self.lines.lock();
        if lines.len() >= self.capacity {
            lines.pop_front();
        }
        lines.push_back(line.into());
    }

    /// The most recent `min(n, len)` lines in chronological order.
    pub fn last_lines(&self, n: usize) -> Vec<String> {
        let lines = self.lines.lock();
        let skip = lines.len().saturating_sub(n);
        lines.iter().skip(skip).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(capacity: usize, count: usize) -> LogBuffer {
        let buf = LogBuffer::new(capacity);
        for i in 0..count {
            buf.append(format!("line {i}"));
        }
        buf
    }

    #[test]
    fn empty_buffer_returns_nothing() {
        let buf = LogBuffer::new(4);
        assert!(buf.is_empty());
        assert!(buf.last_lines(10).is_empty());
    }

    #[test]
    fn last_lines_are_chronological() {
        let buf = filled(10, 5);
        assert_eq!(buf.last_lines(3), vec!["line 2", "line 3", "line 4"]);
    }

    #[test]
    fn request_larger_than_len_is_clamped() {
        let buf = filled(10, 2);
        assert_eq!(buf.last_lines(50), vec!["line 0", "line 1"]);
    }

    #[test]
    fn full_buffer_evicts_single_oldest() {
        let buf = filled(3, 3);
        buf.append("line 3");
        assert_eq!(buf.len(), 3);
        assert_eq!(buf.last_lines(3), vec!["line 1", "line 2", "line 3"]);
    }

    #[test]
    fn never_exceeds_capacity() {
        let buf = LogBuffer::new(7);
        for i in 0usize..100 {
            buf.append(format!("line {i}"));
            assert!(buf.len() <= 7);
            let k = (i % 7) + 1;
            let expected: Vec<String> = ((i + 1).saturating_sub(k)..=i)
                .map(|j| format!("line {j}"))
                .collect();
            assert_eq!(buf.last_lines(k), expected);
        }
    }

    #[test]
    fn huge_capacity_allocates_lazily() {
        let buf = LogBuffer::new(usize::MAX);
        assert_eq!(buf.capacity(), usize::MAX);
        buf.append("only");
        assert_eq!(buf.last_lines(usize::MAX), vec!["only"]);
    }

    #[test]
    fn zero_capacity_retains_nothing() {
        let buf = filled(0, 3);
        assert!(buf.is_empty());
        assert!(buf.last_lines(1).is_empty());
    }

    #[test]
    fn concurrent_appends_respect_capacity() {
        let buf = std::sync::Arc::new(LogBuffer::new(50));
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let buf = std::sync::Arc::clone(&buf);
                std::thread::spawn(move || {
                    for i in 0..200 {
                        buf.append(format!("t{t} {i}"));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().expect("writer thread");
        }
        assert_eq!(buf.len(), 50);
    }
}
