use std::collections::VecDeque;

use crate::protocol::MAX_LOG_LINES;
use crate::types::LogEntry;

/// Bounded FIFO of the most recent raw lines, for a serial-monitor view.
///
/// Once `capacity` entries are held, each append evicts the single oldest
/// entry first.  Entries are numbered by arrival (`LogEntry::seq`) so a
/// consumer can tell how many lines scrolled out of the window.
#[derive(Debug)]
pub struct LogBuffer {
    entries: VecDeque<LogEntry>,
    capacity: usize,
    next_seq: u64,
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::with_capacity(MAX_LOG_LINES)
    }
}

impl LogBuffer {
    /// Create a buffer that holds at most `capacity` lines (minimum 1).
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            next_seq: 0,
        }
    }

    /// Append `line` at the tail, evicting the oldest entry when full.
    ///
    /// Returns the stored entry.
    pub fn append(&mut self, line: impl Into<String>) -> &LogEntry {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.push_back(LogEntry {
            seq,
            text: line.into(),
        });
        &self.entries[self.entries.len() - 1]
    }

    /// Entries in arrival order, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    /// Owned copy of the current contents, oldest first.
    pub fn to_vec(&self) -> Vec<LogEntry> {
        self.entries.iter().cloned().collect()
    }

    /// Index of the newest entry, for scroll-to-end.  `None` when empty.
    pub fn latest_index(&self) -> Option<usize> {
        self.entries.len().checked_sub(1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_the_last_200_of_250() {
        let mut log = LogBuffer::default();
        for i in 0..250 {
            log.append(format!("line {i}"));
        }
        assert_eq!(log.len(), MAX_LOG_LINES);
        let texts: Vec<_> = log.iter().map(|e| e.text.clone()).collect();
        let expected: Vec<_> = (50..250).map(|i| format!("line {i}")).collect();
        assert_eq!(texts, expected);
        assert_eq!(log.iter().next().map(|e| e.seq), Some(50));
        assert_eq!(log.latest_index(), Some(199));
    }

    #[test]
    fn below_capacity_nothing_is_evicted() {
        let mut log = LogBuffer::with_capacity(3);
        assert!(log.is_empty());
        assert_eq!(log.latest_index(), None);
        log.append("a");
        log.append("b");
        assert_eq!(log.len(), 2);
        assert_eq!(log.latest_index(), Some(1));
    }

    #[test]
    fn append_returns_the_stored_entry() {
        let mut log = LogBuffer::with_capacity(1);
        assert_eq!(log.append("a").seq, 0);
        let e = log.append("b").clone();
        assert_eq!(e, LogEntry { seq: 1, text: "b".into() });
        assert_eq!(log.to_vec(), vec![e]);
    }

    #[test]
    fn zero_capacity_is_raised_to_one() {
        let mut log = LogBuffer::with_capacity(0);
        log.append("only");
        assert_eq!(log.capacity(), 1);
        assert_eq!(log.len(), 1);
    }
}
