use std::collections::VecDeque;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadJob {
    pub url: String,
    /// Higher runs first.
    pub priority: i32,
}

/// Bounded download queue ordered by priority, FIFO among equal priorities.
///
/// When full, the tail entry (lowest priority, most recently queued among
/// equals) is evicted to make room.
#[derive(Debug)]
pub struct DownloadQueue {
    entries: VecDeque<DownloadJob>,
    capacity: usize,
}

impl DownloadQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    /// Queue `job`. A url already queued keeps one entry, at the higher of the two priorities.
    /// Returns the entry evicted to stay within capacity, which may be `job` itself.
    pub fn push(&mut self, job: DownloadJob) -> Option<DownloadJob> {
        if let Some(pos) = self.entries.iter().position(|e| e.url == job.url) {
            if self.entries[pos].priority >= job.priority {
                return None;
            }
            self.entries.remove(pos);
        }

        let pos = self
            .entries
            .iter()
            .position(|e| e.priority < job.priority)
            .unwrap_or(self.entries.len());
        self.entries.insert(pos, job);

        if self.entries.len() > self.capacity {
            self.entries.pop_back()
        } else {
            None
        }
    }

    pub fn pop(&mut self) -> Option<DownloadJob> {
        self.entries.pop_front()
    }

    pub fn contains(&self, url: &str) -> bool {
        self.entries.iter().any(|e| e.url == url)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
