//! The crawl work queue and visited set.
//!
//! The frontier is owned by the orchestrator for the whole run. Entries are
//! never shared: `dequeue` moves them out and marks their URL visited in the
//! same step, so a URL can only ever be handed out once.

use std::collections::{HashSet, VecDeque};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontierEntry {
    pub url: String,
    pub depth: usize,
}

impl FrontierEntry {
    pub fn new(url: impl Into<String>, depth: usize) -> Self {
        Self {
            url: url.into(),
            depth,
        }
    }
}

#[derive(Debug)]
pub struct Frontier {
    queue: VecDeque<FrontierEntry>,
    visited: HashSet<String>,
    max_depth: usize,
    max_urls: usize,
}

impl Frontier {
    pub fn new(max_depth: usize, max_urls: usize) -> Self {
        Self {
            queue: VecDeque::new(),
            visited: HashSet::new(),
            max_depth,
            max_urls,
        }
    }

    /// A frontier holding only `seed` at depth 0.
    pub fn seeded(seed: &str, max_depth: usize, max_urls: usize) -> Self {
        let mut frontier = Self::new(max_depth, max_urls);
        frontier.queue.push_back(FrontierEntry::new(seed, 0));
        frontier
    }

    /// Put an already priority-sorted batch at the head of the queue, ahead of
    /// everything queued earlier, keeping the batch's own order. Entries deeper
    /// than `max_depth` are dropped. Returns how many entries were queued.
    pub fn enqueue_many(&mut self, entries: Vec<FrontierEntry>) -> usize {
        let accepted: Vec<FrontierEntry> = entries
            .into_iter()
            .filter(|entry| {
                if entry.depth > self.max_depth {
                    debug!(url = %entry.url, depth = entry.depth, "Refusing entry beyond max depth");
                    return false;
                }
                true
            })
            .collect();

        let count = accepted.len();
        for entry in accepted.into_iter().rev() {
            self.queue.push_front(entry);
        }
        count
    }

    /// Remove up to `n` entries from the head, skipping visited URLs and
    /// entries beyond `max_depth`. Every returned URL is marked visited.
    /// Selection stops once the visited set reaches `max_urls`.
    pub fn dequeue(&mut self, n: usize) -> Vec<FrontierEntry> {
        let mut batch = Vec::with_capacity(n.min(self.queue.len()));

        while batch.len() < n && !self.limit_reached() {
            let Some(entry) = self.queue.pop_front() else {
                break;
            };
            if entry.depth > self.max_depth || self.visited.contains(&entry.url) {
                continue;
            }
            self.visited.insert(entry.url.clone());
            batch.push(entry);
        }

        batch
    }

    pub fn limit_reached(&self) -> bool {
        self.visited.len() >= self.max_urls
    }

    pub fn is_visited(&self, url: &str) -> bool {
        self.visited.contains(url)
    }

    pub fn visited(&self) -> &HashSet<String> {
        &self.visited
    }

    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }

    /// Entries still queued, including ones `dequeue` would skip.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn max_urls(&self) -> usize {
        self.max_urls
    }
}
