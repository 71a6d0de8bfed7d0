//! Content deduplication
//!
//! Remembers SHA-256 digests of recently published posts (normalized to
//! lowercase with collapsed whitespace) in a FIFO-bounded history. Checking
//! and recording are separate steps: `record` is only called after a
//! successful publish, so failed publishes do not pollute the history.

use sha2::{Digest, Sha256};
use std::collections::VecDeque;

type ContentHash = [u8; 32];

pub struct ContentDeduplicator {
    capacity: usize,
    /// Accepted for forward compatibility with fuzzy matching; only exact
    /// normalized matches are detected today.
    #[allow(dead_code)]
    similarity_threshold: f32,
    recent: VecDeque<ContentHash>,
}

impl ContentDeduplicator {
    pub fn new(capacity: usize, similarity_threshold: f32) -> Self {
        tracing::info!("Content deduplicator initialized with {} item history", capacity);
        Self {
            capacity,
            similarity_threshold,
            recent: VecDeque::new(),
        }
    }

    /// True if `content` exactly matches a remembered post after
    /// normalization. Empty or whitespace-only content is never a duplicate.
    pub fn is_duplicate(&self, content: &str) -> bool {
        let normalized = normalize(content);
        if normalized.is_empty() {
            return false;
        }
        let hash = digest(&normalized);
        if self.recent.contains(&hash) {
            tracing::warn!("Duplicate content detected (hash: {})", hex_prefix(&hash));
            return true;
        }
        false
    }

    /// Remember `content`, evicting the oldest entry past capacity.
    pub fn record(&mut self, content: &str) {
        let normalized = normalize(content);
        if normalized.is_empty() {
            return;
        }
        self.recent.push_back(digest(&normalized));
        while self.recent.len() > self.capacity {
            self.recent.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.recent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recent.is_empty()
    }

    pub fn clear(&mut self) {
        self.recent.clear();
        tracing::info!("Content deduplication history cleared");
    }
}

/// Lowercase, trim, collapse runs of whitespace to single spaces.
fn normalize(content: &str) -> String {
    content
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn digest(normalized: &str) -> ContentHash {
    Sha256::digest(normalized.as_bytes()).into()
}

fn hex_prefix(hash: &ContentHash) -> String {
    hash.iter().take(8).map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_exact_duplicate_after_record() {
        let mut dedup = ContentDeduplicator::new(100, 0.9);

        assert!(!dedup.is_duplicate("gm nostr"));
        dedup.record("gm nostr");
        assert!(dedup.is_duplicate("gm nostr"));
    }

    #[test]
    fn case_and_whitespace_variants_match() {
        let mut dedup = ContentDeduplicator::new(100, 0.9);

        dedup.record("gm nostr");
        assert!(dedup.is_duplicate("GM   Nostr"));
        assert!(dedup.is_duplicate("  gm\tnostr  "));
        assert!(dedup.is_duplicate("gm\nnostr"));
    }

    #[test]
    fn check_alone_does_not_record() {
        let mut dedup = ContentDeduplicator::new(100, 0.9);

        assert!(!dedup.is_duplicate("hello"));
        assert!(!dedup.is_duplicate("hello"));
        assert_eq!(dedup.len(), 0);

        dedup.record("hello");
        assert_eq!(dedup.len(), 1);
    }

    #[test]
    fn evicts_oldest_past_capacity() {
        let mut dedup = ContentDeduplicator::new(3, 0.9);

        dedup.record("post one");
        dedup.record("post two");
        dedup.record("post three");
        dedup.record("post four");

        assert_eq!(dedup.len(), 3);
        assert!(!dedup.is_duplicate("post one"));
        assert!(dedup.is_duplicate("post two"));
        assert!(dedup.is_duplicate("post four"));
    }

    #[test]
    fn empty_content_is_never_duplicate() {
        let mut dedup = ContentDeduplicator::new(100, 0.9);

        dedup.record("");
        dedup.record("   ");
        assert_eq!(dedup.len(), 0);
        assert!(!dedup.is_duplicate(""));
        assert!(!dedup.is_duplicate("   \n\t"));
    }

    #[test]
    fn clear_forgets_history() {
        let mut dedup = ContentDeduplicator::new(100, 0.9);

        dedup.record("gm");
        assert!(dedup.is_duplicate("gm"));
        dedup.clear();
        assert!(!dedup.is_duplicate("gm"));
        assert!(dedup.is_empty());
    }
}
