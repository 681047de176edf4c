use match_crawler::MatchEvent;
use std::collections::{HashSet, VecDeque};

/// Upper bound on remembered game ids before the oldest are forgotten.
pub const DEFAULT_SEEN_CAPACITY: usize = 100_000;

/// Set of game ids already delivered past the deduplicator.
///
/// Owned by the single aggregator task, so implementations need no locking.
/// A persistent backend only has to implement this trait.
pub trait SeenSet: Send {
    /// Records `game_id`. Returns `false` when it was already present.
    fn insert(&mut self, game_id: &str) -> bool;

    fn contains(&self, game_id: &str) -> bool;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory seen set, bounded FIFO.
#[derive(Debug)]
pub struct MemorySeenSet {
    ids:      HashSet<String>,
    order:    VecDeque<String>,
    capacity: usize,
}

impl MemorySeenSet {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_SEEN_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            ids: HashSet::new(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }
}

impl Default for MemorySeenSet {
    fn default() -> Self {
        Self::new()
    }
}

impl SeenSet for MemorySeenSet {
    fn insert(&mut self, game_id: &str) -> bool {
        if !self.ids.insert(game_id.to_string()) {
            return false;
        }
        self.order.push_back(game_id.to_string());
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.ids.remove(&oldest);
            }
        }
        true
    }

    fn contains(&self, game_id: &str) -> bool {
        self.ids.contains(game_id)
    }

    fn len(&self) -> usize {
        self.ids.len()
    }
}

/// Lets through the first event for each game id, whichever crawler saw it.
pub struct Deduplicator<S: SeenSet = MemorySeenSet> {
    seen: S,
}

impl<S: SeenSet> Deduplicator<S> {
    pub fn new(seen: S) -> Self {
        Self { seen }
    }

    pub fn admit(&mut self, event: MatchEvent) -> Option<MatchEvent> {
        if self.seen.insert(&event.summary.game_id) {
            Some(event)
        } else {
            None
        }
    }
}
