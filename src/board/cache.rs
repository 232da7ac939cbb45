use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

use super::models::BoardView;

/// Cached board views keyed by board id.
///
/// Reads go through [`BoardCache::get`]; every successful mutation calls
/// [`BoardCache::invalidate`] for the affected board so the next read
/// reloads the persisted ordering.
///
/// A reader that misses takes [`BoardCache::generation`] before loading
/// and stores the result with [`BoardCache::insert_if_current`]. An
/// invalidation landing between the two bumps the generation and the
/// stale load is returned to its caller but never cached.
#[derive(Default)]
pub struct BoardCache {
    slots: DashMap<i64, Slot>,
    hits: AtomicU64,
    misses: AtomicU64,
}

#[derive(Default)]
struct Slot {
    generation: u64,
    view: Option<Arc<BoardView>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

impl BoardCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, board_id: i64) -> Option<Arc<BoardView>> {
        let cached = self
            .slots
            .get(&board_id)
            .and_then(|slot| slot.view.as_ref().map(Arc::clone));
        match cached {
            Some(view) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(view)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Current generation of a board. Take this before loading a view.
    pub fn generation(&self, board_id: i64) -> u64 {
        self.slots
            .get(&board_id)
            .map(|slot| slot.generation)
            .unwrap_or(0)
    }

    /// Cache `view` only if no invalidation happened since `generation`
    /// was read. The view is handed back either way.
    pub fn insert_if_current(
        &self,
        board_id: i64,
        generation: u64,
        view: BoardView,
    ) -> Arc<BoardView> {
        let view = Arc::new(view);
        let mut slot = self.slots.entry(board_id).or_default();
        if slot.generation == generation {
            slot.view = Some(Arc::clone(&view));
        } else {
            tracing::debug!(
                board_id,
                loaded = generation,
                current = slot.generation,
                "discarding board view loaded before an invalidation"
            );
        }
        view
    }

    /// Mark a board stale. Returns whether a cached view was dropped.
    pub fn invalidate(&self, board_id: i64) -> bool {
        let mut slot = self.slots.entry(board_id).or_default();
        slot.generation += 1;
        let dropped = slot.view.take().is_some();
        if dropped {
            tracing::debug!(board_id, "board view cache invalidated");
        }
        dropped
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.slots.iter().filter(|slot| slot.view.is_some()).count(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}
