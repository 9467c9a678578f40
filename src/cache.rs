//! Statement and query caches (spec §4.8).
//!
//! Grounded on `sqlx_core::common::statement_cache.rs`'s `StatementCache`
//! (an `indexmap`-backed strict LRU with an eviction hook), specialized into
//! two: an elastic query-tokenization cache with no eviction, and a strict
//! `PreparedStatementCache` whose eviction enqueues `COM_STMT_CLOSE` for the
//! statement it displaces. Both honor the same `0`/`-1` capacity sentinels
//! (spec §4.8 "0 disables; −1 unbounded"), via [`crate::options::CacheCapacity`].

use indexmap::IndexMap;

use crate::options::CacheCapacity;
use crate::query::ParsedQuery;
use crate::statement::PreparedStatement;

/// An eventual-consistency cache (spec §4.8 "elastic, not a hard bound"):
/// SQL tokenization is pure and cheap to recompute, so bounding it only
/// trims memory, never correctness — a disabled cache simply reparses every
/// call instead of tracking a zero-capacity map.
pub(crate) struct QueryCache {
    capacity: CacheCapacity,
    entries: IndexMap<Box<str>, ParsedQuery>,
}

impl QueryCache {
    pub(crate) fn new(capacity: CacheCapacity) -> Self {
        Self {
            capacity,
            entries: IndexMap::new(),
        }
    }

    /// Returns the parsed form of `sql`, reusing a cached entry when the
    /// cache is enabled and already holds one. Always returns an owned
    /// value: callers never observe whether this particular call was a hit.
    pub(crate) fn get_or_parse(&mut self, sql: &str) -> ParsedQuery {
        if let CacheCapacity::Disabled = self.capacity {
            return ParsedQuery::parse(sql);
        }

        if let Some(parsed) = self.entries.get(sql) {
            return parsed.clone();
        }

        let parsed = ParsedQuery::parse(sql);

        if let CacheCapacity::Bounded(n) = self.capacity {
            if self.entries.len() >= n {
                self.entries.shift_remove_index(0);
            }
        }
        self.entries.insert(sql.into(), parsed.clone());

        parsed
    }
}

/// A strict LRU over server-prepared statements (spec §4.8 "strict LRU with
/// eviction callback enqueuing COM_STMT_CLOSE"). Bounded by
/// `prepareCacheSize` (spec §6); eviction never happens inline with a
/// lookup — callers drain [`PreparedStatementCache::take_evicted`] and
/// issue the close themselves, since closing requires the connection's
/// exchange core which the cache itself does not have access to.
pub(crate) struct PreparedStatementCache {
    capacity: CacheCapacity,
    entries: IndexMap<Box<str>, PreparedStatement>,
    evicted: Vec<PreparedStatement>,
}

impl PreparedStatementCache {
    pub(crate) fn new(capacity: CacheCapacity) -> Self {
        Self {
            capacity,
            entries: IndexMap::new(),
            evicted: Vec::new(),
        }
    }

    pub(crate) fn is_disabled(&self) -> bool {
        matches!(self.capacity, CacheCapacity::Disabled)
    }

    pub(crate) fn get(&mut self, sql: &str) -> Option<&PreparedStatement> {
        if self.entries.contains_key(sql) {
            // Touch: move to the back of the map so the front stays the
            // least-recently-used entry (shift_remove + reinsert, since
            // `IndexMap` does not expose an in-place move-to-back).
            let (_, value) = self.entries.shift_remove_entry(sql).expect("just checked");
            self.entries.insert(sql.into(), value);
        }
        self.entries.get(sql)
    }

    /// Inserts a freshly-prepared statement, evicting the least-recently-used
    /// entry if the cache is already at capacity. `put_if_absent` semantics
    /// (spec §4.8): if `sql` is already cached (a concurrent prepare raced
    /// this one), the existing entry wins and the fresh one is returned to
    /// the caller to close instead of being retained.
    ///
    /// A disabled cache (`capacity == 0`, spec §4.8) never retains anything:
    /// every fresh statement is handed straight back via
    /// [`PreparedStatementCache::take_evicted`]. Callers that prepare
    /// against a disabled cache must not rely on a subsequent `get` finding
    /// the statement they just inserted — see
    /// [`PreparedStatementCache::is_disabled`].
    pub(crate) fn put_if_absent(&mut self, sql: &str, statement: PreparedStatement) {
        if self.entries.contains_key(sql) {
            self.evicted.push(statement);
            return;
        }

        match self.capacity {
            CacheCapacity::Disabled => {
                self.evicted.push(statement);
                return;
            }
            CacheCapacity::Bounded(n) => {
                if self.entries.len() >= n {
                    if let Some((_, oldest)) = self.entries.shift_remove_index(0) {
                        self.evicted.push(oldest);
                    }
                }
            }
            CacheCapacity::Unbounded => {}
        }

        self.entries.insert(sql.into(), statement);
    }

    pub(crate) fn remove(&mut self, sql: &str) -> Option<PreparedStatement> {
        self.entries.shift_remove(sql)
    }

    /// Drains the statements displaced since the last call, for the caller
    /// to issue `COM_STMT_CLOSE` against.
    pub(crate) fn take_evicted(&mut self) -> Vec<PreparedStatement> {
        std::mem::take(&mut self.evicted)
    }

    /// All statements still resident, for the connection-close path (spec
    /// §4.8 "closed by explicit COM_STMT_CLOSE on eviction or connection
    /// close").
    pub(crate) fn drain_all(&mut self) -> Vec<PreparedStatement> {
        self.entries.drain(..).map(|(_, v)| v).collect()
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statement::PreparedStatement;

    fn dummy(id: u32) -> PreparedStatement {
        PreparedStatement {
            statement_id: id,
            param_count: 0,
            params: Vec::new(),
            columns: Vec::new(),
        }
    }

    #[test]
    fn evicts_least_recently_used() {
        let mut cache = PreparedStatementCache::new(CacheCapacity::Bounded(2));
        cache.put_if_absent("A", dummy(1));
        cache.put_if_absent("B", dummy(2));
        assert!(cache.get("A").is_some());
        cache.put_if_absent("C", dummy(3));

        // "B" was least-recently touched (A was just looked up), so it's
        // the one evicted, not "A".
        assert_eq!(cache.len(), 2);
        let evicted = cache.take_evicted();
        assert_eq!(evicted.len(), 1);
        assert_eq!(evicted[0].statement_id, 2);
    }

    #[test]
    fn put_if_absent_does_not_replace_existing() {
        let mut cache = PreparedStatementCache::new(CacheCapacity::Bounded(4));
        cache.put_if_absent("A", dummy(1));
        cache.put_if_absent("A", dummy(2));
        assert_eq!(cache.get("A").unwrap().statement_id, 1);
        let evicted = cache.take_evicted();
        assert_eq!(evicted.len(), 1);
        assert_eq!(evicted[0].statement_id, 2);
    }

    #[test]
    fn disabled_cache_never_retains_anything() {
        let mut cache = PreparedStatementCache::new(CacheCapacity::Disabled);
        assert!(cache.is_disabled());
        cache.put_if_absent("A", dummy(1));
        assert!(cache.get("A").is_none());
        let evicted = cache.take_evicted();
        assert_eq!(evicted.len(), 1);
        assert_eq!(evicted[0].statement_id, 1);
    }

    #[test]
    fn unbounded_cache_never_evicts() {
        let mut cache = PreparedStatementCache::new(CacheCapacity::Unbounded);
        for i in 0..10 {
            cache.put_if_absent(&i.to_string(), dummy(i));
        }
        assert_eq!(cache.len(), 10);
        assert!(cache.take_evicted().is_empty());
    }

    #[test]
    fn disabled_query_cache_reparses_every_call() {
        let mut cache = QueryCache::new(CacheCapacity::Disabled);
        let a = cache.get_or_parse("SELECT ?");
        let b = cache.get_or_parse("SELECT ?");
        assert_eq!(a.marker_count(), b.marker_count());
    }

    #[test]
    fn bounded_query_cache_evicts_oldest_entry() {
        let mut cache = QueryCache::new(CacheCapacity::Bounded(1));
        cache.get_or_parse("SELECT 1");
        cache.get_or_parse("SELECT 2");
        assert_eq!(cache.entries.len(), 1);
        assert!(cache.entries.contains_key("SELECT 2"));
    }
}
