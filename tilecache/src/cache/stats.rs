//! Cache statistics.

use std::fmt;

/// Snapshot of [`BoundedCache`](super::BoundedCache) counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered with a resolved image
    pub hits: u64,
    /// Lookups that inserted a new pending entry
    pub misses: u64,
    /// Lookups answered with the placeholder (invalid, pending or missing)
    pub placeholders_served: u64,
    /// Entries dropped to stay within capacity
    pub evictions: u64,
    /// Results stored into a tracked entry
    pub deliveries: u64,
    /// Results dropped because their entry had been evicted
    pub obsolete_deliveries: u64,
    /// Current number of entries (pending and resolved)
    pub entries: usize,
    /// Maximum number of entries
    pub capacity: usize,
}

impl CacheStats {
    /// Fraction of lookups that were hits, 0.0 when nothing was looked up.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            return 0.0;
        }
        self.hits as f64 / total as f64
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} entries, {} hits, {} misses, {} evictions, {} deliveries ({} obsolete)",
            self.entries,
            self.capacity,
            self.hits,
            self.misses,
            self.evictions,
            self.deliveries,
            self.obsolete_deliveries
        )
    }
}
