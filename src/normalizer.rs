//! Rotation-aware normalization of the appliance's free-running counters.
//!
//! AdGuard Home keeps its aggregate counters over a retention window and drops
//! old buckets when the window rotates, so a raw counter can go down between
//! two scrapes. Any decrease is treated as a rotation: the exported value
//! drops to zero and the new raw value becomes the base for later scrapes.

use ahash::AHashMap as HashMap;

use crate::model::Stats;

/// Tracking keys for the five aggregate counters.
pub const KEY_DNS_QUERIES: &str = "q";
pub const KEY_BLOCKED_FILTERING: &str = "b";
pub const KEY_PARENTAL: &str = "p";
pub const KEY_SAFE_BROWSING: &str = "sb";
pub const KEY_SAFE_SEARCH: &str = "ss";

/// State for a single counter of a single target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterTrack {
    /// Offset established after the last detected rotation.
    pub base: u64,
    /// Most recently observed raw value.
    pub last: u64,
}

/// Per-target counter state. Each target owns exactly one of these.
#[derive(Debug, Default)]
pub struct CounterNormalizer {
    tracks: HashMap<&'static str, CounterTrack>,
}

impl CounterNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Converts a raw counter observation into the value to export.
    pub fn normalize(&mut self, key: &'static str, raw: u64) -> u64 {
        let Some(track) = self.tracks.get_mut(key) else {
            self.tracks.insert(key, CounterTrack { base: 0, last: raw });
            return raw;
        };

        if raw < track.last {
            track.base = raw;
            track.last = 0;
            return 0;
        }

        track.last = raw;
        raw.saturating_sub(track.base)
    }

    /// Runs all five aggregate counters of `stats` through the normalizer in place.
    pub fn normalize_stats(&mut self, stats: &mut Stats) {
        stats.dns_queries = self.normalize(KEY_DNS_QUERIES, stats.dns_queries);
        stats.blocked_filtering = self.normalize(KEY_BLOCKED_FILTERING, stats.blocked_filtering);
        stats.parental_filtering = self.normalize(KEY_PARENTAL, stats.parental_filtering);
        stats.safe_browsing_filtering =
            self.normalize(KEY_SAFE_BROWSING, stats.safe_browsing_filtering);
        stats.safe_search_filtering =
            self.normalize(KEY_SAFE_SEARCH, stats.safe_search_filtering);
    }

    pub fn track(&self, key: &str) -> Option<CounterTrack> {
        self.tracks.get(key).copied()
    }
}
