//! Edit distance between AS paths.
use std::collections::HashMap;

use crate::Asn;

/// Memo key: the two sub-paths a distance was computed for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PathPair {
    left: Vec<Asn>,
    right: Vec<Asn>,
}

/// Default bound on the number of memoized sub-path pairs.
pub const MEMO_CAPACITY: usize = 1 << 20;

/// Levenshtein distance over ASN tokens, memoized on sub-path pairs.
///
/// Prefixes that share topology produce the same sub-paths over and over, so
/// the cache pays off across the prefixes of one run. One engine belongs to
/// exactly one run; create a new one for every `(AS, variant)`.
///
/// A pair of paths of lengths `n` and `m` adds up to `n * m` entries, each
/// holding copies of both sub-paths. The memo is dropped whenever it reaches
/// its capacity.
#[derive(Debug)]
pub struct DistanceEngine {
    memo: HashMap<PathPair, usize>,
    capacity: usize,
    hits: usize,
}

impl Default for DistanceEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl DistanceEngine {
    pub fn new() -> Self {
        Self::with_capacity(MEMO_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            memo: HashMap::new(),
            capacity,
            hits: 0,
        }
    }

    /// Minimum number of single-hop insertions, deletions and substitutions
    /// that turn `a` into `b`.
    pub fn distance(&mut self, a: &[Asn], b: &[Asn]) -> usize {
        if a.is_empty() {
            return b.len();
        }
        if b.is_empty() {
            return a.len();
        }
        if a == b {
            return 0;
        }

        let key = PathPair {
            left: a.to_vec(),
            right: b.to_vec(),
        };
        if let Some(d) = self.memo.get(&key) {
            self.hits += 1;
            return *d;
        }

        let a_init = &a[..a.len() - 1];
        let b_init = &b[..b.len() - 1];
        let cost = usize::from(a.last() != b.last());

        let delete = self.distance(a_init, b) + 1;
        let insert = self.distance(a, b_init) + 1;
        let substitute = self.distance(a_init, b_init) + cost;
        let d = delete.min(insert).min(substitute);

        if self.memo.len() >= self.capacity {
            log::debug!("Distance memo reached {} entries, clearing", self.memo.len());
            self.memo.clear();
        }
        self.memo.insert(key, d);
        d
    }

    /// Number of memoized sub-path pairs.
    pub fn cache_len(&self) -> usize {
        self.memo.len()
    }

    /// Number of lookups answered from the cache.
    pub fn cache_hits(&self) -> usize {
        self.hits
    }
}
