//! Ground-truth AS paths observed by a route collector.
use std::collections::HashMap;

use crate::{Asn, Prefix};

/// Observed path of one prefix, ordered from the collector to the origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferencePath {
    pub prefix: Prefix,
    pub origin: Asn,
    pub path: Vec<Asn>,
}

impl ReferencePath {
    /// Build a reference path, dropping every ASN already present on it. This
    /// removes prepending as well as loops.
    pub fn new(prefix: Prefix, origin: Asn, hops: impl IntoIterator<Item = Asn>) -> Self {
        let mut path: Vec<Asn> = Vec::new();
        for asn in hops {
            if !path.contains(&asn) {
                path.push(asn);
            }
        }
        Self {
            prefix,
            origin,
            path,
        }
    }

    pub fn len(&self) -> usize {
        self.path.len()
    }

    pub fn is_empty(&self) -> bool {
        self.path.is_empty()
    }

    /// The path reversed so that it starts at the origin.
    pub fn origin_first(&self) -> Vec<Asn> {
        self.path.iter().rev().copied().collect()
    }
}

/// One reference path per prefix, kept in the order the prefixes were first
/// observed.
///
/// When a prefix is observed with several origins or several paths, only the
/// first observation is kept; the others are counted as collapsed.
#[derive(Debug, Default, Clone)]
pub struct ReferenceSet {
    paths: Vec<ReferencePath>,
    index: HashMap<Prefix, usize>,
    collapsed: usize,
}

impl ReferenceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect the announcements seen at the collector `asn`, i.e., those whose
    /// path starts with `asn`.
    pub fn observed_by(
        asn: Asn,
        announcements: impl IntoIterator<Item = (Prefix, Asn, Vec<Asn>)>,
    ) -> Self {
        let mut set = ReferenceSet::new();
        for (prefix, origin, path) in announcements {
            if path.first() == Some(&asn) {
                set.insert(ReferencePath::new(prefix, origin, path));
            }
        }
        if set.collapsed > 0 {
            log::debug!(
                "AS{asn}: collapsed {} multi-origin or multi-path observations",
                set.collapsed
            );
        }
        set
    }

    /// Insert a path unless its prefix is already present. Returns whether it
    /// was inserted.
    pub fn insert(&mut self, path: ReferencePath) -> bool {
        if let Some(&i) = self.index.get(&path.prefix) {
            let kept = &self.paths[i];
            log::trace!(
                "Dropping observation of {} via {:?} (origin AS{}), keeping {:?} (origin AS{})",
                path.prefix,
                path.path,
                path.origin,
                kept.path,
                kept.origin
            );
            self.collapsed += 1;
            return false;
        }
        self.index.insert(path.prefix, self.paths.len());
        self.paths.push(path);
        true
    }

    pub fn get(&self, prefix: &Prefix) -> Option<&ReferencePath> {
        self.index.get(prefix).map(|&i| &self.paths[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &ReferencePath> {
        self.paths.iter()
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Number of observations dropped because their prefix was already known.
    pub fn collapsed(&self) -> usize {
        self.collapsed
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn prefix(s: &str) -> Prefix {
        s.parse().unwrap()
    }

    #[test]
    fn repeated_hops_are_removed() {
        let path = ReferencePath::new(prefix("10.0.0.0/8"), 1, vec![100, 100, 50, 50, 50, 1, 1]);
        assert_eq!(path.path, vec![100, 50, 1]);
        assert_eq!(path.origin_first(), vec![1, 50, 100]);

        // loops keep the first occurrence
        let path = ReferencePath::new(prefix("10.0.0.0/8"), 1, vec![100, 50, 100, 1]);
        assert_eq!(path.path, vec![100, 50, 1]);
    }

    #[test]
    fn first_observation_wins() {
        let set = ReferenceSet::observed_by(
            100,
            vec![
                (prefix("10.0.0.0/8"), 1, vec![100, 50, 1]),
                (prefix("10.0.0.0/8"), 2, vec![100, 60, 2]),
                (prefix("10.0.0.0/8"), 1, vec![100, 70, 1]),
                (prefix("192.168.0.0/16"), 7, vec![100, 7]),
            ],
        );

        assert_eq!(set.len(), 2);
        assert_eq!(set.collapsed(), 2);
        let kept = set.get(&prefix("10.0.0.0/8")).unwrap();
        assert_eq!(kept.origin, 1);
        assert_eq!(kept.path, vec![100, 50, 1]);
        assert_eq!(
            set.iter().map(|p| p.prefix).collect::<Vec<_>>(),
            vec![prefix("10.0.0.0/8"), prefix("192.168.0.0/16")]
        );
    }

    #[test]
    fn other_collectors_are_ignored() {
        let set = ReferenceSet::observed_by(
            100,
            vec![
                (prefix("10.0.0.0/8"), 1, vec![200, 50, 1]),
                (prefix("10.1.0.0/16"), 1, vec![]),
                (prefix("2001:db8::/32"), 3, vec![100, 3]),
            ],
        );

        assert_eq!(set.len(), 1);
        assert!(set.get(&prefix("2001:db8::/32")).is_some());
        assert_eq!(set.collapsed(), 0);
    }
}
