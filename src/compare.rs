//! k-hop comparison of a reconstructed path against the observed one.
//!
//! Both paths are aligned at the origin: position 0 is the origin, position `k`
//! the AS `k` hops away from it. Comparison stops at the first position where
//! the paths disagree, including the position where the shorter path ends.
use crate::{
    topology::{RelType, RelationshipGraph},
    Asn,
};

/// Why the first disagreeing hop was wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MismatchKind {
    /// The hop lies in the origin-side region that was filled by seeding.
    Seeding,
    /// The hop was produced by propagation.
    Propagation,
    /// Nothing was reconstructed at all.
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mismatch {
    /// Distance from the origin of the first disagreeing position.
    pub hop: usize,
    pub kind: MismatchKind,
    /// The inferred link into this hop is neither a known peering nor a
    /// provider-customer relation.
    pub unexplained_link: bool,
    /// Relation of the inferred link into this hop, seen from the hop closer
    /// to the origin. `None` if the link is unknown or there is no link.
    pub relation: Option<RelType>,
}

/// Outcome of comparing one pair of paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HopComparison {
    /// Number of positions, counted from the origin, that agree before the
    /// first disagreement.
    pub matched: usize,
    pub mismatch: Option<Mismatch>,
}

#[derive(Debug, Clone, Copy)]
pub struct PathComparator<'a> {
    graph: &'a RelationshipGraph,
}

impl<'a> PathComparator<'a> {
    pub fn new(graph: &'a RelationshipGraph) -> Self {
        Self { graph }
    }

    /// Compare two origin-first paths. `inference_len` is the number of
    /// origin-side hops of `reconstructed` that were seeded.
    pub fn compare(&self, reference: &[Asn], reconstructed: &[Asn], inference_len: usize) -> HopComparison {
        if reconstructed.is_empty() {
            return HopComparison {
                matched: 0,
                mismatch: Some(Mismatch {
                    hop: 0,
                    kind: MismatchKind::Empty,
                    unexplained_link: false,
                    relation: None,
                }),
            };
        }

        let matched = reference
            .iter()
            .zip(reconstructed)
            .take_while(|(r, e)| r == e)
            .count();

        if matched == reference.len() && matched == reconstructed.len() {
            return HopComparison {
                matched,
                mismatch: None,
            };
        }

        let hop = matched;
        let kind = if hop < inference_len {
            MismatchKind::Seeding
        } else {
            MismatchKind::Propagation
        };
        let (unexplained_link, relation) = match (hop.checked_sub(1), reconstructed.get(hop)) {
            (Some(prev), Some(&asn)) => {
                let relation = self.graph.relation(reconstructed[prev], asn);
                (relation.is_none(), relation)
            }
            _ => (false, None),
        };

        HopComparison {
            matched,
            mismatch: Some(Mismatch {
                hop,
                kind,
                unexplained_link,
                relation,
            }),
        }
    }
}
