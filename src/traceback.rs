//! Reconstruction of an inferred AS path by following parent pointers from the
//! verified AS up to the origin.
use std::collections::HashSet;

use crate::{extrapolation::ParentPointerTable, Asn, Prefix};

/// Longest chain a traceback follows before it is treated as a cycle.
pub const MAX_TRACEBACK_HOPS: usize = 255;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TracebackError {
    /// No pointer stored for an AS on the chain.
    #[error("AS{asn} has no route to {prefix} originated by AS{origin}")]
    Broken { asn: Asn, prefix: Prefix, origin: Asn },
    /// The chain revisits an AS or exceeds the step bound.
    #[error("Traceback of {prefix} looped at AS{asn} after {hops} hops")]
    Cycle { asn: Asn, prefix: Prefix, hops: usize },
}

#[derive(Debug, Clone, Copy)]
pub struct PathReconstructor<'a> {
    table: &'a ParentPointerTable,
    max_hops: usize,
}

impl<'a> PathReconstructor<'a> {
    pub fn new(table: &'a ParentPointerTable) -> Self {
        Self {
            table,
            max_hops: MAX_TRACEBACK_HOPS,
        }
    }

    pub fn with_max_hops(mut self, max_hops: usize) -> Self {
        self.max_hops = max_hops;
        self
    }

    /// Path from `start` to `origin`, both inclusive.
    pub fn reconstruct(&self, start: Asn, prefix: Prefix, origin: Asn) -> Result<Vec<Asn>, TracebackError> {
        let mut path = vec![start];
        if start == origin {
            return Ok(path);
        }

        let mut visited = HashSet::from([start]);
        let mut current = start;
        loop {
            let parent = self
                .table
                .parent(current, prefix, origin)
                .ok_or(TracebackError::Broken {
                    asn: current,
                    prefix,
                    origin,
                })?;

            if !visited.insert(parent) || path.len() >= self.max_hops {
                return Err(TracebackError::Cycle {
                    asn: parent,
                    prefix,
                    hops: path.len(),
                });
            }
            path.push(parent);

            if parent == origin {
                return Ok(path);
            }
            current = parent;
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn prefix() -> Prefix {
        "10.0.0.0/8".parse().unwrap()
    }

    fn table(pointers: &[(Asn, Asn, Asn)]) -> ParentPointerTable {
        pointers
            .iter()
            .map(|&(asn, origin, parent)| ((asn, prefix(), origin), parent))
            .collect()
    }

    #[test]
    fn follows_pointers_to_origin() {
        let table = table(&[(100, 1, 50), (50, 1, 1)]);

        let path = PathReconstructor::new(&table).reconstruct(100, prefix(), 1);

        assert_eq!(path, Ok(vec![100, 50, 1]));
    }

    #[test]
    fn start_at_origin() {
        let table = table(&[(1, 1, 1)]);

        let path = PathReconstructor::new(&table).reconstruct(1, prefix(), 1);

        assert_eq!(path, Ok(vec![1]));
    }

    #[test]
    fn broken_chain() {
        let table = table(&[(100, 1, 50), (50, 1, 40)]);

        let path = PathReconstructor::new(&table).reconstruct(100, prefix(), 1);

        assert_eq!(
            path,
            Err(TracebackError::Broken {
                asn: 40,
                prefix: prefix(),
                origin: 1
            })
        );
    }

    #[test]
    fn pointer_for_other_origin_is_ignored() {
        let table = table(&[(100, 2, 1)]);

        let path = PathReconstructor::new(&table).reconstruct(100, prefix(), 1);

        assert!(matches!(path, Err(TracebackError::Broken { asn: 100, .. })));
    }

    #[test]
    fn cycle_is_detected() {
        /*
         * 100 -> 50 -> 40 -> 50 -> ...
         */
        let table = table(&[(100, 1, 50), (50, 1, 40), (40, 1, 50)]);

        let path = PathReconstructor::new(&table).reconstruct(100, prefix(), 1);

        assert_eq!(
            path,
            Err(TracebackError::Cycle {
                asn: 50,
                prefix: prefix(),
                hops: 3
            })
        );
    }

    #[test]
    fn self_loop_is_detected() {
        let table = table(&[(100, 1, 100)]);

        let path = PathReconstructor::new(&table).reconstruct(100, prefix(), 1);

        assert!(matches!(path, Err(TracebackError::Cycle { asn: 100, .. })));
    }

    #[test]
    fn long_chain_hits_the_step_bound() {
        // 1000 -> 999 -> ... -> 2 -> 1
        let pointers: Vec<_> = (2..=1000).map(|asn| (asn, 1, asn - 1)).collect();
        let table = table(&pointers);
        let reconstructor = PathReconstructor::new(&table);

        let path = reconstructor.reconstruct(1000, prefix(), 1);
        assert!(matches!(path, Err(TracebackError::Cycle { hops, .. }) if hops <= MAX_TRACEBACK_HOPS));

        let path = reconstructor.reconstruct(200, prefix(), 1).unwrap();
        assert_eq!(path.len(), 200);
        assert_eq!(path.first(), Some(&200));
        assert_eq!(path.last(), Some(&1));
    }

    #[test]
    fn custom_step_bound() {
        let table = table(&[(100, 1, 50), (50, 1, 40), (40, 1, 1)]);

        let short = PathReconstructor::new(&table).with_max_hops(3);
        assert!(matches!(
            short.reconstruct(100, prefix(), 1),
            Err(TracebackError::Cycle { hops: 3, .. })
        ));

        let exact = PathReconstructor::new(&table).with_max_hops(4);
        assert_eq!(exact.reconstruct(100, prefix(), 1), Ok(vec![100, 50, 40, 1]));
    }
}
