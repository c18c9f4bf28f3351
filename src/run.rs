//! Verification of all prefixes one AS observed against one extrapolation
//! variant.
use crate::{
    accumulator::{FailureKind, RunAccumulator, RunSummary},
    compare::{HopComparison, PathComparator},
    distance::DistanceEngine,
    extrapolation::{ExtrapolationSet, Variant},
    reference::{ReferencePath, ReferenceSet},
    topology::RelationshipGraph,
    traceback::{PathReconstructor, TracebackError, MAX_TRACEBACK_HOPS},
    Asn,
};

/// What happened to a single prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrefixOutcome {
    /// The extrapolation holds no route for the prefix at this AS.
    MissingReference,
    /// The extrapolation holds a route, but from another origin.
    OriginMismatch { recorded: Asn },
    /// The parent-pointer chain could not be followed to the origin.
    ReconstructFailed(TracebackError),
    /// The path was reconstructed and compared.
    Compared {
        path: Vec<Asn>,
        comparison: HopComparison,
        distance: usize,
    },
}

/// Verification state of one `(AS, variant)` pair.
///
/// A run owns its distance cache; nothing is shared with other runs except the
/// read-only relationship graph.
pub struct VerificationRun<'a> {
    asn: Asn,
    variant: Variant,
    graph: &'a RelationshipGraph,
    max_hops: usize,
    distances: DistanceEngine,
}

impl<'a> VerificationRun<'a> {
    pub fn new(asn: Asn, variant: Variant, graph: &'a RelationshipGraph) -> Self {
        Self {
            asn,
            variant,
            graph,
            max_hops: MAX_TRACEBACK_HOPS,
            distances: DistanceEngine::new(),
        }
    }

    /// Bound on the number of hops a traceback may follow.
    pub fn with_max_hops(mut self, max_hops: usize) -> Self {
        self.max_hops = max_hops;
        self
    }

    /// Verify every reference path and return the finalized statistics.
    pub fn execute(mut self, reference: &ReferenceSet, extrapolation: &ExtrapolationSet) -> RunSummary {
        log::info!(
            "AS{} ({}): verifying {} prefixes against {} extrapolation entries",
            self.asn,
            self.variant,
            reference.len(),
            extrapolation.len()
        );

        let mut acc = RunAccumulator::new(reference.len());
        for path in reference.iter() {
            self.verify_prefix(&mut acc, path, extrapolation);
        }

        log::debug!(
            "AS{} ({}): distance cache holds {} entries, {} hits",
            self.asn,
            self.variant,
            self.distances.cache_len(),
            self.distances.cache_hits()
        );

        let summary = acc.finish(self.asn, self.variant);
        log::info!(
            "AS{} ({}): {}/{} verifiable, average edit distance {:.3}",
            summary.asn,
            summary.variant,
            summary.verifiable_prefixes,
            summary.total_prefixes,
            summary.avg_distance
        );
        summary
    }

    /// Verify a single prefix and fold the result into `acc`.
    pub fn verify_prefix(
        &mut self,
        acc: &mut RunAccumulator,
        reference: &ReferencePath,
        extrapolation: &ExtrapolationSet,
    ) -> PrefixOutcome {
        acc.observe_reference_len(reference.len());

        let outcome = match extrapolation {
            ExtrapolationSet::ParentPointers(table) => {
                let origins = table.origins_at(self.asn, reference.prefix);
                match origins.first() {
                    None => PrefixOutcome::MissingReference,
                    Some(&recorded) if !origins.contains(&reference.origin) => {
                        PrefixOutcome::OriginMismatch { recorded }
                    }
                    Some(_) => {
                        match PathReconstructor::new(table)
                            .with_max_hops(self.max_hops)
                            .reconstruct(self.asn, reference.prefix, reference.origin)
                        {
                            Ok(path) => self.compare(reference, path, 0),
                            Err(e) => PrefixOutcome::ReconstructFailed(e),
                        }
                    }
                }
            }
            ExtrapolationSet::Materialized(paths) => match paths.get(&reference.prefix) {
                None => PrefixOutcome::MissingReference,
                Some(m) if m.origin != reference.origin => PrefixOutcome::OriginMismatch { recorded: m.origin },
                Some(m) => self.compare(reference, m.path.clone(), m.inference_len),
            },
        };

        match &outcome {
            PrefixOutcome::MissingReference => {
                log::debug!("AS{}: no extrapolated route for {}", self.asn, reference.prefix);
                acc.record_failure(FailureKind::MissingReference);
                acc.observe_distance(reference.len());
            }
            PrefixOutcome::OriginMismatch { recorded } => {
                log::debug!(
                    "AS{}: {} extrapolated from AS{recorded}, observed from AS{}",
                    self.asn,
                    reference.prefix,
                    reference.origin
                );
                acc.record_failure(FailureKind::OriginMismatch);
                acc.observe_distance(reference.len());
            }
            PrefixOutcome::ReconstructFailed(e) => {
                log::debug!("AS{}: {e}", self.asn);
                acc.record_failure(match e {
                    TracebackError::Broken { .. } => FailureKind::Traceback,
                    TracebackError::Cycle { .. } => FailureKind::Cycle,
                });
            }
            PrefixOutcome::Compared {
                path,
                comparison,
                distance,
            } => {
                acc.observe_reconstructed_len(path.len());
                acc.record_comparison(comparison);
                if let Some(m) = comparison.mismatch {
                    log::trace!(
                        "AS{}: {} diverges at hop {} ({:?}, inferred link {:?})",
                        self.asn,
                        reference.prefix,
                        m.hop,
                        m.kind,
                        m.relation
                    );
                }
                acc.observe_distance(*distance);
                if *distance > 0 {
                    log::trace!(
                        "AS{}: {} inferred {:?}, observed {:?}",
                        self.asn,
                        reference.prefix,
                        path,
                        reference.path
                    );
                    acc.record_failure(FailureKind::Compare);
                }
            }
        }

        outcome
    }

    fn compare(&mut self, reference: &ReferencePath, path: Vec<Asn>, inference_len: usize) -> PrefixOutcome {
        let reconstructed: Vec<Asn> = path.iter().rev().copied().collect();
        let comparison =
            PathComparator::new(self.graph).compare(&reference.origin_first(), &reconstructed, inference_len);
        let distance = self.distances.distance(&reference.path, &path);
        PrefixOutcome::Compared {
            path,
            comparison,
            distance,
        }
    }
}
