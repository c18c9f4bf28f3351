//! Online statistics of one verification run.
use crate::{
    compare::{HopComparison, MismatchKind},
    extrapolation::Variant,
    Asn, HOP_SLOTS,
};

/// Incrementally updated arithmetic mean.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct RunningMean {
    mean: f64,
    count: usize,
}

impl RunningMean {
    pub fn push(&mut self, x: f64) {
        self.count += 1;
        self.mean += (x - self.mean) / self.count as f64;
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    pub fn count(&self) -> usize {
        self.count
    }
}

/// Non-fatal reasons a prefix could not be verified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// The extrapolation has no entry for the prefix at this AS.
    MissingReference,
    /// The entry was announced by a different origin than the observed one.
    OriginMismatch,
    /// The parent-pointer chain breaks before the origin.
    Traceback,
    /// The parent-pointer chain loops or exceeds the step bound.
    Cycle,
    /// The path was reconstructed but differs from the observed one.
    Compare,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FailureCounts {
    pub missing_reference: usize,
    pub origin_mismatch: usize,
    pub traceback: usize,
    pub cycle: usize,
    pub compare: usize,
}

impl FailureCounts {
    pub fn get(&self, kind: FailureKind) -> usize {
        match kind {
            FailureKind::MissingReference => self.missing_reference,
            FailureKind::OriginMismatch => self.origin_mismatch,
            FailureKind::Traceback => self.traceback,
            FailureKind::Cycle => self.cycle,
            FailureKind::Compare => self.compare,
        }
    }

    fn slot(&mut self, kind: FailureKind) -> &mut usize {
        match kind {
            FailureKind::MissingReference => &mut self.missing_reference,
            FailureKind::OriginMismatch => &mut self.origin_mismatch,
            FailureKind::Traceback => &mut self.traceback,
            FailureKind::Cycle => &mut self.cycle,
            FailureKind::Compare => &mut self.compare,
        }
    }
}

/// Mutable statistics of one `(AS, variant)` run.
///
/// Every running mean has its own counter and only advances on observations
/// that are valid for that metric.
#[derive(Debug, Clone)]
pub struct RunAccumulator {
    total_prefixes: usize,
    verifiable: usize,
    success: [usize; HOP_SLOTS],
    failure: [usize; HOP_SLOTS],
    seeding: [usize; HOP_SLOTS],
    propagation: [usize; HOP_SLOTS],
    missing_relationship: usize,
    failures: FailureCounts,
    ref_len: RunningMean,
    max_ref_len: usize,
    ext_len: RunningMean,
    max_ext_len: usize,
    distance: RunningMean,
    distances: Vec<usize>,
}

impl RunAccumulator {
    /// Start a run over `total_prefixes` prefixes, all of them initially
    /// considered verifiable.
    pub fn new(total_prefixes: usize) -> Self {
        Self {
            total_prefixes,
            verifiable: total_prefixes,
            success: [0; HOP_SLOTS],
            failure: [0; HOP_SLOTS],
            seeding: [0; HOP_SLOTS],
            propagation: [0; HOP_SLOTS],
            missing_relationship: 0,
            failures: FailureCounts::default(),
            ref_len: RunningMean::default(),
            max_ref_len: 0,
            ext_len: RunningMean::default(),
            max_ext_len: 0,
            distance: RunningMean::default(),
            distances: Vec::new(),
        }
    }

    pub fn observe_reference_len(&mut self, len: usize) {
        self.ref_len.push(len as f64);
        self.max_ref_len = self.max_ref_len.max(len);
    }

    pub fn observe_reconstructed_len(&mut self, len: usize) {
        self.ext_len.push(len as f64);
        self.max_ext_len = self.max_ext_len.max(len);
    }

    pub fn observe_distance(&mut self, distance: usize) {
        self.distance.push(distance as f64);
        self.distances.push(distance);
    }

    /// Tally a failure. The prefix no longer counts as verifiable.
    pub fn record_failure(&mut self, kind: FailureKind) {
        *self.failures.slot(kind) += 1;
        self.verifiable = self.verifiable.saturating_sub(1);
    }

    /// Fold a hop comparison into the per-hop vectors. Hops beyond
    /// `HOP_SLOTS` are not tracked.
    pub fn record_comparison(&mut self, cmp: &HopComparison) {
        for slot in self.success.iter_mut().take(cmp.matched) {
            *slot += 1;
        }

        let Some(mismatch) = cmp.mismatch else {
            return;
        };
        if mismatch.unexplained_link {
            self.missing_relationship += 1;
        }
        if mismatch.hop >= HOP_SLOTS {
            return;
        }
        self.failure[mismatch.hop] += 1;
        match mismatch.kind {
            MismatchKind::Seeding => self.seeding[mismatch.hop] += 1,
            MismatchKind::Propagation => self.propagation[mismatch.hop] += 1,
            MismatchKind::Empty => {}
        }
    }

    pub fn verifiable(&self) -> usize {
        self.verifiable
    }

    pub fn failures(&self) -> &FailureCounts {
        &self.failures
    }

    pub fn finish(self, asn: Asn, variant: Variant) -> RunSummary {
        RunSummary {
            asn,
            variant,
            total_prefixes: self.total_prefixes,
            verifiable_prefixes: self.verifiable,
            avg_ref_len: self.ref_len.mean(),
            max_ref_len: self.max_ref_len,
            avg_ext_len: self.ext_len.mean(),
            max_ext_len: self.max_ext_len,
            success: self.success,
            failure: self.failure,
            failures: self.failures,
            avg_distance: self.distance.mean(),
            distances: self.distances,
            missing_relationship: self.missing_relationship,
            seeding: self.seeding,
            propagation: self.propagation,
        }
    }
}

/// Finalized, immutable snapshot of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub asn: Asn,
    pub variant: Variant,
    pub total_prefixes: usize,
    pub verifiable_prefixes: usize,
    pub avg_ref_len: f64,
    pub max_ref_len: usize,
    pub avg_ext_len: f64,
    pub max_ext_len: usize,
    pub success: [usize; HOP_SLOTS],
    pub failure: [usize; HOP_SLOTS],
    pub failures: FailureCounts,
    pub avg_distance: f64,
    pub distances: Vec<usize>,
    pub missing_relationship: usize,
    pub seeding: [usize; HOP_SLOTS],
    pub propagation: [usize; HOP_SLOTS],
}

impl RunSummary {
    pub fn total_distance(&self) -> usize {
        self.distances.iter().sum()
    }
}
