//! path-verify checks BGP path extrapolation against the AS paths route
//! collectors actually observed. For one AS and one extrapolation variant it
//! reconstructs the inferred path of every prefix the AS observed, compares it
//! hop by hop with the ground truth, and summarises the run.
pub mod accumulator;
pub mod batch;
pub mod compare;
pub mod config;
pub mod distance;
pub mod extrapolation;
pub mod record;
pub mod reference;
pub mod run;
pub mod store;
pub mod topology;
pub mod traceback;
pub mod trial;

/// 32-bit autonomous system number.
pub type Asn = u32;

/// CIDR block used as a lookup key.
pub type Prefix = ipnet::IpNet;

/// Width of the per-hop success and failure vectors.
pub const HOP_SLOTS: usize = 10;

pub use accumulator::{FailureKind, RunAccumulator, RunSummary};
pub use compare::{HopComparison, PathComparator};
pub use distance::DistanceEngine;
pub use extrapolation::{ExtrapolationSet, MaterializedPath, ParentPointerTable, Variant};
pub use reference::{ReferencePath, ReferenceSet};
pub use run::VerificationRun;
pub use topology::{RelType, RelationshipGraph};
pub use traceback::{PathReconstructor, TracebackError, MAX_TRACEBACK_HOPS};

/// Fatal errors. Anything here aborts the `(AS, variant)` run it occurred in.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Cannot load input data: {0}")]
    Load(#[from] store::LoadError),
    #[error("Cannot load AS relationships: {0}")]
    Topology(#[from] topology::TopologyError),
    #[error("Malformed result record: {0}")]
    Record(#[from] record::RecordError),
    #[error("Invalid configuration: {0}")]
    Config(#[from] config::ConfigError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("No output sink for variant {0}")]
    MissingSink(Variant),
}
