//! File-backed data access: bulk loads of the collector announcements, the
//! extrapolation output and the AS relationships.
//!
//! Every table is read completely in one pass and the file is closed before
//! verification starts. A load error is fatal for the run that requested it.
use std::{
    collections::HashMap,
    fs::File,
    io::{self, BufReader},
    path::{Path, PathBuf},
};

use serde::Deserialize;

use crate::{
    extrapolation::{ExtrapolationSet, MaterializedPath, ParentPointerTable, Variant},
    reference::ReferenceSet,
    topology::{RelationshipGraph, TopologyError},
    Asn, Prefix,
};

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("Cannot open {path}: {source}")]
    Open { path: PathBuf, source: io::Error },
    #[error("Cannot read {path}: {source}")]
    Csv { path: PathBuf, source: csv::Error },
    #[error("{path}, row {row}: {reason}")]
    Row {
        path: PathBuf,
        row: usize,
        reason: String,
    },
    #[error("{path}: cannot tell the table format from header {header:?}")]
    UnknownHeader { path: PathBuf, header: String },
    #[error(transparent)]
    Topology(#[from] TopologyError),
}

#[derive(Debug, Deserialize)]
struct AnnouncementRow {
    prefix: Prefix,
    origin: Asn,
    as_path: String,
}

#[derive(Debug, Deserialize)]
struct PointerRow {
    asn: Asn,
    prefix: Prefix,
    origin: Asn,
    received_from: Asn,
}

#[derive(Debug, Deserialize)]
struct MaterializedRow {
    prefix: Prefix,
    origin: Asn,
    as_path: String,
    inference_len: usize,
}

/// Parse an AS path written either space separated (`100 50 1`) or as a
/// database array (`{100,50,1}`).
pub fn parse_as_path(s: &str) -> Result<Vec<Asn>, String> {
    s.trim()
        .trim_start_matches('{')
        .trim_end_matches('}')
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|tok| !tok.is_empty())
        .map(|tok| tok.parse::<Asn>().map_err(|e| format!("invalid ASN {tok:?}: {e}")))
        .collect()
}

/// Directory holding one table per AS and variant.
#[derive(Debug, Clone)]
pub struct Store {
    data_dir: PathBuf,
}

impl Store {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn reference_file(&self, asn: Asn) -> PathBuf {
        self.data_dir.join(format!("verify_ctrl_{asn}.csv"))
    }

    pub fn extrapolation_file(&self, asn: Asn, variant: Variant) -> PathBuf {
        self.data_dir
            .join(format!("verify_data_{asn}{}.csv", variant.table_suffix()))
    }

    /// Announcements observed at the collector `asn`, one path per prefix.
    pub fn reference_set(&self, asn: Asn) -> Result<ReferenceSet, LoadError> {
        let path = self.reference_file(asn);
        let mut reader = open_csv(&path)?;

        let mut announcements = Vec::new();
        for (row, result) in reader.deserialize::<AnnouncementRow>().enumerate() {
            let ann = result.map_err(|source| csv_error(&path, source))?;
            let as_path = parse_as_path(&ann.as_path).map_err(|reason| row_error(&path, row, reason))?;
            announcements.push((ann.prefix, ann.origin, as_path));
        }

        let set = ReferenceSet::observed_by(asn, announcements);
        log::info!(
            "AS{asn}: loaded {} reference paths from {} ({} collapsed)",
            set.len(),
            path.display(),
            set.collapsed()
        );
        Ok(set)
    }

    /// Extrapolation output of `variant` for `asn`, in whichever form the
    /// table was written.
    pub fn extrapolation_set(&self, asn: Asn, variant: Variant) -> Result<ExtrapolationSet, LoadError> {
        let path = self.extrapolation_file(asn, variant);
        let mut reader = open_csv(&path)?;

        let headers = reader.headers().map_err(|source| csv_error(&path, source))?.clone();
        let has = |name: &str| headers.iter().any(|h| h == name);

        let set = if has("received_from") {
            let mut table = ParentPointerTable::new();
            for result in reader.deserialize::<PointerRow>() {
                let p = result.map_err(|source| csv_error(&path, source))?;
                if !table.insert(p.asn, p.prefix, p.origin, p.received_from) {
                    log::trace!("Duplicate pointer for AS{} {} AS{}", p.asn, p.prefix, p.origin);
                }
            }
            ExtrapolationSet::ParentPointers(table)
        } else if has("inference_len") {
            let mut paths = HashMap::new();
            for (row, result) in reader.deserialize::<MaterializedRow>().enumerate() {
                let m = result.map_err(|source| csv_error(&path, source))?;
                let as_path = parse_as_path(&m.as_path).map_err(|reason| row_error(&path, row, reason))?;
                paths.entry(m.prefix).or_insert(MaterializedPath {
                    path: as_path,
                    origin: m.origin,
                    inference_len: m.inference_len,
                });
            }
            ExtrapolationSet::Materialized(paths)
        } else {
            return Err(LoadError::UnknownHeader {
                path,
                header: headers.iter().collect::<Vec<_>>().join(","),
            });
        };

        log::info!(
            "AS{asn} ({variant}): loaded {} extrapolation entries from {}",
            set.len(),
            path.display()
        );
        Ok(set)
    }

    /// AS relationships in CAIDA format. Relative paths are resolved against
    /// the data directory.
    pub fn relationships(&self, file: impl AsRef<Path>) -> Result<RelationshipGraph, LoadError> {
        let path = self.data_dir.join(file);
        if !path.exists() {
            return Err(LoadError::Open {
                path,
                source: io::Error::from(io::ErrorKind::NotFound),
            });
        }
        Ok(RelationshipGraph::from_caida_file(path)?)
    }
}

fn open_csv(path: &Path) -> Result<csv::Reader<BufReader<File>>, LoadError> {
    let file = File::open(path).map_err(|source| LoadError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(BufReader::new(file)))
}

fn csv_error(path: &Path, source: csv::Error) -> LoadError {
    LoadError::Csv {
        path: path.to_path_buf(),
        source,
    }
}

fn row_error(path: &Path, row: usize, reason: String) -> LoadError {
    LoadError::Row {
        path: path.to_path_buf(),
        // header is line 1
        row: row + 2,
        reason,
    }
}
