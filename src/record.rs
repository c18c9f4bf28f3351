//! Delimited result records, one per `(AS, variant)` run.
//!
//! A record is a fixed sequence of lines. Downstream tooling reads them by
//! position, so the order of [`RecordField::ORDER`] must not change.
use std::{
    fmt,
    io::{BufRead, Write},
    str::FromStr,
};

use crate::{
    accumulator::{FailureCounts, RunSummary},
    extrapolation::Variant,
    Asn, HOP_SLOTS,
};

#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Record ends before field {field} (line {line})")]
    Truncated { field: RecordField, line: usize },
    #[error("Cannot parse field {field} on line {line}: {reason}")]
    Malformed {
        field: RecordField,
        line: usize,
        reason: String,
    },
}

/// Lines of a record, in the order they are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordField {
    /// `asn,variant`
    Identifier,
    /// `totalPrefixes,verifiablePrefixes`
    Prefixes,
    /// `avgRefLen,maxRefLen`
    ReferenceLength,
    /// `avgExtLen,maxExtLen`
    ExtrapolatedLength,
    Success,
    Failure,
    /// `missingReference,originMismatch,tracebackFailure,compareFailure`
    FailureKinds,
    AverageDistance,
    Distances,
    MissingRelationship,
    Seeding,
    Propagation,
}

impl RecordField {
    pub const ORDER: [RecordField; 12] = [
        RecordField::Identifier,
        RecordField::Prefixes,
        RecordField::ReferenceLength,
        RecordField::ExtrapolatedLength,
        RecordField::Success,
        RecordField::Failure,
        RecordField::FailureKinds,
        RecordField::AverageDistance,
        RecordField::Distances,
        RecordField::MissingRelationship,
        RecordField::Seeding,
        RecordField::Propagation,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Identifier => "identifier",
            Self::Prefixes => "prefixes",
            Self::ReferenceLength => "reference_length",
            Self::ExtrapolatedLength => "extrapolated_length",
            Self::Success => "success",
            Self::Failure => "failure",
            Self::FailureKinds => "failure_kinds",
            Self::AverageDistance => "average_distance",
            Self::Distances => "distances",
            Self::MissingRelationship => "missing_relationship",
            Self::Seeding => "seeding",
            Self::Propagation => "propagation",
        }
    }

    fn render(&self, s: &RunSummary) -> String {
        match self {
            Self::Identifier => format!("{},{}", s.asn, s.variant),
            Self::Prefixes => format!("{},{}", s.total_prefixes, s.verifiable_prefixes),
            Self::ReferenceLength => format!("{},{}", s.avg_ref_len, s.max_ref_len),
            Self::ExtrapolatedLength => format!("{},{}", s.avg_ext_len, s.max_ext_len),
            Self::Success => join(&s.success),
            Self::Failure => join(&s.failure),
            // cycles are a kind of traceback failure in the record layout
            Self::FailureKinds => join(&[
                s.failures.missing_reference,
                s.failures.origin_mismatch,
                s.failures.traceback + s.failures.cycle,
                s.failures.compare,
            ]),
            Self::AverageDistance => s.avg_distance.to_string(),
            Self::Distances => join(&s.distances),
            Self::MissingRelationship => s.missing_relationship.to_string(),
            Self::Seeding => join(&s.seeding),
            Self::Propagation => join(&s.propagation),
        }
    }

    /// Parse `line` into the part of `s` this field covers.
    fn apply(&self, s: &mut RunSummary, line: &str, n: usize) -> Result<(), RecordError> {
        let err = |reason: String| RecordError::Malformed {
            field: *self,
            line: n,
            reason,
        };
        match self {
            Self::Identifier => {
                let (asn, variant) = line
                    .split_once(',')
                    .ok_or_else(|| err("expected `asn,variant`".to_string()))?;
                s.asn = parse(asn).map_err(err)?;
                s.variant = variant.trim().parse().map_err(err)?;
            }
            Self::Prefixes => {
                let [total, verifiable] = parse_n::<2>(line).map_err(err)?;
                s.total_prefixes = total;
                s.verifiable_prefixes = verifiable;
            }
            Self::ReferenceLength => {
                let (avg, max) = parse_pair(line).map_err(err)?;
                s.avg_ref_len = avg;
                s.max_ref_len = max;
            }
            Self::ExtrapolatedLength => {
                let (avg, max) = parse_pair(line).map_err(err)?;
                s.avg_ext_len = avg;
                s.max_ext_len = max;
            }
            Self::Success => s.success = parse_n(line).map_err(err)?,
            Self::Failure => s.failure = parse_n(line).map_err(err)?,
            Self::FailureKinds => {
                let [missing_reference, origin_mismatch, traceback, compare] = parse_n::<4>(line).map_err(err)?;
                s.failures = FailureCounts {
                    missing_reference,
                    origin_mismatch,
                    traceback,
                    cycle: 0,
                    compare,
                };
            }
            Self::AverageDistance => s.avg_distance = parse(line).map_err(err)?,
            Self::Distances => s.distances = parse_list(line).map_err(err)?,
            Self::MissingRelationship => s.missing_relationship = parse(line).map_err(err)?,
            Self::Seeding => s.seeding = parse_n(line).map_err(err)?,
            Self::Propagation => s.propagation = parse_n(line).map_err(err)?,
        }
        Ok(())
    }
}

impl fmt::Display for RecordField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn join<T: ToString>(values: &[T]) -> String {
    values.iter().map(T::to_string).collect::<Vec<_>>().join(",")
}

fn parse<T>(value: &str) -> Result<T, String>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| format!("{value:?}: {e}"))
}

fn parse_list<T>(line: &str) -> Result<Vec<T>, String>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    if line.trim().is_empty() {
        return Ok(Vec::new());
    }
    line.split(',').map(parse).collect()
}

fn parse_n<const N: usize>(line: &str) -> Result<[usize; N], String> {
    let values = parse_list::<usize>(line)?;
    let len = values.len();
    values
        .try_into()
        .map_err(|_| format!("expected {N} values, found {len}"))
}

fn parse_pair(line: &str) -> Result<(f64, usize), String> {
    let (avg, max) = line
        .split_once(',')
        .ok_or_else(|| "expected `average,maximum`".to_string())?;
    Ok((parse(avg)?, parse(max)?))
}

/// Append one record to `w`.
pub fn write_record(w: &mut impl Write, summary: &RunSummary) -> std::io::Result<()> {
    for field in RecordField::ORDER {
        writeln!(w, "{}", field.render(summary))?;
    }
    Ok(())
}

/// Read every record from `reader`.
///
/// The traceback count read back includes cycle failures, which the record
/// layout does not keep apart.
pub fn read_records(reader: impl BufRead) -> Result<Vec<RunSummary>, RecordError> {
    let mut lines = reader.lines().enumerate();
    let mut records = Vec::new();

    loop {
        let mut summary = empty_summary();
        for (i, field) in RecordField::ORDER.iter().enumerate() {
            let (n, line) = match lines.next() {
                Some((n, line)) => (n + 1, line?),
                None if i == 0 => return Ok(records),
                None => {
                    return Err(RecordError::Truncated {
                        field: *field,
                        line: records.len() * RecordField::ORDER.len() + i + 1,
                    })
                }
            };
            field.apply(&mut summary, &line, n)?;
        }
        records.push(summary);
    }
}

fn empty_summary() -> RunSummary {
    RunSummary {
        asn: Asn::default(),
        variant: Variant::Full,
        total_prefixes: 0,
        verifiable_prefixes: 0,
        avg_ref_len: 0.0,
        max_ref_len: 0,
        avg_ext_len: 0.0,
        max_ext_len: 0,
        success: [0; HOP_SLOTS],
        failure: [0; HOP_SLOTS],
        failures: FailureCounts::default(),
        avg_distance: 0.0,
        distances: Vec::new(),
        missing_relationship: 0,
        seeding: [0; HOP_SLOTS],
        propagation: [0; HOP_SLOTS],
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn summary() -> RunSummary {
        RunSummary {
            asn: 13030,
            variant: Variant::OriginOnly,
            total_prefixes: 5,
            verifiable_prefixes: 2,
            avg_ref_len: 3.5,
            max_ref_len: 6,
            avg_ext_len: 4.25,
            max_ext_len: 7,
            success: [4, 3, 2, 1, 0, 0, 0, 0, 0, 0],
            failure: [0, 1, 1, 0, 0, 0, 0, 0, 0, 0],
            failures: FailureCounts {
                missing_reference: 1,
                origin_mismatch: 1,
                traceback: 0,
                cycle: 0,
                compare: 1,
            },
            avg_distance: 1.2,
            distances: vec![0, 3, 2, 1],
            missing_relationship: 1,
            seeding: [0, 1, 0, 0, 0, 0, 0, 0, 0, 0],
            propagation: [0, 0, 1, 0, 0, 0, 0, 0, 0, 0],
        }
    }

    #[test]
    fn layout() {
        let mut out = Vec::new();
        write_record(&mut out, &summary()).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert_eq!(
            text.lines().collect::<Vec<_>>(),
            vec![
                "13030,origin_only",
                "5,2",
                "3.5,6",
                "4.25,7",
                "4,3,2,1,0,0,0,0,0,0",
                "0,1,1,0,0,0,0,0,0,0",
                "1,1,0,1",
                "1.2",
                "0,3,2,1",
                "1",
                "0,1,0,0,0,0,0,0,0,0",
                "0,0,1,0,0,0,0,0,0,0",
            ]
        );
    }

    #[test]
    fn read_back_several_records() {
        let mut first = summary();
        first.failures.cycle = 2;
        let mut second = summary();
        second.asn = 6453;
        second.variant = Variant::Full;
        second.distances.clear();

        let mut out = Vec::new();
        write_record(&mut out, &first).unwrap();
        write_record(&mut out, &second).unwrap();

        let records = read_records(out.as_slice()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].failures.traceback, 2);
        assert_eq!(records[0].failures.cycle, 0);
        assert_eq!(records[0].distances, vec![0, 3, 2, 1]);
        assert_eq!(records[1], second);
    }

    #[test]
    fn truncated_record() {
        let mut out = Vec::new();
        write_record(&mut out, &summary()).unwrap();
        let text = String::from_utf8(out).unwrap();
        let cut = text.lines().take(5).collect::<Vec<_>>().join("\n");

        let err = read_records(cut.as_bytes()).unwrap_err();
        assert!(matches!(
            err,
            RecordError::Truncated {
                field: RecordField::Failure,
                line: 6
            }
        ));
    }

    #[test]
    fn malformed_record() {
        let text = "13030,origin_only\n5,2\n3.5,6\n4.25,7\n1,2,3\n";

        let err = read_records(text.as_bytes()).unwrap_err();
        assert!(matches!(
            err,
            RecordError::Malformed {
                field: RecordField::Success,
                line: 5,
                ..
            }
        ));

        let err = read_records("13030,everything\n".as_bytes()).unwrap_err();
        assert!(matches!(
            err,
            RecordError::Malformed {
                field: RecordField::Identifier,
                ..
            }
        ));
    }

    #[test]
    fn empty_input() {
        assert!(read_records("".as_bytes()).unwrap().is_empty());
    }
}
