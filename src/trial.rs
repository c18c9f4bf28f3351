//! Comparison of variants over many verified ASes.
//!
//! A trial is the set of records one variant produced. Trials are compared on
//! the per-AS average edit distance with Welch's t-test.
use std::{fs::File, io::BufReader, path::Path};

use statrs::{
    distribution::{ContinuousCDF, StudentsT},
    statistics::Statistics,
};

use crate::{
    accumulator::RunSummary,
    extrapolation::Variant,
    record::{read_records, RecordError},
    HOP_SLOTS,
};

/// Records of one variant.
#[derive(Debug, Clone)]
pub struct Trial {
    pub variant: Variant,
    pub runs: Vec<RunSummary>,
}

impl Trial {
    /// Load a result file, keeping only the records of `variant`.
    pub fn load(variant: Variant, path: impl AsRef<Path>) -> Result<Self, RecordError> {
        let file = File::open(path.as_ref())?;
        let runs: Vec<RunSummary> = read_records(BufReader::new(file))?
            .into_iter()
            .filter(|run| run.variant == variant)
            .collect();
        log::debug!(
            "Loaded {} {variant} runs from {}",
            runs.len(),
            path.as_ref().display()
        );
        Ok(Self { variant, runs })
    }

    /// Average edit distance of every run.
    pub fn avg_distances(&self) -> Vec<f64> {
        self.runs.iter().map(|run| run.avg_distance).collect()
    }

    /// Sum of the per-hop success counts over all runs.
    pub fn success_by_hop(&self) -> [usize; HOP_SLOTS] {
        let mut total = [0; HOP_SLOTS];
        for run in &self.runs {
            for (t, s) in total.iter_mut().zip(run.success) {
                *t += s;
            }
        }
        total
    }

    /// Fraction of all prefixes that were verifiable.
    pub fn verifiable_ratio(&self) -> f64 {
        let total: usize = self.runs.iter().map(|run| run.total_prefixes).sum();
        let verifiable: usize = self.runs.iter().map(|run| run.verifiable_prefixes).sum();
        if total == 0 {
            return 0.0;
        }
        verifiable as f64 / total as f64
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TTest {
    pub t: f64,
    pub df: f64,
    /// Two-sided p-value.
    pub p_value: f64,
}

/// Welch's unequal-variance t-test. `None` if either sample has fewer than two
/// values or both have zero variance.
pub fn welch_t_test(a: &[f64], b: &[f64]) -> Option<TTest> {
    if a.len() < 2 || b.len() < 2 {
        return None;
    }
    let (na, nb) = (a.len() as f64, b.len() as f64);
    let (va, vb) = (a.variance() / na, b.variance() / nb);
    if va + vb == 0.0 {
        return None;
    }

    let t = (a.mean() - b.mean()) / (va + vb).sqrt();
    let df = (va + vb).powi(2) / (va.powi(2) / (na - 1.0) + vb.powi(2) / (nb - 1.0));
    let dist = StudentsT::new(0.0, 1.0, df).ok()?;
    let p_value = 2.0 * (1.0 - dist.cdf(t.abs()));

    Some(TTest { t, df, p_value })
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidenceInterval {
    pub mean: f64,
    pub lower: f64,
    pub upper: f64,
}

/// Two-sided confidence interval of the mean of `xs` at `level` (e.g. 0.95),
/// based on Student's t distribution.
pub fn confidence_interval(xs: &[f64], level: f64) -> Option<ConfidenceInterval> {
    if xs.len() < 2 || !(0.0..1.0).contains(&level) {
        return None;
    }
    let n = xs.len() as f64;
    let mean = xs.mean();
    let se = (xs.variance() / n).sqrt();
    let dist = StudentsT::new(0.0, 1.0, n - 1.0).ok()?;
    let half = dist.inverse_cdf(0.5 + level / 2.0) * se;

    Some(ConfidenceInterval {
        mean,
        lower: mean - half,
        upper: mean + half,
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{accumulator::FailureCounts, record::write_record};

    fn run(asn: u32, variant: Variant, avg_distance: f64) -> RunSummary {
        RunSummary {
            asn,
            variant,
            total_prefixes: 10,
            verifiable_prefixes: 6,
            avg_ref_len: 4.0,
            max_ref_len: 7,
            avg_ext_len: 4.0,
            max_ext_len: 8,
            success: [6, 5, 4, 2, 1, 0, 0, 0, 0, 0],
            failure: [0, 1, 1, 2, 1, 0, 0, 0, 0, 0],
            failures: FailureCounts::default(),
            avg_distance,
            distances: vec![],
            missing_relationship: 0,
            seeding: [0; HOP_SLOTS],
            propagation: [0; HOP_SLOTS],
        }
    }

    #[test]
    fn welch() {
        let a = [1.0, 2.0, 3.0, 4.0, 5.0];
        let b = [2.0, 4.0, 6.0, 8.0, 10.0];

        let test = welch_t_test(&a, &b).unwrap();
        assert!((test.t + 1.8974).abs() < 1e-3);
        assert!((test.df - 5.882).abs() < 1e-3);
        assert!(test.p_value > 0.05 && test.p_value < 0.2);

        let same = welch_t_test(&a, &a).unwrap();
        assert!(same.t.abs() < 1e-12);
        assert!((same.p_value - 1.0).abs() < 1e-9);

        assert!(welch_t_test(&[1.0], &b).is_none());
        assert!(welch_t_test(&[1.0, 1.0], &[2.0, 2.0]).is_none());
    }

    #[test]
    fn interval() {
        let ci = confidence_interval(&[1.0, 2.0, 3.0, 4.0, 5.0], 0.95).unwrap();

        assert!((ci.mean - 3.0).abs() < 1e-12);
        assert!((ci.lower - 1.0368).abs() < 1e-2);
        assert!((ci.upper - 4.9632).abs() < 1e-2);

        assert!(confidence_interval(&[1.0], 0.95).is_none());
        assert!(confidence_interval(&[1.0, 2.0], 1.5).is_none());
    }

    #[test]
    fn load_trial() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("full_verified.csv");
        let mut out = File::create(&path).unwrap();
        write_record(&mut out, &run(1, Variant::Full, 1.5)).unwrap();
        write_record(&mut out, &run(2, Variant::OriginOnly, 9.0)).unwrap();
        write_record(&mut out, &run(3, Variant::Full, 0.5)).unwrap();
        drop(out);

        let trial = Trial::load(Variant::Full, &path).unwrap();

        assert_eq!(trial.runs.len(), 2);
        assert_eq!(trial.avg_distances(), vec![1.5, 0.5]);
        assert_eq!(trial.success_by_hop()[..3], [12, 10, 8]);
        assert!((trial.verifiable_ratio() - 0.6).abs() < 1e-12);
    }
}
