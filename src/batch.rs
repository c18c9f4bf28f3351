//! Parallel execution of independent `(AS, variant)` runs.
//!
//! Every job loads its own inputs and owns its statistics. Jobs only share the
//! read-only relationship graph and, per variant, an append-only sink that
//! receives whole records.
use std::{
    collections::HashMap,
    fs::{self, File, OpenOptions},
    io::{BufWriter, Write},
    sync::{Mutex, PoisonError},
};

use rayon::prelude::*;

use crate::{
    accumulator::RunSummary,
    config::Config,
    extrapolation::Variant,
    record::write_record,
    run::VerificationRun,
    store::Store,
    topology::RelationshipGraph,
    Asn, Error,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Job {
    pub asn: Asn,
    pub variant: Variant,
}

impl Job {
    /// Every combination of the given ASes and variants.
    pub fn product(asns: &[Asn], variants: &[Variant]) -> Vec<Job> {
        asns.iter()
            .flat_map(|&asn| variants.iter().map(move |&variant| Job { asn, variant }))
            .collect()
    }
}

/// A job that could not be completed.
#[derive(Debug)]
pub struct JobFailure {
    pub job: Job,
    pub error: Error,
}

/// One append-only writer per variant.
pub struct RecordSinks<W> {
    sinks: HashMap<Variant, Mutex<W>>,
}

impl<W: Write> RecordSinks<W> {
    pub fn new(sinks: impl IntoIterator<Item = (Variant, W)>) -> Self {
        Self {
            sinks: sinks
                .into_iter()
                .map(|(variant, w)| (variant, Mutex::new(w)))
                .collect(),
        }
    }

    /// Append the record of `summary` to the sink of its variant.
    pub fn append(&self, summary: &RunSummary) -> Result<(), Error> {
        let sink = self
            .sinks
            .get(&summary.variant)
            .ok_or(Error::MissingSink(summary.variant))?;
        let mut w = sink.lock().unwrap_or_else(PoisonError::into_inner);
        write_record(&mut *w, summary)?;
        w.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> HashMap<Variant, W> {
        self.sinks
            .into_iter()
            .map(|(variant, w)| (variant, w.into_inner().unwrap_or_else(PoisonError::into_inner)))
            .collect()
    }
}

impl RecordSinks<BufWriter<File>> {
    /// Open the result file of every configured variant for appending.
    pub fn open(config: &Config) -> Result<Self, Error> {
        fs::create_dir_all(&config.output_dir)?;
        let sinks = config
            .variants
            .iter()
            .map(|&variant| {
                let path = config.output_file(variant);
                log::info!("Appending {variant} results to {}", path.display());
                let file = OpenOptions::new().create(true).append(true).open(path)?;
                Ok((variant, BufWriter::new(file)))
            })
            .collect::<Result<Vec<_>, Error>>()?;
        Ok(Self::new(sinks))
    }
}

/// Load the inputs of `job` and verify it.
pub fn run_job(
    store: &Store,
    graph: &RelationshipGraph,
    job: Job,
    max_hops: usize,
) -> Result<RunSummary, Error> {
    let reference = store.reference_set(job.asn)?;
    let extrapolation = store.extrapolation_set(job.asn, job.variant)?;
    Ok(VerificationRun::new(job.asn, job.variant, graph)
        .with_max_hops(max_hops)
        .execute(&reference, &extrapolation))
}

/// Run all jobs on the current rayon pool, appending each finished run to its
/// sink. Failures are returned, never dropped.
pub fn run_batch<W: Write + Send>(
    store: &Store,
    graph: &RelationshipGraph,
    jobs: Vec<Job>,
    max_hops: usize,
    sinks: &RecordSinks<W>,
) -> Vec<Result<RunSummary, JobFailure>> {
    log::info!("Running {} verification jobs", jobs.len());

    jobs.into_par_iter()
        .map(|job| {
            run_job(store, graph, job, max_hops)
                .and_then(|summary| sinks.append(&summary).map(|_| summary))
                .map_err(|error| {
                    log::warn!("AS{} ({}) failed: {error}", job.asn, job.variant);
                    JobFailure { job, error }
                })
        })
        .collect()
}

/// Convenience wrapper: open the data directory, relationships and output
/// files described by `config` and run every configured job.
pub fn run_config(config: &Config) -> Result<Vec<Result<RunSummary, JobFailure>>, Error> {
    let store = Store::new(&config.data_dir);
    let graph = store.relationships(&config.relationships)?;
    let sinks = RecordSinks::open(config)?;
    let jobs = Job::product(&config.asns, &config.variants);
    Ok(run_batch(&store, &graph, jobs, config.max_traceback_hops, &sinks))
}

/// Write the inputs of a small verification scenario into `dir`.
#[cfg(test)]
pub(crate) fn write_fixture(dir: &std::path::Path) {
    fs::write(
        dir.join("verify_ctrl_100.csv"),
        "prefix,origin,as_path\n\
         10.0.0.0/8,1,100 50 1\n\
         10.1.0.0/16,1,100 50 1\n\
         10.2.0.0/16,2,100 2\n",
    )
    .unwrap();
    fs::write(
        dir.join("verify_data_100.csv"),
        "asn,prefix,origin,received_from\n\
         100,10.0.0.0/8,1,50\n\
         50,10.0.0.0/8,1,1\n\
         100,10.1.0.0/16,1,60\n\
         60,10.1.0.0/16,1,1\n",
    )
    .unwrap();
    fs::write(
        dir.join("verify_data_100_oo.csv"),
        "prefix,origin,as_path,inference_len\n\
         10.0.0.0/8,1,100 50 1,1\n\
         10.1.0.0/16,1,100 50 1,1\n\
         10.2.0.0/16,2,100 2,1\n",
    )
    .unwrap();
    fs::write(dir.join("as-rel.txt"), "# test\n50|1|-1\n50|100|-1\n60|100|0\n").unwrap();
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::record::read_records;

    #[test]
    fn job_product() {
        let jobs = Job::product(&[1, 2], &[Variant::Full, Variant::OriginOnly]);

        assert_eq!(jobs.len(), 4);
        assert!(jobs.contains(&Job {
            asn: 2,
            variant: Variant::OriginOnly
        }));
    }

    #[test]
    fn batch_writes_one_record_per_run() {
        let dir = tempfile::tempdir().unwrap();
        write_fixture(dir.path());
        let store = Store::new(dir.path());
        let graph = store.relationships("as-rel.txt").unwrap();
        let sinks = RecordSinks::new(vec![(Variant::Full, Vec::new()), (Variant::OriginOnly, Vec::new())]);

        let results = run_batch(
            &store,
            &graph,
            Job::product(&[100], &[Variant::Full, Variant::OriginOnly]),
            255,
            &sinks,
        );
        assert!(results.iter().all(Result::is_ok));

        let outputs = sinks.into_inner();

        let full = read_records(outputs[&Variant::Full].as_slice()).unwrap();
        assert_eq!(full.len(), 1);
        assert_eq!(full[0].asn, 100);
        assert_eq!(full[0].total_prefixes, 3);
        // 10.1.0.0/16 goes via 60, 10.2.0.0/16 is missing
        assert_eq!(full[0].verifiable_prefixes, 1);
        assert_eq!(full[0].failures.compare, 1);
        assert_eq!(full[0].failures.missing_reference, 1);
        assert_eq!(full[0].distances, vec![0, 1, 2]);

        let origin_only = read_records(outputs[&Variant::OriginOnly].as_slice()).unwrap();
        assert_eq!(origin_only[0].verifiable_prefixes, 3);
        assert_eq!(origin_only[0].avg_distance, 0.0);
    }

    #[test]
    fn failed_load_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        write_fixture(dir.path());
        let store = Store::new(dir.path());
        let graph = RelationshipGraph::default();
        let sinks = RecordSinks::new(vec![(Variant::NoPropagation, Vec::new())]);

        let results = run_batch(
            &store,
            &graph,
            vec![
                Job {
                    asn: 100,
                    variant: Variant::NoPropagation,
                },
                Job {
                    asn: 200,
                    variant: Variant::NoPropagation,
                },
            ],
            255,
            &sinks,
        );

        assert_eq!(results.len(), 2);
        assert!(results
            .iter()
            .all(|r| matches!(r, Err(JobFailure { error: Error::Load(_), .. }))));
        assert!(sinks.into_inner()[&Variant::NoPropagation].is_empty());
    }

    #[test]
    fn missing_sink() {
        let dir = tempfile::tempdir().unwrap();
        write_fixture(dir.path());
        let store = Store::new(dir.path());
        let graph = store.relationships("as-rel.txt").unwrap();
        let sinks = RecordSinks::new(vec![(Variant::Full, Vec::new())]);

        let results = run_batch(
            &store,
            &graph,
            vec![Job {
                asn: 100,
                variant: Variant::OriginOnly,
            }],
            255,
            &sinks,
        );

        assert!(matches!(
            &results[0],
            Err(JobFailure {
                error: Error::MissingSink(Variant::OriginOnly),
                ..
            })
        ));
    }

    #[test]
    fn run_from_config() {
        let dir = tempfile::tempdir().unwrap();
        write_fixture(dir.path());
        let config = Config {
            data_dir: dir.path().to_path_buf(),
            output_dir: dir.path().join("results"),
            relationships: "as-rel.txt".into(),
            asns: vec![100],
            variants: vec![Variant::Full],
            ..Config::default()
        };

        let results = run_config(&config).unwrap();
        assert_eq!(results.len(), 1);

        // appending a second batch keeps the first record
        run_config(&config).unwrap();
        let records = read_records(std::io::BufReader::new(
            File::open(config.output_file(Variant::Full)).unwrap(),
        ))
        .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0], records[1]);
    }
}
