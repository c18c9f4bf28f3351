use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use path_verify::{
    batch,
    config::Config,
    store::Store,
    trial::{confidence_interval, welch_t_test, Trial},
    Asn, ExtrapolationSet, PathReconstructor, Prefix, Variant,
};

#[derive(Parser)]
#[command(name = "path-verify")]
#[command(about = "Verify extrapolated BGP AS paths against route collector data", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log debug messages
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Verify every configured AS against every configured variant
    Run {
        /// Collector ASes to verify (overrides the configuration)
        #[arg(short, long = "asn")]
        asns: Vec<Asn>,

        /// Variants to verify (overrides the configuration)
        #[arg(long = "variant", value_enum)]
        variants: Vec<Variant>,

        /// Directory holding the input tables
        #[arg(short, long)]
        data_dir: Option<PathBuf>,

        /// Directory the result files are appended to
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// CAIDA AS-relationship file
        #[arg(short, long)]
        relationships: Option<PathBuf>,

        /// Number of worker threads
        #[arg(short = 'j', long)]
        threads: Option<usize>,
    },

    /// Print the extrapolated path of a single prefix
    Trace {
        asn: Asn,
        prefix: Prefix,
        origin: Asn,

        #[arg(long, value_enum, default_value = "full")]
        variant: Variant,

        #[arg(short, long)]
        data_dir: Option<PathBuf>,
    },

    /// Compare the edit distances of the configured variants
    Stats {
        /// Confidence level of the reported intervals
        #[arg(long, default_value_t = 0.95)]
        level: f64,
    },
}

fn init_logging(verbose: bool) {
    let mut builder = pretty_env_logger::formatted_builder();
    builder.filter_level(if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    });
    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }
    builder.init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("Cannot load configuration {}", path.display()))?,
        None => Config::default(),
    };

    match cli.command {
        Commands::Run {
            asns,
            variants,
            data_dir,
            output_dir,
            relationships,
            threads,
        } => {
            if !asns.is_empty() {
                config.asns = asns;
            }
            if !variants.is_empty() {
                config.variants = variants;
            }
            config.data_dir = data_dir.unwrap_or(config.data_dir);
            config.output_dir = output_dir.unwrap_or(config.output_dir);
            config.relationships = relationships.unwrap_or(config.relationships);
            config.threads = threads.unwrap_or(config.threads);
            config.validate()?;
            run(&config)
        }
        Commands::Trace {
            asn,
            prefix,
            origin,
            variant,
            data_dir,
        } => {
            config.data_dir = data_dir.unwrap_or(config.data_dir);
            trace(&config, asn, prefix, origin, variant)
        }
        Commands::Stats { level } => stats(&config, level),
    }
}

fn run(config: &Config) -> Result<()> {
    if config.asns.is_empty() {
        bail!("No AS to verify. Pass --asn or set `asns` in the configuration.");
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.threads)
        .build()
        .context("Cannot build the thread pool")?;
    let results = pool
        .install(|| batch::run_config(config))
        .context("Cannot start the verification batch")?;

    let total = results.len();
    let failed: Vec<_> = results.into_iter().filter_map(Result::err).collect();
    for failure in &failed {
        log::error!(
            "AS{} ({}): {}",
            failure.job.asn,
            failure.job.variant,
            failure.error
        );
    }
    if !failed.is_empty() {
        bail!("{} of {} runs failed", failed.len(), total);
    }
    log::info!("Finished {total} runs");
    Ok(())
}

fn trace(config: &Config, asn: Asn, prefix: Prefix, origin: Asn, variant: Variant) -> Result<()> {
    let store = Store::new(&config.data_dir);
    let extrapolation = store
        .extrapolation_set(asn, variant)
        .with_context(|| format!("Cannot load the {variant} extrapolation of AS{asn}"))?;

    let path = match &extrapolation {
        ExtrapolationSet::ParentPointers(table) => PathReconstructor::new(table)
            .with_max_hops(config.max_traceback_hops)
            .reconstruct(asn, prefix, origin)?,
        ExtrapolationSet::Materialized(paths) => match paths.get(&prefix) {
            Some(m) if m.origin == origin => m.path.clone(),
            Some(m) => bail!("{prefix} is extrapolated from AS{}, not AS{origin}", m.origin),
            None => bail!("AS{asn} has no extrapolated route for {prefix}"),
        },
    };

    println!(
        "{}",
        path.iter()
            .map(|asn| asn.to_string())
            .collect::<Vec<_>>()
            .join(" ")
    );
    Ok(())
}

fn stats(config: &Config, level: f64) -> Result<()> {
    let trials = config
        .variants
        .iter()
        .map(|&variant| {
            let path = config.output_file(variant);
            Trial::load(variant, &path).with_context(|| format!("Cannot load {}", path.display()))
        })
        .collect::<Result<Vec<_>>>()?;

    for trial in &trials {
        let distances = trial.avg_distances();
        print!(
            "{}: {} runs, {:.1}% verifiable",
            trial.variant,
            trial.runs.len(),
            100.0 * trial.verifiable_ratio()
        );
        match confidence_interval(&distances, level) {
            Some(ci) => println!(
                ", edit distance {:.3} ({:.0}% CI {:.3}..{:.3})",
                ci.mean,
                100.0 * level,
                ci.lower,
                ci.upper
            ),
            None => println!(),
        }
    }

    let Some((first, others)) = trials.split_first() else {
        return Ok(());
    };
    for other in others {
        match welch_t_test(&first.avg_distances(), &other.avg_distances()) {
            Some(t) => println!(
                "{} vs. {}: t = {:.4}, df = {:.2}, p = {:.4}",
                first.variant, other.variant, t.t, t.df, t.p_value
            ),
            None => println!(
                "{} vs. {}: not enough runs for a t-test",
                first.variant, other.variant
            ),
        }
    }
    Ok(())
}
