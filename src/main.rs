use anyhow::{bail, Context, Result};
use clap::Parser;
use log::{debug, error, info, warn};
use std::collections::HashSet;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use taxmatch::aligner::{AlignmentRunner, BlastRunner};
use taxmatch::fasta::read_headers;
use taxmatch::hit_reducer::ReduceConfig;
use taxmatch::resolve::{Evidence, ResolveConfig, Resolver, StageReport};
use taxmatch::tables::{
    load_correspondences, load_entities, reference_names, write_correspondences, write_id_list,
    write_report, CorrespondenceColumns, EntityColumns, ReferenceNameMode,
};
use taxmatch::taxon_index::TaxonIndex;

/// Parse a percentage in [0, 100]
fn parse_percent(s: &str) -> Result<f64, String> {
    let value: f64 = s
        .trim()
        .trim_end_matches('%')
        .parse()
        .map_err(|e| format!("Invalid percentage: {e}"))?;
    if !(0.0..=100.0).contains(&value) {
        return Err(format!("Percentage {value} outside 0..100"));
    }
    Ok(value)
}

/// taxmatch - link genome catalog entries to 16S reference records
///
/// Repairs a genome -> reference correspondence table: drops links to unknown reference ids,
/// then fills gaps by organism name and, optionally, by aligning 16S genes against the references.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Catalog metadata table (TSV with header)
    #[clap(short = 'm', long = "metadata")]
    metadata: PathBuf,

    /// Existing genome -> reference correspondences (TSV with header)
    #[clap(short = 'c', long = "correspondences")]
    correspondences: PathBuf,

    /// Reference 16S FASTA
    #[clap(short = 'r', long = "references")]
    references: PathBuf,

    /// Query 16S genes of the catalog genomes, ids as <genome>_<gene>
    #[clap(short = 'q', long = "queries")]
    queries: Option<PathBuf>,

    /// Take reference organism names from an `id|organism|strain` file instead of FASTA
    /// descriptions
    #[clap(long = "isolate-names")]
    isolate_names: Option<PathBuf>,

    /// Resolve by organism name
    #[clap(long = "by-name")]
    by_name: bool,

    /// Resolve by 16S alignment (requires --queries)
    #[clap(long = "by-sequence", requires = "queries")]
    by_sequence: bool,

    /// Accept any reference of the same species when no strain matches
    #[clap(long = "species-fallback")]
    species_fallback: bool,

    /// Minimum percent identity of an accepted alignment
    #[clap(long = "min-identity", default_value = "99.0", value_parser = parse_percent)]
    min_identity: f64,

    /// Minimum percent coverage of an accepted alignment
    #[clap(long = "min-coverage", default_value = "99.0", value_parser = parse_percent)]
    min_coverage: f64,

    /// Aligner output, reused when it already exists (temporary if not specified)
    #[clap(long = "alignment-cache")]
    alignment_cache: Option<PathBuf>,

    /// blastn executable
    #[clap(long = "blastn", default_value = "blastn")]
    blastn: PathBuf,

    /// Output correspondences (stdout if not specified)
    #[clap(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// Write one line per resolution with its evidence
    #[clap(long = "report")]
    report: Option<PathBuf>,

    /// Write the ids left unresolved
    #[clap(long = "unresolved")]
    unresolved: Option<PathBuf>,

    /// Metadata column holding the genome id
    #[clap(long = "id-column", default_value = "taxon_oid")]
    id_column: String,

    /// Metadata column holding the organism name
    #[clap(long = "name-column", default_value = "Genome Name / Sample Name")]
    name_column: String,

    /// Metadata column holding the domain
    #[clap(long = "domain-column", default_value = "Domain")]
    domain_column: String,

    /// Metadata column holding the assembly status
    #[clap(long = "status-column", default_value = "Status")]
    status_column: String,

    /// Correspondence column holding the genome id
    #[clap(long = "source-column", default_value = "taxon_oid")]
    source_column: String,

    /// Correspondence column holding the reference id
    #[clap(long = "target-column", default_value = "reference_id")]
    target_column: String,

    /// Quiet mode (warnings and errors only)
    #[clap(long = "quiet")]
    quiet: bool,

    /// Number of threads for parallel processing
    #[clap(short = 't', long = "threads", default_value = "8")]
    threads: usize,
}

fn create_output(path: Option<&Path>) -> Result<Box<dyn Write>> {
    Ok(match path {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("Failed to create {}", path.display()))?,
        )),
        None => Box::new(BufWriter::new(io::stdout())),
    })
}

fn create_file(path: &Path) -> Result<BufWriter<File>> {
    Ok(BufWriter::new(File::create(path).with_context(|| {
        format!("Failed to create {}", path.display())
    })?))
}

fn log_report(report: &StageReport) {
    if report.invalidated.is_empty() {
        info!(
            "Stage {}: {} considered, {} resolved, {} remaining",
            report.stage,
            report.considered,
            report.resolved(),
            report.remaining
        );
    } else {
        info!(
            "Stage {}: {} correspondences to unknown references removed, {} unresolved",
            report.stage,
            report.invalidated.len(),
            report.remaining
        );
    }

    for (source, target) in &report.invalidated {
        debug!("{source}: reference {target} not found");
    }
    for resolution in &report.resolutions {
        match &resolution.evidence {
            Evidence::Name(m) => debug!(
                "{} -> {} ({}, {})",
                resolution.entity_id, resolution.reference_id, m.tier, m.reference_name
            ),
            Evidence::Sequence(hit) => debug!(
                "{} -> {} (raw score {}, {} identical)",
                resolution.entity_id, resolution.reference_id, hit.raw_score, hit.identical
            ),
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.quiet { "warn" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .init();

    // Set up rayon thread pool
    rayon::ThreadPoolBuilder::new()
        .num_threads(args.threads)
        .build_global()?;

    if !args.by_name && !args.by_sequence {
        warn!("Neither --by-name nor --by-sequence given; only out-of-domain genomes are dropped");
    }

    // Load every input before any stage runs
    let entity_columns = EntityColumns {
        id: args.id_column.clone(),
        name: args.name_column.clone(),
        domain: args.domain_column.clone(),
        status: args.status_column.clone(),
    };
    let entities = load_entities(&args.metadata, &entity_columns)
        .with_context(|| format!("Failed to load metadata {}", args.metadata.display()))?;
    info!("Loaded {} catalog genomes", entities.len());

    let columns = CorrespondenceColumns {
        source: args.source_column.clone(),
        target: args.target_column.clone(),
    };
    let correspondences = load_correspondences(&args.correspondences, &columns).with_context(|| {
        format!(
            "Failed to load correspondences {}",
            args.correspondences.display()
        )
    })?;
    info!(
        "Loaded {} correspondences, {} listed without a reference",
        correspondences.pairs.len(),
        correspondences.unresolved.len()
    );

    let headers = read_headers(&args.references)?;
    let reference_ids: HashSet<String> = headers.iter().map(|(id, _)| id.clone()).collect();
    info!("Loaded {} reference sequences", reference_ids.len());

    let index = if args.by_name {
        let mode = match &args.isolate_names {
            Some(path) => ReferenceNameMode::Isolates(path.clone()),
            None => ReferenceNameMode::Description,
        };
        let names = reference_names(&headers, &mode)?;
        let index = TaxonIndex::build(names.iter().map(|(id, name)| (id.as_str(), name.as_str())));
        info!(
            "Indexed {} reference names in {} genera ({} without a genus)",
            index.len(),
            index.genus_count(),
            index.skipped()
        );
        index
    } else {
        TaxonIndex::new()
    };

    // Held until exit so a temporary cache outlives the sequence stage
    let mut _cache_dir = None;
    let runner = match (&args.queries, args.by_sequence) {
        (Some(queries), true) => {
            let cache = match &args.alignment_cache {
                Some(path) => path.clone(),
                None => {
                    let dir = tempfile::tempdir().context("Failed to create temporary directory")?;
                    let path = dir.path().join("alignments.tsv");
                    _cache_dir = Some(dir);
                    path
                }
            };
            Some(
                BlastRunner::new(queries.clone(), args.references.clone(), cache)
                    .with_program(&args.blastn),
            )
        }
        (None, true) => bail!("--by-sequence requires --queries"),
        _ => None,
    };

    let config = ResolveConfig {
        by_name: args.by_name,
        by_sequence: args.by_sequence,
        species_fallback: args.species_fallback,
        reduce: ReduceConfig {
            min_identity: args.min_identity,
            min_coverage: args.min_coverage,
        },
    };

    let mut resolver = Resolver::new(correspondences, &entities);
    if resolver.excluded() > 0 {
        info!(
            "Excluded {} genomes outside Bacteria and Archaea",
            resolver.excluded()
        );
    }

    let summary = resolver.run(
        &config,
        &reference_ids,
        &index,
        runner.as_ref().map(|r| r as &dyn AlignmentRunner),
    );
    for report in &summary.reports {
        log_report(report);
    }
    if let Some(err) = &summary.sequence_error {
        error!("Sequence matching failed: {err:#}");
    }

    // Whatever was committed is written, even after a failed sequence stage
    write_correspondences(
        create_output(args.output.as_deref())?,
        &columns,
        resolver.correlations(),
    )?;
    if let Some(path) = &args.report {
        write_report(create_file(path)?, &summary.reports)?;
    }
    if let Some(path) = &args.unresolved {
        write_id_list(create_file(path)?, resolver.unresolved_ids())?;
    }

    info!(
        "{} genomes linked to a reference, {} unresolved",
        resolver.correlations().len(),
        resolver.unresolved_len()
    );

    match summary.sequence_error {
        Some(err) => Err(err.context("Sequence matching failed")),
        None => Ok(()),
    }
}
