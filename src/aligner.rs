use anyhow::{bail, Context, Result};
use indexmap::IndexSet;
use log::info;
use std::env;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::NamedTempFile;

use crate::fasta::write_subset;
use crate::hits::{genome_id, read_hits_file, QueryHits, TABULAR_FIELDS};

/// Produces alignment hits for a set of unresolved genome ids
pub trait AlignmentRunner {
    fn run(&self, genome_ids: &IndexSet<String>) -> Result<Vec<QueryHits>>;
}

/// Runs `blastn` on the query genes of unresolved genomes against the reference FASTA.
///
/// Output goes to a cache file that is reused as-is on later runs. The file only appears
/// once the aligner has succeeded, so an interrupted run leaves nothing behind to reuse.
pub struct BlastRunner {
    program: PathBuf,
    query_fasta: PathBuf,
    reference_fasta: PathBuf,
    cache: PathBuf,
    max_target_seqs: usize,
}

impl BlastRunner {
    pub fn new<P: Into<PathBuf>>(query_fasta: P, reference_fasta: P, cache: P) -> Self {
        BlastRunner {
            program: PathBuf::from("blastn"),
            query_fasta: query_fasta.into(),
            reference_fasta: reference_fasta.into(),
            cache: cache.into(),
            max_target_seqs: 50,
        }
    }

    pub fn with_program<P: Into<PathBuf>>(mut self, program: P) -> Self {
        self.program = program.into();
        self
    }

    pub fn with_max_target_seqs(mut self, max_target_seqs: usize) -> Self {
        self.max_target_seqs = max_target_seqs;
        self
    }

    pub fn cache_path(&self) -> &Path {
        &self.cache
    }

    fn align(&self, genome_ids: &IndexSet<String>) -> Result<()> {
        let program = locate_program(&self.program)?;

        let mut subset = tempfile::Builder::new()
            .prefix("taxmatch-queries-")
            .suffix(".fna")
            .tempfile()
            .context("Failed to create temporary query FASTA")?;
        let written = write_subset(
            &self.query_fasta,
            |id| genome_ids.contains(genome_id(id)),
            BufWriter::new(subset.as_file_mut()),
        )?;
        info!(
            "Aligning {} query sequences from {} genomes with {}",
            written,
            genome_ids.len(),
            program.display()
        );

        let cache_dir = match self.cache.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let pending = NamedTempFile::new_in(&cache_dir).with_context(|| {
            format!("Failed to create alignment output in {}", cache_dir.display())
        })?;

        if written > 0 {
            let output = Command::new(&program)
                .arg("-query")
                .arg(subset.path())
                .arg("-subject")
                .arg(&self.reference_fasta)
                .arg("-outfmt")
                .arg(format!("6 {TABULAR_FIELDS}"))
                .arg("-max_target_seqs")
                .arg(self.max_target_seqs.to_string())
                .arg("-out")
                .arg(pending.path())
                .output()
                .with_context(|| format!("Failed to run {}", program.display()))?;

            if !output.status.success() {
                bail!(
                    "{} failed ({}): {}",
                    program.display(),
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                );
            }
        }

        pending
            .persist(&self.cache)
            .with_context(|| format!("Failed to store alignments in {}", self.cache.display()))?;
        Ok(())
    }
}

impl AlignmentRunner for BlastRunner {
    fn run(&self, genome_ids: &IndexSet<String>) -> Result<Vec<QueryHits>> {
        if self.cache.exists() {
            info!("Reusing alignments from {}", self.cache.display());
        } else {
            self.align(genome_ids)?;
        }
        read_hits_file(&self.cache)
    }
}

/// Resolve a program name against PATH. Paths containing a separator are taken as given.
pub fn locate_program(program: &Path) -> Result<PathBuf> {
    if program.components().count() > 1 {
        if program.is_file() {
            return Ok(program.to_path_buf());
        }
        bail!("Aligner '{}' does not exist", program.display());
    }

    if let Some(paths) = env::var_os("PATH") {
        for dir in env::split_paths(&paths) {
            let candidate = dir.join(program);
            if candidate.is_file() {
                return Ok(candidate);
            }
        }
    }

    bail!(
        "Aligner '{}' not found in PATH. Install BLAST+ or pass its location with --blastn",
        program.display()
    )
}
