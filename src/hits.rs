//! Alignment hits and the tabular aligner output reader
//!
//! The aligner reports one line per aligned segment (HSP) with the columns listed in
//! `TABULAR_FIELDS`. Consecutive lines for the same query and subject form one hit. Query ids
//! are composite `<genomeId>_<geneId>` and are folded to the bare genome id, so all genes of a
//! genome compete for the same best reference.

use anyhow::{bail, Context, Result};
use indexmap::IndexMap;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use crate::input::open_input;

/// Output columns requested from the aligner, in order
pub const TABULAR_FIELDS: &str = "qseqid sseqid score qlen slen nident qstart qend sstart send";

const FIELD_COUNT: usize = 10;

/// One locally aligned segment
#[derive(Debug, Clone, PartialEq)]
pub struct Hsp {
    pub raw_score: f64,
    /// Number of identical positions
    pub identical: u32,
    pub query_len: u32,
    pub target_len: u32,
    pub aligned_query_len: u32,
    pub aligned_target_len: u32,
}

impl Hsp {
    fn shorter_sequence(&self) -> u32 {
        self.query_len.min(self.target_len)
    }

    /// Identical positions relative to the shorter of the two sequences, in percent
    pub fn percent_identity(&self) -> f64 {
        percent(self.identical, self.shorter_sequence())
    }

    /// Aligned span relative to the shorter of the two sequences, in percent
    pub fn coverage(&self) -> f64 {
        percent(
            self.aligned_query_len.min(self.aligned_target_len),
            self.shorter_sequence(),
        )
    }
}

// Multiply before dividing so that whole-number percentages come out exact.
fn percent(numerator: u32, denominator: u32) -> f64 {
    if denominator == 0 {
        return 0.0;
    }
    numerator as f64 * 100.0 / denominator as f64
}

/// All segments of one query aligned against one target
#[derive(Debug, Clone, PartialEq)]
pub struct AlignmentHit {
    pub target_id: String,
    /// Best segment score of the hit
    pub raw_score: f64,
    pub hsps: Vec<Hsp>,
}

impl AlignmentHit {
    pub fn new(target_id: impl Into<String>, hsps: Vec<Hsp>) -> Self {
        let raw_score = hsps
            .iter()
            .map(|hsp| hsp.raw_score)
            .fold(f64::NEG_INFINITY, f64::max);
        AlignmentHit {
            target_id: target_id.into(),
            raw_score,
            hsps,
        }
    }
}

/// Hits of one query, in the order the aligner reported them
#[derive(Debug, Clone, PartialEq)]
pub struct QueryHits {
    pub query_id: String,
    pub hits: Vec<AlignmentHit>,
}

/// Bare genome id of a composite `<genomeId>_<geneId>` sequence id
pub fn genome_id(sequence_id: &str) -> &str {
    sequence_id
        .split_once('_')
        .map(|(genome, _)| genome)
        .unwrap_or(sequence_id)
}

/// One parsed line of tabular output
#[derive(Debug, Clone, PartialEq)]
pub struct TabularRecord {
    pub query_id: String,
    pub target_id: String,
    pub hsp: Hsp,
}

pub struct HitReader<R: Read> {
    reader: BufReader<R>,
    line_number: usize,
}

impl<R: Read> HitReader<R> {
    pub fn new(reader: R) -> Self {
        HitReader {
            reader: BufReader::new(reader),
            line_number: 0,
        }
    }

    /// Next record, skipping blank lines and `#` comments
    pub fn read_record(&mut self) -> Result<Option<TabularRecord>> {
        let mut line = String::new();
        loop {
            line.clear();
            if self.reader.read_line(&mut line)? == 0 {
                return Ok(None);
            }
            self.line_number += 1;
            let trimmed = line.trim_end();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            return self
                .parse_line(trimmed)
                .with_context(|| format!("Invalid alignment record at line {}", self.line_number))
                .map(Some);
        }
    }

    fn parse_line(&self, line: &str) -> Result<TabularRecord> {
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < FIELD_COUNT {
            bail!(
                "expected {} tab-separated fields ({}), found {}",
                FIELD_COUNT,
                TABULAR_FIELDS,
                fields.len()
            );
        }

        let query_start: u32 = fields[6].parse()?;
        let query_end: u32 = fields[7].parse()?;
        let target_start: u32 = fields[8].parse()?;
        let target_end: u32 = fields[9].parse()?;

        Ok(TabularRecord {
            query_id: fields[0].to_string(),
            target_id: fields[1].to_string(),
            hsp: Hsp {
                raw_score: fields[2].parse()?,
                query_len: fields[3].parse()?,
                target_len: fields[4].parse()?,
                identical: fields[5].parse()?,
                // Subject coordinates are reversed on the minus strand
                aligned_query_len: query_start.abs_diff(query_end) + 1,
                aligned_target_len: target_start.abs_diff(target_end) + 1,
            },
        })
    }

    /// Read everything, folding query ids to genome ids and grouping segments into hits.
    pub fn read_grouped(&mut self) -> Result<Vec<QueryHits>> {
        let mut grouped: IndexMap<String, Vec<AlignmentHit>> = IndexMap::new();
        let mut current: Option<(String, String, Vec<Hsp>)> = None;

        while let Some(record) = self.read_record()? {
            let same_hit = matches!(
                &current,
                Some((query, target, _)) if *query == record.query_id && *target == record.target_id
            );
            if same_hit {
                if let Some((_, _, hsps)) = current.as_mut() {
                    hsps.push(record.hsp);
                }
                continue;
            }
            if let Some((query, target, hsps)) = current.take() {
                push_hit(&mut grouped, &query, target, hsps);
            }
            current = Some((record.query_id, record.target_id, vec![record.hsp]));
        }
        if let Some((query, target, hsps)) = current.take() {
            push_hit(&mut grouped, &query, target, hsps);
        }

        Ok(grouped
            .into_iter()
            .map(|(query_id, hits)| QueryHits { query_id, hits })
            .collect())
    }
}

fn push_hit(
    grouped: &mut IndexMap<String, Vec<AlignmentHit>>,
    query: &str,
    target: String,
    hsps: Vec<Hsp>,
) {
    grouped
        .entry(genome_id(query).to_string())
        .or_default()
        .push(AlignmentHit::new(target, hsps));
}

/// Read tabular aligner output from a file (auto-detects gzip compression)
pub fn read_hits_file<P: AsRef<Path>>(path: P) -> Result<Vec<QueryHits>> {
    let path = path.as_ref();
    let input = open_input(path)?;
    HitReader::new(input)
        .read_grouped()
        .with_context(|| format!("Failed to read alignments from {}", path.display()))
}
