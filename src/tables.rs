//! Tab-delimited inputs and outputs
//!
//! Catalog metadata and correspondence tables carry a header row; columns are located by
//! name so that column order in exported tables does not matter.

use anyhow::{bail, Context, Result};
use indexmap::{IndexMap, IndexSet};
use std::collections::HashSet;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use crate::input::open_input;
use crate::resolve::{Correspondences, Domain, Entity, Evidence, StageReport};

/// A header-indexed tab-separated table held in memory
#[derive(Debug)]
pub struct TsvTable {
    path: PathBuf,
    header: Vec<String>,
    /// (line number, fields)
    rows: Vec<(usize, Vec<String>)>,
}

impl TsvTable {
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let reader = open_input(path)?;
        let mut lines = reader.lines().enumerate();

        let header = match lines.next() {
            Some((_, line)) => {
                let line = line.with_context(|| format!("Failed to read {}", path.display()))?;
                split_fields(&line)
            }
            None => bail!("{} is empty, expected a header row", path.display()),
        };

        let mut rows = Vec::new();
        for (index, line) in lines {
            let line = line.with_context(|| format!("Failed to read {}", path.display()))?;
            if line.trim().is_empty() {
                continue;
            }
            rows.push((index + 1, split_fields(&line)));
        }

        Ok(TsvTable {
            path: path.to_path_buf(),
            header,
            rows,
        })
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a named column
    pub fn column(&self, name: &str) -> Result<usize> {
        self.header
            .iter()
            .position(|column| column == name)
            .with_context(|| {
                format!(
                    "Column '{}' not found in {} (columns: {})",
                    name,
                    self.path.display(),
                    self.header.join(", ")
                )
            })
    }

    /// Rows with their 1-based line numbers. Missing trailing fields read as empty.
    pub fn rows(&self) -> impl Iterator<Item = (usize, Row<'_>)> {
        self.rows
            .iter()
            .map(|(line, fields)| (*line, Row { fields }))
    }
}

pub struct Row<'a> {
    fields: &'a [String],
}

impl<'a> Row<'a> {
    pub fn get(&self, column: usize) -> &'a str {
        self.fields.get(column).map(|s| s.as_str()).unwrap_or("")
    }
}

fn split_fields(line: &str) -> Vec<String> {
    line.trim_end_matches(['\r', '\n'])
        .split('\t')
        .map(|field| field.trim().to_string())
        .collect()
}

/// Column names of the catalog metadata table
#[derive(Debug, Clone)]
pub struct EntityColumns {
    pub id: String,
    pub name: String,
    pub domain: String,
    /// Assembly status column; optional in the table
    pub status: String,
}

impl Default for EntityColumns {
    fn default() -> Self {
        EntityColumns {
            id: "taxon_oid".to_string(),
            name: "Genome Name / Sample Name".to_string(),
            domain: "Domain".to_string(),
            status: "Status".to_string(),
        }
    }
}

/// Load catalog genomes. Duplicate ids are rejected.
pub fn load_entities<P: AsRef<Path>>(path: P, columns: &EntityColumns) -> Result<Vec<Entity>> {
    let table = TsvTable::read(path.as_ref())?;
    let id_col = table.column(&columns.id)?;
    let name_col = table.column(&columns.name)?;
    let domain_col = table.column(&columns.domain)?;
    let status_col = table.column(&columns.status).ok();

    let mut seen = HashSet::new();
    let mut entities = Vec::with_capacity(table.len());
    for (line, row) in table.rows() {
        let id = row.get(id_col);
        if id.is_empty() {
            bail!("{}:{}: empty '{}'", path.as_ref().display(), line, columns.id);
        }
        if !seen.insert(id.to_string()) {
            bail!("{}:{}: duplicate id {}", path.as_ref().display(), line, id);
        }
        let complete = status_col
            .map(|col| row.get(col))
            .filter(|status| !status.is_empty())
            .map(is_complete_status);

        entities.push(Entity {
            id: id.to_string(),
            name: row.get(name_col).to_string(),
            domain: Domain::parse(row.get(domain_col)),
            complete,
        });
    }
    Ok(entities)
}

fn is_complete_status(status: &str) -> bool {
    status.eq_ignore_ascii_case("finished") || status.eq_ignore_ascii_case("complete")
}

/// Column names of the correspondence table
#[derive(Debug, Clone)]
pub struct CorrespondenceColumns {
    pub source: String,
    pub target: String,
}

impl Default for CorrespondenceColumns {
    fn default() -> Self {
        CorrespondenceColumns {
            source: "taxon_oid".to_string(),
            target: "reference_id".to_string(),
        }
    }
}

/// Load initial correspondences. A blank target marks the source as unresolved; when a source
/// is listed more than once its first non-blank target is kept.
pub fn load_correspondences<P: AsRef<Path>>(
    path: P,
    columns: &CorrespondenceColumns,
) -> Result<Correspondences> {
    let table = TsvTable::read(path.as_ref())?;
    let source_col = table.column(&columns.source)?;
    let target_col = table.column(&columns.target)?;

    let mut pairs: IndexMap<String, String> = IndexMap::new();
    let mut unresolved: IndexSet<String> = IndexSet::new();
    for (line, row) in table.rows() {
        let source = row.get(source_col);
        if source.is_empty() {
            bail!("{}:{}: empty '{}'", path.as_ref().display(), line, columns.source);
        }
        let target = row.get(target_col);
        if target.is_empty() {
            if !pairs.contains_key(source) {
                unresolved.insert(source.to_string());
            }
        } else if !pairs.contains_key(source) {
            unresolved.shift_remove(source);
            pairs.insert(source.to_string(), target.to_string());
        }
    }
    Ok(Correspondences { pairs, unresolved })
}

/// Write the header and one `source<TAB>target` line per correspondence
pub fn write_correspondences<W: Write>(
    mut out: W,
    columns: &CorrespondenceColumns,
    correlations: &IndexMap<String, String>,
) -> Result<()> {
    writeln!(out, "{}\t{}", columns.source, columns.target)?;
    for (source, target) in correlations {
        writeln!(out, "{source}\t{target}")?;
    }
    out.flush()?;
    Ok(())
}

/// Write one id per line
pub fn write_id_list<'a, W, I>(mut out: W, ids: I) -> Result<()>
where
    W: Write,
    I: IntoIterator<Item = &'a str>,
{
    for id in ids {
        writeln!(out, "{id}")?;
    }
    out.flush()?;
    Ok(())
}

/// Write one line per resolution: `entity_id reference_id stage evidence detail`
pub fn write_report<W: Write>(mut out: W, reports: &[StageReport]) -> Result<()> {
    writeln!(out, "entity_id\treference_id\tstage\tevidence\tdetail")?;
    for report in reports {
        for resolution in &report.resolutions {
            let (evidence, detail) = match &resolution.evidence {
                Evidence::Name(name_match) => {
                    (name_match.tier.to_string(), name_match.reference_name.clone())
                }
                Evidence::Sequence(hit) => (
                    "alignment".to_string(),
                    format!("raw_score={};identical={}", hit.raw_score, hit.identical),
                ),
            };
            writeln!(
                out,
                "{}\t{}\t{}\t{}\t{}",
                resolution.entity_id, resolution.reference_id, report.stage, evidence, detail
            )?;
        }
    }
    out.flush()?;
    Ok(())
}

/// Where reference organism names come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceNameMode {
    /// FASTA description; for taxonomy paths ("Bacteria;...;Genus species") the last rank
    Description,
    /// Auxiliary `id|organism|strain` file
    Isolates(PathBuf),
}

/// Organism name per reference id, in reference order. References without a name are left out.
pub fn reference_names(
    headers: &[(String, String)],
    mode: &ReferenceNameMode,
) -> Result<IndexMap<String, String>> {
    match mode {
        ReferenceNameMode::Description => Ok(headers
            .iter()
            .filter_map(|(id, description)| {
                let name = name_from_description(description);
                (!name.is_empty()).then(|| (id.clone(), name.to_string()))
            })
            .collect()),
        ReferenceNameMode::Isolates(path) => {
            let mut isolates = load_isolate_names(path)?;
            Ok(headers
                .iter()
                .filter_map(|(id, _)| isolates.shift_remove(id).map(|name| (id.clone(), name)))
                .collect())
        }
    }
}

/// Organism part of a FASTA description
pub fn name_from_description(description: &str) -> &str {
    description
        .rsplit(';')
        .next()
        .unwrap_or(description)
        .trim()
}

/// Load an `id|organism|strain` file. The strain is appended to the organism unless the
/// organism already mentions it (case-insensitively).
pub fn load_isolate_names<P: AsRef<Path>>(path: P) -> Result<IndexMap<String, String>> {
    let path = path.as_ref();
    let reader = open_input(path)?;
    let mut names = IndexMap::new();

    for (index, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read {}", path.display()))?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = line.split('|').map(str::trim).collect();
        if fields.len() < 2 || fields[0].is_empty() {
            bail!(
                "{}:{}: expected 'id|organism|strain', found '{}'",
                path.display(),
                index + 1,
                line
            );
        }

        let organism = fields[1];
        let strain = fields.get(2).copied().unwrap_or("");
        let name = if strain.is_empty()
            || organism.to_lowercase().contains(&strain.to_lowercase())
        {
            organism.to_string()
        } else {
            format!("{organism} {strain}")
        };
        names.insert(fields[0].to_string(), name);
    }
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(dir: &tempfile::TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_load_entities_by_column_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            "meta.tsv",
            "Domain\ttaxon_oid\tGenome Name / Sample Name\tStatus\n\
             Bacteria\t101\tEscherichia coli K-12\tFinished\n\
             Eukaryota\t102\tSaccharomyces cerevisiae\tDraft\n\
             Archaea\t103\tHaloferax volcanii DS2\t\n",
        );
        let entities = load_entities(&path, &EntityColumns::default()).unwrap();
        assert_eq!(entities.len(), 3);
        assert_eq!(entities[0].id, "101");
        assert_eq!(entities[0].domain, Domain::Bacteria);
        assert_eq!(entities[0].complete, Some(true));
        assert_eq!(entities[1].domain, Domain::Other);
        assert_eq!(entities[1].complete, Some(false));
        assert_eq!(entities[2].complete, None);
    }

    #[test]
    fn test_missing_column_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "meta.tsv", "id\tname\n1\tfoo\n");
        let err = load_entities(&path, &EntityColumns::default()).unwrap_err();
        assert!(err.to_string().contains("Column 'taxon_oid' not found"));
    }

    #[test]
    fn test_load_correspondences_blank_targets() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            "corr.tsv",
            "taxon_oid\treference_id\n1\tR1\n2\t\n3\n2\tR2\n1\tR9\n",
        );
        let corr = load_correspondences(&path, &CorrespondenceColumns::default()).unwrap();
        assert_eq!(corr.pairs.len(), 2);
        assert_eq!(corr.pairs["1"], "R1");
        assert_eq!(corr.pairs["2"], "R2");
        let unresolved: Vec<&str> = corr.unresolved.iter().map(|s| s.as_str()).collect();
        assert_eq!(unresolved, vec!["3"]);
    }

    #[test]
    fn test_write_correspondences() {
        let mut map = IndexMap::new();
        map.insert("1".to_string(), "R1".to_string());
        map.insert("2".to_string(), "R2".to_string());
        let mut out = Vec::new();
        write_correspondences(&mut out, &CorrespondenceColumns::default(), &map).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "taxon_oid\treference_id\n1\tR1\n2\tR2\n"
        );
    }

    #[test]
    fn test_report_lists_every_resolution() {
        use crate::hit_reducer::BestHit;
        use crate::name_match::{MatchTier, NameMatch};
        use crate::resolve::{Resolution, Stage};

        let name_report = StageReport {
            stage: Stage::NameMatching,
            considered: 2,
            remaining: 1,
            resolutions: vec![Resolution {
                entity_id: "1".to_string(),
                reference_id: "R1".to_string(),
                evidence: Evidence::Name(NameMatch {
                    reference_id: "R1".to_string(),
                    reference_name: "Escherichia coli K-12".to_string(),
                    tier: MatchTier::PartialToken { min_len: 3 },
                }),
            }],
            invalidated: Vec::new(),
        };
        let sequence_report = StageReport {
            stage: Stage::SequenceMatching,
            considered: 1,
            remaining: 0,
            resolutions: vec![Resolution {
                entity_id: "2".to_string(),
                reference_id: "R2".to_string(),
                evidence: Evidence::Sequence(BestHit {
                    target_id: "R2".to_string(),
                    raw_score: 2700.0,
                    identical: 1490,
                }),
            }],
            invalidated: Vec::new(),
        };

        let mut out = Vec::new();
        write_report(&mut out, &[name_report, sequence_report]).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "entity_id\treference_id\tstage\tevidence\tdetail\n\
             1\tR1\tname\tpartial_token_3\tEscherichia coli K-12\n\
             2\tR2\tsequence\talignment\traw_score=2700;identical=1490\n"
        );
    }

    #[test]
    fn test_name_from_description() {
        assert_eq!(
            name_from_description("Bacteria;Firmicutes;Bacilli;Bacillus subtilis 168"),
            "Bacillus subtilis 168"
        );
        assert_eq!(name_from_description("Escherichia coli K-12"), "Escherichia coli K-12");
    }

    #[test]
    fn test_isolate_names_append_missing_strain() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            "isolates.txt",
            "S001|Escherichia coli|K-12\n\
             S002|Bacillus subtilis 168|168\n\
             S003|Vibrio fischeri ES114|es114\n\
             S004|Listeria monocytogenes|\n",
        );
        let names = load_isolate_names(&path).unwrap();
        assert_eq!(names["S001"], "Escherichia coli K-12");
        assert_eq!(names["S002"], "Bacillus subtilis 168");
        assert_eq!(names["S003"], "Vibrio fischeri ES114");
        assert_eq!(names["S004"], "Listeria monocytogenes");

        let headers = vec![
            ("S002".to_string(), String::new()),
            ("S999".to_string(), String::new()),
        ];
        let mode = ReferenceNameMode::Isolates(path);
        let chosen = reference_names(&headers, &mode).unwrap();
        assert_eq!(chosen.len(), 1);
        assert_eq!(chosen["S002"], "Bacillus subtilis 168");
    }
}
