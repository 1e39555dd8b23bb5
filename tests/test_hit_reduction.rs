
use anyhow::Result;
use pretty_assertions::assert_eq;
use std::fs;
use tempfile::TempDir;

use taxmatch::hit_reducer::{reduce_hits, ReduceConfig};
use taxmatch::hits::{read_hits_file, AlignmentHit};
use test_utils::*;

#[test]
fn test_identity_threshold_selects_target() {
    // T1: 99.5% identity over 99.9% of the query; T2: 98.0% identity over the full length
    let queries = vec![query_hits(
        "Q1",
        vec![
            AlignmentHit::new("T1", vec![hsp(100.0, 1000, 995, 999)]),
            AlignmentHit::new("T2", vec![hsp(100.0, 1000, 980, 1000)]),
        ],
    )];
    let best = reduce_hits(&queries, &ReduceConfig::default());
    assert_eq!(best["Q1"].target_id, "T1");
    assert_eq!(best["Q1"].identical, 995);
}

#[test]
fn test_identity_boundary() {
    let config = ReduceConfig {
        min_identity: 99.0,
        min_coverage: 0.0,
    };
    let at = vec![query_hits("Q1", vec![single_hsp_hit("T1", 10.0, 990)])];
    let below = vec![query_hits("Q1", vec![single_hsp_hit("T1", 10.0, 989)])];
    assert_eq!(reduce_hits(&at, &config).len(), 1);
    assert_eq!(reduce_hits(&below, &config).len(), 0);
}

#[test]
fn test_genes_of_one_genome_compete() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("hits.tsv");
    let mut content = String::new();
    content.push_str("# blastn tabular output\n");
    content.push_str(&tabular_line("2501_16S_1", "R1", 1800, 1000, 992, 1000));
    content.push_str(&tabular_line("2501_16S_2", "R2", 1850, 1000, 998, 1000));
    content.push_str(&tabular_line("2502_16S_1", "R3", 1500, 1000, 900, 1000));
    fs::write(&path, content)?;

    let hits = read_hits_file(&path)?;
    let ids: Vec<&str> = hits.iter().map(|q| q.query_id.as_str()).collect();
    assert_eq!(ids, vec!["2501", "2502"]);
    assert_eq!(hits[0].hits.len(), 2);

    let best = reduce_hits(&hits, &ReduceConfig::default());
    assert_eq!(best.len(), 1);
    assert_eq!(best["2501"].target_id, "R2");
    Ok(())
}

#[test]
fn test_consecutive_segments_form_one_hit() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("hits.tsv");
    let mut content = String::new();
    content.push_str(&tabular_line("G1_a", "R1", 600, 1000, 300, 300));
    content.push_str(&tabular_line("G1_a", "R1", 1900, 1000, 1000, 1000));
    content.push_str(&tabular_line("G1_a", "R2", 1000, 1000, 1000, 1000));
    fs::write(&path, content)?;

    let hits = read_hits_file(&path)?;
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].hits.len(), 2);
    assert_eq!(hits[0].hits[0].hsps.len(), 2);
    assert_eq!(hits[0].hits[0].raw_score, 1900.0);

    let best = reduce_hits(&hits, &ReduceConfig::default());
    assert_eq!(best["G1"].target_id, "R1");
    Ok(())
}

#[test]
fn test_malformed_line_reports_line_number() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("hits.tsv");
    let mut content = tabular_line("G1_a", "R1", 600, 1000, 1000, 1000);
    content.push_str("G1_a\tR1\tnot-a-score\n");
    fs::write(&path, content)?;

    let err = read_hits_file(&path).unwrap_err();
    let message = format!("{err:#}");
    assert!(message.contains("line 2"), "{message}");
    Ok(())
}
