/// Reduction of alignment hits to one best reference per query
///
/// Hits are visited by decreasing raw score. Each segment must reach the identity and
/// coverage thresholds; among the survivors the segment with the most identical positions
/// wins. Once a hit scores strictly below the accepted best, the rest of the query's hits
/// are not inspected.
use indexmap::IndexMap;
use ordered_float::OrderedFloat;
use std::cmp::Reverse;

use crate::hits::{AlignmentHit, QueryHits};

/// Acceptance thresholds, both in percent and inclusive
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReduceConfig {
    pub min_identity: f64,
    pub min_coverage: f64,
}

impl Default for ReduceConfig {
    fn default() -> Self {
        ReduceConfig {
            min_identity: 99.0,
            min_coverage: 99.0,
        }
    }
}

/// The reference chosen for a query
#[derive(Debug, Clone, PartialEq)]
pub struct BestHit {
    pub target_id: String,
    pub raw_score: f64,
    /// Identical positions of the winning segment
    pub identical: u32,
}

/// Best target per query. Queries without any segment passing the thresholds are absent.
pub fn reduce_hits(queries: &[QueryHits], config: &ReduceConfig) -> IndexMap<String, BestHit> {
    queries
        .iter()
        .filter_map(|query| {
            best_hit(&query.hits, config).map(|best| (query.query_id.clone(), best))
        })
        .collect()
}

/// Best target among the hits of a single query
pub fn best_hit(hits: &[AlignmentHit], config: &ReduceConfig) -> Option<BestHit> {
    let mut ordered: Vec<&AlignmentHit> = hits.iter().collect();
    // Stable: equal raw scores keep the aligner's order
    ordered.sort_by_key(|hit| Reverse(OrderedFloat(hit.raw_score)));

    let mut best: Option<BestHit> = None;
    for hit in ordered {
        if best.as_ref().is_some_and(|b| hit.raw_score < b.raw_score) {
            break;
        }

        for hsp in &hit.hsps {
            if hsp.percent_identity() < config.min_identity {
                continue;
            }
            if hsp.coverage() < config.min_coverage {
                continue;
            }
            if best.as_ref().map_or(true, |b| hsp.identical > b.identical) {
                best = Some(BestHit {
                    target_id: hit.target_id.clone(),
                    raw_score: hit.raw_score,
                    identical: hsp.identical,
                });
            }
        }
    }
    best
}
