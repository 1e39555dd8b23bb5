//! Resolution of missing or invalid genome -> reference correspondences
//!
//! A `Resolver` owns the correlation map and the unresolved set for one run. Stages are
//! separate calls that commit per entity, so stopping between two stages always leaves a
//! consistent map:
//!
//! 1. invalid-id removal: correspondences to unknown reference ids are dropped and the
//!    entity becomes unresolved again
//! 2. name matching against a `TaxonIndex`
//! 3. sequence matching through an `AlignmentRunner` and the hit reducer
//!
//! Entities outside Bacteria and Archaea never enter either collection.

use anyhow::{anyhow, Result};
use indexmap::{IndexMap, IndexSet};
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::aligner::AlignmentRunner;
use crate::hit_reducer::{reduce_hits, BestHit, ReduceConfig};
use crate::name_match::{match_name, NameMatch};
use crate::taxon_index::TaxonIndex;

/// Domain classification of a catalog genome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Domain {
    Bacteria,
    Archaea,
    Other,
}

impl Domain {
    pub fn parse(value: &str) -> Domain {
        let value = value.trim();
        if value.eq_ignore_ascii_case("bacteria") {
            Domain::Bacteria
        } else if value.eq_ignore_ascii_case("archaea") {
            Domain::Archaea
        } else {
            Domain::Other
        }
    }

    /// Only prokaryotes carry 16S references
    pub fn in_scope(&self) -> bool {
        matches!(self, Domain::Bacteria | Domain::Archaea)
    }
}

/// A catalog genome
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entity {
    pub id: String,
    pub name: String,
    pub domain: Domain,
    /// Whether the assembly is finished, when the catalog says so
    pub complete: Option<bool>,
}

/// Initial correspondences: resolved pairs plus ids listed without a target
#[derive(Debug, Clone, Default)]
pub struct Correspondences {
    pub pairs: IndexMap<String, String>,
    pub unresolved: IndexSet<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    InvalidRemoval,
    NameMatching,
    SequenceMatching,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::InvalidRemoval => write!(f, "invalid_ids"),
            Stage::NameMatching => write!(f, "name"),
            Stage::SequenceMatching => write!(f, "sequence"),
        }
    }
}

/// Why an entity was assigned its reference
#[derive(Debug, Clone, PartialEq)]
pub enum Evidence {
    Name(NameMatch),
    Sequence(BestHit),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub entity_id: String,
    pub reference_id: String,
    pub evidence: Evidence,
}

/// What a stage did
#[derive(Debug, Clone, PartialEq)]
pub struct StageReport {
    pub stage: Stage,
    /// Size of the unresolved set when the stage started
    pub considered: usize,
    /// Size of the unresolved set when the stage finished
    pub remaining: usize,
    pub resolutions: Vec<Resolution>,
    /// (entity, unknown reference) pairs dropped by invalid-id removal
    pub invalidated: Vec<(String, String)>,
}

impl StageReport {
    fn new(stage: Stage, considered: usize) -> Self {
        StageReport {
            stage,
            considered,
            remaining: considered,
            resolutions: Vec::new(),
            invalidated: Vec::new(),
        }
    }

    pub fn resolved(&self) -> usize {
        self.resolutions.len()
    }
}

/// Which matching stages to run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolveConfig {
    pub by_name: bool,
    pub by_sequence: bool,
    pub species_fallback: bool,
    pub reduce: ReduceConfig,
}

impl Default for ResolveConfig {
    fn default() -> Self {
        ResolveConfig {
            by_name: true,
            by_sequence: false,
            species_fallback: false,
            reduce: ReduceConfig::default(),
        }
    }
}

/// Outcome of `Resolver::run`. A failed sequence stage does not undo earlier stages.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub reports: Vec<StageReport>,
    pub sequence_error: Option<anyhow::Error>,
}

#[derive(Debug, Default)]
pub struct Resolver {
    correlations: IndexMap<String, String>,
    /// Unresolved entity ids with their display names, when known
    unresolved: IndexMap<String, Option<String>>,
    names: HashMap<String, String>,
    excluded: usize,
}

impl Resolver {
    /// Set up the working state.
    ///
    /// Out-of-domain entities are dropped from both collections. In-domain entities that the
    /// correspondence input does not list at all start out unresolved.
    pub fn new(correspondences: Correspondences, entities: &[Entity]) -> Self {
        let by_id: HashMap<&str, &Entity> =
            entities.iter().map(|e| (e.id.as_str(), e)).collect();
        let out_of_scope =
            |id: &str| by_id.get(id).is_some_and(|entity| !entity.domain.in_scope());

        let names: HashMap<String, String> = entities
            .iter()
            .filter(|e| e.domain.in_scope())
            .map(|e| (e.id.clone(), e.name.clone()))
            .collect();

        let mut resolver = Resolver {
            excluded: entities.iter().filter(|e| !e.domain.in_scope()).count(),
            names,
            ..Default::default()
        };

        for (source, target) in correspondences.pairs {
            if !out_of_scope(&source) {
                resolver.correlations.insert(source, target);
            }
        }
        for source in correspondences.unresolved {
            if !out_of_scope(&source) && !resolver.correlations.contains_key(&source) {
                resolver.mark_unresolved(source);
            }
        }
        for entity in entities.iter().filter(|e| e.domain.in_scope()) {
            if !resolver.correlations.contains_key(&entity.id)
                && !resolver.unresolved.contains_key(&entity.id)
            {
                resolver.mark_unresolved(entity.id.clone());
            }
        }
        resolver
    }

    pub fn correlations(&self) -> &IndexMap<String, String> {
        &self.correlations
    }

    pub fn into_correlations(self) -> IndexMap<String, String> {
        self.correlations
    }

    pub fn unresolved_ids(&self) -> impl Iterator<Item = &str> {
        self.unresolved.keys().map(|id| id.as_str())
    }

    pub fn unresolved_len(&self) -> usize {
        self.unresolved.len()
    }

    /// Number of catalog entities left out because of their domain
    pub fn excluded(&self) -> usize {
        self.excluded
    }

    fn mark_unresolved(&mut self, id: String) {
        let name = self.names.get(&id).cloned();
        self.unresolved.insert(id, name);
    }

    fn commit(&mut self, entity_id: &str, reference_id: &str) {
        self.unresolved.shift_remove(entity_id);
        self.correlations
            .insert(entity_id.to_string(), reference_id.to_string());
    }

    /// Drop correspondences whose reference id is unknown and mark those entities unresolved.
    pub fn remove_invalid(&mut self, reference_ids: &HashSet<String>) -> StageReport {
        let mut report = StageReport::new(Stage::InvalidRemoval, self.unresolved.len());

        let mut invalidated = Vec::new();
        self.correlations.retain(|source, target| {
            let valid = reference_ids.contains(target.as_str());
            if !valid {
                invalidated.push((source.clone(), target.clone()));
            }
            valid
        });
        for (source, _) in &invalidated {
            self.mark_unresolved(source.clone());
        }

        report.invalidated = invalidated;
        report.remaining = self.unresolved.len();
        report
    }

    /// Match every unresolved entity with a known name against the taxon index.
    ///
    /// Matching runs in parallel; commits happen afterwards in unresolved-set order.
    pub fn match_by_name(
        &mut self,
        index: &TaxonIndex,
        allow_species_fallback: bool,
    ) -> StageReport {
        let mut report = StageReport::new(Stage::NameMatching, self.unresolved.len());

        let named: Vec<(&String, &String)> = self
            .unresolved
            .iter()
            .filter_map(|(id, name)| name.as_ref().map(|name| (id, name)))
            .collect();
        let found: Vec<(String, NameMatch)> = named
            .par_iter()
            .filter_map(|(id, name)| {
                match_name(name, index, allow_species_fallback).map(|m| ((*id).clone(), m))
            })
            .collect();

        for (entity_id, name_match) in found {
            self.commit(&entity_id, &name_match.reference_id);
            report.resolutions.push(Resolution {
                entity_id,
                reference_id: name_match.reference_id.clone(),
                evidence: Evidence::Name(name_match),
            });
        }

        report.remaining = self.unresolved.len();
        report
    }

    /// Align the sequences of unresolved entities and adopt the best reference per genome.
    pub fn match_by_sequence(
        &mut self,
        runner: &dyn AlignmentRunner,
        config: &ReduceConfig,
    ) -> Result<StageReport> {
        let mut report = StageReport::new(Stage::SequenceMatching, self.unresolved.len());

        let queries: IndexSet<String> = self.unresolved.keys().cloned().collect();
        let hits = runner.run(&queries)?;
        let best = reduce_hits(&hits, config);

        // Cached output may cover genomes that are resolved by now
        for (entity_id, hit) in best {
            if !self.unresolved.contains_key(&entity_id) {
                continue;
            }
            self.commit(&entity_id, &hit.target_id);
            report.resolutions.push(Resolution {
                entity_id,
                reference_id: hit.target_id.clone(),
                evidence: Evidence::Sequence(hit),
            });
        }

        report.remaining = self.unresolved.len();
        Ok(report)
    }

    /// Run the enabled stages in order: invalid-id removal, name matching, sequence matching.
    ///
    /// Nothing runs unless at least one matching stage is enabled. Matching stages are skipped
    /// once the unresolved set is empty.
    pub fn run(
        &mut self,
        config: &ResolveConfig,
        reference_ids: &HashSet<String>,
        index: &TaxonIndex,
        runner: Option<&dyn AlignmentRunner>,
    ) -> RunSummary {
        let mut summary = RunSummary::default();
        if !config.by_name && !config.by_sequence {
            return summary;
        }

        summary.reports.push(self.remove_invalid(reference_ids));

        if config.by_name && !self.unresolved.is_empty() {
            summary
                .reports
                .push(self.match_by_name(index, config.species_fallback));
        }

        if config.by_sequence && !self.unresolved.is_empty() {
            let outcome = match runner {
                Some(runner) => self.match_by_sequence(runner, &config.reduce),
                None => Err(anyhow!("sequence matching requested without an aligner")),
            };
            match outcome {
                Ok(report) => summary.reports.push(report),
                Err(err) => summary.sequence_error = Some(err),
            }
        }

        summary
    }
}
