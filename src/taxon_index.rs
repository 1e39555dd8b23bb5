/// Three-level genus -> species -> strain index over reference organism names
///
/// Every level keeps insertion order, so iteration (and therefore "first candidate" tie-breaks
/// in the name matcher) follows the order in which references were supplied.
use indexmap::IndexMap;

use crate::name_parse::{parse_name, ParsedName};

/// One reference stored at a strain leaf
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaxonEntry {
    pub reference_id: String,
    /// Organism name as supplied, before parsing
    pub name: String,
    pub strain_normalized: String,
}

/// Strain buckets of one species
pub type StrainBuckets = IndexMap<String, Vec<TaxonEntry>>;

#[derive(Debug, Default)]
pub struct TaxonIndex {
    genera: IndexMap<String, IndexMap<String, StrainBuckets>>,
    len: usize,
    skipped: usize,
}

impl TaxonIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an index from (reference id, organism name) pairs.
    ///
    /// References whose name has no parseable genus are counted in `skipped()` and left out.
    pub fn build<'a, I>(references: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut index = Self::new();
        for (reference_id, name) in references {
            let parsed = parse_name(name);
            if parsed.genus.is_empty() {
                index.skipped += 1;
                continue;
            }
            index.insert(reference_id, name, parsed);
        }
        index
    }

    /// Add one reference under its parsed genus, species and strain.
    pub fn insert(&mut self, reference_id: &str, name: &str, parsed: ParsedName) {
        let ParsedName {
            genus,
            species,
            strain,
            strain_normalized,
            ..
        } = parsed;

        self.genera
            .entry(genus)
            .or_default()
            .entry(species)
            .or_default()
            .entry(strain)
            .or_default()
            .push(TaxonEntry {
                reference_id: reference_id.to_string(),
                name: name.to_string(),
                strain_normalized,
            });
        self.len += 1;
    }

    /// Strain buckets for a genus and species, if both are known.
    pub fn species(&self, genus: &str, species: &str) -> Option<&StrainBuckets> {
        self.genera.get(genus)?.get(species)
    }

    /// Entries filed under an exact genus, species and raw strain.
    pub fn strain(&self, genus: &str, species: &str, strain: &str) -> Option<&[TaxonEntry]> {
        self.species(genus, species)?
            .get(strain)
            .map(|entries| entries.as_slice())
    }

    /// Number of indexed references
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of references left out because their name had no genus
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn genus_count(&self) -> usize {
        self.genera.len()
    }
}
