/// Tiered approximate matching of organism names against a `TaxonIndex`
///
/// Tiers are tried from strictest to loosest and the first tier that yields a candidate wins:
/// exact strain, normalized strain, shared strain token (long tokens first), and optionally
/// any reference of the same species.
use std::fmt;

use crate::name_parse::{parse_name, ParsedName};
use crate::taxon_index::{StrainBuckets, TaxonEntry, TaxonIndex};

/// Minimum token lengths tried by the partial-token tier, most specific first
pub const TOKEN_LENGTHS: [usize; 4] = [5, 4, 3, 2];

/// Characters additionally treated as token separators, `None` meaning whitespace only
const SEPARATOR_VARIANTS: [Option<char>; 3] = [None, Some('-'), Some('/')];

/// How a name match was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchTier {
    ExactStrain,
    NormalizedStrain,
    /// A strain token of at least `min_len` characters is shared
    PartialToken { min_len: usize },
    SpeciesOnly,
}

impl MatchTier {
    /// Confidence level, 1 being the strongest. Tokens of length 5 rank with length 4.
    pub fn level(&self) -> u8 {
        match self {
            MatchTier::ExactStrain => 1,
            MatchTier::NormalizedStrain => 2,
            MatchTier::PartialToken { min_len } if *min_len >= 4 => 3,
            MatchTier::PartialToken { min_len: 3 } => 4,
            MatchTier::PartialToken { .. } => 5,
            MatchTier::SpeciesOnly => 6,
        }
    }
}

impl fmt::Display for MatchTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchTier::ExactStrain => write!(f, "exact_strain"),
            MatchTier::NormalizedStrain => write!(f, "normalized_strain"),
            MatchTier::PartialToken { min_len } => write!(f, "partial_token_{min_len}"),
            MatchTier::SpeciesOnly => write!(f, "species_only"),
        }
    }
}

/// A reference chosen for a query name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameMatch {
    pub reference_id: String,
    pub reference_name: String,
    pub tier: MatchTier,
}

impl NameMatch {
    fn new(entry: &TaxonEntry, tier: MatchTier) -> Self {
        NameMatch {
            reference_id: entry.reference_id.clone(),
            reference_name: entry.name.clone(),
            tier,
        }
    }
}

/// Find the best reference for an organism name.
pub fn match_name(
    entity_name: &str,
    index: &TaxonIndex,
    allow_species_fallback: bool,
) -> Option<NameMatch> {
    match_parsed(&parse_name(entity_name), index, allow_species_fallback)
}

/// Same as `match_name` for an already parsed name.
pub fn match_parsed(
    query: &ParsedName,
    index: &TaxonIndex,
    allow_species_fallback: bool,
) -> Option<NameMatch> {
    if query.genus.is_empty() || query.species.is_empty() {
        return None;
    }
    let buckets = index.species(&query.genus, &query.species)?;

    if let Some(entry) = index
        .strain(&query.genus, &query.species, &query.strain)
        .and_then(|entries| entries.first())
    {
        return Some(NameMatch::new(entry, MatchTier::ExactStrain));
    }

    if let Some(entry) =
        candidates(buckets).find(|entry| entry.strain_normalized == query.strain_normalized)
    {
        return Some(NameMatch::new(entry, MatchTier::NormalizedStrain));
    }

    if let Some(found) = match_partial_tokens(query, buckets) {
        return Some(found);
    }

    if allow_species_fallback {
        if let Some(entry) = candidates(buckets).next() {
            return Some(NameMatch::new(entry, MatchTier::SpeciesOnly));
        }
    }

    None
}

fn candidates(buckets: &StrainBuckets) -> impl Iterator<Item = &TaxonEntry> {
    buckets.values().flatten()
}

/// One way of cutting a normalized strain into comparable tokens
#[derive(Debug, Clone, Copy)]
struct TokenVariant {
    min_len: usize,
    separator: Option<char>,
    strip_prefix: bool,
}

impl TokenVariant {
    /// All variants in search order: length, then separator, then prefix stripping.
    fn all() -> impl Iterator<Item = TokenVariant> {
        TOKEN_LENGTHS.into_iter().flat_map(|min_len| {
            SEPARATOR_VARIANTS.into_iter().flat_map(move |separator| {
                [false, true].into_iter().map(move |strip_prefix| TokenVariant {
                    min_len,
                    separator,
                    strip_prefix,
                })
            })
        })
    }

    fn tokens(&self, strain: &str) -> Vec<String> {
        let text = match self.separator {
            Some(sep) => strain.replace(sep, " "),
            None => strain.to_string(),
        };
        text.split_whitespace()
            .filter(|token| token.chars().count() >= self.min_len)
            .map(|token| {
                if self.strip_prefix {
                    strip_double_underscore_prefix(token)
                } else {
                    token
                }
            })
            .filter(|token| !token.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// "prefix__ABC" -> "ABC"
fn strip_double_underscore_prefix(token: &str) -> &str {
    token
        .split_once("__")
        .map(|(_, rest)| rest)
        .unwrap_or(token)
}

fn match_partial_tokens(query: &ParsedName, buckets: &StrainBuckets) -> Option<NameMatch> {
    let query_tokens: Vec<(TokenVariant, Vec<String>)> = TokenVariant::all()
        .map(|variant| (variant, variant.tokens(&query.strain_normalized)))
        .filter(|(_, tokens)| !tokens.is_empty())
        .collect();
    if query_tokens.is_empty() {
        return None;
    }

    for entry in candidates(buckets) {
        for (variant, wanted) in &query_tokens {
            let shared = variant
                .tokens(&entry.strain_normalized)
                .iter()
                .any(|token| wanted.contains(token));
            if shared {
                let tier = MatchTier::PartialToken {
                    min_len: variant.min_len,
                };
                return Some(NameMatch::new(entry, tier));
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index_of(references: &[(&str, &str)]) -> TaxonIndex {
        TaxonIndex::build(references.iter().copied())
    }

    #[test]
    fn test_exact_strain_after_normalization() {
        let index = index_of(&[
            ("R1", "Lactobacillus casei LC2W"),
            ("R2", "Lactobacillus casei str. LC2W"),
        ]);
        let found = match_name("Lactobacillus casei LC2W", &index, false).unwrap();
        assert_eq!(found.tier, MatchTier::ExactStrain);
        assert_eq!(found.reference_id, "R1");
    }

    #[test]
    fn test_normalized_strain_tier() {
        let index = index_of(&[("R1", "Bacillus subtilis 168, ATCC")]);
        let found = match_name("Bacillus subtilis strain 168", &index, false).unwrap();
        assert_eq!(found.tier, MatchTier::NormalizedStrain);
        assert_eq!(found.reference_name, "Bacillus subtilis 168, ATCC");
    }

    #[test]
    fn test_partial_token_matches_substrain_token() {
        let index = index_of(&[
            ("R1", "Escherichia coli O157:H7 EDL933"),
            ("R2", "Escherichia coli K-12 MG1655"),
        ]);
        let found = match_name("Escherichia coli MG1655 substr. X", &index, false).unwrap();
        assert_eq!(found.reference_id, "R2");
        assert_eq!(found.tier, MatchTier::PartialToken { min_len: 5 });
        assert_eq!(found.tier.level(), 3);
    }

    #[test]
    fn test_separator_variant_splits_hyphens() {
        let index = index_of(&[("R1", "Escherichia coli K-12")]);
        let found = match_name("Escherichia coli K 12 W3110", &index, false).unwrap();
        assert_eq!(found.tier, MatchTier::PartialToken { min_len: 2 });
        assert_eq!(found.tier.level(), 5);
    }

    #[test]
    fn test_prefix_strip_variant() {
        let index = index_of(&[("R1", "Sulfolobus islandicus REY15A")]);
        let found = match_name("Sulfolobus islandicus lab__REY15A", &index, false).unwrap();
        assert_eq!(found.reference_id, "R1");
        assert_eq!(found.tier, MatchTier::PartialToken { min_len: 5 });
    }

    #[test]
    fn test_empty_normalized_strains_match() {
        let index = index_of(&[("R1", "Bacillus subtilis ATCC")]);
        let found = match_name("Bacillus subtilis strain", &index, false).unwrap();
        assert_eq!(found.reference_id, "R1");
        assert_eq!(found.tier, MatchTier::NormalizedStrain);
    }

    #[test]
    fn test_species_fallback_only_when_allowed() {
        let index = index_of(&[("R1", "Listeria monocytogenes EGD-e")]);
        assert_eq!(match_name("Listeria monocytogenes 10403S", &index, false), None);

        let found = match_name("Listeria monocytogenes 10403S", &index, true).unwrap();
        assert_eq!(found.tier, MatchTier::SpeciesOnly);
        assert_eq!(found.reference_id, "R1");
    }

    #[test]
    fn test_missing_species_never_matches() {
        let index = index_of(&[("R1", "Bacillus sp. JS1")]);
        assert_eq!(match_name("Bacillus sp. JS1", &index, true), None);
        assert_eq!(match_name("uncultured Bacillus", &index, true), None);
    }

    #[test]
    fn test_tier_display() {
        assert_eq!(MatchTier::PartialToken { min_len: 3 }.to_string(), "partial_token_3");
        assert_eq!(MatchTier::ExactStrain.to_string(), "exact_strain");
    }
}
