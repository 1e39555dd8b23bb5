//! Organism name parsing and strain normalization
//!
//! Free-text organism names ("Bifidobacterium longum subsp. infantis ATCC 15697") are split into
//! genus, species and strain. Rank abbreviations are expanded to full words and culture
//! collection numbers are fused into single tokens so that the strain part can be compared
//! across differently formatted catalogs.

use lazy_static::lazy_static;
use regex::{Captures, Regex};

/// Culture collection acronyms recognised in strain designations.
/// Longer acronyms come first where one is a prefix of another (DSMZ before DSM).
pub const CATALOG_ACRONYMS: &[&str] = &[
    "ATCC", "DSMZ", "DSM", "JCM", "NCTC", "NCIMB", "NRRL", "CCUG", "CIP", "LMG", "KCTC", "IFO",
    "NBRC", "CECT", "CGMCC", "VKM", "IAM", "NCDO", "CCM", "PCC", "UTEX", "CBS", "MTCC", "HAMBI",
    "KCCM", "ICMP", "CFBP", "NCPPB", "BCRC", "TISTR",
];

/// Rank words and the spellings that expand to them (compared lowercase).
const RANK_SPELLINGS: &[(&str, &[&str])] = &[
    ("species", &["sp.", "spp.", "sp", "spp", "species"]),
    ("subspecies", &["subsp.", "ssp.", "subsp", "subspecies"]),
    ("strain", &["str.", "strain"]),
    ("variety", &["var.", "variety"]),
    ("serovar", &["ser.", "sv.", "serovar"]),
    ("biovar", &["bv.", "biovar"]),
    ("pathovar", &["pv.", "pathovar"]),
    ("cultivar", &["cv.", "cultivar"]),
    ("genomovar", &["gv.", "genomovar"]),
    ("morphovar", &["mv.", "morphovar"]),
];

/// Ranks below species. A name whose second token is one of these carries no species epithet.
const INFRASPECIFIC_RANKS: &[&str] = &[
    "subspecies",
    "strain",
    "variety",
    "serovar",
    "biovar",
    "pathovar",
    "cultivar",
    "genomovar",
    "morphovar",
];

lazy_static! {
    static ref CATALOG_RE: Regex = Regex::new(&format!(
        r"(?i)\b({})\s*[:_-]?\s*(\d+)",
        CATALOG_ACRONYMS.join("|")
    ))
    .expect("catalog acronym pattern is valid");
    static ref GLUED_RANK_RE: Regex =
        Regex::new(r"(?i)\b(sp|spp|subsp|ssp|str|var|ser|sv|bv|pv|cv|gv|mv)\.([A-Za-z0-9])")
            .expect("rank abbreviation pattern is valid");
    static ref TOKEN_RE: Regex = Regex::new(r"\S+").expect("token pattern is valid");
}

/// Structured view of an organism name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedName {
    pub candidatus: bool,
    pub genus: String,
    pub species: String,
    /// Strain part as written, after rank expansion and catalog fusing
    pub strain: String,
    /// Strain with rank words, bare acronyms and punctuation removed
    pub strain_normalized: String,
}

impl ParsedName {
    /// True when the name yielded no genus (non-scientific or empty text).
    pub fn is_empty(&self) -> bool {
        self.genus.is_empty()
    }

    /// Render the name back as "[Candidatus ]Genus species strain".
    pub fn reconstruct(&self) -> String {
        let mut parts: Vec<&str> = Vec::with_capacity(4);
        if self.candidatus {
            parts.push("Candidatus");
        }
        for part in [&self.genus, &self.species, &self.strain] {
            if !part.is_empty() {
                parts.push(part);
            }
        }
        parts.join(" ")
    }
}

/// Parse a free-text organism name.
///
/// Names that do not start with an uppercase letter ("uncultured bacterium", "marine
/// metagenome") are not scientific names and give an empty `ParsedName`.
pub fn parse_name(name: &str) -> ParsedName {
    let trimmed = name.trim();
    if !trimmed.chars().next().is_some_and(char::is_uppercase) {
        return ParsedName::default();
    }

    let fused = fuse_catalog_numbers(trimmed);
    let spaced = GLUED_RANK_RE.replace_all(&fused, "${1}. ${2}");
    let expanded = expand_ranks(&spaced);

    let mut rest = expanded.trim();
    let mut candidatus = false;
    if let Some((first, tail)) = split_token(rest) {
        if first.eq_ignore_ascii_case("candidatus") {
            candidatus = true;
            rest = tail;
        }
    }

    let (genus, rest) = split_token(rest).unwrap_or(("", ""));

    let (species, rest) = match split_token(rest) {
        Some((token, _)) if INFRASPECIFIC_RANKS.contains(&token) => ("", rest),
        Some(("species", tail)) => ("", tail),
        Some((token, tail)) => (token, tail),
        None => ("", ""),
    };

    let strain = clean_strain(rest);
    let strain_normalized = massage_strain(&strain);

    ParsedName {
        candidatus,
        genus: genus.to_string(),
        species: species.to_string(),
        strain,
        strain_normalized,
    }
}

/// Reduce a strain designation to its comparable core.
///
/// Rank words and standalone collection acronyms are dropped, commas and semicolons removed and
/// whitespace collapsed. Fused catalog numbers ("DSM20016") are kept.
pub fn massage_strain(strain: &str) -> String {
    strain
        .replace([',', ';'], " ")
        .split_whitespace()
        .filter(|token| !is_rank_word(token) && !is_catalog_acronym(token))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Fuse "ATCC 33323" or "DSM:20016" into "ATCC33323" / "DSM20016".
pub fn fuse_catalog_numbers(text: &str) -> String {
    CATALOG_RE
        .replace_all(text, |caps: &Captures| {
            format!("{}{}", caps[1].to_uppercase(), &caps[2])
        })
        .into_owned()
}

fn expand_ranks(text: &str) -> String {
    TOKEN_RE
        .replace_all(text, |caps: &Captures| {
            let token = &caps[0];
            expand_rank_token(token)
                .map(str::to_string)
                .unwrap_or_else(|| token.to_string())
        })
        .into_owned()
}

fn expand_rank_token(token: &str) -> Option<&'static str> {
    let lower = token.to_lowercase();
    RANK_SPELLINGS
        .iter()
        .find(|(_, spellings)| spellings.contains(&lower.as_str()))
        .map(|(word, _)| *word)
}

fn is_rank_word(token: &str) -> bool {
    RANK_SPELLINGS.iter().any(|(word, _)| *word == token)
}

fn is_catalog_acronym(token: &str) -> bool {
    CATALOG_ACRONYMS
        .iter()
        .any(|acronym| acronym.eq_ignore_ascii_case(token))
}

/// First whitespace-delimited token and the (left-trimmed) remainder.
fn split_token(text: &str) -> Option<(&str, &str)> {
    let text = text.trim_start();
    if text.is_empty() {
        return None;
    }
    match text.find(char::is_whitespace) {
        Some(pos) => Some((&text[..pos], text[pos..].trim_start())),
        None => Some((text, "")),
    }
}

fn clean_strain(rest: &str) -> String {
    let mut strain = rest.trim();
    if let Some(stripped) = strain.strip_prefix(':') {
        strain = stripped.trim_start();
    }
    if strain == "strain" {
        strain = "";
    } else if let Some(stripped) = strain.strip_prefix("strain ") {
        strain = stripped.trim_start();
    }
    if strain.len() >= 2 && strain.starts_with('\'') && strain.ends_with('\'') {
        strain = strain[1..strain.len() - 1].trim();
    }
    strain.to_string()
}
