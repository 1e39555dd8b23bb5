// Library exports for taxmatch
pub mod aligner;
pub mod fasta;
pub mod hit_reducer;
pub mod hits;
pub mod input;
pub mod name_match;
pub mod name_parse;
pub mod resolve;
pub mod tables;
pub mod taxon_index;
