//! Morphological layer: features, tokens, dictionaries and analysis.
//!
//! - `Features` / `Gender` / `Number` / `Person`: agreement-bearing traits
//! - `Token` / `Pos` / `Relation`: analysed words
//! - `Lexicon`: full-form dictionaries (Lefff TSV, Morphalou XML, embedded)
//! - `Analyzer` / `LexiconAnalyzer`: text to tokens

/// Gender, number, person and free-form traits.
pub mod features;

/// Part-of-speech tags, dependency relations and analysed tokens.
pub mod token;

/// Full-form dictionaries with a postcard binary cache.
pub mod lexicon;

/// Tokenization, tagging and shallow dependency attachment.
pub mod analyzer;

pub use analyzer::{Analyzer, LexiconAnalyzer};
pub use features::{Features, Gender, Number, Person};
pub use lexicon::{LexicalEntry, Lexicon};
pub use token::{Pos, Relation, Token};
