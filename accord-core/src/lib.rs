//! Morphosyntax under constraints for French.
//!
//! This crate provides:
//! - Dictionary-driven morphological analysis (Lefff / Morphalou / embedded lexicon)
//! - Agreement checks (gender, number, subject-verb, object) over analysed tokens
//! - Template-based generation of agreeing noun phrases and clauses
//! - Constrained beam search and weighted finite-state decoding
//! - Sentence verification and corpus grammaticality evaluation

/// Crate-wide error type.
pub mod error;

/// Features, tokens, lexicons and analyzers.
pub mod morphology;

/// Agreement checker, automata and constrained decoder.
pub mod constraints;

/// Template-driven sentence generation.
pub mod generation;

/// Single-sentence grammaticality verdicts.
pub mod verification;

/// Corpus-level grammaticality rate and error counts.
pub mod evaluation;

/// TOML configuration.
pub mod config;

/// Path helpers and file listing.
///
/// Not exposed
pub(crate) mod io;

pub use error::{AccordError, Result};
