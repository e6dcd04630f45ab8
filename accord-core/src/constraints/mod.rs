//! Grammatical constraints and constrained decoding.
//!
//! - `AgreementChecker`: noun phrase shape, repetition and agreement checks
//! - `ConstrainedDecoder`: beam search keeping only agreeing hypotheses
//! - `Fst`: weighted transducers encoding agreement as automata

/// Agreement, template and repetition checks over analysed tokens.
pub mod agreement;

/// Tropical-semiring transducers: composition, determinization, minimization, shortest path.
pub mod automaton;

/// Constrained beam search and automaton-based decoding.
pub mod decoder;

pub use agreement::{AgreementChecker, AgreementConfig, AgreementScope, Constraint};
pub use automaton::{Arc, Fst, FstPath, SymbolTable};
pub use decoder::{ConstrainedDecoder, FeatureKind, Hypothesis};
