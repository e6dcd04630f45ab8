//! Template-driven sentence generation.
//!
//! A template is a pattern of part-of-speech slots (`DET? ADJ* NOUN ADJ*`)
//! plus the constraints its output must satisfy. `TemplateGenerator` fills the
//! slots from `LexicalItems`, pruning disagreeing branches as it goes.

/// Templates, lexical items and the backtracking generator.
pub mod template;

pub use template::{LexicalItems, Quantifier, Slot, Template, TemplateGenerator};
