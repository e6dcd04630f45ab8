//! Error types shared by the whole crate.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type for accord.
#[derive(Debug, Error)]
pub enum AccordError {
	#[error("IO error: {context}")]
	Io {
		context: String,
		#[source]
		source: std::io::Error,
	},

	#[error("Malformed Lefff resource {path}: {source}")]
	Lefff {
		path: PathBuf,
		#[source]
		source: csv::Error,
	},

	#[error("Malformed Morphalou resource {path}: {source}")]
	Morphalou {
		path: PathBuf,
		#[source]
		source: quick_xml::Error,
	},

	#[error("Lexicon cache error: {0}")]
	Cache(#[from] postcard::Error),

	#[error("Configuration error: {0}")]
	Config(#[from] toml::de::Error),

	#[error("Template {0} not found")]
	TemplateNotFound(String),

	#[error("Invalid pattern: {0}")]
	InvalidPattern(String),

	#[error("Invalid input: {0}")]
	InvalidInput(String),

	#[error("Unknown constraint: {0}")]
	UnknownConstraint(String),

	#[error("Automaton error: {0}")]
	Automaton(String),
}

impl AccordError {
	/// Create an IO error with context.
	pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
		Self::Io {
			context: context.into(),
			source,
		}
	}
}

/// Result type alias for accord.
pub type Result<T> = std::result::Result<T, AccordError>;
