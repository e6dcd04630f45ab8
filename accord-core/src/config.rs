//! TOML configuration shared by the command-line tools and the server.
//!
//! Every field has a default, so an empty file (or no file at all) is a
//! valid configuration:
//!
//! ```toml
//! [lexicon]
//! dict_path = "dicts"
//! files = ["lefff.txt"]
//!
//! [checker]
//! post_adj_max = 1
//!
//! [generation.lexical_items]
//! DET = ["Le", "La"]
//! NOUN = ["chat", "chatte"]
//!
//! [server]
//! port = 8080
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use log::info;
use serde::{Deserialize, Serialize};

use crate::constraints::agreement::{AgreementConfig, Constraint};
use crate::error::{AccordError, Result};
use crate::generation::template::{DEFAULT_CHUNK_SIZE, DEFAULT_MAX_REPETITIONS, LexicalItems};
use crate::io;
use crate::morphology::{Lexicon, LexiconAnalyzer};

/// Environment variable naming the configuration file.
pub const CONFIG_ENV: &str = "ACCORD_CONFIG";

/// Dictionary file extensions recognised in the dictionary folder.
pub const LEXICON_EXTENSIONS: [&str; 3] = ["tsv", "txt", "xml"];

/// Which dictionaries make up the analyzer's lexicon.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct LexiconSettings {
	/// Folder holding dictionary files; `files` are names inside it.
	pub dict_path: PathBuf,
	/// Dictionaries merged after the embedded one.
	pub files: Vec<String>,
	/// Start from the embedded lexicon.
	pub builtin: bool,
	/// Read and write `.bin` caches next to the dictionaries.
	pub cache: bool,
}

impl Default for LexiconSettings {
	fn default() -> Self {
		Self { dict_path: PathBuf::from("dicts"), files: Vec::new(), builtin: true, cache: true }
	}
}

impl LexiconSettings {
	pub fn dict_folder(&self) -> PathBuf {
		io::resolve_folder(&self.dict_path)
	}

	/// Dictionary files present in the dictionary folder.
	pub fn available(&self) -> Result<Vec<String>> {
		let folder = self.dict_folder();
		io::list_files(&folder, &LEXICON_EXTENSIONS)
			.map_err(|e| AccordError::io(format!("Cannot list {}", folder.display()), e))
	}

	/// Loads one dictionary of the dictionary folder.
	///
	/// # Errors
	/// `InvalidInput` when `name` is absolute or climbs out of the folder with `..`.
	pub fn load_file(&self, name: &str) -> Result<Lexicon> {
		let path = io::confined_join(&self.dict_folder(), name).ok_or_else(|| {
			AccordError::InvalidInput(format!("Dictionary {name} is outside {}", self.dict_path.display()))
		})?;
		if self.cache { Lexicon::load(&path) } else { Lexicon::load_source(&path) }
	}

	/// Builds the lexicon from the embedded dictionary and `files`, in order.
	pub fn build_lexicon(&self) -> Result<Lexicon> {
		self.build_lexicon_with(&self.files)
	}

	/// Same as `build_lexicon` with another file list.
	pub fn build_lexicon_with(&self, files: &[String]) -> Result<Lexicon> {
		let mut lexicon = if self.builtin { Lexicon::builtin()? } else { Lexicon::default() };
		for name in files {
			let loaded = self.load_file(name)?;
			info!("[Lexicon] Merged {} ({} forms)", name, loaded.len());
			lexicon.merge(&loaded);
		}
		Ok(lexicon)
	}

	pub fn build_analyzer(&self) -> Result<LexiconAnalyzer> {
		Ok(LexiconAnalyzer::new(self.build_lexicon()?))
	}
}

/// Template generation settings.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct GenerationSettings {
	pub chunk_size: usize,
	pub max_repetitions: usize,
	/// Words per tag (`DET`, `ADJ`, `NOUN`...) used when a caller gives none.
	pub lexical_items: BTreeMap<String, Vec<String>>,
}

impl Default for GenerationSettings {
	fn default() -> Self {
		let words = |list: &[&str]| list.iter().map(|w| w.to_string()).collect::<Vec<_>>();
		let lexical_items = BTreeMap::from([
			("DET".to_owned(), words(&["Le", "La", "Les"])),
			("ADJ".to_owned(), words(&["petit", "petite", "grand", "grande"])),
			("NOUN".to_owned(), words(&["chat", "chatte", "chien", "chienne"])),
		]);
		Self { chunk_size: DEFAULT_CHUNK_SIZE, max_repetitions: DEFAULT_MAX_REPETITIONS, lexical_items }
	}
}

impl GenerationSettings {
	pub fn items(&self) -> Result<LexicalItems> {
		LexicalItems::from_tags(&self.lexical_items)
	}
}

/// Beam search settings.
///
/// `beam_width`, `max_length` and `constraints` are the defaults of a decode
/// request; the `max_*` fields bound what a request may ask for.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct DecoderSettings {
	pub beam_width: usize,
	pub max_length: usize,
	pub constraints: Vec<Constraint>,
	pub max_beam_width: usize,
	pub max_request_length: usize,
	pub max_vocabulary: usize,
}

impl Default for DecoderSettings {
	fn default() -> Self {
		Self {
			beam_width: 5,
			max_length: 20,
			constraints: Constraint::INCREMENTAL.to_vec(),
			max_beam_width: 16,
			max_request_length: 32,
			max_vocabulary: 256,
		}
	}
}

impl DecoderSettings {
	/// Rejects a decode request larger than the configured bounds.
	///
	/// # Errors
	/// `InvalidInput` naming the first bound exceeded.
	pub fn check_request(&self, beam_width: usize, max_length: usize, vocabulary: usize) -> Result<()> {
		let bounds = [
			("beam_width", beam_width, self.max_beam_width),
			("max_length", max_length, self.max_request_length),
			("vocabulary size", vocabulary, self.max_vocabulary),
		];
		match bounds.iter().find(|(_, value, bound)| value > bound) {
			Some((name, value, bound)) => Err(AccordError::InvalidInput(format!("{name} {value} exceeds {bound}"))),
			None => Ok(()),
		}
	}
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct ServerSettings {
	pub host: String,
	pub port: u16,
}

impl Default for ServerSettings {
	fn default() -> Self {
		Self { host: "127.0.0.1".to_owned(), port: 5000 }
	}
}

/// Whole configuration file.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct AccordConfig {
	pub lexicon: LexiconSettings,
	pub checker: AgreementConfig,
	pub generation: GenerationSettings,
	pub decoder: DecoderSettings,
	pub server: ServerSettings,
}

impl AccordConfig {
	/// Parses a TOML document.
	pub fn parse(text: &str) -> Result<Self> {
		Ok(toml::from_str(text)?)
	}

	/// Reads a TOML file.
	///
	/// # Errors
	/// `Io` when the file cannot be read, `Config` when it is not valid.
	pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
		let path = path.as_ref();
		let text = std::fs::read_to_string(path)
			.map_err(|e| AccordError::io(format!("Cannot read configuration {}", path.display()), e))?;
		Self::parse(&text)
	}

	/// Loads the file named by `ACCORD_CONFIG`, or the defaults when unset.
	pub fn from_env() -> Result<Self> {
		match std::env::var_os(CONFIG_ENV) {
			Some(path) => Self::load(path),
			None => Ok(Self::default()),
		}
	}
}
