use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::io::Read;
use std::path::Path;

use log::{debug, info, warn};
use quick_xml::events::Event;
use quick_xml::Reader;
use serde::{Deserialize, Serialize};

use crate::error::{AccordError, Result};
use crate::io::{cache_path, is_up_to_date, source_name};
use super::features::Features;
use super::token::Pos;

/// Embedded lexicon used when no external dictionary is configured.
const BUILTIN_LEXICON: &str = include_str!("../../data/lexique.tsv");

/// One inflected form of a dictionary.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
pub struct LexicalEntry {
	pub form: String,
	pub lemma: String,
	pub pos: Pos,
	pub features: Features,
}

/// Full-form French dictionary.
///
/// Forms are indexed lower-cased; a form may have several readings
/// (`souris` is a feminine noun, singular or plural, and a verb form).
///
/// # Invariants
/// - Each reading is stored once per form.
/// - Every lemma in `lemmas` points to forms present in `forms`.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct Lexicon {
	forms: HashMap<String, Vec<LexicalEntry>>,
	lemmas: HashMap<String, BTreeSet<String>>,
	sources: Vec<String>,
}

/// Morphalou entry being assembled while streaming the XML.
#[derive(Default)]
struct MorphalouEntry {
	lemma: String,
	pos: String,
	forms: Vec<BTreeMap<String, String>>,
}

impl Lexicon {
	/// Returns the embedded lexicon.
	pub fn builtin() -> Result<Self> {
		let mut lexicon = Self::from_lefff_reader(BUILTIN_LEXICON.as_bytes(), Path::new("<builtin>"))?;
		lexicon.sources.push("builtin".to_owned());
		Ok(lexicon)
	}

	/// Loads a dictionary, going through a binary cache stored next to it.
	///
	/// - `.xml` files are read as Morphalou, anything else as Lefff TSV.
	/// - `<file>.bin` (e.g. `lefff.txt.bin`) is used when it is at least as recent as the source.
	/// - A stale or unreadable cache is rebuilt from the source.
	pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
		let path = path.as_ref();
		let cache = cache_path(path, "bin")
			.map_err(|e| AccordError::io(format!("Invalid dictionary path {}", path.display()), e))?;

		if is_up_to_date(path, &cache) {
			match Self::read_cache(&cache) {
				Ok(lexicon) => {
					debug!("Loaded {} forms from cache {}", lexicon.len(), cache.display());
					return Ok(lexicon);
				}
				Err(e) => warn!("Ignoring unreadable cache {}: {e}", cache.display()),
			}
		}

		let lexicon = Self::load_source(path)?;
		if let Err(e) = lexicon.write_cache(&cache) {
			warn!("Could not write cache {}: {e}", cache.display());
		}
		Ok(lexicon)
	}

	/// Parses a dictionary without touching any cache.
	pub fn load_source<P: AsRef<Path>>(path: P) -> Result<Self> {
		let path = path.as_ref();
		let is_xml = path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("xml"));
		let mut lexicon = if is_xml {
			Self::load_morphalou(path)?
		} else {
			Self::load_lefff(path)?
		};

		let name = source_name(path).map_err(|e| AccordError::io("Invalid dictionary name", e))?;
		lexicon.sources = vec![name];
		info!("Loaded {} forms from {}", lexicon.len(), path.display());
		Ok(lexicon)
	}

	/// Loads a Lefff-style tab separated file: `form lemma pos features`.
	pub fn load_lefff<P: AsRef<Path>>(path: P) -> Result<Self> {
		let path = path.as_ref();
		let file = std::fs::File::open(path)
			.map_err(|e| AccordError::io(format!("Cannot open {}", path.display()), e))?;
		Self::from_lefff_reader(file, path)
	}

	fn from_lefff_reader<R: Read>(input: R, origin: &Path) -> Result<Self> {
		let mut reader = csv::ReaderBuilder::new()
			.delimiter(b'\t')
			.has_headers(false)
			.flexible(true)
			.quoting(false)
			.comment(Some(b'#'))
			.from_reader(input);

		let mut lexicon = Self::default();
		for record in reader.records() {
			let record = record.map_err(|source| AccordError::Lefff { path: origin.to_path_buf(), source })?;
			let (Some(form), Some(lemma), Some(pos)) = (record.get(0), record.get(1), record.get(2)) else {
				warn!("{}: skipping row with {} columns", origin.display(), record.len());
				continue;
			};
			if form.trim().is_empty() {
				continue;
			}

			let features = record.get(3).map(Features::parse_any).unwrap_or_default();
			lexicon.insert(LexicalEntry {
				form: form.trim().to_owned(),
				lemma: lemma.trim().to_owned(),
				pos: Pos::from_category(pos),
				features,
			});
		}

		Ok(lexicon)
	}

	/// Loads a Morphalou XML export.
	pub fn load_morphalou<P: AsRef<Path>>(path: P) -> Result<Self> {
		let path = path.as_ref();
		let content = std::fs::read_to_string(path)
			.map_err(|e| AccordError::io(format!("Cannot read {}", path.display()), e))?;
		Self::parse_morphalou(&content, path)
	}

	fn parse_morphalou(content: &str, origin: &Path) -> Result<Self> {
		let xml_error = |source| AccordError::Morphalou { path: origin.to_path_buf(), source };

		let mut reader = Reader::from_str(content);
		reader.config_mut().trim_text(true);

		let mut lexicon = Self::default();
		let mut elements: Vec<String> = Vec::new();
		let mut entry: Option<MorphalouEntry> = None;
		let mut form: Option<BTreeMap<String, String>> = None;

		loop {
			match reader.read_event().map_err(xml_error)? {
				Event::Start(e) => {
					let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
					match name.as_str() {
						"entry" => entry = Some(MorphalouEntry::default()),
						"inflected_form" => form = Some(BTreeMap::new()),
						_ => (),
					}
					elements.push(name);
				}
				Event::Text(t) => {
					let text = t.unescape().map_err(|e| xml_error(e.into()))?.trim().to_owned();
					let Some(element) = elements.last() else { continue };
					if let Some(fields) = form.as_mut() {
						fields.insert(element.clone(), text);
					} else if let Some(entry) = entry.as_mut() {
						match element.as_str() {
							"lemma" => entry.lemma = text,
							"pos" => entry.pos = text,
							_ => (),
						}
					}
				}
				Event::End(e) => {
					elements.pop();
					match e.local_name().as_ref() {
						b"inflected_form" => {
							if let (Some(fields), Some(entry)) = (form.take(), entry.as_mut()) {
								entry.forms.push(fields);
							}
						}
						b"entry" => {
							if let Some(entry) = entry.take() {
								lexicon.add_morphalou_entry(entry);
							}
						}
						_ => (),
					}
				}
				Event::Eof => break,
				_ => (),
			}
		}

		Ok(lexicon)
	}

	fn add_morphalou_entry(&mut self, entry: MorphalouEntry) {
		let pos = Self::morphalou_pos(&entry.pos);
		for fields in entry.forms {
			let Some(form) = fields.get("form").filter(|f| !f.is_empty()) else { continue };
			let mut features = Features::default();
			for (key, value) in &fields {
				if key != "form" {
					features.set(key, value);
				}
			}
			self.insert(LexicalEntry {
				form: form.clone(),
				lemma: entry.lemma.clone(),
				pos,
				features,
			});
		}
	}

	/// Maps Morphalou grammatical categories, falling back to UD/Lefff names.
	fn morphalou_pos(category: &str) -> Pos {
		match category.trim().to_lowercase().as_str() {
			"commonnoun" | "noun" => Pos::Noun,
			"propernoun" => Pos::Propn,
			"adjective" | "qualifyingadjective" => Pos::Adj,
			"verb" => Pos::Verb,
			"determiner" | "article" => Pos::Det,
			"pronoun" | "personalpronoun" => Pos::Pron,
			"adverb" => Pos::Adv,
			"preposition" => Pos::Adp,
			"coordinatingconjunction" => Pos::Cconj,
			"subordinatingconjunction" => Pos::Sconj,
			other => Pos::from_category(other),
		}
	}

	fn read_cache(path: &Path) -> Result<Self> {
		let bytes = std::fs::read(path)
			.map_err(|e| AccordError::io(format!("Cannot read cache {}", path.display()), e))?;
		Ok(postcard::from_bytes(&bytes)?)
	}

	fn write_cache(&self, path: &Path) -> Result<()> {
		let bytes = postcard::to_stdvec(self)?;
		std::fs::write(path, bytes)
			.map_err(|e| AccordError::io(format!("Cannot write cache {}", path.display()), e))
	}

	/// Adds a reading; duplicates are ignored.
	pub fn insert(&mut self, entry: LexicalEntry) {
		let key = entry.form.to_lowercase();
		let readings = self.forms.entry(key.clone()).or_default();
		if readings.contains(&entry) {
			return;
		}
		self.lemmas.entry(entry.lemma.to_lowercase()).or_default().insert(key);
		readings.push(entry);
	}

	/// Merges another lexicon into this one.
	///
	/// Readings of `other` are appended after the existing ones, so the
	/// lexicon merged first wins ties during analysis.
	pub fn merge(&mut self, other: &Self) {
		for readings in other.forms.values() {
			for entry in readings {
				self.insert(entry.clone());
			}
		}
		self.sources.extend(other.sources.iter().cloned());
	}

	/// All readings of a surface form (case-insensitive).
	pub fn lookup(&self, form: &str) -> &[LexicalEntry] {
		self.forms.get(&form.to_lowercase()).map(Vec::as_slice).unwrap_or(&[])
	}

	/// Readings of a surface form restricted to one part of speech.
	pub fn lookup_pos(&self, form: &str, pos: Pos) -> Vec<&LexicalEntry> {
		self.lookup(form).iter().filter(|e| e.pos == pos).collect()
	}

	/// All inflected forms recorded for a lemma.
	pub fn forms_of(&self, lemma: &str) -> Vec<&LexicalEntry> {
		let lemma = lemma.to_lowercase();
		let Some(keys) = self.lemmas.get(&lemma) else {
			return Vec::new();
		};
		keys.iter()
			.flat_map(|key| self.lookup(key))
			.filter(|entry| entry.lemma.to_lowercase() == lemma)
			.collect()
	}

	/// Names of the dictionaries merged into this lexicon.
	pub fn sources(&self) -> &[String] {
		&self.sources
	}

	/// Number of distinct surface forms.
	pub fn len(&self) -> usize {
		self.forms.len()
	}

	pub fn is_empty(&self) -> bool {
		self.forms.is_empty()
	}
}
