use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::features::Features;

/// Universal part-of-speech tag.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "UPPERCASE")]
pub enum Pos {
	Det,
	Adj,
	Noun,
	Propn,
	Verb,
	Aux,
	Pron,
	Adp,
	Adv,
	Cconj,
	Sconj,
	Num,
	Punct,
	X,
}

impl Pos {
	/// All tags, in declaration order.
	pub const ALL: [Pos; 14] = [
		Pos::Det, Pos::Adj, Pos::Noun, Pos::Propn, Pos::Verb, Pos::Aux, Pos::Pron,
		Pos::Adp, Pos::Adv, Pos::Cconj, Pos::Sconj, Pos::Num, Pos::Punct, Pos::X,
	];

	/// Upper-case UD tag.
	pub fn tag(self) -> &'static str {
		match self {
			Pos::Det => "DET",
			Pos::Adj => "ADJ",
			Pos::Noun => "NOUN",
			Pos::Propn => "PROPN",
			Pos::Verb => "VERB",
			Pos::Aux => "AUX",
			Pos::Pron => "PRON",
			Pos::Adp => "ADP",
			Pos::Adv => "ADV",
			Pos::Cconj => "CCONJ",
			Pos::Sconj => "SCONJ",
			Pos::Num => "NUM",
			Pos::Punct => "PUNCT",
			Pos::X => "X",
		}
	}

	/// Tags that can head or fill a subject/object slot.
	pub fn is_nominal(self) -> bool {
		matches!(self, Pos::Noun | Pos::Propn | Pos::Pron)
	}

	/// Tags conjugated for person and number.
	pub fn is_verbal(self) -> bool {
		matches!(self, Pos::Verb | Pos::Aux)
	}

	/// Lenient conversion used by dictionary loaders: unknown categories map to `X`.
	pub fn from_category(category: &str) -> Pos {
		category.parse().unwrap_or(Pos::X)
	}
}

impl FromStr for Pos {
	type Err = String;

	/// Accepts UD tags (`NOUN`) and Lefff categories (`nc`, `v`, `cln`...).
	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let s = s.trim();
		let pos = match s.to_uppercase().as_str() {
			"DET" => Pos::Det,
			"ADJ" => Pos::Adj,
			"NOUN" | "NC" => Pos::Noun,
			"PROPN" | "NP" => Pos::Propn,
			"VERB" | "V" => Pos::Verb,
			"AUX" | "AUXETRE" | "AUXAVOIR" => Pos::Aux,
			"PRON" | "PRO" | "CLN" | "CLA" | "CLD" | "CLR" | "CLL" | "CLG" | "PREL" | "PRI" => Pos::Pron,
			"ADP" | "PREP" => Pos::Adp,
			"ADV" | "ADVNEG" | "ADVPREF" => Pos::Adv,
			"CCONJ" | "COO" => Pos::Cconj,
			"SCONJ" | "CSU" | "QUE" => Pos::Sconj,
			"NUM" => Pos::Num,
			"PUNCT" | "PONCT" | "PONCTW" | "PONCTS" | "POUV" | "PFERM" => Pos::Punct,
			"X" => Pos::X,
			_ => return Err(format!("Unknown part of speech: {s}")),
		};
		Ok(pos)
	}
}

impl fmt::Display for Pos {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.tag())
	}
}

/// Dependency relation between a token and its head.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Relation {
	Nsubj,
	NsubjPass,
	Obj,
	Det,
	Amod,
	Root,
	Other(String),
}

impl Relation {
	/// True for `nsubj` and `nsubj:pass`.
	pub fn is_subject(&self) -> bool {
		matches!(self, Relation::Nsubj | Relation::NsubjPass)
	}

	pub fn label(&self) -> &str {
		match self {
			Relation::Nsubj => "nsubj",
			Relation::NsubjPass => "nsubj:pass",
			Relation::Obj => "obj",
			Relation::Det => "det",
			Relation::Amod => "amod",
			Relation::Root => "root",
			Relation::Other(label) => label,
		}
	}
}

impl From<&str> for Relation {
	fn from(label: &str) -> Self {
		match label.trim().to_lowercase().as_str() {
			"nsubj" => Relation::Nsubj,
			"nsubj:pass" => Relation::NsubjPass,
			"obj" => Relation::Obj,
			"det" => Relation::Det,
			"amod" => Relation::Amod,
			"root" => Relation::Root,
			other => Relation::Other(other.to_owned()),
		}
	}
}

impl Default for Relation {
	fn default() -> Self {
		Relation::Other("dep".to_owned())
	}
}

impl fmt::Display for Relation {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.label())
	}
}

/// One analysed word of a sentence.
///
/// `head` is a 0-based index into the token slice the token belongs to,
/// `None` for the root or when no attachment was found.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Token {
	pub text: String,
	pub lemma: String,
	pub pos: Pos,
	pub dep: Relation,
	pub head: Option<usize>,
	pub features: Features,
}

impl Token {
	/// Creates an unattached token.
	pub fn new(text: &str, lemma: &str, pos: Pos, features: Features) -> Self {
		Self {
			text: text.to_owned(),
			lemma: lemma.to_owned(),
			pos,
			dep: Relation::default(),
			head: None,
			features,
		}
	}

	/// Lemma used for repetition checks: the lemma, else the surface form,
	/// trimmed and lower-cased.
	pub fn repetition_key(&self) -> String {
		let key = if self.lemma.trim().is_empty() { &self.text } else { &self.lemma };
		key.trim().to_lowercase()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn pos_accepts_ud_and_lefff() {
		assert_eq!("NOUN".parse::<Pos>(), Ok(Pos::Noun));
		assert_eq!("nc".parse::<Pos>(), Ok(Pos::Noun));
		assert_eq!("cln".parse::<Pos>(), Ok(Pos::Pron));
		assert_eq!("auxEtre".parse::<Pos>(), Ok(Pos::Aux));
		assert!("blah".parse::<Pos>().is_err());
		assert_eq!(Pos::from_category("blah"), Pos::X);
	}

	#[test]
	fn relation_labels() {
		assert!(Relation::from("nsubj:pass").is_subject());
		assert!(!Relation::from("obj").is_subject());
		assert_eq!(Relation::from("compound").label(), "compound");
	}

	#[test]
	fn repetition_key_falls_back_to_text() {
		let token = Token::new(" Petit ", "", Pos::Adj, Features::default());
		assert_eq!(token.repetition_key(), "petit");
	}
}
