use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Grammatical gender.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Gender {
	Masc,
	Fem,
}

/// Grammatical number.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Number {
	Sing,
	Plur,
}

/// Grammatical person.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Person {
	First,
	Second,
	Third,
}

impl Gender {
	/// Parses a gender value, tolerating UD, Morphalou and Lefff spellings.
	pub fn parse(value: &str) -> Option<Self> {
		match value.trim().to_lowercase().as_str() {
			"masc" | "masculine" | "m" => Some(Self::Masc),
			"fem" | "feminine" | "f" => Some(Self::Fem),
			_ => None,
		}
	}

	/// Symbol used by the constraint automata.
	pub fn symbol(self) -> &'static str {
		match self {
			Self::Masc => "masc",
			Self::Fem => "fem",
		}
	}
}

impl Number {
	/// Parses a number value, tolerating UD, Morphalou and Lefff spellings.
	pub fn parse(value: &str) -> Option<Self> {
		match value.trim().to_lowercase().as_str() {
			"sing" | "singular" | "sg" | "s" => Some(Self::Sing),
			"plur" | "plural" | "pl" | "p" => Some(Self::Plur),
			_ => None,
		}
	}

	/// Symbol used by the constraint automata.
	pub fn symbol(self) -> &'static str {
		match self {
			Self::Sing => "sing",
			Self::Plur => "plur",
		}
	}
}

impl Person {
	/// Parses a person value (`1`, `first`, `firstPerson`, ...).
	pub fn parse(value: &str) -> Option<Self> {
		match value.trim().to_lowercase().as_str() {
			"1" | "first" | "firstperson" => Some(Self::First),
			"2" | "second" | "secondperson" => Some(Self::Second),
			"3" | "third" | "thirdperson" => Some(Self::Third),
			_ => None,
		}
	}
}

impl fmt::Display for Gender {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			Self::Masc => "Masc",
			Self::Fem => "Fem",
		})
	}
}

impl fmt::Display for Number {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			Self::Sing => "Sing",
			Self::Plur => "Plur",
		})
	}
}

impl fmt::Display for Person {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			Self::First => "1",
			Self::Second => "2",
			Self::Third => "3",
		})
	}
}

/// Morphological features of a token or a dictionary form.
///
/// Gender, number and person are typed because agreement is checked on them.
/// Everything else (tense, mood, verb form...) is kept verbatim, lower-cased,
/// in `other`.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Features {
	pub gender: Option<Gender>,
	pub number: Option<Number>,
	pub person: Option<Person>,
	pub other: BTreeMap<String, String>,
}

impl Features {
	/// Parses a `Key=Value|Key=Value` bundle.
	///
	/// - Keys and values are lower-cased.
	/// - Items without `=` are ignored.
	/// - `""` and `"_"` give empty features.
	/// - A typed key with an unrecognized value is kept in `other`.
	pub fn parse(bundle: &str) -> Self {
		let mut features = Self::default();
		let bundle = bundle.trim();
		if bundle.is_empty() || bundle == "_" {
			return features;
		}

		for item in bundle.split('|') {
			if let Some((key, value)) = item.split_once('=') {
				features.set(key, value);
			}
		}
		features
	}

	/// Parses a compact Lefff morphological tag such as `ms`, `fp`, `P3s` or `K`.
	///
	/// Lower-case letters and digits carry gender, number and person; upper-case
	/// letters are tense/mood codes and are stored under `tense`.
	pub fn parse_compact(tag: &str) -> Self {
		let mut features = Self::default();
		let mut tenses = String::new();

		for c in tag.trim().chars() {
			match c {
				'm' => features.gender = Some(Gender::Masc),
				'f' => features.gender = Some(Gender::Fem),
				's' => features.number = Some(Number::Sing),
				'p' => features.number = Some(Number::Plur),
				'1' => features.person = Some(Person::First),
				'2' => features.person = Some(Person::Second),
				'3' => features.person = Some(Person::Third),
				c if c.is_ascii_uppercase() => {
					if let Some(tense) = Self::tense_name(c) {
						if !tenses.is_empty() {
							tenses.push(',');
						}
						tenses.push_str(tense);
					}
				}
				_ => (),
			}
		}

		if !tenses.is_empty() {
			features.other.insert("tense".to_owned(), tenses);
		}
		features
	}

	/// Parses a features column that may use either notation.
	pub fn parse_any(column: &str) -> Self {
		if column.contains('=') {
			Self::parse(column)
		} else {
			Self::parse_compact(column)
		}
	}

	fn tense_name(code: char) -> Option<&'static str> {
		match code {
			'P' => Some("pres"),
			'I' => Some("imp"),
			'J' => Some("past"),
			'F' => Some("fut"),
			'C' => Some("cnd"),
			'S' => Some("sub_pres"),
			'T' => Some("sub_imp"),
			'Y' => Some("imp_mood"),
			'K' => Some("part_past"),
			'G' => Some("part_pres"),
			'W' => Some("inf"),
			_ => None,
		}
	}

	/// Sets a single feature from a raw key/value pair.
	pub fn set(&mut self, key: &str, value: &str) {
		let key = key.trim().to_lowercase();
		let value = value.trim().to_lowercase();
		if key.is_empty() || value.is_empty() {
			return;
		}

		let typed = match key.as_str() {
			"gender" => Gender::parse(&value).map(|g| self.gender = Some(g)),
			"number" => Number::parse(&value).map(|n| self.number = Some(n)),
			"person" => Person::parse(&value).map(|p| self.person = Some(p)),
			_ => None,
		};

		if typed.is_none() {
			self.other.insert(key, value);
		}
	}

	/// Returns true when no feature at all is set.
	pub fn is_empty(&self) -> bool {
		self.gender.is_none() && self.number.is_none() && self.person.is_none() && self.other.is_empty()
	}

	/// Returns true when the given gender and number do not contradict these features.
	/// Unset values on either side never contradict.
	pub fn compatible_with(&self, gender: Option<Gender>, number: Option<Number>) -> bool {
		let gender_ok = match (self.gender, gender) {
			(Some(a), Some(b)) => a == b,
			_ => true,
		};
		let number_ok = match (self.number, number) {
			(Some(a), Some(b)) => a == b,
			_ => true,
		};
		gender_ok && number_ok
	}
}

impl fmt::Display for Features {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let mut parts = Vec::new();
		if let Some(g) = self.gender {
			parts.push(format!("Gender={g}"));
		}
		if let Some(n) = self.number {
			parts.push(format!("Number={n}"));
		}
		if let Some(p) = self.person {
			parts.push(format!("Person={p}"));
		}
		for (key, value) in &self.other {
			parts.push(format!("{key}={value}"));
		}

		if parts.is_empty() {
			f.write_str("_")
		} else {
			f.write_str(&parts.join("|"))
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_ud_bundle() {
		let features = Features::parse("Gender=Fem|Number=Sing|Tense=Pres");
		assert_eq!(features.gender, Some(Gender::Fem));
		assert_eq!(features.number, Some(Number::Sing));
		assert_eq!(features.person, None);
		assert_eq!(features.other.get("tense").map(String::as_str), Some("pres"));
	}

	#[test]
	fn empty_bundles() {
		assert!(Features::parse("").is_empty());
		assert!(Features::parse("_").is_empty());
		assert!(Features::parse("garbage").is_empty());
	}

	#[test]
	fn unknown_typed_value_is_kept_raw() {
		let features = Features::parse("Gender=Neut");
		assert_eq!(features.gender, None);
		assert_eq!(features.other.get("gender").map(String::as_str), Some("neut"));
	}

	#[test]
	fn parses_compact_tags() {
		let noun = Features::parse_compact("fp");
		assert_eq!(noun.gender, Some(Gender::Fem));
		assert_eq!(noun.number, Some(Number::Plur));

		let verb = Features::parse_compact("P3s");
		assert_eq!(verb.person, Some(Person::Third));
		assert_eq!(verb.number, Some(Number::Sing));
		assert_eq!(verb.other.get("tense").map(String::as_str), Some("pres"));
	}

	#[test]
	fn parse_any_dispatches_on_notation() {
		assert_eq!(Features::parse_any("ms").gender, Some(Gender::Masc));
		assert_eq!(Features::parse_any("Number=Plur").number, Some(Number::Plur));
	}

	#[test]
	fn morphalou_spellings() {
		assert_eq!(Gender::parse("masculine"), Some(Gender::Masc));
		assert_eq!(Number::parse("plural"), Some(Number::Plur));
		assert_eq!(Person::parse("thirdPerson"), Some(Person::Third));
	}

	#[test]
	fn display_renders_bundle() {
		let features = Features::parse("number=plur|gender=masc");
		assert_eq!(features.to_string(), "Gender=Masc|Number=Plur");
		assert_eq!(Features::default().to_string(), "_");
	}
}
