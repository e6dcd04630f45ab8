use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AccordError;
use crate::morphology::{Person, Pos, Relation, Token};

/// A grammatical check that a token sequence must pass.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Constraint {
	SyntaxTemplate,
	AntiRepetition,
	GenderAgreement,
	NumberAgreement,
	SubjectVerbAgreement,
	ObjectAgreement,
}

impl Constraint {
	/// Checks run by `AgreementChecker::validate`, in evaluation order.
	pub const VALIDATE: [Constraint; 5] = [
		Constraint::SyntaxTemplate,
		Constraint::AntiRepetition,
		Constraint::GenderAgreement,
		Constraint::NumberAgreement,
		Constraint::SubjectVerbAgreement,
	];

	/// Checks that can be evaluated on an unfinished sequence.
	pub const INCREMENTAL: [Constraint; 2] = [Constraint::GenderAgreement, Constraint::NumberAgreement];

	pub fn name(self) -> &'static str {
		match self {
			Constraint::SyntaxTemplate => "syntax_template",
			Constraint::AntiRepetition => "anti_repetition",
			Constraint::GenderAgreement => "gender_agreement",
			Constraint::NumberAgreement => "number_agreement",
			Constraint::SubjectVerbAgreement => "subject_verb_agreement",
			Constraint::ObjectAgreement => "object_agreement",
		}
	}
}

impl FromStr for Constraint {
	type Err = AccordError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim() {
			"syntax_template" => Ok(Constraint::SyntaxTemplate),
			"anti_repetition" => Ok(Constraint::AntiRepetition),
			"gender_agreement" => Ok(Constraint::GenderAgreement),
			"number_agreement" => Ok(Constraint::NumberAgreement),
			"subject_verb_agreement" => Ok(Constraint::SubjectVerbAgreement),
			"object_agreement" => Ok(Constraint::ObjectAgreement),
			other => Err(AccordError::UnknownConstraint(other.to_owned())),
		}
	}
}

impl fmt::Display for Constraint {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.name())
	}
}

/// Span over which gender and number must be uniform.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AgreementScope {
	/// Every determiner, adjective and noun of the sentence.
	#[default]
	Sentence,
	/// Each contiguous run of determiners, adjectives and nouns.
	NounPhrase,
}

/// Limits and switches of the checker.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct AgreementConfig {
	/// Maximum adjectives between determiner and noun.
	pub pre_adj_max: usize,
	/// Maximum adjectives after the noun.
	pub post_adj_max: usize,
	/// Maximum adjectives in the whole sequence.
	pub max_total_adjs: usize,
	/// Maximum length of a run of the same adjective.
	pub max_consecutive_same_adj: usize,
	/// Maximum occurrences of one adjective lemma.
	pub max_same_adj_per_sentence: usize,
	pub require_det: bool,
	pub require_noun: bool,
	/// Person assumed for subjects carrying none (nouns).
	pub default_subj_person: Person,
	pub scope: AgreementScope,
}

impl Default for AgreementConfig {
	fn default() -> Self {
		Self {
			pre_adj_max: 1,
			post_adj_max: 2,
			max_total_adjs: 3,
			max_consecutive_same_adj: 1,
			max_same_adj_per_sentence: 1,
			require_det: true,
			require_noun: true,
			default_subj_person: Person::Third,
			scope: AgreementScope::Sentence,
		}
	}
}

/// Checks noun phrase shape, adjective repetition and agreement.
///
/// Gender is shared by determiners, adjectives and nouns; number by the same
/// plus verbs, which must also match their subjects in person.
#[derive(Debug, Clone, Default)]
pub struct AgreementChecker {
	config: AgreementConfig,
}

/// True when all present values are equal.
fn uniform<T: PartialEq>(values: impl Iterator<Item = Option<T>>) -> bool {
	let mut first = None;
	for value in values.flatten() {
		match &first {
			None => first = Some(value),
			Some(f) if *f != value => return false,
			Some(_) => (),
		}
	}
	true
}

impl AgreementChecker {
	pub fn new(config: AgreementConfig) -> Self {
		Self { config }
	}

	pub fn config(&self) -> &AgreementConfig {
		&self.config
	}

	/// Token groups over which gender and number must be uniform.
	fn groups<'a>(&self, tokens: &'a [Token]) -> Vec<&'a [Token]> {
		match self.config.scope {
			AgreementScope::Sentence => vec![tokens],
			AgreementScope::NounPhrase => tokens
				.split(|t| !matches!(t.pos, Pos::Det | Pos::Adj | Pos::Noun))
				.filter(|group| !group.is_empty())
				.collect(),
		}
	}

	/// Subjects indexed by the verb they depend on.
	fn subjects_by_head(tokens: &[Token]) -> HashMap<usize, Vec<usize>> {
		let mut subjects: HashMap<usize, Vec<usize>> = HashMap::new();
		for (i, token) in tokens.iter().enumerate() {
			if let (true, Some(head)) = (token.dep.is_subject(), token.head) {
				subjects.entry(head).or_default().push(i);
			}
		}
		subjects
	}

	pub fn check_gender_agreement(&self, tokens: &[Token]) -> bool {
		self.groups(tokens).into_iter().all(|group| {
			uniform(
				group
					.iter()
					.filter(|t| matches!(t.pos, Pos::Det | Pos::Adj | Pos::Noun))
					.map(|t| t.features.gender),
			)
		})
	}

	pub fn check_number_agreement(&self, tokens: &[Token]) -> bool {
		let subjects = Self::subjects_by_head(tokens);
		for (i, token) in tokens.iter().enumerate() {
			let (Pos::Verb, Some(number)) = (token.pos, token.features.number) else { continue };
			for &s in subjects.get(&i).into_iter().flatten() {
				if tokens[s].features.number.is_some_and(|n| n != number) {
					return false;
				}
			}
		}

		self.groups(tokens).into_iter().all(|group| {
			uniform(
				group
					.iter()
					.filter(|t| matches!(t.pos, Pos::Det | Pos::Adj | Pos::Noun))
					.map(|t| t.features.number),
			)
		})
	}

	pub fn check_subject_verb_agreement(&self, tokens: &[Token]) -> bool {
		let subjects = Self::subjects_by_head(tokens);
		for (vi, verb) in tokens.iter().enumerate() {
			if verb.pos != Pos::Verb {
				continue;
			}
			let vf = &verb.features;
			for &si in subjects.get(&vi).into_iter().flatten() {
				let sf = &tokens[si].features;
				if let (Some(sn), Some(vn)) = (sf.number, vf.number) {
					if sn != vn {
						return false;
					}
				}
				let subject_person = sf.person.unwrap_or(self.config.default_subj_person);
				if vf.person.is_some_and(|vp| vp != subject_person) {
					return false;
				}
			}
		}
		true
	}

	/// `DET ADJ{0..pre} NOUN ADJ{0..post}`, determiner and noun optional when not required.
	pub fn check_syntax_template(&self, tokens: &[Token]) -> bool {
		if tokens.is_empty() {
			return false;
		}
		let pos: Vec<Pos> = tokens.iter().map(|t| t.pos).collect();
		let at = |i: usize, p: Pos| pos.get(i) == Some(&p);
		let mut i = 0;

		if at(i, Pos::Det) {
			i += 1;
		} else if self.config.require_det {
			return false;
		}

		let mut pre = 0;
		while at(i, Pos::Adj) && pre < self.config.pre_adj_max {
			i += 1;
			pre += 1;
		}
		if at(i, Pos::Adj) {
			return false;
		}

		if at(i, Pos::Noun) {
			i += 1;
		} else if self.config.require_noun {
			return false;
		}

		let mut post = 0;
		while at(i, Pos::Adj) && post < self.config.post_adj_max {
			i += 1;
			post += 1;
		}

		i == pos.len()
	}

	pub fn check_anti_repetition(&self, tokens: &[Token]) -> bool {
		let total_adjs = tokens.iter().filter(|t| t.pos == Pos::Adj).count();
		if total_adjs > self.config.max_total_adjs {
			return false;
		}

		let mut run: Option<String> = None;
		let mut run_len = 0;
		let mut counts: HashMap<String, usize> = HashMap::new();

		for token in tokens {
			if token.pos != Pos::Adj {
				run = None;
				run_len = 0;
				continue;
			}

			let key = token.repetition_key();
			if !key.is_empty() && run.as_deref() == Some(key.as_str()) {
				run_len += 1;
			} else {
				run = Some(key.clone());
				run_len = 1;
			}
			if run_len > self.config.max_consecutive_same_adj {
				return false;
			}

			if !key.is_empty() {
				let count = counts.entry(key).or_insert(0);
				*count += 1;
				if *count > self.config.max_same_adj_per_sentence {
					return false;
				}
			}
		}
		true
	}

	/// Each object agrees in gender and number with its determiners and adjectives.
	pub fn check_object_agreement(&self, tokens: &[Token]) -> bool {
		tokens.iter().enumerate().filter(|(_, t)| t.dep == Relation::Obj).all(|(oi, object)| {
			let phrase: Vec<&Token> = std::iter::once(object)
				.chain(tokens.iter().filter(|t| {
					t.head == Some(oi) && matches!(t.dep, Relation::Det | Relation::Amod)
				}))
				.collect();
			uniform(phrase.iter().map(|t| t.features.gender)) && uniform(phrase.iter().map(|t| t.features.number))
		})
	}

	/// Runs a single check.
	pub fn check(&self, constraint: Constraint, tokens: &[Token]) -> bool {
		match constraint {
			Constraint::SyntaxTemplate => self.check_syntax_template(tokens),
			Constraint::AntiRepetition => self.check_anti_repetition(tokens),
			Constraint::GenderAgreement => self.check_gender_agreement(tokens),
			Constraint::NumberAgreement => self.check_number_agreement(tokens),
			Constraint::SubjectVerbAgreement => self.check_subject_verb_agreement(tokens),
			Constraint::ObjectAgreement => self.check_object_agreement(tokens),
		}
	}

	/// True when every constraint holds. Stops at the first failure.
	pub fn check_all(&self, constraints: &[Constraint], tokens: &[Token]) -> bool {
		constraints.iter().all(|c| self.check(*c, tokens))
	}

	/// Constraints that fail, in the given order.
	pub fn diagnose(&self, constraints: &[Constraint], tokens: &[Token]) -> Vec<Constraint> {
		constraints.iter().copied().filter(|c| !self.check(*c, tokens)).collect()
	}

	/// Failures among the `validate` checks.
	pub fn diagnose_all(&self, tokens: &[Token]) -> Vec<Constraint> {
		self.diagnose(&Constraint::VALIDATE, tokens)
	}

	/// Template, repetition, gender, number and subject-verb checks.
	pub fn validate(&self, tokens: &[Token]) -> bool {
		self.check_all(&Constraint::VALIDATE, tokens)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::morphology::Features;

	fn token(text: &str, pos: Pos, features: &str) -> Token {
		Token::new(text, text, pos, Features::parse(features))
	}

	fn with_subject(mut tokens: Vec<Token>, subject: usize, verb: usize) -> Vec<Token> {
		tokens[subject].dep = Relation::Nsubj;
		tokens[subject].head = Some(verb);
		tokens
	}

	fn checker() -> AgreementChecker {
		AgreementChecker::default()
	}

	#[test]
	fn gender_mismatch_in_noun_phrase() {
		let good = vec![
			token("le", Pos::Det, "Gender=Masc|Number=Sing"),
			token("petit", Pos::Adj, "Gender=Masc|Number=Sing"),
			token("chat", Pos::Noun, "Gender=Masc|Number=Sing"),
		];
		assert!(checker().check_gender_agreement(&good));

		let bad = vec![
			token("la", Pos::Det, "Gender=Fem|Number=Sing"),
			token("petite", Pos::Adj, "Gender=Fem|Number=Sing"),
			token("chat", Pos::Noun, "Gender=Masc|Number=Sing"),
		];
		assert!(!checker().check_gender_agreement(&bad));
	}

	#[test]
	fn missing_gender_is_neutral() {
		let tokens = vec![
			token("les", Pos::Det, "Number=Plur"),
			token("chattes", Pos::Noun, "Gender=Fem|Number=Plur"),
			token("rapides", Pos::Adj, "Number=Plur"),
		];
		assert!(checker().check_gender_agreement(&tokens));
		assert!(checker().check_number_agreement(&tokens));
	}

	#[test]
	fn noun_phrase_scope_isolates_phrases() {
		let tokens = vec![
			token("le", Pos::Det, "Gender=Masc|Number=Sing"),
			token("chat", Pos::Noun, "Gender=Masc|Number=Sing"),
			token("voit", Pos::Verb, "Number=Sing|Person=3"),
			token("la", Pos::Det, "Gender=Fem|Number=Sing"),
			token("souris", Pos::Noun, "Gender=Fem|Number=Sing"),
		];
		assert!(!checker().check_gender_agreement(&tokens));

		let scoped = AgreementChecker::new(AgreementConfig { scope: AgreementScope::NounPhrase, ..Default::default() });
		assert!(scoped.check_gender_agreement(&tokens));
	}

	#[test]
	fn verb_number_follows_subject() {
		let tokens = with_subject(
			vec![
				token("les", Pos::Det, "Number=Plur"),
				token("chats", Pos::Noun, "Gender=Masc|Number=Plur"),
				token("mange", Pos::Verb, "Number=Sing|Person=3"),
			],
			1,
			2,
		);
		assert!(!checker().check_number_agreement(&tokens));
		assert!(!checker().check_subject_verb_agreement(&tokens));
	}

	#[test]
	fn verb_without_subject_is_not_constrained() {
		let tokens = vec![
			token("chats", Pos::Noun, "Number=Plur"),
			token("mange", Pos::Verb, "Number=Sing|Person=3"),
		];
		assert!(checker().check_number_agreement(&tokens));
		assert!(checker().check_subject_verb_agreement(&tokens));
	}

	#[test]
	fn subject_person_defaults_to_third() {
		let tokens = with_subject(
			vec![token("chat", Pos::Noun, "Number=Sing"), token("mange", Pos::Verb, "Number=Sing|Person=1")],
			0,
			1,
		);
		assert!(!checker().check_subject_verb_agreement(&tokens));

		let first = AgreementChecker::new(AgreementConfig { default_subj_person: Person::First, ..Default::default() });
		assert!(first.check_subject_verb_agreement(&tokens));
	}

	#[test]
	fn syntax_template_shapes() {
		let det = token("le", Pos::Det, "");
		let adj = token("petit", Pos::Adj, "");
		let adj2 = token("noir", Pos::Adj, "");
		let noun = token("chat", Pos::Noun, "");
		let c = checker();

		assert!(c.check_syntax_template(&[det.clone(), adj.clone(), noun.clone(), adj2.clone()]));
		assert!(c.check_syntax_template(&[det.clone(), noun.clone()]));
		assert!(!c.check_syntax_template(&[]));
		assert!(!c.check_syntax_template(&[noun.clone()]));
		// Two pre-nominal adjectives exceed pre_adj_max = 1
		assert!(!c.check_syntax_template(&[det.clone(), adj.clone(), adj2.clone(), noun.clone()]));
		// Three post-nominal adjectives exceed post_adj_max = 2
		assert!(!c.check_syntax_template(&[det.clone(), noun.clone(), adj.clone(), adj2.clone(), adj.clone()]));

		let lenient = AgreementChecker::new(AgreementConfig { require_det: false, ..Default::default() });
		assert!(lenient.check_syntax_template(&[noun.clone(), adj.clone()]));
		assert!(!lenient.check_syntax_template(&[noun, det]));
	}

	#[test]
	fn adjective_repetition() {
		let det = token("le", Pos::Det, "");
		let noun = token("chat", Pos::Noun, "");
		let mut petit = token("petit", Pos::Adj, "");
		petit.lemma = "petit".to_owned();
		let mut petite = token("petite", Pos::Adj, "");
		petite.lemma = "petit".to_owned();
		let noir = token("noir", Pos::Adj, "");

		let c = checker();
		assert!(c.check_anti_repetition(&[det.clone(), petit.clone(), noun.clone(), noir.clone()]));
		// Same lemma twice in a row
		assert!(!c.check_anti_repetition(&[det.clone(), noun.clone(), petit.clone(), petite.clone()]));
		// Same lemma twice, not consecutive
		assert!(!c.check_anti_repetition(&[det.clone(), petit.clone(), noun.clone(), petite.clone()]));

		let relaxed = AgreementChecker::new(AgreementConfig {
			max_consecutive_same_adj: 2,
			max_same_adj_per_sentence: 2,
			..Default::default()
		});
		assert!(relaxed.check_anti_repetition(&[noun.clone(), petit.clone(), petit.clone()]));
		assert!(!relaxed.check_anti_repetition(&[noun.clone(), petit.clone(), petit.clone(), petit.clone()]));

		let few = AgreementChecker::new(AgreementConfig { max_total_adjs: 1, ..Default::default() });
		assert!(!few.check_anti_repetition(&[petit, noun, noir]));
	}

	#[test]
	fn object_agreement() {
		let mut tokens = vec![
			token("chat", Pos::Noun, "Gender=Masc|Number=Sing"),
			token("voit", Pos::Verb, "Number=Sing|Person=3"),
			token("le", Pos::Det, "Gender=Masc|Number=Sing"),
			token("souris", Pos::Noun, "Gender=Fem|Number=Sing"),
		];
		tokens[3].dep = Relation::Obj;
		tokens[3].head = Some(1);
		tokens[2].dep = Relation::Det;
		tokens[2].head = Some(3);
		assert!(!checker().check_object_agreement(&tokens));

		tokens[2].features = Features::parse("Gender=Fem|Number=Sing");
		assert!(checker().check_object_agreement(&tokens));
	}

	#[test]
	fn diagnose_lists_failures_in_order() {
		let tokens = vec![
			token("la", Pos::Det, "Gender=Fem|Number=Sing"),
			token("chats", Pos::Noun, "Gender=Masc|Number=Plur"),
		];
		let failures = checker().diagnose(&Constraint::VALIDATE, &tokens);
		assert_eq!(failures, vec![Constraint::GenderAgreement, Constraint::NumberAgreement]);
		assert_eq!(checker().diagnose_all(&tokens), failures);
		assert!(!checker().validate(&tokens));
		assert_eq!(checker().diagnose(&[Constraint::AntiRepetition], &tokens), vec![]);
	}

	#[test]
	fn constraint_names_round_trip() {
		for c in Constraint::VALIDATE {
			assert_eq!(c.name().parse::<Constraint>().unwrap(), c);
		}
		assert!("phonemic".parse::<Constraint>().is_err());
	}
}
