use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::constraints::agreement::{AgreementChecker, Constraint};
use crate::error::{AccordError, Result};
use crate::morphology::{Analyzer, Pos, Token};

/// Candidates analysed per batch when no size is configured.
pub const DEFAULT_CHUNK_SIZE: usize = 512;

/// Upper bound on the words filling one `*` slot.
pub const DEFAULT_MAX_REPETITIONS: usize = 3;

/// How many words a slot takes.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Quantifier {
	/// Exactly one (`NOUN`).
	One,
	/// Zero or one (`DET?`).
	Optional,
	/// Zero up to the repetition limit (`ADJ*`).
	Many,
}

/// One element of a template pattern.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct Slot {
	pub pos: Pos,
	pub quantifier: Quantifier,
}

impl Slot {
	pub const fn new(pos: Pos, quantifier: Quantifier) -> Self {
		Self { pos, quantifier }
	}
}

impl FromStr for Slot {
	type Err = AccordError;

	fn from_str(s: &str) -> Result<Self> {
		let (tag, quantifier) = if let Some(tag) = s.strip_suffix('?') {
			(tag, Quantifier::Optional)
		} else if let Some(tag) = s.strip_suffix('*') {
			(tag, Quantifier::Many)
		} else {
			(s, Quantifier::One)
		};
		let pos = tag.parse::<Pos>().map_err(AccordError::InvalidPattern)?;
		Ok(Self::new(pos, quantifier))
	}
}

impl fmt::Display for Slot {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let suffix = match self.quantifier {
			Quantifier::One => "",
			Quantifier::Optional => "?",
			Quantifier::Many => "*",
		};
		write!(f, "{}{}", self.pos, suffix)
	}
}

/// Named pattern of slots with the constraints its output must satisfy.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Template {
	pub name: String,
	pub slots: Vec<Slot>,
	pub constraints: Vec<Constraint>,
}

impl Template {
	/// Parses a whitespace separated pattern such as `DET? ADJ* NOUN ADJ*`.
	///
	/// # Errors
	/// `InvalidPattern` when the pattern is empty or names an unknown tag.
	pub fn new(name: &str, pattern: &str, constraints: &[Constraint]) -> Result<Self> {
		let slots = pattern.split_whitespace().map(str::parse).collect::<Result<Vec<Slot>>>()?;
		if slots.is_empty() {
			return Err(AccordError::InvalidPattern(format!("empty pattern for template {name}")));
		}
		Ok(Self { name: name.to_owned(), slots, constraints: constraints.to_vec() })
	}

	/// Noun phrase, subject-verb and subject-verb-object templates.
	pub fn builtins() -> Vec<Template> {
		use Quantifier::*;

		vec![
			Template {
				name: "SN".to_owned(),
				slots: vec![
					Slot::new(Pos::Det, Optional),
					Slot::new(Pos::Adj, Many),
					Slot::new(Pos::Noun, One),
					Slot::new(Pos::Adj, Many),
				],
				constraints: vec![Constraint::GenderAgreement, Constraint::NumberAgreement],
			},
			Template {
				name: "SV".to_owned(),
				slots: vec![Slot::new(Pos::Noun, One), Slot::new(Pos::Verb, One)],
				constraints: vec![Constraint::SubjectVerbAgreement],
			},
			Template {
				name: "SVO".to_owned(),
				slots: vec![
					Slot::new(Pos::Noun, One),
					Slot::new(Pos::Verb, One),
					Slot::new(Pos::Det, Optional),
					Slot::new(Pos::Noun, One),
				],
				constraints: vec![Constraint::SubjectVerbAgreement, Constraint::ObjectAgreement],
			},
		]
	}

	/// Pattern rendered back to text.
	pub fn pattern(&self) -> String {
		self.slots.iter().map(Slot::to_string).collect::<Vec<_>>().join(" ")
	}

	/// Template constraints that can prune an unfinished sequence.
	fn incremental_constraints(&self) -> Vec<Constraint> {
		self.constraints.iter().copied().filter(|c| Constraint::INCREMENTAL.contains(c)).collect()
	}
}

/// Candidate words for each part of speech.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LexicalItems {
	items: BTreeMap<Pos, Vec<String>>,
}

impl LexicalItems {
	pub fn new() -> Self {
		Self::default()
	}

	/// Builder form of `insert`.
	pub fn with(mut self, pos: Pos, words: &[&str]) -> Self {
		self.insert(pos, words.iter().map(|w| w.to_string()).collect());
		self
	}

	pub fn insert(&mut self, pos: Pos, words: Vec<String>) {
		self.items.insert(pos, words);
	}

	pub fn words(&self, pos: Pos) -> &[String] {
		self.items.get(&pos).map(Vec::as_slice).unwrap_or(&[])
	}

	pub fn iter(&self) -> impl Iterator<Item = (Pos, &[String])> {
		self.items.iter().map(|(pos, words)| (*pos, words.as_slice()))
	}

	/// Converts a tag-keyed map (`"DET" => [...]`), as found in configuration files.
	pub fn from_tags(map: &BTreeMap<String, Vec<String>>) -> Result<Self> {
		let mut items = Self::new();
		for (tag, words) in map {
			let pos = tag.parse::<Pos>().map_err(AccordError::InvalidInput)?;
			items.insert(pos, words.clone());
		}
		Ok(items)
	}
}

/// Analyses of each distinct word, per part of speech.
type WordAnalyses = HashMap<Pos, HashMap<String, Vec<Token>>>;

/// Depth-first enumeration state.
struct Search<'t> {
	slots: &'t [Slot],
	items: &'t LexicalItems,
	analyses: &'t WordAnalyses,
	checker: &'t AgreementChecker,
	incremental: Vec<Constraint>,
	max_repetitions: usize,
	words: Vec<String>,
	tags: Vec<Pos>,
	tokens: Vec<Token>,
	adj_counts: HashMap<String, usize>,
	seen: HashSet<Vec<String>>,
	found: Vec<Vec<String>>,
}

impl<'t> Search<'t> {
	/// `used` is the number of words already placed in `slot`.
	fn visit(&mut self, slot: usize, used: usize) {
		if slot == self.slots.len() {
			if !self.words.is_empty() && self.seen.insert(self.words.clone()) {
				self.found.push(self.words.clone());
			}
			return;
		}

		let Slot { pos, quantifier } = self.slots[slot];
		let can_take = match quantifier {
			Quantifier::One | Quantifier::Optional => used == 0,
			Quantifier::Many => used < self.max_repetitions,
		};
		if can_take {
			let items = self.items;
			for word in items.words(pos) {
				self.place(slot, used, pos, word);
			}
		}

		let can_leave = match quantifier {
			Quantifier::One => used == 1,
			Quantifier::Optional | Quantifier::Many => true,
		};
		if can_leave {
			self.visit(slot + 1, 0);
		}
	}

	fn place(&mut self, slot: usize, used: usize, pos: Pos, word: &'t str) {
		let analyses = self.analyses;
		let Some(word_tokens) = analyses.get(&pos).and_then(|by_word| by_word.get(word)) else { return };
		if word_tokens.is_empty() {
			return;
		}

		if pos == Pos::Adj {
			if self.adj_counts.get(word).copied().unwrap_or(0) >= 2 {
				return;
			}
			let identical = self
				.words
				.iter()
				.zip(&self.tags)
				.rev()
				.take_while(|(w, p)| **p == Pos::Adj && w.as_str() == word)
				.count();
			if identical >= 2 {
				return;
			}
			*self.adj_counts.entry(word.to_owned()).or_default() += 1;
		}

		self.words.push(word.to_owned());
		self.tags.push(pos);
		self.tokens.extend(word_tokens.iter().cloned());

		if self.checker.check_all(&self.incremental, &self.tokens) {
			self.visit(slot, used + 1);
		} else {
			debug!("[Template] Pruned {}", self.words.join(" "));
		}

		self.tokens.truncate(self.tokens.len() - word_tokens.len());
		self.tags.pop();
		self.words.pop();
		if pos == Pos::Adj {
			if let Some(count) = self.adj_counts.get_mut(word) {
				*count -= 1;
			}
		}
	}
}

/// Generates sentences from templates, keeping those whose analysis satisfies
/// the template constraints.
///
/// # Responsibilities
/// - Hold the known templates (the built-in ones plus any added)
/// - Enumerate word sequences with incremental agreement pruning
/// - Re-analyse complete candidates in chunks and filter them
pub struct TemplateGenerator<'a, A: Analyzer + ?Sized> {
	analyzer: &'a A,
	checker: AgreementChecker,
	templates: BTreeMap<String, Template>,
	max_repetitions: usize,
}

impl<'a, A: Analyzer + ?Sized> TemplateGenerator<'a, A> {
	pub fn new(analyzer: &'a A) -> Self {
		Self::with_checker(analyzer, AgreementChecker::default())
	}

	pub fn with_checker(analyzer: &'a A, checker: AgreementChecker) -> Self {
		let templates = Template::builtins().into_iter().map(|t| (t.name.clone(), t)).collect();
		Self { analyzer, checker, templates, max_repetitions: DEFAULT_MAX_REPETITIONS }
	}

	pub fn with_max_repetitions(mut self, max_repetitions: usize) -> Self {
		self.max_repetitions = max_repetitions;
		self
	}

	/// Registers a template, replacing any template of the same name.
	pub fn add_template(&mut self, template: Template) {
		self.templates.insert(template.name.clone(), template);
	}

	pub fn template(&self, name: &str) -> Option<&Template> {
		self.templates.get(name)
	}

	pub fn template_names(&self) -> Vec<String> {
		self.templates.keys().cloned().collect()
	}

	fn lookup(&self, name: &str) -> Result<&Template> {
		self.template(name).ok_or_else(|| AccordError::TemplateNotFound(name.to_owned()))
	}

	/// Analyses every distinct word once per part of speech, keeping first-seen order.
	fn precompute_analyses(&self, items: &LexicalItems) -> WordAnalyses {
		let mut by_pos = WordAnalyses::new();
		for (pos, words) in items.iter() {
			let mut unique: Vec<String> = Vec::new();
			for word in words {
				if !unique.contains(word) {
					unique.push(word.clone());
				}
			}
			let analyses = self.analyzer.analyze_batch(&unique);
			by_pos.insert(pos, unique.into_iter().zip(analyses).collect());
		}
		by_pos
	}

	fn enumerate(&self, template: &Template, items: &LexicalItems, analyses: &WordAnalyses) -> Vec<Vec<String>> {
		let mut search = Search {
			slots: &template.slots,
			items,
			analyses,
			checker: &self.checker,
			incremental: template.incremental_constraints(),
			max_repetitions: self.max_repetitions,
			words: Vec::new(),
			tags: Vec::new(),
			tokens: Vec::new(),
			adj_counts: HashMap::new(),
			seen: HashSet::new(),
			found: Vec::new(),
		};
		search.visit(0, 0);
		search.found
	}

	/// Word sequences the template admits before full analysis.
	///
	/// # Behavior
	/// - Words without analysis are skipped.
	/// - An adjective is not used a third time, nor placed after two copies of itself.
	/// - Branches failing the template's gender or number agreement are cut.
	/// - Each sequence appears once, in enumeration order.
	pub fn candidate_sequences(&self, name: &str, items: &LexicalItems) -> Result<Vec<Vec<String>>> {
		let template = self.lookup(name)?;
		let analyses = self.precompute_analyses(items);
		Ok(self.enumerate(template, items, &analyses))
	}

	/// Generates the sentences of template `name` that pass its constraints
	/// and the anti-repetition check.
	///
	/// # Errors
	/// - `TemplateNotFound` for an unknown template.
	/// - `InvalidInput` when `chunk_size` is zero.
	pub fn generate_with_constraints(&self, name: &str, items: &LexicalItems, chunk_size: usize) -> Result<Vec<String>> {
		if chunk_size == 0 {
			return Err(AccordError::InvalidInput("chunk size must be positive".to_owned()));
		}
		let template = self.lookup(name)?;
		let analyses = self.precompute_analyses(items);
		let candidates = self.enumerate(template, items, &analyses);

		info!("[Template:{}] Generated {} candidate sequences", name, candidates.len());

		let total_chunks = candidates.len().div_ceil(chunk_size);
		let mut generated = Vec::new();

		for (index, chunk) in candidates.chunks(chunk_size).enumerate() {
			info!("[Template:{}] Analyzing chunk {}/{} (size={})", name, index + 1, total_chunks, chunk.len());
			let texts: Vec<String> = chunk.iter().map(|sequence| sequence.join(" ")).collect();

			for tokens in self.analyzer.analyze_batch(&texts) {
				if tokens.is_empty() {
					continue;
				}
				if self.checker.check_all(&template.constraints, &tokens) && self.checker.check_anti_repetition(&tokens) {
					generated.push(tokens.iter().map(|t| t.text.as_str()).collect::<Vec<_>>().join(" "));
				}
			}
		}

		Ok(generated)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::morphology::LexiconAnalyzer;

	fn demo_items() -> LexicalItems {
		LexicalItems::new()
			.with(Pos::Det, &["Le", "La", "Les"])
			.with(Pos::Adj, &["petit", "petite", "grand", "grande"])
			.with(Pos::Noun, &["chat", "chatte", "chien", "chienne"])
	}

	#[test]
	fn parses_patterns() {
		let template = Template::new("T", "DET? ADJ* NOUN", &[]).unwrap();
		assert_eq!(
			template.slots,
			vec![
				Slot::new(Pos::Det, Quantifier::Optional),
				Slot::new(Pos::Adj, Quantifier::Many),
				Slot::new(Pos::Noun, Quantifier::One),
			]
		);
		assert_eq!(template.pattern(), "DET? ADJ* NOUN");

		assert!(matches!(Template::new("T", "FOO BAR", &[]), Err(AccordError::InvalidPattern(_))));
		assert!(matches!(Template::new("T", "  ", &[]), Err(AccordError::InvalidPattern(_))));
	}

	#[test]
	fn builtin_patterns() {
		let names: Vec<(String, String)> = Template::builtins().iter().map(|t| (t.name.clone(), t.pattern())).collect();
		assert_eq!(
			names,
			vec![
				("SN".to_owned(), "DET? ADJ* NOUN ADJ*".to_owned()),
				("SV".to_owned(), "NOUN VERB".to_owned()),
				("SVO".to_owned(), "NOUN VERB DET? NOUN".to_owned()),
			]
		);
	}

	#[test]
	fn unknown_template() {
		let analyzer = LexiconAnalyzer::with_builtin().unwrap();
		let generator = TemplateGenerator::new(&analyzer);
		let result = generator.generate_with_constraints("XYZ", &demo_items(), DEFAULT_CHUNK_SIZE);
		assert!(matches!(result, Err(AccordError::TemplateNotFound(name)) if name == "XYZ"));
		assert!(generator.generate_with_constraints("SN", &demo_items(), 0).is_err());
	}

	#[test]
	fn candidates_are_unique() {
		let analyzer = LexiconAnalyzer::with_builtin().unwrap();
		let generator = TemplateGenerator::new(&analyzer);
		let items = LexicalItems::new().with(Pos::Det, &["Le"]).with(Pos::Noun, &["chat"]);

		let candidates = generator.candidate_sequences("SN", &items).unwrap();
		assert_eq!(candidates, vec![vec!["Le".to_owned(), "chat".to_owned()], vec!["chat".to_owned()]]);

		let all = generator.candidate_sequences("SN", &demo_items()).unwrap();
		let unique: HashSet<&Vec<String>> = all.iter().collect();
		assert_eq!(unique.len(), all.len());
	}

	#[test]
	fn candidates_are_pruned_on_agreement() {
		let analyzer = LexiconAnalyzer::with_builtin().unwrap();
		let generator = TemplateGenerator::new(&analyzer);

		let candidates = generator.candidate_sequences("SN", &demo_items()).unwrap();
		let texts: Vec<String> = candidates.iter().map(|c| c.join(" ")).collect();
		assert!(texts.contains(&"Le petit chat".to_owned()));
		assert!(!texts.contains(&"La petit chat".to_owned()));
		assert!(!texts.iter().any(|t| t.starts_with("Les ")));
		assert!(candidates.iter().all(|c| c.iter().filter(|w| *w == "petit").count() <= 2));
	}

	#[test]
	fn repetition_limit_bounds_slots() {
		let analyzer = LexiconAnalyzer::with_builtin().unwrap();
		let generator = TemplateGenerator::new(&analyzer).with_max_repetitions(1);
		let items = LexicalItems::new().with(Pos::Adj, &["petit", "grand"]).with(Pos::Noun, &["chat"]);

		let candidates = generator.candidate_sequences("SN", &items).unwrap();
		assert!(candidates.iter().all(|c| c.len() <= 3));
		assert!(candidates.contains(&vec!["petit".to_owned(), "chat".to_owned(), "grand".to_owned()]));
	}

	#[test]
	fn generated_noun_phrases_agree() {
		let analyzer = LexiconAnalyzer::with_builtin().unwrap();
		let generator = TemplateGenerator::new(&analyzer);

		let sentences = generator.generate_with_constraints("SN", &demo_items(), 7).unwrap();
		assert!(sentences.contains(&"Le petit chat".to_owned()));
		assert!(sentences.contains(&"La grande chienne".to_owned()));
		assert!(!sentences.contains(&"Le petit petit chat".to_owned()));

		let checker = AgreementChecker::default();
		for sentence in &sentences {
			let tokens = analyzer.analyze(sentence);
			assert!(checker.check_gender_agreement(&tokens), "{sentence}");
			assert!(checker.check_number_agreement(&tokens), "{sentence}");
		}
	}

	#[test]
	fn generated_clauses_agree_with_subject() {
		let analyzer = LexiconAnalyzer::with_builtin().unwrap();
		let generator = TemplateGenerator::new(&analyzer);
		let items = LexicalItems::new().with(Pos::Noun, &["chat", "chats"]).with(Pos::Verb, &["mange", "mangent"]);

		let sentences = generator.generate_with_constraints("SV", &items, DEFAULT_CHUNK_SIZE).unwrap();
		assert!(sentences.contains(&"chat mange".to_owned()));
		assert!(sentences.contains(&"chats mangent".to_owned()));
		assert!(!sentences.contains(&"chat mangent".to_owned()));
		assert!(!sentences.contains(&"chats mange".to_owned()));
	}

	#[test]
	fn lexical_items_from_tags() {
		let mut map = BTreeMap::new();
		map.insert("DET".to_owned(), vec!["le".to_owned()]);
		map.insert("nc".to_owned(), vec!["chat".to_owned()]);
		let items = LexicalItems::from_tags(&map).unwrap();
		assert_eq!(items.words(Pos::Det), ["le".to_owned()]);
		assert_eq!(items.words(Pos::Noun), ["chat".to_owned()]);
		assert!(items.words(Pos::Verb).is_empty());

		map.insert("FOO".to_owned(), vec![]);
		assert!(LexicalItems::from_tags(&map).is_err());
	}
}
