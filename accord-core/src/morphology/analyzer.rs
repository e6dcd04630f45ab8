use std::sync::mpsc;
use std::thread;

use log::debug;

use crate::error::Result;
use super::features::{Features, Gender, Number, Person};
use super::lexicon::{LexicalEntry, Lexicon};
use super::token::{Pos, Relation, Token};

/// Elided forms split off the following word (`l'oiseau` → `l'` `oiseau`).
const ELIDED: [&str; 9] = ["l", "d", "j", "qu", "n", "s", "c", "m", "t"];

/// Batches smaller than this are analysed on the calling thread.
const PARALLEL_BATCH_MIN: usize = 64;

/// Morpho-syntactic analysis of French text.
///
/// Implementations must be shareable between threads: batches may be split
/// across workers.
pub trait Analyzer: Sync {
	/// Analyses a single text. Returns one token per word, punctuation included.
	fn analyze(&self, text: &str) -> Vec<Token>;

	/// Analyses several texts. The result has one entry per input, in order.
	fn analyze_batch(&self, texts: &[String]) -> Vec<Vec<Token>> {
		texts.iter().map(|text| self.analyze(text)).collect()
	}
}

/// Dictionary-driven analyzer.
///
/// # Pipeline
/// 1. Tokenization on whitespace, punctuation and elided clitics
/// 2. Part-of-speech choice among dictionary readings, driven by the previous tag
/// 3. Feature choice among readings of that tag, driven by agreement context
/// 4. Shallow dependency attachment (determiners, modifiers, subjects, objects)
#[derive(Debug, Clone)]
pub struct LexiconAnalyzer {
	lexicon: Lexicon,
}

impl LexiconAnalyzer {
	pub fn new(lexicon: Lexicon) -> Self {
		Self { lexicon }
	}

	/// Analyzer over the embedded lexicon only.
	pub fn with_builtin() -> Result<Self> {
		Ok(Self::new(Lexicon::builtin()?))
	}

	pub fn lexicon(&self) -> &Lexicon {
		&self.lexicon
	}

	pub fn lexicon_mut(&mut self) -> &mut Lexicon {
		&mut self.lexicon
	}

	/// Splits a text into words.
	pub fn tokenize(text: &str) -> Vec<String> {
		let text = text.replace('’', "'");
		let mut words = Vec::new();

		for chunk in text.split_whitespace() {
			let mut current = String::new();
			for c in chunk.chars() {
				if c == '\'' && ELIDED.contains(&current.to_lowercase().as_str()) {
					current.push(c);
					words.push(std::mem::take(&mut current));
				} else if Self::is_punctuation(c) {
					if !current.is_empty() {
						words.push(std::mem::take(&mut current));
					}
					words.push(c.to_string());
				} else {
					current.push(c);
				}
			}
			if !current.is_empty() {
				words.push(current);
			}
		}

		words
	}

	fn is_punctuation(c: char) -> bool {
		matches!(c, '.' | ',' | ';' | ':' | '!' | '?' | '(' | ')' | '"' | '«' | '»' | '…')
	}

	/// Tags preferred after a given tag, most likely first.
	fn preferences(previous: Option<Pos>) -> &'static [Pos] {
		match previous {
			None | Some(Pos::Punct) | Some(Pos::Cconj) | Some(Pos::Sconj) => {
				&[Pos::Det, Pos::Pron, Pos::Propn, Pos::Noun, Pos::Adj, Pos::Adv, Pos::Verb, Pos::Aux, Pos::Adp]
			}
			Some(Pos::Det) => &[Pos::Noun, Pos::Adj, Pos::Num, Pos::Propn, Pos::Verb],
			Some(Pos::Adj) => &[Pos::Noun, Pos::Adj, Pos::Verb, Pos::Aux, Pos::Adv, Pos::Adp, Pos::Det],
			Some(Pos::Noun) | Some(Pos::Propn) => {
				&[Pos::Verb, Pos::Aux, Pos::Adj, Pos::Adv, Pos::Adp, Pos::Cconj, Pos::Det, Pos::Noun]
			}
			Some(Pos::Pron) => &[Pos::Verb, Pos::Aux, Pos::Pron, Pos::Adv, Pos::Det],
			Some(Pos::Verb) | Some(Pos::Aux) => {
				&[Pos::Det, Pos::Noun, Pos::Adj, Pos::Adv, Pos::Adp, Pos::Pron, Pos::Propn, Pos::Verb]
			}
			Some(Pos::Adv) => &[Pos::Verb, Pos::Aux, Pos::Adj, Pos::Adv, Pos::Det, Pos::Adp],
			Some(Pos::Adp) => &[Pos::Det, Pos::Noun, Pos::Pron, Pos::Propn, Pos::Verb],
			Some(Pos::Num) => &[Pos::Noun, Pos::Adj],
			Some(Pos::X) => &[],
		}
	}

	/// Gender and number of the noun phrase being built at the end of `tokens`.
	fn phrase_context(tokens: &[Token]) -> (Option<Gender>, Option<Number>) {
		let mut gender = None;
		let mut number = None;
		for token in tokens.iter().rev() {
			if !matches!(token.pos, Pos::Det | Pos::Adj | Pos::Noun | Pos::Num) {
				break;
			}
			gender = gender.or(token.features.gender);
			number = number.or(token.features.number);
		}
		(gender, number)
	}

	/// Number and person of the closest nominal before a verb, within the clause.
	fn subject_context(tokens: &[Token]) -> Option<(Option<Number>, Person)> {
		for token in tokens.iter().rev() {
			match token.pos {
				Pos::Noun | Pos::Propn => return Some((token.features.number, Person::Third)),
				Pos::Pron => {
					let person = token.features.person.unwrap_or(Person::Third);
					return Some((token.features.number, person));
				}
				Pos::Adv | Pos::Adj | Pos::Det => continue,
				_ => return None,
			}
		}
		None
	}

	/// Picks the reading of `pos` that agrees best with what precedes.
	fn choose_reading<'a>(readings: &[&'a LexicalEntry], pos: Pos, tokens: &[Token]) -> &'a LexicalEntry {
		let score = |entry: &LexicalEntry| -> usize {
			let features = &entry.features;
			if pos.is_verbal() {
				let Some((number, person)) = Self::subject_context(tokens) else { return 0 };
				let number_ok = features.compatible_with(None, number) as usize;
				let person_ok = features.person.is_none_or(|p| p == person) as usize;
				number_ok + person_ok
			} else {
				let (gender, number) = Self::phrase_context(tokens);
				features.compatible_with(gender, None) as usize + features.compatible_with(None, number) as usize
			}
		};

		let mut best = readings[0];
		let mut best_score = score(best);
		for entry in &readings[1..] {
			let s = score(entry);
			if s > best_score {
				best = entry;
				best_score = s;
			}
		}
		best
	}

	fn tag(&self, words: &[String]) -> Vec<Token> {
		let mut tokens: Vec<Token> = Vec::with_capacity(words.len());

		for (index, word) in words.iter().enumerate() {
			let readings = self.lexicon.lookup(word);
			if readings.is_empty() {
				tokens.push(Self::unknown_token(index, word));
				continue;
			}

			let previous = tokens.last().map(|t| t.pos);
			let pos = Self::preferences(previous)
				.iter()
				.copied()
				.find(|p| readings.iter().any(|r| r.pos == *p))
				.unwrap_or(readings[0].pos);

			let same_pos: Vec<&LexicalEntry> = readings.iter().filter(|r| r.pos == pos).collect();
			let reading = Self::choose_reading(&same_pos, pos, &tokens);
			tokens.push(Token::new(word, &reading.lemma, pos, reading.features.clone()));
		}

		tokens
	}

	fn unknown_token(index: usize, word: &str) -> Token {
		let pos = if word.chars().all(|c| c.is_ascii_digit()) {
			Pos::Num
		} else if index > 0 && word.chars().next().is_some_and(char::is_uppercase) {
			Pos::Propn
		} else {
			Pos::X
		};
		Token::new(word, &word.to_lowercase(), pos, Features::default())
	}

	/// Attaches determiners and adjectives to nouns, then subjects and objects to verbs.
	fn attach(tokens: &mut [Token]) {
		let is_chunk = |pos: Pos| matches!(pos, Pos::Det | Pos::Adj | Pos::Noun | Pos::Propn | Pos::Num);
		let is_noun = |pos: Pos| matches!(pos, Pos::Noun | Pos::Propn);

		// Nominal heads in order of appearance
		let mut heads: Vec<usize> = Vec::new();

		let mut start = 0;
		while start < tokens.len() {
			if tokens[start].pos == Pos::Pron {
				heads.push(start);
				start += 1;
				continue;
			}
			if !is_chunk(tokens[start].pos) {
				start += 1;
				continue;
			}

			let mut end = start;
			while end < tokens.len() && is_chunk(tokens[end].pos) {
				end += 1;
			}

			let nouns: Vec<usize> = (start..end).filter(|&i| is_noun(tokens[i].pos)).collect();
			if let Some(&first_noun) = nouns.first() {
				heads.push(first_noun);
				for i in start..end {
					if is_noun(tokens[i].pos) {
						continue;
					}
					let head = nouns.iter().copied().find(|&n| n > i).or_else(|| nouns.iter().copied().rev().find(|&n| n < i));
					tokens[i].head = head;
					tokens[i].dep = match tokens[i].pos {
						Pos::Det => Relation::Det,
						Pos::Adj => Relation::Amod,
						_ => Relation::Other("nummod".to_owned()),
					};
				}
			}
			start = end;
		}

		let mut pending_subject: Option<usize> = None;
		let mut clause_verb: Option<usize> = None;
		let mut object_found = false;
		let mut root: Option<usize> = None;

		for i in 0..tokens.len() {
			let pos = tokens[i].pos;
			if matches!(pos, Pos::Punct | Pos::Cconj | Pos::Sconj) {
				pending_subject = None;
				clause_verb = None;
				object_found = false;
			} else if pos.is_verbal() {
				if let Some(subject) = pending_subject.take() {
					tokens[subject].dep = Relation::Nsubj;
					tokens[subject].head = Some(i);
				}
				if root.is_none() {
					root = Some(i);
				}
				clause_verb = Some(i);
				object_found = false;
			} else if heads.contains(&i) {
				match clause_verb {
					Some(verb) if !object_found => {
						tokens[i].dep = Relation::Obj;
						tokens[i].head = Some(verb);
						object_found = true;
					}
					Some(_) => (),
					None => pending_subject = Some(i),
				}
			}
		}

		if let Some(r) = root.or_else(|| heads.first().copied()) {
			tokens[r].dep = Relation::Root;
			tokens[r].head = None;
			for token in tokens.iter_mut() {
				if token.head.is_none() && token.dep == Relation::default() && token.pos != Pos::Punct {
					token.head = Some(r);
				}
			}
			tokens[r].head = None;
		}
	}
}

impl Analyzer for LexiconAnalyzer {
	fn analyze(&self, text: &str) -> Vec<Token> {
		let words = Self::tokenize(text);
		let mut tokens = self.tag(&words);
		Self::attach(&mut tokens);
		tokens
	}

	/// Splits large batches across one scoped thread per CPU.
	fn analyze_batch(&self, texts: &[String]) -> Vec<Vec<Token>> {
		if texts.is_empty() {
			return Vec::new();
		}

		debug!("[Analyzer:lexicon] Processing batch of {} texts", texts.len());

		let workers = num_cpus::get().max(1);
		if workers == 1 || texts.len() < PARALLEL_BATCH_MIN {
			return texts.iter().map(|text| self.analyze(text)).collect();
		}

		let chunk_size = texts.len().div_ceil(workers);
		let (tx, rx) = mpsc::channel();
		thread::scope(|scope| {
			for (index, chunk) in texts.chunks(chunk_size).enumerate() {
				let tx = tx.clone();
				scope.spawn(move || {
					let analyses: Vec<Vec<Token>> = chunk.iter().map(|text| self.analyze(text)).collect();
					// The receiver lives until every worker is joined
					let _ = tx.send((index, analyses));
				});
			}
		});
		drop(tx);

		let mut parts: Vec<(usize, Vec<Vec<Token>>)> = rx.iter().collect();
		parts.sort_by_key(|(index, _)| *index);
		parts.into_iter().flat_map(|(_, analyses)| analyses).collect()
	}
}
