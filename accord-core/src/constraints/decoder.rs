use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::constraints::agreement::{AgreementChecker, Constraint};
use crate::constraints::automaton::Fst;
use crate::error::{AccordError, Result};
use crate::morphology::{Analyzer, Pos, Token};

/// Feature family encoded by a constraint automaton.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FeatureKind {
	Gender,
	Number,
}

impl FeatureKind {
	/// Symbols read by the constraint automaton for this family.
	pub fn symbols(self) -> [&'static str; 2] {
		match self {
			FeatureKind::Gender => ["masc", "fem"],
			FeatureKind::Number => ["sing", "plur"],
		}
	}

	fn symbol_of(self, token: &Token) -> Option<&'static str> {
		match self {
			FeatureKind::Gender => token.features.gender.map(|g| g.symbol()),
			FeatureKind::Number => token.features.number.map(|n| n.symbol()),
		}
	}
}

/// A partial or complete word sequence with its accumulated score.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Hypothesis {
	pub words: Vec<String>,
	pub score: f32,
}

impl Hypothesis {
	pub fn text(&self) -> String {
		self.words.join(" ")
	}
}

/// Beam search decoder that only keeps hypotheses passing agreement checks.
pub struct ConstrainedDecoder<'a, A: Analyzer + ?Sized> {
	analyzer: &'a A,
	checker: AgreementChecker,
}

impl<'a, A: Analyzer + ?Sized> ConstrainedDecoder<'a, A> {
	pub fn new(analyzer: &'a A) -> Self {
		Self::with_checker(analyzer, AgreementChecker::default())
	}

	pub fn with_checker(analyzer: &'a A, checker: AgreementChecker) -> Self {
		Self { analyzer, checker }
	}

	/// Beam search over `vocabulary`, scoring each word with `scores[i]`.
	///
	/// # Behavior
	/// - Every step extends each beam with every word of the vocabulary.
	/// - Extensions whose text fails `constraints` are dropped. An empty
	///   constraint list means gender and number agreement.
	/// - Survivors are sorted by descending score (ties keep expansion order)
	///   and the best `beam_width` are kept.
	/// - The search stops after `max_length` steps, or returns an empty list
	///   as soon as no extension survives.
	///
	/// # Errors
	/// `InvalidInput` when `scores` and `vocabulary` differ in length or
	/// `beam_width` is zero.
	pub fn beam_search_with_constraints(
		&self,
		scores: &[f32],
		vocabulary: &[String],
		beam_width: usize,
		max_length: usize,
		constraints: &[Constraint],
	) -> Result<Vec<Hypothesis>> {
		if scores.len() != vocabulary.len() {
			return Err(AccordError::InvalidInput(format!(
				"{} scores for {} vocabulary words",
				scores.len(),
				vocabulary.len()
			)));
		}
		if beam_width == 0 {
			return Err(AccordError::InvalidInput("beam width must be positive".to_owned()));
		}
		let constraints = if constraints.is_empty() { &Constraint::INCREMENTAL[..] } else { constraints };

		let mut beams = vec![Hypothesis { words: Vec::new(), score: 0.0 }];

		for step in 0..max_length {
			let expansions: Vec<Hypothesis> = beams
				.iter()
				.flat_map(|beam| {
					vocabulary.iter().zip(scores).map(move |(word, score)| {
						let mut words = beam.words.clone();
						words.push(word.clone());
						Hypothesis { words, score: beam.score + score }
					})
				})
				.collect();

			let texts: Vec<String> = expansions.iter().map(Hypothesis::text).collect();
			let analyses = self.analyzer.analyze_batch(&texts);

			let mut candidates: Vec<Hypothesis> = expansions
				.into_iter()
				.zip(analyses)
				.filter(|(_, tokens)| self.checker.check_all(constraints, tokens))
				.map(|(hypothesis, _)| hypothesis)
				.collect();
			debug!("[Decoder] Step {}: {} of {} extensions kept", step + 1, candidates.len(), texts.len());

			candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
			candidates.truncate(beam_width);
			beams = candidates;

			if beams.is_empty() {
				info!("[Decoder] No hypothesis survived step {}", step + 1);
				break;
			}
		}

		Ok(beams)
	}
}

/// Uniform scores in `[0, 1)`, one per vocabulary word. Reproducible when `seed` is set.
pub fn random_scores(len: usize, seed: Option<u64>) -> Vec<f32> {
	let mut rng = match seed {
		Some(seed) => StdRng::seed_from_u64(seed),
		None => StdRng::from_os_rng(),
	};
	(0..len).map(|_| rng.random::<f32>()).collect()
}

/// Composes `input` with `constraint` and returns the cheapest surviving path.
///
/// The composition is cleaned of epsilons, determinized and minimized before
/// the search. An empty machine means no path of `input` satisfies `constraint`.
pub fn wfst_constrained_decode(input: &Fst, constraint: &Fst) -> Result<Fst> {
	let composed = input.compose(constraint);
	let optimized = composed.determinize()?.minimize()?;
	Ok(optimized.shortest_path())
}

/// Builds the agreement automaton for the given feature families.
///
/// From the start state an epsilon leads to a hub; from the hub each feature
/// value opens a state that only loops on that value. Every state but the
/// start is final, so a sequence is accepted when it never mixes two values.
pub fn build_constraint_fst(kinds: &[FeatureKind]) -> Result<Fst> {
	let mut text = String::from("0 1 <eps> <eps> 0.0\n");
	let mut state = 2;

	for kind in [FeatureKind::Gender, FeatureKind::Number] {
		if !kinds.contains(&kind) {
			continue;
		}
		for symbol in kind.symbols() {
			text.push_str(&format!("1 {state} {symbol} {symbol} 0.0\n"));
			text.push_str(&format!("{state} {state} {symbol} {symbol} 0.0\n"));
			state += 1;
		}
	}

	for i in 1..state {
		text.push_str(&format!("{i}\n"));
	}

	Fst::compile_text(&text)
}

/// Linear acceptor over the `kind` values carried by determiners, adjectives and nouns.
pub fn features_acceptor(tokens: &[Token], kind: FeatureKind) -> Fst {
	let symbols: Vec<&str> = tokens
		.iter()
		.filter(|t| matches!(t.pos, Pos::Det | Pos::Adj | Pos::Noun))
		.filter_map(|t| kind.symbol_of(t))
		.collect();
	Fst::linear_acceptor(&symbols)
}

/// Agreement through the automata: true when every family's acceptor
/// survives composition with its constraint machine.
pub fn automaton_agreement(tokens: &[Token], kinds: &[FeatureKind]) -> Result<bool> {
	for &kind in kinds {
		let constraint = build_constraint_fst(&[kind])?;
		if features_acceptor(tokens, kind).compose(&constraint).is_empty() {
			return Ok(false);
		}
	}
	Ok(true)
}
