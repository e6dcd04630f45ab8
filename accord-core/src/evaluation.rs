use std::collections::BTreeMap;

use log::info;
use serde::{Deserialize, Serialize};

use crate::constraints::agreement::{AgreementChecker, Constraint};
use crate::morphology::Analyzer;

/// Per-sentence result of an evaluation run.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SentenceVerdict {
	pub sentence: String,
	pub grammatical: bool,
	pub violations: Vec<Constraint>,
}

/// Aggregate result of an evaluation run.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct EvaluationReport {
	pub total: usize,
	pub grammatical: usize,
	/// `grammatical / total`, 0 for an empty corpus.
	pub grammaticality_rate: f64,
	/// Number of sentences failing each constraint.
	pub errors: BTreeMap<Constraint, usize>,
	pub sentences: Vec<SentenceVerdict>,
}

/// Measures the share of grammatical sentences in a corpus.
pub struct GrammaticalityEvaluator<'a, A: Analyzer + ?Sized> {
	analyzer: &'a A,
	checker: AgreementChecker,
	constraints: Vec<Constraint>,
}

impl<'a, A: Analyzer + ?Sized> GrammaticalityEvaluator<'a, A> {
	/// Evaluator running the checker's full validation set.
	pub fn new(analyzer: &'a A, checker: AgreementChecker) -> Self {
		Self { analyzer, checker, constraints: Constraint::VALIDATE.to_vec() }
	}

	/// Replaces the constraints a sentence must pass.
	pub fn with_constraints(mut self, constraints: &[Constraint]) -> Self {
		self.constraints = constraints.to_vec();
		self
	}

	pub fn evaluate_grammaticality(&self, sentences: &[String]) -> EvaluationReport {
		let analyses = self.analyzer.analyze_batch(sentences);
		let mut errors: BTreeMap<Constraint, usize> = BTreeMap::new();

		let verdicts: Vec<SentenceVerdict> = sentences
			.iter()
			.zip(analyses)
			.map(|(sentence, tokens)| {
				let violations = self.checker.diagnose(&self.constraints, &tokens);
				for violation in &violations {
					*errors.entry(*violation).or_default() += 1;
				}
				SentenceVerdict { sentence: sentence.clone(), grammatical: violations.is_empty(), violations }
			})
			.collect();

		let total = verdicts.len();
		let grammatical = verdicts.iter().filter(|v| v.grammatical).count();
		let grammaticality_rate = if total == 0 { 0.0 } else { grammatical as f64 / total as f64 };
		info!("[Evaluation] {grammatical}/{total} grammatical sentences");

		EvaluationReport { total, grammatical, grammaticality_rate, errors, sentences: verdicts }
	}
}
