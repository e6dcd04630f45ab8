use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constraints::agreement::{AgreementChecker, AgreementConfig, Constraint};
use crate::morphology::Analyzer;

/// Checks applied to a free sentence. The noun phrase template is left out.
pub const SENTENCE_CHECKS: [Constraint; 4] = [
	Constraint::AntiRepetition,
	Constraint::GenderAgreement,
	Constraint::NumberAgreement,
	Constraint::SubjectVerbAgreement,
];

/// Outcome of verifying one sentence.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Verdict {
	pub sentence: String,
	pub correct: bool,
	/// Failed checks, in `SENTENCE_CHECKS` order.
	pub violations: Vec<Constraint>,
}

impl fmt::Display for Verdict {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		if self.correct {
			write!(f, "✓ Correct — {}", self.sentence)
		} else {
			write!(f, "✖ Incorrect — {}", self.sentence)
		}
	}
}

/// Checker limits for whole sentences: any number of adjectives, at most one
/// after each noun, never the same one twice in a row.
pub fn sentence_config() -> AgreementConfig {
	AgreementConfig {
		post_adj_max: 1,
		max_total_adjs: usize::MAX,
		max_consecutive_same_adj: 1,
		require_det: true,
		require_noun: true,
		..AgreementConfig::default()
	}
}

/// Grammaticality check of complete French sentences.
pub struct Verifier<'a, A: Analyzer + ?Sized> {
	analyzer: &'a A,
	checker: AgreementChecker,
}

impl<'a, A: Analyzer + ?Sized> Verifier<'a, A> {
	pub fn new(analyzer: &'a A) -> Self {
		Self::with_checker(analyzer, AgreementChecker::new(sentence_config()))
	}

	pub fn with_checker(analyzer: &'a A, checker: AgreementChecker) -> Self {
		Self { analyzer, checker }
	}

	/// Analyses `sentence` (trimmed) and reports every failed check.
	pub fn verify(&self, sentence: &str) -> Verdict {
		let sentence = sentence.trim();
		let tokens = self.analyzer.analyze(sentence);
		let violations = self.checker.diagnose(&SENTENCE_CHECKS, &tokens);
		Verdict { sentence: sentence.to_owned(), correct: violations.is_empty(), violations }
	}

	pub fn check_sentence(&self, sentence: &str) -> bool {
		self.verify(sentence).correct
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::morphology::LexiconAnalyzer;

	#[test]
	fn accepts_agreeing_sentences() {
		let analyzer = LexiconAnalyzer::with_builtin().unwrap();
		let verifier = Verifier::new(&analyzer);
		for sentence in ["Le petit chat noir", "Les chats mangent", "La petite souris mange."] {
			let verdict = verifier.verify(sentence);
			assert!(verdict.correct, "{sentence}: {:?}", verdict.violations);
		}
	}

	#[test]
	fn reports_violations() {
		let analyzer = LexiconAnalyzer::with_builtin().unwrap();
		let verifier = Verifier::new(&analyzer);

		let verdict = verifier.verify("La petite chat noir");
		assert!(!verdict.correct);
		assert_eq!(verdict.violations, vec![Constraint::GenderAgreement]);

		let verdict = verifier.verify("Les chat mange");
		assert!(verdict.violations.contains(&Constraint::NumberAgreement));
	}

	#[test]
	fn display_format() {
		let analyzer = LexiconAnalyzer::with_builtin().unwrap();
		let verifier = Verifier::new(&analyzer);
		assert_eq!(verifier.verify("  Le chat dort ").to_string(), "✓ Correct — Le chat dort");
		assert_eq!(verifier.verify("La chat").to_string(), "✖ Incorrect — La chat");
	}

	#[test]
	fn allows_many_adjectives() {
		let config = sentence_config();
		assert_eq!(config.max_total_adjs, usize::MAX);
		assert_eq!(config.post_adj_max, 1);
		assert_eq!(config.pre_adj_max, AgreementConfig::default().pre_adj_max);
	}
}
