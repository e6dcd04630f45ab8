use std::error::Error;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use log::{info, warn};

use accord_core::config::{AccordConfig, LexiconSettings};
use accord_core::constraints::decoder::random_scores;
use accord_core::constraints::{AgreementChecker, ConstrainedDecoder};
use accord_core::evaluation::GrammaticalityEvaluator;
use accord_core::generation::TemplateGenerator;
use accord_core::morphology::LexiconAnalyzer;

/// Dictionaries looked up in `--dict-path`, in merge order.
const DICTIONARY_FILES: [&str; 2] = ["morphalou.xml", "lefff.txt"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    Generate,
    Decode,
    Evaluate,
}

/// Morphosyntaxe sous contrainte
#[derive(Parser, Debug)]
#[command(name = "accord", version, about)]
struct Args {
    /// What to run
    #[arg(long, value_enum, default_value_t = Mode::Generate)]
    mode: Mode,

    /// Folder holding morphalou.xml and lefff.txt
    #[arg(long)]
    dict_path: Option<PathBuf>,

    /// TOML configuration file (defaults to $ACCORD_CONFIG)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Seed for the decoder's random scores
    #[arg(long)]
    seed: Option<u64>,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn init_logger(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    init_logger(args.verbose);

    let config = match &args.config {
        Some(path) => AccordConfig::load(path)?,
        None => AccordConfig::from_env()?,
    };

    println!("Analyzer Initialisation");
    let mut analyzer = config.lexicon.build_analyzer()?;
    println!("Ready");

    if let Some(dir) = &args.dict_path {
        let settings = LexiconSettings { dict_path: dir.clone(), ..config.lexicon.clone() };
        for name in DICTIONARY_FILES {
            let path = dir.join(name);
            if !path.exists() {
                warn!("Dictionary {} not found, skipped", path.display());
                continue;
            }
            let lexicon = settings.load_file(name)?;
            info!("Loaded {} ({} forms)", path.display(), lexicon.len());
            analyzer.lexicon_mut().merge(&lexicon);
        }
    }

    match args.mode {
        Mode::Generate => generate(&analyzer, &config),
        Mode::Decode => decode(&analyzer, &config, args.seed),
        Mode::Evaluate => evaluate(&analyzer, &config),
    }
}

fn generate(analyzer: &LexiconAnalyzer, config: &AccordConfig) -> Result<(), Box<dyn Error>> {
    let generator = TemplateGenerator::with_checker(analyzer, AgreementChecker::new(config.checker.clone()))
        .with_max_repetitions(config.generation.max_repetitions);

    // Lexical items come from [generation.lexical_items], the demo set by default
    let items = config.generation.items()?;
    let sentences = generator.generate_with_constraints("SN", &items, config.generation.chunk_size)?;

    println!("Phrases générées avec contraintes d'accord:");
    for sentence in sentences.iter().take(10) {
        println!("  - {sentence}");
    }
    Ok(())
}

fn decode(analyzer: &LexiconAnalyzer, config: &AccordConfig, seed: Option<u64>) -> Result<(), Box<dyn Error>> {
    let decoder = ConstrainedDecoder::with_checker(analyzer, AgreementChecker::new(config.checker.clone()));

    let vocabulary: Vec<String> = ["Le", "La", "chat", "mange", "souris", "petite"]
        .iter()
        .map(|w| w.to_string())
        .collect();
    let scores = random_scores(vocabulary.len(), seed);

    let results = decoder.beam_search_with_constraints(&scores, &vocabulary, 3, 5, &config.decoder.constraints)?;

    println!("Résultats du décodage contraint:");
    for hypothesis in results {
        println!("  - {} (score: {:.3})", hypothesis.text(), hypothesis.score);
    }
    Ok(())
}

fn evaluate(analyzer: &LexiconAnalyzer, config: &AccordConfig) -> Result<(), Box<dyn Error>> {
    let evaluator = GrammaticalityEvaluator::new(analyzer, AgreementChecker::new(config.checker.clone()));

    let test_sentences: Vec<String> = [
        "Le petit chat noir",
        "La petite chat noir",
        "Les chats mangent",
        "Les chat mange",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    let report = evaluator.evaluate_grammaticality(&test_sentences);

    let errors = report
        .errors
        .iter()
        .map(|(constraint, count)| format!("{constraint}: {count}"))
        .collect::<Vec<_>>()
        .join(", ");

    println!("Résultats d'évaluation:");
    println!("  - Taux de grammaticalité: {:.2}%", report.grammaticality_rate * 100.0);
    println!("  - Erreurs détectées: {{{errors}}}");
    Ok(())
}
