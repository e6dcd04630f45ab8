use std::process::ExitCode;

use clap::Parser;

use accord_core::config::AccordConfig;
use accord_core::verification::Verifier;

/// Checks the agreement of a French sentence
#[derive(Parser, Debug)]
#[command(name = "verification", version, about)]
struct Args {
    /// Sentence words, joined with spaces
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    words: Vec<String>,
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    if args.words.is_empty() {
        println!("Usage: verification \"Votre phrase en français.\"");
        return ExitCode::FAILURE;
    }
    let sentence = args.words.join(" ").trim().to_owned();

    let analyzer = match AccordConfig::from_env().and_then(|config| config.lexicon.build_analyzer()) {
        Ok(analyzer) => analyzer,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::from(2);
        }
    };

    let verdict = Verifier::new(&analyzer).verify(&sentence);
    println!("{verdict}");

    if verdict.correct { ExitCode::SUCCESS } else { ExitCode::FAILURE }
}
