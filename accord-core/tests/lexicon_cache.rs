use std::fs;
use std::thread;
use std::time::Duration;

use accord_core::AccordError;
use accord_core::config::{AccordConfig, LexiconSettings};
use accord_core::morphology::{Analyzer, Gender, Lexicon, LexiconAnalyzer, Number, Pos};
use tempfile::TempDir;

const LEFFF: &str = "\
# form\tlemma\tcategory\tfeatures
licorne\tlicorne\tnc\tfs
licornes\tlicorne\tnc\tfp
bleue\tbleu\tadj\tGender=Fem|Number=Sing
";

const MORPHALOU: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<dictionary>
  <entry>
    <lemma>dragon</lemma>
    <pos>commonNoun</pos>
    <inflected_form><form>dragon</form><gender>masculine</gender><number>singular</number></inflected_form>
    <inflected_form><form>dragons</form><gender>masculine</gender><number>plural</number></inflected_form>
  </entry>
</dictionary>
"#;

#[test]
fn lefff_cache_is_written_and_reused() {
	let dir = TempDir::new().unwrap();
	let source = dir.path().join("lefff.txt");
	fs::write(&source, LEFFF).unwrap();

	let first = Lexicon::load(&source).unwrap();
	let cache = dir.path().join("lefff.txt.bin");
	assert!(cache.exists());
	assert_eq!(first.len(), 3);

	let second = Lexicon::load(&source).unwrap();
	assert_eq!(second.len(), first.len());
	assert_eq!(second.sources(), ["lefff".to_owned()]);

	let licorne = second.lookup_pos("licornes", Pos::Noun);
	assert_eq!(licorne.len(), 1);
	assert_eq!(licorne[0].features.gender, Some(Gender::Fem));
	assert_eq!(licorne[0].features.number, Some(Number::Plur));
}

#[test]
fn stale_or_corrupt_cache_is_rebuilt() {
	let dir = TempDir::new().unwrap();
	let source = dir.path().join("lefff.txt");
	let cache = dir.path().join("lefff.txt.bin");

	fs::write(&cache, b"not a lexicon").unwrap();
	thread::sleep(Duration::from_millis(20));
	fs::write(&source, LEFFF).unwrap();
	assert_eq!(Lexicon::load(&source).unwrap().len(), 3);

	// Cache now up to date but corrupt: ignored, then rewritten
	fs::write(&cache, b"\xff\xff\xff").unwrap();
	assert_eq!(Lexicon::load(&source).unwrap().len(), 3);
	assert_eq!(Lexicon::load(&source).unwrap().len(), 3);
}

#[test]
fn same_stem_dictionaries_keep_separate_caches() {
	let dir = TempDir::new().unwrap();
	let xml = dir.path().join("lex.xml");
	let tsv = dir.path().join("lex.tsv");
	fs::write(&xml, MORPHALOU).unwrap();
	fs::write(&tsv, LEFFF).unwrap();

	let from_tsv = Lexicon::load(&tsv).unwrap();
	let from_xml = Lexicon::load(&xml).unwrap();
	assert!(dir.path().join("lex.tsv.bin").exists());
	assert!(dir.path().join("lex.xml.bin").exists());

	assert!(!from_tsv.lookup("licorne").is_empty());
	assert!(from_xml.lookup("licorne").is_empty());
	assert!(!from_xml.lookup("dragon").is_empty());

	// Second round reads both caches back
	assert!(Lexicon::load(&xml).unwrap().lookup("licorne").is_empty());
	assert!(Lexicon::load(&tsv).unwrap().lookup("dragon").is_empty());
}

#[test]
fn lexicons_outside_the_dictionary_folder_are_refused() {
	let dicts = TempDir::new().unwrap();
	let elsewhere = TempDir::new().unwrap();
	let secret = elsewhere.path().join("secret.txt");
	fs::write(&secret, LEFFF).unwrap();

	let settings = LexiconSettings {
		dict_path: dicts.path().to_path_buf(),
		files: Vec::new(),
		builtin: false,
		cache: true,
	};
	let absolute = secret.to_string_lossy().to_string();
	assert!(matches!(settings.build_lexicon_with(&[absolute]), Err(AccordError::InvalidInput(_))));

	let climbing = format!("../{}/secret.txt", elsewhere.path().file_name().unwrap().to_string_lossy());
	assert!(matches!(settings.load_file(&climbing), Err(AccordError::InvalidInput(_))));
	assert!(!elsewhere.path().join("secret.txt.bin").exists());
}

#[test]
fn missing_dictionary_is_an_error() {
	let dir = TempDir::new().unwrap();
	assert!(Lexicon::load(dir.path().join("absent.txt")).is_err());
}

#[test]
fn configured_lexicons_extend_the_analyzer() {
	let dir = TempDir::new().unwrap();
	fs::write(dir.path().join("lefff.txt"), LEFFF).unwrap();
	fs::write(dir.path().join("morphalou.xml"), MORPHALOU).unwrap();
	fs::write(dir.path().join("notes.md"), "ignored").unwrap();

	let settings = LexiconSettings {
		dict_path: dir.path().to_path_buf(),
		files: vec!["lefff.txt".to_owned(), "morphalou.xml".to_owned()],
		builtin: true,
		cache: false,
	};
	assert_eq!(settings.available().unwrap(), vec!["lefff.txt".to_owned(), "morphalou.xml".to_owned()]);

	let analyzer = settings.build_analyzer().unwrap();
	assert!(analyzer.lexicon().sources().contains(&"morphalou".to_owned()));
	assert!(!dir.path().join("lefff.txt.bin").exists());

	let tokens = analyzer.analyze("La licorne bleue");
	assert_eq!(tokens[1].pos, Pos::Noun);
	assert_eq!(tokens[2].features.gender, Some(Gender::Fem));

	let tokens = analyzer.analyze("Les dragons");
	assert_eq!(tokens[1].features.number, Some(Number::Plur));
}

#[test]
fn configuration_file_drives_lexicon_loading() {
	let dir = TempDir::new().unwrap();
	fs::write(dir.path().join("lefff.txt"), LEFFF).unwrap();
	let config_path = dir.path().join("accord.toml");
	fs::write(
		&config_path,
		format!("[lexicon]\ndict_path = {:?}\nfiles = [\"lefff.txt\"]\nbuiltin = false\n", dir.path().display().to_string()),
	)
	.unwrap();

	let config = AccordConfig::load(&config_path).unwrap();
	let lexicon = config.lexicon.build_lexicon().unwrap();
	assert_eq!(lexicon.len(), 3);
	assert!(lexicon.lookup("chat").is_empty());

	let analyzer = LexiconAnalyzer::new(lexicon);
	assert_eq!(analyzer.analyze("licorne")[0].pos, Pos::Noun);
}
