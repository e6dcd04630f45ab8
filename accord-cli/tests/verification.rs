use std::process::{Command, Output};

fn verification(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_verification"))
        .args(args)
        .env_remove("ACCORD_CONFIG")
        .output()
        .unwrap()
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn no_argument_prints_usage() {
    let output = verification(&[]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stdout(&output).contains("Usage: verification \"Votre phrase en français.\""));
}

#[test]
fn correct_sentence_exits_zero() {
    let output = verification(&["Le chat dort"]);
    assert_eq!(output.status.code(), Some(0));
    assert_eq!(stdout(&output).trim(), "✓ Correct — Le chat dort");
}

#[test]
fn words_are_joined_into_one_sentence() {
    let output = verification(&["Le", "chat", "dort"]);
    assert_eq!(output.status.code(), Some(0));
    assert_eq!(stdout(&output).trim(), "✓ Correct — Le chat dort");
}

#[test]
fn incorrect_sentence_exits_one() {
    let output = verification(&["La chat"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stdout(&output).starts_with("✖ Incorrect — La chat"));
}

#[test]
fn unreadable_configuration_exits_two() {
    let output = Command::new(env!("CARGO_BIN_EXE_verification"))
        .arg("Le chat dort")
        .env("ACCORD_CONFIG", "/nonexistent/accord.toml")
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
}
