//! Integration tests for configuration loading.

use std::collections::{BTreeSet, HashMap};
use std::io::Write;

use viewer_lock_core::{Configuration, DotEnvFile, Layered, parse_whitelist};

fn source(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}

#[test]
fn configuration_tests_trims_whitelist_entries() {
    let parsed = parse_whitelist(" alice , bob ");
    let expected: BTreeSet<String> = ["alice", "bob"].iter().map(|s| s.to_string()).collect();
    assert_eq!(parsed, expected);
    assert!(parse_whitelist("").is_empty());
    assert_eq!(parse_whitelist(",, carol ,").len(), 1);
}

#[test]
fn configuration_tests_matches_reference_scenario() {
    let config = Configuration::load(&source(&[
        ("PASSWORD", "secret42"),
        ("WHITELIST", "alice,bob"),
    ]));

    let alice = config.verify("alice", "wrong");
    assert!(alice.is_whitelisted && !alice.password_ok && alice.allowed);

    let carol = config.verify("carol", "secret42");
    assert!(!carol.is_whitelisted && carol.password_ok && carol.allowed);

    let rejected = config.verify("carol", "wrong");
    assert!(!rejected.is_whitelisted && !rejected.password_ok && !rejected.allowed);
}

#[test]
fn configuration_tests_default_password_is_letmein() {
    let config = Configuration::load(&source(&[]));
    assert!(config.verify("x", "letmein").password_ok);
}

#[test]
fn configuration_tests_whitelist_is_case_sensitive_and_trims_attempts() {
    let config = Configuration::load(&source(&[("WHITELIST", "Alice")]));
    assert!(config.verify("  Alice ", "").is_whitelisted);
    assert!(!config.verify("alice", "").is_whitelisted);
    assert!(!config.verify("", "").is_whitelisted);
}

#[test]
fn configuration_tests_env_overrides_dotenv_file() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file should be created");
    writeln!(file, "PASSWORD=from-file\nDURATION=90\nWHITELIST=dave").expect("write env file");

    let dotenv = DotEnvFile::load(file.path())
        .expect("env file should be readable")
        .expect("env file should exist");
    let config = Configuration::load(&Layered::new(source(&[("DURATION", "15")]), dotenv));

    assert_eq!(config.duration_seconds(), 15);
    assert!(config.verify("dave", "from-file").password_ok);
    assert!(config.verify("dave", "").is_whitelisted);
}

#[test]
fn configuration_tests_missing_dotenv_is_not_an_error() {
    let dir = tempfile::tempdir().expect("temp dir should be created");
    let loaded = DotEnvFile::load(&dir.path().join(".env")).expect("missing file is fine");
    assert!(loaded.is_none());
}

#[test]
fn configuration_tests_public_config_carries_only_durations() {
    let config = Configuration::load(&source(&[
        ("PASSWORD", "secret42"),
        ("DURATION", "12"),
        ("ASCII_SECONDS", "2"),
    ]));
    let public = serde_json::to_value(config.public_config()).expect("serialize");
    assert_eq!(public, serde_json::json!({ "durationSeconds": 12, "asciiSeconds": 2 }));
}

#[test]
fn configuration_tests_numbers_use_leading_digits() {
    for (raw, expected) in [
        ("42abc", 42),
        ("3.5", 3),
        ("12 seconds", 12),
        (" +7 ", 7),
        ("0", 0),
    ] {
        let config = Configuration::load(&source(&[("DURATION", raw)]));
        assert_eq!(config.duration_seconds(), expected, "DURATION={raw:?}");
    }

    for raw in ["-5", "abc", "", "  ", "+", "99999999999"] {
        let config = Configuration::load(&source(&[("ASCII_SECONDS", raw)]));
        assert_eq!(config.ascii_seconds(), 3, "ASCII_SECONDS={raw:?}");
    }
}
