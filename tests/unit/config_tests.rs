//! Unit tests for configuration parsing, merging, and validation.

use std::path::PathBuf;

use wyoming_handle_external::config::{
    tokenize_program, ConfigSource, DEFAULT_INFO_NAME,
};
use wyoming_handle_external::transport::ServerUri;
use wyoming_handle_external::{AppError, GlobalConfig};

fn minimal_source() -> ConfigSource {
    ConfigSource {
        program: Some("/usr/bin/handle --verbose".into()),
        languages: vec!["en".into()],
        ..ConfigSource::default()
    }
}

// ── Validation ───────────────────────────────────────────────────────────────

#[test]
fn minimal_config_uses_defaults() {
    let config = GlobalConfig::from_source(minimal_source()).expect("valid config");

    assert_eq!(config.command, ["/usr/bin/handle", "--verbose"]);
    assert_eq!(config.program, "/usr/bin/handle --verbose");
    assert_eq!(config.languages, ["en"]);
    assert_eq!(config.info_name, DEFAULT_INFO_NAME);
    assert_eq!(config.uri, ServerUri::Stdio);
    assert!(!config.debug);
}

#[test]
fn missing_program_is_rejected() {
    let source = ConfigSource {
        program: None,
        ..minimal_source()
    };

    let err = GlobalConfig::from_source(source).expect_err("program is required");

    assert!(matches!(err, AppError::Config(ref msg) if msg.contains("program")));
}

#[test]
fn blank_program_is_rejected() {
    let source = ConfigSource {
        program: Some("   ".into()),
        ..minimal_source()
    };

    assert!(matches!(GlobalConfig::from_source(source), Err(AppError::Config(_))));
}

#[test]
fn missing_language_is_rejected() {
    let source = ConfigSource {
        languages: Vec::new(),
        ..minimal_source()
    };

    let err = GlobalConfig::from_source(source).expect_err("language is required");

    assert!(matches!(err, AppError::Config(ref msg) if msg.contains("language")));
}

#[test]
fn invalid_uri_is_rejected() {
    let source = ConfigSource {
        uri: Some("http://localhost:80".into()),
        ..minimal_source()
    };

    assert!(matches!(GlobalConfig::from_source(source), Err(AppError::Config(_))));
}

#[test]
fn explicit_values_are_kept() {
    let source = ConfigSource {
        info_name: Some("lights".into()),
        uri: Some("tcp://0.0.0.0:10500".into()),
        debug: true,
        ..minimal_source()
    };

    let config = GlobalConfig::from_source(source).unwrap();

    assert_eq!(config.info_name, "lights");
    assert_eq!(
        config.uri,
        ServerUri::Tcp {
            host: "0.0.0.0".into(),
            port: 10500
        }
    );
    assert!(config.debug);
}

// ── Tokenizing ───────────────────────────────────────────────────────────────

#[test]
fn quoted_arguments_stay_together() {
    let command = tokenize_program(r#"python3 -c 'print("hi there")' "two words""#).unwrap();

    assert_eq!(command, ["python3", "-c", r#"print("hi there")"#, "two words"]);
}

#[test]
fn shell_syntax_is_not_evaluated() {
    let command = tokenize_program("echo $HOME; rm -rf *").unwrap();

    assert_eq!(command, ["echo", "$HOME;", "rm", "-rf", "*"]);
}

#[test]
fn unbalanced_quote_is_rejected() {
    let err = tokenize_program("echo 'oops").expect_err("unbalanced quote");

    assert!(matches!(err, AppError::Config(_)));
}

// ── TOML and merging ─────────────────────────────────────────────────────────

#[test]
fn toml_file_is_parsed() {
    let source = ConfigSource::from_toml_str(
        r#"
program = "handle-intent --fast"
language = ["en", "de"]
info_name = "home"
uri = "unix:///run/handle.sock"
debug = true
"#,
    )
    .expect("valid toml");

    let config = GlobalConfig::from_source(source).unwrap();

    assert_eq!(config.command, ["handle-intent", "--fast"]);
    assert_eq!(config.languages, ["en", "de"]);
    assert_eq!(config.info_name, "home");
    assert_eq!(
        config.uri,
        ServerUri::Unix {
            path: PathBuf::from("/run/handle.sock")
        }
    );
    assert!(config.debug);
}

#[test]
fn unknown_toml_key_is_rejected() {
    let err = ConfigSource::from_toml_str("programme = \"typo\"").expect_err("unknown key");

    assert!(matches!(err, AppError::Config(_)));
}

#[test]
fn command_line_overrides_file() {
    let file = ConfigSource {
        program: Some("from-file".into()),
        languages: vec!["en".into(), "de".into()],
        info_name: Some("file-name".into()),
        uri: Some("tcp://127.0.0.1:1".into()),
        debug: true,
    };
    let cli = ConfigSource {
        program: Some("from-cli".into()),
        languages: vec!["fr".into()],
        ..ConfigSource::default()
    };

    let merged = file.merge(cli);

    assert_eq!(merged.program.as_deref(), Some("from-cli"));
    assert_eq!(merged.languages, ["fr"]);
    assert_eq!(merged.info_name.as_deref(), Some("file-name"));
    assert_eq!(merged.uri.as_deref(), Some("tcp://127.0.0.1:1"));
    assert!(merged.debug, "debug from the file must survive");
}

#[test]
fn empty_cli_languages_keep_file_languages() {
    let file = ConfigSource {
        languages: vec!["en".into()],
        ..ConfigSource::default()
    };

    let merged = file.merge(ConfigSource::default());

    assert_eq!(merged.languages, ["en"]);
}

#[test]
fn config_file_is_loaded_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("handle.toml");
    std::fs::write(&path, "program = \"cat\"\nlanguage = [\"en\"]\n").unwrap();

    let source = ConfigSource::load_from_path(&path).unwrap();

    assert_eq!(source.program.as_deref(), Some("cat"));
}

#[test]
fn missing_config_file_is_a_config_error() {
    let err = ConfigSource::load_from_path("/nonexistent/handle.toml").expect_err("missing file");

    assert!(matches!(err, AppError::Config(ref msg) if msg.contains("failed to read config")));
}
