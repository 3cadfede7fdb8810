use std::path::PathBuf;

use dj_config::{ConfigError, DjConfig, LoggingConfig, ReplConfig};
use dj_core::Options;
use pretty_assertions::assert_eq;

#[test]
fn empty_file_gives_defaults() {
    let config = DjConfig::load_from_str("").expect("parse");
    assert_eq!(config, DjConfig::default());
    assert_eq!(config.options, Options::default());
    assert_eq!(config.logging.level, "warn");
    assert_eq!(config.repl, ReplConfig::default());
}

#[test]
fn reads_every_section() {
    let config = DjConfig::load_from_str(
        r#"
        classpath = ["lib/a.jar"]

        [options]
        require_semicolon = true
        prohibit_boxing = true

        [logging]
        level = "debug"
        json = true

        [repl]
        max_depth = 32
        "#,
    )
    .expect("parse");
    assert_eq!(config.classpath, vec![PathBuf::from("lib/a.jar")]);
    assert!(config.options.require_semicolon);
    assert!(config.options.prohibit_boxing);
    assert!(!config.options.require_variable_type);
    assert_eq!(
        config.logging,
        LoggingConfig {
            level: "debug".into(),
            json: true,
            stderr: true,
            file: None,
        }
    );
    assert_eq!(config.repl.max_depth, 32);
    assert_eq!(config.repl.stack_mib, ReplConfig::default().stack_mib);
}

#[test]
fn unknown_keys_are_rejected() {
    let err = DjConfig::load_from_str("[logging]\ncolour = true\n").expect_err("unknown key");
    assert!(matches!(err, ConfigError::Toml(message) if message.contains("colour")));
}

#[test]
fn paths_are_relative_to_the_config_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("dynjava.toml");
    std::fs::write(
        &path,
        "classpath = [\"classes\", \"/opt/lib.jar\"]\n[logging]\nfile = \"dj.log\"\n",
    )
    .expect("write");

    let config = DjConfig::load_from_path(&path).expect("load");
    assert_eq!(
        config.classpath,
        vec![dir.path().join("classes"), PathBuf::from("/opt/lib.jar")]
    );
    assert_eq!(config.logging.file, Some(dir.path().join("dj.log")));
}

#[test]
fn missing_files_report_their_path() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("absent.toml");
    let err = DjConfig::load_from_path(&path).expect_err("missing");
    assert!(err.to_string().contains("absent.toml"));
}
