use std::io::Write;

use super::*;

fn load_file(contents: &str, extra: &[&str]) -> Result<Settings, LoadError> {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("create temp config");
    file.write_all(contents.as_bytes()).expect("write temp config");

    let path = file.path().to_str().expect("utf-8 temp path").to_string();
    let mut argv = vec!["cachefarm", "--config-file", path.as_str()];
    argv.extend_from_slice(extra);
    argv.push("refreshers");

    load(&CliArgs::parse_from(argv))
}

#[test]
fn defaults_without_any_source() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

    assert_eq!(settings.logging.level, LevelFilter::INFO);
    assert!(matches!(settings.logging.format, LogFormat::Compact));
    assert_eq!(settings.cache.partition_limit.get(), DEFAULT_PARTITION_LIMIT);
    assert_eq!(settings.cache.runtime_limit.get(), DEFAULT_RUNTIME_LIMIT);
    assert_eq!(settings.cache.dispatch_batch_limit.get(), DEFAULT_DISPATCH_BATCH_LIMIT);
    assert!(settings.cache.coalesce_type_changes);
    assert!(!settings.cache.background_model_rebuild);
    assert_eq!(settings.farm.server_identity, DEFAULT_SERVER_IDENTITY);
    assert!(settings.farm.servers.is_empty());
    assert!(!settings.farm.distributed);
}

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = RawSettings::default();
    raw.logging.level = Some("info".to_string());
    raw.farm.server_identity = Some("web-1".to_string());

    let overrides = GlobalOverrides {
        log_level: Some("debug".to_string()),
        log_json: Some(true),
        server_identity: Some("web-2".to_string()),
        ..Default::default()
    };

    raw.apply_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
    assert!(matches!(settings.logging.format, LogFormat::Json));
    assert_eq!(settings.farm.server_identity, "web-2");
}

#[test]
fn config_file_is_layered_under_cli_flags() {
    let settings = load_file(
        r#"
[logging]
level = "warn"

[cache]
partition_limit = 64
background_model_rebuild = true

[farm]
server_identity = "web-1"
servers = ["web-1", "web-2"]
distributed = true
"#,
        &["--log-level", "trace"],
    )
    .expect("valid settings");

    assert_eq!(settings.logging.level, LevelFilter::TRACE);
    assert_eq!(settings.cache.partition_limit.get(), 64);
    assert!(settings.cache.background_model_rebuild);
    assert_eq!(settings.farm.server_identity, "web-1");
    assert_eq!(settings.farm.servers, ["web-1", "web-2"]);
    assert!(settings.farm.distributed);
}

#[test]
fn zero_partition_limit_is_rejected() {
    let err = load_file("[cache]\npartition_limit = 0\n", &[]).unwrap_err();
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "cache.partition_limit",
            ..
        }
    ));
}

#[test]
fn unknown_log_level_is_rejected() {
    let mut raw = RawSettings::default();
    raw.logging.level = Some("loud".to_string());
    let err = Settings::from_raw(raw).unwrap_err();
    assert!(matches!(err, LoadError::Invalid { key: "logging.level", .. }));
}

#[test]
fn duplicate_servers_are_rejected() {
    let mut raw = RawSettings::default();
    raw.farm.servers = Some(vec!["web-1".to_string(), " web-1 ".to_string()]);
    let err = Settings::from_raw(raw).unwrap_err();
    assert!(matches!(err, LoadError::Invalid { key: "farm.servers", .. }));
}

#[test]
fn distributed_farm_needs_servers() {
    let mut raw = RawSettings::default();
    raw.farm.distributed = Some(true);
    let err = Settings::from_raw(raw).unwrap_err();
    assert!(matches!(err, LoadError::Invalid { key: "farm.servers", .. }));
}

#[test]
fn blank_server_identity_is_rejected() {
    let mut raw = RawSettings::default();
    raw.farm.server_identity = Some("   ".to_string());
    let err = Settings::from_raw(raw).unwrap_err();
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "farm.server_identity",
            ..
        }
    ));
}

#[test]
fn parse_apply_arguments() {
    let args = CliArgs::parse_from([
        "cachefarm",
        "apply",
        "--instructions",
        "batch.json",
        "--log-json",
        "true",
    ]);

    assert_eq!(args.overrides.log_json, Some(true));
    match args.command.expect("apply command") {
        Command::Apply(apply) => assert_eq!(apply.instructions.to_str(), Some("batch.json")),
        other => panic!("unexpected command {other:?}"),
    }
}

#[test]
fn parse_decode_arguments() {
    let args = CliArgs::parse_from([
        "cachefarm",
        "decode",
        "--refresher",
        "content",
        "--payload",
        "payload.json",
    ]);

    match args.command.expect("decode command") {
        Command::Decode(decode) => {
            assert_eq!(decode.refresher, "content");
            assert_eq!(decode.payload.to_str(), Some("payload.json"));
        }
        other => panic!("unexpected command {other:?}"),
    }
}
