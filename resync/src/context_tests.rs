use super::*;
use libresync::config::{ColorChoice, OutputFormat};
use std::collections::HashMap;
use std::io::Write;
use tempfile::NamedTempFile;

fn config_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

fn build(cli: &CliOverrides, vars: &[(&str, &str)]) -> Result<AppContext, String> {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    AppContext::build_with_env(cli, |key| vars.get(key).cloned())
}

fn with_file(file: &NamedTempFile) -> CliOverrides {
    CliOverrides {
        config_path: Some(file.path().to_path_buf()),
        ..Default::default()
    }
}

#[test]
fn test_config_file_values_are_used() {
    let file = config_file("sync:\n  concurrency: 6\n  backup_tag: prev\n");
    let ctx = build(&with_file(&file), &[]).unwrap();
    assert_eq!(ctx.config.sync.concurrency, Some(6));
    assert_eq!(ctx.config.sync.backup_tag, "prev");
}

#[test]
fn test_env_overrides_config_file() {
    let file = config_file("sync:\n  concurrency: 6\n");
    let ctx = build(&with_file(&file), &[(CPU_COUNT_ENV, "3"), (DRY_RUN_ENV, "true")]).unwrap();
    assert_eq!(ctx.config.sync.concurrency, Some(3));
    assert!(ctx.config.sync.dry_run);
}

#[test]
fn test_cli_overrides_env() {
    let file = config_file("output:\n  format: yaml\n");
    let cli = CliOverrides {
        cpu_count: Some(1),
        format: Some("json".to_string()),
        color: Some("never".to_string()),
        ..with_file(&file)
    };
    let ctx = build(&cli, &[(CPU_COUNT_ENV, "3"), (COLOR_ENV, "always")]).unwrap();
    assert_eq!(ctx.config.sync.concurrency, Some(1));
    assert_eq!(ctx.config.output.format, OutputFormat::Json);
    assert_eq!(ctx.config.output.color, ColorChoice::Never);
}

#[test]
fn test_config_path_from_env() {
    let file = config_file("sync:\n  dry_run: true\n");
    let path = file.path().to_string_lossy().to_string();
    let ctx = build(&CliOverrides::default(), &[(CONFIG_ENV, path.as_str())]).unwrap();
    assert!(ctx.config.sync.dry_run);
}

#[test]
fn test_missing_explicit_config_is_error() {
    let cli = CliOverrides {
        config_path: Some(PathBuf::from("/nonexistent/resync.yaml")),
        ..Default::default()
    };
    assert!(build(&cli, &[]).is_err());
}

#[test]
fn test_invalid_cpu_count_env_is_error() {
    let file = config_file("output:\n  format: pretty\n");
    let err = build(&with_file(&file), &[(CPU_COUNT_ENV, "many")]).unwrap_err();
    assert!(err.contains(CPU_COUNT_ENV));
}

#[test]
fn test_parse_flag() {
    assert_eq!(parse_flag("YES"), Some(true));
    assert_eq!(parse_flag("0"), Some(false));
    assert_eq!(parse_flag("maybe"), None);
}
