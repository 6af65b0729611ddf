//! No-mock configuration validation + resolution tests.
//!
//! Covers:
//! - Settings parsing and validation from real files on disk
//! - Resolution order (CLI > env file > env dir > XDG > defaults)

use sc_config::resolve::{resolve_config, ConfigSource, CONFIG_FILENAME, ENV_CONFIG_DIR, ENV_CONFIG_PATH};
use sc_config::{validate_settings, Settings, ValidationError};
use std::env;
use std::fs;
use std::path::Path;
use std::sync::{Mutex, OnceLock};
use tempfile::TempDir;

static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

const GUARDED_KEYS: &[&str] = &[ENV_CONFIG_PATH, ENV_CONFIG_DIR, "XDG_CONFIG_HOME"];

struct EnvGuard {
    keys: Vec<String>,
    saved: Vec<Option<String>>,
}

impl EnvGuard {
    fn new(keys: &[&str]) -> Self {
        let mut saved = Vec::with_capacity(keys.len());
        for key in keys {
            saved.push(env::var(key).ok());
        }
        Self {
            keys: keys.iter().map(|k| k.to_string()).collect(),
            saved,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (idx, key) in self.keys.iter().enumerate() {
            match self.saved.get(idx).and_then(|v| v.as_ref()) {
                Some(val) => env::set_var(key, val),
                None => env::remove_var(key),
            }
        }
    }
}

fn with_env_lock<T>(f: impl FnOnce() -> T) -> T {
    let _guard = ENV_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    f()
}

/// Point every lookup location at an empty temp dir.
fn isolate(empty: &Path) {
    env::remove_var(ENV_CONFIG_PATH);
    env::remove_var(ENV_CONFIG_DIR);
    env::set_var("XDG_CONFIG_HOME", empty);
}

fn write_settings(path: &Path, interval_ms: u64) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create settings parent");
    }
    let body = format!(
        r#"{{"schema_version":"1.0.0","refresh":{{"interval_ms":{}}}}}"#,
        interval_ms
    );
    fs::write(path, body).expect("write settings");
}

#[test]
fn settings_file_round_trips_through_validation() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(CONFIG_FILENAME);
    write_settings(&path, 200);

    let settings = Settings::from_file(&path).expect("parse settings");
    assert_eq!(settings.refresh.interval_ms, 200);
    validate_settings(&settings).expect("settings valid");
}

#[test]
fn invalid_json_reports_parse_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(CONFIG_FILENAME);
    fs::write(&path, "{ not json").unwrap();

    let err = Settings::from_file(&path).unwrap_err();
    assert!(matches!(err, ValidationError::ParseError(_)));
}

#[test]
fn missing_file_reports_io_error() {
    let dir = TempDir::new().unwrap();
    let err = Settings::from_file(&dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(err, ValidationError::IoError(_)));
}

#[test]
fn resolution_falls_back_to_defaults() {
    with_env_lock(|| {
        let _guard = EnvGuard::new(GUARDED_KEYS);
        let empty = TempDir::new().unwrap();
        isolate(empty.path());

        let resolved = resolve_config(None);
        if resolved.source != ConfigSource::SystemConfig {
            assert_eq!(resolved.source, ConfigSource::BuiltinDefault);
            assert!(resolved.path.is_none());
        }
    });
}

#[test]
fn resolution_prefers_env_path_over_env_dir() {
    with_env_lock(|| {
        let _guard = EnvGuard::new(GUARDED_KEYS);
        let empty = TempDir::new().unwrap();
        isolate(empty.path());

        let direct = TempDir::new().unwrap();
        let direct_path = direct.path().join("custom.json");
        write_settings(&direct_path, 300);

        let by_dir = TempDir::new().unwrap();
        write_settings(&by_dir.path().join(CONFIG_FILENAME), 400);

        env::set_var(ENV_CONFIG_PATH, &direct_path);
        env::set_var(ENV_CONFIG_DIR, by_dir.path());

        let resolved = resolve_config(None);
        assert_eq!(resolved.source, ConfigSource::Environment);
        assert_eq!(resolved.path.as_deref(), Some(direct_path.as_path()));

        env::remove_var(ENV_CONFIG_PATH);
        let resolved = resolve_config(None);
        assert_eq!(resolved.source, ConfigSource::Environment);
        assert_eq!(
            resolved.path,
            Some(by_dir.path().join(CONFIG_FILENAME))
        );
    });
}

#[cfg(target_os = "linux")]
#[test]
fn resolution_finds_xdg_config() {
    with_env_lock(|| {
        let _guard = EnvGuard::new(GUARDED_KEYS);
        let xdg = TempDir::new().unwrap();
        isolate(xdg.path());
        let expected = xdg.path().join("scriptcast").join(CONFIG_FILENAME);
        write_settings(&expected, 500);

        let resolved = resolve_config(None);
        assert_eq!(resolved.source, ConfigSource::XdgConfig);
        assert_eq!(resolved.path, Some(expected));
    });
}

#[test]
fn cli_argument_beats_environment() {
    with_env_lock(|| {
        let _guard = EnvGuard::new(GUARDED_KEYS);
        let empty = TempDir::new().unwrap();
        isolate(empty.path());

        let env_dir = TempDir::new().unwrap();
        let env_path = env_dir.path().join(CONFIG_FILENAME);
        write_settings(&env_path, 300);
        env::set_var(ENV_CONFIG_PATH, &env_path);

        let cli_dir = TempDir::new().unwrap();
        let cli_path = cli_dir.path().join("cli.json");
        write_settings(&cli_path, 700);

        let resolved = resolve_config(Some(&cli_path));
        assert_eq!(resolved.source, ConfigSource::CliArgument);
        assert_eq!(resolved.path, Some(cli_path));
    });
}
