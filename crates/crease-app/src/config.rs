// Configuration loading and parsing (crease.toml, credentials.toml).

use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use crease_core::catalog::{Slot, DEFAULT_SLOT_LIMIT};
use crease_core::enrollment::InconsistencyPolicy;
use crease_core::ids::ContestId;
use crease_core::session::SessionOptions;
use crease_store::ContestSeed;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

fn invalid(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        field: field.to_string(),
        message: message.into(),
    }
}

// ---------------------------------------------------------------------------
// Top-level assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub backend: BackendConfig,
    pub store: StoreConfig,
    pub session: SessionConfig,
    pub credentials: CredentialsConfig,
}

/// Raw deserialization target for crease.toml.
#[derive(Debug, Clone, Deserialize)]
struct CreaseFile {
    backend: BackendConfig,
    #[serde(default)]
    store: StoreConfig,
    #[serde(default)]
    session: SessionConfig,
}

// ---------------------------------------------------------------------------
// [backend]
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// SQLite file seeded from this config.
    Local,
    /// A remote fantasy server.
    Http,
}

fn default_slots_path() -> String {
    crease_client::DEFAULT_SLOTS_PATH.to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    pub kind: BackendKind,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_slots_path")]
    pub slots_path: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

// ---------------------------------------------------------------------------
// [store]
// ---------------------------------------------------------------------------

fn default_db_path() -> String {
    "crease.db".to_string()
}

fn default_max_select() -> usize {
    DEFAULT_SLOT_LIMIT
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
    /// Player pool CSV loaded into the store at startup.
    #[serde(default)]
    pub players_csv: Option<String>,
    #[serde(default)]
    pub slots: Vec<SlotSeed>,
    #[serde(default)]
    pub contests: Vec<ContestSeed>,
    #[serde(default)]
    pub contest_points: Vec<ContestPointsSeed>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            db_path: default_db_path(),
            players_csv: None,
            slots: Vec::new(),
            contests: Vec::new(),
            contest_points: Vec::new(),
        }
    }
}

/// Per-contest points overrides, loaded from a `player_id,points` CSV.
#[derive(Debug, Clone, Deserialize)]
pub struct ContestPointsSeed {
    pub contest_id: ContestId,
    pub csv: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SlotSeed {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub min_select: usize,
    #[serde(default = "default_max_select")]
    pub max_select: usize,
}

impl SlotSeed {
    pub fn to_slot(&self) -> Slot {
        Slot::new(self.id.as_str(), &self.name, self.min_select, self.max_select)
    }
}

// ---------------------------------------------------------------------------
// [session]
// ---------------------------------------------------------------------------

fn default_lookup_timeout_ms() -> u64 {
    5000
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Contest the builder is opened for. Without one, no enrollment is
    /// checked and a save only creates the team.
    #[serde(default)]
    pub contest_id: Option<String>,
    #[serde(default)]
    pub total_cap: Option<usize>,
    #[serde(default = "default_lookup_timeout_ms")]
    pub lookup_timeout_ms: u64,
    #[serde(default)]
    pub inconsistency_policy: InconsistencyPolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            contest_id: None,
            total_cap: None,
            lookup_timeout_ms: default_lookup_timeout_ms(),
            inconsistency_policy: InconsistencyPolicy::default(),
        }
    }
}

impl SessionConfig {
    pub fn contest(&self) -> Option<ContestId> {
        self.contest_id.as_deref().map(ContestId::from)
    }

    pub fn options(&self) -> SessionOptions {
        SessionOptions {
            total_cap: self.total_cap,
            lookup_timeout: Duration::from_millis(self.lookup_timeout_ms),
            inconsistency_policy: self.inconsistency_policy,
        }
    }
}

// ---------------------------------------------------------------------------
// credentials.toml structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Default)]
pub struct CredentialsConfig {
    /// Bearer token for the http backend.
    pub token: Option<String>,
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate configuration from `config/crease.toml` and
/// (optionally) `config/credentials.toml`, relative to `base_dir`.
///
/// Does not copy defaults; `load_config()` does.
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let config_dir = base_dir.join("config");

    let crease_path = config_dir.join("crease.toml");
    let crease_text = read_file(&crease_path)?;
    let file: CreaseFile = toml::from_str(&crease_text).map_err(|e| ConfigError::ParseError {
        path: crease_path.clone(),
        source: e,
    })?;

    let credentials_path = config_dir.join("credentials.toml");
    let credentials = if credentials_path.exists() {
        let cred_text = read_file(&credentials_path)?;
        toml::from_str(&cred_text).map_err(|e| ConfigError::ParseError {
            path: credentials_path.clone(),
            source: e,
        })?
    } else {
        CredentialsConfig::default()
    };

    let config = Config {
        backend: file.backend,
        store: file.store,
        session: file.session,
        credentials,
    };

    validate(&config)?;

    Ok(config)
}

/// Files seeded into `config/` from `defaults/` on first run. Credentials
/// ship only as `credentials.toml.example` and are never seeded.
const SEEDED_FILES: &[&str] = &["crease.toml"];

/// Seed `config/` from `defaults/`, never touching a file the user already
/// has. Returns the files written.
pub fn ensure_config_files(base_dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let defaults_dir = base_dir.join("defaults");
    let config_dir = base_dir.join("config");

    if !defaults_dir.is_dir() {
        if config_dir.join("crease.toml").is_file() {
            return Ok(vec![]);
        }
        return Err(ConfigError::DefaultsCopyError {
            message: format!(
                "no config/crease.toml and no defaults/ to seed it from in {}; \
                 run from the crease-app directory",
                base_dir.display()
            ),
        });
    }

    std::fs::create_dir_all(&config_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to create {}: {e}", config_dir.display()),
    })?;

    let mut copied = Vec::new();
    for name in SEEDED_FILES {
        let source = defaults_dir.join(name);
        if !source.is_file() {
            warn!("defaults/{} is missing, not seeding it", name);
            continue;
        }
        let target = config_dir.join(name);
        if seed_file(&source, &target)? {
            info!("Seeded {} from defaults", target.display());
            copied.push(target);
        }
    }
    Ok(copied)
}

/// Copy `source` to `target` unless `target` already exists. `create_new`
/// keeps a concurrently created file intact.
fn seed_file(source: &Path, target: &Path) -> Result<bool, ConfigError> {
    let copy_error = |e: std::io::Error| ConfigError::DefaultsCopyError {
        message: format!("failed to seed {} from {}: {e}", target.display(), source.display()),
    };
    let mut dest = match std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(target)
    {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => return Ok(false),
        Err(e) => return Err(copy_error(e)),
    };
    let mut src = std::fs::File::open(source).map_err(copy_error)?;
    std::io::copy(&mut src, &mut dest).map_err(copy_error)?;
    Ok(true)
}

/// Load config relative to the current working directory, seeding missing
/// files from defaults first.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
        path: PathBuf::from("."),
    })?;
    ensure_config_files(&cwd)?;
    load_config_from(&cwd)
}

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &Config) -> Result<(), ConfigError> {
    let backend = &config.backend;
    if backend.timeout_secs == 0 {
        return Err(invalid("backend.timeout_secs", "must be greater than 0"));
    }
    if backend.kind == BackendKind::Http
        && backend.base_url.as_deref().map_or(true, |u| u.trim().is_empty())
    {
        return Err(invalid("backend.base_url", "required when backend.kind = \"http\""));
    }
    if !backend.slots_path.starts_with('/') {
        return Err(invalid(
            "backend.slots_path",
            format!("must start with '/', got {:?}", backend.slots_path),
        ));
    }

    let mut seen = HashSet::new();
    for slot in &config.store.slots {
        if slot.id.trim().is_empty() {
            return Err(invalid("store.slots.id", "must not be empty"));
        }
        if !seen.insert(slot.id.as_str()) {
            return Err(invalid("store.slots.id", format!("duplicate slot id {:?}", slot.id)));
        }
        if slot.max_select == 0 {
            return Err(invalid(
                "store.slots.max_select",
                format!("slot {:?} must allow at least one player", slot.id),
            ));
        }
        if slot.min_select > slot.max_select {
            return Err(invalid(
                "store.slots.min_select",
                format!(
                    "slot {:?} has min_select {} above max_select {}",
                    slot.id, slot.min_select, slot.max_select
                ),
            ));
        }
    }

    for points in &config.store.contest_points {
        if !config.store.contests.iter().any(|c| c.id == points.contest_id) {
            return Err(invalid(
                "store.contest_points.contest_id",
                format!("contest {:?} is not listed in [[store.contests]]", points.contest_id.as_str()),
            ));
        }
    }

    let session = &config.session;
    if session.lookup_timeout_ms == 0 {
        return Err(invalid("session.lookup_timeout_ms", "must be greater than 0"));
    }
    if session.total_cap == Some(0) {
        return Err(invalid("session.total_cap", "must be greater than 0 when set"));
    }
    if session.contest_id.as_deref().is_some_and(|c| c.trim().is_empty()) {
        return Err(invalid("session.contest_id", "must not be blank when set"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    /// Returns the crease-app directory, whether tests run from the crate
    /// or from the workspace root.
    fn project_root() -> PathBuf {
        let cwd = std::env::current_dir().unwrap();
        if cwd.join("defaults").exists() {
            cwd
        } else if cwd.join("crates/crease-app/defaults").exists() {
            cwd.join("crates/crease-app")
        } else {
            panic!("Cannot locate defaults/ directory from CWD {:?}", cwd);
        }
    }

    /// Fresh temp dir with `config/crease.toml` holding `body`.
    fn temp_config(name: &str, body: &str) -> PathBuf {
        let tmp = std::env::temp_dir().join(name);
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(tmp.join("config")).unwrap();
        fs::write(tmp.join("config/crease.toml"), body).unwrap();
        tmp
    }

    fn expect_invalid(name: &str, body: &str, field: &str) {
        let tmp = temp_config(name, body);
        match load_config_from(&tmp).unwrap_err() {
            ConfigError::ValidationError { field: f, .. } => assert_eq!(f, field),
            other => panic!("expected ValidationError for {field}, got: {other}"),
        }
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn load_defaults_shipped_with_the_app() {
        let tmp = std::env::temp_dir().join("crease_config_defaults");
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(tmp.join("config")).unwrap();
        fs::copy(
            project_root().join("defaults/crease.toml"),
            tmp.join("config/crease.toml"),
        )
        .unwrap();

        let config = load_config_from(&tmp).expect("defaults should load");
        assert_eq!(config.backend.kind, BackendKind::Local);
        assert_eq!(config.backend.slots_path, "/api/admin/slots");
        assert_eq!(config.store.slots.len(), 4);
        assert_eq!(config.store.slots.iter().map(|s| s.max_select).sum::<usize>(), 16);
        assert_eq!(config.store.contests[0].id, ContestId::from("weekend-cup"));
        assert_eq!(config.session.contest(), Some(ContestId::from("weekend-cup")));
        assert_eq!(config.session.inconsistency_policy, InconsistencyPolicy::SelfHeal);
        assert_eq!(config.session.options().lookup_timeout, Duration::from_millis(5000));
        assert!(config.credentials.token.is_none());

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn minimal_file_fills_defaults() {
        let tmp = temp_config(
            "crease_config_minimal",
            "[backend]\nkind = \"local\"\n\n[[store.slots]]\nid = \"bat\"\nname = \"Batsman\"\n",
        );
        let config = load_config_from(&tmp).unwrap();
        assert_eq!(config.store.db_path, "crease.db");
        assert_eq!(config.store.slots[0].max_select, DEFAULT_SLOT_LIMIT);
        assert_eq!(config.store.slots[0].min_select, 0);
        assert_eq!(config.session.contest(), None);
        assert_eq!(config.backend.timeout_secs, 10);
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn block_policy_and_total_cap_parse() {
        let tmp = temp_config(
            "crease_config_block",
            "[backend]\nkind = \"local\"\n\n[session]\ncontest_id = \"c1\"\ntotal_cap = 11\ninconsistency_policy = \"block\"\n",
        );
        let config = load_config_from(&tmp).unwrap();
        let opts = config.session.options();
        assert_eq!(opts.inconsistency_policy, InconsistencyPolicy::Block);
        assert_eq!(opts.total_cap, Some(11));
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn credentials_toml_with_token() {
        let tmp = temp_config("crease_config_creds", "[backend]\nkind = \"http\"\nbase_url = \"https://fantasy.test\"\n");
        fs::write(tmp.join("config/credentials.toml"), "token = \"abc123\"\n").unwrap();
        let config = load_config_from(&tmp).unwrap();
        assert_eq!(config.credentials.token.as_deref(), Some("abc123"));
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_http_without_base_url() {
        expect_invalid(
            "crease_config_no_url",
            "[backend]\nkind = \"http\"\n",
            "backend.base_url",
        );
    }

    #[test]
    fn rejects_zero_timeout() {
        expect_invalid(
            "crease_config_zero_timeout",
            "[backend]\nkind = \"local\"\ntimeout_secs = 0\n",
            "backend.timeout_secs",
        );
    }

    #[test]
    fn rejects_inverted_slot_limits() {
        expect_invalid(
            "crease_config_inverted",
            "[backend]\nkind = \"local\"\n\n[[store.slots]]\nid = \"bat\"\nname = \"Batsman\"\nmin_select = 5\nmax_select = 3\n",
            "store.slots.min_select",
        );
    }

    #[test]
    fn rejects_duplicate_slot_ids() {
        expect_invalid(
            "crease_config_dup_slot",
            "[backend]\nkind = \"local\"\n\n[[store.slots]]\nid = \"bat\"\nname = \"A\"\n\n[[store.slots]]\nid = \"bat\"\nname = \"B\"\n",
            "store.slots.id",
        );
    }

    #[test]
    fn rejects_zero_total_cap() {
        expect_invalid(
            "crease_config_zero_cap",
            "[backend]\nkind = \"local\"\n\n[session]\ntotal_cap = 0\n",
            "session.total_cap",
        );
    }

    #[test]
    fn rejects_points_for_unlisted_contest() {
        expect_invalid(
            "crease_config_points_unlisted",
            "[backend]\nkind = \"local\"\n\n[[store.contest_points]]\ncontest_id = \"ghost\"\ncsv = \"data/ghost.csv\"\n",
            "store.contest_points.contest_id",
        );
    }

    #[test]
    fn unknown_policy_is_parse_error() {
        let tmp = temp_config(
            "crease_config_bad_policy",
            "[backend]\nkind = \"local\"\n\n[session]\ninconsistency_policy = \"ignore\"\n",
        );
        assert!(matches!(
            load_config_from(&tmp),
            Err(ConfigError::ParseError { .. })
        ));
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn file_not_found_for_missing_crease_toml() {
        let tmp = std::env::temp_dir().join("crease_config_missing");
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(tmp.join("config")).unwrap();
        match load_config_from(&tmp).unwrap_err() {
            ConfigError::FileNotFound { path } => assert!(path.ends_with("crease.toml")),
            other => panic!("expected FileNotFound, got: {other}"),
        }
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn ensure_config_files_seeds_crease_toml_only() {
        let tmp = std::env::temp_dir().join("crease_config_ensure");
        let _ = fs::remove_dir_all(&tmp);
        let defaults_dir = tmp.join("defaults");
        fs::create_dir_all(&defaults_dir).unwrap();
        fs::copy(
            project_root().join("defaults/crease.toml"),
            defaults_dir.join("crease.toml"),
        )
        .unwrap();
        fs::write(defaults_dir.join("credentials.toml.example"), "token = \"...\"\n").unwrap();
        fs::write(defaults_dir.join("notes.toml"), "# not a crease file\n").unwrap();

        let copied = ensure_config_files(&tmp).expect("should succeed");
        assert_eq!(copied.len(), 1);
        assert!(tmp.join("config/crease.toml").exists());
        assert!(!tmp.join("config/credentials.toml.example").exists());
        assert!(!tmp.join("config/notes.toml").exists());

        // Second run leaves the existing file alone.
        fs::write(tmp.join("config/crease.toml"), "# custom\n").unwrap();
        assert!(ensure_config_files(&tmp).unwrap().is_empty());
        assert_eq!(fs::read_to_string(tmp.join("config/crease.toml")).unwrap(), "# custom\n");

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn ensure_config_files_errors_when_both_dirs_missing() {
        let tmp = std::env::temp_dir().join("crease_config_both_missing");
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(&tmp).unwrap();
        match ensure_config_files(&tmp).unwrap_err() {
            ConfigError::DefaultsCopyError { message } => {
                assert!(message.contains("no config/crease.toml and no defaults/"));
            }
            other => panic!("expected DefaultsCopyError, got: {other}"),
        }
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn existing_config_without_defaults_is_fine() {
        let tmp = std::env::temp_dir().join("crease_config_no_defaults");
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(tmp.join("config")).unwrap();
        fs::write(tmp.join("config/crease.toml"), "# custom\n").unwrap();
        assert!(ensure_config_files(&tmp).unwrap().is_empty());
        let _ = fs::remove_dir_all(&tmp);
    }
}
