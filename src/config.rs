// src/config.rs

use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{info, warn};

use crate::error::ConfigError;

// A geocoded point further than this from the stored one replaces it.
pub const DISTANCE_THRESHOLD_KM: f64 = 0.5;

// Pause after every geocoding call to stay under the provider's rate limit.
pub const GEOCODE_DELAY_MS: u64 = 100;

pub const PROGRESS_INTERVAL: usize = 50;

pub const GEOCODE_TIMEOUT_SECS: u64 = 10;
pub const STORE_TIMEOUT_SECS: u64 = 30;

pub const MAPBOX_BASE_URL: &str = "https://api.mapbox.com";

const ENV_PATHS: [&str; 3] = [".env", ".env.local", "../.env"];

/// Which facilities a run looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordScope {
    #[default]
    All,
    /// Only facilities lacking a stored coordinate.
    MissingOnly,
}

/// Knobs for the reconciliation engine. Built once and handed to the engine.
#[derive(Debug, Clone)]
pub struct ReconcileConfig {
    pub distance_threshold_km: f64,
    pub request_delay: Duration,
    pub progress_interval: usize,
    pub scope: RecordScope,
    pub dry_run: bool,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            distance_threshold_km: DISTANCE_THRESHOLD_KM,
            request_delay: Duration::from_millis(GEOCODE_DELAY_MS),
            progress_interval: PROGRESS_INTERVAL,
            scope: RecordScope::All,
            dry_run: false,
        }
    }
}

#[derive(Clone)]
pub struct MapboxConfig {
    pub access_token: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl std::fmt::Debug for MapboxConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapboxConfig")
            .field("access_token", &"[hidden]")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl MapboxConfig {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            base_url: MAPBOX_BASE_URL.to_string(),
            timeout: Duration::from_secs(GEOCODE_TIMEOUT_SECS),
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::resolve(process_env)
    }

    pub fn resolve(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let token = first_set(&lookup, &["MAPBOX_TOKEN", "NEXT_PUBLIC_MAPBOX_TOKEN"])
            .ok_or(ConfigError::Missing("MAPBOX_TOKEN"))?;
        let mut config = Self::new(token);
        if let Some(base_url) = first_set(&lookup, &["MAPBOX_BASE_URL"]) {
            config.base_url = base_url;
        }
        Ok(config)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Postgres,
    Supabase,
}

#[derive(Debug, Clone)]
pub struct PostgresSettings {
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub user: String,
    pub password: String,
}

#[derive(Clone)]
pub struct SupabaseSettings {
    pub url: String,
    pub service_key: String,
    pub timeout: Duration,
}

impl std::fmt::Debug for SupabaseSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupabaseSettings")
            .field("url", &self.url)
            .field("service_key", &"[hidden]")
            .finish()
    }
}

/// Where facilities are read from and written back to.
#[derive(Debug, Clone)]
pub enum StoreConfig {
    Postgres(PostgresSettings),
    Supabase(SupabaseSettings),
}

impl StoreConfig {
    pub fn from_env(kind: Option<StoreKind>) -> Result<Self, ConfigError> {
        Self::resolve(kind, process_env)
    }

    /// Picks the backend from `lookup`. Supabase wins when both its URL and
    /// service key are set, unless `kind` forces one. Blank values count as
    /// unset.
    pub fn resolve(
        kind: Option<StoreKind>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let supabase_url = first_set(&lookup, &["SUPABASE_URL", "NEXT_PUBLIC_SUPABASE_URL"]);
        let supabase_key = first_set(&lookup, &["SUPABASE_SERVICE_ROLE_KEY"]);

        let kind = kind.unwrap_or(if supabase_url.is_some() && supabase_key.is_some() {
            StoreKind::Supabase
        } else {
            StoreKind::Postgres
        });

        match kind {
            StoreKind::Supabase => Ok(StoreConfig::Supabase(SupabaseSettings {
                url: supabase_url.ok_or(ConfigError::Missing("SUPABASE_URL"))?,
                service_key: supabase_key.ok_or(ConfigError::Missing("SUPABASE_SERVICE_ROLE_KEY"))?,
                timeout: Duration::from_secs(STORE_TIMEOUT_SECS),
            })),
            StoreKind::Postgres => Ok(StoreConfig::Postgres(postgres_settings(&lookup)?)),
        }
    }
}

fn postgres_settings(
    lookup: &impl Fn(&str) -> Option<String>,
) -> Result<PostgresSettings, ConfigError> {
    let port_str = lookup("POSTGRES_PORT").unwrap_or_else(|| "5432".to_string());
    let port = port_str.parse::<u16>().map_err(|_| ConfigError::Invalid {
        name: "POSTGRES_PORT",
        value: port_str.clone(),
    })?;

    Ok(PostgresSettings {
        host: lookup("POSTGRES_HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
        port,
        dbname: lookup("POSTGRES_DB").unwrap_or_else(|| "dataplatform".to_string()),
        user: lookup("POSTGRES_USER").unwrap_or_else(|| "postgres".to_string()),
        password: lookup("POSTGRES_PASSWORD").unwrap_or_default(),
    })
}

fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn first_set(lookup: &impl Fn(&str) -> Option<String>, names: &[&str]) -> Option<String> {
    names
        .iter()
        .copied()
        .filter_map(|name| lookup(name))
        .find(|value| !value.trim().is_empty())
}

/// Env files under `dir` that exist, in the order they are tried.
fn env_file_candidates(dir: &Path) -> Vec<PathBuf> {
    ENV_PATHS
        .iter()
        .map(|path| dir.join(path))
        .filter(|path| path.exists())
        .collect()
}

/// Loads the first env file found. Variables already set in the process are
/// left alone.
pub fn load_env() {
    for path in env_file_candidates(Path::new(".")) {
        match dotenv::from_path(&path) {
            Ok(()) => {
                info!("Loaded environment variables from {}", path.display());
                return;
            }
            Err(e) => warn!("Failed to load environment from {}: {}", path.display(), e),
        }
    }
    info!("No .env file found, using environment variables from system");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_constants() {
        let config = ReconcileConfig::default();
        assert_eq!(config.distance_threshold_km, 0.5);
        assert_eq!(config.request_delay, Duration::from_millis(100));
        assert_eq!(config.progress_interval, 50);
        assert_eq!(config.scope, RecordScope::All);
        assert!(!config.dry_run);
    }

    #[test]
    fn mapbox_debug_hides_token() {
        let config = MapboxConfig::new("pk.secret");
        let printed = format!("{:?}", config);
        assert!(!printed.contains("pk.secret"));
        assert!(printed.contains("[hidden]"));
    }

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: std::collections::HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| vars.get(name).cloned()
    }

    #[test]
    fn supabase_is_picked_when_url_and_key_are_set() {
        let lookup = env_of(&[
            ("NEXT_PUBLIC_SUPABASE_URL", "https://public.supabase.co"),
            ("SUPABASE_URL", "https://abc.supabase.co"),
            ("SUPABASE_SERVICE_ROLE_KEY", "service"),
        ]);
        match StoreConfig::resolve(None, lookup).unwrap() {
            StoreConfig::Supabase(settings) => {
                assert_eq!(settings.url, "https://abc.supabase.co");
                assert_eq!(settings.service_key, "service");
            }
            other => panic!("expected Supabase, got {other:?}"),
        }
    }

    #[test]
    fn blank_supabase_url_falls_back_to_public_name() {
        let lookup = env_of(&[
            ("SUPABASE_URL", "  "),
            ("NEXT_PUBLIC_SUPABASE_URL", "https://public.supabase.co"),
            ("SUPABASE_SERVICE_ROLE_KEY", "service"),
        ]);
        match StoreConfig::resolve(None, lookup).unwrap() {
            StoreConfig::Supabase(settings) => {
                assert_eq!(settings.url, "https://public.supabase.co")
            }
            other => panic!("expected Supabase, got {other:?}"),
        }
    }

    #[test]
    fn postgres_is_the_fallback_with_pipeline_defaults() {
        let lookup = env_of(&[("SUPABASE_URL", "https://abc.supabase.co")]);
        match StoreConfig::resolve(None, lookup).unwrap() {
            StoreConfig::Postgres(settings) => {
                assert_eq!(settings.host, "127.0.0.1");
                assert_eq!(settings.port, 5432);
                assert_eq!(settings.dbname, "dataplatform");
                assert_eq!(settings.user, "postgres");
                assert_eq!(settings.password, "");
            }
            other => panic!("expected Postgres, got {other:?}"),
        }
    }

    #[test]
    fn explicit_kind_overrides_auto_selection() {
        let lookup = env_of(&[
            ("SUPABASE_URL", "https://abc.supabase.co"),
            ("SUPABASE_SERVICE_ROLE_KEY", "service"),
            ("POSTGRES_HOST", "db.internal"),
        ]);
        match StoreConfig::resolve(Some(StoreKind::Postgres), lookup).unwrap() {
            StoreConfig::Postgres(settings) => assert_eq!(settings.host, "db.internal"),
            other => panic!("expected Postgres, got {other:?}"),
        }
    }

    #[test]
    fn forced_supabase_without_key_is_missing() {
        let lookup = env_of(&[("SUPABASE_URL", "https://abc.supabase.co")]);
        let err = StoreConfig::resolve(Some(StoreKind::Supabase), lookup).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("SUPABASE_SERVICE_ROLE_KEY")));
    }

    #[test]
    fn bad_postgres_port_is_invalid() {
        let lookup = env_of(&[("POSTGRES_PORT", "not-a-port")]);
        let err = StoreConfig::resolve(None, lookup).unwrap_err();
        match err {
            ConfigError::Invalid { name, value } => {
                assert_eq!(name, "POSTGRES_PORT");
                assert_eq!(value, "not-a-port");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn mapbox_token_falls_back_to_public_name() {
        let config =
            MapboxConfig::resolve(env_of(&[("NEXT_PUBLIC_MAPBOX_TOKEN", "pk.public")])).unwrap();
        assert_eq!(config.access_token, "pk.public");
        assert_eq!(config.base_url, MAPBOX_BASE_URL);

        let err = MapboxConfig::resolve(env_of(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("MAPBOX_TOKEN")));
    }

    #[test]
    fn env_files_are_tried_in_order() {
        let root = tempfile::tempdir().unwrap();
        let app = root.path().join("app");
        std::fs::create_dir(&app).unwrap();
        assert!(env_file_candidates(&app).is_empty());

        std::fs::write(root.path().join(".env"), "A=1\n").unwrap();
        std::fs::write(app.join(".env.local"), "A=2\n").unwrap();
        std::fs::write(app.join(".env"), "A=3\n").unwrap();

        let found = env_file_candidates(&app);
        assert_eq!(
            found,
            vec![app.join(".env"), app.join(".env.local"), app.join("../.env")]
        );
    }
}
