//! Resolves [`ClientConfig`] from files, inline JSON and the environment.

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use tracing::{debug, info};
use url::Url;

use crate::{
    error::ConfigLoadError,
    models::{ClientConfig, ServiceRoute},
};

pub const CONFIG_PATH_VAR: &str = "ATELIER_CONFIG_PATH";
pub const CONFIG_JSON_VAR: &str = "ATELIER_CONFIG_JSON";
pub const API_URL_VAR: &str = "ATELIER_API_URL";
pub const REQUEST_TIMEOUT_VAR: &str = "ATELIER_REQUEST_TIMEOUT_MS";

const DEFAULT_CANDIDATES: &[&str] = &[
    "atelier.toml",
    "atelier.json",
    "config/atelier.toml",
    "config/atelier.json",
];

/// Read-only view of environment variables, so loading can be exercised
/// without touching the process environment.
pub trait EnvSource {
    fn var(&self, key: &str) -> Option<String>;
}

/// The real process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl EnvSource for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

/// Where the base configuration came from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConfigSource {
    #[default]
    Default,
    EnvPath(PathBuf),
    EnvInline,
    File(PathBuf),
}

/// Result of a load: the effective config, its base source and the
/// environment keys that overrode it.
#[derive(Debug, Clone)]
pub struct ConfigLoad {
    pub config: ClientConfig,
    pub source: ConfigSource,
    pub overrides: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ConfigLoader<E = ProcessEnv> {
    env: E,
    search_root: PathBuf,
    env_file: Option<PathBuf>,
}

impl ConfigLoader<ProcessEnv> {
    /// Loader over the process environment, searching the working
    /// directory and reading `.env` when present.
    pub fn from_process() -> Self {
        Self {
            env: ProcessEnv,
            search_root: PathBuf::from("."),
            env_file: Some(PathBuf::from(".env")),
        }
    }
}

impl<E: EnvSource> ConfigLoader<E> {
    pub fn with_env(env: E, search_root: impl Into<PathBuf>) -> Self {
        Self {
            env,
            search_root: search_root.into(),
            env_file: None,
        }
    }

    pub fn env_file(mut self, path: Option<PathBuf>) -> Self {
        self.env_file = path;
        self
    }

    /// Evaluation order:
    /// 1) `$ATELIER_CONFIG_PATH` (TOML or JSON file),
    /// 2) `$ATELIER_CONFIG_JSON` (inline JSON),
    /// 3) `atelier.toml`/`atelier.json` under the search root,
    /// 4) defaults,
    ///
    /// then `ATELIER_*` variables override single fields.
    pub fn load(&self) -> Result<ConfigLoad, ConfigLoadError> {
        if let Some(path) = &self.env_file {
            match dotenvy::from_path(path) {
                Ok(()) => debug!("[Config] Loaded env file {}", path.display()),
                Err(err) if err.not_found() => {}
                Err(err) => return Err(err.into()),
            }
        }

        let (mut config, source) = self.load_base()?;
        let overrides = self.apply_env_overrides(&mut config)?;
        config.validate()?;

        info!(
            "[Config] Loaded client configuration from {:?} ({} overrides)",
            source,
            overrides.len()
        );

        Ok(ConfigLoad {
            config,
            source,
            overrides,
        })
    }

    fn non_empty_var(&self, key: &str) -> Option<String> {
        self.env
            .var(key)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn load_base(&self) -> Result<(ClientConfig, ConfigSource), ConfigLoadError> {
        if let Some(path_str) = self.non_empty_var(CONFIG_PATH_VAR) {
            let path = PathBuf::from(path_str);
            let config = load_from_file(&path)?;
            return Ok((config, ConfigSource::EnvPath(path)));
        }

        if let Some(raw) = self.non_empty_var(CONFIG_JSON_VAR) {
            let config = serde_json::from_str(&raw).map_err(|source| {
                ConfigLoadError::Json {
                    origin: CONFIG_JSON_VAR.to_string(),
                    source,
                }
            })?;
            return Ok((config, ConfigSource::EnvInline));
        }

        if let Some(path) = self.find_default_file() {
            let config = load_from_file(&path)?;
            return Ok((config, ConfigSource::File(path)));
        }

        Ok((ClientConfig::default(), ConfigSource::Default))
    }

    fn find_default_file(&self) -> Option<PathBuf> {
        DEFAULT_CANDIDATES
            .iter()
            .map(|candidate| self.search_root.join(candidate))
            .find(|path| path.exists())
    }

    fn apply_env_overrides(
        &self,
        config: &mut ClientConfig,
    ) -> Result<Vec<String>, ConfigLoadError> {
        let mut applied = Vec::new();

        if let Some(raw) = self.non_empty_var(API_URL_VAR) {
            let url = parse_url(API_URL_VAR, &raw)?;
            for route in [
                ServiceRoute::Auth,
                ServiceRoute::Gallery,
                ServiceRoute::Treasury,
                ServiceRoute::User,
            ] {
                config.endpoints.set(route, url.clone());
            }
            applied.push(API_URL_VAR.to_string());
        }

        // Per-service variables win over the shared base URL.
        for route in [
            ServiceRoute::Auth,
            ServiceRoute::Gallery,
            ServiceRoute::Treasury,
            ServiceRoute::User,
        ] {
            let key = endpoint_var(route);
            if let Some(raw) = self.non_empty_var(&key) {
                let url = parse_url(&key, &raw)?;
                config.endpoints.set(route, url);
                applied.push(key);
            }
        }

        if let Some(raw) = self.non_empty_var(REQUEST_TIMEOUT_VAR) {
            config.request_timeout_ms = raw.parse().map_err(|_| {
                ConfigLoadError::InvalidValue {
                    key: REQUEST_TIMEOUT_VAR.to_string(),
                    reason: format!("'{raw}' is not a whole number of milliseconds"),
                }
            })?;
            applied.push(REQUEST_TIMEOUT_VAR.to_string());
        }

        Ok(applied)
    }
}

/// Environment variable that overrides one service's base URL, e.g.
/// `ATELIER_TREASURY_URL`.
pub fn endpoint_var(route: ServiceRoute) -> String {
    format!("ATELIER_{}_URL", route.as_str().to_ascii_uppercase())
}

fn parse_url(key: &str, raw: &str) -> Result<Url, ConfigLoadError> {
    Url::parse(raw).map_err(|source| ConfigLoadError::InvalidUrl {
        key: key.to_string(),
        value: raw.to_string(),
        source,
    })
}

pub fn load_from_file(path: &Path) -> Result<ClientConfig, ConfigLoadError> {
    let contents =
        fs::read_to_string(path).map_err(|source| ConfigLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    let origin = path.display().to_string();

    match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => serde_json::from_str(&contents)
            .map_err(|source| ConfigLoadError::Json { origin, source }),
        Some("toml") | Some("tml") => toml::from_str(&contents)
            .map_err(|source| ConfigLoadError::Toml { origin, source }),
        _ => parse_from_str(&contents, &origin),
    }
}

/// Tries TOML first, then JSON.
pub fn parse_from_str(
    contents: &str,
    origin: &str,
) -> Result<ClientConfig, ConfigLoadError> {
    toml::from_str(contents).or_else(|toml_err| {
        serde_json::from_str(contents).map_err(|json_err| {
            ConfigLoadError::Unparseable {
                origin: origin.to_string(),
                toml: toml_err.to_string(),
                json: json_err.to_string(),
            }
        })
    })
}
