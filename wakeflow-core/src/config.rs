//! Persistent coordinator configuration (JSON file).

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    coordinator::builder::{
        check_access_key, check_endpoint_duration, check_optional_paths, check_path_exists,
        check_sensitivity,
    },
    engine::{KeywordRef, DEFAULT_ENDPOINT_DURATION_SEC, DEFAULT_SENSITIVITY},
    error::{Result, WakeflowError},
};

/// Environment variable consulted when the config carries no access key.
pub const ACCESS_KEY_ENV: &str = "WAKEFLOW_ACCESS_KEY";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct CoordinatorConfig {
    pub access_key: String,
    pub keyword: KeywordRef,
    pub context_path: PathBuf,
    pub spotter_model_path: Option<PathBuf>,
    pub spotter_library_path: Option<PathBuf>,
    pub spotter_sensitivity: f32,
    pub recognizer_model_path: Option<PathBuf>,
    pub recognizer_library_path: Option<PathBuf>,
    pub recognizer_sensitivity: f32,
    pub endpoint_duration_sec: f32,
    pub require_endpoint: bool,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            access_key: String::new(),
            keyword: KeywordRef::BuiltIn("picovoice".into()),
            context_path: PathBuf::new(),
            spotter_model_path: None,
            spotter_library_path: None,
            spotter_sensitivity: DEFAULT_SENSITIVITY,
            recognizer_model_path: None,
            recognizer_library_path: None,
            recognizer_sensitivity: DEFAULT_SENSITIVITY,
            endpoint_duration_sec: DEFAULT_ENDPOINT_DURATION_SEC,
            require_endpoint: true,
        }
    }
}

impl CoordinatorConfig {
    pub fn normalize(&mut self) {
        self.access_key = self.access_key.trim().to_string();
        for path in [
            &mut self.spotter_model_path,
            &mut self.spotter_library_path,
            &mut self.recognizer_model_path,
            &mut self.recognizer_library_path,
        ] {
            if path.as_ref().is_some_and(|p| p.as_os_str().is_empty()) {
                *path = None;
            }
        }
    }

    /// Fill an empty access key from [`ACCESS_KEY_ENV`].
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|name| std::env::var(name).ok());
    }

    fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.access_key.trim().is_empty() {
            if let Some(key) = lookup(ACCESS_KEY_ENV).filter(|k| !k.trim().is_empty()) {
                debug!("access key taken from {ACCESS_KEY_ENV}");
                self.access_key = key.trim().to_string();
            }
        }
    }

    /// Same checks the builder runs, minus the callbacks.
    pub fn validate(&self) -> Result<()> {
        check_access_key(&self.access_key)?;
        if let Some(path) = self.keyword.as_path() {
            check_path_exists("keyword", path)?;
        }
        check_path_exists("context", &self.context_path)?;
        check_optional_paths(
            &self.spotter_model_path,
            &self.spotter_library_path,
            &self.recognizer_model_path,
            &self.recognizer_library_path,
        )?;
        check_sensitivity("keyword spotter", self.spotter_sensitivity)?;
        check_sensitivity("intent recognizer", self.recognizer_sensitivity)?;
        check_endpoint_duration(self.endpoint_duration_sec)
    }
}

/// Read a config file, normalize it and apply environment overrides.
pub fn load_config(path: &Path) -> Result<CoordinatorConfig> {
    let raw = fs::read_to_string(path).map_err(|e| {
        WakeflowError::Io(format!("couldn't read config '{}': {e}", path.display()))
    })?;
    let mut config: CoordinatorConfig = serde_json::from_str(&raw).map_err(|e| {
        WakeflowError::InvalidArgument(format!("malformed config '{}': {e}", path.display()))
    })?;
    config.normalize();
    config.apply_env_overrides();
    Ok(config)
}

pub fn save_config(path: &Path, config: &CoordinatorConfig) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(config)
        .map_err(|e| WakeflowError::Runtime(format!("serializing config: {e}")))?;
    fs::write(path, json)?;
    Ok(())
}
