// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use evadmin_app::{DEFAULT_PAGE_SIZE, PAGE_SIZE_CHOICES};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_VERSION: i64 = 1;
const DEFAULT_BACKEND_TIMEOUT: &str = "10s";
const DEFAULT_FACE_API_URL: &str = "http://localhost:8000";
const DEFAULT_FACE_API_TIMEOUT: &str = "30s";
const DEFAULT_AVATAR_BUCKET: &str = "avatars";
const DEFAULT_AVATAR_FOLDER: &str = "users";
const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub version: i64,
    #[serde(default)]
    pub backend: Backend,
    #[serde(default)]
    pub face_api: FaceApi,
    #[serde(default)]
    pub storage: Storage,
    #[serde(default)]
    pub ui: Ui,
    #[serde(default)]
    pub log: Log,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            backend: Backend::default(),
            face_api: FaceApi::default(),
            storage: Storage::default(),
            ui: Ui::default(),
            log: Log::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Backend {
    pub url: Option<String>,
    pub anon_key: Option<String>,
    pub timeout: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FaceApi {
    pub enabled: Option<bool>,
    pub base_url: Option<String>,
    pub timeout: Option<String>,
}

impl Default for FaceApi {
    fn default() -> Self {
        Self {
            enabled: Some(true),
            base_url: Some(DEFAULT_FACE_API_URL.to_owned()),
            timeout: Some(DEFAULT_FACE_API_TIMEOUT.to_owned()),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Storage {
    pub db_path: Option<String>,
    pub avatar_bucket: Option<String>,
    pub avatar_folder: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Ui {
    pub page_size: Option<u32>,
}

impl Default for Ui {
    fn default() -> Self {
        Self {
            page_size: Some(DEFAULT_PAGE_SIZE),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Log {
    pub level: Option<String>,
    pub file: Option<String>,
}

/// Where the REST backend lives and how to reach it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendSettings {
    pub url: String,
    pub anon_key: String,
    pub timeout: Duration,
}

impl Config {
    pub fn default_path() -> Result<PathBuf> {
        if let Some(path) = env::var_os("EVADMIN_CONFIG_PATH") {
            return Ok(PathBuf::from(path));
        }

        let config_root = dirs::config_dir().ok_or_else(|| {
            anyhow!("cannot resolve config directory; set EVADMIN_CONFIG_PATH to the config file")
        })?;

        let app_dir = config_root.join(evadmin_db::APP_NAME);
        fs::create_dir_all(&app_dir)
            .with_context(|| format!("create config directory {}", app_dir.display()))?;
        Ok(app_dir.join("config.toml"))
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path)
            .with_context(|| format!("read config file {}", path.display()))?;
        let value: toml::Value = toml::from_str(&raw)
            .with_context(|| format!("parse TOML config {}", path.display()))?;

        let version = value
            .get("version")
            .and_then(toml::Value::as_integer)
            .ok_or_else(|| {
                anyhow!(
                    "config file {} has no version. Add `version = 1` at the top and keep values under [backend], [face_api], [storage], [ui], and [log]",
                    path.display()
                )
            })?;

        if version != CONFIG_VERSION {
            bail!(
                "unsupported config version {} in {}; expected version = 1. Run `evadmin --print-example-config` for the current layout",
                version,
                path.display()
            );
        }

        let config: Config = value
            .try_into()
            .with_context(|| format!("decode config {}", path.display()))?;
        config.validate(path)?;
        Ok(config)
    }

    fn validate(&self, path: &Path) -> Result<()> {
        if let Some(db_path) = &self.storage.db_path {
            evadmin_db::validate_db_path(db_path)?;
        }

        if let Some(url) = &self.backend.url
            && !(url.starts_with("http://") || url.starts_with("https://"))
        {
            bail!(
                "backend.url in {} must start with http:// or https://, got {url:?}",
                path.display()
            );
        }

        for (key, timeout) in [
            ("backend.timeout", &self.backend.timeout),
            ("face_api.timeout", &self.face_api.timeout),
        ] {
            if let Some(timeout) = timeout {
                let parsed = parse_duration(timeout)?;
                if parsed <= Duration::ZERO {
                    bail!(
                        "{key} in {} must be positive, got {timeout}",
                        path.display()
                    );
                }
            }
        }

        if let Some(page_size) = self.ui.page_size
            && !PAGE_SIZE_CHOICES.contains(&page_size)
        {
            bail!(
                "ui.page_size in {} must be one of {:?}, got {page_size}",
                path.display(),
                PAGE_SIZE_CHOICES
            );
        }

        Ok(())
    }

    pub fn db_path(&self) -> Result<PathBuf> {
        match &self.storage.db_path {
            Some(path) => Ok(PathBuf::from(path)),
            None => evadmin_db::default_db_path(),
        }
    }

    /// Backend settings, or `None` when no URL is configured.
    /// `EVADMIN_ANON_KEY` takes precedence over `[backend].anon_key`.
    pub fn backend(&self) -> Result<Option<BackendSettings>> {
        let Some(url) = self.backend.url.as_deref() else {
            return Ok(None);
        };
        let anon_key = match env::var("EVADMIN_ANON_KEY") {
            Ok(key) if !key.trim().is_empty() => key,
            _ => self.backend.anon_key.clone().unwrap_or_default(),
        };
        if anon_key.trim().is_empty() {
            bail!("[backend].url is set but no anon key; set [backend].anon_key or EVADMIN_ANON_KEY");
        }
        Ok(Some(BackendSettings {
            url: url.trim_end_matches('/').to_owned(),
            anon_key,
            timeout: parse_duration(
                self.backend
                    .timeout
                    .as_deref()
                    .unwrap_or(DEFAULT_BACKEND_TIMEOUT),
            )?,
        }))
    }

    pub fn face_api_enabled(&self) -> bool {
        self.face_api.enabled.unwrap_or(true)
    }

    pub fn face_api_url(&self) -> &str {
        self.face_api
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_FACE_API_URL)
            .trim_end_matches('/')
    }

    pub fn face_api_timeout(&self) -> Result<Duration> {
        parse_duration(
            self.face_api
                .timeout
                .as_deref()
                .unwrap_or(DEFAULT_FACE_API_TIMEOUT),
        )
    }

    pub fn avatar_bucket(&self) -> &str {
        self.storage
            .avatar_bucket
            .as_deref()
            .unwrap_or(DEFAULT_AVATAR_BUCKET)
    }

    pub fn avatar_folder(&self) -> &str {
        self.storage
            .avatar_folder
            .as_deref()
            .unwrap_or(DEFAULT_AVATAR_FOLDER)
    }

    pub fn page_size(&self) -> u32 {
        self.ui.page_size.unwrap_or(DEFAULT_PAGE_SIZE)
    }

    pub fn log_level(&self) -> &str {
        self.log.level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL)
    }

    /// Log file next to the database unless `[log].file` says otherwise.
    pub fn log_file(&self) -> Result<PathBuf> {
        match &self.log.file {
            Some(path) => Ok(PathBuf::from(path)),
            None => {
                let db_path = self.db_path()?;
                let dir = db_path
                    .parent()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| PathBuf::from("."));
                Ok(dir.join("evadmin.log"))
            }
        }
    }

    pub fn example_config(path: &Path) -> String {
        format!(
            "# evadmin config\n# Place this file at: {}\n\nversion = 1\n\n[backend]\n# Base URL of the hosted backend. Leave unset and use --demo to try the dashboard offline.\n# url = \"https://your-project.example.co\"\n# anon_key = \"...\"  (or set EVADMIN_ANON_KEY)\ntimeout = \"{}\"\n\n[face_api]\nenabled = true\nbase_url = \"{}\"\ntimeout = \"{}\"\n\n[storage]\n# Optional. Default is platform data dir (for example ~/.local/share/evadmin/evadmin.db)\n# db_path = \"/absolute/path/to/evadmin.db\"\navatar_bucket = \"{}\"\navatar_folder = \"{}\"\n\n[ui]\npage_size = {}\n\n[log]\nlevel = \"{}\"\n# file = \"/absolute/path/to/evadmin.log\"\n",
            path.display(),
            DEFAULT_BACKEND_TIMEOUT,
            DEFAULT_FACE_API_URL,
            DEFAULT_FACE_API_TIMEOUT,
            DEFAULT_AVATAR_BUCKET,
            DEFAULT_AVATAR_FOLDER,
            DEFAULT_PAGE_SIZE,
            DEFAULT_LOG_LEVEL,
        )
    }
}

fn parse_duration(raw: &str) -> Result<Duration> {
    if let Some(value) = raw.strip_suffix("ms") {
        let millis: u64 = value
            .parse()
            .with_context(|| format!("invalid timeout duration {raw:?}"))?;
        return Ok(Duration::from_millis(millis));
    }
    if let Some(value) = raw.strip_suffix('s') {
        let secs: u64 = value
            .parse()
            .with_context(|| format!("invalid timeout duration {raw:?}"))?;
        return Ok(Duration::from_secs(secs));
    }
    if let Some(value) = raw.strip_suffix('m') {
        let mins: u64 = value
            .parse()
            .with_context(|| format!("invalid timeout duration {raw:?}"))?;
        return Ok(Duration::from_secs(mins * 60));
    }

    bail!("invalid duration {raw:?}; use one of: <N>ms, <N>s, <N>m (for example 500ms or 5s)")
}
