//! Configuration loading and merging.
//!
//! Layers, lowest precedence first: user config, `./learnpath.toml`, the file named by
//! `LEARNPATH_CONFIG`, then individual `LEARNPATH_*` environment overrides.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use directories::ProjectDirs;
use learnpath_core::VerificationMode;
use toml::{Table, Value};

use super::types::Config;

const PROJECT_CONFIG: &str = "learnpath.toml";
const CONFIG_ENV: &str = "LEARNPATH_CONFIG";

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load from the standard locations and the process environment.
    pub fn load() -> Result<Config> {
        let explicit = std::env::var(CONFIG_ENV).ok().map(PathBuf::from);
        if let Some(path) = &explicit
            && !path.exists()
        {
            bail!("{CONFIG_ENV} points at {}, which does not exist", path.display());
        }

        let mut layers = Vec::new();
        layers.extend(Self::user_config_path());
        layers.push(Self::project_config_path());
        layers.extend(explicit);
        Self::load_layers(&layers, |key| std::env::var(key).ok())
    }

    /// Merge the files that exist among `paths`, then apply overrides from `env`.
    pub fn load_layers(paths: &[PathBuf], env: impl Fn(&str) -> Option<String>) -> Result<Config> {
        let mut merged = Table::new();
        for path in paths.iter().filter(|p| p.exists()) {
            let layer = Self::read_layer(path)?;
            merge_tables(&mut merged, layer);
        }
        let mut config = Value::Table(merged)
            .try_into::<Config>()
            .context("effective configuration is invalid")?;
        apply_env(&mut config, env)?;
        Ok(config)
    }

    pub fn user_config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "learnpath").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    pub fn project_config_path() -> PathBuf {
        PathBuf::from(PROJECT_CONFIG)
    }

    pub fn explicit_config_path() -> Option<PathBuf> {
        std::env::var(CONFIG_ENV).ok().map(PathBuf::from)
    }

    fn read_layer(path: &Path) -> Result<Table> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        toml::from_str::<Table>(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }
}

/// Recursive merge: tables merge key by key, anything else in `overlay` replaces `base`.
fn merge_tables(base: &mut Table, overlay: Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(Value::Table(existing)), Value::Table(incoming)) => merge_tables(existing, incoming),
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

fn apply_env(config: &mut Config, env: impl Fn(&str) -> Option<String>) -> Result<()> {
    if let Some(url) = env("LEARNPATH_RETRIEVAL_URL") {
        config.gateway.retrieval_url = url;
    }
    if let Some(url) = env("LEARNPATH_PLANNER_URL") {
        config.gateway.planner_url = url;
    }
    if let Some(url) = env("LEARNPATH_QUIZ_URL") {
        config.gateway.quiz_url = url;
    }
    if let Some(url) = env("LEARNPATH_QDRANT_URL") {
        config.retrieval.qdrant.url = url;
    }
    if let Some(database) = env("LEARNPATH_DATABASE") {
        config.store.database = database;
    }
    if let Some(raw) = env("LEARNPATH_ALLOW_ANONYMOUS") {
        config.auth.allow_anonymous = parse_flag(&raw)
            .with_context(|| format!("LEARNPATH_ALLOW_ANONYMOUS must be true or false, got '{raw}'"))?;
    }
    if let Some(secret) = env("LEARNPATH_JWT_SECRET").filter(|s| !s.is_empty()) {
        config.auth.secret = Some(secret);
        config.auth.mode = VerificationMode::Hs256;
    }
    Ok(())
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
