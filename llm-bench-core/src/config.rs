//! Configuration system for llm-bench.
//!
//! Uses `figment` for layered configuration: defaults -> `llm-bench.toml` ->
//! `.env` -> process environment. The CLI applies its own flags on top.
//! The result is a plain [`BenchConfig`] value that is built once at startup
//! and handed to every component, so nothing below the CLI reads the
//! process environment on its own.

use figment::{
    Figment,
    providers::{Format, Serialized, Toml},
};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::BenchError;

/// Default LocalScore release.
pub const DEFAULT_LOCALSCORE_VERSION: &str = "0.9.3";

/// Release URL template; `{version}` is substituted.
pub const DEFAULT_LOCALSCORE_URL: &str = "https://blob.localscore.ai/localscore-{version}";

/// Repository used when `--download-model` is given without one.
pub const DEFAULT_HF_REPO_ID: &str = "TheBloke/Llama-2-7B-Chat-GGUF";

pub const DEFAULT_HF_ENDPOINT: &str = "https://huggingface.co";

/// Name of the optional workspace config file.
pub const CONFIG_FILE_NAME: &str = "llm-bench.toml";

/// Environment variables recognized by the loader.
pub const ENV_KEYS: &[&str] = &[
    "LOCALSCORE_VERSION",
    "LOCALSCORE_URL",
    "HF_HUB_DISABLE_TELEMETRY",
    "HF_REPO_ID",
    "HF_ENDPOINT",
    "HF_TOKEN",
    "MODEL_DIR",
];

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchConfig {
    /// LocalScore release to download.
    pub localscore_version: String,
    /// Release URL template.
    pub localscore_url: String,
    /// Disables telemetry in the hub client.
    #[serde(deserialize_with = "deserialize_bool_like")]
    pub hf_hub_disable_telemetry: bool,
    /// Default repository for model downloads.
    pub hf_repo_id: String,
    pub hf_endpoint: String,
    /// Access token for gated or private repositories.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hf_token: Option<String>,
    /// Local model storage root.
    pub model_dir: PathBuf,
    /// Preferred quantization marker, matched case-insensitively.
    pub quant_marker: String,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            localscore_version: DEFAULT_LOCALSCORE_VERSION.into(),
            localscore_url: DEFAULT_LOCALSCORE_URL.into(),
            hf_hub_disable_telemetry: true,
            hf_repo_id: DEFAULT_HF_REPO_ID.into(),
            hf_endpoint: DEFAULT_HF_ENDPOINT.into(),
            hf_token: None,
            model_dir: PathBuf::from("models"),
            quant_marker: "q4".into(),
        }
    }
}

impl BenchConfig {
    /// Token to send to the hub, ignoring empty values.
    pub fn token(&self) -> Option<&str> {
        self.hf_token.as_deref().filter(|t| !t.trim().is_empty())
    }
}

/// Load configuration for `workspace` from the process environment.
///
/// Priority (highest to lowest):
/// 1. Process environment variables ([`ENV_KEYS`])
/// 2. `<workspace>/.env`
/// 3. `<workspace>/llm-bench.toml`
/// 4. Built-in defaults
pub fn load_config(workspace: &Path) -> Result<BenchConfig, BenchError> {
    load_config_from(workspace, std::env::vars())
}

/// Same as [`load_config`] with an explicit environment.
pub fn load_config_from<I>(workspace: &Path, env: I) -> Result<BenchConfig, BenchError>
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut figment = Figment::from(Serialized::defaults(BenchConfig::default()));

    let toml_path = workspace.join(CONFIG_FILE_NAME);
    if toml_path.exists() {
        figment = figment.merge(Toml::file(&toml_path));
    }

    let env_file = workspace.join(".env");
    if env_file.exists() {
        let vars = read_env_file(&env_file)?;
        figment = figment.merge(Serialized::defaults(recognized(vars)));
    }

    figment = figment.merge(Serialized::defaults(recognized(env)));

    let mut config: BenchConfig = figment
        .extract()
        .map_err(|e| BenchError::Config(e.to_string()))?;

    config.model_dir = absolutize(&expand_tilde(&config.model_dir), workspace);
    Ok(config)
}

/// Parse a `.env` file without touching the process environment.
fn read_env_file(path: &Path) -> Result<Vec<(String, String)>, BenchError> {
    let iter = dotenvy::from_path_iter(path)
        .map_err(|e| BenchError::Config(format!("{}: {e}", path.display())))?;
    iter.map(|item| item.map_err(|e| BenchError::Config(format!("{}: {e}", path.display()))))
        .collect()
}

/// Keep recognized keys, lower-cased to match the struct fields.
fn recognized<I>(vars: I) -> BTreeMap<String, String>
where
    I: IntoIterator<Item = (String, String)>,
{
    vars.into_iter()
        .filter(|(k, _)| ENV_KEYS.contains(&k.as_str()))
        .map(|(k, v)| (k.to_ascii_lowercase(), v))
        .collect()
}

/// Interpret a boolean-like string (`1`, `true`, `yes`, `on`).
pub fn parse_bool_like(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on" | "y"
    )
}

fn deserialize_bool_like<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Bool(bool),
        Int(i64),
        Str(String),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Bool(b) => b,
        Raw::Int(i) => i != 0,
        Raw::Str(s) => parse_bool_like(&s),
    })
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match directories::BaseDirs::new() {
        Some(dirs) => dirs.home_dir().join(rest),
        None => path.to_path_buf(),
    }
}

/// Join a relative path onto `base`.
pub fn absolutize(path: &Path, base: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
