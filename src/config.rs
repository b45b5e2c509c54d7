#![forbid(unsafe_code)]

//! Runtime configuration for the gallery tools.
//!
//! Values resolve with the usual precedence: programmatic override, process
//! environment, `.env` file, built-in default. Both binaries share this so a
//! deployment can pin everything in one `.env` next to the artifacts.

use anyhow::{Context, Result};
use std::{
    collections::HashMap,
    env, fs,
    path::{Path, PathBuf},
};

pub const DEFAULT_ENV_PATH: &str = ".env";
pub const DEFAULT_DATA_ROOT: &str = ".";
pub const DEFAULT_TOKEN_FILE: &str = "token.json";
pub const DEFAULT_API_BASE: &str = "https://www.googleapis.com/youtube/v3";

/// Resolved locations every run needs: where artifacts live, where the OAuth
/// token file sits, and which API base URL to talk to.
#[derive(Debug, Clone)]
pub struct RuntimePaths {
    pub data_root: PathBuf,
    pub token_file: PathBuf,
    pub api_base: String,
}

pub fn load_runtime_paths() -> Result<RuntimePaths> {
    resolve_runtime_paths(RuntimeOverrides::default())
}

#[derive(Debug, Clone, Default)]
pub struct RuntimeOverrides {
    pub data_root: Option<PathBuf>,
    pub token_file: Option<PathBuf>,
    pub api_base: Option<String>,
    pub env_path: Option<PathBuf>,
}

pub fn resolve_runtime_paths(overrides: RuntimeOverrides) -> Result<RuntimePaths> {
    let env_path = overrides
        .env_path
        .as_deref()
        .unwrap_or_else(|| Path::new(DEFAULT_ENV_PATH));
    let file_vars = read_env_file(env_path)?;
    Ok(build_runtime_paths(&file_vars, env_var_string, overrides))
}

fn build_runtime_paths(
    file_vars: &HashMap<String, String>,
    env_lookup: impl Fn(&str) -> Option<String>,
    overrides: RuntimeOverrides,
) -> RuntimePaths {
    let data_root = overrides
        .data_root
        .map(|path| path.to_string_lossy().into_owned())
        .or_else(|| lookup_value("GALLERY_DATA_ROOT", file_vars, &env_lookup))
        .unwrap_or_else(|| DEFAULT_DATA_ROOT.to_string());
    let data_root = PathBuf::from(data_root);

    // Unless pinned explicitly, the token file lives next to the artifacts.
    let token_file = overrides
        .token_file
        .map(|path| path.to_string_lossy().into_owned())
        .or_else(|| lookup_value("GALLERY_TOKEN_FILE", file_vars, &env_lookup))
        .map(PathBuf::from)
        .unwrap_or_else(|| data_root.join(DEFAULT_TOKEN_FILE));

    let api_base = overrides
        .api_base
        .and_then(non_empty)
        .or_else(|| lookup_value("GALLERY_API_BASE", file_vars, &env_lookup))
        .and_then(non_empty)
        .unwrap_or_else(|| DEFAULT_API_BASE.to_string());

    RuntimePaths {
        data_root,
        token_file,
        api_base,
    }
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn env_var_string(key: &str) -> Option<String> {
    env::var(key).ok().and_then(non_empty)
}

fn lookup_value(
    key: &str,
    file_vars: &HashMap<String, String>,
    env_lookup: &impl Fn(&str) -> Option<String>,
) -> Option<String> {
    env_lookup(key).or_else(|| file_vars.get(key).cloned())
}

/// Parses a shell-style env file: `KEY=value` lines, optional `export `
/// prefix, single or double quotes, `#` comments. A missing file yields an
/// empty map.
pub fn read_env_file(path: &Path) -> Result<HashMap<String, String>> {
    let mut vars = HashMap::new();
    if !path.exists() {
        return Ok(vars);
    }
    let content =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let line = trimmed.strip_prefix("export ").unwrap_or(trimmed);
        let Some((key, value_raw)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        let value = value_raw.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|value| value.strip_suffix('"'))
            .or_else(|| {
                value
                    .strip_prefix('\'')
                    .and_then(|value| value.strip_suffix('\''))
            })
            .unwrap_or(value);
        vars.insert(key.to_string(), value.to_string());
    }
    Ok(vars)
}
