use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};

use crate::collaborators::ChatCompletionsSettings;
use crate::collaborators::chat_completions::{DEFAULT_API_BASE, DEFAULT_MODEL, DEFAULT_TIMEOUT_SECS};

pub const DEFAULT_DATABASE_PATH: &str = "data/chinook.db";
pub const API_KEY_ENV: &str = "ASKDB_API_KEY";
pub const API_BASE_ENV: &str = "ASKDB_API_BASE";
pub const MODEL_ENV: &str = "ASKDB_MODEL";
pub const TIMEOUT_ENV: &str = "ASKDB_TIMEOUT_SECS";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimePaths {
    pub home_dir: PathBuf,
    pub cwd: PathBuf,
    pub database: PathBuf,
    /// `None` when tracing to disk is disabled.
    pub trace_dir: Option<PathBuf>,
}

pub fn resolve_runtime_paths(
    home_dir: &Path,
    cwd: &Path,
    database: &Path,
    trace_dir_override: Option<&Path>,
    tracing_enabled: bool,
) -> Result<RuntimePaths> {
    if !home_dir.is_absolute() {
        bail!("home_dir must be absolute: {}", home_dir.display());
    }
    if !cwd.is_absolute() {
        bail!("cwd must be absolute: {}", cwd.display());
    }

    let home_dir = normalize_lexical(home_dir);
    let cwd = normalize_lexical(cwd);
    let database = resolve_user_path(database, &home_dir, &cwd)?;
    let trace_dir = if tracing_enabled {
        let trace_dir = match trace_dir_override {
            Some(path) => resolve_user_path(path, &home_dir, &cwd)?,
            None => home_dir.join(".askdb").join("traces"),
        };
        Some(normalize_lexical(&trace_dir))
    } else {
        None
    };

    Ok(RuntimePaths {
        home_dir,
        cwd,
        database,
        trace_dir,
    })
}

/// Explicit values taken from the command line; unset fields fall back to the
/// environment, then to defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollaboratorOverrides {
    pub api_base: Option<String>,
    pub model: Option<String>,
    pub timeout_secs: Option<u64>,
}

pub fn resolve_collaborator_settings<F>(
    overrides: &CollaboratorOverrides,
    lookup_env: F,
) -> Result<ChatCompletionsSettings>
where
    F: Fn(&str) -> Option<String>,
{
    let non_empty = |name: &str| lookup_env(name).filter(|value| !value.trim().is_empty());

    let Some(api_key) = non_empty(API_KEY_ENV) else {
        bail!("{API_KEY_ENV} is not set; export an API key for the chat-completions endpoint");
    };
    let api_base = overrides
        .api_base
        .clone()
        .or_else(|| non_empty(API_BASE_ENV))
        .unwrap_or_else(|| DEFAULT_API_BASE.to_string());
    let model = overrides
        .model
        .clone()
        .or_else(|| non_empty(MODEL_ENV))
        .unwrap_or_else(|| DEFAULT_MODEL.to_string());
    let timeout_secs = match overrides.timeout_secs {
        Some(secs) => secs,
        None => match non_empty(TIMEOUT_ENV) {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .with_context(|| format!("{TIMEOUT_ENV} must be a whole number of seconds"))?,
            None => DEFAULT_TIMEOUT_SECS,
        },
    };
    if timeout_secs == 0 {
        bail!("collaborator timeout must be greater than zero");
    }

    Ok(ChatCompletionsSettings {
        api_base,
        api_key: api_key.trim().to_string(),
        model,
        timeout: Duration::from_secs(timeout_secs),
    })
}

fn resolve_user_path(path: &Path, home_dir: &Path, cwd: &Path) -> Result<PathBuf> {
    let expanded = expand_tilde(path, home_dir)?;
    let resolved = if expanded.is_absolute() {
        expanded
    } else {
        cwd.join(expanded)
    };

    Ok(normalize_lexical(&resolved))
}

fn expand_tilde(path: &Path, home_dir: &Path) -> Result<PathBuf> {
    let mut components = path.components();
    match components.next() {
        Some(Component::Normal(first)) if first == "~" => {
            let mut expanded = home_dir.to_path_buf();
            for component in components {
                expanded.push(component.as_os_str());
            }
            Ok(expanded)
        }
        Some(Component::Normal(first))
            if first
                .to_str()
                .is_some_and(|segment| segment.starts_with('~')) =>
        {
            bail!(
                "unsupported home expansion syntax (only `~` and `~/...` are supported): {}",
                path.display()
            )
        }
        _ => Ok(path.to_path_buf()),
    }
}

fn normalize_lexical(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    normalized.push(component.as_os_str());
                }
            }
            _ => normalized.push(component.as_os_str()),
        }
    }

    normalized
}
