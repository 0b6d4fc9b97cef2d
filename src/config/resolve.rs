use std::env;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::{ConfigError, Result, Settings};

pub const CONFIG_DIR: &str = ".sysgraph";
pub const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Directory relative snapshot paths resolve against.
    pub root: PathBuf,
    pub config_path: Option<PathBuf>,
}

/// Finds the config file: explicit path, then `SYSGRAPH_CONFIG`, then the
/// nearest `.sysgraph/config.toml` above `start`. Running without any config
/// file is allowed and resolves to `start` with defaults.
pub fn resolve_config_with_overrides(
    start: impl AsRef<Path>,
    config_path: Option<PathBuf>,
) -> Result<ResolvedConfig> {
    if let Some(config) = config_path {
        return resolve_with_config(config);
    }

    if let Ok(path) = env::var("SYSGRAPH_CONFIG") {
        return resolve_with_config(PathBuf::from(path));
    }

    Ok(find_config_from(start.as_ref()).unwrap_or_else(|| ResolvedConfig {
        root: start.as_ref().to_path_buf(),
        config_path: None,
    }))
}

pub fn load_settings(resolved: &ResolvedConfig) -> Result<Settings> {
    let Some(path) = resolved.config_path.as_deref() else {
        return Ok(Settings::default());
    };
    if !path.is_file() {
        return Err(ConfigError::ConfigNotFound(path.to_path_buf()));
    }

    let contents = std::fs::read_to_string(path)?;
    let settings = toml::from_str(&contents).map_err(|source| ConfigError::Toml {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), "loaded config");
    Ok(settings)
}

pub fn apply_env_overrides(settings: &mut Settings) {
    if let Ok(format) = env::var("SYSGRAPH_FORMAT") {
        settings.output.format = format;
    }
}

/// Snapshot location: explicit path, then `SYSGRAPH_SNAPSHOT`, then the
/// config `snapshot` key resolved against the config root.
pub fn resolve_snapshot_path(
    explicit: Option<PathBuf>,
    settings: &Settings,
    resolved: &ResolvedConfig,
) -> Option<PathBuf> {
    if explicit.is_some() {
        return explicit;
    }
    if let Ok(path) = env::var("SYSGRAPH_SNAPSHOT") {
        return Some(PathBuf::from(path));
    }
    settings.snapshot.as_ref().map(|path| {
        if path.is_absolute() {
            path.clone()
        } else {
            resolved.root.join(path)
        }
    })
}

fn resolve_with_config(config_path: PathBuf) -> Result<ResolvedConfig> {
    if !config_path.is_file() {
        return Err(ConfigError::ConfigNotFound(config_path));
    }
    let root = infer_root_from_config(&config_path).unwrap_or_else(|| PathBuf::from("."));
    Ok(ResolvedConfig {
        root,
        config_path: Some(config_path),
    })
}

fn infer_root_from_config(config_path: &Path) -> Option<PathBuf> {
    let parent = config_path.parent()?;
    if parent.file_name()? == CONFIG_DIR {
        return parent.parent().map(|p| p.to_path_buf());
    }
    Some(parent.to_path_buf())
}

fn find_config_from(start: &Path) -> Option<ResolvedConfig> {
    start.ancestors().find_map(|ancestor| {
        let config_path = ancestor.join(CONFIG_DIR).join(CONFIG_FILE);
        config_path.is_file().then(|| ResolvedConfig {
            root: ancestor.to_path_buf(),
            config_path: Some(config_path),
        })
    })
}
