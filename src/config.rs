use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Maximum rows per storage call, per entity kind.
///
/// The backend rejects oversized bulk writes, and join tables tolerate
/// smaller batches than leaf tables, so each kind is tunable on its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchSizes {
    pub documents: usize,
    pub canonical_content: usize,
    pub symbols: usize,
    pub geometries: usize,
    pub matches: usize,
    pub child_links: usize,
}

impl Default for BatchSizes {
    fn default() -> Self {
        Self {
            documents: 100,
            canonical_content: 300,
            symbols: 300,
            geometries: 100,
            matches: 200,
            child_links: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UploadConfig {
    pub database: Option<String>,
    pub data_dir: Option<String>,
    /// Worker threads for per-document parallelism (0 = one per core)
    pub jobs: Option<usize>,
    #[serde(default)]
    pub batch: BatchSizes,
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("symload.toml")
}

pub fn default_database_path_in(base: &Path) -> PathBuf {
    base.join("symload.db")
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Option<UploadConfig>> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path)?;
    let config: UploadConfig = toml::from_str(&contents)?;
    Ok(Some(config))
}

pub fn write_config(path: &Path, config: &UploadConfig, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("config already exists at {} (use --force to overwrite)", path.display());
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents)?;
    Ok(())
}

pub fn ensure_db_dir(db_path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
