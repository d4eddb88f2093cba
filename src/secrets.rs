use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

/// On-disk secrets: the raw service key payload and the Vertex AI Search
/// datastore the answers are grounded in. Looked up as `secrets.json` in
/// the working directory first, then under the user config directory.
#[derive(Debug, Clone, Deserialize)]
pub struct Secrets {
    pub service_key: String,
    pub datastore: String,
}

impl Secrets {
    pub fn load() -> Result<Self> {
        let path = Self::resolve_path()?;
        Self::from_path(&path)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("could not read secrets file at {}", path.display()))?;
        let secrets: Secrets = serde_json::from_str(&content)
            .with_context(|| format!("could not parse secrets file at {}", path.display()))?;
        Ok(secrets)
    }

    fn resolve_path() -> Result<PathBuf> {
        let local = PathBuf::from("secrets.json");
        if local.exists() {
            return Ok(local);
        }

        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("could not determine config directory"))?;
        Ok(config_dir.join("ask-gemini").join("secrets.json"))
    }
}
