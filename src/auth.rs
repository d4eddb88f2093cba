use anyhow::{bail, Context, Result};
use serde::Deserialize;

/// Resolved service credential: which project to call and the key that
/// authorizes the call. Built once at startup and handed to the client
/// by value, so a request can never be attempted without one.
#[derive(Clone, Deserialize)]
pub struct ServiceCredential {
    pub project_id: String,
    pub api_key: String,
}

impl std::fmt::Debug for ServiceCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceCredential")
            .field("project_id", &self.project_id)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

impl ServiceCredential {
    /// Parse the service key payload. Extra fields in the payload are
    /// ignored; the two we use must be present and non-empty.
    pub fn from_json(raw: &str) -> Result<Self> {
        let credential: ServiceCredential =
            serde_json::from_str(raw).context("service key is not valid JSON")?;
        credential.validate()?;
        Ok(credential)
    }

    fn validate(&self) -> Result<()> {
        if self.project_id.is_empty() {
            bail!("service key has an empty project_id");
        }
        if self.api_key.is_empty() {
            bail!("service key has an empty api_key");
        }
        Ok(())
    }
}
