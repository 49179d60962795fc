use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use tokio::fs;
use tracing::{debug, info};

use crate::config::sources::SinkConfig;

/// Writes the current token value to a file, atomically (tmp + rename).
#[derive(Debug, Clone)]
pub struct FileSink {
    path: PathBuf,
}

impl FileSink {
    pub fn new(cfg: &SinkConfig) -> Self {
        Self { path: PathBuf::from(&cfg.path) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn write(&self, value: &str) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, value.as_bytes())
            .await
            .map_err(|e| anyhow!("write '{}': {}", tmp.display(), e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o600)).await?;
        }

        fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| anyhow!("rename to '{}': {}", self.path.display(), e))?;
        debug!(path = %self.path.display(), "token written");
        Ok(())
    }

    /// Remove the token file; a missing file is fine.
    pub async fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path).await {
            Ok(_) => {
                info!("Deleted file: {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("File not found, nothing to delete: {}", self.path.display());
                Ok(())
            }
            Err(e) => Err(anyhow!("delete '{}': {}", self.path.display(), e)),
        }
    }
}
