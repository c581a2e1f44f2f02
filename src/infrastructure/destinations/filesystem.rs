//! Destination storing objects as files in one directory.

use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tracing::debug;
use url::Url;

use super::file_server::FileServer;
use crate::domain::errors::{DestinationError, validate_object_name};
use crate::domain::ports::Destination;

/// Stored files are read by whatever serves `public_url`, not only by us.
#[cfg(unix)]
const FILE_MODE: u32 = 0o644;

/// Files under a root directory, optionally served over HTTP.
///
/// Configured as `fs:///absolute/path?server=host:port`.
pub struct FsDestination {
    root: PathBuf,
    server_addr: Option<String>,
    server: Mutex<Option<FileServer>>,
}

impl FsDestination {
    /// Opens a root directory without a server.
    ///
    /// # Errors
    /// Returns `DestinationError::Config` if `root` is not a directory.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, DestinationError> {
        let root = root.into();
        let metadata = tokio::fs::metadata(&root).await.map_err(|e| {
            DestinationError::config(format!("opening root {}: {e}", root.display()))
        })?;
        if !metadata.is_dir() {
            return Err(DestinationError::config(format!(
                "{} is not a directory",
                root.display()
            )));
        }
        Ok(Self {
            root,
            server_addr: None,
            server: Mutex::new(None),
        })
    }

    /// Opens the root named by a configuration URL and starts its server if requested.
    ///
    /// # Errors
    /// Returns error if the root is unusable or the server cannot bind.
    pub async fn from_config(config: &Url) -> Result<Self, DestinationError> {
        let path = format!("{}{}", config.host_str().unwrap_or_default(), config.path());
        let mut destination = Self::open(path).await?;

        if let Some(addr) = config
            .query_pairs()
            .find(|(key, _)| key == "server")
            .map(|(_, value)| value.into_owned())
            .filter(|addr| !addr.is_empty())
        {
            let server = FileServer::start(&addr, &destination.root).await?;
            destination.server_addr = Some(server.local_addr().to_string());
            *destination.server.get_mut() = Some(server);
        }

        Ok(destination)
    }

    /// Returns the root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl std::fmt::Display for FsDestination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "filesystem destination at {} server={}",
            self.root.display(),
            self.server_addr.as_deref().unwrap_or("none")
        )
    }
}

#[async_trait]
impl Destination for FsDestination {
    async fn upload(&self, name: &str, content: Bytes) -> Result<(), DestinationError> {
        validate_object_name(name)?;
        let root = self.root.clone();
        let path = root.join(name);

        // Readers never observe a partially written file.
        tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            let mut temp = tempfile::NamedTempFile::new_in(&root)?;
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                temp.as_file()
                    .set_permissions(std::fs::Permissions::from_mode(FILE_MODE))?;
            }
            temp.write_all(&content)?;
            temp.persist(&path).map_err(|e| e.error)?;
            Ok(())
        })
        .await
        .map_err(|e| DestinationError::storage(format!("upload task failed: {e}")))?
        .map_err(|e| DestinationError::storage(format!("writing {name}: {e}")))?;

        debug!(name, "Stored file");
        Ok(())
    }

    async fn download(&self, name: &str) -> Result<Bytes, DestinationError> {
        validate_object_name(name)?;
        match tokio::fs::read(self.root.join(name)).await {
            Ok(content) => Ok(Bytes::from(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(DestinationError::not_found(name)),
            Err(e) => Err(DestinationError::storage(format!("reading {name}: {e}"))),
        }
    }

    async fn close(&self) -> Result<(), DestinationError> {
        let server = self.server.lock().take();
        if let Some(server) = server {
            server.shutdown().await;
        }
        Ok(())
    }
}
