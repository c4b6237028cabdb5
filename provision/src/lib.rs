//! Binary provisioning for the validator and the analysis server.
//!
//! [`Provisioner::ensure_binary`] makes sure the platform-specific executable
//! for a [`Tool`] exists under the install root. A missing binary is fetched
//! as a release archive, spooled chunk by chunk into an unnamed temp file,
//! and the one matching entry is copied out; the archive itself is never held
//! in memory.
//!
//! Provisioning is not safe to run concurrently for the same tool. Callers
//! run it to completion before serving any validation.

mod extract;
mod platform;
mod tool;

use std::collections::HashMap;
use std::io::{self, Seek};
use std::path::{Path, PathBuf};
use std::time::Duration;

use futures_util::TryStreamExt;
use reqwest::redirect::Policy;
use tokio::io::AsyncWriteExt;

pub use extract::extract_entry;
pub use platform::{Arch, OsFamily, PlatformKey};
pub use tool::{ANALYZER, BinaryLocation, NamingScheme, Tool, ToolDescriptor, VALIDATOR};

const CONNECT_TIMEOUT_SECS: u64 = 30;

const MAX_REDIRECTS: usize = 10;

#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    #[error("unsupported platform: os '{os}', arch '{arch}'")]
    UnsupportedPlatform { os: String, arch: String },
    #[error("download of {url} failed: {reason}")]
    DownloadFailed { url: String, reason: String },
    #[error("no entry ending in '{entry}' in archive {url}")]
    ArtifactNotFound { url: String, entry: String },
    #[error("reading release archive: {0}")]
    Archive(#[from] zip::result::ZipError),
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("building HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

/// Per-tool provisioning results from [`Provisioner::ensure_all`].
///
/// A failure for one tool does not prevent the other from being usable.
#[derive(Debug)]
pub struct Provisioned {
    pub validator: Result<BinaryLocation, ProvisionError>,
    pub analyzer: Result<BinaryLocation, ProvisionError>,
}

pub struct Provisioner {
    root: PathBuf,
    platform: PlatformKey,
    client: reqwest::Client,
    /// Per-tool URL templates replacing [`ToolDescriptor::archive_url_template`].
    url_overrides: HashMap<Tool, String>,
}

impl Provisioner {
    /// Provisioner for the running host, installing under `root`.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, ProvisionError> {
        Self::with_platform(root, PlatformKey::host()?)
    }

    pub fn with_platform(
        root: impl Into<PathBuf>,
        platform: PlatformKey,
    ) -> Result<Self, ProvisionError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .redirect(Policy::limited(MAX_REDIRECTS))
            .user_agent(concat!("glint/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(ProvisionError::Client)?;
        Ok(Self {
            root: root.into(),
            platform,
            client,
            url_overrides: HashMap::new(),
        })
    }

    /// Override the release URL template (`{os}`/`{arch}` placeholders) for `tool`.
    pub fn with_archive_url(mut self, tool: Tool, template: impl Into<String>) -> Self {
        self.url_overrides.insert(tool, template.into());
        self
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn platform(&self) -> PlatformKey {
        self.platform
    }

    #[must_use]
    pub fn location(&self, tool: Tool) -> BinaryLocation {
        BinaryLocation::resolve(&self.root, tool, self.platform)
    }

    #[must_use]
    pub fn archive_url(&self, tool: Tool) -> String {
        let descriptor = tool.descriptor();
        match self.url_overrides.get(&tool) {
            Some(template) => descriptor.expand_url(template, self.platform),
            None => descriptor.archive_url(self.platform),
        }
    }

    /// Ensure `tool`'s binary exists, downloading it if needed.
    ///
    /// A binary already on disk returns immediately without network access.
    pub async fn ensure_binary(&self, tool: Tool) -> Result<BinaryLocation, ProvisionError> {
        let location = self.location(tool);
        let dest = location.absolute();

        if tokio::fs::try_exists(dest).await.unwrap_or(false) {
            tracing::debug!(tool = %tool, path = %dest.display(), "Binary already present");
            return Ok(location);
        }

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| ProvisionError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        let url = self.archive_url(tool);
        let entry = tool.descriptor().entry_suffix(self.platform);
        tracing::info!(tool = %tool, %url, "Downloading release archive");

        let found = self.download_entry(&url, &entry, dest).await?;
        if !found {
            tracing::warn!(tool = %tool, %url, %entry, "Release archive has no matching entry");
            return Err(ProvisionError::ArtifactNotFound { url, entry });
        }

        tracing::info!(tool = %tool, path = %dest.display(), "Installed binary");
        Ok(location)
    }

    /// Provision every known tool, one after the other.
    pub async fn ensure_all(&self) -> Provisioned {
        let validator = self.ensure_binary(Tool::Validator).await;
        let analyzer = self.ensure_binary(Tool::Analyzer).await;
        for (tool, result) in [(Tool::Validator, &validator), (Tool::Analyzer, &analyzer)] {
            if let Err(e) = result {
                tracing::error!(tool = %tool, "Provisioning failed: {e}");
            }
        }
        Provisioned {
            validator,
            analyzer,
        }
    }

    async fn download_entry(
        &self,
        url: &str,
        entry: &str,
        dest: &Path,
    ) -> Result<bool, ProvisionError> {
        let download_failed = |reason: String| ProvisionError::DownloadFailed {
            url: url.to_string(),
            reason,
        };
        let spool_dir = match dest.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let spool_error = |source: io::Error| ProvisionError::Io {
            path: spool_dir.clone(),
            source,
        };

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| download_failed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(download_failed(format!("HTTP {status}")));
        }

        // Unnamed, so nothing is left behind on any exit path.
        let spool = tempfile::tempfile_in(&spool_dir).map_err(spool_error)?;
        let mut spool = tokio::fs::File::from_std(spool);
        let mut body = Box::pin(response.bytes_stream());
        let mut received = 0u64;
        while let Some(chunk) = body
            .try_next()
            .await
            .map_err(|e| download_failed(format!("reading body: {e}")))?
        {
            received += chunk.len() as u64;
            spool.write_all(&chunk).await.map_err(spool_error)?;
        }
        if received == 0 {
            return Err(download_failed("empty response body".to_string()));
        }
        spool.flush().await.map_err(spool_error)?;
        let mut spool = spool.into_std().await;
        spool.rewind().map_err(spool_error)?;
        tracing::debug!(%url, bytes = received, "Release archive downloaded");

        let entry = entry.to_string();
        let dest_buf = dest.to_path_buf();
        tokio::task::spawn_blocking(move || extract_entry(spool, &entry, &dest_buf))
            .await
            .map_err(|e| ProvisionError::Io {
                path: dest.to_path_buf(),
                source: io::Error::other(e),
            })?
    }
}
