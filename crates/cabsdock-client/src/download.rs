//! Streaming file downloads.

use std::path::{Path, PathBuf};

use cabsdock_common::{CabsError, Result, SandboxClient};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument, warn};
use url::Url;

/// Writes HTTP response bodies to disk chunk by chunk.
#[derive(Debug, Clone)]
pub struct Downloader {
    client: SandboxClient,
}

impl Downloader {
    pub fn new(client: SandboxClient) -> Self {
        Self { client }
    }

    /// Download `url` into `dir`, naming the file after the last path segment.
    pub async fn download_into(&self, url: &str, dir: &Path) -> Result<PathBuf> {
        let dest = dir.join(file_name_from_url(url)?);
        self.download_to(url, &dest).await?;
        Ok(dest)
    }

    /// Download `url` to `dest` and return the number of bytes written.
    ///
    /// A failed download leaves no file behind; there is no resume.
    #[instrument(skip(self))]
    pub async fn download_to(&self, url: &str, dest: &Path) -> Result<u64> {
        let mut response = self.client.get(url)?.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(CabsError::Transport {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        let mut file = fs::File::create(dest).await?;
        let written = async {
            let mut written = 0u64;
            while let Some(chunk) = response.chunk().await? {
                file.write_all(&chunk).await?;
                written += chunk.len() as u64;
            }
            file.flush().await?;
            Ok::<u64, CabsError>(written)
        }
        .await;
        drop(file);

        match written {
            Ok(bytes) => {
                debug!(bytes, "Wrote {:?}", dest);
                Ok(bytes)
            }
            Err(e) => {
                warn!("Download of {} failed: {}", url, e);
                if let Err(rm) = fs::remove_file(dest).await {
                    debug!("Could not remove partial file {:?}: {}", dest, rm);
                }
                Err(e)
            }
        }
    }
}

/// The final non-empty path segment of `url`.
pub fn file_name_from_url(url: &str) -> Result<String> {
    let parsed = Url::parse(url)?;
    parsed
        .path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .map(str::to_string)
        .ok_or_else(|| CabsError::InvalidRequest(format!("URL {} has no file name", url)))
}
