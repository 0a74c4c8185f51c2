//! Receptor structure file resolution.

use std::path::{Path, PathBuf};

use cabsdock_common::{CabsError, Result};
use tracing::{debug, info};
use url::Url;

use crate::download::Downloader;
use crate::request::ReceptorId;

pub const PDB_DOWNLOAD_URL: &str = "http://www.rcsb.org/pdb/download/downloadFile.do";

/// Finds `<code>.pdb` in a cache directory, downloading it from RCSB when
/// missing. Offline resolvers never download.
pub struct StructureResolver {
    downloader: Option<Downloader>,
    download_url: String,
    cache_dir: PathBuf,
}

impl StructureResolver {
    pub fn new<P: AsRef<Path>>(downloader: Downloader, cache_dir: P) -> Self {
        Self {
            downloader: Some(downloader),
            download_url: PDB_DOWNLOAD_URL.to_string(),
            cache_dir: cache_dir.as_ref().to_path_buf(),
        }
    }

    pub fn offline<P: AsRef<Path>>(cache_dir: P) -> Self {
        Self {
            downloader: None,
            download_url: PDB_DOWNLOAD_URL.to_string(),
            cache_dir: cache_dir.as_ref().to_path_buf(),
        }
    }

    /// Point at a different structure-file endpoint.
    pub fn with_download_url(mut self, url: &str) -> Self {
        self.download_url = url.to_string();
        self
    }

    /// Local path of the structure for `receptor`, fetched at most once.
    pub async fn resolve(&self, receptor: &ReceptorId) -> Result<PathBuf> {
        let file_path = self.cache_dir.join(receptor.pdb_file_name());

        if file_path.exists() {
            debug!("PDB {} found in cache", receptor.code());
            return Ok(file_path);
        }

        let Some(downloader) = &self.downloader else {
            return Err(CabsError::InvalidRequest(format!(
                "structure file {} for receptor {} does not exist",
                file_path.display(),
                receptor
            )));
        };

        info!("Fetching PDB {} from {}", receptor.code(), self.download_url);
        let url = self.structure_url(receptor.code())?;
        downloader.download_to(url.as_str(), &file_path).await?;

        Ok(file_path)
    }

    fn structure_url(&self, code: &str) -> Result<Url> {
        let mut url = Url::parse(&self.download_url)?;
        url.query_pairs_mut()
            .append_pair("fileFormat", "pdb")
            .append_pair("compression", "NO")
            .append_pair("structureId", code);
        Ok(url)
    }
}
