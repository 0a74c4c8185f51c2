//! Configuration loading for cabsdock.
//! Reads cabsdock.toml from the current directory or the path in CABSDOCK_CONFIG.

use cabsdock_client::{PollSettings, SubmitOptions};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub submission: SubmissionConfig,
    #[serde(default)]
    pub polling: PollSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_pdb_download_url")]
    pub pdb_download_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub extra_allowed_domains: Vec<String>,
}

fn default_base_url()         -> String { cabsdock_client::submit::CABS_URL.to_string() }
fn default_pdb_download_url() -> String { cabsdock_client::structure::PDB_DOWNLOAD_URL.to_string() }
fn default_timeout_secs()     -> u64    { 30 }

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            pdb_download_url: default_pdb_download_url(),
            timeout_secs: default_timeout_secs(),
            extra_allowed_domains: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionConfig {
    #[serde(default = "default_cycles")]
    pub default_cycles: u32,
    #[serde(flatten)]
    pub form: SubmitOptions,
}

fn default_cycles() -> u32 { 50 }

impl Default for SubmissionConfig {
    fn default() -> Self {
        Self {
            default_cycles: default_cycles(),
            form: SubmitOptions::default(),
        }
    }
}


impl Config {
    /// Load configuration from `explicit`, CABSDOCK_CONFIG, or ./cabsdock.toml.
    /// Only the implicit default file may be absent.
    pub fn load(explicit: Option<&Path>) -> anyhow::Result<Self> {
        let requested = explicit
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os("CABSDOCK_CONFIG").map(PathBuf::from));

        let path = match requested {
            Some(path) => {
                if !path.exists() {
                    anyhow::bail!("Config file not found: {}", path.display());
                }
                path
            }
            None => {
                let path = PathBuf::from("cabsdock.toml");
                if !path.exists() {
                    return Ok(Self::default());
                }
                path
            }
        };

        let content = std::fs::read_to_string(&path)?;
        Self::from_toml(&content)
            .map_err(|e| anyhow::anyhow!("Invalid config {}: {}", path.display(), e))
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        if config.submission.default_cycles == 0 {
            anyhow::bail!("submission.default_cycles must be positive");
        }
        Ok(config)
    }
}
