use reqwest::redirect::Policy;
use reqwest::{Client, ClientBuilder};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::error::{CabsError, Result};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_REDIRECTS: usize = 10;

/// An HTTP client that only talks to approved hosts.
///
/// Two inner clients are kept: one follows redirects (downloads, status pages),
/// the other never does, which the form submission relies on to read the
/// redirect hint page instead of the target.
#[derive(Debug, Clone)]
pub struct SandboxClient {
    client: Client,
    no_redirect: Client,
    allowlist: Arc<HashSet<String>>,
}

impl SandboxClient {
    /// Creates a client allowing the CABS-dock server, RCSB and loopback.
    pub fn new() -> Result<Self> {
        Self::with_domains(DEFAULT_TIMEOUT, std::iter::empty::<&str>())
    }

    /// Creates a client with a custom timeout and extra allowed hosts.
    pub fn with_domains<I, S>(timeout: Duration, extra: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut allowlist = HashSet::new();
        let domains = [
            "biocomp.chem.uw.edu.pl", // CABS-dock
            "rcsb.org",               // PDB downloads (www., files.)
            "localhost",
            "127.0.0.1",
        ];
        for d in domains {
            allowlist.insert(d.to_string());
        }
        for d in extra {
            allowlist.insert(d.as_ref().to_ascii_lowercase());
        }
        let allowlist = Arc::new(allowlist);

        let redirect_allowlist = Arc::clone(&allowlist);
        let client = ClientBuilder::new()
            .timeout(timeout)
            .redirect(Policy::custom(move |attempt| {
                if attempt.previous().len() >= MAX_REDIRECTS {
                    attempt.error("too many redirects")
                } else if host_allowed(&redirect_allowlist, attempt.url()) {
                    attempt.follow()
                } else {
                    attempt.stop()
                }
            }))
            .build()
            .map_err(|e| CabsError::Config(format!("Failed to build HTTP client: {}", e)))?;

        let no_redirect = ClientBuilder::new()
            .timeout(timeout)
            .redirect(Policy::none())
            .build()
            .map_err(|e| CabsError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, no_redirect, allowlist })
    }

    /// Validates if a URL is permitted under the current sandbox policy.
    pub fn is_allowed(&self, url: &str) -> bool {
        Url::parse(url)
            .map(|parsed| host_allowed(&self.allowlist, &parsed))
            .unwrap_or(false)
    }

    fn check(&self, url: &str) -> Result<()> {
        if self.is_allowed(url) {
            Ok(())
        } else {
            Err(CabsError::Security(format!(
                "Network capabilities capped: domain not in allowlist for URL {}",
                url
            )))
        }
    }

    /// GET request that follows redirects within the allowlist.
    pub fn get(&self, url: &str) -> Result<reqwest::RequestBuilder> {
        self.check(url)?;
        Ok(self.client.get(url))
    }

    /// POST request that never follows redirects.
    pub fn post_no_redirect(&self, url: &str) -> Result<reqwest::RequestBuilder> {
        self.check(url)?;
        Ok(self.no_redirect.post(url))
    }
}

fn host_allowed(allowlist: &HashSet<String>, url: &Url) -> bool {
    let Some(host) = url.host_str() else {
        return false;
    };
    allowlist
        .iter()
        .any(|allowed| host == allowed || host.ends_with(&format!(".{}", allowed)))
}
