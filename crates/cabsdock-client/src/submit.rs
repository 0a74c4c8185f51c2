//! Job submission to the CABS-dock web form.

use reqwest::header::{COOKIE, SET_COOKIE};
use reqwest::multipart::{Form, Part};
use reqwest::{Response, StatusCode};
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, info, instrument, warn};
use url::Url;

use cabsdock_common::{CabsError, Result, SandboxClient};

use crate::csrf::extract_csrf_token;
use crate::request::{DockingJobRequest, JobHandle, ReceptorId};
use crate::structure::StructureResolver;

pub const CABS_URL: &str = "http://biocomp.chem.uw.edu.pl/CABSdock";

/// Present only on the page served after an accepted submission.
const REDIRECT_MARKER: &str = "redirected automatically to target URL";

/// Optional form fields sent with every submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SubmitOptions {
    pub project_name: String,
    pub email: String,
    /// Secondary structure hint for the ligand, one letter per residue.
    pub ligand_ss: String,
    /// Keep the job off the public queue (`show=y`).
    pub hide_from_queue: bool,
}

impl Default for SubmitOptions {
    fn default() -> Self {
        Self {
            project_name: "Test docking project".to_string(),
            email: String::new(),
            ligand_ss: String::new(),
            hide_from_queue: true,
        }
    }
}

/// Token and cookie from one landing page visit. Never reused.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub csrf_token: String,
    pub cookie: Option<String>,
}

/// Result of submitting one receptor in a batch.
#[derive(Debug)]
pub struct SubmissionOutcome {
    pub receptor: ReceptorId,
    pub result: Result<JobHandle>,
}

pub struct JobSubmitter {
    client: SandboxClient,
    base_url: String,
    options: SubmitOptions,
}

impl JobSubmitter {
    pub fn new(client: SandboxClient, options: SubmitOptions) -> Self {
        Self {
            client,
            base_url: CABS_URL.to_string(),
            options,
        }
    }

    /// Set a custom server URL, e.g. a mirror.
    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.to_string();
        self
    }

    /// Submit one job and return the URL of its status page.
    ///
    /// Not retried: the server may treat a resubmission as a new job.
    #[instrument(skip(self, request), fields(receptor = %request.receptor()))]
    pub async fn submit_job(&self, request: &DockingJobRequest) -> Result<JobHandle> {
        let structure = fs::read(request.structure_file()).await?;
        let file_name = request
            .structure_file()
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| request.receptor().pdb_file_name());

        let session = self.open_session().await?;

        let mut form = Form::new()
            .text("pdb_receptor", request.receptor().to_string())
            .text("ligand_seq", request.ligand_sequence().to_string())
            .text("length", request.cycles().to_string())
            .text("ligand_ss", self.options.ligand_ss.clone())
            .text("name", self.options.project_name.clone())
            .text("email", self.options.email.clone());
        if self.options.hide_from_queue {
            form = form.text("show", "y");
        }
        let form = form
            .text("csrf_token", session.csrf_token)
            .part("receptor_file", Part::bytes(structure).file_name(file_name));

        let mut post = self.client.post_no_redirect(&self.base_url)?.multipart(form);
        if let Some(cookie) = session.cookie {
            post = post.header(COOKIE, cookie);
        }
        let response = check_status(post.send().await?, &self.base_url)?;
        let body = response.text().await?;

        if !body.contains(REDIRECT_MARKER) {
            return Err(CabsError::SubmissionRejected {
                receptor: request.receptor().to_string(),
            });
        }

        let handle = JobHandle::from(redirect_target(&body, &self.base_url)?);
        info!(job = %handle, "Job submitted");
        Ok(handle)
    }

    /// Fetch the landing page for a fresh cookie and CSRF token.
    async fn open_session(&self) -> Result<SessionContext> {
        let response = check_status(self.client.get(&self.base_url)?.send().await?, &self.base_url)?;

        let pairs: Vec<String> = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .filter_map(|v| v.split(';').next())
            .map(str::trim)
            .filter(|pair| !pair.is_empty())
            .map(str::to_string)
            .collect();
        let cookie = (!pairs.is_empty()).then(|| pairs.join("; "));
        if cookie.is_none() {
            debug!("Landing page set no session cookie");
        }

        let html = response.text().await?;
        let csrf_token = extract_csrf_token(&html, &self.base_url)?;
        Ok(SessionContext { csrf_token, cookie })
    }

    /// Resolve and submit each receptor in turn. A failure only affects its
    /// own receptor.
    pub async fn submit_receptors(
        &self,
        receptors: &[ReceptorId],
        resolver: &StructureResolver,
        ligand_sequence: &str,
        cycles: u32,
    ) -> Vec<SubmissionOutcome> {
        let mut outcomes = Vec::with_capacity(receptors.len());
        for receptor in receptors {
            let result = self
                .submit_receptor(receptor, resolver, ligand_sequence, cycles)
                .await;
            if let Err(e) = &result {
                warn!("Submission for {} failed: {}", receptor, e);
            }
            outcomes.push(SubmissionOutcome {
                receptor: receptor.clone(),
                result,
            });
        }
        outcomes
    }

    async fn submit_receptor(
        &self,
        receptor: &ReceptorId,
        resolver: &StructureResolver,
        ligand_sequence: &str,
        cycles: u32,
    ) -> Result<JobHandle> {
        let structure_file = resolver.resolve(receptor).await?;
        let request = DockingJobRequest::new(receptor.clone(), structure_file, ligand_sequence, cycles)?;
        self.submit_job(&request).await
    }
}

/// Client and server errors fail; redirects are expected since they are
/// never followed on submission.
fn check_status(response: Response, url: &str) -> Result<Response> {
    let status: StatusCode = response.status();
    if status.is_client_error() || status.is_server_error() {
        return Err(CabsError::Transport {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }
    Ok(response)
}

/// The anchor target on the redirect hint page, resolved against `base_url`.
fn redirect_target(body: &str, base_url: &str) -> Result<Url> {
    let missing = || CabsError::Extraction {
        what: "job link",
        url: base_url.to_string(),
    };
    let selector = Selector::parse("a[href]").map_err(|_| missing())?;
    let document = Html::parse_document(body);
    let href = document
        .select(&selector)
        .filter_map(|a| a.value().attr("href"))
        .map(str::trim)
        .find(|href| !href.is_empty())
        .ok_or_else(missing)?;

    Ok(Url::parse(base_url)?.join(href)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HINT: &str = r#"<!DOCTYPE HTML PUBLIC "-//W3C//DTD HTML 3.2 Final//EN">
<title>Redirecting...</title>
<h1>Redirecting...</h1>
<p>You should be redirected automatically to target URL: <a href="/CABSdock/job/46af2d4a0b1c/">/CABSdock/job/46af2d4a0b1c/</a>.  If not click the link."#;

    #[test]
    fn test_relative_link_is_resolved_against_server() {
        let url = redirect_target(HINT, "http://biocomp.chem.uw.edu.pl/CABSdock").unwrap();
        assert_eq!(url.as_str(), "http://biocomp.chem.uw.edu.pl/CABSdock/job/46af2d4a0b1c/");
    }

    #[test]
    fn test_absolute_link_is_kept() {
        let body = r#"redirected automatically to target URL: <a href="http://mirror/job/x1/">x</a>"#;
        let url = redirect_target(body, CABS_URL).unwrap();
        assert_eq!(url.as_str(), "http://mirror/job/x1/");
    }

    #[test]
    fn test_missing_link_is_extraction_error() {
        let err = redirect_target("redirected automatically to target URL", CABS_URL).unwrap_err();
        assert!(matches!(err, CabsError::Extraction { what: "job link", .. }));
    }

    #[test]
    fn test_default_options_hide_job() {
        let options = SubmitOptions::default();
        assert!(options.hide_from_queue);
        assert_eq!(options.project_name, "Test docking project");
        assert!(options.email.is_empty());
    }
}
