//! Status page parsing.

use std::sync::OnceLock;

use cabsdock_common::{CabsError, Result};
use regex::Regex;

/// Job status as read from one status page fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Running,
    Error,
    Done,
    /// A `Status:` marker whose value matches none of the known states.
    Unknown(String),
}

impl JobStatus {
    /// Substring classification; `running` wins over `error`, which wins over `done`.
    /// An unknown value is cut at the first tag so only the status text remains.
    pub fn classify(value: &str) -> Self {
        if value.contains("running") {
            JobStatus::Running
        } else if value.contains("error") {
            JobStatus::Error
        } else if value.contains("done") {
            JobStatus::Done
        } else {
            let text = value.split('<').next().unwrap_or_default();
            JobStatus::Unknown(text.trim().to_string())
        }
    }
}

fn status_marker() -> &'static Regex {
    static MARKER: OnceLock<Regex> = OnceLock::new();
    MARKER.get_or_init(|| Regex::new(r"Status:(.*)").unwrap())
}

/// Text following the first `Status:` marker, up to the end of its line.
pub fn status_value<'a>(page: &'a str, url: &str) -> Result<&'a str> {
    status_marker()
        .captures(page)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .ok_or_else(|| CabsError::ParsePolicy { url: url.to_string() })
}

pub fn parse_status(page: &str, url: &str) -> Result<JobStatus> {
    status_value(page, url).map(JobStatus::classify)
}
