//! Newline-separated input lists: receptor identifiers or job URLs.

use std::path::Path;

use cabsdock_common::Result;
use tokio::fs;

use crate::poller::PendingJobSet;
use crate::request::{JobHandle, ReceptorId};

/// Non-blank, trimmed lines.
pub fn list_entries(content: &str) -> impl Iterator<Item = &str> {
    content.lines().map(str::trim).filter(|line| !line.is_empty())
}

pub fn parse_receptors(content: &str) -> Result<Vec<ReceptorId>> {
    list_entries(content).map(str::parse).collect()
}

pub fn parse_job_urls(content: &str) -> Result<PendingJobSet> {
    list_entries(content).map(JobHandle::new).collect()
}

pub async fn read_receptors(path: &Path) -> Result<Vec<ReceptorId>> {
    parse_receptors(&fs::read_to_string(path).await?)
}

pub async fn read_job_urls(path: &Path) -> Result<PendingJobSet> {
    parse_job_urls(&fs::read_to_string(path).await?)
}
