//! In-process stand-ins for the CABS-dock and RCSB servers.
#![allow(dead_code)]

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::{Body, Bytes};
use axum::Router;
use cabsdock_client::{SandboxClient, Sleeper};

/// Serve `app` on an ephemeral loopback port and return its base URL.
pub async fn spawn(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

pub fn client() -> SandboxClient {
    SandboxClient::with_domains(Duration::from_secs(5), std::iter::empty::<&str>()).unwrap()
}

/// A body sent as separate chunks, without a content length.
pub fn chunked_body(chunks: Vec<Vec<u8>>) -> Body {
    let stream = futures_util::stream::iter(
        chunks.into_iter().map(|c| Ok::<Bytes, std::io::Error>(Bytes::from(c))),
    );
    Body::from_stream(stream)
}

/// Records requested delays instead of sleeping.
#[derive(Default)]
pub struct RecordingSleeper {
    pub slept: Mutex<Vec<Duration>>,
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.slept.lock().unwrap().push(duration);
    }
}

pub const LANDING_PAGE: &str = r#"<!DOCTYPE html>
<html><head><title>CABS-dock</title></head><body>
<form action="/CABSdock/" method="post" enctype="multipart/form-data">
  <input id="csrf_token" name="csrf_token" type="hidden" value="1476291876##6f8e0c5a">
  <input id="pdb_receptor" name="pdb_receptor" type="text" value="">
  <input id="ligand_seq" name="ligand_seq" type="text" value="">
  <input type="submit" value="Submit">
</form></body></html>"#;

pub fn redirect_page(job_path: &str) -> String {
    format!(
        r#"<!DOCTYPE HTML PUBLIC "-//W3C//DTD HTML 3.2 Final//EN">
<title>Redirecting...</title>
<h1>Redirecting...</h1>
<p>You should be redirected automatically to target URL: <a href="{0}">{0}</a>.  If not click the link."#,
        job_path
    )
}

pub fn status_page(status: &str) -> String {
    format!(
        "<html><body>\n<h2>Job: demo</h2>\n<p>Status:{}</p>\n<p>Submitted: 2016-10-12</p>\n</body></html>",
        status
    )
}
