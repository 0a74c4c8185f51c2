//! Streaming downloads and structure file caching.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use tempfile::tempdir;

use cabsdock_client::download::Downloader;
use cabsdock_client::{CabsError, ReceptorId, StructureResolver};

fn archive_chunks() -> Vec<Vec<u8>> {
    (0u8..5)
        .map(|i| (0..(1000 + i as usize * 777)).map(|j| (j as u8) ^ i).collect())
        .collect()
}

async fn chunked() -> Response {
    common::chunked_body(archive_chunks()).into_response()
}

#[tokio::test]
async fn test_multi_chunk_download_is_byte_exact() {
    let app = Router::new().route("/CABSdock/job/CABSdock_abc123.zip", get(chunked));
    let base = common::spawn(app).await;
    let dir = tempdir().unwrap();
    let downloader = Downloader::new(common::client());

    let url = format!("{}/CABSdock/job/CABSdock_abc123.zip", base);
    let path = downloader.download_into(&url, dir.path()).await.unwrap();

    let expected: Vec<u8> = archive_chunks().concat();
    assert_eq!(path, dir.path().join("CABSdock_abc123.zip"));
    assert_eq!(std::fs::read(&path).unwrap(), expected);
}

#[tokio::test]
async fn test_download_reports_bytes_written() {
    let app = Router::new().route("/blob", get(chunked));
    let base = common::spawn(app).await;
    let dir = tempdir().unwrap();
    let dest = dir.path().join("nested").join("blob.bin");

    let written = Downloader::new(common::client())
        .download_to(&format!("{}/blob", base), &dest)
        .await
        .unwrap();

    assert_eq!(written as usize, archive_chunks().concat().len());
    assert!(dest.exists());
}

#[tokio::test]
async fn test_failed_download_leaves_no_file() {
    let app = Router::new().route("/missing.zip", get(|| async { StatusCode::NOT_FOUND }));
    let base = common::spawn(app).await;
    let dir = tempdir().unwrap();

    let err = Downloader::new(common::client())
        .download_into(&format!("{}/missing.zip", base), dir.path())
        .await
        .unwrap_err();

    assert!(matches!(err, CabsError::Transport { status: 404, .. }));
    assert!(!dir.path().join("missing.zip").exists());
}

#[tokio::test]
async fn test_download_outside_allowlist_is_refused() {
    let dir = tempdir().unwrap();
    let err = Downloader::new(common::client())
        .download_into("http://example.com/CABSdock_abc.zip", dir.path())
        .await
        .unwrap_err();
    assert!(matches!(err, CabsError::Security(_)));
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PdbQuery {
    file_format: String,
    compression: String,
    structure_id: String,
}

async fn pdb_file(State(hits): State<Arc<AtomicUsize>>, Query(q): Query<PdbQuery>) -> Response {
    hits.fetch_add(1, Ordering::SeqCst);
    assert_eq!(q.file_format, "pdb");
    assert_eq!(q.compression, "NO");
    format!("HEADER    {}\nEND\n", q.structure_id).into_response()
}

#[tokio::test]
async fn test_structure_is_downloaded_once_and_cached() {
    let hits = Arc::new(AtomicUsize::new(0));
    let app = Router::new()
        .route("/pdb/download/downloadFile.do", get(pdb_file))
        .with_state(hits.clone());
    let base = common::spawn(app).await;
    let dir = tempdir().unwrap();

    let resolver = StructureResolver::new(Downloader::new(common::client()), dir.path())
        .with_download_url(&format!("{}/pdb/download/downloadFile.do", base));
    let receptor: ReceptorId = "2AM9:A".parse().unwrap();

    let first = resolver.resolve(&receptor).await.unwrap();
    let again = resolver.resolve(&"2AM9:B".parse().unwrap()).await.unwrap();

    assert_eq!(first, dir.path().join("2AM9.pdb"));
    assert_eq!(first, again);
    assert_eq!(std::fs::read_to_string(&first).unwrap(), "HEADER    2AM9\nEND\n");
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}
