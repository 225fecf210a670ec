//! Utility functions
//!
use std::path::Path;

use anyhow::{Context, Result};
use reqwest::Client;
use sha2::{Digest, Sha256};

/// Download a file from a URL to a given filepath.
///
/// The body is written to a sibling temporary file first and renamed into place, so an
/// interrupted download never leaves a truncated file at `filepath`.
pub async fn download_file(client: &Client, url: &str, filepath: impl AsRef<Path>) -> Result<()> {
    let filepath = filepath.as_ref();
    let resp = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("requesting {url}"))?
        .error_for_status()?;
    let content = resp.bytes().await?;

    let partial = filepath.with_extension("part");
    tokio::fs::write(&partial, &content)
        .await
        .with_context(|| format!("writing {}", partial.display()))?;
    tokio::fs::rename(&partial, filepath).await?;

    log::debug!("Downloaded {} ({} bytes)", url, content.len());
    Ok(())
}

/// Join a file name onto a base URL, treating the base as a directory.
pub fn join_url(base: &str, file: &str) -> String {
    if base.ends_with('/') {
        format!("{base}{file}")
    } else {
        format!("{base}/{file}")
    }
}

/// Short hex identifier of a string, used for cache directory names.
///
/// The first 8 bytes of its SHA-256, so the name is the same across builds and toolchains.
pub fn hashed(name: &str) -> String {
    let digest = Sha256::digest(name.as_bytes());
    hex::encode(&digest[..8])
}
