// ============================================================
// Layer 6 — Downloads
// ============================================================
// Thin wrapper over Burn's network downloader (progress bar
// included). The downloader panics on network failure; we turn
// that into an error so the caller can report which asset failed.

use anyhow::{anyhow, bail, Result};
use burn::data::network::downloader;

/// Fetch `url` into memory, showing `label` in the progress bar
pub fn download_bytes(url: &str, label: &str) -> Result<Vec<u8>> {
    let bytes = std::panic::catch_unwind(|| downloader::download_file_as_bytes(url, label))
        .map_err(|_| anyhow!("Download of '{}' failed", url))?;

    if bytes.is_empty() {
        bail!("Download of '{}' returned no data", url);
    }

    tracing::debug!("Downloaded {} bytes from {}", bytes.len(), url);
    Ok(bytes)
}
