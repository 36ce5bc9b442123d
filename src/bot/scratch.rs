//! Scratch files for downloaded attachments.

use std::path::{Path, PathBuf};

use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// A local file owned by one command.
///
/// Handlers call [`ScratchFile::remove`] when done. `Drop` is the fallback for
/// a cancelled or panicking handler and deletes with a blocking call.
#[derive(Debug)]
pub struct ScratchFile {
    path: PathBuf,
    removed: bool,
}

impl ScratchFile {
    /// Reserve a unique path under `dir` that keeps the original file name as a suffix.
    ///
    /// Nothing is created on disk until something writes to [`ScratchFile::path`].
    pub fn reserve(dir: &Path, original_name: &str) -> Self {
        let name = format!("{}-{}", uuid::Uuid::new_v4(), sanitize_file_name(original_name));
        Self { path: dir.join(name), removed: false }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the file without blocking the runtime.
    pub async fn remove(mut self) {
        self.removed = true;
        log_removal(&self.path, tokio::fs::remove_file(&self.path).await);
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        if !self.removed {
            log_removal(&self.path, std::fs::remove_file(&self.path));
        }
    }
}

fn log_removal(path: &Path, result: std::io::Result<()>) {
    match result {
        Ok(()) => debug!("Removed scratch file {:?}", path),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove scratch file {:?}: {e}", path),
    }
}

/// Keep only the last path component and replace anything outside `[A-Za-z0-9._-]`.
fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') { c } else { '_' })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "attachment".to_string()
    } else {
        cleaned.to_string()
    }
}

/// Stream `url` into `dest`. Returns the number of bytes written.
pub async fn download_to(http: &reqwest::Client, url: &str, dest: &Path) -> Result<u64, String> {
    let response = http
        .get(url)
        .send()
        .await
        .map_err(|e| format!("Failed to fetch attachment: {e}"))?;

    let status = response.status();
    if !status.is_success() {
        return Err(format!("Attachment download returned {status}"));
    }

    let mut file = tokio::fs::File::create(dest)
        .await
        .map_err(|e| format!("Failed to create {:?}: {e}", dest))?;

    let mut written = 0u64;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| format!("Failed to read attachment body: {e}"))?;
        file.write_all(&chunk)
            .await
            .map_err(|e| format!("Failed to write {:?}: {e}", dest))?;
        written += chunk.len() as u64;
    }
    file.flush()
        .await
        .map_err(|e| format!("Failed to flush {:?}: {e}", dest))?;

    debug!("Downloaded {written} bytes to {:?}", dest);
    Ok(written)
}
