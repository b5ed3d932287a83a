//! Packaging of finished batch output

use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashSet;
use std::path::PathBuf;
use tokio::fs;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::pipeline::progress::GeneratedFile;
use crate::pipeline::rows::unique_filename;
use crate::response::data_url;

/// Where a packaged set of files ended up
#[derive(Debug, Clone, Serialize)]
pub struct PackagedArchive {
    pub location: String,
    pub files: Vec<String>,
    pub bytes_written: u64,
}

/// Bundles named image buffers into one retrievable object
#[async_trait]
pub trait ArchivePackager: Send + Sync {
    async fn package(&self, files: &[GeneratedFile]) -> Result<PackagedArchive>;
}

/// Writes every file into a fresh directory under `base_path`
pub struct DirectoryPackager {
    base_path: PathBuf,
}

impl DirectoryPackager {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }
}

#[async_trait]
impl ArchivePackager for DirectoryPackager {
    async fn package(&self, files: &[GeneratedFile]) -> Result<PackagedArchive> {
        if files.is_empty() {
            return Err(AppError::InvalidRequest("Nothing to package".to_string()));
        }

        let target = self.base_path.join(Uuid::new_v4().to_string());
        fs::create_dir_all(&target).await?;
        debug!(path = ?target, "Created archive directory");

        let mut names = Vec::with_capacity(files.len());
        let mut bytes_written = 0u64;
        let mut taken = HashSet::with_capacity(files.len());
        for file in files {
            let name = unique_filename(&mut taken, sanitize_filename(&file.filename));
            let bytes = data_url::decode(&file.data)?;
            if detect_image_format(&bytes).is_none() {
                warn!(filename = %name, "Packaged payload is not a recognized image format");
            }

            fs::write(target.join(&name), &bytes).await?;
            bytes_written += bytes.len() as u64;
            names.push(name);
        }

        info!(path = ?target, files = names.len(), bytes = bytes_written, "Packaged batch output");

        Ok(PackagedArchive {
            location: target.to_string_lossy().to_string(),
            files: names,
            bytes_written,
        })
    }
}

/// Strip any directory components so a file cannot escape the archive root
fn sanitize_filename(name: &str) -> String {
    let base = name
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or_default()
        .trim();
    if base.is_empty() || base == "." || base == ".." {
        "unnamed.png".to_string()
    } else {
        base.to_string()
    }
}

/// Detect image format from binary data using magic bytes
pub fn detect_image_format(data: &[u8]) -> Option<&'static str> {
    if data.len() < 8 {
        return None;
    }

    if data.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
        return Some("png");
    }
    if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Some("jpg");
    }
    if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
        return Some("gif");
    }
    if data.len() >= 12 && data.starts_with(b"RIFF") && &data[8..12] == b"WEBP" {
        return Some("webp");
    }

    None
}
