//! Local disk storage for uploaded covers and avatars
//!
//! Files live at `<uploads>/<kind>/<id>`; the original filename is kept in
//! the database row and only used for display and content-type sniffing.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use calliope_common::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

/// Category of uploaded file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    Cover,
    Avatar,
}

impl UploadKind {
    fn dir_name(&self) -> &'static str {
        match self {
            UploadKind::Cover => "covers",
            UploadKind::Avatar => "avatars",
        }
    }
}

/// Upload as it arrives in a JSON body
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadPayload {
    pub filename: String,
    pub content_base64: String,
}

/// Upload after validation: safe filename plus decoded bytes
#[derive(Debug, Clone)]
pub struct DecodedUpload {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl UploadPayload {
    /// Decode the content and reduce the filename to its last path component
    pub fn decode(&self, max_bytes: usize) -> Result<DecodedUpload> {
        let filename = sanitize_filename(&self.filename)?;

        let bytes = STANDARD
            .decode(self.content_base64.trim())
            .map_err(|e| Error::InvalidInput(format!("Upload is not valid base64: {}", e)))?;

        if bytes.is_empty() {
            return Err(Error::InvalidInput("Upload is empty".to_string()));
        }
        if bytes.len() > max_bytes {
            return Err(Error::InvalidInput(format!(
                "Upload is {} bytes, limit is {}",
                bytes.len(),
                max_bytes
            )));
        }

        Ok(DecodedUpload { filename, bytes })
    }
}

fn sanitize_filename(raw: &str) -> Result<String> {
    let name = raw
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();

    if name.is_empty() || name == "." || name == ".." {
        return Err(Error::InvalidInput(format!("Invalid filename: {:?}", raw)));
    }

    Ok(name.to_string())
}

/// Guess a content type from a filename extension
pub fn content_type_for(filename: &str) -> &'static str {
    let ext = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext.as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        _ => "application/octet-stream",
    }
}

/// Upload directory handle
#[derive(Debug, Clone)]
pub struct UploadStorage {
    root: PathBuf,
}

impl UploadStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, kind: UploadKind, id: Uuid) -> PathBuf {
        self.root.join(kind.dir_name()).join(id.to_string())
    }

    /// Write bytes for a record id, replacing anything already there
    pub async fn save(&self, kind: UploadKind, id: Uuid, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.path_for(kind, id);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;
        debug!("Stored {} bytes at {}", bytes.len(), path.display());
        Ok(path)
    }

    pub async fn read(&self, kind: UploadKind, id: Uuid) -> Result<Vec<u8>> {
        let path = self.path_for(kind, id);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(Error::NotFound(format!(
                "{} file {}",
                kind.dir_name(),
                id
            ))),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete a stored file; a missing file is not an error
    pub async fn remove(&self, kind: UploadKind, id: Uuid) -> Result<()> {
        match tokio::fs::remove_file(self.path_for(kind, id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
