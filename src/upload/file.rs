use std::path::Path;

use anyhow::{Context, Result};

pub const PDF_MIME: &str = "application/pdf";
pub const DOCX_MIME: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// MIME types a contract upload may carry, with their file extensions.
pub const ALLOWED_TYPES: &[(&str, &str)] = &[(PDF_MIME, "pdf"), (DOCX_MIME, "docx")];

/// A file picked for upload, held fully in memory.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedFile {
    name: String,
    mime: String,
    bytes: Vec<u8>,
}

impl SelectedFile {
    pub fn new(name: impl Into<String>, mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime: mime.into(),
            bytes,
        }
    }

    /// Reads a file from disk; the MIME type comes from its extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .with_context(|| format!("{} has no file name", path.display()))?;
        let mime = mime_for_name(&name).unwrap_or("application/octet-stream");
        Ok(Self::new(name, mime, bytes))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mime(&self) -> &str {
        &self.mime
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    /// "contract.pdf (12 KB)"
    pub fn describe(&self) -> String {
        format!("{} ({} KB)", self.name, (self.size() as f64 / 1024.0).round() as u64)
    }
}

pub fn mime_for_name(name: &str) -> Option<&'static str> {
    let ext = name.rsplit_once('.')?.1.to_ascii_lowercase();
    ALLOWED_TYPES
        .iter()
        .find(|(_, e)| *e == ext)
        .map(|(mime, _)| *mime)
}

pub fn is_allowed_mime(mime: &str) -> bool {
    ALLOWED_TYPES.iter().any(|(m, _)| *m == mime)
}
