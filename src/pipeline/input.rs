//! Input loading: read a user-supplied path into PDF bytes.
//!
//! Checking the `%PDF` magic up front gives callers a clear
//! [`PaFillError::NotAPdf`] naming the file, instead of a generic parse
//! failure from deep inside the form reader.

use crate::error::PaFillError;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Magic bytes at the start of every PDF file.
pub const PDF_MAGIC: &[u8; 4] = b"%PDF";

/// Does the buffer start like a PDF?
pub fn looks_like_pdf(bytes: &[u8]) -> bool {
    bytes.starts_with(PDF_MAGIC)
}

/// Read a local PDF, validating existence and magic bytes.
pub async fn read_pdf(path: impl AsRef<Path>) -> Result<Vec<u8>, PaFillError> {
    let path = path.as_ref();
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(PaFillError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        Err(e) => {
            return Err(PaFillError::Internal(format!(
                "Failed to read '{}': {}",
                path.display(),
                e
            )));
        }
    };

    check_magic(path.to_path_buf(), &bytes)?;
    debug!("Read PDF: {} ({} bytes)", path.display(), bytes.len());
    Ok(bytes)
}

fn check_magic(path: PathBuf, bytes: &[u8]) -> Result<(), PaFillError> {
    if looks_like_pdf(bytes) {
        return Ok(());
    }
    let mut magic = [0u8; 4];
    let n = bytes.len().min(4);
    magic[..n].copy_from_slice(&bytes[..n]);
    Err(PaFillError::NotAPdf { path, magic })
}
