use crate::error::{EngineError, Result};
use crate::models::DocumentFingerprint;
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "bmp", "tiff"];

/// Recursively lists image files under `folder`, sorted so ingestion order
/// is stable across runs.
pub fn discover_image_files(folder: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let is_image = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                IMAGE_EXTENSIONS
                    .iter()
                    .any(|known| ext.eq_ignore_ascii_case(known))
            });

        if is_image {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

pub fn digest_file(path: &Path) -> Result<String> {
    let bytes = fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

/// The `source_name` is the image file name, unique within an ingestion
/// batch and the key under which chunk metadata is stored.
pub fn build_document_fingerprint(path: &Path) -> Result<DocumentFingerprint> {
    let checksum = digest_file(path)?;
    let source_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| {
            EngineError::extraction(path.display().to_string(), "path has no file name")
        })?;

    Ok(DocumentFingerprint {
        source_name: source_name.to_string(),
        source_path: path.to_string_lossy().to_string(),
        checksum,
        extracted_at: Utc::now(),
    })
}

/// An image the batch skipped because its extraction failed. The batch
/// itself keeps going; callers decide whether skips are acceptable.
#[derive(Debug)]
pub struct SkippedImage {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct IngestionReport {
    pub documents: Vec<DocumentFingerprint>,
    pub chunk_count: usize,
    pub skipped: Vec<SkippedImage>,
}

#[cfg(test)]
mod tests {
    use super::{build_document_fingerprint, digest_file, discover_image_files};
    use std::fs::{self, File};
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn discovery_is_recursive_and_filters_extensions() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let base = dir.path();
        let nested = base.join("nested");
        fs::create_dir(&nested)?;

        File::create(base.join("a.jpg")).and_then(|mut file| file.write_all(b"fake"))?;
        File::create(nested.join("b.PNG")).and_then(|mut file| file.write_all(b"fake"))?;
        File::create(base.join("notes.txt")).and_then(|mut file| file.write_all(b"skip me"))?;

        let files = discover_image_files(base);
        assert_eq!(files.len(), 2);
        Ok(())
    }

    #[test]
    fn checksum_is_reproducible() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let file_path = dir.path().join("a.jpg");
        fs::write(&file_path, b"abc")?;

        let first = digest_file(&file_path)?;
        let second = digest_file(&file_path)?;
        assert_eq!(first, second);
        Ok(())
    }

    #[test]
    fn fingerprint_uses_file_name_as_source() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let file_path = dir.path().join("image_15.jpg");
        fs::write(&file_path, b"bytes")?;

        let fingerprint = build_document_fingerprint(&file_path)?;
        assert_eq!(fingerprint.source_name, "image_15.jpg");
        assert!(!fingerprint.checksum.is_empty());
        Ok(())
    }
}
