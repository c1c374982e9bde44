//! Image asset pipeline.
//!
//! Uploaded binaries are decoded, re-encoded as JPEG at a fixed quality and
//! written under a unique filename in the shared upload directory. Records
//! only ever hold the returned filename.

use std::io::Write;
use std::path::{Component, Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use image::codecs::jpeg::JpegEncoder;
use tempfile::NamedTempFile;
use uuid::Uuid;

/// JPEG quality used for every stored asset.
pub const DEFAULT_QUALITY: u8 = 80;

const STORED_EXTENSION: &str = "jpg";
const MAX_STEM_LEN: usize = 40;

#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("uploaded file is empty")]
    Empty,
    #[error("could not decode image: {0}")]
    Decode(#[source] image::ImageError),
    #[error("could not encode image: {0}")]
    Encode(#[source] image::ImageError),
    #[error("asset IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid asset name: {0:?}")]
    InvalidName(String),
    #[error("transcode task failed: {0}")]
    Join(String),
}

impl AssetError {
    /// Whether the client's bytes were at fault rather than the server.
    pub fn is_transcode(&self) -> bool {
        matches!(self, Self::Empty | Self::Decode(_))
    }
}

/// The shared upload directory.
pub struct AssetStore {
    dir: PathBuf,
    quality: u8,
}

impl AssetStore {
    pub fn new(dir: PathBuf) -> Self {
        Self::with_quality(dir, DEFAULT_QUALITY)
    }

    pub fn with_quality(dir: PathBuf, quality: u8) -> Self {
        Self {
            dir,
            quality: quality.clamp(1, 100),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Transcode `bytes` and store the result. Returns the new filename.
    ///
    /// Nothing is written unless decoding and encoding both succeed.
    pub async fn store(&self, bytes: Vec<u8>, name_hint: &str) -> Result<String, AssetError> {
        if bytes.is_empty() {
            return Err(AssetError::Empty);
        }
        let filename = unique_filename(name_hint);
        let dir = self.dir.clone();
        let quality = self.quality;
        let target = filename.clone();

        tokio::task::spawn_blocking(move || {
            let encoded = transcode(&bytes, quality)?;
            write_atomic(&dir, &target, &encoded)
        })
        .await
        .map_err(|e| AssetError::Join(e.to_string()))??;

        tracing::info!(filename = %filename, "Stored asset");
        Ok(filename)
    }

    /// Remove an asset. Returns whether a file was actually deleted; a
    /// missing file is not an error.
    pub async fn delete(&self, filename: &str) -> Result<bool, AssetError> {
        validate_name(filename)?;
        match tokio::fs::remove_file(self.dir.join(filename)).await {
            Ok(()) => {
                tracing::info!(filename, "Deleted asset");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Stored filenames, sorted. Hidden files (in-flight temp files) are
    /// skipped.
    pub async fn list(&self) -> Result<Vec<String>, AssetError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => return Err(e.into()),
        };
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            if let Ok(name) = entry.file_name().into_string() {
                if !name.starts_with('.') {
                    names.push(name);
                }
            }
        }
        names.sort();
        Ok(names)
    }

    /// Delete every stored asset. Returns how many were removed.
    pub async fn clear(&self) -> Result<usize, AssetError> {
        let mut removed = 0;
        for name in self.list().await? {
            if self.delete(&name).await? {
                removed += 1;
            }
        }
        tracing::info!(removed, "Cleared upload directory");
        Ok(removed)
    }
}

fn transcode(bytes: &[u8], quality: u8) -> Result<Vec<u8>, AssetError> {
    let decoded = image::load_from_memory(bytes).map_err(AssetError::Decode)?;
    let rgb = decoded.to_rgb8();
    let mut out = Vec::new();
    rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut out, quality))
        .map_err(AssetError::Encode)?;
    Ok(out)
}

fn write_atomic(dir: &Path, filename: &str, data: &[u8]) -> Result<(), AssetError> {
    std::fs::create_dir_all(dir)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;
    tmp.persist(dir.join(filename))
        .map_err(|e| AssetError::Io(e.error))?;
    Ok(())
}

/// Filenames are `<unix millis>-<8 hex>-<slug of original stem>.jpg`.
fn unique_filename(name_hint: &str) -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    let nonce = Uuid::new_v4().simple().to_string();
    format!(
        "{millis}-{}-{}.{STORED_EXTENSION}",
        &nonce[..8],
        slug(name_hint)
    )
}

fn slug(name_hint: &str) -> String {
    let stem = Path::new(name_hint)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    let mut out = String::with_capacity(stem.len());
    for c in stem.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.ends_with('-') {
            out.push('-');
        }
    }
    let trimmed: String = out.trim_matches('-').chars().take(MAX_STEM_LEN).collect();
    let trimmed = trimmed.trim_end_matches('-');
    if trimmed.is_empty() {
        "image".to_string()
    } else {
        trimmed.to_string()
    }
}

/// A name is valid when it is a single plain path component that is not
/// hidden. Dots inside the name are fine.
fn validate_name(filename: &str) -> Result<(), AssetError> {
    let mut components = Path::new(filename).components();
    let single = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    );
    let bad = !single
        || filename.contains(['/', '\\'])
        || filename.starts_with('.');
    if bad {
        return Err(AssetError::InvalidName(filename.to_string()));
    }
    Ok(())
}
