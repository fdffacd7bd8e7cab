use crate::domain::ports::BlobBackend;
use crate::error::{Result, VerificationError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Stores uploads as files named by their content digest.
///
/// Files land at `<root>/<first two digest chars>/<digest>.<ext>`; writing the
/// same bytes twice is a no-op.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn path_for(&self, key: &str, media_type: &str) -> Result<PathBuf> {
        if key.len() < 3 || !key.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(VerificationError::Storage(format!(
                "invalid blob key `{key}`"
            )));
        }
        Ok(self
            .root
            .join(&key[..2])
            .join(format!("{key}.{}", extension(media_type))))
    }
}

fn extension(media_type: &str) -> &'static str {
    match media_type {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "application/pdf" => "pdf",
        _ => "bin",
    }
}

fn io_failure(e: std::io::Error) -> VerificationError {
    VerificationError::Storage(format!("blob write failed: {e}"))
}

#[async_trait]
impl BlobBackend for FsBlobStore {
    async fn put(&self, key: &str, media_type: &str, bytes: &[u8]) -> Result<String> {
        let path = self.path_for(key, media_type)?;
        let address = format!("file://{}", path.display());
        if tokio::fs::try_exists(&path).await.map_err(io_failure)? {
            return Ok(address);
        }
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_failure)?;
        }

        // Readers never see a partially written file.
        let partial = path.with_extension("partial");
        tokio::fs::write(&partial, bytes).await.map_err(io_failure)?;
        tokio::fs::rename(&partial, &path).await.map_err(io_failure)?;
        Ok(address)
    }
}
