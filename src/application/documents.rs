use crate::config::DocumentPolicy;
use crate::domain::ports::BlobBackendBox;
use crate::domain::verification::StoredFile;
use crate::error::{Result, VerificationError};
use sha2::{Digest, Sha256};

/// A file as received from the caller, before validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub name: String,
    pub media_type: String,
    /// Size the caller declared; must match `bytes`.
    pub byte_size: u64,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, media_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            media_type: media_type.into(),
            byte_size: bytes.len() as u64,
            bytes,
        }
    }
}

/// Validates uploads and writes them to a content-addressed blob backend.
pub struct DocumentStore {
    backend: BlobBackendBox,
    policy: DocumentPolicy,
}

impl DocumentStore {
    pub fn new(backend: BlobBackendBox, policy: DocumentPolicy) -> Self {
        Self { backend, policy }
    }

    /// Stores a batch of files. The whole batch is validated first, so a
    /// rejected batch writes nothing.
    pub async fn store(&self, files: &[UploadedFile]) -> Result<Vec<StoredFile>> {
        if files.is_empty() {
            return Err(VerificationError::Validation(
                "no files uploaded".to_string(),
            ));
        }
        for file in files {
            self.validate(file)?;
        }

        let mut stored = Vec::with_capacity(files.len());
        for file in files {
            let key = content_key(&file.bytes);
            let media_type = file.media_type.trim().to_ascii_lowercase();
            let address = self.backend.put(&key, &media_type, &file.bytes).await?;
            stored.push(StoredFile {
                address,
                original_name: file.name.trim().to_string(),
                byte_size: file.byte_size,
                media_type,
            });
        }
        Ok(stored)
    }

    fn validate(&self, file: &UploadedFile) -> Result<()> {
        let name = file.name.trim();
        if name.is_empty() {
            return Err(VerificationError::Validation(
                "uploaded file has no name".to_string(),
            ));
        }
        if file.byte_size != file.bytes.len() as u64 {
            return Err(VerificationError::Validation(format!(
                "`{name}` declares {} bytes but contains {}",
                file.byte_size,
                file.bytes.len()
            )));
        }
        if file.bytes.is_empty() {
            return Err(VerificationError::Validation(format!("`{name}` is empty")));
        }
        if file.byte_size > self.policy.max_file_bytes {
            return Err(VerificationError::Validation(format!(
                "`{name}` is {} bytes; the limit is {}",
                file.byte_size, self.policy.max_file_bytes
            )));
        }
        let media_type = file.media_type.trim();
        if !self
            .policy
            .allowed_media_types
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(media_type))
        {
            return Err(VerificationError::Validation(format!(
                "`{name}` has unsupported media type `{media_type}`"
            )));
        }
        Ok(())
    }
}

/// SHA-256 hex digest of `bytes`.
pub fn content_key(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}
