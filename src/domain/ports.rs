use super::event::LogEntry;
use super::verification::{VerificationId, VerificationRequest};
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Persistence for verification requests: an append-only event log per
/// request plus a snapshot projection for cheap reads.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Appends `entries` to the request's log and saves `snapshot`, atomically
    /// where the backend allows it.
    async fn commit(&self, snapshot: &VerificationRequest, entries: &[LogEntry]) -> Result<()>;
    async fn history(&self, id: VerificationId) -> Result<Vec<LogEntry>>;
    async fn snapshot(&self, id: VerificationId) -> Result<Option<VerificationRequest>>;
    async fn snapshots(&self) -> Result<Vec<VerificationRequest>>;
}

#[async_trait]
impl<T: RecordStore + ?Sized> RecordStore for Arc<T> {
    async fn commit(&self, snapshot: &VerificationRequest, entries: &[LogEntry]) -> Result<()> {
        (**self).commit(snapshot, entries).await
    }

    async fn history(&self, id: VerificationId) -> Result<Vec<LogEntry>> {
        (**self).history(id).await
    }

    async fn snapshot(&self, id: VerificationId) -> Result<Option<VerificationRequest>> {
        (**self).snapshot(id).await
    }

    async fn snapshots(&self) -> Result<Vec<VerificationRequest>> {
        (**self).snapshots().await
    }
}

/// Durable storage for uploaded file bytes.
#[async_trait]
pub trait BlobBackend: Send + Sync {
    /// Writes `bytes` under `key` and returns the stable address.
    async fn put(&self, key: &str, media_type: &str, bytes: &[u8]) -> Result<String>;
}

#[async_trait]
impl<T: BlobBackend + ?Sized> BlobBackend for Arc<T> {
    async fn put(&self, key: &str, media_type: &str, bytes: &[u8]) -> Result<String> {
        (**self).put(key, media_type, bytes).await
    }
}

/// Operations exposed by external verification and payment providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderOperation {
    RequestOtp,
    VerifyOtp,
    ExtractDocument,
    ScanQr,
    MatchFace,
    LookupLicense,
    LookupVoter,
    CreateOrder,
    CapturePayment,
}

impl ProviderOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RequestOtp => "request-otp",
            Self::VerifyOtp => "verify-otp",
            Self::ExtractDocument => "extract-document",
            Self::ScanQr => "scan-qr",
            Self::MatchFace => "match-face",
            Self::LookupLicense => "lookup-license",
            Self::LookupVoter => "lookup-voter",
            Self::CreateOrder => "create-order",
            Self::CapturePayment => "capture-payment",
        }
    }
}

impl fmt::Display for ProviderOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure to obtain any response body from a provider.
#[derive(Debug, thiserror::Error)]
pub enum TransportFailure {
    #[error("provider unreachable: {0}")]
    Unreachable(String),
    #[error("provider returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("provider timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },
}

/// Raw exchange with a provider. Response shapes are validated by
/// [`crate::providers::ProviderClient`], not by implementations.
#[async_trait]
pub trait ProviderTransport: Send + Sync {
    async fn send(
        &self,
        provider: &str,
        operation: ProviderOperation,
        payload: &serde_json::Value,
    ) -> std::result::Result<serde_json::Value, TransportFailure>;
}

pub type RecordStoreBox = Box<dyn RecordStore>;
pub type BlobBackendBox = Box<dyn BlobBackend>;
