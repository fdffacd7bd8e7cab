//! Uniform client for external verification and payment providers.
//!
//! Wraps a [`ProviderTransport`] with a per-call timeout, bounded retries on
//! transport errors and validation of response shapes into [`ProviderReply`].

pub mod response;
pub mod retry;

pub use response::{ProviderReply, ProviderResult};
pub use retry::RetryPolicy;

use crate::config::ProviderSettings;
use crate::domain::ports::{ProviderOperation, ProviderTransport, TransportFailure};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Clone)]
pub struct ProviderClient {
    transport: Arc<dyn ProviderTransport>,
    settings: ProviderSettings,
}

impl ProviderClient {
    pub fn new(transport: Arc<dyn ProviderTransport>, settings: ProviderSettings) -> Self {
        Self {
            transport,
            settings,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.settings.max_retries,
            base_delay: Duration::from_millis(self.settings.base_delay_ms),
        }
    }

    /// Calls `operation` on the provider configured for it.
    pub async fn invoke(&self, operation: ProviderOperation, payload: &Value) -> ProviderResult {
        let provider = self.settings.provider_for(operation);
        self.call(provider, operation, payload, self.settings.timeout())
            .await
    }

    /// Calls `operation` on `provider`, retrying transport errors.
    ///
    /// Never fails: every failure is folded into [`ProviderResult::Error`].
    pub async fn call(
        &self,
        provider: &str,
        operation: ProviderOperation,
        payload: &Value,
        timeout: Duration,
    ) -> ProviderResult {
        let result = retry::with_backoff(self.retry_policy(), move || {
            self.attempt(provider, operation, payload, timeout)
        })
        .await;

        match &result {
            ProviderResult::Success(_) => info!(%provider, %operation, "provider call succeeded"),
            ProviderResult::Rejected { reason } => {
                info!(%provider, %operation, %reason, "provider declined")
            }
            ProviderResult::Error { reason } => {
                info!(%provider, %operation, %reason, "provider call failed")
            }
        }
        result
    }

    async fn attempt(
        &self,
        provider: &str,
        operation: ProviderOperation,
        payload: &Value,
        timeout: Duration,
    ) -> ProviderResult {
        debug!(%provider, %operation, "calling provider");
        let elapsed_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        match tokio::time::timeout(timeout, self.transport.send(provider, operation, payload)).await
        {
            Err(_) => ProviderResult::error(TransportFailure::Timeout { elapsed_ms }.to_string()),
            Ok(Err(failure)) => ProviderResult::error(failure.to_string()),
            Ok(Ok(body)) => response::classify(operation, body),
        }
    }
}
