#![allow(dead_code)]

use async_trait::async_trait;
use kycflow::application::documents::UploadedFile;
use kycflow::application::engine::VerificationEngine;
use kycflow::config::EngineConfig;
use kycflow::domain::ports::{ProviderOperation, ProviderTransport, TransportFailure};
use kycflow::domain::verification::{Method, Purpose, VerificationId};
use kycflow::infrastructure::in_memory::{InMemoryBlobStore, InMemoryRecordStore};
use kycflow::infrastructure::simulated::SimulatedProvider;
use serde_json::{Value, json};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A canned provider answer.
pub enum Scripted {
    Reply(Value),
    Fail(TransportFailure),
    Hang(Duration),
}

pub fn success(data: Value) -> Scripted {
    Scripted::Reply(json!({"status": "success", "data": data}))
}

pub fn rejected(reason: &str) -> Scripted {
    Scripted::Reply(json!({"status": "rejected", "reason": reason}))
}

pub fn unreachable() -> Scripted {
    Scripted::Fail(TransportFailure::Unreachable("connection refused".into()))
}

/// Plays scripted answers per operation, then falls back to the simulated
/// provider. Counts every call it receives.
#[derive(Default)]
pub struct ScriptedTransport {
    scripts: Mutex<HashMap<ProviderOperation, VecDeque<Scripted>>>,
    calls: Mutex<HashMap<ProviderOperation, u32>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push(&self, operation: ProviderOperation, answer: Scripted) {
        self.scripts
            .lock()
            .unwrap()
            .entry(operation)
            .or_default()
            .push_back(answer);
    }

    pub fn calls(&self, operation: ProviderOperation) -> u32 {
        self.calls
            .lock()
            .unwrap()
            .get(&operation)
            .copied()
            .unwrap_or(0)
    }

    pub fn total_calls(&self) -> u32 {
        self.calls.lock().unwrap().values().sum()
    }
}

#[async_trait]
impl ProviderTransport for ScriptedTransport {
    async fn send(
        &self,
        provider: &str,
        operation: ProviderOperation,
        payload: &Value,
    ) -> Result<Value, TransportFailure> {
        *self.calls.lock().unwrap().entry(operation).or_default() += 1;
        let next = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&operation)
            .and_then(VecDeque::pop_front);

        match next {
            Some(Scripted::Reply(body)) => Ok(body),
            Some(Scripted::Fail(failure)) => Err(failure),
            Some(Scripted::Hang(duration)) => {
                tokio::time::sleep(duration).await;
                SimulatedProvider.send(provider, operation, payload).await
            }
            None => SimulatedProvider.send(provider, operation, payload).await,
        }
    }
}

/// Defaults with millisecond backoff so retry tests stay fast.
pub fn fast_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.providers.base_delay_ms = 1;
    config.providers.timeout_ms = 200;
    config
}

pub fn engine_with(transport: Arc<ScriptedTransport>, config: EngineConfig) -> VerificationEngine {
    VerificationEngine::new(
        Box::new(InMemoryRecordStore::new()),
        Box::new(InMemoryBlobStore::new()),
        transport,
        Arc::new(config),
    )
}

pub fn jpeg(name: &str) -> UploadedFile {
    UploadedFile::new(name, "image/jpeg", format!("bytes of {name}").into_bytes())
}

pub async fn new_request(engine: &VerificationEngine, method: Method) -> VerificationId {
    engine
        .create_verification("user-42", Purpose::Tenant, method)
        .await
        .unwrap()
        .id
}
