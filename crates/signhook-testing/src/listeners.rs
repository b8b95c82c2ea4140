//! Test doubles for listeners and secret resolution.

use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use serde_json::Value;
use signhook_core::{
    CallbackEvent, CallbackListener, ListenerError, SecretBytes, SecretResolver,
    StaticSecretResolver,
};

/// Shared, ordered log of `(listener name, event document)` pairs.
pub type CallLog = Arc<Mutex<Vec<(String, Value)>>>;

/// Creates an empty call log.
pub fn call_log() -> CallLog {
    Arc::new(Mutex::new(Vec::new()))
}

/// Records every event it receives.
#[derive(Debug, Clone)]
pub struct RecordingListener {
    name: String,
    log: CallLog,
}

impl RecordingListener {
    /// Creates a listener with its own log.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_log(name, call_log())
    }

    /// Creates a listener that appends to a shared log, for ordering checks.
    pub fn with_log(name: impl Into<String>, log: CallLog) -> Self {
        Self { name: name.into(), log }
    }

    /// Documents received by this listener.
    pub fn received(&self) -> Vec<Value> {
        self.lock()
            .iter()
            .filter(|(name, _)| name == &self.name)
            .map(|(_, doc)| doc.clone())
            .collect()
    }

    /// Number of events received by this listener.
    pub fn count(&self) -> usize {
        self.received().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(String, Value)>> {
        self.log.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait]
impl CallbackListener for RecordingListener {
    fn name(&self) -> &str {
        &self.name
    }

    async fn on_callback(&self, event: &CallbackEvent) -> Result<(), ListenerError> {
        self.lock().push((self.name.clone(), event.raw().clone()));
        Ok(())
    }
}

/// Always returns an error.
#[derive(Debug, Default)]
pub struct FailingListener {
    calls: AtomicUsize,
}

impl FailingListener {
    /// Creates the listener.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of times it was invoked.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CallbackListener for FailingListener {
    fn name(&self) -> &str {
        "failing"
    }

    async fn on_callback(&self, _event: &CallbackEvent) -> Result<(), ListenerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(ListenerError::new("failing", "downstream unavailable"))
    }
}

/// Panics on every event.
#[derive(Debug, Default)]
pub struct PanickingListener;

#[async_trait]
impl CallbackListener for PanickingListener {
    fn name(&self) -> &str {
        "panicking"
    }

    async fn on_callback(&self, _event: &CallbackEvent) -> Result<(), ListenerError> {
        panic!("listener bug")
    }
}

/// Sleeps before acknowledging, to hold a callback open.
#[derive(Debug)]
pub struct SlowListener {
    delay: Duration,
}

impl SlowListener {
    /// Creates a listener that waits `delay` per event.
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl CallbackListener for SlowListener {
    fn name(&self) -> &str {
        "slow"
    }

    async fn on_callback(&self, _event: &CallbackEvent) -> Result<(), ListenerError> {
        tokio::time::sleep(self.delay).await;
        Ok(())
    }
}

/// Secret resolver that counts lookups.
#[derive(Debug)]
pub struct CountingSecretResolver {
    inner: StaticSecretResolver,
    lookups: AtomicUsize,
}

impl CountingSecretResolver {
    /// Wraps a fixed secret.
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self { inner: StaticSecretResolver::new(secret), lookups: AtomicUsize::new(0) }
    }

    /// Number of `resolve_secret` calls so far.
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SecretResolver for CountingSecretResolver {
    async fn resolve_secret(&self) -> Option<SecretBytes> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.inner.resolve_secret().await
    }
}
