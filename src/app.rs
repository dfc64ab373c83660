use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use futures::FutureExt;
use futures::future::BoxFuture;
use tracing::Instrument;

use crate::error::{RefreshError, SourceError};
use crate::gate::RefreshGate;
use crate::normalize::limits::DisplayConfig;
use crate::normalize::{NormalizedSnapshot, normalize};
use crate::sample::parse_snapshot;

/// Which sample to fetch. `None` asks for the most recent one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SampleRequest {
    pub timestamp: Option<i64>,
}

impl SampleRequest {
    pub fn latest() -> Self {
        Self::default()
    }

    pub fn at(timestamp: i64) -> Self {
        Self {
            timestamp: Some(timestamp),
        }
    }
}

/// Transport collaborator: returns the raw JSON text of one sample.
pub trait SampleSource: Send + Sync {
    fn fetch(&self, request: SampleRequest) -> BoxFuture<'_, Result<String, SourceError>>;
}

/// Reads a sample saved to disk. The requested timestamp is ignored.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SampleSource for FileSource {
    fn fetch(&self, _request: SampleRequest) -> BoxFuture<'_, Result<String, SourceError>> {
        async move {
            tokio::fs::read_to_string(&self.path)
                .await
                .map_err(SourceError::from)
        }
        .boxed()
    }
}

/// Keeps the latest normalized sample and serializes refresh cycles through
/// a [`RefreshGate`].
pub struct Dashboard<S> {
    source: S,
    config: Mutex<DisplayConfig>,
    gate: RefreshGate,
    latest: Mutex<Option<Arc<NormalizedSnapshot>>>,
}

impl<S: SampleSource> Dashboard<S> {
    pub fn new(source: S, config: DisplayConfig) -> Self {
        Dashboard {
            source,
            config: Mutex::new(config),
            gate: RefreshGate::new(),
            latest: Mutex::new(None),
        }
    }

    pub fn config(&self) -> DisplayConfig {
        *lock(&self.config)
    }

    /// Applies from the next cycle on. A sample already normalized keeps the
    /// config it was built with.
    pub fn set_config(&self, config: DisplayConfig) {
        *lock(&self.config) = config;
    }

    pub fn latest(&self) -> Option<Arc<NormalizedSnapshot>> {
        lock(&self.latest).clone()
    }

    pub fn last_timestamp(&self) -> Option<i64> {
        lock(&self.latest).as_ref().map(|s| s.timestamp)
    }

    pub fn gate(&self) -> &RefreshGate {
        &self.gate
    }

    /// Fetch, parse and normalize one sample. Cycles run one at a time in
    /// arrival order; only a completed cycle replaces the latest sample.
    pub async fn refresh(
        &self,
        request: SampleRequest,
    ) -> Result<Arc<NormalizedSnapshot>, RefreshError> {
        let span = tracing::info_span!("dashboard.refresh", timestamp = ?request.timestamp);
        async move {
            let _permit = self.gate.acquire().await;
            let raw = self.source.fetch(request).await?;
            let sample = parse_snapshot(&raw)?;
            let config = self.config();
            let snapshot = Arc::new(normalize(sample, &config)?);
            *lock(&self.latest) = Some(Arc::clone(&snapshot));
            tracing::info!(
                timestamp = snapshot.timestamp,
                processes = snapshot.processes.len(),
                "dashboard refreshed"
            );
            Ok::<_, RefreshError>(snapshot)
        }
        .instrument(span)
        .await
    }

    /// Step `delta_seconds` away from the latest loaded sample.
    pub async fn refresh_relative(
        &self,
        delta_seconds: i64,
    ) -> Result<Arc<NormalizedSnapshot>, RefreshError> {
        let base = self.last_timestamp().ok_or(RefreshError::NoSample)?;
        self.refresh(SampleRequest::at(base + delta_seconds)).await
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
