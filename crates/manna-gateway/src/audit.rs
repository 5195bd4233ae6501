//! Generation attempt audit trail
//!
//! Every provider attempt (success or failure) is written to an [`AttemptSink`]
//! the moment it completes. Sink write failures are swallowed by the caller so
//! that audit logging can never abort a generation in flight.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;

/// One logged outcome of a single provider invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub timestamp: DateTime<Utc>,
    pub provider: String,
    pub prompt: String,
    pub latency_ms: u64,
    #[serde(flatten)]
    pub outcome: AttemptOutcome,
}

/// How the attempt ended
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum AttemptOutcome {
    Success { response: String },
    Failure { error: String },
}

impl AttemptRecord {
    pub fn success(
        provider: impl Into<String>,
        prompt: impl Into<String>,
        response: impl Into<String>,
        latency_ms: u64,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            provider: provider.into(),
            prompt: prompt.into(),
            latency_ms,
            outcome: AttemptOutcome::Success {
                response: response.into(),
            },
        }
    }

    pub fn failure(
        provider: impl Into<String>,
        prompt: impl Into<String>,
        error: impl Into<String>,
        latency_ms: u64,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            provider: provider.into(),
            prompt: prompt.into(),
            latency_ms,
            outcome: AttemptOutcome::Failure {
                error: error.into(),
            },
        }
    }

    /// Whether the attempt succeeded
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, AttemptOutcome::Success { .. })
    }
}

/// Append-only store for attempt records.
///
/// Implementations must tolerate concurrent writes from parallel requests.
#[async_trait]
pub trait AttemptSink: Send + Sync {
    async fn record(&self, attempt: &AttemptRecord) -> Result<()>;
}

/// Sink that discards every record (the default)
pub struct NullSink;

#[async_trait]
impl AttemptSink for NullSink {
    async fn record(&self, _attempt: &AttemptRecord) -> Result<()> {
        Ok(())
    }
}

/// Sink that appends one JSON object per line to a local file
pub struct JsonlSink {
    path: PathBuf,
}

impl JsonlSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl AttemptSink for JsonlSink {
    async fn record(&self, attempt: &AttemptRecord) -> Result<()> {
        let mut line = serde_json::to_string(attempt)?;
        line.push('\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        Ok(())
    }
}
