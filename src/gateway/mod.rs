// Venue gateway: remote round data behind a trait seam so the scheduler
// and tests can run against scripted implementations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod bdg;

pub use bdg::Bdg;

/// One settled round as reported by the venue, newest first in list order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundRecord {
    pub issue: u64,
    /// Drawn number, validated into 0-9 at ingress.
    pub number: u8,
    pub colour: String,
    pub premium: f64,
}

/// Timing metadata for the currently open round.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoundMetadata {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// The venue's own clock at response time.
    pub service_time: DateTime<Utc>,
    pub interval_minutes: u32,
}

/// Failure of a single gateway call. Any variant degrades the refresh
/// cycle that issued the call; none is fatal to the process.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("transport: {0}")]
    Transport(String),
    #[error("venue returned HTTP {0}")]
    Status(u16),
    #[error("schema: {0}")]
    Schema(String),
}

#[async_trait]
pub trait Gateway: Send + Sync {
    /// Most recent settled rounds, newest first.
    async fn fetch_recent_outcomes(
        &self,
        page_size: u32,
        page_no: u32,
    ) -> Result<Vec<RoundRecord>, FetchError>;

    /// Timing metadata for the round currently open for play.
    async fn fetch_round_metadata(&self) -> Result<RoundMetadata, FetchError>;
}
