//! Session statistics

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Counters that only grow for the lifetime of a coordinator
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamingStats {
    pub messages_sent: u64,
    pub events_received: u64,
    pub tools_executed: u64,
    pub permissions_requested: u64,
    /// Replayed records skipped because their id was already processed
    pub duplicates_skipped: u64,
    pub connection_started_at: Option<DateTime<Utc>>,
    /// Sum of send-to-complete time over completed cycles
    pub total_processing_time_ms: u64,
}
