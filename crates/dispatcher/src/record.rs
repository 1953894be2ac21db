//! Serialized pair metadata
//!
//! What file and network sinks emit per pair. Pixel payloads stay in
//! process; only timing and shape travel.

use contracts::{SyncQuality, SynchronizedPair};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairRecord {
    pub pair_id: u64,
    pub front_sequence: u64,
    pub back_sequence: u64,
    pub front_timestamp: f64,
    pub back_timestamp: f64,
    pub time_difference_ms: f64,
    pub compensated_difference_ms: f64,
    pub quality: SyncQuality,
    pub presentation_timestamp: f64,
    pub created_at: f64,
    pub width: u32,
    pub height: u32,
}

impl From<&SynchronizedPair> for PairRecord {
    fn from(pair: &SynchronizedPair) -> Self {
        Self {
            pair_id: pair.pair_id,
            front_sequence: pair.front.sequence,
            back_sequence: pair.back.sequence,
            front_timestamp: pair.front.timestamp,
            back_timestamp: pair.back.timestamp,
            time_difference_ms: pair.time_difference * 1000.0,
            compensated_difference_ms: pair.compensated_difference * 1000.0,
            quality: pair.quality,
            presentation_timestamp: pair.presentation_timestamp,
            created_at: pair.created_at,
            width: pair.front.payload.width,
            height: pair.front.payload.height,
        }
    }
}
