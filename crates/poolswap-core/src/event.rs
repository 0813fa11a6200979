use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{SwapId, Timestamp};

/// Append-only observability record. One row per lifecycle step; the store
/// assigns `seq` per swap, which doubles as the SSE event id so clients can
/// resume a stream with `Last-Event-ID`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SwapEvent {
    pub swap_id: SwapId,
    /// Per-swap monotonically increasing sequence number, starting at 0.
    pub seq: u64,
    pub kind: EventKind,
    /// Free-shape JSON payload; the only place dynamic shape is tolerated,
    /// produced exclusively from typed values at the append site.
    pub data: serde_json::Value,
    pub timestamp: Timestamp,
}

/// Every event kind the coordinator emits, in per-swap order:
/// `swap_created` → `source_htlc_created` → `destination_htlc_created` →
/// `user_claimed` → `pool_claimed`, with `expired` / `refunded` /
/// `swap_failed` on the recovery paths. `emergency_stop` is appended to the
/// swap whose claim tripped the relayer's balance guard.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    SwapCreated,
    SourceHtlcCreated,
    DestinationHtlcCreated,
    UserClaimed,
    PoolClaimed,
    Refunded,
    Expired,
    SwapFailed,
    EmergencyStop,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::SwapCreated => "swap_created",
            EventKind::SourceHtlcCreated => "source_htlc_created",
            EventKind::DestinationHtlcCreated => "destination_htlc_created",
            EventKind::UserClaimed => "user_claimed",
            EventKind::PoolClaimed => "pool_claimed",
            EventKind::Refunded => "refunded",
            EventKind::Expired => "expired",
            EventKind::SwapFailed => "swap_failed",
            EventKind::EmergencyStop => "emergency_stop",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
