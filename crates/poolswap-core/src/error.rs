use thiserror::Error;

use crate::types::{Amount, TokenKey};

/// Error taxonomy shared by every crate in the workspace.
///
/// The variants mirror how errors propagate: validation and liquidity errors
/// go back to the caller untouched, transient chain faults are retried inside
/// the adapter and never escape a successful retry, reverts and invariant
/// violations bubble up to whichever component owns the swap.
#[derive(Debug, Error)]
pub enum PoolswapError {
    // ── Caller errors ────────────────────────────────────────────────────────
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("insufficient liquidity for {token}: requested {requested}, available {available}")]
    InsufficientLiquidity {
        token: TokenKey,
        requested: Amount,
        available: Amount,
    },

    #[error("liquidity for {token} is below its health threshold")]
    UnhealthyLiquidity { token: TokenKey },

    #[error("not found: {0}")]
    NotFound(String),

    // ── Swap lifecycle ───────────────────────────────────────────────────────
    #[error("invalid swap transition: {from} on {event}")]
    InvalidTransition { from: String, event: String },

    #[error("quote expired")]
    QuoteExpired,

    #[error("timelock window too short: destination {destination} must precede source {source_timelock} by at least {safety_window}s")]
    TimelockWindowTooShort {
        destination: i64,
        source_timelock: i64,
        safety_window: i64,
    },

    // ── Chain errors ─────────────────────────────────────────────────────────
    /// RPC timeouts, rate limits, nonce races, replacement-underpriced.
    /// Retried with backoff inside the adapter; surfaced only after the retry
    /// budget is exhausted.
    #[error("transient chain error: {0}")]
    ChainTransient(String),

    /// Deterministic contract revert. Never retried.
    #[error("chain reverted: {0}")]
    ChainReverted(String),

    // ── Concurrency / persistence ────────────────────────────────────────────
    /// Optimistic-concurrency conflict: the row's version moved underneath us.
    #[error("version conflict on {0}")]
    VersionConflict(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    // ── Fatal ────────────────────────────────────────────────────────────────
    /// Data corruption (e.g. `total != reserved + available`). The owning
    /// component stops processing and an operator must intervene.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// Relayer wallet balance fell below the configured threshold.
    #[error("emergency stop: relayer balance below threshold")]
    EmergencyStop,

    #[error("{0}")]
    Other(String),
}

impl PoolswapError {
    /// True for faults the caller may retry verbatim after a delay.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PoolswapError::ChainTransient(_) | PoolswapError::VersionConflict(_)
        )
    }

    /// Categorical string exposed to API clients. Internal detail stays in logs.
    pub fn category(&self) -> &'static str {
        match self {
            PoolswapError::Validation(_) => "validation_error",
            PoolswapError::InsufficientLiquidity { .. } => "insufficient_liquidity",
            PoolswapError::UnhealthyLiquidity { .. } => "unhealthy_liquidity",
            PoolswapError::NotFound(_) => "not_found",
            PoolswapError::InvalidTransition { .. } => "invalid_transition",
            PoolswapError::QuoteExpired => "quote_expired",
            PoolswapError::TimelockWindowTooShort { .. } => "timelock_window_too_short",
            PoolswapError::ChainTransient(_) => "chain_transient",
            PoolswapError::ChainReverted(_) => "chain_reverted",
            PoolswapError::VersionConflict(_) => "version_conflict",
            PoolswapError::Storage(_) => "storage_error",
            PoolswapError::Serialization(_) => "serialization_error",
            PoolswapError::InvariantViolation(_) => "invariant_violation",
            PoolswapError::EmergencyStop => "emergency_stop",
            PoolswapError::Other(_) => "internal_error",
        }
    }
}
