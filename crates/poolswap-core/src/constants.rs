//! ─── PoolSwap protocol constants ────────────────────────────────────────────
//!
//! Defaults only. Anything an operator may reasonably tune is overridable
//! through `NodeConfig`; these values are the fallbacks.

// ── Timelocks ────────────────────────────────────────────────────────────────

/// Minimum gap between the pool's destination timelock and the user's source
/// timelock. The pool must always be able to refund its destination HTLC and
/// still leave the user time to refund theirs.
pub const TIMELOCK_SAFETY_WINDOW_SECS: i64 = 30 * 60;

/// Source-side HTLC lifetime requested at quote time (user refund horizon).
pub const SOURCE_TIMELOCK_SECS: i64 = 2 * 3600;

/// Destination-side HTLC lifetime (pool refund horizon).
pub const DESTINATION_TIMELOCK_SECS: i64 = SOURCE_TIMELOCK_SECS - TIMELOCK_SAFETY_WINDOW_SECS;

/// How long a freshly created swap waits for source funding before expiring.
pub const SWAP_FUNDING_TTL_SECS: i64 = 3600;

// ── Quotes and fees ──────────────────────────────────────────────────────────

/// Quote validity window.
pub const QUOTE_TTL_SECS: i64 = 120;

/// Exchange fee in basis points (1% default).
pub const DEFAULT_EXCHANGE_FEE_BPS: u32 = 100;

pub const BPS_DENOMINATOR: u64 = 10_000;

// ── Chain adapter ────────────────────────────────────────────────────────────

/// Per-RPC deadline.
pub const RPC_TIMEOUT_SECS: u64 = 30;

/// Submission retry budget for one transaction.
pub const SUBMIT_MAX_ATTEMPTS: u32 = 5;

/// Exponential backoff: base 3s, factor 2, capped at 60s.
pub const SUBMIT_BACKOFF_BASE_SECS: u64 = 3;
pub const SUBMIT_BACKOFF_CAP_SECS: u64 = 60;

/// Fee bump applied on each resubmission attempt (+50%).
pub const FEE_BUMP_PERCENT: u64 = 50;

/// Confirmations required before a submission counts as final.
pub const DEFAULT_CONFIRMATIONS: u64 = 1;

/// Log polling cadence for chains without push subscriptions.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

// ── Store ────────────────────────────────────────────────────────────────────

/// Bounded retries on optimistic-concurrency version conflicts.
pub const CAS_MAX_RETRIES: u32 = 8;

// ── Resolver ─────────────────────────────────────────────────────────────────

/// Timeout sweeper wake interval.
pub const SWEEP_INTERVAL_SECS: u64 = 30;

/// Batch of SOURCE_LOCKED swaps pulled per destination-funder cycle.
pub const FUNDER_BATCH_SIZE: usize = 8;

/// Funding attempts per swap before it is marked FAILED and released.
pub const FUND_MAX_ATTEMPTS: u32 = 5;

// ── Relayer ──────────────────────────────────────────────────────────────────

/// Claims executed per relayer cycle.
pub const RELAYER_BATCH_SIZE: usize = 16;

/// Successful claims allowed per user in a rolling hour.
pub const MAX_USER_CLAIMS_PER_HOUR: usize = 10;

/// Successful claims allowed globally in a rolling hour.
pub const MAX_GLOBAL_CLAIMS_PER_HOUR: usize = 200;

/// A claim's deadline must be at least this far in the future at ingress.
pub const CLAIM_DEADLINE_MARGIN_SECS: i64 = 60;

// ── EIP-712 domain ───────────────────────────────────────────────────────────

/// Typed-data domain under which users sign claim authorizations. Fixed by
/// the deployed relayer contract.
pub const EIP712_DOMAIN_NAME: &str = "FusionGasRelayer";
pub const EIP712_DOMAIN_VERSION: &str = "1";
