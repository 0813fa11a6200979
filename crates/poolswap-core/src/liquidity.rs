use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::BPS_DENOMINATOR;
use crate::error::PoolswapError;
use crate::types::{Amount, Timestamp, TokenKey, U256};

// ── Health ───────────────────────────────────────────────────────────────────

/// Liquidity health per token. `Unhealthy` tokens refuse new reservations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenHealth {
    Healthy,
    Unhealthy,
}

impl fmt::Display for TokenHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenHealth::Healthy => write!(f, "healthy"),
            TokenHealth::Unhealthy => write!(f, "unhealthy"),
        }
    }
}

// ── PoolLiquidity ────────────────────────────────────────────────────────────

/// Pool inventory for one `(chain, token)` pair.
///
/// Invariant, checked before every persist: `total == reserved + available`,
/// all three non-negative (guaranteed structurally by `U256`, but subtraction
/// underflow is rejected rather than wrapped).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PoolLiquidity {
    pub token: TokenKey,
    pub total: Amount,
    pub reserved: Amount,
    pub available: Amount,
    /// Below this `available` level the token is flagged unhealthy and new
    /// reservations fail.
    pub min_threshold: Amount,
    pub updated_at: Timestamp,
    pub version: u64,
}

impl PoolLiquidity {
    pub fn new(token: TokenKey, min_threshold: Amount, now: Timestamp) -> Self {
        Self {
            token,
            total: U256::ZERO,
            reserved: U256::ZERO,
            available: U256::ZERO,
            min_threshold,
            updated_at: now,
            version: 0,
        }
    }

    pub fn health(&self) -> TokenHealth {
        if self.available < self.min_threshold {
            TokenHealth::Unhealthy
        } else {
            TokenHealth::Healthy
        }
    }

    /// reserved / total in basis points; 0 for an empty pool.
    pub fn utilization_bps(&self) -> u64 {
        if self.total.is_zero() {
            return 0;
        }
        let bps = self.reserved * U256::from(BPS_DENOMINATOR) / self.total;
        // total >= reserved, so this always fits.
        bps.to::<u64>()
    }

    /// Check the accounting identity. Returns `InvariantViolation` on breach;
    /// callers refuse to persist (and stop processing) when this fails.
    pub fn check_invariant(&self) -> Result<(), PoolswapError> {
        if self.reserved + self.available != self.total {
            return Err(PoolswapError::InvariantViolation(format!(
                "{}: total {} != reserved {} + available {}",
                self.token, self.total, self.reserved, self.available
            )));
        }
        Ok(())
    }
}

/// Read-only snapshot returned by the liquidity manager and the HTTP API.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LiquiditySnapshot {
    pub token: TokenKey,
    pub total: Amount,
    pub reserved: Amount,
    pub available: Amount,
    pub utilization_bps: u64,
    pub health: TokenHealth,
}

impl From<&PoolLiquidity> for LiquiditySnapshot {
    fn from(p: &PoolLiquidity) -> Self {
        Self {
            token: p.token,
            total: p.total,
            reserved: p.reserved,
            available: p.available,
            utilization_bps: p.utilization_bps(),
            health: p.health(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Address;

    fn pool(total: u64, reserved: u64, threshold: u64) -> PoolLiquidity {
        let mut p = PoolLiquidity::new(
            TokenKey::new(1, Address::ZERO),
            U256::from(threshold),
            0,
        );
        p.total = U256::from(total);
        p.reserved = U256::from(reserved);
        p.available = U256::from(total - reserved);
        p
    }

    #[test]
    fn invariant_holds_for_consistent_pool() {
        pool(100, 30, 10).check_invariant().unwrap();
    }

    #[test]
    fn invariant_detects_corruption() {
        let mut p = pool(100, 30, 10);
        p.available = U256::from(99);
        assert!(matches!(
            p.check_invariant(),
            Err(PoolswapError::InvariantViolation(_))
        ));
    }

    #[test]
    fn utilization_in_basis_points() {
        assert_eq!(pool(100, 30, 0).utilization_bps(), 3000);
        assert_eq!(pool(100, 0, 0).utilization_bps(), 0);
        let empty = PoolLiquidity::new(TokenKey::new(1, Address::ZERO), U256::ZERO, 0);
        assert_eq!(empty.utilization_bps(), 0);
    }

    #[test]
    fn health_flips_below_threshold() {
        assert_eq!(pool(100, 30, 50).health(), TokenHealth::Healthy);
        assert_eq!(pool(100, 60, 50).health(), TokenHealth::Unhealthy);
    }
}
