use std::sync::Arc;

use tracing::{debug, warn};

use poolswap_core::constants::CAS_MAX_RETRIES;
use poolswap_core::types::{Amount, Timestamp, TokenKey};
use poolswap_core::{LiquiditySnapshot, PoolLiquidity, PoolswapError};
use poolswap_store::Store;

/// Pool inventory accounting. One instance serves every `(chain, token)`
/// pair; serialization happens per pair through the store's version CAS, so
/// two swaps reserving different tokens never contend.
pub struct LiquidityManager {
    store: Arc<Store>,
}

impl LiquidityManager {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Read-modify-CAS with bounded retry. `op` sees the freshest row on each
    /// attempt; domain errors abort immediately, only version conflicts loop.
    fn mutate<F>(&self, token: &TokenKey, op_name: &str, op: F) -> Result<PoolLiquidity, PoolswapError>
    where
        F: Fn(&mut PoolLiquidity) -> Result<(), PoolswapError>,
    {
        for _ in 0..CAS_MAX_RETRIES {
            let mut row = self
                .store
                .get_liquidity(token)?
                .ok_or_else(|| PoolswapError::NotFound(format!("liquidity {token}")))?;
            op(&mut row)?;
            row.check_invariant()?;
            row.updated_at = now();

            match self.store.update_liquidity(&row) {
                Ok(updated) => {
                    debug!(
                        token = %token, op = op_name,
                        total = %updated.total, reserved = %updated.reserved,
                        available = %updated.available, "liquidity updated"
                    );
                    return Ok(updated);
                }
                Err(PoolswapError::VersionConflict(_)) => continue,
                Err(e) => return Err(e),
            }
        }
        warn!(token = %token, op = op_name, "liquidity CAS retries exhausted");
        Err(PoolswapError::VersionConflict(format!(
            "{op_name} on {token}: {CAS_MAX_RETRIES} attempts"
        )))
    }

    /// Add inventory: startup seeding and operator top-ups. Creates the row
    /// on first sight of the token.
    pub fn deposit(
        &self,
        token: TokenKey,
        amount: Amount,
        min_threshold: Amount,
    ) -> Result<PoolLiquidity, PoolswapError> {
        if self.store.get_liquidity(&token)?.is_none() {
            let mut fresh = PoolLiquidity::new(token, min_threshold, now());
            fresh.total = amount;
            fresh.available = amount;
            match self.store.insert_liquidity(&fresh) {
                Ok(()) => return Ok(fresh),
                // Lost the creation race; fall through to the CAS path.
                Err(PoolswapError::Validation(_)) => {}
                Err(e) => return Err(e),
            }
        }
        self.mutate(&token, "deposit", |row| {
            row.total += amount;
            row.available += amount;
            Ok(())
        })
    }

    /// Earmark `amount` for an in-flight swap.
    ///
    /// Fails with `InsufficientLiquidity` when `available < amount`, or
    /// `UnhealthyLiquidity` when the reservation would push `available`
    /// below the token's threshold.
    pub fn reserve(&self, token: TokenKey, amount: Amount) -> Result<(), PoolswapError> {
        self.mutate(&token, "reserve", |row| {
            let remaining = row.available.checked_sub(amount).ok_or(
                PoolswapError::InsufficientLiquidity {
                    token,
                    requested: amount,
                    available: row.available,
                },
            )?;
            if remaining < row.min_threshold {
                return Err(PoolswapError::UnhealthyLiquidity { token });
            }
            row.available = remaining;
            row.reserved += amount;
            Ok(())
        })?;
        Ok(())
    }

    /// Finalize a reservation after the destination HTLC is funded: the
    /// tokens have left the pool wallet.
    pub fn commit(&self, token: TokenKey, amount: Amount) -> Result<(), PoolswapError> {
        self.mutate(&token, "commit", |row| {
            row.reserved = sub_or_corrupt(row.reserved, amount, "reserved", &token)?;
            row.total = sub_or_corrupt(row.total, amount, "total", &token)?;
            Ok(())
        })?;
        Ok(())
    }

    /// Cancel a reservation (swap expired or aborted before the pool funded).
    pub fn release(&self, token: TokenKey, amount: Amount) -> Result<(), PoolswapError> {
        self.mutate(&token, "release", |row| {
            row.reserved = sub_or_corrupt(row.reserved, amount, "reserved", &token)?;
            row.available += amount;
            Ok(())
        })?;
        Ok(())
    }

    /// The pool refunded its destination HTLC after the user failed to claim:
    /// the tokens are back in the wallet.
    pub fn refund_in(&self, token: TokenKey, amount: Amount) -> Result<(), PoolswapError> {
        self.mutate(&token, "refund_in", |row| {
            row.total += amount;
            row.available += amount;
            Ok(())
        })?;
        Ok(())
    }

    pub fn snapshot(&self, token: &TokenKey) -> Result<LiquiditySnapshot, PoolswapError> {
        let row = self
            .store
            .get_liquidity(token)?
            .ok_or_else(|| PoolswapError::NotFound(format!("liquidity {token}")))?;
        Ok(LiquiditySnapshot::from(&row))
    }

    pub fn snapshots(&self) -> Result<Vec<LiquiditySnapshot>, PoolswapError> {
        Ok(self
            .store
            .list_liquidity()?
            .iter()
            .map(LiquiditySnapshot::from)
            .collect())
    }
}

/// Commit/release amounts always originate from a reservation this manager
/// granted, so underflow here is corruption, not caller error.
fn sub_or_corrupt(
    lhs: Amount,
    rhs: Amount,
    field: &str,
    token: &TokenKey,
) -> Result<Amount, PoolswapError> {
    lhs.checked_sub(rhs).ok_or_else(|| {
        PoolswapError::InvariantViolation(format!(
            "{token}: {field} underflow ({lhs} - {rhs})"
        ))
    })
}

fn now() -> Timestamp {
    chrono::Utc::now().timestamp()
}
