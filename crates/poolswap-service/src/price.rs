use std::sync::Arc;

use alloy_primitives::U256;

use poolswap_core::types::TokenKey;
use poolswap_core::{NodeConfig, PoolswapError};

/// Where exchange rates come from. Oracles are out of scope; the seam exists
/// so a real feed can replace the configured table without touching quoting.
pub trait PriceSource: Send + Sync {
    /// Source→target rate scaled by 1e18, or `NotFound` for unsupported pairs.
    fn rate_wad(&self, from: &TokenKey, to: &TokenKey) -> Result<U256, PoolswapError>;
}

/// Rates read from `NodeConfig.rates`, fixed for the process lifetime.
pub struct FixedRates {
    config: Arc<NodeConfig>,
}

impl FixedRates {
    pub fn new(config: Arc<NodeConfig>) -> Self {
        Self { config }
    }
}

impl PriceSource for FixedRates {
    fn rate_wad(&self, from: &TokenKey, to: &TokenKey) -> Result<U256, PoolswapError> {
        self.config
            .rate(from, to)
            .map(|r| r.rate_wad)
            .ok_or_else(|| PoolswapError::NotFound(format!("no rate for {from} -> {to}")))
    }
}
