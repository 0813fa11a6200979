use std::collections::HashMap;
use std::sync::Arc;

use poolswap_chain::HtlcChain;
use poolswap_core::types::ChainId;
use poolswap_core::{NodeConfig, PoolswapError};
use poolswap_liquidity::LiquidityManager;
use poolswap_store::Store;

/// Everything the resolver workers share. Built once at startup.
pub struct ResolverCtx {
    pub config: Arc<NodeConfig>,
    pub store: Arc<Store>,
    pub liquidity: Arc<LiquidityManager>,
    chains: HashMap<ChainId, Arc<dyn HtlcChain>>,
}

impl ResolverCtx {
    pub fn new(
        config: Arc<NodeConfig>,
        store: Arc<Store>,
        liquidity: Arc<LiquidityManager>,
        chains: HashMap<ChainId, Arc<dyn HtlcChain>>,
    ) -> Self {
        Self { config, store, liquidity, chains }
    }

    pub fn chain(&self, chain_id: ChainId) -> Result<&Arc<dyn HtlcChain>, PoolswapError> {
        self.chains
            .get(&chain_id)
            .ok_or_else(|| PoolswapError::NotFound(format!("no adapter for chain {chain_id}")))
    }
}
