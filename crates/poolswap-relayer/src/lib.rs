//! poolswap-relayer
//!
//! The meta-transaction relayer: verifies signed claim authorizations at
//! ingress, enforces nonce/deadline/rate/gas policy, and executes the
//! on-chain source claim that reveals the preimage — gas paid by the relayer
//! wallet so the user never needs any.
//!
//! One relayer processes all chains, but every submission is serialized
//! through the owning chain adapter's single-writer, preserving wallet nonce
//! order. An emergency-stop guard pauses execution when the wallet balance
//! falls below the configured threshold; in-flight confirmations still land.

pub mod executor;
pub mod ingress;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use poolswap_chain::HtlcChain;
use poolswap_core::types::ChainId;
use poolswap_core::{NodeConfig, PoolswapError};
use poolswap_store::Store;

pub use ingress::ClaimPayload;

/// Queue-driven claim processor. Construct once, share via `Arc`: the HTTP
/// layer calls [`Relayer::submit_claim`], the background task runs
/// [`Relayer::run`], operators flip [`Relayer::pause`]/[`Relayer::resume`].
pub struct Relayer {
    config: Arc<NodeConfig>,
    store: Arc<Store>,
    chains: HashMap<ChainId, Arc<dyn HtlcChain>>,
    paused: AtomicBool,
}

impl Relayer {
    pub fn new(
        config: Arc<NodeConfig>,
        store: Arc<Store>,
        chains: HashMap<ChainId, Arc<dyn HtlcChain>>,
    ) -> Self {
        Self { config, store, chains, paused: AtomicBool::new(false) }
    }

    pub(crate) fn chain(&self, chain_id: ChainId) -> Result<&Arc<dyn HtlcChain>, PoolswapError> {
        self.chains
            .get(&chain_id)
            .ok_or_else(|| PoolswapError::NotFound(format!("no adapter for chain {chain_id}")))
    }

    /// Stop starting new submissions. In-flight claims complete.
    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    /// Resume processing from the same queue, nothing lost.
    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }
}
