use serde::{Deserialize, Serialize};

use crate::constants::{
    CLAIM_DEADLINE_MARGIN_SECS, DEFAULT_CONFIRMATIONS, DEFAULT_EXCHANGE_FEE_BPS,
    DEFAULT_POLL_INTERVAL_SECS, DESTINATION_TIMELOCK_SECS, MAX_GLOBAL_CLAIMS_PER_HOUR,
    MAX_USER_CLAIMS_PER_HOUR, QUOTE_TTL_SECS, RELAYER_BATCH_SIZE, SOURCE_TIMELOCK_SECS,
    SWAP_FUNDING_TTL_SECS, SWEEP_INTERVAL_SECS, TIMELOCK_SAFETY_WINDOW_SECS,
};
use crate::types::{Address, Amount, ChainId, TokenKey, U256};

/// Top-level node configuration, deserialized once at startup and passed by
/// reference into every component constructor. There is no other source of
/// operational truth: chain ids, contract addresses, thresholds and policy
/// knobs all live here.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeConfig {
    pub chains: Vec<ChainConfig>,
    pub tokens: Vec<TokenConfig>,
    /// Fixed exchange rates consulted by the quote engine.
    pub rates: Vec<RateConfig>,
    #[serde(default)]
    pub fees: FeeConfig,
    #[serde(default)]
    pub timelocks: TimelockConfig,
    #[serde(default)]
    pub relayer: RelayerConfig,
    #[serde(default)]
    pub resolver: ResolverConfig,
    /// Quote validity window in seconds.
    #[serde(default = "default_quote_ttl")]
    pub quote_ttl_secs: i64,
}

fn default_quote_ttl() -> i64 {
    QUOTE_TTL_SECS
}

impl NodeConfig {
    pub fn chain(&self, chain_id: ChainId) -> Option<&ChainConfig> {
        self.chains.iter().find(|c| c.chain_id == chain_id)
    }

    pub fn token(&self, key: &TokenKey) -> Option<&TokenConfig> {
        self.tokens
            .iter()
            .find(|t| t.chain_id == key.chain_id && t.token == key.token)
    }

    pub fn rate(&self, from: &TokenKey, to: &TokenKey) -> Option<&RateConfig> {
        self.rates.iter().find(|r| {
            r.from_chain == from.chain_id
                && r.from_token == from.token
                && r.to_chain == to.chain_id
                && r.to_token == to.token
        })
    }
}

/// One supported chain. The `chain_id` given here is canonical — conflicting
/// values published elsewhere are ignored.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChainConfig {
    pub name: String,
    pub chain_id: ChainId,
    pub rpc_url: String,
    /// Deployed HTLC contract.
    pub htlc_contract: Address,
    /// Verifying contract of the claim typed-data domain (the gas relayer).
    pub relayer_contract: Address,
    #[serde(default = "default_confirmations")]
    pub confirmations: u64,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// Relayer wallet balance (wei) below which claim execution pauses.
    #[serde(default)]
    pub emergency_threshold: Amount,
}

fn default_confirmations() -> u64 {
    DEFAULT_CONFIRMATIONS
}

fn default_poll_interval() -> u64 {
    DEFAULT_POLL_INTERVAL_SECS
}

/// One supported token on one chain, with the liquidity the pool seeds at
/// first boot.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TokenConfig {
    pub chain_id: ChainId,
    pub token: Address,
    pub symbol: String,
    pub decimals: u8,
    /// Deposited into the pool the first time this token is seen.
    #[serde(default)]
    pub initial_liquidity: Amount,
    /// `available` below this flags the token unhealthy.
    #[serde(default)]
    pub min_threshold: Amount,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

impl TokenConfig {
    pub fn key(&self) -> TokenKey {
        TokenKey::new(self.chain_id, self.token)
    }
}

/// A fixed source→target exchange rate, scaled by 1e18: an input of `x`
/// source units yields `x * rate_wad / 1e18` target units before fees.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RateConfig {
    pub from_chain: ChainId,
    pub from_token: Address,
    pub to_chain: ChainId,
    pub to_token: Address,
    pub rate_wad: U256,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FeeConfig {
    /// Exchange fee in basis points of the converted amount.
    pub exchange_fee_bps: u32,
    /// Flat network fee, in target-token units.
    pub network_fee: Amount,
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self {
            exchange_fee_bps: DEFAULT_EXCHANGE_FEE_BPS,
            network_fee: U256::ZERO,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TimelockConfig {
    /// Required gap Δ between destination and source timelocks.
    pub safety_window_secs: i64,
    /// Source HTLC lifetime the quote asks the user to set.
    pub source_timelock_secs: i64,
    /// Destination HTLC lifetime the resolver sets.
    pub destination_timelock_secs: i64,
    /// How long a PENDING swap waits for source funding.
    pub funding_ttl_secs: i64,
}

impl Default for TimelockConfig {
    fn default() -> Self {
        Self {
            safety_window_secs: TIMELOCK_SAFETY_WINDOW_SECS,
            source_timelock_secs: SOURCE_TIMELOCK_SECS,
            destination_timelock_secs: DESTINATION_TIMELOCK_SECS,
            funding_ttl_secs: SWAP_FUNDING_TTL_SECS,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RelayerConfig {
    pub batch_size: usize,
    pub max_user_claims_per_hour: usize,
    pub max_global_claims_per_hour: usize,
    pub deadline_margin_secs: i64,
}

impl Default for RelayerConfig {
    fn default() -> Self {
        Self {
            batch_size: RELAYER_BATCH_SIZE,
            max_user_claims_per_hour: MAX_USER_CLAIMS_PER_HOUR,
            max_global_claims_per_hour: MAX_GLOBAL_CLAIMS_PER_HOUR,
            deadline_margin_secs: CLAIM_DEADLINE_MARGIN_SECS,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResolverConfig {
    pub sweep_interval_secs: u64,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: SWEEP_INTERVAL_SECS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_parses_with_defaults() {
        let json = r#"{
            "chains": [{
                "name": "devnet-a",
                "chain_id": 31337,
                "rpc_url": "http://127.0.0.1:8545",
                "htlc_contract": "0x00000000000000000000000000000000000000aa",
                "relayer_contract": "0x00000000000000000000000000000000000000bb"
            }],
            "tokens": [],
            "rates": []
        }"#;
        let cfg: NodeConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.quote_ttl_secs, QUOTE_TTL_SECS);
        assert_eq!(cfg.chains[0].confirmations, DEFAULT_CONFIRMATIONS);
        assert_eq!(cfg.fees.exchange_fee_bps, DEFAULT_EXCHANGE_FEE_BPS);
        assert_eq!(
            cfg.timelocks.safety_window_secs,
            TIMELOCK_SAFETY_WINDOW_SECS
        );
        assert!(cfg.chain(31337).is_some());
        assert!(cfg.chain(1).is_none());
    }
}
