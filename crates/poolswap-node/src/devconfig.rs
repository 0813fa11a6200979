//! Built-in configuration for `--mock-chains`: two in-memory devnets, one
//! token pair at a 1:1 rate, 1% exchange fee, 100 units of destination
//! liquidity. Local development and the smoke test only.

use alloy_primitives::{Address, U256};

use poolswap_core::{
    ChainConfig, FeeConfig, NodeConfig, RateConfig, TokenConfig,
};

pub const DEV_CHAIN_A: u64 = 31337;
pub const DEV_CHAIN_B: u64 = 31338;

pub fn dev_token_a() -> Address {
    Address::repeat_byte(0xa0)
}

pub fn dev_token_b() -> Address {
    Address::repeat_byte(0xb0)
}

pub fn dev_config() -> NodeConfig {
    NodeConfig {
        chains: vec![
            ChainConfig {
                name: "devnet-a".into(),
                chain_id: DEV_CHAIN_A,
                rpc_url: "mock".into(),
                htlc_contract: Address::repeat_byte(0x0a),
                relayer_contract: Address::repeat_byte(0x0b),
                confirmations: 1,
                poll_interval_secs: 1,
                emergency_threshold: U256::ZERO,
            },
            ChainConfig {
                name: "devnet-b".into(),
                chain_id: DEV_CHAIN_B,
                rpc_url: "mock".into(),
                htlc_contract: Address::repeat_byte(0x0c),
                relayer_contract: Address::repeat_byte(0x0d),
                confirmations: 1,
                poll_interval_secs: 1,
                emergency_threshold: U256::ZERO,
            },
        ],
        tokens: vec![
            TokenConfig {
                chain_id: DEV_CHAIN_A,
                token: dev_token_a(),
                symbol: "TKA".into(),
                decimals: 6,
                initial_liquidity: U256::from(100_000_000u64),
                min_threshold: U256::ZERO,
                enabled: true,
            },
            TokenConfig {
                chain_id: DEV_CHAIN_B,
                token: dev_token_b(),
                symbol: "TKB".into(),
                decimals: 6,
                initial_liquidity: U256::from(100_000_000u64),
                min_threshold: U256::ZERO,
                enabled: true,
            },
        ],
        rates: vec![
            RateConfig {
                from_chain: DEV_CHAIN_A,
                from_token: dev_token_a(),
                to_chain: DEV_CHAIN_B,
                to_token: dev_token_b(),
                rate_wad: U256::from(1_000_000_000_000_000_000u64),
            },
            RateConfig {
                from_chain: DEV_CHAIN_B,
                from_token: dev_token_b(),
                to_chain: DEV_CHAIN_A,
                to_token: dev_token_a(),
                rate_wad: U256::from(1_000_000_000_000_000_000u64),
            },
        ],
        fees: FeeConfig {
            exchange_fee_bps: 100,
            network_fee: U256::ZERO,
        },
        timelocks: Default::default(),
        relayer: Default::default(),
        resolver: Default::default(),
        quote_ttl_secs: 120,
    }
}
