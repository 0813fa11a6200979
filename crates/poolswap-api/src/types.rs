use serde::{Deserialize, Serialize};

use poolswap_core::types::{Address, Amount, ChainId, Timestamp, U256};
use poolswap_core::{
    ClaimRequest, LiquiditySnapshot, PoolswapError, Swap, SwapEvent, SwapState,
};
use poolswap_service::{Quote, QuoteRequest};

fn parse_address(s: &str, field: &str) -> Result<Address, PoolswapError> {
    s.parse::<Address>()
        .map_err(|_| PoolswapError::Validation(format!("invalid address in {field}")))
}

fn parse_amount(s: &str, field: &str) -> Result<Amount, PoolswapError> {
    s.parse::<U256>()
        .map_err(|_| PoolswapError::Validation(format!("invalid amount in {field}")))
}

// ── Quotes ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ApiQuoteRequest {
    pub source_chain: ChainId,
    pub source_token: String,
    /// Decimal string in the token's smallest unit.
    pub amount: String,
    pub target_chain: ChainId,
    pub target_token: String,
    pub min_receive_amount: Option<String>,
}

impl ApiQuoteRequest {
    pub fn into_domain(self) -> Result<QuoteRequest, PoolswapError> {
        Ok(QuoteRequest {
            source_chain: self.source_chain,
            source_token: parse_address(&self.source_token, "source_token")?,
            amount: parse_amount(&self.amount, "amount")?,
            target_chain: self.target_chain,
            target_token: parse_address(&self.target_token, "target_token")?,
            min_receive_amount: self
                .min_receive_amount
                .as_deref()
                .map(|s| parse_amount(s, "min_receive_amount"))
                .transpose()?
                .unwrap_or(U256::ZERO),
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiQuote {
    pub source_chain: ChainId,
    pub source_token: String,
    pub amount: String,
    pub target_chain: ChainId,
    pub target_token: String,
    pub expected_amount: String,
    pub min_receive_amount: String,
    pub network_fee: String,
    pub exchange_fee: String,
    pub rate_wad: String,
    pub created_at: Timestamp,
    pub expires_at: Timestamp,
}

impl From<Quote> for ApiQuote {
    fn from(q: Quote) -> Self {
        Self {
            source_chain: q.source_chain,
            source_token: format!("{}", q.source_token),
            amount: q.amount.to_string(),
            target_chain: q.target_chain,
            target_token: format!("{}", q.target_token),
            expected_amount: q.expected_amount.to_string(),
            min_receive_amount: q.min_receive_amount.to_string(),
            network_fee: q.network_fee.to_string(),
            exchange_fee: q.exchange_fee.to_string(),
            rate_wad: q.rate_wad.to_string(),
            created_at: q.created_at,
            expires_at: q.expires_at,
        }
    }
}

impl ApiQuote {
    pub fn into_domain(self) -> Result<Quote, PoolswapError> {
        Ok(Quote {
            source_chain: self.source_chain,
            source_token: parse_address(&self.source_token, "source_token")?,
            amount: parse_amount(&self.amount, "amount")?,
            target_chain: self.target_chain,
            target_token: parse_address(&self.target_token, "target_token")?,
            expected_amount: parse_amount(&self.expected_amount, "expected_amount")?,
            min_receive_amount: parse_amount(&self.min_receive_amount, "min_receive_amount")?,
            network_fee: parse_amount(&self.network_fee, "network_fee")?,
            exchange_fee: parse_amount(&self.exchange_fee, "exchange_fee")?,
            rate_wad: parse_amount(&self.rate_wad, "rate_wad")?,
            created_at: self.created_at,
            expires_at: self.expires_at,
        })
    }
}

// ── Swaps ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ApiCreateSwap {
    pub user_address: String,
    /// Defaults to `user_address` when omitted.
    pub beneficiary_address: Option<String>,
    pub quote: ApiQuote,
}

#[derive(Debug, Serialize)]
pub struct ApiSwap {
    pub id: String,
    pub state: String,
    pub user_address: String,
    pub beneficiary_address: String,
    pub source_chain: ChainId,
    pub source_token: String,
    pub source_amount: String,
    pub target_chain: ChainId,
    pub target_token: String,
    pub expected_amount: String,
    pub min_receive_amount: String,
    pub hash_lock: String,
    /// Present only once the pool has fulfilled: the user needs it to sign
    /// the relayed claim. Before that it stays server-side.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preimage: Option<String>,
    pub user_htlc_id: Option<String>,
    pub pool_htlc_id: Option<String>,
    pub source_timelock: Timestamp,
    pub destination_timelock: Timestamp,
    pub created_at: Timestamp,
    pub expires_at: Timestamp,
    pub source_funded_at: Option<Timestamp>,
    pub destination_funded_at: Option<Timestamp>,
    pub user_claimed_at: Option<Timestamp>,
    pub pool_claimed_at: Option<Timestamp>,
    pub network_fee: String,
    pub exchange_fee: String,
    pub error_message: Option<String>,
}

impl From<&Swap> for ApiSwap {
    fn from(s: &Swap) -> Self {
        let preimage = match s.state {
            SwapState::PoolFulfilled | SwapState::UserClaimed => {
                s.preimage.map(|p| p.to_hex())
            }
            _ => None,
        };
        Self {
            id: s.id.to_string(),
            state: s.state.as_str().to_string(),
            user_address: format!("{}", s.user_address),
            beneficiary_address: format!("{}", s.beneficiary_address),
            source_chain: s.source.chain_id,
            source_token: format!("{}", s.source.token),
            source_amount: s.source.amount.to_string(),
            target_chain: s.target.chain_id,
            target_token: format!("{}", s.target.token),
            expected_amount: s.target.expected_amount.to_string(),
            min_receive_amount: s.target.min_receive_amount.to_string(),
            hash_lock: s.hash_lock.to_hex(),
            preimage,
            user_htlc_id: s.user_htlc_id.map(|c| c.to_hex()),
            pool_htlc_id: s.pool_htlc_id.map(|c| c.to_hex()),
            source_timelock: s.source_timelock,
            destination_timelock: s.destination_timelock,
            created_at: s.created_at,
            expires_at: s.expires_at,
            source_funded_at: s.source_funded_at,
            destination_funded_at: s.destination_funded_at,
            user_claimed_at: s.user_claimed_at,
            pool_claimed_at: s.pool_claimed_at,
            network_fee: s.fees.network_fee.to_string(),
            exchange_fee: s.fees.exchange_fee.to_string(),
            error_message: s.error_message.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SwapFilters {
    pub status: Option<String>,
    pub user_address: Option<String>,
    pub chain: Option<ChainId>,
}

// ── Events ───────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct ApiEvent {
    pub seq: u64,
    pub kind: String,
    pub data: serde_json::Value,
    pub timestamp: Timestamp,
}

impl From<&SwapEvent> for ApiEvent {
    fn from(e: &SwapEvent) -> Self {
        Self {
            seq: e.seq,
            kind: e.kind.as_str().to_string(),
            data: e.data.clone(),
            timestamp: e.timestamp,
        }
    }
}

// ── Claims ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ApiClaimRequest {
    pub swap_id: String,
    pub htlc_contract: String,
    pub contract_id: String,
    pub preimage: String,
    pub claimer: String,
    pub max_gas_price: String,
    pub gas_compensation: String,
    pub nonce: u64,
    pub deadline: Timestamp,
    /// Hex-encoded 65-byte signature.
    pub signature: String,
}

impl ApiClaimRequest {
    pub fn into_payload(self) -> Result<poolswap_relayer::ClaimPayload, PoolswapError> {
        use poolswap_core::types::{ContractId, Preimage, SwapId};
        let signature = {
            let stripped = self.signature.strip_prefix("0x").unwrap_or(&self.signature);
            hex::decode(stripped)
                .map_err(|_| PoolswapError::Validation("invalid signature hex".into()))?
        };
        Ok(poolswap_relayer::ClaimPayload {
            swap_id: SwapId::parse(&self.swap_id)
                .map_err(|_| PoolswapError::Validation("invalid swap_id".into()))?,
            htlc_contract: parse_address(&self.htlc_contract, "htlc_contract")?,
            contract_id: ContractId::from_hex(&self.contract_id)
                .map_err(|_| PoolswapError::Validation("invalid contract_id".into()))?,
            preimage: Preimage::from_hex(&self.preimage)
                .map_err(|_| PoolswapError::Validation("invalid preimage".into()))?,
            claimer: parse_address(&self.claimer, "claimer")?,
            max_gas_price: parse_amount(&self.max_gas_price, "max_gas_price")?,
            gas_compensation: parse_amount(&self.gas_compensation, "gas_compensation")?,
            nonce: self.nonce,
            deadline: self.deadline,
            signature,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct ApiClaim {
    pub claim_id: String,
    pub swap_id: String,
    pub status: String,
    pub tx_hash: Option<String>,
    pub gas_used: Option<u64>,
    pub gas_price: Option<String>,
    pub error_message: Option<String>,
}

impl From<&ClaimRequest> for ApiClaim {
    fn from(c: &ClaimRequest) -> Self {
        Self {
            claim_id: c.id.to_string(),
            swap_id: c.swap_id.to_string(),
            status: c.status.as_str().to_string(),
            tx_hash: c.tx_hash.map(|t| t.to_hex()),
            gas_used: c.gas_used,
            gas_price: c.gas_price.map(|g| g.to_string()),
            error_message: c.error_message.clone(),
        }
    }
}

// ── Liquidity / health ───────────────────────────────────────────────────────

/// Operator top-up of one token's pool inventory.
#[derive(Debug, Deserialize)]
pub struct ApiDeposit {
    pub chain_id: ChainId,
    pub token: String,
    /// Decimal string in the token's smallest unit.
    pub amount: String,
    /// Health threshold, applied only when this call creates the token's
    /// liquidity row; existing rows keep theirs.
    pub min_threshold: Option<String>,
}

impl ApiDeposit {
    pub fn into_domain(
        self,
    ) -> Result<(poolswap_core::types::TokenKey, Amount, Option<Amount>), PoolswapError> {
        let token = parse_address(&self.token, "token")?;
        let amount = parse_amount(&self.amount, "amount")?;
        if amount.is_zero() {
            return Err(PoolswapError::Validation("amount must be positive".into()));
        }
        let min_threshold = self
            .min_threshold
            .as_deref()
            .map(|s| parse_amount(s, "min_threshold"))
            .transpose()?;
        Ok((
            poolswap_core::types::TokenKey::new(self.chain_id, token),
            amount,
            min_threshold,
        ))
    }
}

#[derive(Debug, Serialize)]
pub struct ApiLiquidity {
    pub chain_id: ChainId,
    pub token: String,
    pub total: String,
    pub reserved: String,
    pub available: String,
    pub utilization_bps: u64,
    pub health: String,
}

impl From<&LiquiditySnapshot> for ApiLiquidity {
    fn from(s: &LiquiditySnapshot) -> Self {
        Self {
            chain_id: s.token.chain_id,
            token: format!("{}", s.token.token),
            total: s.total.to_string(),
            reserved: s.reserved.to_string(),
            available: s.available.to_string(),
            utilization_bps: s.utilization_bps,
            health: s.health.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ApiChainHealth {
    pub chain_id: ChainId,
    pub name: String,
    pub last_processed_block: Option<u64>,
    /// Seconds since the watcher cursor last advanced. A number that keeps
    /// growing across polls means the watcher (or the node behind it) is
    /// stalled; `null` means the chain has never been polled.
    pub cursor_age_secs: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ApiHealth {
    pub status: &'static str,
    pub relayer_paused: bool,
    pub uptime_secs: i64,
    pub chains: Vec<ApiChainHealth>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: &'static str,
    pub message: String,
}
