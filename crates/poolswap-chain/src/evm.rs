use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{B256, U256};
use alloy_sol_types::{SolCall, SolEvent};
use async_trait::async_trait;
use jsonrpsee::core::client::ClientT;
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};
use jsonrpsee::rpc_params;
use serde::Deserialize;
use serde_json::json;

use poolswap_core::constants::RPC_TIMEOUT_SECS;
use poolswap_core::types::{
    Address, Amount, ChainId, ContractId, HashLock, Preimage,
};
use poolswap_core::{ChainConfig, PoolswapError};
use poolswap_crypto::HotWallet;

use crate::adapter::{ChainEvent, FundRequest, HtlcChain, TxOutcome};
use crate::htlc::{HtlcDetails, HtlcState, IHtlc};
use crate::submitter::{Submitter, SubmitterHandle};

// Fixed gas ceilings for the three HTLC entry points. The contract's paths
// are bounded, so estimation buys nothing over a safe constant.
pub(crate) const FUND_GAS_LIMIT: u64 = 200_000;
pub(crate) const CLAIM_GAS_LIMIT: u64 = 150_000;
pub(crate) const REFUND_GAS_LIMIT: u64 = 120_000;

// ── JSON-RPC plumbing ────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RpcReceipt {
    pub status: Option<String>,
    pub block_number: Option<String>,
    pub gas_used: Option<String>,
    pub effective_gas_price: Option<String>,
    pub transaction_hash: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcLog {
    topics: Vec<String>,
    data: String,
    block_number: Option<String>,
    #[serde(default)]
    removed: bool,
}

pub(crate) fn hex_to_u64(s: &str) -> Result<u64, PoolswapError> {
    let stripped = s.strip_prefix("0x").unwrap_or(s);
    u64::from_str_radix(stripped, 16)
        .map_err(|e| PoolswapError::Serialization(format!("bad hex quantity {s}: {e}")))
}

pub(crate) fn hex_to_u256(s: &str) -> Result<U256, PoolswapError> {
    U256::from_str_radix(s.strip_prefix("0x").unwrap_or(s), 16)
        .map_err(|e| PoolswapError::Serialization(format!("bad hex quantity {s}: {e}")))
}

fn hex_to_bytes(s: &str) -> Result<Vec<u8>, PoolswapError> {
    hex::decode(s.strip_prefix("0x").unwrap_or(s))
        .map_err(|e| PoolswapError::Serialization(format!("bad hex data: {e}")))
}

fn hex_to_b256(s: &str) -> Result<B256, PoolswapError> {
    let bytes = hex_to_bytes(s)?;
    if bytes.len() != 32 {
        return Err(PoolswapError::Serialization(format!(
            "expected 32-byte word, got {}",
            bytes.len()
        )));
    }
    Ok(B256::from_slice(&bytes))
}

/// Classify a JSON-RPC failure. Reverts are deterministic and final; anything
/// else is assumed transient and retried by the caller's policy.
pub(crate) fn classify_rpc_error(err: jsonrpsee::core::ClientError) -> PoolswapError {
    let msg = err.to_string();
    let lowered = msg.to_ascii_lowercase();
    if lowered.contains("revert") || lowered.contains("execution reverted") {
        PoolswapError::ChainReverted(msg)
    } else {
        PoolswapError::ChainTransient(msg)
    }
}

/// Thin typed wrapper over an EVM node's JSON-RPC endpoint.
pub(crate) struct EvmRpc {
    client: HttpClient,
}

impl EvmRpc {
    pub fn connect(url: &str) -> Result<Self, PoolswapError> {
        let client = HttpClientBuilder::default()
            .request_timeout(Duration::from_secs(RPC_TIMEOUT_SECS))
            .build(url)
            .map_err(|e| PoolswapError::ChainTransient(format!("connecting {url}: {e}")))?;
        Ok(Self { client })
    }

    pub async fn block_number(&self) -> Result<u64, PoolswapError> {
        let hex: String = self
            .client
            .request("eth_blockNumber", rpc_params![])
            .await
            .map_err(classify_rpc_error)?;
        hex_to_u64(&hex)
    }

    pub async fn gas_price(&self) -> Result<U256, PoolswapError> {
        let hex: String = self
            .client
            .request("eth_gasPrice", rpc_params![])
            .await
            .map_err(classify_rpc_error)?;
        hex_to_u256(&hex)
    }

    pub async fn balance(&self, address: Address) -> Result<U256, PoolswapError> {
        let hex: String = self
            .client
            .request("eth_getBalance", rpc_params![format!("{address:?}"), "latest"])
            .await
            .map_err(classify_rpc_error)?;
        hex_to_u256(&hex)
    }

    /// Pending-tag nonce. Read only at startup and after nonce errors; the
    /// submitter tracks it locally otherwise.
    pub async fn pending_nonce(&self, address: Address) -> Result<u64, PoolswapError> {
        let hex: String = self
            .client
            .request(
                "eth_getTransactionCount",
                rpc_params![format!("{address:?}"), "pending"],
            )
            .await
            .map_err(classify_rpc_error)?;
        hex_to_u64(&hex)
    }

    pub async fn call(&self, to: Address, data: &[u8]) -> Result<Vec<u8>, PoolswapError> {
        let tx = json!({ "to": format!("{to:?}"), "data": format!("0x{}", hex::encode(data)) });
        let hex: String = self
            .client
            .request("eth_call", rpc_params![tx, "latest"])
            .await
            .map_err(classify_rpc_error)?;
        hex_to_bytes(&hex)
    }

    pub async fn send_raw_transaction(&self, raw: &[u8]) -> Result<B256, PoolswapError> {
        let hex: String = self
            .client
            .request(
                "eth_sendRawTransaction",
                rpc_params![format!("0x{}", hex::encode(raw))],
            )
            .await
            .map_err(classify_rpc_error)?;
        hex_to_b256(&hex)
    }

    pub async fn transaction_receipt(
        &self,
        tx_hash: B256,
    ) -> Result<Option<RpcReceipt>, PoolswapError> {
        self.client
            .request("eth_getTransactionReceipt", rpc_params![format!("{tx_hash:?}")])
            .await
            .map_err(classify_rpc_error)
    }

    pub async fn get_logs(
        &self,
        address: Address,
        from_block: u64,
        to_block: u64,
        topic0: &[B256],
    ) -> Result<Vec<RpcLog>, PoolswapError> {
        let filter = json!({
            "address": format!("{address:?}"),
            "fromBlock": format!("0x{from_block:x}"),
            "toBlock": format!("0x{to_block:x}"),
            "topics": [topic0.iter().map(|t| format!("{t:?}")).collect::<Vec<_>>()],
        });
        self.client
            .request("eth_getLogs", rpc_params![filter])
            .await
            .map_err(classify_rpc_error)
    }
}

// ── EvmChain ─────────────────────────────────────────────────────────────────

/// The production [`HtlcChain`] implementation: JSON-RPC reads plus a
/// single-writer submitter for everything that spends gas.
pub struct EvmChain {
    chain_id: ChainId,
    htlc: Address,
    wallet_address: Address,
    rpc: Arc<EvmRpc>,
    submitter: SubmitterHandle,
}

impl EvmChain {
    /// Connect to the configured endpoint and spawn the submitter actor.
    /// Must run inside a tokio runtime.
    pub fn connect(cfg: &ChainConfig, wallet: HotWallet) -> Result<Self, PoolswapError> {
        let rpc = Arc::new(EvmRpc::connect(&cfg.rpc_url)?);
        let wallet_address = wallet.address();
        let submitter = Submitter::spawn(
            Arc::clone(&rpc),
            wallet,
            cfg.chain_id,
            cfg.confirmations,
        );
        Ok(Self {
            chain_id: cfg.chain_id,
            htlc: cfg.htlc_contract,
            wallet_address,
            rpc,
            submitter,
        })
    }

    fn decode_log(&self, log: &RpcLog) -> Result<Option<ChainEvent>, PoolswapError> {
        if log.removed || log.topics.is_empty() {
            return Ok(None);
        }
        let block = match &log.block_number {
            Some(b) => hex_to_u64(b)?,
            None => return Ok(None), // pending log; the next poll will see it mined
        };
        let topics: Vec<B256> = log
            .topics
            .iter()
            .map(|t| hex_to_b256(t))
            .collect::<Result<_, _>>()?;
        let data = hex_to_bytes(&log.data)?;

        let event = if topics[0] == IHtlc::Funded::SIGNATURE_HASH {
            let ev = IHtlc::Funded::decode_raw_log(topics.iter().copied(), &data, true)
                .map_err(|e| PoolswapError::Serialization(format!("bad Funded log: {e}")))?;
            ChainEvent::Funded {
                contract_id: ContractId::from_bytes(ev.contractId.0),
                originator: ev.originator,
                beneficiary: ev.beneficiary,
                token: ev.token,
                value: ev.value,
                hash_lock: HashLock::from_bytes(ev.hashLock.0),
                timelock: ev.timelock.saturating_to::<u64>() as i64,
                block,
            }
        } else if topics[0] == IHtlc::Claimed::SIGNATURE_HASH {
            let ev = IHtlc::Claimed::decode_raw_log(topics.iter().copied(), &data, true)
                .map_err(|e| PoolswapError::Serialization(format!("bad Claimed log: {e}")))?;
            ChainEvent::Claimed {
                contract_id: ContractId::from_bytes(ev.contractId.0),
                claimer: ev.claimer,
                preimage: Preimage::from_bytes(ev.preimage.0),
                block,
            }
        } else if topics[0] == IHtlc::Refunded::SIGNATURE_HASH {
            let ev = IHtlc::Refunded::decode_raw_log(topics.iter().copied(), &data, true)
                .map_err(|e| PoolswapError::Serialization(format!("bad Refunded log: {e}")))?;
            ChainEvent::Refunded {
                contract_id: ContractId::from_bytes(ev.contractId.0),
                refunder: ev.refunder,
                block,
            }
        } else {
            return Ok(None);
        };
        Ok(Some(event))
    }
}

#[async_trait]
impl HtlcChain for EvmChain {
    fn chain_id(&self) -> ChainId {
        self.chain_id
    }

    fn htlc_address(&self) -> Address {
        self.htlc
    }

    fn wallet_address(&self) -> Address {
        self.wallet_address
    }

    async fn fund(&self, req: FundRequest) -> Result<TxOutcome, PoolswapError> {
        let call = IHtlc::fundCall {
            contractId: B256::from(*req.contract_id.as_bytes()),
            token: req.token,
            beneficiary: req.beneficiary,
            hashLock: B256::from(*req.hash_lock.as_bytes()),
            timelock: U256::from(req.timelock as u64),
            value: req.value,
        };
        // Native-token locks carry the value in msg.value; ERC-20 locks move
        // tokens via transferFrom inside the contract.
        let msg_value = if req.token == Address::ZERO {
            req.value
        } else {
            U256::ZERO
        };
        self.submitter
            .submit(self.htlc, msg_value, call.abi_encode(), FUND_GAS_LIMIT)
            .await
    }

    async fn claim(
        &self,
        contract_id: ContractId,
        preimage: Preimage,
    ) -> Result<TxOutcome, PoolswapError> {
        let call = IHtlc::claimCall {
            contractId: B256::from(*contract_id.as_bytes()),
            preimage: B256::from(*preimage.as_bytes()),
        };
        self.submitter
            .submit(self.htlc, U256::ZERO, call.abi_encode(), CLAIM_GAS_LIMIT)
            .await
    }

    async fn refund(&self, contract_id: ContractId) -> Result<TxOutcome, PoolswapError> {
        let call = IHtlc::refundCall {
            contractId: B256::from(*contract_id.as_bytes()),
        };
        self.submitter
            .submit(self.htlc, U256::ZERO, call.abi_encode(), REFUND_GAS_LIMIT)
            .await
    }

    async fn get_details(
        &self,
        contract_id: ContractId,
    ) -> Result<Option<HtlcDetails>, PoolswapError> {
        let call = IHtlc::getDetailsCall {
            contractId: B256::from(*contract_id.as_bytes()),
        };
        let ret_bytes = self.rpc.call(self.htlc, &call.abi_encode()).await?;
        let ret = IHtlc::getDetailsCall::abi_decode_returns(&ret_bytes, true)
            .map_err(|e| PoolswapError::Serialization(format!("bad getDetails return: {e}")))?;

        let state = HtlcState::from_u8(ret.state)?;
        if state == HtlcState::Invalid {
            return Ok(None);
        }
        Ok(Some(HtlcDetails {
            contract_id,
            token: ret.token,
            beneficiary: ret.beneficiary,
            originator: ret.originator,
            hash_lock: HashLock::from_bytes(ret.hashLock.0),
            timelock: ret.timelock.saturating_to::<u64>() as i64,
            value: ret.value,
            state,
        }))
    }

    async fn poll_events(
        &self,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<ChainEvent>, PoolswapError> {
        let topics = [
            IHtlc::Funded::SIGNATURE_HASH,
            IHtlc::Claimed::SIGNATURE_HASH,
            IHtlc::Refunded::SIGNATURE_HASH,
        ];
        let logs = self
            .rpc
            .get_logs(self.htlc, from_block, to_block, &topics)
            .await?;

        let mut events = Vec::with_capacity(logs.len());
        for log in &logs {
            if let Some(ev) = self.decode_log(log)? {
                events.push(ev);
            }
        }
        events.sort_by_key(|e| e.block());
        Ok(events)
    }

    async fn latest_block(&self) -> Result<u64, PoolswapError> {
        self.rpc.block_number().await
    }

    async fn balance(&self, address: Address) -> Result<Amount, PoolswapError> {
        self.rpc.balance(address).await
    }

    async fn gas_price(&self) -> Result<Amount, PoolswapError> {
        self.rpc.gas_price().await
    }
}
