use std::sync::Arc;
use std::time::Duration;

use alloy_consensus::{SignableTransaction, TxEip1559, TxEnvelope};
use alloy_eips::eip2718::Encodable2718;
use alloy_primitives::{Bytes, TxKind, B256, U256};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use poolswap_core::constants::{
    FEE_BUMP_PERCENT, SUBMIT_BACKOFF_BASE_SECS, SUBMIT_BACKOFF_CAP_SECS, SUBMIT_MAX_ATTEMPTS,
};
use poolswap_core::types::{Address, ChainId, TxHash};
use poolswap_core::PoolswapError;
use poolswap_crypto::HotWallet;

use crate::adapter::TxOutcome;
use crate::evm::EvmRpc;

/// How long to wait for a submitted transaction to confirm before treating
/// the attempt as stalled and re-bumping.
const CONFIRM_WAIT: Duration = Duration::from_secs(120);
const RECEIPT_POLL: Duration = Duration::from_secs(2);

struct SubmitRequest {
    to: Address,
    value: U256,
    input: Vec<u8>,
    gas_limit: u64,
    reply: oneshot::Sender<Result<TxOutcome, PoolswapError>>,
}

/// Cloneable handle used by the adapter's fund/claim/refund entry points.
#[derive(Clone)]
pub struct SubmitterHandle {
    tx: mpsc::Sender<SubmitRequest>,
}

impl SubmitterHandle {
    pub async fn submit(
        &self,
        to: Address,
        value: U256,
        input: Vec<u8>,
        gas_limit: u64,
    ) -> Result<TxOutcome, PoolswapError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(SubmitRequest { to, value, input, gas_limit, reply })
            .await
            .map_err(|_| PoolswapError::Other("submitter task stopped".into()))?;
        rx.await
            .map_err(|_| PoolswapError::Other("submitter dropped request".into()))?
    }
}

/// Single-writer transaction pipeline for one sender key on one chain.
///
/// Owning the nonce locally keeps the sequence gapless across concurrent
/// callers; the pending nonce is re-read from the node only at startup and
/// after a nonce error.
pub struct Submitter {
    rx: mpsc::Receiver<SubmitRequest>,
    rpc: Arc<EvmRpc>,
    wallet: HotWallet,
    chain_id: ChainId,
    confirmations: u64,
    nonce: Option<u64>,
}

enum SendFault {
    /// Local nonce diverged from the node's view; refresh and retry.
    NonceStale,
    /// Fee too low to replace; bump and retry.
    Underpriced,
    /// Balance or network trouble; backoff and retry.
    Transient,
}

fn classify_send_fault(err: &PoolswapError) -> Option<SendFault> {
    let msg = match err {
        PoolswapError::ChainTransient(m) => m.to_ascii_lowercase(),
        _ => return None,
    };
    if msg.contains("nonce") {
        Some(SendFault::NonceStale)
    } else if msg.contains("underpriced") || msg.contains("replacement") {
        Some(SendFault::Underpriced)
    } else if msg.contains("insufficient funds") {
        Some(SendFault::Transient)
    } else {
        Some(SendFault::Transient)
    }
}

fn backoff(attempt: u32) -> Duration {
    let secs = SUBMIT_BACKOFF_BASE_SECS
        .saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1)))
        .min(SUBMIT_BACKOFF_CAP_SECS);
    Duration::from_secs(secs)
}

impl Submitter {
    /// Spawn the actor and return its handle. Must run inside a tokio runtime.
    pub fn spawn(
        rpc: Arc<EvmRpc>,
        wallet: HotWallet,
        chain_id: ChainId,
        confirmations: u64,
    ) -> SubmitterHandle {
        let (tx, rx) = mpsc::channel(64);
        let actor = Submitter { rx, rpc, wallet, chain_id, confirmations, nonce: None };
        tokio::spawn(actor.run());
        SubmitterHandle { tx }
    }

    async fn run(mut self) {
        while let Some(req) = self.rx.recv().await {
            let result = self
                .process(req.to, req.value, &req.input, req.gas_limit)
                .await;
            if let Err(e) = &result {
                warn!(chain = self.chain_id, error = %e, "transaction failed");
            }
            let _ = req.reply.send(result);
        }
    }

    async fn process(
        &mut self,
        to: Address,
        value: U256,
        input: &[u8],
        gas_limit: u64,
    ) -> Result<TxOutcome, PoolswapError> {
        let base_fee = self.rpc.gas_price().await?;
        let mut last_err = None;

        for attempt in 1..=SUBMIT_MAX_ATTEMPTS {
            if self.nonce.is_none() {
                self.nonce = Some(self.rpc.pending_nonce(self.wallet.address()).await?);
            }
            let nonce = self.nonce.unwrap_or_default();

            // +50% per retry so a stuck transaction is actually replaced.
            let bump = U256::from(100 + FEE_BUMP_PERCENT * (attempt as u64 - 1));
            let max_fee = base_fee * bump / U256::from(100u64);
            let priority = max_fee / U256::from(10u64);

            let raw = self.sign_eip1559(to, value, input, gas_limit, nonce, max_fee, priority)?;

            match self.rpc.send_raw_transaction(&raw).await {
                Ok(tx_hash) => {
                    debug!(chain = self.chain_id, %tx_hash, nonce, attempt, "transaction submitted");
                    match self.wait_confirmed(tx_hash).await {
                        Ok(outcome) => {
                            self.nonce = Some(nonce + 1);
                            return Ok(outcome);
                        }
                        Err(e @ PoolswapError::ChainReverted(_)) => {
                            // The revert consumed the nonce.
                            self.nonce = Some(nonce + 1);
                            return Err(e);
                        }
                        Err(e) => {
                            warn!(chain = self.chain_id, %tx_hash, error = %e, "confirmation stalled");
                            last_err = Some(e);
                        }
                    }
                }
                Err(e @ PoolswapError::ChainReverted(_)) => return Err(e),
                Err(e) => match classify_send_fault(&e) {
                    Some(SendFault::NonceStale) => {
                        debug!(chain = self.chain_id, error = %e, "refreshing nonce");
                        self.nonce = None;
                        last_err = Some(e);
                    }
                    Some(SendFault::Underpriced) | Some(SendFault::Transient) => {
                        last_err = Some(e);
                    }
                    None => return Err(e),
                },
            }

            if attempt < SUBMIT_MAX_ATTEMPTS {
                tokio::time::sleep(backoff(attempt)).await;
            }
        }

        Err(last_err.unwrap_or_else(|| {
            PoolswapError::ChainTransient("submission retries exhausted".into())
        }))
    }

    #[allow(clippy::too_many_arguments)]
    fn sign_eip1559(
        &self,
        to: Address,
        value: U256,
        input: &[u8],
        gas_limit: u64,
        nonce: u64,
        max_fee: U256,
        priority: U256,
    ) -> Result<Vec<u8>, PoolswapError> {
        let tx = TxEip1559 {
            chain_id: self.chain_id,
            nonce,
            gas_limit,
            max_fee_per_gas: max_fee.saturating_to::<u128>(),
            max_priority_fee_per_gas: priority.saturating_to::<u128>(),
            to: TxKind::Call(to),
            value,
            access_list: Default::default(),
            input: Bytes::copy_from_slice(input),
        };
        let signature = self.wallet.sign_hash(&tx.signature_hash())?;
        let envelope = TxEnvelope::from(tx.into_signed(signature));
        Ok(envelope.encoded_2718())
    }

    async fn wait_confirmed(&self, tx_hash: B256) -> Result<TxOutcome, PoolswapError> {
        let deadline = tokio::time::Instant::now() + CONFIRM_WAIT;
        loop {
            if let Some(receipt) = self.rpc.transaction_receipt(tx_hash).await? {
                let block = receipt
                    .block_number
                    .as_deref()
                    .map(crate::evm::hex_to_u64)
                    .transpose()?
                    .unwrap_or_default();

                let latest = self.rpc.block_number().await?;
                if latest.saturating_sub(block) + 1 >= self.confirmations {
                    if receipt.status.as_deref() == Some("0x0") {
                        return Err(PoolswapError::ChainReverted(format!(
                            "transaction {tx_hash} reverted"
                        )));
                    }
                    let gas_used = receipt
                        .gas_used
                        .as_deref()
                        .map(crate::evm::hex_to_u64)
                        .transpose()?
                        .unwrap_or_default();
                    let effective_gas_price = receipt
                        .effective_gas_price
                        .as_deref()
                        .map(crate::evm::hex_to_u256)
                        .transpose()?
                        .unwrap_or_default();
                    return Ok(TxOutcome {
                        tx_hash: TxHash::from_bytes(tx_hash.0),
                        block_number: block,
                        gas_used,
                        effective_gas_price,
                    });
                }
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(PoolswapError::ChainTransient(format!(
                    "transaction {tx_hash} unconfirmed after {}s",
                    CONFIRM_WAIT.as_secs()
                )));
            }
            tokio::time::sleep(RECEIPT_POLL).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_is_bounded_exponential() {
        assert_eq!(backoff(1), Duration::from_secs(3));
        assert_eq!(backoff(2), Duration::from_secs(6));
        assert_eq!(backoff(3), Duration::from_secs(12));
        assert_eq!(backoff(4), Duration::from_secs(24));
        assert_eq!(backoff(5), Duration::from_secs(48));
        assert_eq!(backoff(6), Duration::from_secs(60), "capped at 60s");
    }

    #[test]
    fn send_fault_classification() {
        let nonce = PoolswapError::ChainTransient("nonce too low".into());
        assert!(matches!(classify_send_fault(&nonce), Some(SendFault::NonceStale)));

        let under = PoolswapError::ChainTransient("replacement transaction underpriced".into());
        assert!(matches!(classify_send_fault(&under), Some(SendFault::Underpriced)));

        let funds = PoolswapError::ChainTransient("insufficient funds for gas".into());
        assert!(matches!(classify_send_fault(&funds), Some(SendFault::Transient)));

        let revert = PoolswapError::ChainReverted("execution reverted".into());
        assert!(classify_send_fault(&revert).is_none());
    }
}
