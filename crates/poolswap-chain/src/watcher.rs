use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use poolswap_core::types::ChainId;
use poolswap_core::PoolswapError;
use poolswap_store::Store;

use crate::adapter::{ChainEvent, HtlcChain};

/// Handle given to consumers of the merged event stream. All watchers of a
/// node feed one bounded channel; a slow consumer backpressures the watchers
/// rather than dropping logs.
pub struct WatcherHandle {
    pub events_rx: mpsc::Receiver<(ChainId, ChainEvent)>,
}

impl WatcherHandle {
    pub fn channel(capacity: usize) -> (mpsc::Sender<(ChainId, ChainEvent)>, Self) {
        let (tx, events_rx) = mpsc::channel(capacity);
        (tx, Self { events_rx })
    }
}

/// Polls one chain's HTLC logs and forwards decoded events in block order.
///
/// The store cursor is the replay anchor: it only advances after every log in
/// the polled range has been delivered, so a crash or dropped node connection
/// resumes from the last fully-processed block instead of losing events.
pub struct LogWatcher {
    chain: Arc<dyn HtlcChain>,
    store: Arc<Store>,
    poll_interval: Duration,
    events_tx: mpsc::Sender<(ChainId, ChainEvent)>,
    shutdown: watch::Receiver<bool>,
}

impl LogWatcher {
    pub fn new(
        chain: Arc<dyn HtlcChain>,
        store: Arc<Store>,
        poll_interval: Duration,
        events_tx: mpsc::Sender<(ChainId, ChainEvent)>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self { chain, store, poll_interval, events_tx, shutdown }
    }

    /// Drive the poll loop. Run in a dedicated tokio task.
    pub async fn run(mut self) {
        let chain_id = self.chain.chain_id();
        info!(chain = chain_id, "log watcher started");

        loop {
            tokio::select! {
                _ = self.shutdown.changed() => {
                    if *self.shutdown.borrow() {
                        info!(chain = chain_id, "log watcher stopping");
                        return;
                    }
                }
                _ = tokio::time::sleep(self.poll_interval) => {
                    if let Err(e) = self.poll_once().await {
                        // Transient node trouble: keep the cursor, try again.
                        warn!(chain = chain_id, error = %e, "poll cycle failed");
                    }
                }
            }
        }
    }

    /// One poll cycle: `[cursor + 1, latest]`, then advance the cursor.
    pub async fn poll_once(&mut self) -> Result<usize, PoolswapError> {
        let chain_id = self.chain.chain_id();
        let latest = self.chain.latest_block().await?;

        let from = match self.store.last_processed_block(chain_id)? {
            Some(cursor) => cursor + 1,
            // First run: start at the chain tip. Historic locks predate this
            // coordinator and belong to nobody's swap.
            None => {
                self.store
                    .set_last_processed_block(chain_id, latest, now())?;
                return Ok(0);
            }
        };
        if from > latest {
            return Ok(0);
        }

        let events = self.chain.poll_events(from, latest).await?;
        let delivered = events.len();
        for event in events {
            debug!(chain = chain_id, block = event.block(), "chain event");
            self.events_tx
                .send((chain_id, event))
                .await
                .map_err(|_| PoolswapError::Other("event consumer stopped".into()))?;
        }

        self.store.set_last_processed_block(chain_id, latest, now())?;
        Ok(delivered)
    }
}

fn now() -> poolswap_core::types::Timestamp {
    chrono::Utc::now().timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockChain;
    use alloy_primitives::{Address, U256};
    use poolswap_core::types::{ContractId, HashLock};

    fn temp_store(name: &str) -> Arc<Store> {
        let dir = std::env::temp_dir().join(format!("poolswap_watcher_test_{name}"));
        let _ = std::fs::remove_dir_all(&dir);
        Arc::new(Store::open(&dir).unwrap())
    }

    #[tokio::test]
    async fn first_poll_anchors_cursor_without_events() {
        let chain = Arc::new(MockChain::new(7, Address::repeat_byte(0xcc)));
        let store = temp_store("anchor");
        let (tx, _handle) = WatcherHandle::channel(16);
        let (_shut_tx, shut_rx) = watch::channel(false);
        let mut watcher = LogWatcher::new(
            chain.clone(),
            Arc::clone(&store),
            Duration::from_millis(10),
            tx,
            shut_rx,
        );

        assert_eq!(watcher.poll_once().await.unwrap(), 0);
        assert!(store.last_processed_block(7).unwrap().is_some());
    }

    #[tokio::test]
    async fn events_replay_from_cursor() {
        let chain = Arc::new(MockChain::new(7, Address::repeat_byte(0xcc)));
        let store = temp_store("replay");
        let (tx, mut handle) = WatcherHandle::channel(16);
        let (_shut_tx, shut_rx) = watch::channel(false);
        let mut watcher = LogWatcher::new(
            chain.clone(),
            Arc::clone(&store),
            Duration::from_millis(10),
            tx,
            shut_rx,
        );

        // Anchor first, then produce a funded HTLC on chain.
        watcher.poll_once().await.unwrap();
        chain.user_fund(
            ContractId::from_bytes([1u8; 32]),
            Address::repeat_byte(0x01),
            Address::repeat_byte(0x02),
            Address::ZERO,
            U256::from(10u64),
            HashLock::from_bytes([2u8; 32]),
            2_000_000,
        );

        assert_eq!(watcher.poll_once().await.unwrap(), 1);
        let (chain_id, event) = handle.events_rx.recv().await.unwrap();
        assert_eq!(chain_id, 7);
        assert!(matches!(event, ChainEvent::Funded { .. }));

        // Same range is never redelivered.
        assert_eq!(watcher.poll_once().await.unwrap(), 0);
    }
}
