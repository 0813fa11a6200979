//! poolswap-chain
//!
//! Uniform interface to each supported chain: the [`HtlcChain`] trait, the
//! canonical HTLC ABI (the only place it is defined), the EVM implementation
//! with its single-writer transaction submitter, the resumable log watcher,
//! and an in-memory mock chain for tests and the dev node.

pub mod adapter;
pub mod evm;
pub mod htlc;
pub mod mock;
pub mod submitter;
pub mod watcher;

pub use adapter::{ChainEvent, FundRequest, HtlcChain, TxOutcome};
pub use evm::EvmChain;
pub use htlc::{HtlcDetails, HtlcState};
pub use mock::MockChain;
pub use watcher::{LogWatcher, WatcherHandle};
