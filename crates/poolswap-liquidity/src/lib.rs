//! poolswap-liquidity
//!
//! Reservation, commitment, release and rebalance accounting over the pool's
//! multi-token inventory. Mutations are serialized per `(chain, token)` by
//! optimistic concurrency: read, mutate, CAS, retry a bounded number of times
//! on conflict. The accounting identity `total == reserved + available` is
//! checked before every persist; a breach stops the manager cold.

pub mod manager;

pub use manager::LiquidityManager;
