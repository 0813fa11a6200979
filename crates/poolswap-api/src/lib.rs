//! poolswap-api
//!
//! The JSON-over-HTTP surface consumed by the swap UI: quoting, swap
//! creation, lifecycle queries, a resumable server-sent-event timeline per
//! swap, claim submission, liquidity snapshots and the relayer operator
//! switch. Wire DTOs live in [`types`]; domain types never cross the HTTP
//! boundary directly.

pub mod server;
pub mod types;

pub use server::{ApiServer, ApiState};
