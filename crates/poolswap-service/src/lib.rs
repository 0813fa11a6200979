//! poolswap-service
//!
//! Request ingress for the coordinator: quoting, swap creation and the
//! read-side queries. Quoting never reserves; creation re-validates the quote,
//! reserves target liquidity, generates the secret and persists the swap in
//! one step, releasing the reservation if any later step fails.

pub mod price;
pub mod service;

pub use price::{FixedRates, PriceSource};
pub use service::{CreateSwapRequest, Quote, QuoteRequest, SwapService};
