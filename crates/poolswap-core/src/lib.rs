pub mod claim;
pub mod config;
pub mod constants;
pub mod error;
pub mod event;
pub mod liquidity;
pub mod swap;
pub mod types;

pub use claim::*;
pub use config::*;
pub use constants::*;
pub use error::PoolswapError;
pub use event::*;
pub use liquidity::*;
pub use swap::*;
pub use types::*;
