use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub use alloy_primitives::{Address, U256};

/// Unix timestamp (seconds, UTC).
pub type Timestamp = i64;

/// EIP-155 chain identifier. Canonical values come from node configuration,
/// never from code.
pub type ChainId = u64;

/// Token amount in the token's smallest unit.
pub type Amount = U256;

// ── SwapId ───────────────────────────────────────────────────────────────────

/// Opaque, globally unique swap identifier assigned at creation (UUID v4).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SwapId(pub Uuid);

impl SwapId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl fmt::Display for SwapId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for SwapId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SwapId({})", &self.0.to_string()[..8])
    }
}

// ── ClaimId ──────────────────────────────────────────────────────────────────

/// Identifier for a relayer claim request (UUID v4).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClaimId(pub Uuid);

impl ClaimId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl fmt::Display for ClaimId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for ClaimId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClaimId({})", &self.0.to_string()[..8])
    }
}

// ── 32-byte newtypes ─────────────────────────────────────────────────────────

macro_rules! bytes32_newtype {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub [u8; 32]);

        impl $name {
            pub fn from_bytes(b: [u8; 32]) -> Self {
                Self(b)
            }

            pub fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }

            pub fn to_hex(&self) -> String {
                format!("0x{}", hex::encode(self.0))
            }

            pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
                let s = s.strip_prefix("0x").unwrap_or(s);
                let bytes = hex::decode(s)?;
                if bytes.len() != 32 {
                    return Err(hex::FromHexError::InvalidStringLength);
                }
                let mut arr = [0u8; 32];
                arr.copy_from_slice(&bytes);
                Ok(Self(arr))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.to_hex())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({}…)"), &self.to_hex()[..10])
            }
        }
    };
}

bytes32_newtype! {
    /// SHA-256 digest of a swap's secret preimage. Both HTLCs are locked to it.
    HashLock
}

bytes32_newtype! {
    /// The 32-byte secret. Known only to the coordinator until the user's
    /// source-side claim reveals it on chain.
    Preimage
}

bytes32_newtype! {
    /// Contract-side HTLC identifier (bytes32 key inside the HTLC contract).
    ContractId
}

bytes32_newtype! {
    /// Transaction hash on some chain.
    TxHash
}

// ── Token pair key ───────────────────────────────────────────────────────────

/// A `(chain, token)` pair — the unit of liquidity accounting.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TokenKey {
    pub chain_id: ChainId,
    pub token: Address,
}

impl TokenKey {
    pub fn new(chain_id: ChainId, token: Address) -> Self {
        Self { chain_id, token }
    }

    /// Store key bytes: chain id (big-endian) followed by the token address.
    pub fn to_bytes(&self) -> [u8; 28] {
        let mut out = [0u8; 28];
        out[..8].copy_from_slice(&self.chain_id.to_be_bytes());
        out[8..].copy_from_slice(self.token.as_slice());
        out
    }
}

impl fmt::Display for TokenKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.chain_id, self.token)
    }
}

impl fmt::Debug for TokenKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TokenKey({self})")
    }
}
