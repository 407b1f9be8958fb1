//! Replay-protected mint intents (EIP-712 typed data)
//!
//! Builds the `MintIntent` struct, its typed-data document for
//! `eth_signTypedData_v4`, and the digest a signer commits to:
//!
//! ```text
//! digest = keccak256(0x19 0x01 ‖ domainSeparator ‖ hashStruct(MintIntent))
//! ```
//!
//! Nothing here signs or verifies. Signing happens behind [`IntentSigner`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Value};
use sha3::{Digest, Keccak256};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

pub const DOMAIN_TYPE: &str =
    "EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)";

pub const MINT_INTENT_TYPE: &str = "MintIntent(address user,string uri,string contentId,bytes32 contentHash,uint64 timestamp,uint256 nonce,uint64 deadline)";

/// Seconds an intent stays valid after its timestamp
pub const INTENT_TTL_SECS: u64 = 600;

pub const DEFAULT_DOMAIN_NAME: &str = "ShardMinter";
pub const DEFAULT_DOMAIN_VERSION: &str = "1";
/// Base Sepolia
pub const DEFAULT_CHAIN_ID: u64 = 84532;
pub const DEFAULT_GATEWAY_BASE: &str = "https://gateway.irys.xyz";

#[derive(Debug, Error, PartialEq)]
pub enum IntentError {
    #[error("invalid address '{0}'")]
    InvalidAddress(String),

    #[error("content id must not be empty")]
    EmptyContentId,

    #[error("intent expired at {deadline} (now {now})")]
    Expired { deadline: u64, now: u64 },

    #[error("signing failed: {0}")]
    Signing(String),
}

pub fn keccak256(data: impl AsRef<[u8]>) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&Keccak256::digest(data.as_ref()));
    out
}

pub fn to_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// 20-byte account address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address(pub [u8; 20]);

impl FromStr for Address {
    type Err = IntentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);

        let bytes = hex::decode(digits).map_err(|_| IntentError::InvalidAddress(s.to_string()))?;
        let array: [u8; 20] = bytes
            .try_into()
            .map_err(|_| IntentError::InvalidAddress(s.to_string()))?;
        Ok(Address(array))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// `bytes32` rendered as `0x`-prefixed hex
mod bytes32_hex {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::to_hex(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<[u8; 32], D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(s.trim_start_matches("0x")).map_err(serde::de::Error::custom)?;
        bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom("expected 32 bytes"))
    }
}

/// `uint256` values that fit u128, as decimal strings (JSON numbers lose precision)
mod u128_decimal {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &u128, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
        #[derive(serde::Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(u64),
        }
        match Raw::deserialize(deserializer)? {
            Raw::Text(s) => s.parse().map_err(serde::de::Error::custom),
            Raw::Number(n) => Ok(u128::from(n)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Eip712Domain {
    pub name: String,
    pub version: String,
    pub chain_id: u64,
    pub verifying_contract: Address,
}

impl Eip712Domain {
    pub fn new(verifying_contract: Address) -> Self {
        Self {
            name: DEFAULT_DOMAIN_NAME.to_string(),
            version: DEFAULT_DOMAIN_VERSION.to_string(),
            chain_id: DEFAULT_CHAIN_ID,
            verifying_contract,
        }
    }

    pub fn separator(&self) -> [u8; 32] {
        let mut encoded = Vec::with_capacity(5 * 32);
        encoded.extend_from_slice(&keccak256(DOMAIN_TYPE));
        encoded.extend_from_slice(&keccak256(&self.name));
        encoded.extend_from_slice(&keccak256(&self.version));
        encoded.extend_from_slice(&word_u128(u128::from(self.chain_id)));
        encoded.extend_from_slice(&word_address(&self.verifying_contract));
        keccak256(encoded)
    }
}

/// The signable mint authorization
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MintIntent {
    pub user: Address,
    pub uri: String,
    pub content_id: String,
    #[serde(with = "bytes32_hex")]
    pub content_hash: [u8; 32],
    pub timestamp: u64,
    #[serde(with = "u128_decimal")]
    pub nonce: u128,
    pub deadline: u64,
}

impl MintIntent {
    /// EIP-712 `hashStruct`
    pub fn struct_hash(&self) -> [u8; 32] {
        let mut encoded = Vec::with_capacity(8 * 32);
        encoded.extend_from_slice(&keccak256(MINT_INTENT_TYPE));
        encoded.extend_from_slice(&word_address(&self.user));
        encoded.extend_from_slice(&keccak256(&self.uri));
        encoded.extend_from_slice(&keccak256(&self.content_id));
        encoded.extend_from_slice(&self.content_hash);
        encoded.extend_from_slice(&word_u128(u128::from(self.timestamp)));
        encoded.extend_from_slice(&word_u128(self.nonce));
        encoded.extend_from_slice(&word_u128(u128::from(self.deadline)));
        keccak256(encoded)
    }

    pub fn is_expired(&self, now_secs: u64) -> bool {
        now_secs > self.deadline
    }

    pub fn ensure_live(&self, now_secs: u64) -> Result<(), IntentError> {
        if self.is_expired(now_secs) {
            return Err(IntentError::Expired {
                deadline: self.deadline,
                now: now_secs,
            });
        }
        Ok(())
    }
}

/// Left-pad to a 32-byte big-endian ABI word
fn word_u128(value: u128) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[16..].copy_from_slice(&value.to_be_bytes());
    word
}

fn word_address(address: &Address) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[12..].copy_from_slice(&address.0);
    word
}

/// Builds intents for one signing domain
#[derive(Debug, Clone)]
pub struct MintIntentBuilder {
    domain: Eip712Domain,
    gateway_base: String,
}

impl MintIntentBuilder {
    pub fn new(domain: Eip712Domain, gateway_base: impl Into<String>) -> Self {
        Self {
            domain,
            gateway_base: gateway_base.into(),
        }
    }

    pub fn domain(&self) -> &Eip712Domain {
        &self.domain
    }

    /// Gateway URL for a content id
    pub fn content_uri(&self, content_id: &str) -> String {
        format!("{}/{}", self.gateway_base.trim_end_matches('/'), content_id)
    }

    /// `deadline = timestamp + 600`; `uri` defaults to the gateway URL of the content id
    pub fn build(
        &self,
        user: &str,
        content_id: &str,
        uri: Option<&str>,
        nonce: u128,
        now: DateTime<Utc>,
    ) -> Result<MintIntent, IntentError> {
        let user: Address = user.parse()?;
        if content_id.trim().is_empty() {
            return Err(IntentError::EmptyContentId);
        }

        let timestamp = caelum_common::time::unix_seconds(now);
        Ok(MintIntent {
            user,
            uri: uri
                .map(str::to_string)
                .unwrap_or_else(|| self.content_uri(content_id)),
            content_id: content_id.to_string(),
            content_hash: keccak256(content_id),
            timestamp,
            nonce,
            deadline: timestamp + INTENT_TTL_SECS,
        })
    }

    /// Final digest the signer commits to
    pub fn digest(&self, intent: &MintIntent) -> [u8; 32] {
        let mut preimage = Vec::with_capacity(2 + 64);
        preimage.extend_from_slice(&[0x19, 0x01]);
        preimage.extend_from_slice(&self.domain.separator());
        preimage.extend_from_slice(&intent.struct_hash());
        keccak256(preimage)
    }

    /// Document accepted by `eth_signTypedData_v4`
    pub fn typed_data(&self, intent: &MintIntent) -> Value {
        json!({
            "types": {
                "EIP712Domain": [
                    {"name": "name", "type": "string"},
                    {"name": "version", "type": "string"},
                    {"name": "chainId", "type": "uint256"},
                    {"name": "verifyingContract", "type": "address"},
                ],
                "MintIntent": [
                    {"name": "user", "type": "address"},
                    {"name": "uri", "type": "string"},
                    {"name": "contentId", "type": "string"},
                    {"name": "contentHash", "type": "bytes32"},
                    {"name": "timestamp", "type": "uint64"},
                    {"name": "nonce", "type": "uint256"},
                    {"name": "deadline", "type": "uint64"},
                ],
            },
            "primaryType": "MintIntent",
            "domain": self.domain,
            "message": intent,
        })
    }
}

/// Strictly increasing nonces seeded from wall-clock milliseconds
#[derive(Debug, Default)]
pub struct MonotonicNonce {
    last: AtomicU64,
}

impl MonotonicNonce {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self) -> u128 {
        let now_ms = caelum_common::time::now().timestamp_millis().max(0) as u64;
        self.next_at(now_ms)
    }

    /// `max(now_ms, previous + 1)`
    pub fn next_at(&self, now_ms: u64) -> u128 {
        let mut previous = self.last.load(Ordering::Relaxed);
        loop {
            let candidate = now_ms.max(previous + 1);
            match self.last.compare_exchange_weak(
                previous,
                candidate,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return u128::from(candidate),
                Err(actual) => previous = actual,
            }
        }
    }
}

/// External signer seam (wallet, KMS, remote signing service)
#[async_trait]
pub trait IntentSigner: Send + Sync {
    /// Returns the `0x`-prefixed 65-byte signature over `digest`
    async fn sign(&self, typed_data: &Value, digest: [u8; 32]) -> Result<String, IntentError>;
}
