//! Mint pipeline: intent construction, relay transport, batch processing

pub mod batch;
pub mod intent;
pub mod relay;

pub use batch::{MintBatchProcessor, MintError, MintOutcome};
pub use intent::{
    Address, Eip712Domain, IntentError, IntentSigner, MintIntent, MintIntentBuilder,
    MonotonicNonce,
};
pub use relay::{MintRelayClient, RelayConfig, RelayFailure, RelayMode, RelayPayload, RelayReceipt};
