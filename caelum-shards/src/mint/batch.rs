//! Batch mint processor
//!
//! Runs one mint cycle at a time: pick the oldest pending record, claim it,
//! relay, finalize. The record is written only after a confirmed relay
//! success; every failure leaves it exactly as it was.
//!
//! Queue toggles go through the same lock, so a record cannot be un-queued
//! while its relay call is in flight.

use caelum_common::{time, EventBus, ShardEvent};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::intent::{
    Address, IntentError, IntentSigner, MintIntent, MintIntentBuilder, MonotonicNonce,
};
use super::relay::{MintRelayClient, RelayFailure, RelayMode, RelayPayload, RelayReceipt};
use crate::models::{MintClaim, ReflectionPatch, ReflectionRecord};
use crate::store::ReflectionStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MintOutcome {
    pub id: String,
    pub tx_hash: String,
}

#[derive(Debug, Error)]
pub enum MintError {
    #[error("Mint relay not configured: {0}")]
    NotConfigured(String),

    #[error("Reflection {id} has no user to mint to")]
    MissingUser { id: String },

    #[error("Reflection {id} has an outstanding mint claim")]
    Held { id: String },

    #[error(transparent)]
    Intent(#[from] IntentError),

    #[error("{failure}")]
    Relay { id: String, failure: RelayFailure },

    #[error(transparent)]
    Store(#[from] caelum_common::Error),
}

pub struct MintBatchProcessor {
    store: Arc<dyn ReflectionStore>,
    relay: Option<MintRelayClient>,
    builder: MintIntentBuilder,
    signer: Option<Arc<dyn IntentSigner>>,
    nonces: MonotonicNonce,
    events: EventBus,
    cycle: Mutex<()>,
}

impl MintBatchProcessor {
    pub fn new(
        store: Arc<dyn ReflectionStore>,
        relay: Option<MintRelayClient>,
        builder: MintIntentBuilder,
        events: EventBus,
    ) -> Self {
        Self {
            store,
            relay,
            builder,
            signer: None,
            nonces: MonotonicNonce::new(),
            events,
            cycle: Mutex::new(()),
        }
    }

    pub fn with_signer(mut self, signer: Arc<dyn IntentSigner>) -> Self {
        self.signer = Some(signer);
        self
    }

    pub fn builder(&self) -> &MintIntentBuilder {
        &self.builder
    }

    pub fn nonces(&self) -> &MonotonicNonce {
        &self.nonces
    }

    fn relay_client(&self) -> Result<&MintRelayClient, MintError> {
        self.relay
            .as_ref()
            .ok_or_else(|| MintError::NotConfigured("Missing MINT_ENDPOINT_URL".to_string()))
    }

    /// Run one mint cycle
    ///
    /// `Ok(None)` when nothing is pending.
    pub async fn run_once(&self) -> Result<Option<MintOutcome>, MintError> {
        let _cycle = self.cycle.lock().await;
        let relay = self.relay_client()?;

        let Some(record) = self.store.oldest_pending().await? else {
            return Ok(None);
        };

        let wallet = record.meta.user.trim().to_string();
        let content_id = record.content_id().to_string();
        if let Err(err) = check_wallet(relay.mode(), &record.id, &wallet) {
            self.park(&record.id, &content_id, &err).await?;
            return Err(err);
        }

        if !self
            .store
            .claim_mint(&MintClaim::new(&record.id, &content_id))
            .await?
        {
            return Err(MintError::Held { id: record.id });
        }

        let payload = match self.payload_for(relay.mode(), &record, &wallet, &content_id).await {
            Ok(payload) => payload,
            Err(e) => {
                self.release(&record.id).await;
                self.emit_failure(&record.id, &e);
                return Err(e);
            }
        };

        let receipt = match relay.relay(&payload).await {
            Ok(receipt) => receipt,
            Err(failure) => {
                if failure.may_have_committed() {
                    warn!(
                        id = %record.id,
                        error = %failure,
                        "Relay outcome unknown; mint claim kept until verified"
                    );
                } else {
                    self.release(&record.id).await;
                }
                let err = MintError::Relay {
                    id: record.id.clone(),
                    failure,
                };
                self.emit_failure(&record.id, &err);
                return Err(err);
            }
        };

        self.finalize(&record, &content_id, receipt).await.map(Some)
    }

    /// Set or clear `queued` on a record
    ///
    /// Serialized with mint cycles. Refused with `Conflict` once the record
    /// is minted or while a mint claim is outstanding.
    pub async fn set_queued(
        &self,
        id: &str,
        queued: bool,
    ) -> caelum_common::Result<ReflectionRecord> {
        let _cycle = self.cycle.lock().await;

        if self.store.mint_claim(id).await?.is_some() {
            return Err(caelum_common::Error::Conflict(format!(
                "reflection {} has an outstanding mint claim",
                id
            )));
        }

        self.store
            .modify(id, &move |record: &mut ReflectionRecord| {
                if record.is_minted() {
                    return Err(caelum_common::Error::Conflict(format!(
                        "reflection {} is already minted",
                        record.id
                    )));
                }
                record.queued = Some(queued);
                Ok(())
            })
            .await
    }

    /// Relay an intent signed elsewhere; touches no record
    pub async fn relay_signed(
        &self,
        intent: MintIntent,
        signature: String,
    ) -> Result<RelayReceipt, MintError> {
        let relay = self.relay_client()?;
        intent.ensure_live(time::unix_seconds(time::now()))?;

        let payload = RelayPayload::Signed {
            tx_id: intent.content_id.clone(),
            address: intent.user.to_string(),
            value: intent,
            signature,
        };
        relay.relay(&payload).await.map_err(|failure| MintError::Relay {
            id: payload.tx_id().to_string(),
            failure,
        })
    }

    async fn payload_for(
        &self,
        mode: RelayMode,
        record: &ReflectionRecord,
        wallet: &str,
        content_id: &str,
    ) -> Result<RelayPayload, MintError> {
        match mode {
            RelayMode::Simple => Ok(RelayPayload::Simple {
                tx_id: content_id.to_string(),
                address: wallet.to_string(),
            }),
            RelayMode::Sig => {
                let signer = self.signer.as_ref().ok_or_else(|| {
                    MintError::NotConfigured("sig mode requires an intent signer".to_string())
                })?;
                let intent =
                    self.builder
                        .build(wallet, content_id, None, self.nonces.next(), time::now())?;
                let signature = signer
                    .sign(&self.builder.typed_data(&intent), self.builder.digest(&intent))
                    .await?;
                info!(id = %record.id, nonce = %intent.nonce, "Signed mint intent");
                Ok(RelayPayload::Signed {
                    tx_id: content_id.to_string(),
                    address: intent.user.to_string(),
                    value: intent,
                    signature,
                })
            }
        }
    }

    async fn finalize(
        &self,
        record: &ReflectionRecord,
        content_id: &str,
        receipt: RelayReceipt,
    ) -> Result<MintOutcome, MintError> {
        let minted_at = time::now();
        let patch = ReflectionPatch::minted(&receipt.tx_hash, content_id, minted_at);

        // On failure the claim stays: the relay has committed but we could not record it
        self.store.update(&record.id, &patch).await?;
        self.release(&record.id).await;

        info!(id = %record.id, tx_hash = %receipt.tx_hash, "Shard minted");
        self.events.emit_lossy(ShardEvent::ShardMinted {
            id: record.id.clone(),
            tx_hash: receipt.tx_hash.clone(),
            content_id: content_id.to_string(),
            timestamp: minted_at,
        });

        Ok(MintOutcome {
            id: record.id.clone(),
            tx_hash: receipt.tx_hash,
        })
    }

    /// Hold an unmintable record out of selection so newer records are not starved
    async fn park(&self, id: &str, content_id: &str, err: &MintError) -> Result<(), MintError> {
        warn!(id, error = %err, "Queued reflection cannot be minted; parked until released");
        self.store
            .claim_mint(&MintClaim::parked(id, content_id, err.to_string()))
            .await?;
        self.emit_failure(id, err);
        Ok(())
    }

    async fn release(&self, id: &str) {
        if let Err(e) = self.store.release_mint(id).await {
            warn!(id, error = %e, "Failed to release mint claim");
        }
    }

    fn emit_failure(&self, id: &str, err: &MintError) {
        self.events.emit_lossy(ShardEvent::MintFailed {
            id: id.to_string(),
            reason: err.to_string(),
            timestamp: time::now(),
        });
    }
}

/// The wallet must be non-blank, and in sig mode a 20-byte address
fn check_wallet(mode: RelayMode, id: &str, wallet: &str) -> Result<(), MintError> {
    if wallet.is_empty() {
        return Err(MintError::MissingUser { id: id.to_string() });
    }
    if mode == RelayMode::Sig {
        wallet.parse::<Address>()?;
    }
    Ok(())
}
