//! Request and response bodies.

use ghost_core::{CommitmentHash, Order, TxSignature};
use ghost_envelope::EncryptedEnvelope;
use ghost_monitor::IntakeReceipt;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct SubmitOrderRequest {
    pub order: Order,
    /// Delegate the owner's account to the executor if it is not yet.
    #[serde(default = "default_true")]
    pub delegate: bool,
    /// Start monitoring the order right away.
    #[serde(default = "default_true")]
    pub track: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitOrderResponse {
    pub commitment: CommitmentHash,
    pub order_ref: String,
    pub envelope: EncryptedEnvelope,
    pub create_signature: TxSignature,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorize_signature: Option<TxSignature>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delegate_signature: Option<TxSignature>,
    pub delegated: bool,
    pub tracked: bool,
}

impl SubmitOrderResponse {
    pub fn new(receipt: IntakeReceipt, order_ref: String, tracked: bool) -> Self {
        Self {
            commitment: receipt.commitment,
            order_ref,
            envelope: receipt.envelope,
            create_signature: receipt.create_signature,
            authorize_signature: receipt.authorize_signature,
            delegate_signature: receipt.delegate_signature,
            delegated: receipt.delegated,
            tracked,
        }
    }
}

/// Body of `POST /api/monitor/orders`. The ref is parsed in the handler so
/// a malformed one maps to 400 with a useful message.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackOrderRequest {
    pub order_ref: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OwnerQuery {
    pub owner: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunningResponse {
    pub running: bool,
    /// Whether this call changed the state.
    pub changed: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackOrderResponse {
    pub order_ref: String,
    pub tracked: bool,
}
