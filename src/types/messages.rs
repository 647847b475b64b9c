use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::crypto::concealment::ConcealedIdentity;
use crate::types::error::RejectCause;
use crate::types::identity::{ServingNetworkName, Supi};
use crate::types::vector::{
    AuthenticationToken, AuthenticationVector, Challenge, ExtendedResponse, PhysicalBindingTag,
};

/// Subscriber to serving network, over the open air.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum UplinkMessage {
    Identity {
        #[serde(rename = "concealedIdentity")]
        concealed_identity: ConcealedIdentity,
    },
    Response {
        #[serde(rename = "resStar")]
        res_star: ExtendedResponse,
    },
}

impl UplinkMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            UplinkMessage::Identity { .. } => "identity",
            UplinkMessage::Response { .. } => "response",
        }
    }
}

/// Serving network to subscriber, over the open air. The second challenge
/// only travels masked inside `autn`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownlinkChallenge {
    pub first_challenge: Challenge,
    pub autn: AuthenticationToken,
    pub serving_network_name: ServingNetworkName,
    pub binding_tag: PhysicalBindingTag,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum ConfirmationOutcome {
    Confirmed { supi: Supi },
    Rejected { cause: RejectCause },
}

/// Messages between serving and home network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum HomeMessage {
    /// Authentication information request.
    #[serde(rename_all = "camelCase")]
    Air {
        concealed_identity: ConcealedIdentity,
        serving_network_name: ServingNetworkName,
    },
    /// Authentication information answer.
    Aia { vector: AuthenticationVector },
    /// Authentication confirmation.
    #[serde(rename_all = "camelCase")]
    Ac {
        res_star: ExtendedResponse,
        concealed_identity: ConcealedIdentity,
        serving_network_name: ServingNetworkName,
    },
    /// Authentication confirmation answer.
    Aca { outcome: ConfirmationOutcome },
}

impl HomeMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            HomeMessage::Air { .. } => "air",
            HomeMessage::Aia { .. } => "aia",
            HomeMessage::Ac { .. } => "ac",
            HomeMessage::Aca { .. } => "aca",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecureEnvelope {
    pub transaction_id: Uuid,
    pub body: HomeMessage,
}

impl SecureEnvelope {
    pub fn new(transaction_id: Uuid, body: HomeMessage) -> Self {
        Self {
            transaction_id,
            body,
        }
    }
}
