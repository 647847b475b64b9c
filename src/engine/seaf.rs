use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::crypto::concealment::ConcealedIdentity;
use crate::crypto::kdf::{compute_hxres_star, derive_kamf};
use crate::crypto::physical::{compute_binding_tag, ChannelState};
use crate::crypto::validation::validate_authentication_vector;
use crate::engine::{SessionKeys, ABBA};
use crate::types::error::{AkaError, AkaResult};
use crate::types::identity::ServingNetworkName;
use crate::types::messages::{ConfirmationOutcome, DownlinkChallenge, HomeMessage, UplinkMessage};
use crate::types::vector::{AnchorKey, Challenge, ResponseHash};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SeafState {
    Idle,
    RelayedToHome,
    RelayingChallenge,
    AwaitingResponse,
    AwaitingConfirmation,
    Done,
    Aborted,
}

struct HeldVector {
    first_challenge: Challenge,
    hxres_star: ResponseHash,
    kseaf: AnchorKey,
}

/// Serving network side of one transaction.
pub struct SeafEngine {
    state: SeafState,
    transaction_id: Uuid,
    serving_network_name: ServingNetworkName,
    channel_state: ChannelState,
    concealed_identity: Option<ConcealedIdentity>,
    vector: Option<HeldVector>,
}

impl SeafEngine {
    pub fn new(
        transaction_id: Uuid,
        serving_network_name: ServingNetworkName,
        channel_state: ChannelState,
    ) -> Self {
        Self {
            state: SeafState::Idle,
            transaction_id,
            serving_network_name,
            channel_state,
            concealed_identity: None,
            vector: None,
        }
    }

    pub fn state(&self) -> SeafState {
        self.state
    }

    pub fn transaction_id(&self) -> Uuid {
        self.transaction_id
    }

    fn transition(&mut self, next_state: SeafState) {
        tracing::info!(
            transaction_id = %self.transaction_id,
            "SEAF state transition: {:?} -> {:?}",
            self.state,
            next_state
        );
        self.state = next_state;
    }

    fn fail(&mut self, err: AkaError) -> AkaError {
        tracing::warn!(transaction_id = %self.transaction_id, "SEAF aborting: {}", err);
        self.abort();
        err
    }

    pub fn abort(&mut self) {
        self.concealed_identity = None;
        self.vector = None;
        if !matches!(self.state, SeafState::Aborted | SeafState::Done) {
            self.transition(SeafState::Aborted);
        }
    }

    /// Takes the subscriber's concealed identity and builds the request to
    /// its home network.
    pub fn begin(&mut self, uplink: UplinkMessage) -> AkaResult<HomeMessage> {
        let concealed_identity = match uplink {
            UplinkMessage::Identity { concealed_identity } => concealed_identity,
            other => return Err(self.fail(AkaError::unexpected(self.state, other.kind()))),
        };
        if self.state != SeafState::Idle {
            return Err(self.fail(AkaError::unexpected(self.state, "identity")));
        }

        self.concealed_identity = Some(concealed_identity.clone());
        self.transition(SeafState::RelayedToHome);
        Ok(HomeMessage::Air {
            concealed_identity,
            serving_network_name: self.serving_network_name.clone(),
        })
    }

    /// Turns the home network's vector into the downlink challenge, adding
    /// the physical-binding tag over the second challenge.
    pub fn on_vector(&mut self, message: HomeMessage) -> AkaResult<DownlinkChallenge> {
        if self.state != SeafState::RelayedToHome {
            return Err(self.fail(AkaError::unexpected(self.state, message.kind())));
        }

        let vector = match message {
            HomeMessage::Aia { vector } => vector,
            HomeMessage::Aca {
                outcome: ConfirmationOutcome::Rejected { cause },
            } => return Err(self.fail(AkaError::Rejected(cause))),
            other => return Err(self.fail(AkaError::unexpected(self.state, other.kind()))),
        };

        if let Err(e) = validate_authentication_vector(&vector) {
            return Err(self.fail(AkaError::MalformedMessage(format!(
                "Authentication vector validation failed: {}",
                e
            ))));
        }

        self.transition(SeafState::RelayingChallenge);

        let binding_tag = compute_binding_tag(&self.channel_state, &vector.second_challenge);
        let downlink = DownlinkChallenge {
            first_challenge: vector.first_challenge,
            autn: vector.autn,
            serving_network_name: self.serving_network_name.clone(),
            binding_tag,
        };

        self.vector = Some(HeldVector {
            first_challenge: vector.first_challenge,
            hxres_star: vector.hxres_star,
            kseaf: vector.kseaf,
        });
        Ok(downlink)
    }

    pub fn challenge_sent(&mut self) -> AkaResult<()> {
        if self.state != SeafState::RelayingChallenge {
            return Err(AkaError::unexpected(self.state, "challenge sent"));
        }
        self.transition(SeafState::AwaitingResponse);
        Ok(())
    }

    /// Forwards RES* to the home network. The local hash comparison only
    /// feeds the log; the home network decides.
    pub fn on_response(&mut self, uplink: UplinkMessage) -> AkaResult<HomeMessage> {
        let res_star = match uplink {
            UplinkMessage::Response { res_star } => res_star,
            other => return Err(self.fail(AkaError::unexpected(self.state, other.kind()))),
        };
        if self.state != SeafState::AwaitingResponse {
            return Err(self.fail(AkaError::unexpected(self.state, "response")));
        }
        let (Some(vector), Some(concealed_identity)) =
            (self.vector.as_ref(), self.concealed_identity.clone())
        else {
            return Err(self.fail(AkaError::unexpected(self.state, "response")));
        };

        let local_match =
            compute_hxres_star(&vector.first_challenge, &res_star).ct_eq(&vector.hxres_star);
        if local_match {
            tracing::debug!(transaction_id = %self.transaction_id, "HRES* matches HXRES*");
        } else {
            tracing::warn!(
                transaction_id = %self.transaction_id,
                "HRES* does not match HXRES*, forwarding for home network verdict"
            );
        }

        self.transition(SeafState::AwaitingConfirmation);
        Ok(HomeMessage::Ac {
            res_star,
            concealed_identity,
            serving_network_name: self.serving_network_name.clone(),
        })
    }

    /// Finishes on the home network's verdict. The confirmed identity is the
    /// first point at which the serving network learns who the subscriber is.
    pub fn on_confirmation(&mut self, message: HomeMessage) -> AkaResult<SessionKeys> {
        if self.state != SeafState::AwaitingConfirmation {
            return Err(self.fail(AkaError::unexpected(self.state, message.kind())));
        }

        let supi = match message {
            HomeMessage::Aca {
                outcome: ConfirmationOutcome::Confirmed { supi },
            } => supi,
            HomeMessage::Aca {
                outcome: ConfirmationOutcome::Rejected { cause },
            } => return Err(self.fail(AkaError::Rejected(cause))),
            other => return Err(self.fail(AkaError::unexpected(self.state, other.kind()))),
        };

        let Some(vector) = self.vector.take() else {
            return Err(self.fail(AkaError::unexpected(self.state, "aca")));
        };
        let kamf = derive_kamf(&vector.kseaf, supi.to_string().as_bytes(), &ABBA);

        self.concealed_identity = None;
        self.transition(SeafState::Done);
        tracing::info!(transaction_id = %self.transaction_id, supi = %supi, "Subscriber confirmed");

        Ok(SessionKeys {
            supi,
            serving_network_name: self.serving_network_name.clone(),
            kseaf: vector.kseaf,
            kamf,
        })
    }
}
