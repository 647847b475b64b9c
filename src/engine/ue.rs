use serde::{Deserialize, Serialize};

use crate::crypto::aka::{open_token, AkaKeys};
use crate::crypto::concealment::{conceal, ConcealedIdentity};
use crate::crypto::kdf::derive_kamf;
use crate::crypto::physical::{verify_binding_tag, ChannelState};
use crate::engine::{SessionKeys, ABBA};
use crate::types::config::{AnonymityMode, PhysicalBindingPolicy};
use crate::types::credentials::{LongTermCredential, PublicKeyDirectory};
use crate::types::error::{AkaError, AkaResult};
use crate::types::messages::{DownlinkChallenge, UplinkMessage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UeState {
    Idle,
    Initiated,
    AwaitingChallenge,
    Completed,
    Aborted,
}

/// Subscriber side of one authentication attempt.
pub struct UeEngine {
    state: UeState,
    credential: LongTermCredential,
    home_public_key: [u8; 32],
    anonymity_mode: AnonymityMode,
    binding_policy: PhysicalBindingPolicy,
    concealed_identity: Option<ConcealedIdentity>,
    channel_state: Option<ChannelState>,
}

impl UeEngine {
    pub fn new(
        credential: LongTermCredential,
        directory: &dyn PublicKeyDirectory,
        anonymity_mode: AnonymityMode,
        binding_policy: PhysicalBindingPolicy,
    ) -> AkaResult<Self> {
        let home_public_key = directory
            .lookup_public_key(&credential.home_network)
            .ok_or_else(|| AkaError::UnknownHomeNetwork(credential.home_network.to_string()))?;

        Ok(Self {
            state: UeState::Idle,
            credential,
            home_public_key,
            anonymity_mode,
            binding_policy,
            concealed_identity: None,
            channel_state: None,
        })
    }

    pub fn state(&self) -> UeState {
        self.state
    }

    fn transition(&mut self, next_state: UeState) {
        tracing::info!("UE state transition: {:?} -> {:?}", self.state, next_state);
        self.state = next_state;
    }

    fn fail(&mut self, err: AkaError) -> AkaError {
        tracing::warn!(supi = %self.credential.supi, "UE aborting: {}", err);
        self.abort();
        err
    }

    /// Drops every in-flight value of the attempt.
    pub fn abort(&mut self) {
        self.concealed_identity = None;
        self.channel_state = None;
        if self.state != UeState::Aborted {
            self.transition(UeState::Aborted);
        }
    }

    /// Conceals the permanent identity under a fresh nonce for the open uplink.
    pub fn initiate(&mut self) -> AkaResult<UplinkMessage> {
        if self.state != UeState::Idle {
            return Err(AkaError::unexpected(self.state, "initiate"));
        }

        let concealed_identity = conceal(
            &self.credential.supi,
            &self.credential.home_network,
            &self.home_public_key,
        )
        .map_err(|e| self.fail(e))?;

        self.concealed_identity = Some(concealed_identity.clone());
        self.transition(UeState::Initiated);
        Ok(UplinkMessage::Identity { concealed_identity })
    }

    /// Records the channel-state information the radio layer reports for this
    /// attempt.
    pub fn observe_channel(&mut self, csi: ChannelState) -> AkaResult<()> {
        if self.state != UeState::Initiated {
            return Err(AkaError::unexpected(self.state, "channel observation"));
        }
        self.channel_state = Some(csi);
        self.transition(UeState::AwaitingChallenge);
        Ok(())
    }

    pub fn handle_challenge(
        &mut self,
        challenge: &DownlinkChallenge,
    ) -> AkaResult<(UplinkMessage, SessionKeys)> {
        if self.state != UeState::AwaitingChallenge {
            return Err(AkaError::unexpected(self.state, "challenge"));
        }

        let key = &self.credential.key;
        let Some(second_challenge) = open_token(
            key,
            &challenge.first_challenge,
            &challenge.autn,
            self.anonymity_mode,
        ) else {
            return Err(self.fail(AkaError::AuthenticityFailure));
        };

        if self.binding_policy == PhysicalBindingPolicy::Enforce {
            let bound = self
                .channel_state
                .as_ref()
                .is_some_and(|csi| verify_binding_tag(csi, &second_challenge, &challenge.binding_tag));
            if !bound {
                return Err(self.fail(AkaError::BindingFailure));
            }
        }

        let keys = AkaKeys::derive(
            key,
            &challenge.first_challenge,
            &challenge.autn.masked_challenge,
            &challenge.serving_network_name,
            self.anonymity_mode,
        );
        let kamf = derive_kamf(
            &keys.kseaf,
            self.credential.supi.to_string().as_bytes(),
            &ABBA,
        );

        tracing::debug!(
            supi = %self.credential.supi,
            snn = %challenge.serving_network_name,
            "Home network authenticated, answering challenge"
        );

        self.concealed_identity = None;
        self.channel_state = None;
        self.transition(UeState::Completed);

        Ok((
            UplinkMessage::Response {
                res_star: keys.res_star,
            },
            SessionKeys {
                supi: self.credential.supi.clone(),
                serving_network_name: challenge.serving_network_name.clone(),
                kseaf: keys.kseaf,
                kamf,
            },
        ))
    }
}
