use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use crate::crypto::aka::{build_token, AkaKeys};
use crate::crypto::concealment::{reveal, ConcealedIdentity, CONCEALMENT_NONCE_SIZE};
use crate::crypto::home_network::ensure_addressed_to;
use crate::crypto::kdf::compute_hxres_star;
use crate::crypto::snn::verify_snn_authorization;
use crate::types::config::AnonymityMode;
use crate::types::credentials::{CredentialStore, NetworkKeyPair};
use crate::types::error::{AkaError, AkaResult, RejectCause};
use crate::types::identity::{Plmn, ServingNetworkName, Supi};
use crate::types::messages::ConfirmationOutcome;
use crate::types::vector::{
    AnchorKey, AuthenticationVector, Challenge, ExtendedResponse, ResponseHash,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HssState {
    Idle,
    VectorIssued,
    AwaitingConfirmationCheck,
    Done,
}

/// What the home network keeps between issuing a vector and checking the
/// confirmation for it.
pub struct HssSession {
    state: HssState,
    transaction_id: Uuid,
    pub supi: Supi,
    concealed_identity: ConcealedIdentity,
    nonce: [u8; CONCEALMENT_NONCE_SIZE],
    serving_network_name: ServingNetworkName,
    first_challenge: Challenge,
    hxres_star: ResponseHash,
    kseaf: AnchorKey,
}

impl HssSession {
    pub fn state(&self) -> HssState {
        self.state
    }

    /// Nonce the subscriber concealed its identity under.
    pub fn concealment_nonce(&self) -> &[u8; CONCEALMENT_NONCE_SIZE] {
        &self.nonce
    }

    pub fn anchor_key(&self) -> &AnchorKey {
        &self.kseaf
    }

    /// Recomputes HRES* from `res_star` and compares it with the stored
    /// HXRES* in constant time.
    pub fn verify_response(&self, res_star: &ExtendedResponse) -> AkaResult<()> {
        if compute_hxres_star(&self.first_challenge, res_star).ct_eq(&self.hxres_star) {
            Ok(())
        } else {
            Err(AkaError::ResponseMismatch)
        }
    }

    fn transition(&mut self, next_state: HssState) {
        tracing::info!(
            transaction_id = %self.transaction_id,
            "HSS state transition: {:?} -> {:?}",
            self.state,
            next_state
        );
        self.state = next_state;
    }
}

impl fmt::Debug for HssSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HssSession")
            .field("state", &self.state)
            .field("transaction_id", &self.transaction_id)
            .field("supi", &self.supi)
            .field("serving_network_name", &self.serving_network_name)
            .finish_non_exhaustive()
    }
}

/// Home network logic. Holds the network key pair and read-only access to
/// the credential store; per-transaction state lives in [`HssSession`].
pub struct HssEngine {
    key_pair: NetworkKeyPair,
    credentials: Arc<dyn CredentialStore>,
    allowed_plmns: Option<Vec<Plmn>>,
    anonymity_mode: AnonymityMode,
}

impl HssEngine {
    pub fn new(
        key_pair: NetworkKeyPair,
        credentials: Arc<dyn CredentialStore>,
        allowed_plmns: Option<Vec<Plmn>>,
        anonymity_mode: AnonymityMode,
    ) -> Self {
        Self {
            key_pair,
            credentials,
            allowed_plmns,
            anonymity_mode,
        }
    }

    pub fn key_pair(&self) -> &NetworkKeyPair {
        &self.key_pair
    }

    /// Handles an authentication information request with fresh challenges.
    pub fn issue_vector(
        &self,
        transaction_id: Uuid,
        concealed_identity: ConcealedIdentity,
        serving_network_name: ServingNetworkName,
    ) -> AkaResult<(AuthenticationVector, HssSession)> {
        self.issue_vector_with(
            transaction_id,
            concealed_identity,
            serving_network_name,
            Challenge::random(),
            Challenge::random(),
        )
    }

    pub fn issue_vector_with(
        &self,
        transaction_id: Uuid,
        concealed_identity: ConcealedIdentity,
        serving_network_name: ServingNetworkName,
        first_challenge: Challenge,
        second_challenge: Challenge,
    ) -> AkaResult<(AuthenticationVector, HssSession)> {
        verify_snn_authorization(&serving_network_name, self.allowed_plmns.as_deref())
            .map_err(AkaError::ServingNetworkNotAuthorized)?;

        ensure_addressed_to(&concealed_identity.home_network, &self.key_pair.network)?;
        let revealed = reveal(&concealed_identity, &self.key_pair)?;
        let key = self
            .credentials
            .lookup_long_term_key(&revealed.supi)
            .ok_or(AkaError::UnknownSubscriber)?;

        if first_challenge == second_challenge {
            return Err(AkaError::Crypto("challenges must be independent".to_string()));
        }

        let autn = build_token(&key, &first_challenge, &second_challenge, self.anonymity_mode);
        let keys = AkaKeys::derive(
            &key,
            &first_challenge,
            &autn.masked_challenge,
            &serving_network_name,
            self.anonymity_mode,
        );
        let hxres_star = keys.hxres_star(&first_challenge);

        let mut session = HssSession {
            state: HssState::Idle,
            transaction_id,
            supi: revealed.supi,
            concealed_identity,
            nonce: revealed.nonce,
            serving_network_name,
            first_challenge,
            hxres_star,
            kseaf: keys.kseaf.clone(),
        };
        session.transition(HssState::VectorIssued);
        tracing::debug!(
            transaction_id = %transaction_id,
            supi = %session.supi,
            snn = %session.serving_network_name,
            "Issued authentication vector"
        );

        let vector = AuthenticationVector {
            first_challenge,
            second_challenge,
            hxres_star,
            kseaf: keys.kseaf,
            autn,
        };
        Ok((vector, session))
    }

    /// Checks a confirmation request against the session it names. The
    /// session is consumed whatever the outcome.
    pub fn confirm(
        &self,
        mut session: HssSession,
        res_star: &ExtendedResponse,
        concealed_identity: &ConcealedIdentity,
        serving_network_name: &ServingNetworkName,
    ) -> ConfirmationOutcome {
        session.transition(HssState::AwaitingConfirmationCheck);

        let outcome = if &session.serving_network_name != serving_network_name {
            ConfirmationOutcome::Rejected {
                cause: RejectCause::ServingNetworkMismatch,
            }
        } else if &session.concealed_identity != concealed_identity {
            ConfirmationOutcome::Rejected {
                cause: RejectCause::IdentityMismatch,
            }
        } else if let Err(e) = session.verify_response(res_star) {
            tracing::debug!(transaction_id = %session.transaction_id, "{}", e);
            ConfirmationOutcome::Rejected {
                cause: RejectCause::ResponseMismatch,
            }
        } else {
            ConfirmationOutcome::Confirmed {
                supi: session.supi.clone(),
            }
        };

        match &outcome {
            ConfirmationOutcome::Confirmed { supi } => {
                tracing::info!(transaction_id = %session.transaction_id, supi = %supi, "Authentication confirmed");
            }
            ConfirmationOutcome::Rejected { cause } => {
                tracing::warn!(transaction_id = %session.transaction_id, "Authentication rejected: {}", cause);
            }
        }

        session.transition(HssState::Done);
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::concealment::{conceal, conceal_with_nonce};
    use crate::crypto::physical::ChannelState;
    use crate::engine::seaf::{SeafEngine, SeafState};
    use crate::engine::test_support::{concealed, downlink, fixture, issued, ue, Fixture};
    use crate::engine::ue::UeState;
    use crate::types::config::PhysicalBindingPolicy;
    use crate::types::messages::{HomeMessage, UplinkMessage};
    use proptest::prelude::*;
    use std::collections::HashSet;

    struct Run {
        ue_kseaf: AnchorKey,
        seaf_kseaf: AnchorKey,
        hss_kseaf: AnchorKey,
        ue_kamf: [u8; 32],
        seaf_kamf: [u8; 32],
    }

    fn run(f: &Fixture, mode: AnonymityMode, policy: PhysicalBindingPolicy) -> Run {
        let tx = Uuid::new_v4();
        let csi = ChannelState::random();
        let mut ue = ue(f, mode, policy);
        let mut seaf = SeafEngine::new(tx, f.snn.clone(), csi.clone());

        let identity = ue.initiate().unwrap();
        ue.observe_channel(csi).unwrap();

        let HomeMessage::Air {
            concealed_identity,
            serving_network_name,
        } = seaf.begin(identity).unwrap()
        else {
            panic!("expected air");
        };
        let (vector, session) = f
            .hss
            .issue_vector(tx, concealed_identity, serving_network_name)
            .unwrap();
        let hss_kseaf = session.anchor_key().clone();

        let downlink = seaf.on_vector(HomeMessage::Aia { vector }).unwrap();
        seaf.challenge_sent().unwrap();

        let (response, ue_keys) = ue.handle_challenge(&downlink).unwrap();
        let HomeMessage::Ac {
            res_star,
            concealed_identity,
            serving_network_name,
        } = seaf.on_response(response).unwrap()
        else {
            panic!("expected ac");
        };

        let outcome = f
            .hss
            .confirm(session, &res_star, &concealed_identity, &serving_network_name);
        let seaf_keys = seaf.on_confirmation(HomeMessage::Aca { outcome }).unwrap();

        assert_eq!(ue.state(), UeState::Completed);
        assert_eq!(seaf.state(), SeafState::Done);
        assert_eq!(seaf_keys.supi, f.credential.supi);

        Run {
            ue_kseaf: ue_keys.kseaf,
            seaf_kseaf: seaf_keys.kseaf,
            hss_kseaf,
            ue_kamf: ue_keys.kamf,
            seaf_kamf: seaf_keys.kamf,
        }
    }

    #[test]
    fn test_key_agreement() {
        for mode in [AnonymityMode::Derived, AnonymityMode::Zero] {
            let f = fixture(mode, None);
            let run = run(&f, mode, PhysicalBindingPolicy::Implicit);
            assert_eq!(run.ue_kseaf, run.hss_kseaf);
            assert_eq!(run.seaf_kseaf, run.hss_kseaf);
            assert_eq!(run.ue_kamf, run.seaf_kamf);
        }
    }

    #[test]
    fn test_key_agreement_with_enforced_binding() {
        let f = fixture(AnonymityMode::Derived, None);
        let run = run(&f, AnonymityMode::Derived, PhysicalBindingPolicy::Enforce);
        assert_eq!(run.ue_kseaf, run.hss_kseaf);
    }

    #[test]
    fn test_wrong_response_is_rejected_never_confirmed() {
        let f = fixture(AnonymityMode::Derived, None);
        let (_, _, session, identity) = issued(&f);

        let wrong = ExtendedResponse([0x42u8; 16]);
        assert!(matches!(
            session.verify_response(&wrong),
            Err(AkaError::ResponseMismatch)
        ));
        let outcome = f.hss.confirm(session, &wrong, &identity, &f.snn);
        assert_eq!(
            outcome,
            ConfirmationOutcome::Rejected {
                cause: RejectCause::ResponseMismatch
            }
        );
    }

    #[test]
    fn test_subscriber_response_verifies() {
        let f = fixture(AnonymityMode::Derived, None);
        let (mut ue, vector, session, _) = issued(&f);
        let (response, _) = ue.handle_challenge(&downlink(&f, &vector)).unwrap();
        let UplinkMessage::Response { res_star } = response else {
            panic!("expected response");
        };
        assert!(session.verify_response(&res_star).is_ok());
    }

    #[test]
    fn test_confirmation_bound_to_serving_network_and_identity() {
        let f = fixture(AnonymityMode::Derived, None);

        let (mut ue, vector, session, identity) = issued(&f);
        let (response, _) = ue.handle_challenge(&downlink(&f, &vector)).unwrap();
        let UplinkMessage::Response { res_star } = response else {
            panic!("expected response");
        };
        let other_snn = ServingNetworkName::parse("5G:mnc002.mcc001.3gppnetwork.org").unwrap();
        assert_eq!(
            f.hss.confirm(session, &res_star, &identity, &other_snn),
            ConfirmationOutcome::Rejected {
                cause: RejectCause::ServingNetworkMismatch
            }
        );

        let (mut ue, vector, session, _) = issued(&f);
        let (response, _) = ue.handle_challenge(&downlink(&f, &vector)).unwrap();
        let UplinkMessage::Response { res_star } = response else {
            panic!("expected response");
        };
        let other_identity =
            conceal(&f.credential.supi, &f.credential.home_network, f.hss.key_pair().public_key())
                .unwrap();
        assert_eq!(
            f.hss.confirm(session, &res_star, &other_identity, &f.snn),
            ConfirmationOutcome::Rejected {
                cause: RejectCause::IdentityMismatch
            }
        );
    }

    #[test]
    fn test_vectors_never_repeat_challenges() {
        let f = fixture(AnonymityMode::Derived, None);
        let mut seen = HashSet::new();
        for _ in 0..64 {
            let (_, vector, session, _) = issued(&f);
            assert_eq!(session.state(), HssState::VectorIssued);
            assert_ne!(vector.first_challenge, vector.second_challenge);
            assert!(seen.insert(vector.first_challenge));
            assert!(seen.insert(vector.second_challenge));
        }
    }

    #[test]
    fn test_injected_repeated_challenge_refused() {
        let f = fixture(AnonymityMode::Derived, None);
        let identity = conceal(
            &f.credential.supi,
            &f.credential.home_network,
            f.hss.key_pair().public_key(),
        )
        .unwrap();
        let r = Challenge::random();
        assert!(f
            .hss
            .issue_vector_with(Uuid::new_v4(), identity, f.snn.clone(), r, r)
            .is_err());
    }

    #[test]
    fn test_session_carries_concealment_nonce() {
        let f = fixture(AnonymityMode::Derived, None);
        let nonce = [0x5Cu8; CONCEALMENT_NONCE_SIZE];
        let identity = conceal_with_nonce(
            &f.credential.supi,
            &f.credential.home_network,
            f.hss.key_pair().public_key(),
            nonce,
        )
        .unwrap();
        let (_, session) = f
            .hss
            .issue_vector(Uuid::new_v4(), identity, f.snn.clone())
            .unwrap();
        assert_eq!(session.concealment_nonce(), &nonce);
    }

    #[test]
    fn test_unknown_subscriber_and_bad_ciphertext_are_silent() {
        let f = fixture(AnonymityMode::Derived, None);

        let stranger = Supi::parse("imsi-001019999999999").unwrap();
        let identity =
            conceal(&stranger, &f.credential.home_network, f.hss.key_pair().public_key()).unwrap();
        let err = f
            .hss
            .issue_vector(Uuid::new_v4(), identity, f.snn.clone())
            .unwrap_err();
        assert!(matches!(err, AkaError::UnknownSubscriber));
        assert!(err.is_silent_drop());

        let impostor = NetworkKeyPair::generate(f.credential.home_network.clone());
        let identity =
            conceal(&f.credential.supi, &f.credential.home_network, impostor.public_key()).unwrap();
        let err = f
            .hss
            .issue_vector(Uuid::new_v4(), identity, f.snn.clone())
            .unwrap_err();
        assert!(matches!(err, AkaError::DecryptionFailure));
        assert!(err.is_silent_drop());
    }

    #[test]
    fn test_unauthorized_serving_network() {
        let f = fixture(
            AnonymityMode::Derived,
            Some(vec![Plmn::parse("00102").unwrap()]),
        );
        let identity = conceal(
            &f.credential.supi,
            &f.credential.home_network,
            f.hss.key_pair().public_key(),
        )
        .unwrap();
        assert!(matches!(
            f.hss.issue_vector(Uuid::new_v4(), identity, f.snn.clone()),
            Err(AkaError::ServingNetworkNotAuthorized(_))
        ));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_subscriber_derives_issued_anchor_key(
            r1 in proptest::array::uniform16(any::<u8>()),
            r2 in proptest::array::uniform16(any::<u8>()),
            zero_mode in any::<bool>(),
        ) {
            prop_assume!(r1 != r2);
            let mode = if zero_mode { AnonymityMode::Zero } else { AnonymityMode::Derived };
            let f = fixture(mode, None);
            let mut subscriber = ue(&f, mode, PhysicalBindingPolicy::Implicit);
            let identity = concealed(&subscriber.initiate().unwrap());
            subscriber.observe_channel(ChannelState::random()).unwrap();

            let (vector, session) = f
                .hss
                .issue_vector_with(Uuid::new_v4(), identity, f.snn.clone(), Challenge(r1), Challenge(r2))
                .unwrap();
            let (response, keys) = subscriber.handle_challenge(&downlink(&f, &vector)).unwrap();
            let UplinkMessage::Response { res_star } = response else {
                panic!("expected response");
            };

            prop_assert_eq!(&keys.kseaf, session.anchor_key());
            prop_assert!(session.verify_response(&res_star).is_ok());
        }
    }
}
