use std::sync::Arc;
use uuid::Uuid;

use crate::crypto::concealment::ConcealedIdentity;
use crate::crypto::physical::{compute_binding_tag, ChannelState};
use crate::engine::hss::{HssEngine, HssSession};
use crate::engine::ue::UeEngine;
use crate::types::config::{AnonymityMode, PhysicalBindingPolicy};
use crate::types::credentials::{
    InMemoryCredentials, InMemoryDirectory, LongTermCredential, LongTermKey, NetworkKeyPair,
};
use crate::types::identity::{Plmn, ServingNetworkName, Supi};
use crate::types::messages::{DownlinkChallenge, UplinkMessage};
use crate::types::vector::AuthenticationVector;

pub(crate) struct Fixture {
    pub hss: HssEngine,
    pub directory: InMemoryDirectory,
    pub credential: LongTermCredential,
    pub snn: ServingNetworkName,
}

/// One home network `00101` with a single provisioned subscriber.
pub(crate) fn fixture(mode: AnonymityMode, allowed: Option<Vec<Plmn>>) -> Fixture {
    let home = Plmn::parse("00101").unwrap();
    let key_pair = NetworkKeyPair::generate(home.clone());
    let directory = InMemoryDirectory::new();
    directory.publish(&key_pair);

    let credential = LongTermCredential {
        supi: Supi::parse("imsi-001010000000001").unwrap(),
        home_network: home.clone(),
        key: LongTermKey::random(),
    };
    let credentials = InMemoryCredentials::new();
    credentials.provision(credential.clone()).unwrap();

    Fixture {
        hss: HssEngine::new(key_pair, Arc::new(credentials), allowed, mode),
        directory,
        credential,
        snn: ServingNetworkName::for_plmn(&home).unwrap(),
    }
}

pub(crate) fn ue(f: &Fixture, mode: AnonymityMode, policy: PhysicalBindingPolicy) -> UeEngine {
    UeEngine::new(f.credential.clone(), &f.directory, mode, policy).unwrap()
}

pub(crate) fn concealed(message: &UplinkMessage) -> ConcealedIdentity {
    match message {
        UplinkMessage::Identity { concealed_identity } => concealed_identity.clone(),
        other => panic!("expected identity, got {:?}", other),
    }
}

/// A subscriber waiting for its challenge, plus the vector and session the
/// home network issued for it.
pub(crate) fn issued(f: &Fixture) -> (UeEngine, AuthenticationVector, HssSession, ConcealedIdentity) {
    let mut ue = ue(f, AnonymityMode::Derived, PhysicalBindingPolicy::Implicit);
    let identity = concealed(&ue.initiate().unwrap());
    ue.observe_channel(ChannelState::random()).unwrap();
    let (vector, session) = f
        .hss
        .issue_vector(Uuid::new_v4(), identity.clone(), f.snn.clone())
        .unwrap();
    (ue, vector, session, identity)
}

/// The downlink a serving network would send for `vector`, tagged over an
/// unrelated channel observation.
pub(crate) fn downlink(f: &Fixture, vector: &AuthenticationVector) -> DownlinkChallenge {
    DownlinkChallenge {
        first_challenge: vector.first_challenge,
        autn: vector.autn,
        serving_network_name: f.snn.clone(),
        binding_tag: compute_binding_tag(&ChannelState::random(), &vector.second_challenge),
    }
}
