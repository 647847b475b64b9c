//! Subscriber identity concealment.
//!
//! The envelope plaintext is `nonce(16) || utf8(SUPI)`. Only the holder of the
//! home network's private key can open it; every other party relays it as
//! opaque bytes next to the clear-text home network identity.

use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::crypto::ecies;
use crate::types::credentials::NetworkKeyPair;
use crate::types::error::{AkaError, AkaResult};
use crate::types::identity::{Plmn, Supi};
use crate::types::wire::hex_vec;

pub const CONCEALMENT_NONCE_SIZE: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConcealedIdentity {
    pub home_network: Plmn,
    #[serde(with = "hex_vec")]
    pub scheme_output: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevealedIdentity {
    pub supi: Supi,
    pub nonce: [u8; CONCEALMENT_NONCE_SIZE],
}

pub fn conceal(
    supi: &Supi,
    home_network: &Plmn,
    public_key: &[u8; ecies::X25519_KEY_SIZE],
) -> AkaResult<ConcealedIdentity> {
    let mut nonce = [0u8; CONCEALMENT_NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce);
    conceal_with_nonce(supi, home_network, public_key, nonce)
}

pub fn conceal_with_nonce(
    supi: &Supi,
    home_network: &Plmn,
    public_key: &[u8; ecies::X25519_KEY_SIZE],
    nonce: [u8; CONCEALMENT_NONCE_SIZE],
) -> AkaResult<ConcealedIdentity> {
    let identity = supi.to_string();
    let mut plaintext = Vec::with_capacity(CONCEALMENT_NONCE_SIZE + identity.len());
    plaintext.extend_from_slice(&nonce);
    plaintext.extend_from_slice(identity.as_bytes());

    let scheme_output =
        ecies::encrypt(&plaintext, public_key).map_err(|e| AkaError::Crypto(e.to_string()))?;

    Ok(ConcealedIdentity {
        home_network: home_network.clone(),
        scheme_output,
    })
}

/// Opens a concealed identity. Every failure, including a well-formed
/// envelope carrying an unparsable identity, is a `DecryptionFailure`.
pub fn reveal(
    concealed: &ConcealedIdentity,
    key_pair: &NetworkKeyPair,
) -> AkaResult<RevealedIdentity> {
    let plaintext = ecies::decrypt(&concealed.scheme_output, key_pair.private_key())
        .map_err(|e| {
            tracing::debug!("Concealed identity rejected: {}", e);
            AkaError::DecryptionFailure
        })?;

    if plaintext.len() <= CONCEALMENT_NONCE_SIZE {
        return Err(AkaError::DecryptionFailure);
    }
    let (nonce_bytes, identity) = plaintext.split_at(CONCEALMENT_NONCE_SIZE);

    let mut nonce = [0u8; CONCEALMENT_NONCE_SIZE];
    nonce.copy_from_slice(nonce_bytes);

    let identity = std::str::from_utf8(identity).map_err(|_| AkaError::DecryptionFailure)?;
    let supi = Supi::parse(identity).map_err(|_| AkaError::DecryptionFailure)?;

    Ok(RevealedIdentity { supi, nonce })
}
