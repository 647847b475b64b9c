use std::collections::HashMap;
use std::fmt;
use std::sync::RwLock;

use crate::crypto::ecies::{EciesKeyPair, X25519_KEY_SIZE};
use crate::crypto::home_network::same_network;
use crate::types::error::{AkaError, AkaResult};
use crate::types::identity::{Plmn, Supi};
use crate::types::vector::LONG_TERM_KEY_SIZE;

#[derive(Clone, PartialEq, Eq)]
pub struct LongTermKey(pub [u8; LONG_TERM_KEY_SIZE]);

impl LongTermKey {
    pub fn random() -> Self {
        use rand::RngCore;
        let mut bytes = [0u8; LONG_TERM_KEY_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        LongTermKey(bytes)
    }

    pub fn from_hex(encoded: &str) -> AkaResult<Self> {
        let bytes = hex::decode(encoded)
            .map_err(|e| AkaError::Provisioning(format!("Invalid long-term key hex: {}", e)))?;
        let bytes: [u8; LONG_TERM_KEY_SIZE] = bytes.try_into().map_err(|b: Vec<u8>| {
            AkaError::Provisioning(format!(
                "Long-term key must be {} bytes, got {}",
                LONG_TERM_KEY_SIZE,
                b.len()
            ))
        })?;
        Ok(LongTermKey(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; LONG_TERM_KEY_SIZE] {
        &self.0
    }
}

impl fmt::Debug for LongTermKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("LongTermKey(<redacted>)")
    }
}

#[derive(Debug, Clone)]
pub struct LongTermCredential {
    pub supi: Supi,
    pub home_network: Plmn,
    pub key: LongTermKey,
}

/// The home network's asymmetric identity. The private half stays inside
/// the home network process.
#[derive(Clone)]
pub struct NetworkKeyPair {
    pub network: Plmn,
    keys: EciesKeyPair,
}

impl NetworkKeyPair {
    pub fn generate(network: Plmn) -> Self {
        Self {
            network,
            keys: EciesKeyPair::generate(),
        }
    }

    pub fn public_key(&self) -> &[u8; X25519_KEY_SIZE] {
        self.keys.public_key()
    }

    pub(crate) fn private_key(&self) -> &[u8; X25519_KEY_SIZE] {
        self.keys.private_key()
    }
}

impl fmt::Debug for NetworkKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkKeyPair")
            .field("network", &self.network)
            .field("public_key", &hex::encode(self.public_key()))
            .finish_non_exhaustive()
    }
}

/// Read-only lookup of long-term keys by subscriber identity.
pub trait CredentialStore: Send + Sync {
    fn lookup_long_term_key(&self, supi: &Supi) -> Option<LongTermKey>;
}

/// Read-only lookup of home network public keys.
pub trait PublicKeyDirectory: Send + Sync {
    fn lookup_public_key(&self, network: &Plmn) -> Option<[u8; X25519_KEY_SIZE]>;
}

#[derive(Default)]
pub struct InMemoryCredentials {
    credentials: RwLock<HashMap<Supi, LongTermCredential>>,
}

impl InMemoryCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issues a credential. A subscriber identity belongs to exactly one
    /// home network, so re-issuing under another network is refused, as is
    /// an IMSI whose own PLMN is not the home network.
    pub fn provision(&self, credential: LongTermCredential) -> AkaResult<()> {
        if let Some(plmn) = credential.supi.extract_plmn() {
            if !same_network(&plmn, &credential.home_network) {
                return Err(AkaError::Provisioning(format!(
                    "{} belongs to PLMN {}, not home network {}",
                    credential.supi, plmn, credential.home_network
                )));
            }
        }

        let mut credentials = self
            .credentials
            .write()
            .map_err(|_| AkaError::Provisioning("credential store poisoned".to_string()))?;

        if let Some(existing) = credentials.get(&credential.supi) {
            if existing.home_network != credential.home_network {
                return Err(AkaError::Provisioning(format!(
                    "{} is already provisioned under home network {}",
                    credential.supi, existing.home_network
                )));
            }
        }

        tracing::debug!("Provisioned credential for {}", credential.supi);
        credentials.insert(credential.supi.clone(), credential);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.credentials.read().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CredentialStore for InMemoryCredentials {
    fn lookup_long_term_key(&self, supi: &Supi) -> Option<LongTermKey> {
        self.credentials
            .read()
            .ok()
            .and_then(|c| c.get(supi).map(|cred| cred.key.clone()))
    }
}

#[derive(Default)]
pub struct InMemoryDirectory {
    keys: RwLock<HashMap<Plmn, [u8; X25519_KEY_SIZE]>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, key_pair: &NetworkKeyPair) {
        if let Ok(mut keys) = self.keys.write() {
            keys.insert(key_pair.network.clone(), *key_pair.public_key());
        }
    }
}

impl PublicKeyDirectory for InMemoryDirectory {
    fn lookup_public_key(&self, network: &Plmn) -> Option<[u8; X25519_KEY_SIZE]> {
        self.keys.read().ok().and_then(|k| k.get(network).copied())
    }
}
