//! ECIES over X25519 used to conceal the subscriber identity.
//!
//! X9.63 KDF with SHA-256 expands the shared secret into an AES-128-CTR key,
//! an IV and an HMAC-SHA256 key. The tag covers the ciphertext and is checked
//! before anything is decrypted.

use aes::cipher::{KeyIvInit, StreamCipher};
use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use x25519_dalek::{PublicKey, StaticSecret};

pub const X25519_KEY_SIZE: usize = 32;
const AES_KEY_SIZE: usize = 16;
const AES_IV_SIZE: usize = 16;
const HMAC_KEY_SIZE: usize = 32;
pub const MAC_TAG_SIZE: usize = 32;

type Aes128Ctr = ctr::Ctr128BE<aes::Aes128>;

#[derive(Debug, thiserror::Error)]
pub enum EciesError {
    #[error("Invalid ciphertext: {0}")]
    InvalidCiphertext(String),
    #[error("MAC verification failed")]
    MacVerificationFailed,
    #[error("Key derivation error: {0}")]
    KeyDerivation(String),
}

pub type EciesResult<T> = Result<T, EciesError>;

#[derive(Clone)]
pub struct EciesKeyPair {
    private_key: [u8; X25519_KEY_SIZE],
    public_key: [u8; X25519_KEY_SIZE],
}

impl EciesKeyPair {
    pub fn generate() -> Self {
        let secret = StaticSecret::random_from_rng(OsRng);
        Self::from_seed(&secret.to_bytes())
    }

    pub fn from_seed(seed: &[u8; X25519_KEY_SIZE]) -> Self {
        let secret = StaticSecret::from(*seed);
        let public = PublicKey::from(&secret);
        Self {
            private_key: *seed,
            public_key: *public.as_bytes(),
        }
    }

    pub fn public_key(&self) -> &[u8; X25519_KEY_SIZE] {
        &self.public_key
    }

    pub fn private_key(&self) -> &[u8; X25519_KEY_SIZE] {
        &self.private_key
    }
}

fn x963_kdf(shared_secret: &[u8], shared_info: &[u8], key_size: usize) -> Vec<u8> {
    const SHA256_DIGEST_SIZE: usize = 32;
    let rounds = key_size.div_ceil(SHA256_DIGEST_SIZE);
    let mut result = Vec::with_capacity(rounds * SHA256_DIGEST_SIZE);
    for counter in 1..=rounds {
        let mut hasher = Sha256::new();
        hasher.update(shared_secret);
        hasher.update((counter as u32).to_be_bytes());
        hasher.update(shared_info);
        result.extend_from_slice(&hasher.finalize());
    }
    result.truncate(key_size);
    result
}

struct SessionKeys {
    encryption_key: [u8; AES_KEY_SIZE],
    iv: [u8; AES_IV_SIZE],
    mac_key: [u8; HMAC_KEY_SIZE],
}

impl SessionKeys {
    fn derive(shared_secret: &[u8], ephemeral_public_key: &[u8]) -> EciesResult<Self> {
        let derived = x963_kdf(
            shared_secret,
            ephemeral_public_key,
            AES_KEY_SIZE + AES_IV_SIZE + HMAC_KEY_SIZE,
        );
        let split = |from: usize, to: usize| {
            derived
                .get(from..to)
                .ok_or_else(|| EciesError::KeyDerivation("derived key too short".to_string()))
        };

        let mut keys = SessionKeys {
            encryption_key: [0u8; AES_KEY_SIZE],
            iv: [0u8; AES_IV_SIZE],
            mac_key: [0u8; HMAC_KEY_SIZE],
        };
        keys.encryption_key.copy_from_slice(split(0, AES_KEY_SIZE)?);
        keys.iv.copy_from_slice(split(AES_KEY_SIZE, AES_KEY_SIZE + AES_IV_SIZE)?);
        keys.mac_key
            .copy_from_slice(split(AES_KEY_SIZE + AES_IV_SIZE, derived.len())?);
        Ok(keys)
    }

    fn tag(&self, ciphertext: &[u8]) -> EciesResult<[u8; MAC_TAG_SIZE]> {
        let mut mac = Hmac::<Sha256>::new_from_slice(&self.mac_key)
            .map_err(|e| EciesError::KeyDerivation(e.to_string()))?;
        mac.update(ciphertext);
        let mut tag = [0u8; MAC_TAG_SIZE];
        tag.copy_from_slice(&mac.finalize().into_bytes());
        Ok(tag)
    }

    fn apply_keystream(&self, data: &mut [u8]) {
        let mut cipher = Aes128Ctr::new(&self.encryption_key.into(), &self.iv.into());
        cipher.apply_keystream(data);
    }
}

/// Encrypts under `public_key` with a fresh ephemeral key; the output is
/// `ephemeral_public_key || ciphertext || tag`.
pub fn encrypt(plaintext: &[u8], public_key: &[u8; X25519_KEY_SIZE]) -> EciesResult<Vec<u8>> {
    encrypt_with_keypair(plaintext, public_key, &EciesKeyPair::generate())
}

pub fn encrypt_with_keypair(
    plaintext: &[u8],
    public_key: &[u8; X25519_KEY_SIZE],
    ephemeral: &EciesKeyPair,
) -> EciesResult<Vec<u8>> {
    let secret = StaticSecret::from(*ephemeral.private_key());
    let shared = secret.diffie_hellman(&PublicKey::from(*public_key));
    let keys = SessionKeys::derive(shared.as_bytes(), ephemeral.public_key())?;

    let mut ciphertext = plaintext.to_vec();
    keys.apply_keystream(&mut ciphertext);
    let tag = keys.tag(&ciphertext)?;

    let mut output = Vec::with_capacity(X25519_KEY_SIZE + ciphertext.len() + MAC_TAG_SIZE);
    output.extend_from_slice(ephemeral.public_key());
    output.extend_from_slice(&ciphertext);
    output.extend_from_slice(&tag);
    Ok(output)
}

pub fn decrypt(envelope: &[u8], private_key: &[u8; X25519_KEY_SIZE]) -> EciesResult<Vec<u8>> {
    if envelope.len() < X25519_KEY_SIZE + MAC_TAG_SIZE {
        return Err(EciesError::InvalidCiphertext(format!(
            "envelope too short: {} bytes",
            envelope.len()
        )));
    }

    let (ephemeral_public_key, rest) = envelope.split_at(X25519_KEY_SIZE);
    let (ciphertext, tag) = rest.split_at(rest.len() - MAC_TAG_SIZE);

    let mut ephemeral = [0u8; X25519_KEY_SIZE];
    ephemeral.copy_from_slice(ephemeral_public_key);

    let secret = StaticSecret::from(*private_key);
    let shared = secret.diffie_hellman(&PublicKey::from(ephemeral));
    let keys = SessionKeys::derive(shared.as_bytes(), ephemeral_public_key)?;

    let expected = keys.tag(ciphertext)?;
    if !bool::from(expected[..].ct_eq(tag)) {
        return Err(EciesError::MacVerificationFailed);
    }

    let mut plaintext = ciphertext.to_vec();
    keys.apply_keystream(&mut plaintext);
    Ok(plaintext)
}
