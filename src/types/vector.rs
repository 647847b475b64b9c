use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;
use subtle::ConstantTimeEq;

use crate::types::wire::hex_array;

pub const CHALLENGE_SIZE: usize = 16;
pub const LONG_TERM_KEY_SIZE: usize = 16;
pub const KEY_128_SIZE: usize = 16;
pub const KEY_256_SIZE: usize = 32;
pub const MAC_SIZE: usize = 32;
pub const RES_SIZE: usize = 8;
pub const RES_STAR_SIZE: usize = 16;

/// A single-use random challenge drawn from the OS CSPRNG.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Challenge(#[serde(with = "hex_array")] pub [u8; CHALLENGE_SIZE]);

impl Challenge {
    pub fn random() -> Self {
        let mut bytes = [0u8; CHALLENGE_SIZE];
        OsRng.fill_bytes(&mut bytes);
        Challenge(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; CHALLENGE_SIZE] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }

    pub fn xor(&self, mask: &[u8; CHALLENGE_SIZE]) -> [u8; CHALLENGE_SIZE] {
        let mut out = self.0;
        for (o, m) in out.iter_mut().zip(mask.iter()) {
            *o ^= m;
        }
        out
    }
}

impl fmt::Debug for Challenge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Challenge({})", hex::encode(self.0))
    }
}

/// Root of the post-authentication key hierarchy (K_SEAF).
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorKey(#[serde(with = "hex_array")] pub [u8; KEY_256_SIZE]);

impl AnchorKey {
    pub fn as_bytes(&self) -> &[u8; KEY_256_SIZE] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }
}

impl fmt::Debug for AnchorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AnchorKey(<redacted>)")
    }
}

/// RES*: the subscriber's proof of key possession.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtendedResponse(#[serde(with = "hex_array")] pub [u8; RES_STAR_SIZE]);

impl ExtendedResponse {
    pub fn as_bytes(&self) -> &[u8; RES_STAR_SIZE] {
        &self.0
    }
}

impl fmt::Debug for ExtendedResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ExtendedResponse({})", hex::encode(self.0))
    }
}

/// HXRES*, compared in constant time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseHash(#[serde(with = "hex_array")] pub [u8; RES_STAR_SIZE]);

impl ResponseHash {
    pub fn ct_eq(&self, other: &ResponseHash) -> bool {
        self.0[..].ct_eq(&other.0[..]).into()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationToken {
    /// Second challenge XOR anonymity key.
    #[serde(with = "hex_array")]
    pub masked_challenge: [u8; CHALLENGE_SIZE],
    #[serde(with = "hex_array")]
    pub mac: [u8; MAC_SIZE],
}

/// One-time bundle issued by the home network for exactly one serving
/// network session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationVector {
    pub first_challenge: Challenge,
    pub second_challenge: Challenge,
    pub hxres_star: ResponseHash,
    pub kseaf: AnchorKey,
    pub autn: AuthenticationToken,
}

/// MAC over the second challenge keyed by the physical-layer key.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhysicalBindingTag(#[serde(with = "hex_array")] pub [u8; MAC_SIZE]);

impl PhysicalBindingTag {
    pub fn ct_eq(&self, other: &PhysicalBindingTag) -> bool {
        self.0[..].ct_eq(&other.0[..]).into()
    }
}

impl fmt::Debug for PhysicalBindingTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PhysicalBindingTag({})", hex::encode(self.0))
    }
}
