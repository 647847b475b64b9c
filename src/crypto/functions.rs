//! Subscriber authentication functions keyed by the long-term key.
//!
//! Each function is HMAC-SHA256 under its own one-octet function code, so the
//! outputs for the same key and challenge are independent of each other.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::types::config::AnonymityMode;
use crate::types::credentials::LongTermKey;
use crate::types::vector::{Challenge, KEY_128_SIZE, MAC_SIZE, RES_SIZE};

type HmacSha256 = Hmac<Sha256>;

const FC_MAC: u8 = 0x01;
const FC_RES: u8 = 0x02;
const FC_CK: u8 = 0x03;
const FC_IK: u8 = 0x04;
const FC_AK: u8 = 0x05;

fn keyed(key: &[u8], fc: u8, input: &[u8]) -> [u8; 32] {
    let mut mac = HmacSha256::new_from_slice(key)
        .unwrap_or_else(|_| unreachable!("HMAC-SHA256 accepts keys of any size"));
    mac.update(&[fc]);
    mac.update(input);
    let mut out = [0u8; 32];
    out.copy_from_slice(&mac.finalize().into_bytes());
    out
}

fn truncate<const N: usize>(full: [u8; 32]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&full[..N]);
    out
}

pub fn mac(key: &[u8], input: &[u8]) -> [u8; MAC_SIZE] {
    keyed(key, FC_MAC, input)
}

pub fn verify_mac(key: &[u8], input: &[u8], tag: &[u8; MAC_SIZE]) -> bool {
    mac(key, input)[..].ct_eq(&tag[..]).into()
}

/// XRES/RES: the basic response to the first challenge.
pub fn truncated_mac(key: &LongTermKey, rand: &Challenge) -> [u8; RES_SIZE] {
    truncate(keyed(key.as_bytes(), FC_RES, rand.as_bytes()))
}

pub fn derive_confidentiality_key(key: &LongTermKey, rand: &Challenge) -> [u8; KEY_128_SIZE] {
    truncate(keyed(key.as_bytes(), FC_CK, rand.as_bytes()))
}

pub fn derive_integrity_key(key: &LongTermKey, rand: &Challenge) -> [u8; KEY_128_SIZE] {
    truncate(keyed(key.as_bytes(), FC_IK, rand.as_bytes()))
}

pub fn derive_anonymity_key(
    key: &LongTermKey,
    rand: &Challenge,
    mode: AnonymityMode,
) -> [u8; KEY_128_SIZE] {
    match mode {
        AnonymityMode::Derived => truncate(keyed(key.as_bytes(), FC_AK, rand.as_bytes())),
        AnonymityMode::Zero => [0u8; KEY_128_SIZE],
    }
}
