use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use crate::types::vector::{
    AnchorKey, Challenge, ExtendedResponse, ResponseHash, CHALLENGE_SIZE, KEY_128_SIZE,
    KEY_256_SIZE, RES_STAR_SIZE,
};

type HmacSha256 = Hmac<Sha256>;

/// Function codes of the key derivations built on [`kdf`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FcValue {
    Kausf = 0x6A,
    ResStar = 0x6B,
    Kseaf = 0x6C,
    Kamf = 0x6D,
    PhysicalKey = 0x71,
}

pub fn kdf(key: &[u8], input: &[u8]) -> [u8; KEY_256_SIZE] {
    let mut mac = HmacSha256::new_from_slice(key)
        .unwrap_or_else(|_| unreachable!("HMAC-SHA256 accepts keys of any size"));
    mac.update(input);
    let mut out = [0u8; KEY_256_SIZE];
    out.copy_from_slice(&mac.finalize().into_bytes());
    out
}

/// Longest parameter a two-octet length field can describe.
pub const MAX_PARAMETER_SIZE: usize = u16::MAX as usize;

/// Builds `S = FC || P0 || L0 || ... || Pn || Ln` with two-octet lengths.
/// Variable-length inputs are bounded by [`MAX_PARAMETER_SIZE`] where they
/// are constructed, so the length always fits.
pub(crate) fn kdf_input(fc: FcValue, parameters: &[&[u8]]) -> Vec<u8> {
    let mut s = Vec::with_capacity(1 + parameters.iter().map(|p| p.len() + 2).sum::<usize>());
    s.push(fc as u8);
    for param in parameters {
        debug_assert!(param.len() <= MAX_PARAMETER_SIZE);
        let length = u16::try_from(param.len()).unwrap_or(u16::MAX);
        s.extend_from_slice(param);
        s.extend_from_slice(&length.to_be_bytes());
    }
    s
}

fn ck_ik_key(ck: &[u8; KEY_128_SIZE], ik: &[u8; KEY_128_SIZE]) -> [u8; KEY_256_SIZE] {
    let mut key = [0u8; KEY_256_SIZE];
    key[..KEY_128_SIZE].copy_from_slice(ck);
    key[KEY_128_SIZE..].copy_from_slice(ik);
    key
}

/// Pre-anchor key, bound to the serving network and the masked second challenge.
pub fn derive_kausf(
    ck: &[u8; KEY_128_SIZE],
    ik: &[u8; KEY_128_SIZE],
    serving_network_name: &[u8],
    masked_challenge: &[u8; CHALLENGE_SIZE],
) -> [u8; KEY_256_SIZE] {
    let key = ck_ik_key(ck, ik);
    kdf(&key, &kdf_input(FcValue::Kausf, &[serving_network_name, masked_challenge]))
}

pub fn derive_kseaf(kausf: &[u8; KEY_256_SIZE], serving_network_name: &[u8]) -> AnchorKey {
    AnchorKey(kdf(kausf, &kdf_input(FcValue::Kseaf, &[serving_network_name])))
}

pub fn derive_res_star(
    ck: &[u8; KEY_128_SIZE],
    ik: &[u8; KEY_128_SIZE],
    serving_network_name: &[u8],
    rand: &Challenge,
    res: &[u8],
) -> ExtendedResponse {
    let key = ck_ik_key(ck, ik);
    let output = kdf(
        &key,
        &kdf_input(FcValue::ResStar, &[serving_network_name, rand.as_bytes(), res]),
    );

    let mut res_star = [0u8; RES_STAR_SIZE];
    res_star.copy_from_slice(&output[KEY_256_SIZE - RES_STAR_SIZE..]);
    ExtendedResponse(res_star)
}

/// HXRES*: the 128 least significant bits of SHA-256(RAND || RES*).
pub fn compute_hxres_star(rand: &Challenge, res_star: &ExtendedResponse) -> ResponseHash {
    let mut hasher = Sha256::new();
    hasher.update(rand.as_bytes());
    hasher.update(res_star.as_bytes());
    let digest = hasher.finalize();

    let mut out = [0u8; RES_STAR_SIZE];
    out.copy_from_slice(&digest[KEY_256_SIZE - RES_STAR_SIZE..]);
    ResponseHash(out)
}

pub fn derive_kamf(kseaf: &AnchorKey, supi: &[u8], abba: &[u8]) -> [u8; KEY_256_SIZE] {
    kdf(kseaf.as_bytes(), &kdf_input(FcValue::Kamf, &[supi, abba]))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SNN: &[u8] = b"5G:mnc001.mcc001.3gppnetwork.org";

    #[test]
    fn test_kdf_basic() {
        let result = kdf(b"test_key", b"test_input");
        assert_eq!(result.len(), 32);
        assert_eq!(result, kdf(b"test_key", b"test_input"));
        assert_ne!(result, kdf(b"test_key", b"other_input"));
    }

    #[test]
    fn test_kdf_input_encoding() {
        let s = kdf_input(FcValue::Kseaf, &[b"ab", b"xyz"]);
        assert_eq!(s, vec![0x6C, b'a', b'b', 0x00, 0x02, b'x', b'y', b'z', 0x00, 0x03]);

        let widest = vec![0u8; MAX_PARAMETER_SIZE];
        let s = kdf_input(FcValue::PhysicalKey, &[&widest]);
        assert_eq!(&s[s.len() - 2..], &[0xFF, 0xFF]);
    }

    #[test]
    fn test_derive_kausf_binds_serving_network() {
        let ck = [0u8; 16];
        let ik = [1u8; 16];
        let masked = [0xAAu8; 16];

        let a = derive_kausf(&ck, &ik, SNN, &masked);
        let b = derive_kausf(&ck, &ik, b"5G:mnc002.mcc001.3gppnetwork.org", &masked);
        assert_ne!(a, b);
    }

    #[test]
    fn test_derive_kseaf_is_deterministic() {
        let kausf = [0x42u8; 32];
        assert_eq!(derive_kseaf(&kausf, SNN), derive_kseaf(&kausf, SNN));
        assert_ne!(derive_kseaf(&kausf, SNN), AnchorKey(kausf));
    }

    #[test]
    fn test_derive_res_star_uses_low_bits() {
        let ck = [0x01u8; 16];
        let ik = [0x02u8; 16];
        let rand = Challenge([0x03u8; 16]);
        let res = [0x04u8; 8];

        let res_star = derive_res_star(&ck, &ik, SNN, &rand, &res);
        let full = kdf(
            &ck_ik_key(&ck, &ik),
            &kdf_input(FcValue::ResStar, &[SNN, rand.as_bytes(), &res]),
        );
        assert_eq!(res_star.as_bytes(), &full[16..]);
    }

    #[test]
    fn test_hxres_star_depends_on_rand() {
        let res_star = ExtendedResponse([0x11u8; 16]);
        let a = compute_hxres_star(&Challenge([0x01u8; 16]), &res_star);
        let b = compute_hxres_star(&Challenge([0x02u8; 16]), &res_star);
        assert_ne!(a, b);
    }

    #[test]
    fn test_derive_kamf_binds_supi() {
        let kseaf = AnchorKey([0x07u8; 32]);
        let a = derive_kamf(&kseaf, b"imsi-001010000000001", &[0, 0]);
        let b = derive_kamf(&kseaf, b"imsi-001010000000002", &[0, 0]);
        assert_ne!(a, b);
    }
}
