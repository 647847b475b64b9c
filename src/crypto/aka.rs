//! The key hierarchy both the subscriber and the home network derive from the
//! long-term key and the first challenge.

use std::fmt;

use crate::crypto::functions::{
    derive_anonymity_key, derive_confidentiality_key, derive_integrity_key, mac, truncated_mac,
    verify_mac,
};
use crate::crypto::kdf::{compute_hxres_star, derive_kausf, derive_kseaf, derive_res_star};
use crate::types::config::AnonymityMode;
use crate::types::credentials::LongTermKey;
use crate::types::identity::ServingNetworkName;
use crate::types::vector::{
    AnchorKey, AuthenticationToken, Challenge, ExtendedResponse, ResponseHash, CHALLENGE_SIZE,
    KEY_128_SIZE, KEY_256_SIZE, RES_SIZE,
};

pub struct AkaKeys {
    pub ck: [u8; KEY_128_SIZE],
    pub ik: [u8; KEY_128_SIZE],
    pub ak: [u8; KEY_128_SIZE],
    pub res: [u8; RES_SIZE],
    pub res_star: ExtendedResponse,
    pub kausf: [u8; KEY_256_SIZE],
    pub kseaf: AnchorKey,
}

impl fmt::Debug for AkaKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AkaKeys")
            .field("res_star", &self.res_star)
            .finish_non_exhaustive()
    }
}

impl AkaKeys {
    /// Derives CK, IK and AK from `(key, r1)`, then RES* and the two-step
    /// anchor key bound to `snn` and the masked second challenge.
    pub fn derive(
        key: &LongTermKey,
        first_challenge: &Challenge,
        masked_challenge: &[u8; CHALLENGE_SIZE],
        snn: &ServingNetworkName,
        mode: AnonymityMode,
    ) -> Self {
        let ck = derive_confidentiality_key(key, first_challenge);
        let ik = derive_integrity_key(key, first_challenge);
        let ak = derive_anonymity_key(key, first_challenge, mode);
        let res = truncated_mac(key, first_challenge);

        let res_star = derive_res_star(&ck, &ik, snn.as_bytes(), first_challenge, &res);
        let kausf = derive_kausf(&ck, &ik, snn.as_bytes(), masked_challenge);
        let kseaf = derive_kseaf(&kausf, snn.as_bytes());

        Self {
            ck,
            ik,
            ak,
            res,
            res_star,
            kausf,
            kseaf,
        }
    }

    pub fn hxres_star(&self, first_challenge: &Challenge) -> ResponseHash {
        compute_hxres_star(first_challenge, &self.res_star)
    }
}

/// Builds the token proving the vector came from the subscriber's home network.
pub fn build_token(
    key: &LongTermKey,
    first_challenge: &Challenge,
    second_challenge: &Challenge,
    mode: AnonymityMode,
) -> AuthenticationToken {
    let ak = derive_anonymity_key(key, first_challenge, mode);
    AuthenticationToken {
        masked_challenge: second_challenge.xor(&ak),
        mac: mac(key.as_bytes(), first_challenge.as_bytes()),
    }
}

/// Verifies the token's MAC and returns the unmasked second challenge.
pub fn open_token(
    key: &LongTermKey,
    first_challenge: &Challenge,
    token: &AuthenticationToken,
    mode: AnonymityMode,
) -> Option<Challenge> {
    if !verify_mac(key.as_bytes(), first_challenge.as_bytes(), &token.mac) {
        return None;
    }
    let ak = derive_anonymity_key(key, first_challenge, mode);
    let mut second = [0u8; CHALLENGE_SIZE];
    for (out, (m, a)) in second
        .iter_mut()
        .zip(token.masked_challenge.iter().zip(ak.iter()))
    {
        *out = m ^ a;
    }
    Some(Challenge(second))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::identity::Plmn;
    use proptest::prelude::*;

    fn snn() -> ServingNetworkName {
        ServingNetworkName::for_plmn(&Plmn::parse("00101").unwrap()).unwrap()
    }

    #[test]
    fn test_token_roundtrip_recovers_second_challenge() {
        let key = LongTermKey([0x11u8; 16]);
        let r1 = Challenge::random();
        let r2 = Challenge::random();

        for mode in [AnonymityMode::Derived, AnonymityMode::Zero] {
            let token = build_token(&key, &r1, &r2, mode);
            assert_eq!(open_token(&key, &r1, &token, mode), Some(r2));
        }
    }

    #[test]
    fn test_zero_mode_leaves_challenge_in_clear() {
        let key = LongTermKey([0x11u8; 16]);
        let r1 = Challenge::random();
        let r2 = Challenge::random();
        let token = build_token(&key, &r1, &r2, AnonymityMode::Zero);
        assert_eq!(&token.masked_challenge, r2.as_bytes());
    }

    #[test]
    fn test_token_rejected_under_wrong_key() {
        let r1 = Challenge::random();
        let token = build_token(&LongTermKey([0x11u8; 16]), &r1, &Challenge::random(), AnonymityMode::Derived);
        assert!(open_token(&LongTermKey([0x12u8; 16]), &r1, &token, AnonymityMode::Derived).is_none());
    }

    #[test]
    fn test_anchor_key_bound_to_masked_challenge() {
        let key = LongTermKey([0x11u8; 16]);
        let r1 = Challenge([0x01u8; 16]);
        let a = AkaKeys::derive(&key, &r1, &[0xAA; 16], &snn(), AnonymityMode::Derived);
        let b = AkaKeys::derive(&key, &r1, &[0xAB; 16], &snn(), AnonymityMode::Derived);
        assert_ne!(a.kseaf, b.kseaf);
        assert_eq!(a.res_star, b.res_star);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_token_recovers_only_under_issuing_key(
            key in proptest::array::uniform16(any::<u8>()),
            other in proptest::array::uniform16(any::<u8>()),
            r1 in proptest::array::uniform16(any::<u8>()),
            r2 in proptest::array::uniform16(any::<u8>()),
            zero_mode in any::<bool>(),
        ) {
            prop_assume!(key != other);
            let mode = if zero_mode { AnonymityMode::Zero } else { AnonymityMode::Derived };
            let r1 = Challenge(r1);
            let token = build_token(&LongTermKey(key), &r1, &Challenge(r2), mode);

            prop_assert_eq!(open_token(&LongTermKey(key), &r1, &token, mode), Some(Challenge(r2)));
            prop_assert_eq!(open_token(&LongTermKey(other), &r1, &token, mode), None);
        }
    }
}
