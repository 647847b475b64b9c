//! Physical-layer binding of the downlink challenge.

use rand::rngs::OsRng;
use rand::RngCore;
use std::fmt;

use crate::crypto::functions::mac;
use crate::crypto::kdf::{kdf, kdf_input, FcValue, MAX_PARAMETER_SIZE};
use crate::types::error::{AkaError, AkaResult};
use crate::types::vector::{Challenge, PhysicalBindingTag, KEY_256_SIZE};

const PHYSICAL_KEY_LABEL: &[u8] = b"physical-layer-key";

/// Channel-state information observed on the radio link for one attempt.
/// Only usable as input to [`derive_physical_key`].
#[derive(Clone, PartialEq, Eq)]
pub struct ChannelState(Vec<u8>);

impl ChannelState {
    /// Wraps a radio measurement. It feeds one KDF parameter, so it must
    /// fit a two-octet length.
    pub fn from_measurement(measurement: impl Into<Vec<u8>>) -> AkaResult<Self> {
        let measurement = measurement.into();
        if measurement.len() > MAX_PARAMETER_SIZE {
            return Err(AkaError::Crypto(format!(
                "channel measurement of {} bytes exceeds {} bytes",
                measurement.len(),
                MAX_PARAMETER_SIZE
            )));
        }
        Ok(ChannelState(measurement))
    }

    /// Stand-in for a radio measurement when no physical layer is attached.
    pub fn random() -> Self {
        let mut bytes = vec![0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        ChannelState(bytes)
    }
}

impl fmt::Debug for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ChannelState(<opaque>)")
    }
}

pub fn derive_physical_key(csi: &ChannelState) -> [u8; KEY_256_SIZE] {
    kdf(PHYSICAL_KEY_LABEL, &kdf_input(FcValue::PhysicalKey, &[&csi.0]))
}

/// SNMAC: MAC over the second challenge under the physical-layer key.
pub fn compute_binding_tag(csi: &ChannelState, second_challenge: &Challenge) -> PhysicalBindingTag {
    PhysicalBindingTag(mac(&derive_physical_key(csi), second_challenge.as_bytes()))
}

pub fn verify_binding_tag(
    csi: &ChannelState,
    second_challenge: &Challenge,
    tag: &PhysicalBindingTag,
) -> bool {
    compute_binding_tag(csi, second_challenge).ct_eq(tag)
}
