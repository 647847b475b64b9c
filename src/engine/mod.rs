//! Per-role protocol state machines. They hold no I/O: each step consumes a
//! typed message and returns the message to send next.

pub mod hss;
pub mod seaf;
pub mod ue;

#[cfg(test)]
pub(crate) mod test_support;

use std::fmt;

use crate::types::identity::{ServingNetworkName, Supi};
use crate::types::vector::{AnchorKey, KEY_256_SIZE};

pub use hss::{HssEngine, HssSession, HssState};
pub use seaf::{SeafEngine, SeafState};
pub use ue::{UeEngine, UeState};

/// Anti-bidding-down between architectures; no features are negotiated.
pub const ABBA: [u8; 2] = [0x00, 0x00];

/// Keys a role holds once an attempt completes.
#[derive(Clone)]
pub struct SessionKeys {
    pub supi: Supi,
    pub serving_network_name: ServingNetworkName,
    pub kseaf: AnchorKey,
    pub kamf: [u8; KEY_256_SIZE],
}

impl fmt::Debug for SessionKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionKeys")
            .field("supi", &self.supi)
            .field("serving_network_name", &self.serving_network_name)
            .finish_non_exhaustive()
    }
}
