pub mod aka;
pub mod concealment;
pub mod ecies;
pub mod functions;
pub mod home_network;
pub mod kdf;
pub mod physical;
pub mod snn;
pub mod validation;

pub use aka::{build_token, open_token, AkaKeys};
pub use concealment::{conceal, conceal_with_nonce, reveal, ConcealedIdentity, RevealedIdentity};
pub use functions::{
    derive_anonymity_key, derive_confidentiality_key, derive_integrity_key, mac, truncated_mac,
    verify_mac,
};
pub use home_network::{check_home_network, ensure_addressed_to, same_network, NetworkLocation};
pub use kdf::{compute_hxres_star, derive_kamf, derive_kausf, derive_kseaf, derive_res_star, kdf};
pub use physical::{compute_binding_tag, derive_physical_key, verify_binding_tag, ChannelState};
pub use snn::{validate_snn, verify_snn_authorization};
pub use validation::{validate_authentication_vector, ValidationError, ValidationResult};
