pub mod config;
pub mod credentials;
pub mod error;
pub mod identity;
pub mod messages;
pub mod session_store;
pub mod tls;
pub mod vector;
pub mod wire;

pub use config::{AkaConfig, AnonymityMode, PhysicalBindingPolicy};
pub use credentials::{
    CredentialStore, InMemoryCredentials, InMemoryDirectory, LongTermCredential, LongTermKey,
    NetworkKeyPair, PublicKeyDirectory,
};
pub use error::{AkaError, AkaResult, RejectCause};
pub use identity::{Plmn, ServingNetworkName, Supi};
pub use messages::{
    ConfirmationOutcome, DownlinkChallenge, HomeMessage, SecureEnvelope, UplinkMessage,
};
pub use session_store::{NonceLedger, SessionStore};
pub use vector::{
    AnchorKey, AuthenticationToken, AuthenticationVector, Challenge, ExtendedResponse,
    PhysicalBindingTag, ResponseHash,
};
