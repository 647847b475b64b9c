use serde::{Deserialize, Serialize};

use crate::channel::ChannelError;

#[derive(Debug, thiserror::Error)]
pub enum AkaError {
    #[error("Concealed identity could not be decrypted")]
    DecryptionFailure,
    #[error("Subscriber is not provisioned")]
    UnknownSubscriber,
    #[error("Concealed identity was already used")]
    ReplayedIdentity,
    #[error("Home network MAC verification failed")]
    AuthenticityFailure,
    #[error("Physical-binding tag does not match the observed channel state")]
    BindingFailure,
    #[error("Extended response does not match the expected value")]
    ResponseMismatch,
    #[error("Authentication rejected by the home network: {0}")]
    Rejected(RejectCause),
    #[error("Secure channel unavailable: {0}")]
    ChannelUnavailable(String),
    #[error("Timed out waiting for {0}")]
    Timeout(&'static str),
    #[error("Malformed message: {0}")]
    MalformedMessage(String),
    #[error("Unexpected {message} in state {state}")]
    UnexpectedMessage { state: String, message: &'static str },
    #[error("Invalid identity: {0}")]
    InvalidIdentity(String),
    #[error("Unknown home network: {0}")]
    UnknownHomeNetwork(String),
    #[error("Serving network not authorized: {0}")]
    ServingNetworkNotAuthorized(String),
    #[error("Transaction {0} already has a session")]
    DuplicateTransaction(uuid::Uuid),
    #[error("Provisioning error: {0}")]
    Provisioning(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Cryptographic error: {0}")]
    Crypto(String),
}

pub type AkaResult<T> = Result<T, AkaError>;

impl AkaError {
    /// Errors the home network answers with silence, so that the serving
    /// network cannot tell a bad ciphertext from an unprovisioned or
    /// replayed identity.
    pub fn is_silent_drop(&self) -> bool {
        matches!(
            self,
            AkaError::DecryptionFailure | AkaError::UnknownSubscriber | AkaError::ReplayedIdentity
        )
    }

    pub(crate) fn unexpected(state: impl std::fmt::Debug, message: &'static str) -> Self {
        AkaError::UnexpectedMessage {
            state: format!("{:?}", state),
            message,
        }
    }
}

impl From<ChannelError> for AkaError {
    fn from(err: ChannelError) -> Self {
        AkaError::ChannelUnavailable(err.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectCause {
    #[error("response mismatch")]
    ResponseMismatch,
    #[error("serving network not authorized")]
    ServingNetworkNotAuthorized,
    #[error("serving network mismatch")]
    ServingNetworkMismatch,
    #[error("identity mismatch")]
    IdentityMismatch,
    #[error("unknown transaction")]
    UnknownTransaction,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silent_drop_classification() {
        assert!(AkaError::DecryptionFailure.is_silent_drop());
        assert!(AkaError::UnknownSubscriber.is_silent_drop());
        assert!(AkaError::ReplayedIdentity.is_silent_drop());
        assert!(!AkaError::ResponseMismatch.is_silent_drop());
        assert!(!AkaError::AuthenticityFailure.is_silent_drop());
    }

    #[test]
    fn test_channel_error_maps_to_unavailable() {
        let err: AkaError = ChannelError::Closed.into();
        assert!(matches!(err, AkaError::ChannelUnavailable(_)));
    }
}
