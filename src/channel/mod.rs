//! Transports between the roles.
//!
//! The serving and home network talk over a secure link that is assumed to be
//! authenticated, confidential and order preserving; nothing here adds to
//! those guarantees. The subscriber leg is the open air.

pub mod air;
pub mod framed;
pub mod memory;

use std::future::Future;

use crate::types::messages::SecureEnvelope;

pub use air::{air_link, AirPort, SeafPort, UePort};

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("peer closed the channel")]
    Closed,
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("frame of {0} bytes exceeds the limit")]
    FrameTooLarge(usize),
    #[error("undecodable frame: {0}")]
    Decode(String),
}

pub trait SecureSender: Send + Sync + 'static {
    fn send(&self, envelope: SecureEnvelope)
        -> impl Future<Output = Result<(), ChannelError>> + Send;
}

/// Delivers envelopes exactly once, in send order, from the named peer.
pub trait SecureReceiver: Send + 'static {
    fn receive(&mut self) -> impl Future<Output = Result<SecureEnvelope, ChannelError>> + Send;
}

/// One end of a secure link, naming both endpoints.
pub struct SecureLink<S, R> {
    pub local: String,
    pub peer: String,
    pub sender: S,
    pub receiver: R,
}

impl<S: SecureSender, R: SecureReceiver> SecureLink<S, R> {
    pub fn new(local: impl Into<String>, peer: impl Into<String>, sender: S, receiver: R) -> Self {
        Self {
            local: local.into(),
            peer: peer.into(),
            sender,
            receiver,
        }
    }

    pub async fn send(&self, envelope: SecureEnvelope) -> Result<(), ChannelError> {
        tracing::debug!(
            from = %self.local,
            to = %self.peer,
            transaction_id = %envelope.transaction_id,
            message = envelope.body.kind(),
            "Sending over secure link"
        );
        self.sender.send(envelope).await
    }

    pub async fn receive(&mut self) -> Result<SecureEnvelope, ChannelError> {
        let envelope = self.receiver.receive().await?;
        tracing::debug!(
            from = %self.peer,
            to = %self.local,
            transaction_id = %envelope.transaction_id,
            message = envelope.body.kind(),
            "Received over secure link"
        );
        Ok(envelope)
    }

    pub fn into_parts(self) -> (String, String, S, R) {
        (self.local, self.peer, self.sender, self.receiver)
    }
}
