use tokio::sync::mpsc;

use super::{ChannelError, SecureLink, SecureReceiver, SecureSender};
use crate::types::messages::SecureEnvelope;

const LINK_CAPACITY: usize = 256;

#[derive(Clone)]
pub struct MemorySender(mpsc::Sender<SecureEnvelope>);

pub struct MemoryReceiver(mpsc::Receiver<SecureEnvelope>);

impl SecureSender for MemorySender {
    async fn send(&self, envelope: SecureEnvelope) -> Result<(), ChannelError> {
        self.0.send(envelope).await.map_err(|_| ChannelError::Closed)
    }
}

impl SecureReceiver for MemoryReceiver {
    async fn receive(&mut self) -> Result<SecureEnvelope, ChannelError> {
        self.0.recv().await.ok_or(ChannelError::Closed)
    }
}

pub type MemoryLink = SecureLink<MemorySender, MemoryReceiver>;

/// In-process secure link; returns the ends held by `a` and `b`.
pub fn pair(a: &str, b: &str) -> (MemoryLink, MemoryLink) {
    let (a_tx, b_rx) = mpsc::channel(LINK_CAPACITY);
    let (b_tx, a_rx) = mpsc::channel(LINK_CAPACITY);
    (
        SecureLink::new(a, b, MemorySender(a_tx), MemoryReceiver(a_rx)),
        SecureLink::new(b, a, MemorySender(b_tx), MemoryReceiver(b_rx)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::error::RejectCause;
    use crate::types::messages::{ConfirmationOutcome, HomeMessage};
    use uuid::Uuid;

    fn envelope() -> SecureEnvelope {
        SecureEnvelope::new(
            Uuid::new_v4(),
            HomeMessage::Aca {
                outcome: ConfirmationOutcome::Rejected {
                    cause: RejectCause::UnknownTransaction,
                },
            },
        )
    }

    #[tokio::test]
    async fn test_pair_preserves_order() {
        let (seaf, mut hss) = pair("seaf", "hss");
        let first = envelope();
        let second = envelope();
        seaf.send(first.clone()).await.unwrap();
        seaf.send(second.clone()).await.unwrap();

        assert_eq!(hss.receive().await.unwrap(), first);
        assert_eq!(hss.receive().await.unwrap(), second);
        assert_eq!(hss.peer, "seaf");
    }

    #[tokio::test]
    async fn test_closed_peer() {
        let (seaf, hss) = pair("seaf", "hss");
        drop(hss);
        assert!(matches!(seaf.send(envelope()).await, Err(ChannelError::Closed)));

        let (seaf, mut hss) = pair("seaf", "hss");
        drop(seaf);
        assert!(matches!(hss.receive().await, Err(ChannelError::Closed)));
    }
}
