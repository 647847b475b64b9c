//! Serving network client towards the home network.
//!
//! Many transactions share one secure link. Outgoing envelopes are funnelled
//! through a writer task; a reader task routes each answer to the
//! transaction that owns its id.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::channel::{ChannelError, SecureLink, SecureReceiver, SecureSender};
use crate::types::error::{AkaError, AkaResult};
use crate::types::messages::{HomeMessage, SecureEnvelope};

const OUTBOUND_CAPACITY: usize = 256;
const INBOX_CAPACITY: usize = 4;

type Pending = Arc<Mutex<HashMap<Uuid, mpsc::Sender<HomeMessage>>>>;

#[derive(Clone)]
pub struct HomeNetworkClient {
    peer: String,
    outbound: mpsc::Sender<SecureEnvelope>,
    pending: Pending,
    closed: Arc<AtomicBool>,
}

impl HomeNetworkClient {
    pub fn spawn<S: SecureSender, R: SecureReceiver>(link: SecureLink<S, R>) -> Self {
        let (_, peer, sender, receiver) = link.into_parts();
        let (outbound, outbound_rx) = mpsc::channel(OUTBOUND_CAPACITY);
        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
        let closed = Arc::new(AtomicBool::new(false));

        tokio::spawn(write_loop(
            sender,
            outbound_rx,
            peer.clone(),
            pending.clone(),
            closed.clone(),
        ));
        tokio::spawn(read_loop(receiver, peer.clone(), pending.clone(), closed.clone()));

        Self {
            peer,
            outbound,
            pending,
            closed,
        }
    }

    /// Registers a transaction; answers carrying its id are delivered to the
    /// returned handle until it is dropped.
    pub fn open(&self, transaction_id: Uuid) -> AkaResult<HomeTransaction> {
        let mut pending = self
            .pending
            .lock()
            .map_err(|_| AkaError::ChannelUnavailable("pending map poisoned".to_string()))?;
        // Checked under the lock so a transaction cannot slip in after shutdown.
        if self.closed.load(Ordering::Acquire) {
            return Err(AkaError::ChannelUnavailable(format!("link to {} is closed", self.peer)));
        }

        let (inbox_tx, inbox) = mpsc::channel(INBOX_CAPACITY);
        if pending.contains_key(&transaction_id) {
            return Err(AkaError::DuplicateTransaction(transaction_id));
        }
        pending.insert(transaction_id, inbox_tx);

        Ok(HomeTransaction {
            transaction_id,
            outbound: self.outbound.clone(),
            inbox,
            pending: self.pending.clone(),
        })
    }

    pub fn in_flight(&self) -> usize {
        self.pending.lock().map(|p| p.len()).unwrap_or(0)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

pub struct HomeTransaction {
    transaction_id: Uuid,
    outbound: mpsc::Sender<SecureEnvelope>,
    inbox: mpsc::Receiver<HomeMessage>,
    pending: Pending,
}

impl HomeTransaction {
    pub fn id(&self) -> Uuid {
        self.transaction_id
    }

    pub async fn send(&self, body: HomeMessage) -> AkaResult<()> {
        self.outbound
            .send(SecureEnvelope::new(self.transaction_id, body))
            .await
            .map_err(|_| AkaError::from(ChannelError::Closed))
    }

    /// Waits for the next answer; a lost link surfaces as
    /// [`AkaError::ChannelUnavailable`].
    pub async fn receive(&mut self) -> AkaResult<HomeMessage> {
        self.inbox
            .recv()
            .await
            .ok_or_else(|| AkaError::from(ChannelError::Closed))
    }
}

impl Drop for HomeTransaction {
    fn drop(&mut self) {
        if let Ok(mut pending) = self.pending.lock() {
            pending.remove(&self.transaction_id);
        }
    }
}

async fn write_loop<S: SecureSender>(
    sender: S,
    mut outbound: mpsc::Receiver<SecureEnvelope>,
    peer: String,
    pending: Pending,
    closed: Arc<AtomicBool>,
) {
    while let Some(envelope) = outbound.recv().await {
        let transaction_id = envelope.transaction_id;
        if let Err(e) = sender.send(envelope).await {
            tracing::error!(transaction_id = %transaction_id, "Secure link to {} failed: {}", peer, e);
            break;
        }
    }

    drop(outbound);
    shut_down(&pending, &closed);
}

async fn read_loop<R: SecureReceiver>(
    mut receiver: R,
    peer: String,
    pending: Pending,
    closed: Arc<AtomicBool>,
) {
    loop {
        match receiver.receive().await {
            Ok(envelope) => {
                tracing::debug!(
                    transaction_id = %envelope.transaction_id,
                    message = envelope.body.kind(),
                    "Received from {}",
                    peer
                );
                let inbox = pending
                    .lock()
                    .ok()
                    .and_then(|p| p.get(&envelope.transaction_id).cloned());
                match inbox {
                    Some(inbox) => {
                        if inbox.send(envelope.body).await.is_err() {
                            tracing::debug!(
                                transaction_id = %envelope.transaction_id,
                                "Answer for a finished transaction dropped"
                            );
                        }
                    }
                    None => {
                        tracing::warn!(
                            transaction_id = %envelope.transaction_id,
                            message = envelope.body.kind(),
                            "Answer for unknown transaction dropped"
                        );
                    }
                }
            }
            Err(ChannelError::Closed) => {
                tracing::info!("Secure link to {} closed", peer);
                break;
            }
            Err(e) => {
                tracing::error!("Secure link to {} failed: {}", peer, e);
                break;
            }
        }
    }

    shut_down(&pending, &closed);
}

/// Marks the link closed and drops every inbox, so each open transaction
/// resolves to [`AkaError::ChannelUnavailable`].
fn shut_down(pending: &Pending, closed: &AtomicBool) {
    match pending.lock() {
        Ok(mut pending) => {
            closed.store(true, Ordering::Release);
            pending.clear();
        }
        Err(_) => closed.store(true, Ordering::Release),
    }
}
