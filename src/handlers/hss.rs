use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::channel::{ChannelError, SecureLink, SecureReceiver, SecureSender};
use crate::engine::hss::{HssEngine, HssSession};
use crate::types::error::{AkaError, AkaResult, RejectCause};
use crate::types::identity::Supi;
use crate::types::messages::{ConfirmationOutcome, HomeMessage, SecureEnvelope};
use crate::types::session_store::{NonceLedger, SessionStore};

const NONCE_HISTORY: usize = 256;

/// Home network task serving one secure link from a serving network.
pub struct HssHandler {
    engine: HssEngine,
    sessions: SessionStore<HssSession>,
    nonces: NonceLedger,
    session_ttl: Duration,
}

impl HssHandler {
    pub fn new(engine: HssEngine, session_ttl: Duration) -> Arc<Self> {
        Arc::new(Self {
            engine,
            sessions: SessionStore::new(),
            nonces: NonceLedger::new(NONCE_HISTORY),
            session_ttl,
        })
    }

    pub fn engine(&self) -> &HssEngine {
        &self.engine
    }

    pub async fn active_sessions(&self) -> usize {
        self.sessions.len().await
    }

    /// Drops every in-flight session of a subscriber.
    pub async fn purge_subscriber(&self, supi: &Supi) -> usize {
        let purged = self.sessions.remove_where(|s| &s.supi == supi).await;
        tracing::info!(supi = %supi, "Purged {} in-flight session(s)", purged);
        purged
    }

    /// Periodically evicts sessions whose confirmation never arrived, and
    /// forgets concealment nonces older than the session lifetime.
    pub fn spawn_reaper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let handler = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let evicted = handler.sessions.retain_younger_than(handler.session_ttl).await;
                if evicted > 0 {
                    tracing::info!(event = "session_reaped", count = evicted, "Evicted abandoned HSS sessions");
                }
                let forgotten = handler.nonces.retain_younger_than(handler.session_ttl).await;
                if forgotten > 0 {
                    tracing::debug!(count = forgotten, "Forgot expired concealment nonces");
                }
            }
        })
    }

    /// Answers requests until the link closes. Each request is handled on
    /// its own task.
    pub async fn serve<S: SecureSender, R: SecureReceiver>(
        self: Arc<Self>,
        link: SecureLink<S, R>,
    ) -> AkaResult<()> {
        let (_, peer, sender, mut receiver) = link.into_parts();
        let sender = Arc::new(sender);
        tracing::info!("HSS serving secure link from {}", peer);

        loop {
            let envelope = match receiver.receive().await {
                Ok(envelope) => envelope,
                Err(ChannelError::Closed) => {
                    tracing::info!("Secure link from {} closed", peer);
                    return Ok(());
                }
                Err(e) => {
                    tracing::error!("Secure link from {} failed: {}", peer, e);
                    return Err(e.into());
                }
            };

            let handler = Arc::clone(&self);
            let sender = Arc::clone(&sender);
            tokio::spawn(async move {
                let transaction_id = envelope.transaction_id;
                if let Some(reply) = handler.handle(envelope).await {
                    if let Err(e) = sender.send(reply).await {
                        tracing::error!(transaction_id = %transaction_id, "Failed to answer: {}", e);
                    }
                }
            });
        }
    }

    /// Produces the answer to one envelope, or `None` when the request is
    /// dropped without an answer.
    pub async fn handle(&self, envelope: SecureEnvelope) -> Option<SecureEnvelope> {
        let transaction_id = envelope.transaction_id;
        let reply = match envelope.body {
            HomeMessage::Air {
                concealed_identity,
                serving_network_name,
            } => {
                tracing::info!(
                    transaction_id = %transaction_id,
                    snn = %serving_network_name,
                    "Received authentication information request"
                );
                let issued = match self.engine.issue_vector(
                    transaction_id,
                    concealed_identity,
                    serving_network_name,
                ) {
                    Ok((vector, session)) => self.admit(transaction_id, session).await.map(|()| vector),
                    Err(e) => Err(e),
                };
                match issued {
                    Ok(vector) => HomeMessage::Aia { vector },
                    Err(AkaError::ServingNetworkNotAuthorized(reason)) => {
                        tracing::warn!(transaction_id = %transaction_id, "SNN verification failed: {}", reason);
                        HomeMessage::Aca {
                            outcome: ConfirmationOutcome::Rejected {
                                cause: RejectCause::ServingNetworkNotAuthorized,
                            },
                        }
                    }
                    Err(e) if e.is_silent_drop() => {
                        tracing::debug!(transaction_id = %transaction_id, "Silently dropping request: {}", e);
                        return None;
                    }
                    Err(e) => {
                        tracing::warn!(transaction_id = %transaction_id, "Dropping request: {}", e);
                        return None;
                    }
                }
            }
            HomeMessage::Ac {
                res_star,
                concealed_identity,
                serving_network_name,
            } => {
                tracing::info!(transaction_id = %transaction_id, "Received authentication confirmation");
                let outcome = match self.sessions.take(&transaction_id).await {
                    Some(session) => self.engine.confirm(
                        session,
                        &res_star,
                        &concealed_identity,
                        &serving_network_name,
                    ),
                    None => {
                        tracing::warn!(transaction_id = %transaction_id, "Confirmation for unknown transaction");
                        ConfirmationOutcome::Rejected {
                            cause: RejectCause::UnknownTransaction,
                        }
                    }
                };
                HomeMessage::Aca { outcome }
            }
            other => {
                tracing::warn!(
                    transaction_id = %transaction_id,
                    message = other.kind(),
                    "Unexpected message at home network dropped"
                );
                return None;
            }
        };

        Some(SecureEnvelope::new(transaction_id, reply))
    }

    /// Keeps the session for its confirmation unless the identity it was
    /// issued for has been seen before.
    async fn admit(&self, transaction_id: Uuid, session: HssSession) -> AkaResult<()> {
        if !self
            .nonces
            .record(&session.supi, *session.concealment_nonce())
            .await
        {
            return Err(AkaError::ReplayedIdentity);
        }
        self.sessions.insert(transaction_id, session).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::concealment::{conceal, conceal_with_nonce};
    use crate::types::config::AnonymityMode;
    use crate::types::credentials::{
        InMemoryCredentials, LongTermCredential, LongTermKey, NetworkKeyPair,
    };
    use crate::types::identity::{Plmn, ServingNetworkName};
    use crate::types::vector::ExtendedResponse;
    use uuid::Uuid;

    fn handler() -> (Arc<HssHandler>, Supi) {
        let home = Plmn::parse("00101").unwrap();
        let supi = Supi::parse("imsi-001010000000001").unwrap();
        let credentials = InMemoryCredentials::new();
        credentials
            .provision(LongTermCredential {
                supi: supi.clone(),
                home_network: home.clone(),
                key: LongTermKey::random(),
            })
            .unwrap();
        let engine = HssEngine::new(
            NetworkKeyPair::generate(home),
            Arc::new(credentials),
            None,
            AnonymityMode::Derived,
        );
        (HssHandler::new(engine, Duration::from_secs(60)), supi)
    }

    fn air(handler: &HssHandler, supi: &Supi) -> HomeMessage {
        let key_pair = handler.engine().key_pair();
        HomeMessage::Air {
            concealed_identity: conceal(supi, &key_pair.network, key_pair.public_key()).unwrap(),
            serving_network_name: ServingNetworkName::for_plmn(&key_pair.network).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_confirmation_for_unknown_transaction() {
        let (handler, supi) = handler();
        let key_pair = handler.engine().key_pair();
        let reply = handler
            .handle(SecureEnvelope::new(
                Uuid::new_v4(),
                HomeMessage::Ac {
                    res_star: ExtendedResponse([0u8; 16]),
                    concealed_identity: conceal(&supi, &key_pair.network, key_pair.public_key())
                        .unwrap(),
                    serving_network_name: ServingNetworkName::for_plmn(&key_pair.network).unwrap(),
                },
            ))
            .await
            .unwrap();

        assert_eq!(
            reply.body,
            HomeMessage::Aca {
                outcome: ConfirmationOutcome::Rejected {
                    cause: RejectCause::UnknownTransaction
                }
            }
        );
    }

    #[tokio::test]
    async fn test_unknown_subscriber_gets_no_answer() {
        let (handler, _) = handler();
        let stranger = Supi::parse("imsi-001010000009999").unwrap();
        let request = air(&handler, &stranger);
        assert!(handler
            .handle(SecureEnvelope::new(Uuid::new_v4(), request))
            .await
            .is_none());
        assert_eq!(handler.active_sessions().await, 0);
    }

    #[tokio::test]
    async fn test_purge_subscriber() {
        let (handler, supi) = handler();
        for _ in 0..3 {
            let request = air(&handler, &supi);
            let reply = handler
                .handle(SecureEnvelope::new(Uuid::new_v4(), request))
                .await
                .unwrap();
            assert_eq!(reply.body.kind(), "aia");
        }
        assert_eq!(handler.active_sessions().await, 3);
        assert_eq!(handler.purge_subscriber(&supi).await, 3);
        assert_eq!(handler.active_sessions().await, 0);
    }

    #[tokio::test]
    async fn test_duplicate_transaction_dropped() {
        let (handler, supi) = handler();
        let tx = Uuid::new_v4();
        let first = air(&handler, &supi);
        let second = air(&handler, &supi);
        assert!(handler.handle(SecureEnvelope::new(tx, first)).await.is_some());
        assert!(handler.handle(SecureEnvelope::new(tx, second)).await.is_none());
        assert_eq!(handler.active_sessions().await, 1);
    }

    #[tokio::test]
    async fn test_replayed_identity_gets_no_answer() {
        let (handler, supi) = handler();
        let request = air(&handler, &supi);

        let first = handler
            .handle(SecureEnvelope::new(Uuid::new_v4(), request.clone()))
            .await
            .unwrap();
        assert_eq!(first.body.kind(), "aia");
        assert!(handler
            .handle(SecureEnvelope::new(Uuid::new_v4(), request))
            .await
            .is_none());
        assert_eq!(handler.active_sessions().await, 1);
    }

    #[tokio::test]
    async fn test_reencrypted_nonce_gets_no_answer() {
        let (handler, supi) = handler();
        let key_pair = handler.engine().key_pair();
        let snn = ServingNetworkName::for_plmn(&key_pair.network).unwrap();
        let nonce = [0x33u8; 16];

        for expect_answer in [true, false] {
            let request = HomeMessage::Air {
                concealed_identity: conceal_with_nonce(
                    &supi,
                    &key_pair.network,
                    key_pair.public_key(),
                    nonce,
                )
                .unwrap(),
                serving_network_name: snn.clone(),
            };
            let reply = handler
                .handle(SecureEnvelope::new(Uuid::new_v4(), request))
                .await;
            assert_eq!(reply.is_some(), expect_answer);
        }
    }
}
