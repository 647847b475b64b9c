use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::channel::SeafPort;
use crate::clients::HomeNetworkClient;
use crate::crypto::home_network::{check_home_network, NetworkLocation};
use crate::crypto::physical::ChannelState;
use crate::engine::{SeafEngine, SessionKeys};
use crate::types::error::{AkaError, AkaResult};
use crate::types::identity::ServingNetworkName;
use crate::types::messages::UplinkMessage;
use crate::types::session_store::SessionStore;

/// Serving network: answers radio attempts and relays them to the home
/// network over one shared secure link.
pub struct SeafHandler {
    client: HomeNetworkClient,
    serving_network_name: ServingNetworkName,
    receive_timeout: Duration,
    sessions: SessionStore<SeafEngine>,
}

impl SeafHandler {
    pub fn new(
        client: HomeNetworkClient,
        serving_network_name: ServingNetworkName,
        receive_timeout: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            client,
            serving_network_name,
            receive_timeout,
            sessions: SessionStore::new(),
        })
    }

    pub fn serving_network_name(&self) -> &ServingNetworkName {
        &self.serving_network_name
    }

    /// Transactions currently parked on a receive.
    pub async fn active_sessions(&self) -> usize {
        self.sessions.len().await
    }

    pub fn spawn_attempt(
        self: &Arc<Self>,
        port: SeafPort,
        csi: ChannelState,
    ) -> JoinHandle<AkaResult<SessionKeys>> {
        let handler = Arc::clone(self);
        tokio::spawn(async move { handler.authenticate(port, csi).await })
    }

    /// Runs one attempt to completion. On any failure the transaction is
    /// aborted and its values dropped.
    pub async fn authenticate(&self, mut port: SeafPort, csi: ChannelState) -> AkaResult<SessionKeys> {
        let transaction_id = Uuid::new_v4();
        let engine = SeafEngine::new(transaction_id, self.serving_network_name.clone(), csi);

        let (mut engine, identity) = self.wait(engine, "identity", next_uplink(&mut port)).await?;
        if let UplinkMessage::Identity { concealed_identity } = &identity {
            let location = check_home_network(
                self.serving_network_name.plmn(),
                &concealed_identity.home_network,
            );
            match location {
                NetworkLocation::Home => tracing::info!(
                    transaction_id = %transaction_id,
                    "Subscriber is attached to its home network"
                ),
                NetworkLocation::Visited => tracing::info!(
                    transaction_id = %transaction_id,
                    home = %concealed_identity.home_network,
                    "Subscriber is roaming"
                ),
            }
        }
        let request = engine.begin(identity)?;

        let mut home = abort_on(&mut engine, self.client.open(transaction_id))?;
        abort_on(&mut engine, home.send(request).await)?;

        let (mut engine, answer) = self
            .wait(engine, "authentication vector", home.receive())
            .await?;
        let downlink = engine.on_vector(answer)?;
        abort_on(&mut engine, port.send(&downlink).await)?;
        engine.challenge_sent()?;

        let (mut engine, response) = self.wait(engine, "response", next_uplink(&mut port)).await?;
        let confirmation = engine.on_response(response)?;
        abort_on(&mut engine, home.send(confirmation).await)?;

        let (mut engine, verdict) = self.wait(engine, "confirmation", home.receive()).await?;
        engine.on_confirmation(verdict)
    }

    /// Parks the engine while `pending` runs under the receive timeout, then
    /// hands it back. The engine is aborted if nothing usable arrives.
    async fn wait<T>(
        &self,
        engine: SeafEngine,
        waiting_for: &'static str,
        pending: impl Future<Output = AkaResult<T>>,
    ) -> AkaResult<(SeafEngine, T)> {
        let transaction_id = engine.transaction_id();
        self.sessions.insert(transaction_id, engine).await?;

        let outcome = match tokio::time::timeout(self.receive_timeout, pending).await {
            Ok(outcome) => outcome,
            Err(_) => Err(AkaError::Timeout(waiting_for)),
        };

        let Some(mut engine) = self.sessions.take(&transaction_id).await else {
            tracing::warn!(transaction_id = %transaction_id, "Session evicted while waiting for {}", waiting_for);
            return Err(AkaError::Timeout(waiting_for));
        };

        match outcome {
            Ok(value) => Ok((engine, value)),
            Err(e) => {
                tracing::warn!(transaction_id = %transaction_id, "Waiting for {} failed: {}", waiting_for, e);
                engine.abort();
                Err(e)
            }
        }
    }
}

fn abort_on<T>(engine: &mut SeafEngine, result: AkaResult<T>) -> AkaResult<T> {
    if result.is_err() {
        engine.abort();
    }
    result
}

/// Next well-formed uplink message; frames that fail to parse are discarded.
async fn next_uplink(port: &mut SeafPort) -> AkaResult<UplinkMessage> {
    loop {
        match port.receive().await {
            Err(AkaError::MalformedMessage(reason)) => {
                tracing::warn!("Discarding malformed uplink frame: {}", reason);
            }
            other => return other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{air_link, memory::pair};
    use crate::types::identity::Plmn;

    fn handler(receive_timeout: Duration) -> (Arc<SeafHandler>, crate::channel::memory::MemoryLink) {
        let (seaf, hss) = pair("seaf", "hss");
        let snn = ServingNetworkName::for_plmn(&Plmn::parse("00101").unwrap()).unwrap();
        (
            SeafHandler::new(HomeNetworkClient::spawn(seaf), snn, receive_timeout),
            hss,
        )
    }

    #[tokio::test]
    async fn test_silent_subscriber_times_out() {
        let (handler, _hss) = handler(Duration::from_millis(50));
        let (_ue, port) = air_link();

        let result = handler.authenticate(port, ChannelState::random()).await;
        assert!(matches!(result, Err(AkaError::Timeout("identity"))));
        assert_eq!(handler.active_sessions().await, 0);
    }

    #[tokio::test]
    async fn test_garbage_uplink_is_skipped() {
        let (handler, _hss) = handler(Duration::from_millis(50));
        let (ue, port) = air_link();
        ue.send_frame(b"not json".to_vec()).await.unwrap();

        let result = handler.authenticate(port, ChannelState::random()).await;
        assert!(matches!(result, Err(AkaError::Timeout("identity"))));
    }

    #[tokio::test]
    async fn test_response_before_identity_aborts() {
        let (handler, _hss) = handler(Duration::from_millis(200));
        let (ue, port) = air_link();
        ue.send(&UplinkMessage::Response {
            res_star: crate::types::vector::ExtendedResponse([1u8; 16]),
        })
        .await
        .unwrap();

        let result = handler.authenticate(port, ChannelState::random()).await;
        assert!(matches!(result, Err(AkaError::UnexpectedMessage { .. })));
        assert_eq!(handler.active_sessions().await, 0);
    }
}
