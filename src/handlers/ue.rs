use std::time::Duration;

use crate::channel::UePort;
use crate::crypto::physical::ChannelState;
use crate::engine::{SessionKeys, UeEngine};
use crate::types::error::{AkaError, AkaResult};
use crate::types::messages::DownlinkChallenge;

/// Drives one subscriber attempt over the air: sends the concealed identity,
/// answers the challenge and returns the agreed keys.
pub async fn attach(
    engine: &mut UeEngine,
    port: &mut UePort,
    csi: ChannelState,
    receive_timeout: Duration,
) -> AkaResult<SessionKeys> {
    let identity = engine.initiate()?;
    if let Err(e) = port.send(&identity).await {
        engine.abort();
        return Err(e);
    }
    engine.observe_channel(csi)?;

    let challenge = match tokio::time::timeout(receive_timeout, next_challenge(port)).await {
        Ok(Ok(challenge)) => challenge,
        Ok(Err(e)) => {
            engine.abort();
            return Err(e);
        }
        Err(_) => {
            engine.abort();
            return Err(AkaError::Timeout("challenge"));
        }
    };

    let (response, keys) = engine.handle_challenge(&challenge)?;
    port.send(&response).await?;
    Ok(keys)
}

async fn next_challenge(port: &mut UePort) -> AkaResult<DownlinkChallenge> {
    loop {
        match port.receive().await {
            Err(AkaError::MalformedMessage(reason)) => {
                tracing::warn!("Discarding malformed downlink frame: {}", reason);
            }
            other => return other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::air_link;
    use crate::engine::UeState;
    use crate::types::config::{AnonymityMode, PhysicalBindingPolicy};
    use crate::types::credentials::{
        InMemoryDirectory, LongTermCredential, LongTermKey, NetworkKeyPair,
    };
    use crate::types::identity::{Plmn, Supi};
    use crate::types::messages::UplinkMessage;

    fn engine() -> UeEngine {
        let home = Plmn::parse("00101").unwrap();
        let directory = InMemoryDirectory::new();
        directory.publish(&NetworkKeyPair::generate(home.clone()));
        UeEngine::new(
            LongTermCredential {
                supi: Supi::parse("imsi-001010000000001").unwrap(),
                home_network: home,
                key: LongTermKey::random(),
            },
            &directory,
            AnonymityMode::Derived,
            PhysicalBindingPolicy::Implicit,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_no_challenge_times_out_and_aborts() {
        let mut ue = engine();
        let (mut port, mut seaf) = air_link();

        let result = attach(&mut ue, &mut port, ChannelState::random(), Duration::from_millis(50)).await;
        assert!(matches!(result, Err(AkaError::Timeout("challenge"))));
        assert_eq!(ue.state(), UeState::Aborted);
        assert!(matches!(
            seaf.receive().await.unwrap(),
            UplinkMessage::Identity { .. }
        ));
    }

    #[tokio::test]
    async fn test_closed_air_interface() {
        let mut ue = engine();
        let (mut port, seaf) = air_link();
        drop(seaf);

        let result = attach(&mut ue, &mut port, ChannelState::random(), Duration::from_millis(50)).await;
        assert!(matches!(result, Err(AkaError::ChannelUnavailable(_))));
        assert_eq!(ue.state(), UeState::Aborted);
    }
}
