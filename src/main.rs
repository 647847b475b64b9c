use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use aka_phy::channel::framed::{accept_tls, connect_tls};
use aka_phy::channel::{air_link, memory::pair};
use aka_phy::clients::HomeNetworkClient;
use aka_phy::crypto::physical::ChannelState;
use aka_phy::engine::{HssEngine, UeEngine};
use aka_phy::handlers::{attach, HssHandler, SeafHandler};
use aka_phy::types::tls::TlsConfig;
use aka_phy::types::{
    AkaConfig, InMemoryCredentials, InMemoryDirectory, LongTermCredential, LongTermKey,
    NetworkKeyPair, Plmn, Supi,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AkaConfig::from_env()?;
    tracing::info!(
        home = %config.home_plmn,
        snn = %config.serving_network_name,
        anonymity = ?config.anonymity_mode,
        binding = ?config.binding_policy,
        "Starting authentication run"
    );

    let key_pair = NetworkKeyPair::generate(config.home_plmn.clone());
    let directory = InMemoryDirectory::new();
    directory.publish(&key_pair);

    let subscribers = load_subscribers(&config.home_plmn)?;
    let credentials = Arc::new(InMemoryCredentials::new());
    for credential in &subscribers {
        credentials.provision(credential.clone())?;
    }
    tracing::info!("Provisioned {} subscriber(s)", credentials.len());

    let engine = HssEngine::new(
        key_pair,
        credentials,
        config.allowed_plmns.clone(),
        config.anonymity_mode,
    );
    let hss = HssHandler::new(engine, config.session_ttl);
    hss.spawn_reaper(config.session_ttl);

    let client = match TlsConfig::from_env() {
        Some(tls) => {
            let listener = TcpListener::bind("127.0.0.1:0").await?;
            let addr = listener.local_addr()?.to_string();
            let acceptor = TlsAcceptor::from(
                tls.build_server_config()
                    .map_err(|e| anyhow::anyhow!("Failed to build TLS config: {}", e))?,
            );

            let (home_end, serving_end) = tokio::try_join!(
                accept_tls(&listener, &acceptor, "hss", "seaf"),
                connect_tls(&addr, &tls, "seaf", "hss"),
            )?;
            tokio::spawn(Arc::clone(&hss).serve(home_end));
            HomeNetworkClient::spawn(serving_end)
        }
        None => {
            tracing::info!("TLS not configured, using in-process secure link");
            let (serving_end, home_end) = pair("seaf", "hss");
            tokio::spawn(Arc::clone(&hss).serve(home_end));
            HomeNetworkClient::spawn(serving_end)
        }
    };

    let seaf = SeafHandler::new(
        client,
        config.serving_network_name.clone(),
        config.receive_timeout,
    );

    let mut attempts = Vec::with_capacity(subscribers.len());
    for credential in subscribers {
        let supi = credential.supi.clone();
        let mut ue = UeEngine::new(
            credential,
            &directory,
            config.anonymity_mode,
            config.binding_policy,
        )?;
        let (mut ue_port, seaf_port) = air_link();
        let csi = ChannelState::random();
        let receive_timeout = config.receive_timeout;

        let network = seaf.spawn_attempt(seaf_port, csi.clone());
        let subscriber =
            tokio::spawn(async move { attach(&mut ue, &mut ue_port, csi, receive_timeout).await });
        attempts.push((supi, subscriber, network));
    }

    let total = attempts.len();
    let mut failures = 0;
    for (supi, subscriber, network) in attempts {
        match (subscriber.await?, network.await?) {
            (Ok(ue_keys), Ok(sn_keys)) => {
                let agreed = ue_keys.kseaf == sn_keys.kseaf
                    && ue_keys.kamf == sn_keys.kamf
                    && sn_keys.supi == supi;
                if agreed {
                    tracing::info!(supi = %supi, "Authenticated, anchor keys agree");
                } else {
                    tracing::error!(supi = %supi, "Authenticated but anchor keys differ");
                    failures += 1;
                }
            }
            (ue_result, sn_result) => {
                tracing::error!(
                    supi = %supi,
                    subscriber = ?ue_result.err(),
                    network = ?sn_result.err(),
                    "Authentication failed"
                );
                failures += 1;
            }
        }
    }

    tracing::info!(
        "{} of {} attempt(s) succeeded, {} HSS session(s) left",
        total - failures,
        total,
        hss.active_sessions().await
    );
    if failures > 0 {
        anyhow::bail!("{} of {} authentication attempt(s) failed", failures, total);
    }
    Ok(())
}

/// Reads `AKA_DEMO_SUBSCRIBERS` as `supi:hexkey` pairs separated by commas.
/// Without it, one subscriber with a random key is issued.
fn load_subscribers(home: &Plmn) -> anyhow::Result<Vec<LongTermCredential>> {
    let Ok(raw) = std::env::var("AKA_DEMO_SUBSCRIBERS") else {
        let supi = Supi::parse(&format!("imsi-{}{}000000001", home.mcc, home.mnc))?;
        return Ok(vec![LongTermCredential {
            supi,
            home_network: home.clone(),
            key: LongTermKey::random(),
        }]);
    };

    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (supi, key) = entry
                .split_once(':')
                .ok_or_else(|| anyhow::anyhow!("Expected supi:hexkey, got {}", entry))?;
            Ok(LongTermCredential {
                supi: Supi::parse(supi)?,
                home_network: home.clone(),
                key: LongTermKey::from_hex(key)?,
            })
        })
        .collect()
}
