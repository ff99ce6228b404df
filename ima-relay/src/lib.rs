//! Process wiring for the IMA relay agent: config/settings loading,
//! direction scheduling, and the tracing ambient stack. The transfer-engine
//! logic itself lives in `ima-relay-core`; this crate only assembles it into
//! a runnable background process (`spec.md` §1: the CLI and the
//! SKALE-network observer are external collaborators, not part of the core,
//! this binary supplies minimal, config-driven stand-ins for both so the
//! process can actually run). Prometheus counters (`ima_relay_core::metrics`)
//! register into the process-wide default registry regardless; exposing them
//! over HTTP would mean adopting the actix/gRPC server surface `spec.md` §1
//! explicitly excludes, so exposition is left to the operator's scrape
//! sidecar (see `DESIGN.md`).

mod config;
mod scheduler;
mod settings;
mod signer_factory;
pub mod transfers;

pub use config::{ChainEndpointConfig, ChainsConfig, DirectionOptions, NodeConfig, SignerConfig, load_chains_from_file};
pub use settings::Settings;

use std::sync::Arc;

use anyhow::{Context, Result};
use ima_relay_core::coordinator::InMemoryCoordinator;
use ima_relay_core::error_registry::ErrorRegistry;
use ima_relay_core::observer::StaticObserver;
use ima_relay_core::signature_collector::{RemoteSignatureCollector, SignatureCollector, StubSignatureCollector};
use tracing::info;

use scheduler::{spawn_s2s_fanout, spawn_single_direction};
use transfers::{SharedCollaborators, build_m2s, build_s2m};

fn build_signature_collector(url: &Option<String>) -> Arc<dyn SignatureCollector> {
    match url {
        Some(url) => Arc::new(RemoteSignatureCollector::new(url.clone())),
        None => Arc::new(StubSignatureCollector),
    }
}

/// Runs the agent until terminated by a signal. Re-reads all chain state on
/// every pass; nothing here persists across restarts (`spec.md` §1
/// Non-goals).
pub async fn run(settings: Settings) -> Result<()> {
    blockscout_service_launcher::tracing::init_logs(Settings::SERVICE_NAME_LOWER, &settings.tracing, &settings.jaeger)
        .context("failed to initialize logging")?;

    let chains = load_chains_from_file(&settings.chains_config).context("failed to load chains config")?;
    let signer = signer_factory::build_signer(&settings.signer).context("failed to build signer")?;
    let signature_collector = build_signature_collector(&settings.signature_collector_url);

    let shared = Arc::new(SharedCollaborators {
        coordinator: Arc::new(InMemoryCoordinator::default()),
        error_registry: Arc::new(ErrorRegistry::new()),
        signature_collector,
        signer,
    });

    let mainnet = Arc::new(chains.mainnet.clone());
    let own_schain = Arc::new(chains.own_schain.clone());

    let (m2s_loop, m2s_endpoints) = build_m2s(&shared, &mainnet, &own_schain, &settings.m2s)?;
    let m2s_task = spawn_single_direction(Arc::new(m2s_loop), Arc::new(m2s_endpoints));

    let (s2m_loop, s2m_endpoints) = build_s2m(&shared, &own_schain, &mainnet, &settings.s2m)?;
    let s2m_task = spawn_single_direction(Arc::new(s2m_loop), Arc::new(s2m_endpoints));

    let observer = Arc::new(StaticObserver::new(chains.siblings.iter().map(|c| c.as_sibling_chain()).collect()));
    let s2s_task = spawn_s2s_fanout(
        shared.clone(),
        own_schain.clone(),
        Arc::new(chains.siblings.clone()),
        observer,
        Arc::new(settings.s2s.clone()),
    );

    info!("ima relay agent started");

    tokio::signal::ctrl_c().await.context("failed to listen for shutdown signal")?;
    info!("shutdown signal received, stopping direction tasks");

    m2s_task.stop();
    s2m_task.stop();
    s2s_task.stop();

    Ok(())
}

impl Settings {
    pub(crate) const SERVICE_NAME_LOWER: &'static str = "ima_relay";
}
