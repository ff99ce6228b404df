//! Direction Fan-out scheduling (`spec.md` §4.10): one `tokio` task per
//! direction, following the teacher's `ExampleIndexer` shape (an
//! `Arc<AtomicBool>` running flag, a `parking_lot::RwLock<Option<JoinHandle>>`
//! task handle) generalized across M->S, S->M, and N sibling S->S passes.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use ima_relay_core::fanout::run_s2s_fanout;
use ima_relay_core::observer::Observer;
use ima_relay_core::transfer_loop::{TransferLoop, TransferLoopEndpoints};
use parking_lot::RwLock;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{error, info};

use crate::config::{ChainEndpointConfig, DirectionOptions};
use crate::transfers::{SharedCollaborators, build_s2s};

/// `sleepBeforeFetchOutgoingMessageEventMs`, default 5000 (`spec.md` §6).
const DEFAULT_INTER_PASS_SLEEP: Duration = Duration::from_millis(5000);

/// One direction's background task: owns its own running flag and handle so
/// it can be stopped independently, mirroring `ExampleIndexer::start_indexing`
/// / `stop_indexing`.
pub struct DirectionTask {
    is_running: Arc<AtomicBool>,
    handle: RwLock<Option<JoinHandle<()>>>,
}

impl DirectionTask {
    fn spawn<F, Fut>(run_once: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = ()> + Send,
    {
        let is_running = Arc::new(AtomicBool::new(true));
        let running = is_running.clone();
        let handle = tokio::spawn(async move {
            while running.load(Ordering::Acquire) {
                run_once().await;
                sleep(DEFAULT_INTER_PASS_SLEEP).await;
            }
        });
        Self {
            is_running,
            handle: RwLock::new(Some(handle)),
        }
    }

    pub fn stop(&self) {
        self.is_running.store(false, Ordering::Release);
        if let Some(handle) = self.handle.write().take() {
            handle.abort();
        }
    }
}

/// Runs a M->S or S->M pass, logging and swallowing the error. The
/// transfer loop itself already records the failure in the error registry
/// (`spec.md` §4.9 step 11); the scheduler's job is only to keep the
/// process alive across passes (`spec.md` §6: "the running loops never
/// exit the process on RPC error").
pub fn spawn_single_direction(loop_: Arc<TransferLoop>, endpoints: Arc<TransferLoopEndpoints>) -> DirectionTask {
    DirectionTask::spawn(move || {
        let loop_ = loop_.clone();
        let endpoints = endpoints.clone();
        async move {
            if let Err(err) = loop_.run_pass(&endpoints).await {
                error!(direction = %loop_.config.direction, err = %err, "direction pass failed");
            }
        }
    })
}

/// Runs the S->S fan-out round-robin: every pass re-fetches the sibling
/// list from the observer (a point-in-time snapshot, `spec.md` §6) and
/// builds a fresh source endpoint per sibling (`spec.md` §4.10).
///
/// The observer only carries RPC endpoints and node rosters (`spec.md` §6);
/// the message-proxy contract address for each sibling is a deployment
/// fact, not something a discovery service reports, so it is looked up in
/// the statically-configured sibling list by chain id, the same
/// `chain_lookup: HashMap<chain_id, ChainConfig>` join the teacher's
/// `build_avalanche_chain_configs` performs between bridge contracts and
/// discovered chains.
pub fn spawn_s2s_fanout(
    shared: Arc<SharedCollaborators>,
    own_schain: Arc<ChainEndpointConfig>,
    known_siblings: Arc<Vec<ChainEndpointConfig>>,
    observer: Arc<dyn Observer>,
    opts: Arc<DirectionOptions>,
) -> DirectionTask {
    DirectionTask::spawn(move || {
        let shared = shared.clone();
        let own_schain = own_schain.clone();
        let known_siblings = known_siblings.clone();
        let observer = observer.clone();
        let opts = opts.clone();
        async move {
            let siblings = match observer.list_sibling_chains().await {
                Ok(s) => s,
                Err(err) => {
                    error!(err = %err, "failed to list sibling chains for S->S fan-out");
                    return;
                }
            };

            let result = run_s2s_fanout(&siblings, own_schain.chain_id, |sibling_chain, node| {
                let shared = shared.clone();
                let own_schain = own_schain.clone();
                let opts = opts.clone();
                let known = known_siblings.iter().find(|c| c.chain_id == sibling_chain.chain_id).cloned();
                async move {
                    let Some(mut sibling_cfg) = known else {
                        anyhow::bail!(
                            "no statically configured message proxy for sibling chain {} ({})",
                            sibling_chain.name,
                            sibling_chain.chain_id
                        );
                    };
                    // The observer's roster is the live source of truth for
                    // RPC reachability; config only pins the proxy address.
                    if !sibling_chain.nodes.is_empty() {
                        sibling_cfg.node_roster = sibling_chain
                            .nodes
                            .iter()
                            .map(|n| crate::config::NodeConfig {
                                name: n.name.clone(),
                                rpc_url: n.url.clone(),
                            })
                            .collect();
                    }

                    let (loop_, endpoints): (TransferLoop, TransferLoopEndpoints) = build_s2s(&shared, &own_schain, &sibling_cfg, node, &opts)?;
                    Ok((loop_, endpoints))
                }
            })
            .await;

            info!(succeeded = result.succeeded, failed = result.failed, "s2s fan-out round complete");
        }
    })
}
