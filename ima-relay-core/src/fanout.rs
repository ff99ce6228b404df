//! Direction Fan-out (`spec.md` §4.10): schedules M<->S and N x S<->S
//! directions. M->S and S->M are a single transfer per pass; S->S iterates
//! over the cached sibling chain list, picking a fresh source node URL each
//! time.

use alloy::network::Ethereum;
use alloy::providers::{DynProvider, ProviderBuilder};
use rand::Rng;
use tracing::{error, info};

use crate::error::RelayError;
use crate::observer::SiblingChain;
use crate::transfer_loop::{PassOutcome, TransferLoop, TransferLoopEndpoints};

/// Aggregate result of one S->S fan-out round: success iff no sibling
/// failed (`spec.md` §4.10).
#[derive(Debug, Default)]
pub struct FanoutResult {
    pub succeeded: u64,
    pub failed: u64,
}

impl FanoutResult {
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

/// Builds an `alloy` provider for a plain HTTP(S) RPC URL. Kept separate
/// from [`crate::rpc::provider_pool::ProviderPool`], which layers several of
/// these together with health-aware failover.
pub fn http_provider(rpc_url: &str) -> anyhow::Result<DynProvider<Ethereum>> {
    let url = rpc_url.parse()?;
    Ok(ProviderBuilder::new().connect_http(url).erased())
}

/// Picks a pseudo-random node URL from a sibling chain's roster
/// (`spec.md` §4.10: "a pseudo-randomly-picked node URL of that chain").
pub fn pick_source_node(sibling: &SiblingChain) -> Option<&crate::observer::SiblingNode> {
    if sibling.nodes.is_empty() {
        return None;
    }
    let idx = rand::rng().random_range(0..sibling.nodes.len());
    sibling.nodes.get(idx)
}

/// Runs a single direction's transfer for this pass (M->S or S->M). Logs and
/// returns the error rather than swallowing it. The direction fan-out
/// (`spec.md` §4.10) needs to know whether this sibling failed.
pub async fn run_direction(loop_: &TransferLoop, endpoints: &TransferLoopEndpoints) -> Result<PassOutcome, RelayError> {
    let outcome = loop_.run_pass(endpoints).await;
    if let Err(err) = &outcome {
        error!(direction = %loop_.config.direction, err = %err, "transfer pass failed");
    }
    outcome
}

/// Runs one S->S fan-out round over `siblings`. `build` constructs the
/// `(TransferLoop, TransferLoopEndpoints)` pair for one sibling chain given
/// its pseudo-randomly-picked source node; it owns all provider/contract
/// wiring, which depends on process configuration the core itself does not
/// hold.
pub async fn run_s2s_fanout<F, Fut>(siblings: &[SiblingChain], own_chain_id: u64, build: F) -> FanoutResult
where
    F: Fn(&SiblingChain, &crate::observer::SiblingNode) -> Fut,
    Fut: std::future::Future<Output = anyhow::Result<(TransferLoop, TransferLoopEndpoints)>>,
{
    let mut result = FanoutResult::default();

    for sibling in siblings {
        if sibling.chain_id == own_chain_id {
            continue;
        }
        let Some(node) = pick_source_node(sibling) else {
            continue;
        };

        let (loop_, endpoints) = match build(sibling, node).await {
            Ok(pair) => pair,
            Err(err) => {
                error!(chain = %sibling.name, err = %err, "failed to wire up S->S transfer");
                result.failed += 1;
                continue;
            }
        };

        match run_direction(&loop_, &endpoints).await {
            Ok(PassOutcome::Noop) => {}
            Ok(PassOutcome::Completed { .. } | PassOutcome::TimeExceeded { .. }) => {
                info!(chain = %sibling.name, "s2s transfer pass completed");
                result.succeeded += 1;
            }
            Err(_) => {
                result.failed += 1;
            }
        }
    }

    result
}
