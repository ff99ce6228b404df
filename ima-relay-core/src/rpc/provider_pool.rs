//! Multi-node failover pool, generalized from the teacher's
//! `interchain-indexer-logic::provider_layers` `tower::Layer`/`Service` stack
//! (`spec.md` §4.1: "each chain endpoint may be backed by more than one
//! node; the engine must fail over between them without surfacing a
//! transient node outage as a batch failure").
//!
//! Used both for a chain's primary RPC roster and, independently, for the
//! S->S verifier's sibling-node roster (`spec.md` §4.8).

use std::sync::Arc;
use std::time::{Duration, Instant};

use governor::{Quota, RateLimiter};
use parking_lot::RwLock;
use tracing::{info, warn};

use crate::error::RpcError;
use crate::rpc::client::RpcClient;

/// Static configuration for one node in a pool.
#[derive(Clone, Debug)]
pub struct NodeConfig {
    pub name: String,
    pub rpc_url: String,
    /// Requests per second this node is allowed to take.
    pub rate_limit_per_sec: u32,
}

/// Pool-wide tuning, mirroring the teacher's `PoolConfig` defaults.
#[derive(Clone, Copy, Debug)]
pub struct PoolConfig {
    pub health_check_period: Duration,
    pub max_consecutive_errors: u32,
    pub cooldown_base: Duration,
    pub cooldown_max: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            health_check_period: Duration::from_millis(1000),
            max_consecutive_errors: 3,
            cooldown_base: Duration::from_millis(500),
            cooldown_max: Duration::from_secs(30),
        }
    }
}

struct NodeState {
    client: RpcClient,
    limiter: RateLimiter<
        governor::state::NotKeyed,
        governor::state::InMemoryState,
        governor::clock::DefaultClock,
    >,
    consecutive_errors: u32,
    cooldowns_count: u32,
    disabled_until: Option<Instant>,
}

impl NodeState {
    fn is_available(&self) -> bool {
        match self.disabled_until {
            Some(until) => Instant::now() >= until,
            None => true,
        }
    }
}

/// A set of nodes backing one chain endpoint, with health-aware rotation.
///
/// Node selection is round-robin among currently-healthy nodes; a node that
/// accumulates `max_consecutive_errors` failures is cooled down with
/// exponential backoff capped at `cooldown_max` and skipped until its
/// cooldown expires.
pub struct ProviderPool {
    nodes: Vec<Arc<RwLock<NodeState>>>,
    cursor: std::sync::atomic::AtomicUsize,
    config: PoolConfig,
}

impl ProviderPool {
    pub fn new(clients: Vec<(NodeConfig, RpcClient)>, config: PoolConfig) -> Self {
        let nodes = clients
            .into_iter()
            .map(|(cfg, client)| {
                let quota = Quota::per_second(
                    std::num::NonZeroU32::new(cfg.rate_limit_per_sec.max(1)).unwrap(),
                );
                Arc::new(RwLock::new(NodeState {
                    client,
                    limiter: RateLimiter::direct(quota),
                    consecutive_errors: 0,
                    cooldowns_count: 0,
                    disabled_until: None,
                }))
            })
            .collect();

        Self {
            nodes,
            cursor: std::sync::atomic::AtomicUsize::new(0),
            config,
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn pick_node(&self) -> Option<Arc<RwLock<NodeState>>> {
        let len = self.nodes.len();
        if len == 0 {
            return None;
        }
        for offset in 0..len {
            let idx = (self.cursor.fetch_add(1, std::sync::atomic::Ordering::Relaxed) + offset) % len;
            let node = &self.nodes[idx];
            if node.read().is_available() {
                return Some(node.clone());
            }
        }
        None
    }

    fn mark_ok(&self, node: &Arc<RwLock<NodeState>>) {
        let mut state = node.write();
        state.consecutive_errors = 0;
        state.cooldowns_count = 0;
        state.disabled_until = None;
    }

    fn mark_error(&self, node: &Arc<RwLock<NodeState>>) {
        let mut state = node.write();
        state.consecutive_errors += 1;
        if state.consecutive_errors >= self.config.max_consecutive_errors {
            let backoff = self.config.cooldown_base * 2u32.saturating_pow(state.cooldowns_count);
            let backoff = backoff.min(self.config.cooldown_max);
            state.cooldowns_count += 1;
            state.disabled_until = Some(Instant::now() + backoff);
            warn!(
                endpoint = %state.client.endpoint_name(),
                cooldown_ms = backoff.as_millis() as u64,
                "node entering cooldown after consecutive errors"
            );
        }
    }

    /// Dispatches one RPC call through the next available node, retrying
    /// across the remaining healthy nodes before surfacing
    /// [`RpcError::Exhausted`].
    pub async fn dispatch<T, F, Fut>(&self, operation: &str, op: F) -> Result<T, RpcError>
    where
        F: Fn(RpcClient) -> Fut,
        Fut: std::future::Future<Output = Result<T, RpcError>>,
    {
        let attempts = self.nodes.len().max(1);
        let mut last_err = None;

        for _ in 0..attempts {
            let Some(node) = self.pick_node() else {
                break;
            };

            {
                let state = node.read();
                state.limiter.until_ready().await;
            }

            let client = node.read().client.clone();
            match op(client).await {
                Ok(value) => {
                    self.mark_ok(&node);
                    return Ok(value);
                }
                Err(err) => {
                    self.mark_error(&node);
                    last_err = Some(err);
                }
            }
        }

        Err(last_err.unwrap_or(RpcError::Exhausted {
            operation: operation.to_string(),
            endpoint: "<no healthy node>".to_string(),
            attempts: attempts as u32,
            source: anyhow::anyhow!("no healthy nodes in pool"),
        }))
    }

    /// Background health-check task: pings every cooled-down node on
    /// `health_check_period` and clears its cooldown once it responds.
    pub fn spawn_health_task(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let pool = self.clone();
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(pool.config.health_check_period);
            loop {
                tick.tick().await;
                pool.health_tick().await;
            }
        })
    }

    async fn health_tick(&self) {
        for node in &self.nodes {
            let needs_probe = {
                let state = node.read();
                state.disabled_until.is_some()
            };
            if !needs_probe {
                continue;
            }

            let client = node.read().client.clone();
            match client.get_block_number().await {
                Ok(_) => {
                    info!(endpoint = %client.endpoint_name(), "node recovered");
                    self.mark_ok(node);
                }
                Err(_) => {}
            }
        }
    }
}
