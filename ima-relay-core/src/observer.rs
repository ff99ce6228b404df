//! Observer (`spec.md` §6): the core consumes a point-in-time snapshot of
//! sibling S-chains; the SKALE-network discovery mechanism behind
//! `listSiblingChains` is an external collaborator (`spec.md` §1).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SiblingNode {
    pub name: String,
    pub url: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SiblingChain {
    pub name: String,
    pub chain_id: u64,
    pub rpc_urls: Vec<String>,
    pub nodes: Vec<SiblingNode>,
}

#[async_trait]
pub trait Observer: Send + Sync {
    async fn list_sibling_chains(&self) -> anyhow::Result<Vec<SiblingChain>>;
}

/// Returns a fixed, pre-configured snapshot, used when sibling chains are
/// supplied via static configuration rather than a live discovery service.
pub struct StaticObserver {
    chains: Vec<SiblingChain>,
}

impl StaticObserver {
    pub fn new(chains: Vec<SiblingChain>) -> Self {
        Self { chains }
    }
}

#[async_trait]
impl Observer for StaticObserver {
    async fn list_sibling_chains(&self) -> anyhow::Result<Vec<SiblingChain>> {
        Ok(self.chains.clone())
    }
}
