//! Chain RPC access (`spec.md` §4.1): a retrying, failover-aware wrapper
//! around `alloy`'s JSON-RPC provider.

pub mod client;
pub mod provider_pool;

pub use client::{RetryPolicy, RpcClient};
pub use provider_pool::{NodeConfig, PoolConfig, ProviderPool};
