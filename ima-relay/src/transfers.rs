//! Direction wiring: builds a [`TransferLoop`] plus its
//! [`TransferLoopEndpoints`] for M->S, S->M, and each S->S sibling, the way
//! the teacher's `spawn_configured_indexers` builds one `CrosschainIndexer`
//! per configured bridge. This is the part of the core's §4.10 contract that
//! the spec leaves to "external wiring, which depends on process
//! configuration the core itself does not hold".

use std::sync::Arc;

use alloy::primitives::Address;
use anyhow::{Context, Result};
use ima_relay_core::coordinator::Coordinator;
use ima_relay_core::error_registry::ErrorRegistry;
use ima_relay_core::fanout::http_provider;
use ima_relay_core::gas::GasPolicy;
use ima_relay_core::observer::SiblingNode;
use ima_relay_core::rpc::RpcClient;
use ima_relay_core::signature_collector::SignatureCollector;
use ima_relay_core::signer::Signer;
use ima_relay_core::transfer_loop::{TransferLoop, TransferLoopConfig, TransferLoopEndpoints};

use crate::config::{ChainEndpointConfig, DirectionOptions};

/// Shared collaborators every direction's [`TransferLoop`] is built from.
pub struct SharedCollaborators {
    pub coordinator: Arc<dyn Coordinator>,
    pub error_registry: Arc<ErrorRegistry>,
    pub signature_collector: Arc<dyn SignatureCollector>,
    pub signer: Arc<dyn Signer>,
}

fn rpc_client(name: &str, rpc_url: &str) -> Result<RpcClient> {
    let provider = http_provider(rpc_url).with_context(|| format!("failed to build provider for {name}"))?;
    Ok(RpcClient::new(name, rpc_url, provider))
}

fn parse_proxy_address(chain: &ChainEndpointConfig) -> Result<Address> {
    chain
        .message_proxy
        .parse()
        .with_context(|| format!("invalid message proxy address for chain {}", chain.name))
}

fn direction_config(direction: &str, opts: &DirectionOptions) -> TransferLoopConfig {
    TransferLoopConfig {
        direction: direction.to_string(),
        time_budget: opts.time_budget(),
        transfer_steps: opts.transfer_steps,
        max_transactions_count: opts.max_transactions_count,
        sleep_between_tx: opts.sleep_between_tx(),
        batch: opts.batch_config(),
    }
}

fn build_loop(shared: &SharedCollaborators, direction: &str, opts: &DirectionOptions, gas_policy: GasPolicy) -> TransferLoop {
    TransferLoop::new(
        shared.coordinator.clone(),
        shared.error_registry.clone(),
        shared.signature_collector.clone(),
        shared.signer.clone(),
        gas_policy,
        None,
        direction_config(direction, opts),
    )
}

/// Builds the M->S transfer: source is mainnet, destination is this agent's
/// own S-chain. No S->S roster is attached.
pub fn build_m2s(shared: &SharedCollaborators, mainnet: &ChainEndpointConfig, own_schain: &ChainEndpointConfig, opts: &DirectionOptions) -> Result<(TransferLoop, TransferLoopEndpoints)> {
    let endpoints = TransferLoopEndpoints {
        source: rpc_client(&mainnet.name, &mainnet.rpc_url)?,
        destination: rpc_client(&own_schain.name, &own_schain.rpc_url)?,
        source_proxy: parse_proxy_address(mainnet)?,
        destination_proxy: parse_proxy_address(own_schain)?,
        source_chain_name: mainnet.name.clone(),
        destination_chain_name: own_schain.name.clone(),
        destination_is_mainnet: false,
        destination_chain_id: own_schain.chain_id,
        s2s_roster: None,
        coordinator_index: 0,
    };
    let loop_ = build_loop(shared, "M2S", opts, GasPolicy::s_chain());
    Ok((loop_, endpoints))
}

/// Builds the S->M transfer: source is this agent's own S-chain, destination
/// is mainnet. Gas policy uses the mainnet multiplier since the destination
/// call runs against mainnet (`spec.md` §4.3).
pub fn build_s2m(shared: &SharedCollaborators, own_schain: &ChainEndpointConfig, mainnet: &ChainEndpointConfig, opts: &DirectionOptions) -> Result<(TransferLoop, TransferLoopEndpoints)> {
    let endpoints = TransferLoopEndpoints {
        source: rpc_client(&own_schain.name, &own_schain.rpc_url)?,
        destination: rpc_client(&mainnet.name, &mainnet.rpc_url)?,
        source_proxy: parse_proxy_address(own_schain)?,
        destination_proxy: parse_proxy_address(mainnet)?,
        source_chain_name: own_schain.name.clone(),
        destination_chain_name: mainnet.name.clone(),
        destination_is_mainnet: true,
        destination_chain_id: mainnet.chain_id,
        s2s_roster: None,
        coordinator_index: 0,
    };
    let loop_ = build_loop(shared, "S2M", opts, GasPolicy::mainnet());
    Ok((loop_, endpoints))
}

/// Builds one S->S transfer for a sibling chain, picking `node` as the
/// source endpoint (`spec.md` §4.10: "a pseudo-randomly-picked node URL of
/// that chain"). The full roster backs the S->S verifier (`spec.md` §4.8).
pub fn build_s2s(
    shared: &SharedCollaborators,
    own_schain: &ChainEndpointConfig,
    sibling: &ChainEndpointConfig,
    node: &SiblingNode,
    opts: &DirectionOptions,
) -> Result<(TransferLoop, TransferLoopEndpoints)> {
    let mut roster = Vec::with_capacity(sibling.node_roster.len().max(1));
    if sibling.node_roster.is_empty() {
        roster.push((
            ima_relay_core::chain::NodeEndpoint {
                name: node.name.clone(),
                rpc_url: node.url.clone(),
            },
            rpc_client(&node.name, &node.url)?,
        ));
    } else {
        for node_cfg in &sibling.node_roster {
            roster.push((
                ima_relay_core::chain::NodeEndpoint {
                    name: node_cfg.name.clone(),
                    rpc_url: node_cfg.rpc_url.clone(),
                },
                rpc_client(&node_cfg.name, &node_cfg.rpc_url)?,
            ));
        }
    }

    let endpoints = TransferLoopEndpoints {
        source: rpc_client(&node.name, &node.url)?,
        destination: rpc_client(&own_schain.name, &own_schain.rpc_url)?,
        source_proxy: parse_proxy_address(sibling)?,
        destination_proxy: parse_proxy_address(own_schain)?,
        source_chain_name: sibling.name.clone(),
        destination_chain_name: own_schain.name.clone(),
        destination_is_mainnet: false,
        destination_chain_id: own_schain.chain_id,
        s2s_roster: Some(roster),
        // Sibling chain id, not a per-instance counter. A fresh
        // `TransferLoop` is built every fan-out round, so its own serial
        // always starts at 0 and can't distinguish siblings for the
        // coordinator's single-in-flight guarantee (`spec.md` §5).
        coordinator_index: sibling.chain_id,
    };
    let loop_ = build_loop(shared, "S2S", opts, GasPolicy::s_chain());
    Ok((loop_, endpoints))
}
