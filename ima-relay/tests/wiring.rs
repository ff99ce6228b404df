//! Exercises the direction-wiring helpers end to end: given a small
//! `chains.json`-shaped config, `build_m2s`/`build_s2m`/`build_s2s` should
//! produce `TransferLoopEndpoints` pointing at the right chains with the
//! right contract addresses, the same shape `ima-relay-core::transfer_loop`
//! expects a pass to run against.

use std::sync::Arc;

use alloy::signers::local::PrivateKeySigner;
use ima_relay::transfers::{SharedCollaborators, build_m2s, build_s2m, build_s2s};
use ima_relay::{ChainEndpointConfig, DirectionOptions, NodeConfig, load_chains_from_file};
use ima_relay_core::coordinator::InMemoryCoordinator;
use ima_relay_core::error_registry::ErrorRegistry;
use ima_relay_core::observer::SiblingNode;
use ima_relay_core::signature_collector::StubSignatureCollector;
use ima_relay_core::signer::LocalKeySigner;
use pretty_assertions::assert_eq;

fn write_chains_json(dir: &tempfile::TempDir) -> std::path::PathBuf {
    let json = r#"{
        "mainnet": {"name": "Mainnet", "chain_id": 1, "rpc_url": "http://127.0.0.1:9001", "message_proxy": "0x0000000000000000000000000000000000000001", "is_mainnet": true},
        "own_schain": {"name": "schain-a", "chain_id": 100, "rpc_url": "http://127.0.0.1:9002", "message_proxy": "0x0000000000000000000000000000000000000002"},
        "siblings": [{"name": "schain-b", "chain_id": 101, "rpc_url": "http://127.0.0.1:9003", "message_proxy": "0x0000000000000000000000000000000000000003", "node_roster": [{"name": "node0", "rpc_url": "http://127.0.0.1:9004"}]}]
    }"#;
    let path = dir.path().join("chains.json");
    std::fs::write(&path, json).unwrap();
    path
}

fn shared_collaborators() -> SharedCollaborators {
    let key: PrivateKeySigner = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80"
        .parse()
        .unwrap();
    SharedCollaborators {
        coordinator: Arc::new(InMemoryCoordinator::default()),
        error_registry: Arc::new(ErrorRegistry::new()),
        signature_collector: Arc::new(StubSignatureCollector),
        signer: Arc::new(LocalKeySigner::from_private_key(&key)),
    }
}

#[test]
fn m2s_and_s2m_wiring_point_at_the_right_chains() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_chains_json(&dir);
    let chains = load_chains_from_file(&path).unwrap();
    let shared = shared_collaborators();
    let opts = DirectionOptions::default();

    let (m2s_loop, m2s_endpoints) = build_m2s(&shared, &chains.mainnet, &chains.own_schain, &opts).unwrap();
    assert_eq!(m2s_loop.config.direction, "M2S");
    assert_eq!(m2s_endpoints.source_chain_name, "Mainnet");
    assert_eq!(m2s_endpoints.destination_chain_name, "schain-a");
    assert!(!m2s_endpoints.destination_is_mainnet);
    assert_eq!(m2s_endpoints.destination_chain_id, 100);

    let (s2m_loop, s2m_endpoints) = build_s2m(&shared, &chains.own_schain, &chains.mainnet, &opts).unwrap();
    assert_eq!(s2m_loop.config.direction, "S2M");
    assert_eq!(s2m_endpoints.source_chain_name, "schain-a");
    assert_eq!(s2m_endpoints.destination_chain_name, "Mainnet");
    assert!(s2m_endpoints.destination_is_mainnet);

    let sibling = &chains.siblings[0];
    let node = SiblingNode {
        name: "node0".to_string(),
        url: "http://127.0.0.1:9004".to_string(),
    };
    let (s2s_loop, s2s_endpoints) = build_s2s(&shared, &chains.own_schain, sibling, &node, &opts).unwrap();
    assert_eq!(s2s_loop.config.direction, "S2S");
    assert_eq!(s2s_endpoints.source_chain_name, "schain-b");
    assert_eq!(s2s_endpoints.s2s_roster.as_ref().unwrap().len(), 1);
}

#[test]
fn chain_endpoint_converts_to_sibling_chain_shape() {
    let chain = ChainEndpointConfig {
        name: "schain-c".to_string(),
        chain_id: 102,
        rpc_url: "http://127.0.0.1:9005".to_string(),
        message_proxy: "0x0000000000000000000000000000000000000004".to_string(),
        is_mainnet: false,
        node_roster: vec![NodeConfig {
            name: "node0".to_string(),
            rpc_url: "http://127.0.0.1:9006".to_string(),
        }],
    };
    let sibling = chain.as_sibling_chain();
    assert_eq!(sibling.name, "schain-c");
    assert_eq!(sibling.chain_id, 102);
    assert_eq!(sibling.nodes.len(), 1);
}
