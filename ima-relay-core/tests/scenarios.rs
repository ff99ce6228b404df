//! Exercises the six canonical transfer scenarios end to end against a
//! mocked `alloy` JSON-RPC transport, so the whole pipeline (scan, form,
//! verify, sign, submit, classify) runs without a live chain.

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, B256, LogData, U256, keccak256};
use alloy::signers::local::PrivateKeySigner;
use alloy::sol_types::SolEvent;
use alloy::transports::mock::Asserter;
use ima_relay_core::batch::BatchFormerConfig;
use ima_relay_core::chain::{Message, NodeEndpoint, OutgoingMessage, PostMessageError};
use ima_relay_core::coordinator::InMemoryCoordinator;
use ima_relay_core::error::{ContractError, RelayError};
use ima_relay_core::error_registry::ErrorRegistry;
use ima_relay_core::gas::GasPolicy;
use ima_relay_core::rpc::RpcClient;
use ima_relay_core::s2s_verifier::{S2sVerifier, quorum};
use ima_relay_core::scanner::progressive::ProgressiveScanner;
use ima_relay_core::scanner::{ScanQuery, Scanner};
use ima_relay_core::signature_collector::StubSignatureCollector;
use ima_relay_core::signer::LocalKeySigner;
use ima_relay_core::test_utils::mock_rpc_client;
use ima_relay_core::transfer_loop::{PassOutcome, TransferLoop, TransferLoopConfig, TransferLoopEndpoints};

const SOURCE_PROXY: Address = Address::new([0x11; 20]);
const DEST_PROXY: Address = Address::new([0x22; 20]);

fn push_quantity(asserter: &Asserter, value: u64) {
    asserter.push_success(&format!("0x{value:x}"));
}

fn push_uint256(asserter: &Asserter, value: u64) {
    let encoded = U256::from(value).to_be_bytes::<32>();
    asserter.push_success(&alloy::hex::encode_prefixed(encoded));
}

fn push_hash(asserter: &Asserter, value: B256) {
    asserter.push_success(&value.to_string());
}

fn push_logs(asserter: &Asserter, logs: Vec<serde_json::Value>) {
    asserter.push_success(&logs);
}

fn outgoing_message_log(
    dst_chain_hash: B256,
    msg_counter: u64,
    src: Address,
    dst: Address,
    data: Vec<u8>,
    block_number: u64,
    log_index: u64,
) -> serde_json::Value {
    let event = OutgoingMessage {
        dstChainHash: dst_chain_hash,
        msgCounter: U256::from(msg_counter),
        srcContract: src,
        dstContract: dst,
        data: data.into(),
    };
    log_json(SOURCE_PROXY, event.encode_log_data(), block_number, log_index)
}

fn post_message_error_log(counter: u64, reason: &str, block_number: u64, log_index: u64) -> serde_json::Value {
    let event = PostMessageError {
        msgCounter: U256::from(counter),
        reason: reason.as_bytes().to_vec().into(),
    };
    log_json(DEST_PROXY, event.encode_log_data(), block_number, log_index)
}

fn log_json(address: Address, data: LogData, block_number: u64, log_index: u64) -> serde_json::Value {
    let topics: Vec<String> = data.topics().iter().map(|t| t.to_string()).collect();
    serde_json::json!({
        "address": address.to_string(),
        "topics": topics,
        "data": data.data.to_string(),
        "blockHash": format!("0x{}", "11".repeat(32)),
        "blockNumber": format!("0x{block_number:x}"),
        "transactionHash": format!("0x{}", "22".repeat(32)),
        "transactionIndex": "0x0",
        "logIndex": format!("0x{log_index:x}"),
        "removed": false,
    })
}

fn receipt_json(status_ok: bool, block_number: u64, gas_used: u64) -> serde_json::Value {
    serde_json::json!({
        "transactionHash": format!("0x{}", "33".repeat(32)),
        "transactionIndex": "0x0",
        "blockHash": format!("0x{}", "11".repeat(32)),
        "blockNumber": format!("0x{block_number:x}"),
        "from": format!("0x{}", "44".repeat(20)),
        "to": DEST_PROXY.to_string(),
        "cumulativeGasUsed": format!("0x{gas_used:x}"),
        "gasUsed": format!("0x{gas_used:x}"),
        "contractAddress": null,
        "logs": [],
        "logsBloom": format!("0x{}", "00".repeat(256)),
        "status": if status_ok { "0x1" } else { "0x0" },
        "type": "0x2",
        "effectiveGasPrice": "0x3b9aca00",
    })
}

fn base_config(direction: &str, batch_size: usize) -> TransferLoopConfig {
    TransferLoopConfig {
        direction: direction.to_string(),
        time_budget: Duration::from_secs(60),
        transfer_steps: None,
        max_transactions_count: None,
        sleep_between_tx: Duration::ZERO,
        batch: BatchFormerConfig {
            batch_size,
            block_depth: None,
            block_age: None,
        },
    }
}

fn build_loop(direction: &str, batch_size: usize, error_registry: Arc<ErrorRegistry>) -> TransferLoop {
    TransferLoop::new(
        Arc::new(InMemoryCoordinator::default()),
        error_registry,
        Arc::new(StubSignatureCollector),
        Arc::new(LocalKeySigner::from_private_key(&PrivateKeySigner::random())),
        GasPolicy::mainnet(),
        None,
        base_config(direction, batch_size),
    )
}

/// Scenario 1: happy M->S batch of two, submits and clears the category.
#[tokio::test]
async fn happy_m2s_batch_of_two_submits_and_clears_category() {
    let (source, source_asserter) = mock_rpc_client("mainnet");
    let (destination, dest_asserter) = mock_rpc_client("my-schain");

    let dst_chain_hash = keccak256(b"my-schain");
    let sender = Address::new([0x55; 20]);
    let dest_contract = Address::new([0x66; 20]);

    // form_batch: source-side reads.
    push_uint256(&source_asserter, 5); // getOutgoingMessagesCounter
    push_uint256(&source_asserter, 0); // getLastOutgoingMessageBlockId (no reference chain)
    push_quantity(&source_asserter, 1000); // progressive scan for counter 3: getBlockNumber
    push_logs(
        &source_asserter,
        vec![
            outgoing_message_log(dst_chain_hash, 3, sender, dest_contract, vec![1], 100, 0),
            outgoing_message_log(dst_chain_hash, 4, sender, dest_contract, vec![2], 100, 1),
        ],
    ); // getLogs for counter 3
    push_quantity(&source_asserter, 1000); // progressive scan for counter 4: getBlockNumber
    push_logs(
        &source_asserter,
        vec![
            outgoing_message_log(dst_chain_hash, 3, sender, dest_contract, vec![1], 100, 0),
            outgoing_message_log(dst_chain_hash, 4, sender, dest_contract, vec![2], 100, 1),
        ],
    ); // getLogs for counter 4
    push_uint256(&source_asserter, 5); // second form_batch pass: getOutgoingMessagesCounter again

    // destination-side reads.
    push_uint256(&dest_asserter, 3); // getIncomingMessagesCounter
    push_quantity(&dest_asserter, 10_000_000_000); // gasPrice
    asserter_push_empty_call(&dest_asserter); // dry-run succeeds
    push_quantity(&dest_asserter, 150_000); // estimateGas
    push_quantity(&dest_asserter, 0); // transaction count / nonce
    push_hash(&dest_asserter, B256::repeat_byte(0x99)); // sendRawTransaction
    dest_asserter.push_success(&receipt_json(true, 1001, 150_000)); // receipt
    push_uint256(&dest_asserter, 5); // second form_batch pass: getIncomingMessagesCounter, now equal

    let error_registry = Arc::new(ErrorRegistry::new());
    let transfer_loop = build_loop("M2S", 2, error_registry.clone());
    let endpoints = TransferLoopEndpoints {
        source,
        destination,
        source_proxy: SOURCE_PROXY,
        destination_proxy: DEST_PROXY,
        source_chain_name: "Mainnet".to_string(),
        destination_chain_name: "my-schain".to_string(),
        destination_is_mainnet: false,
        destination_chain_id: 123_456,
        s2s_roster: None,
        coordinator_index: 0,
    };

    let outcome = transfer_loop.run_pass(&endpoints).await.expect("pass should succeed");
    assert_eq!(
        outcome,
        PassOutcome::Completed {
            messages_submitted: 2,
            steps: 1
        }
    );
    assert!(error_registry.current_failure("M2S").is_none());
}

fn asserter_push_empty_call(asserter: &Asserter) {
    asserter.push_success(&"0x".to_string());
}

/// Scenario 2: the agent reads a stale starting counter; the destination's
/// dry-run rejects it and the pass fails without ever submitting.
#[tokio::test]
async fn starting_counter_mismatch_fails_dry_run() {
    let (source, source_asserter) = mock_rpc_client("mainnet");
    let (destination, dest_asserter) = mock_rpc_client("my-schain");

    let dst_chain_hash = keccak256(b"my-schain");
    let sender = Address::new([0x55; 20]);
    let dest_contract = Address::new([0x66; 20]);

    push_uint256(&source_asserter, 5);
    push_uint256(&source_asserter, 0);
    push_quantity(&source_asserter, 1000);
    push_logs(
        &source_asserter,
        vec![outgoing_message_log(dst_chain_hash, 3, sender, dest_contract, vec![1], 100, 0)],
    );
    push_quantity(&source_asserter, 1000);
    push_logs(
        &source_asserter,
        vec![outgoing_message_log(dst_chain_hash, 4, sender, dest_contract, vec![2], 100, 1)],
    );

    push_uint256(&dest_asserter, 3); // stale incoming counter
    push_quantity(&dest_asserter, 10_000_000_000);
    dest_asserter.push_failure_msg("execution reverted: Starting counter is not equal to incoming message counter");

    let error_registry = Arc::new(ErrorRegistry::new());
    let transfer_loop = build_loop("M2S", 2, error_registry.clone());
    let endpoints = TransferLoopEndpoints {
        source,
        destination,
        source_proxy: SOURCE_PROXY,
        destination_proxy: DEST_PROXY,
        source_chain_name: "Mainnet".to_string(),
        destination_chain_name: "my-schain".to_string(),
        destination_is_mainnet: false,
        destination_chain_id: 123_456,
        s2s_roster: None,
        coordinator_index: 0,
    };

    let err = transfer_loop.run_pass(&endpoints).await.expect_err("dry run should reject stale counter");
    assert!(matches!(err, RelayError::Contract(ContractError::DryRun { .. })));
    assert!(error_registry.current_failure("M2S").is_some());
}

fn node_roster(n: usize) -> (Vec<(NodeEndpoint, RpcClient)>, Vec<Asserter>) {
    let mut nodes = Vec::with_capacity(n);
    let mut asserters = Vec::with_capacity(n);
    for i in 0..n {
        let (client, asserter) = mock_rpc_client(&format!("node-{i}"));
        nodes.push((
            NodeEndpoint {
                name: format!("node-{i}"),
                rpc_url: format!("mock://node-{i}"),
            },
            client,
        ));
        asserters.push(asserter);
    }
    (nodes, asserters)
}

fn s2s_message(dst_chain_hash: B256, sender: Address, dest_contract: Address) -> (Message, serde_json::Value) {
    let message = Message {
        msg_counter: 7,
        sender,
        destination_contract: dest_contract,
        data: vec![0xaa].into(),
        saved_block_number: 42,
    };
    let log = outgoing_message_log(dst_chain_hash, 7, sender, dest_contract, vec![0xaa], 42, 0);
    (message, log)
}

/// Scenario 3: four nodes, one dissents; quorum of 3 is still reached.
#[tokio::test]
async fn s2s_one_bad_node_still_reaches_quorum() {
    let dst_chain_hash = keccak256(b"sibling-schain");
    let sender = Address::new([0x77; 20]);
    let dest_contract = Address::new([0x88; 20]);
    let (message, log) = s2s_message(dst_chain_hash, sender, dest_contract);

    let (nodes, asserters) = node_roster(4);
    for (i, asserter) in asserters.iter().enumerate() {
        if i == 3 {
            push_logs(asserter, vec![]); // the dissenting node
        } else {
            push_logs(asserter, vec![log.clone()]);
        }
    }

    assert_eq!(quorum(nodes.len()), 3);
    let verifier = S2sVerifier {
        nodes: &nodes,
        source_proxy: SOURCE_PROXY,
        dest_chain_name: "sibling-schain".to_string(),
    };

    verifier.verify(&[message]).await.expect("three agreeing nodes should satisfy quorum");
}

/// Scenario 4: four nodes, two dissent; quorum of 3 cannot be reached.
#[tokio::test]
async fn s2s_two_bad_nodes_fail_quorum() {
    let dst_chain_hash = keccak256(b"sibling-schain");
    let sender = Address::new([0x77; 20]);
    let dest_contract = Address::new([0x88; 20]);
    let (message, log) = s2s_message(dst_chain_hash, sender, dest_contract);

    let (nodes, asserters) = node_roster(4);
    for (i, asserter) in asserters.iter().enumerate() {
        if i >= 2 {
            push_logs(asserter, vec![]); // two dissenting nodes
        } else {
            push_logs(asserter, vec![log.clone()]);
        }
    }

    let verifier = S2sVerifier {
        nodes: &nodes,
        source_proxy: SOURCE_PROXY,
        dest_chain_name: "sibling-schain".to_string(),
    };

    let err = verifier.verify(&[message]).await.expect_err("two dissenting nodes should fail quorum");
    match err {
        ima_relay_core::error::SecurityError::S2SQuorum { pass, fail, total, quorum } => {
            assert_eq!((pass, fail, total, quorum), (2, 2, 4, 3));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

/// Scenario 5: day and week windows miss, the month window hits.
#[tokio::test]
async fn progressive_scan_misses_short_windows_then_hits() {
    let (client, asserter) = mock_rpc_client("mainnet");
    let dst_chain_hash = keccak256(b"my-schain");
    let sender = Address::new([0x55; 20]);
    let dest_contract = Address::new([0x66; 20]);

    let latest = 300_000u64;
    let event_block = 100_000u64;

    push_quantity(&asserter, latest); // getBlockNumber
    push_logs(&asserter, vec![]); // 1-day window: miss
    push_logs(&asserter, vec![]); // 1-week window: miss
    push_logs(
        &asserter,
        vec![outgoing_message_log(dst_chain_hash, 9, sender, dest_contract, vec![3], event_block, 0)],
    ); // 1-month window: hit

    let scanner = ProgressiveScanner::default();
    let query = ScanQuery {
        dst_chain_hash,
        src_contract: SOURCE_PROXY,
        msg_counter: Some(9),
    };

    let result = scanner.scan(&client, SOURCE_PROXY, &query, 0, None).await.expect("scan should succeed");
    assert_eq!(result.messages.len(), 1);
    assert_eq!(result.messages[0].msg_counter, 9);
}

/// Scenario 6: mainnet submission succeeds but the destination emits
/// `PostMessageError`; the pass fails on the post-submit invariant check.
#[tokio::test]
async fn mainnet_post_message_error_fails_the_pass() {
    let (source, source_asserter) = mock_rpc_client("my-schain");
    let (destination, dest_asserter) = mock_rpc_client("mainnet");

    let dst_chain_hash = keccak256(b"Mainnet");
    let sender = Address::new([0x55; 20]);
    let dest_contract = Address::new([0x66; 20]);

    push_uint256(&source_asserter, 1); // getOutgoingMessagesCounter
    push_uint256(&source_asserter, 0); // getLastOutgoingMessageBlockId
    push_quantity(&source_asserter, 1000); // progressive scan getBlockNumber
    push_logs(
        &source_asserter,
        vec![outgoing_message_log(dst_chain_hash, 0, sender, dest_contract, vec![9], 900, 0)],
    );

    push_uint256(&dest_asserter, 0); // getIncomingMessagesCounter
    push_quantity(&dest_asserter, 10_000_000_000); // gasPrice
    asserter_push_empty_call(&dest_asserter); // dry-run succeeds
    push_quantity(&dest_asserter, 100_000); // estimateGas
    push_quantity(&dest_asserter, 0); // nonce
    push_hash(&dest_asserter, B256::repeat_byte(0xab)); // sendRawTransaction
    dest_asserter.push_success(&receipt_json(true, 555, 100_000)); // receipt, status ok
    push_logs(&dest_asserter, vec![post_message_error_log(42, "bad-token", 555, 0)]); // post-submit check

    let error_registry = Arc::new(ErrorRegistry::new());
    let transfer_loop = build_loop("S2M", 1, error_registry.clone());
    let endpoints = TransferLoopEndpoints {
        source,
        destination,
        source_proxy: SOURCE_PROXY,
        destination_proxy: DEST_PROXY,
        source_chain_name: "my-schain".to_string(),
        destination_chain_name: "Mainnet".to_string(),
        destination_is_mainnet: true,
        destination_chain_id: 1,
        s2s_roster: None,
        coordinator_index: 0,
    };

    let err = transfer_loop.run_pass(&endpoints).await.expect_err("PostMessageError should fail the pass");
    match err {
        RelayError::Contract(ContractError::PostMessage { counter, reason }) => {
            assert_eq!(counter, 42);
            assert_eq!(reason, "bad-token");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(error_registry.current_failure("S2M").is_some());
}
