//! Mock RPC helpers for tests, gated behind the `test-utils` feature,
//! grounded in the teacher's `interchain-indexer-logic::test_utils::mock_rpc_provider`,
//! which builds an `alloy` mocked transport via `Asserter`.

use alloy::network::Ethereum;
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::transports::mock::Asserter;

use crate::rpc::RpcClient;

/// Builds an [`RpcClient`] backed by an `alloy` mock transport, so tests can
/// queue exact JSON-RPC responses without a live node.
pub fn mock_rpc_client(endpoint_name: &str) -> (RpcClient, Asserter) {
    let asserter = Asserter::new();
    let provider: DynProvider<Ethereum> = ProviderBuilder::new().connect_mocked_client(asserter.clone()).erased();
    let client = RpcClient::new(endpoint_name, "mock://local", provider);
    (client, asserter)
}

pub fn mock_provider() -> (DynProvider<Ethereum>, Asserter) {
    let asserter = Asserter::new();
    let provider = ProviderBuilder::new().connect_mocked_client(asserter.clone()).erased();
    (provider, asserter)
}
