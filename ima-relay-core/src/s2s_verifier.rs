//! S->S Verifier (`spec.md` §4.8): activated only when the origin is an
//! S-chain. Queries the same `OutgoingMessage` on every node of the source
//! S-chain's roster and requires a quorum of confirmations.

use alloy::primitives::{Address, keccak256};
use alloy::rpc::types::BlockNumberOrTag;
use alloy::sol_types::SolEvent;
use futures::future::join_all;
use tracing::warn;

use crate::chain::{Message, NodeEndpoint, OutgoingMessage};
use crate::error::SecurityError;
use crate::rpc::RpcClient;
use crate::scanner::{ScanQuery, outgoing_message_filter};

/// `spec.md` §4.8 quorum table: `{1->1, 2->2, 4->3, 16->11}`, else
/// `ceil(2N/3)`.
pub fn quorum(n: usize) -> usize {
    match n {
        1 => 1,
        2 => 2,
        4 => 3,
        16 => 11,
        _ => (2 * n).div_ceil(3),
    }
}

pub struct S2sVerifier<'a> {
    pub nodes: &'a [(NodeEndpoint, RpcClient)],
    pub source_proxy: Address,
    pub dest_chain_name: String,
}

impl S2sVerifier<'_> {
    /// Verifies every message in `messages` against the node roster. Accepts
    /// (short-circuits) once `pass >= quorum`; rejects the whole batch once
    /// `fail > N - quorum`.
    pub async fn verify(&self, messages: &[Message]) -> Result<(), SecurityError> {
        let n = self.nodes.len();
        let q = quorum(n);
        let dst_chain_hash = keccak256(self.dest_chain_name.as_bytes());

        for message in messages {
            let checks = self.nodes.iter().map(|(_, client)| {
                self.confirm_on_node(client, dst_chain_hash, message)
            });
            let results = join_all(checks).await;

            let pass = results.iter().filter(|ok| **ok).count();
            let fail = results.len() - pass;

            if pass < q || fail > n.saturating_sub(q) {
                return Err(SecurityError::S2SQuorum {
                    pass,
                    fail,
                    total: n,
                    quorum: q,
                });
            }
        }

        Ok(())
    }

    async fn confirm_on_node(&self, client: &RpcClient, dst_chain_hash: alloy::primitives::B256, message: &Message) -> bool {
        let query = ScanQuery {
            dst_chain_hash,
            src_contract: self.source_proxy,
            msg_counter: Some(message.msg_counter),
        };
        let filter = outgoing_message_filter(self.source_proxy, &query)
            .from_block(BlockNumberOrTag::Number(message.saved_block_number))
            .to_block(BlockNumberOrTag::Number(message.saved_block_number));

        let logs = match client.get_logs(&filter).await {
            Ok(logs) => logs,
            Err(err) => {
                warn!(endpoint = client.endpoint_name(), err = ?err, "s2s node query failed, counting as fail");
                return false;
            }
        };

        logs.iter().any(|log| {
            let Ok(decoded) = OutgoingMessage::decode_log(&log.inner) else {
                return false;
            };
            decoded.dstChainHash == dst_chain_hash
                && decoded.msgCounter == alloy::primitives::U256::from(message.msg_counter)
                && decoded.srcContract == message.sender
                && decoded.dstContract == message.destination_contract
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::single_node(1, 1)]
    #[case::two_nodes(2, 2)]
    #[case::four_nodes(4, 3)]
    #[case::sixteen_nodes(16, 11)]
    #[case::three_nodes_general_formula(3, 2)]
    #[case::seven_nodes_general_formula(7, 5)]
    fn quorum_table_matches_spec(#[case] n: usize, #[case] expected: usize) {
        assert_eq!(quorum(n), expected);
    }
}
