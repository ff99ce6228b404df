//! Progressive scan (`spec.md` §4.2 strategy 2): widening look-back windows
//! centered on the chain head, tried in order until one yields a hit.

use alloy::primitives::Address;
use alloy::rpc::types::BlockNumberOrTag;
use async_trait::async_trait;
use tracing::debug;

use crate::error::RpcError;
use crate::rpc::RpcClient;

use super::{Scanner, ScanQuery, ScanResult, decode_and_select, outgoing_message_filter};

/// ~6 blocks/minute, per `spec.md` §4.2.
const BLOCKS_PER_MINUTE: u64 = 6;
const BLOCKS_PER_DAY: u64 = BLOCKS_PER_MINUTE * 60 * 24;

#[derive(Clone, Copy, Debug)]
pub struct ProgressiveScanner {
    windows: [u64; 5],
}

impl Default for ProgressiveScanner {
    fn default() -> Self {
        Self {
            windows: [
                BLOCKS_PER_DAY,
                BLOCKS_PER_DAY * 7,
                BLOCKS_PER_DAY * 30,
                BLOCKS_PER_DAY * 365,
                BLOCKS_PER_DAY * 365 * 3,
            ],
        }
    }
}

#[async_trait]
impl Scanner for ProgressiveScanner {
    async fn scan(
        &self,
        client: &RpcClient,
        proxy: Address,
        query: &ScanQuery,
        from_block: u64,
        to_block: Option<u64>,
    ) -> Result<ScanResult, RpcError> {
        let latest = match to_block {
            Some(t) => t,
            None => client.get_block_number().await?,
        };

        for window in self.windows {
            let from = latest.saturating_sub(window).max(from_block);
            let result = self.query_range(client, proxy, query, from, latest).await?;
            if !result.messages.is_empty() {
                debug!(window, "progressive scan hit");
                return Ok(result);
            }
        }

        // Full range as the last resort.
        self.query_range(client, proxy, query, from_block, latest).await
    }
}

impl ProgressiveScanner {
    async fn query_range(
        &self,
        client: &RpcClient,
        proxy: Address,
        query: &ScanQuery,
        from: u64,
        to: u64,
    ) -> Result<ScanResult, RpcError> {
        if from > to {
            return Ok(ScanResult::default());
        }
        let filter = outgoing_message_filter(proxy, query)
            .from_block(BlockNumberOrTag::Number(from))
            .to_block(BlockNumberOrTag::Number(to));

        let logs = client.get_logs(&filter).await?;
        let (messages, last_block_observed) = decode_and_select(logs, query);
        Ok(ScanResult {
            messages,
            last_block_observed,
        })
    }
}
