//! Iterative scan (`spec.md` §4.2 strategy 1): split `[from, to]` into
//! fixed-size windows and query each independently.

use alloy::primitives::Address;
use alloy::rpc::types::BlockNumberOrTag;
use async_trait::async_trait;
use tracing::warn;

use crate::error::RpcError;
use crate::rpc::RpcClient;

use super::{Scanner, ScanQuery, ScanResult, decode_and_select, outgoing_message_filter};

/// Defaults mirror `spec.md` §6 process configuration:
/// `countOfBlocksInIterativeStep` = 1000, `maxIterationsInAllRange` = 5000.
#[derive(Clone, Copy, Debug)]
pub struct IterativeScanner {
    pub window_size: u64,
    pub max_windows: u64,
}

impl Default for IterativeScanner {
    fn default() -> Self {
        Self {
            window_size: 1000,
            max_windows: 5000,
        }
    }
}

#[async_trait]
impl Scanner for IterativeScanner {
    async fn scan(
        &self,
        client: &RpcClient,
        proxy: Address,
        query: &ScanQuery,
        from_block: u64,
        to_block: Option<u64>,
    ) -> Result<ScanResult, RpcError> {
        let to = match to_block {
            Some(t) => t,
            None => client.get_block_number().await?,
        };

        if from_block > to {
            return Ok(ScanResult::default());
        }

        let span = to - from_block + 1;
        let window_count = if self.window_size == 0 { 1 } else { span.div_ceil(self.window_size) };

        // `spec.md` §4.2: "if W == 0 or the maximum number of windows would
        // exceed K, fall through to a single-window query".
        if self.window_size == 0 || window_count > self.max_windows {
            return Ok(self.query_window(client, proxy, query, from_block, to).await);
        }

        let mut messages = Vec::new();
        let mut last_block_observed = 0u64;
        let mut window_start = from_block;

        while window_start <= to {
            let window_end = (window_start + self.window_size - 1).min(to);
            let result = self.query_window(client, proxy, query, window_start, window_end).await;
            messages.extend(result.messages);
            last_block_observed = last_block_observed.max(result.last_block_observed);
            window_start = window_end + 1;
        }

        Ok(ScanResult {
            messages,
            last_block_observed,
        })
    }
}

impl IterativeScanner {
    /// Queries one window; on error, `spec.md` §4.2 says "abort with empty
    /// result on any window-level error, move on to next". The caller's
    /// loop continues regardless of this window's outcome.
    async fn query_window(
        &self,
        client: &RpcClient,
        proxy: Address,
        query: &ScanQuery,
        from: u64,
        to: u64,
    ) -> ScanResult {
        let filter = outgoing_message_filter(proxy, query)
            .from_block(BlockNumberOrTag::Number(from))
            .to_block(BlockNumberOrTag::Number(to));

        match client.get_logs(&filter).await {
            Ok(logs) => {
                let (messages, last_block_observed) = decode_and_select(logs, query);
                ScanResult {
                    messages,
                    last_block_observed,
                }
            }
            Err(err) => {
                warn!(from, to, err = ?err, "iterative scan window failed, skipping");
                ScanResult::default()
            }
        }
    }
}
