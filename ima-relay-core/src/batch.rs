//! Batch Former (`spec.md` §4.7): reads source/destination counters, locates
//! each missing message, enforces the block-depth and block-age security
//! checks, and assembles a bounded batch.

use std::time::Duration;

use alloy::network::Ethereum;
use alloy::primitives::{Address, keccak256};
use alloy::providers::DynProvider;
use tracing::{debug, info, warn};

use crate::chain::{IMessageProxy, Message, OutgoingBatch, Signature};
use crate::error::{RelayError, SecurityError};
use crate::rpc::RpcClient;
use crate::scanner::{ReferenceWalkbackScanner, ScanQuery, ScannerFacade};

/// `spec.md` §6 process configuration, scoped to one direction.
#[derive(Clone, Copy, Debug)]
pub struct BatchFormerConfig {
    /// `transactionsPerBlock`, default 5.
    pub batch_size: usize,
    /// `blockAwaitDepth`, default 0 (disabled). On for mainnet source, off
    /// for S-chain source by convention.
    pub block_depth: Option<u64>,
    /// `blockAge`, default 0 (disabled).
    pub block_age: Option<Duration>,
}

impl Default for BatchFormerConfig {
    fn default() -> Self {
        Self {
            batch_size: 5,
            block_depth: None,
            block_age: None,
        }
    }
}

pub struct BatchFormer<'a> {
    pub source: &'a RpcClient,
    pub destination: &'a RpcClient,
    pub source_proxy: Address,
    pub destination_proxy: Address,
    pub source_chain_name: String,
    pub destination_chain_name: String,
    pub scanners: &'a ScannerFacade,
    pub reference: &'a ReferenceWalkbackScanner,
    pub config: BatchFormerConfig,
}

impl BatchFormer<'_> {
    /// `Ok(None)` means nothing to do (`outCnt == inCnt`, or the first
    /// candidate message already fails a security check, `spec.md` §7
    /// treats that as "abort the current batch").
    pub async fn form_batch(&self) -> Result<Option<OutgoingBatch>, RelayError> {
        let source_proxy = IMessageProxy::new(self.source_proxy, self.source.provider().clone());
        let dest_proxy = IMessageProxy::new(self.destination_proxy, self.destination.provider().clone());

        let out_cnt: u64 = self
            .source
            .call_contract("getOutgoingMessagesCounter", || async {
                Ok(source_proxy.getOutgoingMessagesCounter(self.destination_chain_name.clone()).call().await?)
            })
            .await?
            .try_into()
            .map_err(|_| RelayError::Other(anyhow::anyhow!("outgoing counter overflowed u64")))?;

        let in_cnt: u64 = self
            .destination
            .call_contract("getIncomingMessagesCounter", || async {
                Ok(dest_proxy.getIncomingMessagesCounter(self.source_chain_name.clone()).call().await?)
            })
            .await?
            .try_into()
            .map_err(|_| RelayError::Other(anyhow::anyhow!("incoming counter overflowed u64")))?;

        if in_cnt >= out_cnt {
            debug!(in_cnt, out_cnt, "nothing to do");
            return Ok(None);
        }

        let reference_chain = self.build_reference_chain(&source_proxy, in_cnt, out_cnt).await?;
        let dst_chain_hash = keccak256(self.destination_chain_name.as_bytes());

        let mut messages = Vec::new();
        for counter in in_cnt..out_cnt {
            if messages.len() >= self.config.batch_size {
                break;
            }

            let (from_block, to_block) = match reference_chain
                .as_ref()
                .and_then(|chain| chain.iter().find(|r| r.current_message == counter))
            {
                Some(record) => (record.current_block_id, Some(record.current_block_id)),
                None => (0, None),
            };

            let query = ScanQuery {
                dst_chain_hash,
                src_contract: self.source_proxy,
                msg_counter: Some(counter),
            };

            let result = self
                .scanners
                .scan(self.source, self.source_proxy, &query, from_block, to_block)
                .await?;

            let Some(message) = result.messages.into_iter().find(|m| m.msg_counter == counter) else {
                warn!(counter, "message not found in scan window, stopping batch formation");
                break;
            };

            if let Err(security_err) = self.check_security(&message).await {
                if messages.is_empty() {
                    return Err(security_err.into());
                }
                info!(counter, reason = %security_err, "security check failed, submitting what was formed so far");
                break;
            }

            messages.push(message);
        }

        if messages.is_empty() {
            return Ok(None);
        }

        Ok(Some(OutgoingBatch {
            source_chain: self.source_chain_name.clone(),
            dest_chain: self.destination_chain_name.clone(),
            start_counter: in_cnt,
            messages,
            signature: Signature::zero(),
        }))
    }

    async fn build_reference_chain(
        &self,
        source_proxy: &IMessageProxy::IMessageProxyInstance<DynProvider<Ethereum>>,
        in_cnt: u64,
        out_cnt: u64,
    ) -> Result<Option<Vec<crate::chain::ReferenceLogRecord>>, RelayError> {
        let newest_block: u64 = self
            .source
            .call_contract("getLastOutgoingMessageBlockId", || async {
                Ok(source_proxy.getLastOutgoingMessageBlockId(self.destination_chain_name.clone()).call().await?)
            })
            .await?
            .try_into()
            .map_err(|_| RelayError::Other(anyhow::anyhow!("block id overflowed u64")))?;

        if newest_block == 0 {
            return Ok(None);
        }

        Ok(self
            .reference
            .walk_back(self.source, self.source_proxy, newest_block, in_cnt, out_cnt.saturating_sub(1))
            .await?)
    }

    async fn check_security(&self, message: &Message) -> Result<(), SecurityError> {
        if let Some(depth) = self.config.block_depth {
            let latest = self
                .source
                .get_block_number()
                .await
                .map_err(|_| SecurityError::BlockDepth {
                    message_block: message.saved_block_number,
                    depth: 0,
                    required: depth,
                })?;
            let actual_depth = latest.saturating_sub(message.saved_block_number);
            if actual_depth < depth {
                return Err(SecurityError::BlockDepth {
                    message_block: message.saved_block_number,
                    depth: actual_depth,
                    required: depth,
                });
            }
        }

        if let Some(age) = self.config.block_age {
            let block = self
                .source
                .get_block(message.saved_block_number)
                .await
                .ok()
                .flatten();
            if let Some(block) = block {
                let now = std::time::SystemTime::now()
                    .duration_since(std::time::UNIX_EPOCH)
                    .unwrap_or_default()
                    .as_secs();
                let block_age = now.saturating_sub(block.header.timestamp);
                if block_age < age.as_secs() {
                    return Err(SecurityError::BlockAge {
                        message_block: message.saved_block_number,
                        age_secs: block_age,
                        required_secs: age.as_secs(),
                    });
                }
            }
        }

        Ok(())
    }
}
