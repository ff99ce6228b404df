//! Call Pipeline (`spec.md` §4.4): gas policy -> dry-run -> sign -> submit
//! -> await receipt -> classify, for one contract call.

use std::time::Duration;

use alloy::primitives::{Address, Bytes, U256};
use alloy::rpc::types::{TransactionReceipt, TransactionRequest};
use tokio::time::sleep;
use tracing::{info, warn};

use crate::error::{ContractError, RelayError};
use crate::gas::{GasPolicy, PostIncomingMessagesFloor};
use crate::rpc::RpcClient;
use crate::signer::{SignOutcome, Signer};

/// Per-call policy (`spec.md` §4.4 `policy` argument).
#[derive(Clone, Copy, Debug, Default)]
pub struct CallPolicy {
    pub ignore_dry_run: bool,
    /// Set when the destination is an S-chain with a free-gas policy that
    /// may require a proof-of-work-computed price.
    pub is_s_chain_destination: bool,
    /// Set for `postIncomingMessages` calls: the number of messages in the
    /// batch, used to enforce the extra `perMessageGas * N + overhead`
    /// floor `spec.md` §4.3 additionally requires for that call.
    pub post_incoming_messages_count: Option<usize>,
}

/// Outcome of a fully-classified call (`spec.md` §4.4 step 5).
#[derive(Debug)]
pub struct CallOutcome {
    pub receipt: TransactionReceipt,
    pub gas_spent: u64,
    pub eth_spent: U256,
}

/// External proof-of-work helper contract (`spec.md` §9): `computePow(addr,
/// nonce, gas) -> gasPriceHex`, invoked when a S-chain destination's
/// free-gas policy rejects the computed price due to insufficient balance.
#[async_trait::async_trait]
pub trait PowSidecar: Send + Sync {
    async fn compute_pow(&self, address: Address, nonce: u64, gas_limit: u64) -> anyhow::Result<u128>;
}

pub struct CallPipeline<'a> {
    pub client: &'a RpcClient,
    pub chain_id: u64,
    pub gas_policy: GasPolicy,
    pub pow_sidecar: Option<&'a dyn PowSidecar>,
}

impl<'a> CallPipeline<'a> {
    pub async fn execute(
        &self,
        contract: Address,
        call_data: Bytes,
        signer: &dyn Signer,
        value: U256,
        policy: CallPolicy,
    ) -> Result<CallOutcome, RelayError> {
        let from = signer.address();
        let raw_gas_price = self.client.get_gas_price().await?;
        let mut gas_price = self.gas_policy.gas_price(raw_gas_price);

        // Step 2: dry-run.
        let dry_run_result = self.client.eth_call(contract, from, call_data.clone()).await;
        if let Err(err) = dry_run_result {
            if !policy.ignore_dry_run {
                return Err(ContractError::DryRun { reason: err.to_string() }.into());
            }
            warn!(reason = %err, "dry-run reverted but ignore_dry_run is set, proceeding");
        }

        let estimate = self.client.estimate_gas(contract, from, call_data.clone(), value).await?;
        let gas_limit = match policy.post_incoming_messages_count {
            Some(count) => PostIncomingMessagesFloor::default().apply(&self.gas_policy, estimate, count),
            None => self.gas_policy.gas_limit(estimate),
        };

        let nonce = self
            .client
            .get_transaction_count(from, alloy::rpc::types::BlockNumberOrTag::Pending)
            .await?;

        let tx = TransactionRequest::default()
            .to(contract)
            .value(value)
            .input(call_data.into())
            .nonce(nonce)
            .gas_limit(gas_limit)
            .max_fee_per_gas(gas_price)
            .max_priority_fee_per_gas(gas_price);

        // Step 3: sign.
        let outcome = signer.sign(tx.clone(), self.chain_id).await?;

        let mut receipt = match outcome {
            SignOutcome::Receipt(receipt) => *receipt,
            SignOutcome::SignedRawTx(raw) => self.submit_and_await(&raw).await?,
        };

        // Step 4 (continued): S-chain free-gas PoW retry.
        if policy.is_s_chain_destination && !receipt.status() {
            if let Some(pow) = self.pow_sidecar {
                let balance = self.client.get_balance(from).await?;
                let required = U256::from(gas_price) * U256::from(gas_limit);
                if balance < required {
                    info!("insufficient balance for S-chain free-gas policy, invoking PoW sidecar");
                    gas_price = pow
                        .compute_pow(from, nonce, gas_limit)
                        .await
                        .map_err(RelayError::Other)?;
                    let tx = tx.max_fee_per_gas(gas_price).max_priority_fee_per_gas(gas_price);
                    let outcome = signer.sign(tx, self.chain_id).await?;
                    receipt = match outcome {
                        SignOutcome::Receipt(r) => *r,
                        SignOutcome::SignedRawTx(raw) => self.submit_and_await(&raw).await?,
                    };
                }
            }
        }

        // Step 5: classify.
        if !receipt.status() {
            return Err(ContractError::Call {
                reason: format!("transaction {:?} reverted", receipt.transaction_hash),
            }
            .into());
        }

        let gas_spent = receipt.gas_used;
        let eth_spent = U256::from(gas_spent) * U256::from(gas_price);

        Ok(CallOutcome {
            receipt,
            gas_spent,
            eth_spent,
        })
    }

    async fn submit_and_await(&self, raw: &[u8]) -> Result<TransactionReceipt, RelayError> {
        let tx_hash = self.client.send_raw_transaction(raw).await?;

        loop {
            if let Some(receipt) = self.client.get_transaction_receipt(tx_hash).await? {
                return Ok(receipt);
            }
            sleep(Duration::from_secs(1)).await;
        }
    }
}
