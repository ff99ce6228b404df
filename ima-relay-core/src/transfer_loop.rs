//! Transfer Loop (`spec.md` §4.9): per-direction loop performing
//! time-framing, cancellation via a coordinator, single-in-flight
//! guarantee, batching, signing, submitting, and the post-submit
//! log-absence check on mainnet.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use alloy::primitives::Address;
use alloy::rpc::types::{BlockNumberOrTag, Filter};
use alloy::sol_types::SolEvent;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::batch::{BatchFormer, BatchFormerConfig};
use crate::call_pipeline::{CallPipeline, CallPolicy, PowSidecar};
use crate::chain::{IMessageProxy, NodeEndpoint, PostMessageError};
use crate::coordinator::Coordinator;
use crate::error::{ContractError, RelayError};
use crate::error_registry::ErrorRegistry;
use crate::gas::GasPolicy;
use crate::rpc::RpcClient;
use crate::s2s_verifier::S2sVerifier;
use crate::scanner::{ReferenceWalkbackScanner, ScannerFacade};
use crate::signature_collector::{SignatureCollector, SignatureExtraOpts};
use crate::signer::Signer;

/// `spec.md` §6 process configuration, scoped to one direction.
#[derive(Clone, Debug)]
pub struct TransferLoopConfig {
    pub direction: String,
    pub time_budget: Duration,
    pub transfer_steps: Option<u32>,
    pub max_transactions_count: Option<u64>,
    pub sleep_between_tx: Duration,
    pub batch: BatchFormerConfig,
}

/// Everything one pass needs to talk to the two chains involved. Built
/// fresh by the Direction Fan-out for each pass (S->S picks a new source
/// node URL every time, `spec.md` §4.10).
pub struct TransferLoopEndpoints {
    pub source: RpcClient,
    pub destination: RpcClient,
    pub source_proxy: Address,
    pub destination_proxy: Address,
    pub source_chain_name: String,
    pub destination_chain_name: String,
    pub destination_is_mainnet: bool,
    pub destination_chain_id: u64,
    pub s2s_roster: Option<Vec<(NodeEndpoint, RpcClient)>>,
    /// Stable identity passed to the coordinator as `index` (`spec.md` §6
    /// `checkStart(direction, index)`). For M->S/S->M this is always `0`;
    /// for S->S it is the sibling chain id, so the single-in-flight
    /// guarantee (`spec.md` §5) is keyed per sibling rather than per
    /// freshly-constructed `TransferLoop` instance. A fresh instance is
    /// built every round (`spec.md` §4.10), so an internal per-instance
    /// counter would not actually distinguish siblings.
    pub coordinator_index: u64,
}

pub struct TransferLoop {
    pub coordinator: Arc<dyn Coordinator>,
    pub error_registry: Arc<ErrorRegistry>,
    pub signature_collector: Arc<dyn SignatureCollector>,
    pub signer: Arc<dyn Signer>,
    pub gas_policy: GasPolicy,
    pub pow_sidecar: Option<Arc<dyn PowSidecar>>,
    pub config: TransferLoopConfig,
    serial: AtomicU64,
}

#[derive(Debug, PartialEq, Eq)]
pub enum PassOutcome {
    /// Nothing to submit (`outCnt == inCnt`), or cancelled by the
    /// coordinator, both are non-error returns per `spec.md` §4.9 step 1/3.
    Noop,
    Completed { messages_submitted: u64, steps: u32 },
    TimeExceeded { messages_submitted: u64, steps: u32 },
}

impl TransferLoop {
    pub fn new(
        coordinator: Arc<dyn Coordinator>,
        error_registry: Arc<ErrorRegistry>,
        signature_collector: Arc<dyn SignatureCollector>,
        signer: Arc<dyn Signer>,
        gas_policy: GasPolicy,
        pow_sidecar: Option<Arc<dyn PowSidecar>>,
        config: TransferLoopConfig,
    ) -> Self {
        Self {
            coordinator,
            error_registry,
            signature_collector,
            signer,
            gas_policy,
            pow_sidecar,
            config,
            serial: AtomicU64::new(0),
        }
    }

    /// Runs one pass to completion. Never returns an error for expected
    /// control-flow outcomes (no-op, cancelled, time exceeded); only
    /// unrecoverable-for-this-pass failures (security, signing, contract)
    /// come back as `Err`, after having already been recorded in the error
    /// registry.
    pub async fn run_pass(&self, endpoints: &TransferLoopEndpoints) -> Result<PassOutcome, RelayError> {
        let index = endpoints.coordinator_index;
        let serial = self.serial.fetch_add(1, Ordering::SeqCst);
        let direction = self.config.direction.as_str();

        // Step 1: cancellation probe.
        if !self.coordinator.check_start(direction, index).await {
            return Ok(PassOutcome::Noop);
        }

        // Step 2: mark in-progress.
        self.coordinator.notify_start(direction, index).await;
        info!(direction, index, serial, "transfer pass starting");

        let started = Instant::now();
        let result = self.run_pass_inner(endpoints, serial).await;
        crate::metrics::PASS_DURATION_SECONDS
            .with_label_values(&[direction])
            .observe(started.elapsed().as_secs_f64());

        let outcome_label = match &result {
            Ok(PassOutcome::Noop) => "noop",
            Ok(PassOutcome::Completed { .. }) => "completed",
            Ok(PassOutcome::TimeExceeded { .. }) => "time_exceeded",
            Err(_) => "error",
        };
        crate::metrics::TRANSFER_PASSES_TOTAL
            .with_label_values(&[direction, outcome_label])
            .inc();

        match &result {
            Ok(_) => self.error_registry.clear_category(direction),
            Err(err) => self.error_registry.record_failure(direction, err.to_string()),
        }

        self.coordinator.notify_end(direction, index).await;
        info!(direction, index, serial, ok = result.is_ok(), "transfer pass ended");

        result
    }

    async fn run_pass_inner(&self, endpoints: &TransferLoopEndpoints, serial: u64) -> Result<PassOutcome, RelayError> {
        let scanners = ScannerFacade::default();
        let reference = ReferenceWalkbackScanner::default();
        let direction = self.config.direction.as_str();

        let deadline = Instant::now() + self.config.time_budget;
        let mut steps = 0u32;
        let mut messages_submitted = 0u64;

        loop {
            tracing::trace!(serial, steps, "forming next batch");
            let former = BatchFormer {
                source: &endpoints.source,
                destination: &endpoints.destination,
                source_proxy: endpoints.source_proxy,
                destination_proxy: endpoints.destination_proxy,
                source_chain_name: endpoints.source_chain_name.clone(),
                destination_chain_name: endpoints.destination_chain_name.clone(),
                scanners: &scanners,
                reference: &reference,
                config: self.config.batch,
            };

            // Step 3/4: read counters, form a batch.
            let Some(mut batch) = former.form_batch().await? else {
                if steps == 0 {
                    return Ok(PassOutcome::Noop);
                }
                break;
            };

            crate::metrics::INCOMING_COUNTER
                .with_label_values(&[direction])
                .set(batch.start_counter as i64);
            crate::metrics::OUTGOING_COUNTER
                .with_label_values(&[direction])
                .set(batch.end_counter() as i64);

            // Step 6: S->S verification.
            if let Some(roster) = &endpoints.s2s_roster {
                let verifier = S2sVerifier {
                    nodes: roster,
                    source_proxy: endpoints.source_proxy,
                    dest_chain_name: endpoints.destination_chain_name.clone(),
                };
                verifier.verify(&batch.messages).await?;
            }

            // Step 7: collect signature.
            let extra_opts = SignatureExtraOpts {
                is_s2s: endpoints.s2s_roster.is_some(),
            };
            batch.signature = self
                .signature_collector
                .sign(&batch.messages, batch.start_counter, &endpoints.source_chain_name, extra_opts)
                .await?;

            // Step 8: submit.
            let dest_proxy = IMessageProxy::new(endpoints.destination_proxy, endpoints.destination.provider().clone());
            let call = dest_proxy.postIncomingMessages(
                endpoints.source_chain_name.clone(),
                alloy::primitives::U256::from(batch.start_counter),
                batch.messages.iter().cloned().map(|m| m.into_sol()).collect(),
                batch.signature.clone().into_sol(),
            );
            let call_data = call.calldata().clone();

            let pipeline = CallPipeline {
                client: &endpoints.destination,
                chain_id: endpoints.destination_chain_id,
                gas_policy: self.gas_policy,
                pow_sidecar: self.pow_sidecar.as_deref(),
            };
            let policy = CallPolicy {
                ignore_dry_run: false,
                is_s_chain_destination: !endpoints.destination_is_mainnet,
                post_incoming_messages_count: endpoints
                    .destination_is_mainnet
                    .then_some(batch.messages.len()),
            };
            let outcome = pipeline
                .execute(endpoints.destination_proxy, call_data, self.signer.as_ref(), alloy::primitives::U256::ZERO, policy)
                .await?;

            // Step 9: post-submit mainnet invariant.
            if endpoints.destination_is_mainnet {
                self.check_post_message_error(endpoints, outcome.receipt.block_number).await?;
            }

            crate::metrics::MESSAGES_SUBMITTED_TOTAL
                .with_label_values(&[direction])
                .inc_by(batch.messages.len() as u64);

            messages_submitted += batch.messages.len() as u64;
            steps += 1;

            if self.config.sleep_between_tx > Duration::ZERO {
                sleep(self.config.sleep_between_tx).await;
            }

            // Step 5/10: time-framing and step/message budgets.
            if Instant::now() >= deadline {
                return Ok(PassOutcome::TimeExceeded { messages_submitted, steps });
            }
            if let Some(max_steps) = self.config.transfer_steps {
                if steps >= max_steps {
                    break;
                }
            }
            if let Some(max_messages) = self.config.max_transactions_count {
                if messages_submitted >= max_messages {
                    break;
                }
            }
        }

        Ok(PassOutcome::Completed { messages_submitted, steps })
    }

    async fn check_post_message_error(&self, endpoints: &TransferLoopEndpoints, block_number: Option<u64>) -> Result<(), ContractError> {
        let Some(block_number) = block_number else {
            return Ok(());
        };

        let filter = Filter::new()
            .address(endpoints.destination_proxy)
            .from_block(BlockNumberOrTag::Number(block_number))
            .to_block(BlockNumberOrTag::Number(block_number));

        let logs = match endpoints.destination.get_logs(&filter).await {
            Ok(logs) => logs,
            Err(err) => {
                warn!(err = ?err, "failed to check for PostMessageError, treating as absent");
                return Ok(());
            }
        };

        for log in logs {
            if let Ok(decoded) = PostMessageError::decode_log(&log.inner) {
                let counter: u64 = decoded.msgCounter.try_into().unwrap_or(0);
                return Err(ContractError::PostMessage {
                    counter,
                    reason: String::from_utf8_lossy(&decoded.reason).to_string(),
                });
            }
        }

        Ok(())
    }
}
