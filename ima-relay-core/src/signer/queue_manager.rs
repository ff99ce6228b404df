//! Transaction-manager queue signer (`spec.md` §4.5): enqueues
//! `{priority, score, tx}` into an external queue, polls for terminal status,
//! and returns the confirmed receipt. The only backend that is "auto-send".

use std::time::Duration;

use alloy::network::TransactionBuilder;
use alloy::primitives::Address;
use alloy::rpc::types::{TransactionReceipt, TransactionRequest};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::time::sleep;

use crate::error::SignerError;

use super::{SignOutcome, Signer};

/// Default bounded wait before giving up on a queued transaction:
/// 10 hours, per `spec.md` §4.5.
const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(10 * 60 * 60);
const POLL_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
enum QueueStatus {
    Pending,
    Success,
    Failed,
    Dropped,
}

pub struct QueueManagerSigner {
    http: reqwest::Client,
    url: String,
    address: Address,
    priority: u8,
    max_wait: Duration,
}

impl QueueManagerSigner {
    pub fn new(url: impl Into<String>, address: Address, priority: u8) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: url.into(),
            address,
            priority,
            max_wait: DEFAULT_MAX_WAIT,
        }
    }

    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }

    /// `score = priority * 10^len(ts) + ts`, per `spec.md` §4.5: a
    /// lexicographically-stable priority key that keeps higher-priority
    /// items ahead regardless of timestamp width.
    fn score(priority: u8, timestamp_secs: u64) -> u64 {
        let digits = timestamp_secs.to_string().len() as u32;
        priority as u64 * 10u64.pow(digits) + timestamp_secs
    }

    async fn enqueue(&self, tx: &TransactionRequest) -> Result<String, SignerError> {
        #[derive(Serialize)]
        struct EnqueueRequest<'a> {
            priority: u8,
            score: u64,
            tx: &'a TransactionRequest,
        }

        #[derive(Deserialize)]
        struct EnqueueResponse {
            id: String,
        }

        let timestamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();

        let request = EnqueueRequest {
            priority: self.priority,
            score: Self::score(self.priority, timestamp),
            tx,
        };

        let response: EnqueueResponse = self
            .http
            .post(format!("{}/enqueue", self.url))
            .json(&request)
            .send()
            .await
            .map_err(|err| SignerError::Backend {
                backend: "queue",
                reason: err.to_string(),
            })?
            .json()
            .await
            .map_err(|err| SignerError::Backend {
                backend: "queue",
                reason: err.to_string(),
            })?;

        Ok(response.id)
    }

    async fn poll_status(&self, id: &str) -> Result<(QueueStatus, Option<TransactionReceipt>), SignerError> {
        #[derive(Deserialize)]
        struct StatusResponse {
            status: QueueStatus,
            receipt: Option<TransactionReceipt>,
        }

        let response: StatusResponse = self
            .http
            .get(format!("{}/status/{id}", self.url))
            .send()
            .await
            .map_err(|err| SignerError::Backend {
                backend: "queue",
                reason: err.to_string(),
            })?
            .json()
            .await
            .map_err(|err| SignerError::Backend {
                backend: "queue",
                reason: err.to_string(),
            })?;

        Ok((response.status, response.receipt))
    }
}

#[async_trait]
impl Signer for QueueManagerSigner {
    fn address(&self) -> Address {
        self.address
    }

    fn is_auto_send(&self) -> bool {
        true
    }

    async fn sign(&self, tx: TransactionRequest, chain_id: u64) -> Result<SignOutcome, SignerError> {
        let tx = tx.with_chain_id(chain_id).with_from(self.address);
        let id = self.enqueue(&tx).await?;

        let start = tokio::time::Instant::now();
        loop {
            let (status, receipt) = self.poll_status(&id).await?;
            match status {
                QueueStatus::Success => {
                    let receipt = receipt.ok_or_else(|| SignerError::Backend {
                        backend: "queue",
                        reason: "queue reported SUCCESS without a receipt".to_string(),
                    })?;
                    return Ok(SignOutcome::Receipt(Box::new(receipt)));
                }
                QueueStatus::Failed | QueueStatus::Dropped => {
                    return Err(SignerError::Backend {
                        backend: "queue",
                        reason: format!("queue item {id} terminated as {status:?}"),
                    });
                }
                QueueStatus::Pending => {
                    if start.elapsed() >= self.max_wait {
                        return Err(SignerError::Timeout {
                            backend: "queue",
                            elapsed: start.elapsed(),
                        });
                    }
                    sleep(POLL_INTERVAL).await;
                }
            }
        }
    }
}
