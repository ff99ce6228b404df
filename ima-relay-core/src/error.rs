//! Error kinds for the transfer engine, tiered the way `spec.md` §7 describes
//! them: transient RPC failures are absorbed by the retry wrapper and only
//! surface here once exhausted; security/signing/contract errors abort the
//! current pass and are recorded in the [`crate::error_registry::ErrorRegistry`].

use thiserror::Error;

/// Transient failures from the RPC layer (§4.1). Only seen after the
/// retrying wrapper has exhausted its attempts.
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("endpoint {endpoint} is offline (health probe failed)")]
    EndpointOffline { endpoint: String },

    #[error("operation {operation} against {endpoint} failed after {attempts} attempts: {source}")]
    Exhausted {
        operation: String,
        endpoint: String,
        attempts: u32,
        #[source]
        source: anyhow::Error,
    },
}

/// Security checks enforced while forming a batch (§4.7, §4.8).
#[derive(Debug, Error)]
pub enum SecurityError {
    #[error("message at block {message_block} has depth {depth} < required {required}")]
    BlockDepth {
        message_block: u64,
        depth: u64,
        required: u64,
    },

    #[error("message at block {message_block} has age {age_secs}s < required {required_secs}s")]
    BlockAge {
        message_block: u64,
        age_secs: u64,
        required_secs: u64,
    },

    #[error("S->S quorum not reached: {pass} pass / {fail} fail out of {total} nodes, quorum={quorum}")]
    S2SQuorum {
        pass: usize,
        fail: usize,
        total: usize,
        quorum: usize,
    },
}

/// Signing-backend failures (§4.5).
#[derive(Debug, Error)]
pub enum SignerError {
    #[error("signer backend {backend} failed: {reason}")]
    Backend { backend: &'static str, reason: String },

    #[error("signer backend {backend} timed out after {0:?}", .elapsed)]
    Timeout {
        backend: &'static str,
        elapsed: std::time::Duration,
    },
}

/// Contract-call outcomes (§4.4, §4.9 step 9).
#[derive(Debug, Error)]
pub enum ContractError {
    #[error("dry-run reverted: {reason}")]
    DryRun { reason: String },

    #[error("contract call reverted on-chain: {reason}")]
    Call { reason: String },

    #[error("destination emitted PostMessageError(counter={counter}): {reason}")]
    PostMessage { counter: u64, reason: String },
}

/// Top-level error for a single transfer-loop pass. Every variant here is
/// recoverable at the next pass; only [`FatalError`] terminates the process.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error(transparent)]
    Rpc(#[from] RpcError),
    #[error(transparent)]
    Security(#[from] SecurityError),
    #[error(transparent)]
    Signer(#[from] SignerError),
    #[error(transparent)]
    Contract(#[from] ContractError),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Startup-only misconfiguration. These are the only errors allowed to
/// terminate the process (§6 Exit codes).
#[derive(Debug, Error)]
pub enum FatalError {
    #[error("missing endpoint configuration: {0}")]
    MissingEndpoint(String),
    #[error("unreadable signing key at {path}: {source}")]
    UnreadableKey {
        path: String,
        #[source]
        source: anyhow::Error,
    },
}
