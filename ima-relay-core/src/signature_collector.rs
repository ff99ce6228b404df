//! Signature Collector (`spec.md` §4.6): obtains a threshold-BLS aggregate
//! over a batch from the origin chain's validator quorum. Implementation of
//! the quorum protocol itself is out of scope, the core only requires the
//! contract below and a stub for tests.

use alloy::primitives::B256;
use async_trait::async_trait;
use tracing::warn;

use crate::chain::{Message, Signature, hash_messages};
use crate::error::SignerError;

#[derive(Clone, Copy, Debug, Default)]
pub struct SignatureExtraOpts {
    pub is_s2s: bool,
}

#[async_trait]
pub trait SignatureCollector: Send + Sync {
    async fn sign(
        &self,
        messages: &[Message],
        start_counter: u64,
        source_chain: &str,
        extra_opts: SignatureExtraOpts,
    ) -> Result<Signature, SignerError>;
}

/// Delegates to an external validator-quorum service over HTTP, following
/// the same request/poll JSON-RPC shape used for the other external signing
/// backends in this codebase.
pub struct RemoteSignatureCollector {
    http: reqwest::Client,
    url: String,
}

impl RemoteSignatureCollector {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl SignatureCollector for RemoteSignatureCollector {
    async fn sign(
        &self,
        messages: &[Message],
        start_counter: u64,
        source_chain: &str,
        extra_opts: SignatureExtraOpts,
    ) -> Result<Signature, SignerError> {
        #[derive(serde::Serialize)]
        struct Request<'a> {
            #[serde(rename = "startCounter")]
            start_counter: u64,
            #[serde(rename = "sourceChain")]
            source_chain: &'a str,
            hash: String,
            #[serde(rename = "isS2S")]
            is_s2s: bool,
        }

        let hash: B256 = hash_messages(messages);

        let response = self
            .http
            .post(format!("{}/sign", self.url))
            .json(&Request {
                start_counter,
                source_chain,
                hash: format!("{hash:#x}"),
                is_s2s: extra_opts.is_s2s,
            })
            .send()
            .await
            .map_err(|err| SignerError::Backend {
                backend: "signature-collector",
                reason: err.to_string(),
            })?;

        response
            .json::<Signature>()
            .await
            .map_err(|err| SignerError::Backend {
                backend: "signature-collector",
                reason: err.to_string(),
            })
    }
}

/// Test double: returns the all-zero signature and logs a warning, per
/// `spec.md` §4.6.
#[derive(Default)]
pub struct StubSignatureCollector;

#[async_trait]
impl SignatureCollector for StubSignatureCollector {
    async fn sign(
        &self,
        _messages: &[Message],
        _start_counter: u64,
        source_chain: &str,
        _extra_opts: SignatureExtraOpts,
    ) -> Result<Signature, SignerError> {
        warn!(source_chain, "using stub signature collector, signature is all-zero");
        Ok(Signature::zero())
    }
}
