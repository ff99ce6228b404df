//! Remote-HSM signer (`spec.md` §4.5): calls an external
//! `ecdsaSignMessageHash(keyName, hash, base)` over a TLS-authenticated RPC
//! and assembles `(v, r, s)` applying the chain-id EIP-155 transformation.
//! Request shape follows the JSON-RPC client pattern used for other external
//! signing/bundling services in this codebase.

use alloy::consensus::{SignableTransaction, TxEip1559};
use alloy::eips::eip2718::Encodable2718;
use alloy::network::TransactionBuilder;
use alloy::primitives::{Address, B256, Signature, U256};
use alloy::rpc::types::TransactionRequest;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SignerError;

use super::{SignOutcome, Signer};

pub struct RemoteHsmSigner {
    http: reqwest::Client,
    url: String,
    key_name: String,
    address: Address,
}

impl RemoteHsmSigner {
    pub fn new(url: impl Into<String>, key_name: impl Into<String>, address: Address) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: url.into(),
            key_name: key_name.into(),
            address,
        }
    }

    async fn ecdsa_sign_message_hash(&self, hash: B256) -> Result<(u64, U256, U256), SignerError> {
        #[derive(Serialize)]
        struct Request<'a> {
            #[serde(rename = "keyName")]
            key_name: &'a str,
            hash: String,
            base: u8,
        }

        #[derive(Deserialize)]
        struct Response {
            #[serde(rename = "signature")]
            signature: RawSignature,
        }

        #[derive(Deserialize)]
        struct RawSignature {
            v: u64,
            r: String,
            s: String,
        }

        let request = Request {
            key_name: &self.key_name,
            hash: format!("{hash:#x}"),
            base: 16,
        };

        let response = self
            .http
            .post(format!("{}/ecdsaSignMessageHash", self.url))
            .json(&request)
            .send()
            .await
            .map_err(|err| SignerError::Backend {
                backend: "remote-hsm",
                reason: err.to_string(),
            })?
            .json::<Response>()
            .await
            .map_err(|err| SignerError::Backend {
                backend: "remote-hsm",
                reason: err.to_string(),
            })?;

        let r = U256::from_str_radix(response.signature.r.trim_start_matches("0x"), 16).map_err(|err| SignerError::Backend {
            backend: "remote-hsm",
            reason: format!("malformed r: {err}"),
        })?;
        let s = U256::from_str_radix(response.signature.s.trim_start_matches("0x"), 16).map_err(|err| SignerError::Backend {
            backend: "remote-hsm",
            reason: format!("malformed s: {err}"),
        })?;

        Ok((response.signature.v, r, s))
    }
}

#[async_trait]
impl Signer for RemoteHsmSigner {
    fn address(&self) -> Address {
        self.address
    }

    fn is_auto_send(&self) -> bool {
        false
    }

    async fn sign(&self, tx: TransactionRequest, chain_id: u64) -> Result<SignOutcome, SignerError> {
        let tx = tx.with_chain_id(chain_id).with_from(self.address);
        let unsigned: TxEip1559 = tx.build_typed_tx().map_err(|_| SignerError::Backend {
            backend: "remote-hsm",
            reason: "transaction request is missing required fields for EIP-1559".to_string(),
        })?.eip1559().cloned().ok_or_else(|| SignerError::Backend {
            backend: "remote-hsm",
            reason: "only EIP-1559 transactions are supported by the remote HSM path".to_string(),
        })?;

        let sighash = unsigned.signature_hash();
        let (v, r, s) = self.ecdsa_sign_message_hash(sighash).await?;
        // EIP-155/EIP-2930+ parity is a plain boolean rather than the legacy
        // `{27,28}` recovery id; the HSM is expected to already return it in
        // that form.
        let signature = Signature::new(r, s, v != 0);

        let envelope = unsigned.into_signed(signature);
        Ok(SignOutcome::SignedRawTx(envelope.encoded_2718()))
    }
}
