//! Local-key signer (`spec.md` §4.5): signs a transaction envelope with a
//! provided private key; the caller (Call Pipeline) submits it.

use alloy::eips::eip2718::Encodable2718;
use alloy::network::{EthereumWallet, TransactionBuilder};
use alloy::primitives::Address;
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;
use async_trait::async_trait;

use crate::error::SignerError;

use super::{SignOutcome, Signer};

pub struct LocalKeySigner {
    wallet: EthereumWallet,
    address: Address,
}

impl LocalKeySigner {
    pub fn from_private_key(private_key: &PrivateKeySigner) -> Self {
        Self {
            address: private_key.address(),
            wallet: EthereumWallet::from(private_key.clone()),
        }
    }
}

#[async_trait]
impl Signer for LocalKeySigner {
    fn address(&self) -> Address {
        self.address
    }

    fn is_auto_send(&self) -> bool {
        false
    }

    async fn sign(&self, tx: TransactionRequest, chain_id: u64) -> Result<SignOutcome, SignerError> {
        let tx = tx.with_chain_id(chain_id).with_from(self.address);
        let envelope = tx
            .build(&self.wallet)
            .await
            .map_err(|err| SignerError::Backend {
                backend: "local",
                reason: err.to_string(),
            })?;
        Ok(SignOutcome::SignedRawTx(envelope.encoded_2718()))
    }
}
