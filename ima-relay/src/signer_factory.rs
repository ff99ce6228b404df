//! Builds a [`Signer`] trait object from [`SignerConfig`]. The Call
//! Pipeline dispatches on the resulting trait object by capability, not by
//! the config tag itself (`spec.md` §9).

use std::sync::Arc;

use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use anyhow::{Context, Result};
use ima_relay_core::signer::{LocalKeySigner, QueueManagerSigner, RemoteHsmSigner, Signer};

use crate::config::SignerConfig;

pub fn build_signer(config: &SignerConfig) -> Result<Arc<dyn Signer>> {
    match config {
        SignerConfig::Local { private_key } => {
            let key: PrivateKeySigner = private_key.parse().context("invalid local private key")?;
            Ok(Arc::new(LocalKeySigner::from_private_key(&key)))
        }
        SignerConfig::Hsm { url, key_name, address } => {
            let address: Address = address.parse().context("invalid HSM signer address")?;
            Ok(Arc::new(RemoteHsmSigner::new(url.clone(), key_name.clone(), address)))
        }
        SignerConfig::Queue { url, address, priority } => {
            let address: Address = address.parse().context("invalid queue signer address")?;
            Ok(Arc::new(QueueManagerSigner::new(url.clone(), address, *priority)))
        }
    }
}
