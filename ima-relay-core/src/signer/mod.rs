//! Signer capability (`spec.md` §4.5): polymorphic over `{LocalKey,
//! RemoteHSM, QueueManager}`. The Call Pipeline dispatches by capability,
//! whether the backend reports [`Signer::is_auto_send`], not by a string
//! type tag, per the design note in `spec.md` §9.

pub mod local_key;
pub mod queue_manager;
pub mod remote_hsm;

use alloy::primitives::Address;
use alloy::rpc::types::{TransactionReceipt, TransactionRequest};
use async_trait::async_trait;

pub use local_key::LocalKeySigner;
pub use queue_manager::QueueManagerSigner;
pub use remote_hsm::RemoteHsmSigner;

use crate::error::SignerError;

/// What signing produced: either a raw signed transaction the caller must
/// submit itself, or, for backends that also submit, a terminal receipt.
pub enum SignOutcome {
    SignedRawTx(Vec<u8>),
    Receipt(Box<TransactionReceipt>),
}

#[async_trait]
pub trait Signer: Send + Sync {
    /// The address transactions are signed/submitted from; used as the
    /// `from` address in the Call Pipeline's dry-run.
    fn address(&self) -> Address;

    /// `true` only for [`QueueManagerSigner`] (`spec.md` §4.5): the backend
    /// submits on the caller's behalf and returns a receipt directly.
    fn is_auto_send(&self) -> bool;

    async fn sign(&self, tx: TransactionRequest, chain_id: u64) -> Result<SignOutcome, SignerError>;
}
