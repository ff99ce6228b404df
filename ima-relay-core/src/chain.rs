//! Data model shared across the transfer engine (`spec.md` §3) and the
//! message-proxy ABI it consumes (`spec.md` §6).

use alloy::primitives::{Address, B256, Bytes, U256, keccak256};
use alloy::sol;
use serde::{Deserialize, Serialize};

sol! {
    #[derive(Debug)]
    event OutgoingMessage(
        bytes32 indexed dstChainHash,
        uint256 indexed msgCounter,
        address indexed srcContract,
        address dstContract,
        bytes data
    );

    #[derive(Debug)]
    event PreviousMessageReference(uint256 currentMessage, uint256 previousOutgoingMessageBlockId);

    #[derive(Debug)]
    event PostMessageError(uint256 msgCounter, bytes reason);

    #[derive(Debug)]
    struct SolMessage {
        address sender;
        address destinationContract;
        bytes data;
    }

    #[derive(Debug)]
    struct SolSignature {
        uint256[2] blsSignature;
        uint256 hashA;
        uint256 hashB;
        string counter;
    }

    #[sol(rpc)]
    interface IMessageProxy {
        function getOutgoingMessagesCounter(string calldata dstName) external view returns (uint256);
        function getIncomingMessagesCounter(string calldata srcName) external view returns (uint256);
        function getLastOutgoingMessageBlockId(string calldata dstName) external view returns (uint256);
        function postIncomingMessages(
            string calldata srcName,
            uint256 startingCounter,
            SolMessage[] calldata messages,
            SolSignature calldata sig
        ) external;
    }
}

/// Identity of a single chain endpoint (`spec.md` §3 `ChainEndpoint`).
///
/// Immutable for the duration of a run; `node_roster` is populated only for
/// S-chains used as the source of an S->S transfer (`spec.md` §4.8).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChainEndpoint {
    pub name: String,
    pub chain_id: u64,
    pub rpc_url: String,
    #[serde(default)]
    pub node_roster: Vec<NodeEndpoint>,
}

/// One validator/node of an S-chain's roster, used only by the S->S verifier.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeEndpoint {
    pub name: String,
    pub rpc_url: String,
}

/// A single cross-chain message (`spec.md` §3 `Message`).
///
/// Identity within a (source, destination) pair is `msg_counter`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub msg_counter: u64,
    pub sender: Address,
    pub destination_contract: Address,
    pub data: Bytes,
    pub saved_block_number: u64,
}

impl Message {
    /// `keccak(concat(bytes20(sender), bytes20(destinationContract), data))`,
    /// the wire encoding both the destination proxy and the signer agree
    /// on (`spec.md` §6).
    pub fn encode_for_hash(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(20 + 20 + self.data.len());
        buf.extend_from_slice(self.sender.as_slice());
        buf.extend_from_slice(self.destination_contract.as_slice());
        buf.extend_from_slice(&self.data);
        buf
    }

    pub fn into_sol(self) -> SolMessage {
        SolMessage {
            sender: self.sender,
            destinationContract: self.destination_contract,
            data: self.data,
        }
    }
}

/// Hash of a sequence of messages as the destination proxy computes it:
/// `keccak` over the concatenation of each message's own encoding.
pub fn hash_messages(messages: &[Message]) -> B256 {
    let mut buf = Vec::new();
    for message in messages {
        buf.extend_from_slice(&message.encode_for_hash());
    }
    keccak256(buf)
}

/// Produced by the walk-back optimization (`spec.md` §4.2 strategy 3).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReferenceLogRecord {
    pub current_message: u64,
    pub previous_outgoing_message_block_id: u64,
    pub current_block_id: u64,
}

/// Threshold-BLS aggregate signature over a batch, wire-encoded as described
/// in `spec.md` §6.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub bls_signature: [U256; 2],
    pub hash_a: U256,
    pub hash_b: U256,
    pub counter: String,
}

impl Signature {
    /// The stub signature used only when `SignatureCollector` is a test
    /// double (`spec.md` §3: `{0,0,0,0,"0"}`).
    pub fn zero() -> Self {
        Self {
            bls_signature: [U256::ZERO, U256::ZERO],
            hash_a: U256::ZERO,
            hash_b: U256::ZERO,
            counter: "0".to_string(),
        }
    }

    pub fn into_sol(self) -> SolSignature {
        SolSignature {
            blsSignature: self.bls_signature,
            hashA: self.hash_a,
            hashB: self.hash_b,
            counter: self.counter,
        }
    }
}

/// A contiguous, signed slice of messages ready for submission
/// (`spec.md` §3 `OutgoingBatch`).
///
/// Only constructible with at least one message and a `start_counter` that
/// matches the destination's incoming counter at formation time; the
/// invariant is re-checked by the destination proxy itself via dry-run.
#[derive(Clone, Debug)]
pub struct OutgoingBatch {
    pub source_chain: String,
    pub dest_chain: String,
    pub start_counter: u64,
    pub messages: Vec<Message>,
    pub signature: Signature,
}

impl OutgoingBatch {
    pub fn end_counter(&self) -> u64 {
        self.start_counter + self.messages.len() as u64
    }
}
