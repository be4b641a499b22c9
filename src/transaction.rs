//! Transaction and block wire types.
//!
//! Modeled on the `VersionedSignedTransaction` / `VersionedBlock` split in
//! `iroha_data_model::transaction` and `iroha_data_model::block`, flattened
//! here into one unsigned `header` plus an origin signature, since this
//! core has no wrapping version envelope to maintain.

use serde::{Deserialize, Serialize};

use crate::crypto::PublicKey;
use crate::script::Script;
use crate::value::{Address, Sig};
use crate::world::AssetType;

/// `TxAccount` operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TxAccount {
    CreateAccount {
        address: Address,
        public_key_bytes: Vec<u8>,
        timezone: String,
    },
    RevokeAccount {
        address: Address,
    },
}

/// `TxAsset` operations. `Bind` is parsed but always rejected
/// (`InvalidTxAsset::Unsupported`) per the Open Question resolution
/// recorded in DESIGN.md.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TxAsset {
    CreateAsset {
        to: Address,
        address: Address,
        name: String,
        issuer: Address,
        initial_supply: i64,
        reference: Option<String>,
        asset_type: AssetType,
    },
    Transfer {
        asset: Address,
        from: Address,
        to: Address,
        amount: i64,
    },
    Bind {
        asset: Address,
        contract: Address,
    },
}

/// `TxContract` operations. `SyncLocal` is parsed but always rejected
/// (`InvalidTxContract::Unsupported`), same resolution as `TxAsset::Bind`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TxContract {
    CreateContract {
        address: Address,
        owner: Address,
        script: Script,
    },
    Call {
        contract: Address,
        method: String,
        args: Vec<crate::value::Value>,
    },
    SyncLocal {
        contract: Address,
        counterparty: Address,
    },
}

/// The operation a transaction carries. Exactly one of the three families.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TxHeader {
    Account(TxAccount),
    Asset(TxAsset),
    Contract(TxContract),
}

impl TxHeader {
    /// Tag used in `InvalidTransaction::header` for reporting.
    pub fn tag(&self) -> &'static str {
        match self {
            TxHeader::Account(_) => "TxAccount",
            TxHeader::Asset(_) => "TxAsset",
            TxHeader::Contract(_) => "TxContract",
        }
    }
}

/// A single signed transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub header: TxHeader,
    pub origin: Address,
    pub signature: Sig,
    pub timestamp: i64,
}

impl Transaction {
    /// The message a transaction's signature is computed over: the header
    /// plus origin plus timestamp, canonically encoded via the same
    /// `serde_json` representation used for hashing elsewhere in this core.
    /// JSON is deterministic here because field order is fixed by the
    /// derived `Serialize` impl and no floats appear in any header variant's
    /// addresses or names.
    pub fn signing_bytes(&self) -> Vec<u8> {
        #[derive(Serialize)]
        struct Signed<'a> {
            header: &'a TxHeader,
            origin: &'a Address,
            timestamp: i64,
        }
        serde_json::to_vec(&Signed { header: &self.header, origin: &self.origin, timestamp: self.timestamp })
            .expect("Transaction fields always serialize")
    }
}

/// Block header: index, origin (the proposing validator's account), a
/// timestamp, and the previous block's hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub index: u64,
    pub origin: Address,
    pub timestamp: i64,
    pub prev_hash: [u8; 32],
}

/// A block: a header, its ordered transactions, and the set of validator
/// signatures collected over the header+transactions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<Transaction>,
    pub signatures: Vec<(Sig, Address)>,
}

impl Block {
    /// The message every block signature is computed over.
    pub fn signing_bytes(&self) -> Vec<u8> {
        #[derive(Serialize)]
        struct Signed<'a> {
            header: &'a BlockHeader,
            transactions: &'a [Transaction],
        }
        serde_json::to_vec(&Signed { header: &self.header, transactions: &self.transactions })
            .expect("Block fields always serialize")
    }
}

/// Used only where a transaction or block constructor wants to pair a
/// decoded public key with the raw bytes it was parsed from, e.g. when
/// validating `CreateAccount`.
pub fn decode_account_public_key(bytes: &[u8]) -> Option<PublicKey> {
    crate::crypto::try_decode_pub(bytes)
}
