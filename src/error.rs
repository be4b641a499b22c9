//! Closed error taxonomies for every fallible boundary in the core.
//!
//! Mirrors the `iroha_data_model::isi::error` /
//! `iroha_core::smartcontracts::isi::Error` pattern: every failure mode is a
//! named enum variant, never a bare string, so callers can match
//! exhaustively and the consensus-relevant "what went wrong" is typed.

use displaydoc::Display;
use thiserror::Error;

use crate::value::Address;

/// Failures from a pure [`crate::world::World`] transition.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum WorldErr {
    /// address `{0:?}` already names an account, asset, or contract
    AddressCollision(Address),
    /// no account at address `{0:?}`
    NoSuchAccount(Address),
    /// no asset at address `{0:?}`
    NoSuchAsset(Address),
    /// no contract at address `{0:?}`
    NoSuchContract(Address),
    /// account `{0:?}` holds no units of this asset
    NoSuchHolder(Address),
    /// transfer would leave holdings negative
    InsufficientHoldings,
    /// transfer amount overflowed total supply bookkeeping
    SupplyOverflow,
}

/// Why a `TxAccount` header was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum InvalidTxAccount {
    /// public key bytes could not be decoded
    InvalidPubKeyByteString,
    /// {0}
    World(#[from] WorldErr),
    /// account `{0:?}` is a current validator and cannot be revoked
    RevokeValidatorError(Address),
}

/// Why a `TxAsset` header was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum InvalidTxAsset {
    /// transaction has no `to` address for the new asset
    MissingAssetAddress,
    /// {0}
    World(#[from] WorldErr),
    /// `TxAsset::Bind` is not supported by this core pending specification
    Unsupported,
}

/// Why a `TxContract` header was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum InvalidTxContract {
    /// {0}
    World(#[from] WorldErr),
    /// contract script failed to parse or initialize
    InvalidScript,
    /// method evaluation failed: {0}
    EvalFail(#[from] EvalFail),
    /// `TxContract::SyncLocal` is not supported by this core pending specification
    Unsupported,
}

/// Header-specific failure, nested under [`InvalidTransaction`].
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum InvalidTxHeader {
    /// {0}
    Account(#[from] InvalidTxAccount),
    /// {0}
    Asset(#[from] InvalidTxAsset),
    /// {0}
    Contract(#[from] InvalidTxContract),
}

/// Field-level failure (signature, encoded key) nested under
/// [`InvalidTransaction`].
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum InvalidTxField {
    /// transaction signature does not verify against the origin's public key
    InvalidTxSignature,
    /// embedded public key bytes could not be decoded
    InvalidPubKey,
}

/// A single transaction's rejection, recorded in the block-level invalid list.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum TxCause {
    /// transaction origin account does not exist
    NoSuchOriginAccount,
    /// {0}
    Header(#[from] InvalidTxHeader),
    /// {0}
    Field(#[from] InvalidTxField),
}

/// A rejected transaction together with the header variant tag it came from,
/// for reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidTransaction {
    pub header: &'static str,
    pub cause: TxCause,
}

/// Block-level verification/validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum InvalidBlock {
    /// block origin account does not exist
    InvalidBlockOrigin,
    /// a block signer account does not exist
    InvalidBlockSigner,
    /// a block signature does not verify
    InvalidBlockSignature,
    /// transaction at index {index} was rejected: {cause}
    InvalidBlockTx { index: usize, cause: TxCause },
}

/// Evaluator failure. Aborts the current method call; no further deltas are
/// emitted for that call.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum EvalFail {
    /// contract graph state is Terminal; no further calls are permitted
    TerminalState,
    /// method's required graph state does not match the contract's current state
    InvalidState,
    /// method called with the wrong number of arguments
    MethodArityError,
    /// side-graph lock is held and this method is not tagged Subgraph
    SubgraphLock,
    /// local variable `{0}` has no value for the current counterparty
    LocalVarNotFound(String),
    /// no method named `{0}` on this contract
    NoSuchMethod(String),
    /// division by zero
    DivideByZero,
    /// arithmetic overflow
    Overflow,
    /// arithmetic underflow
    Underflow,
    /// homomorphic value exceeds the supported bound
    HugeInteger,
    /// string exceeds the supported bound
    HugeString,
    /// homomorphic operation failed
    HomomorphicFail,
    /// referenced account does not exist
    AccountIntegrity,
    /// referenced asset does not exist or the operation violates its invariants
    AssetIntegrity,
    /// referenced contract does not exist or its storage is inconsistent
    ContractIntegrity,
    /// value cannot be hashed
    CannotHash,
    /// unreachable per the typechecker's guarantees
    Impossible,
}
