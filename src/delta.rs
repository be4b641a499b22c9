//! The append-only delta log: a structured record of every observable
//! mutation an `Evaluator` call produces.
//!
//! Emission order is significant and forms part of the observable output;
//! deltas are only ever pushed, never reordered or removed.

use serde::{Deserialize, Serialize};

use crate::value::{Address, GraphState, Value};

/// How a local-storage write should be replayed by a counterparty who only
/// observes its own private storage, per the local-delta submachine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LocalOp {
    /// Replace the local variable's value with another local variable's
    /// current value.
    ReplaceWith(String),
    /// Apply a binary operator against the given operand value.
    Op(BinOpTag, Value),
}

/// Tag identifying which binary operator a `LocalOp::Op` delta replays.
/// Kept separate from the evaluator's internal `BinOp` so the delta log's
/// wire shape doesn't change if the expression AST grows new operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinOpTag {
    Add,
    Sub,
    Mul,
    Div,
}

/// How an asset transfer moved units, for [`Delta::ModifyAsset`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AssetMove {
    /// `currentTxIssuer` -> `currentAddress`.
    TransferTo { asset: Address, amount: i64 },
    /// `currentAddress` -> `to`.
    TransferFrom { asset: Address, amount: i64, to: Address },
    /// `from` -> `to`, neither of which need be `currentAddress`.
    TransferHoldings {
        asset: Address,
        amount: i64,
        from: Address,
        to: Address,
    },
}

/// A single observable mutation emitted by the evaluator during one method
/// call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Delta {
    ModifyGlobal(String, Value),
    ModifyLocal(String, LocalOp),
    ModifyAsset(AssetMove),
    ModifyState(GraphState),
    Terminate(Vec<u8>),
}

/// The deltas produced by one method invocation, in emission order.
pub type DeltaLog = Vec<Delta>;
