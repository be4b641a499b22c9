//! The FCL abstract syntax a real parser/typechecker would hand the
//! evaluator.
//!
//! The script parser and typechecker are external collaborators: this
//! module only defines the plain data types a well-formed, already-
//! typechecked script is made of. The evaluator assumes arity and type
//! compatibility have already been checked upstream; method arity is the
//! one runtime check this core still performs itself, since it is part of
//! the consensus-relevant call contract, not just static typing.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::value::{Precision, Value};

/// Binary operators. Numeric, boolean, ordering, and homomorphic dispatch
/// all route through this single closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Neq,
    Lt,
    Gt,
    Le,
    Ge,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnOp {
    Not,
}

/// Every built-in primitive callable from `Call`. Argument `Expr`s are
/// supplied positionally by `Expr::Call`; primitives that need a
/// compile-time constant (such as a fixed-point precision) carry it
/// directly rather than as an evaluated argument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Prim {
    Terminate,
    Transition(String),
    CurrentState,
    NovationInit,
    NovationStop,
    TransferTo,
    TransferFrom,
    TransferHoldings,
    Now,
    Block,
    Deployer,
    Sender,
    Created,
    Address,
    Validator,
    Sign,
    Verify,
    Sha256,
    TxHash,
    AccountExists,
    AssetExists,
    ContractExists,
    ContractValue,
    ContractValueExists,
    ContractState,
    IsBusinessDayUk,
    NextBusinessDayUk,
    IsBusinessDayNyse,
    NextBusinessDayNyse,
    Between,
    FixedToFloat(Precision),
    FloatToFixed(Precision),
}

/// An FCL expression node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Seq(Box<Expr>, Box<Expr>),
    Ret(Box<Expr>),
    NoOp,
    Lit(Value),
    Var(String),
    Assign(String, Box<Expr>),
    UnOp(UnOp, Box<Expr>),
    BinOp(BinOp, Box<Expr>, Box<Expr>),
    Call(Prim, Vec<Expr>),
    If(Box<Expr>, Box<Expr>, Box<Expr>),
    Before(Box<Expr>, Box<Expr>),
    After(Box<Expr>, Box<Expr>),
    Between(Box<Expr>, Box<Expr>, Box<Expr>),
}

/// Whether a method participates in the main control-flow graph or the
/// (optional) side graph entered via `NovationInit`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MethodTag {
    /// The method's required main-graph label, e.g. `"initial"`,
    /// `"terminal"`, or a named label.
    Main(String),
    Subgraph,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Method {
    pub name: String,
    pub args: Vec<String>,
    pub tag: MethodTag,
    pub body: Expr,
}

/// A fully parsed and typechecked contract script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Script {
    /// Names declared as persistent global storage variables.
    pub globals: BTreeSet<String>,
    /// Names declared as per-counterparty local storage variables.
    pub locals: BTreeSet<String>,
    pub methods: std::collections::BTreeMap<String, Method>,
}

impl Script {
    pub fn is_global(&self, name: &str) -> bool {
        self.globals.contains(name)
    }

    pub fn is_local(&self, name: &str) -> bool {
        self.locals.contains(name)
    }
}
