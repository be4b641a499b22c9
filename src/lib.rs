//! Block-and-transaction validation core for a permissioned ledger with a
//! small embedded contract language (FCL).
//!
//! This crate covers world state (`Account`/`Asset`/`Contract` and the pure
//! `World` transitions over them), FCL method evaluation (`Evaluator`), and
//! the two layers of consensus processing built on top of it:
//! `tx_applier` (one transaction against one world) and `block_validator`
//! (a block's signatures, then its transactions in order). Networking,
//! consensus ordering, and block storage are external collaborators this
//! crate does not implement, matching `iroha_core`'s own boundary around
//! `smartcontracts`/`wsv` versus `sumeragi`/`kura`/`torii`.

pub mod config;
pub mod crypto;
pub mod delta;
pub mod error;
pub mod evaluator;
pub mod script;
pub mod storage;
pub mod transaction;
pub mod tx_applier;
pub mod block_validator;
pub mod value;
pub mod world;
