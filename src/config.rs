//! Compiled-in configuration constants.
//!
//! `iroha_core::wsv::config::Configuration` threads a runtime `Configuration`
//! struct through its `WorldStateView`; this core has no deployment-time
//! configuration surface to speak of, so the equivalent knobs are plain
//! constants, grouped here the same way.

/// Grace period after a side-graph lock's nominal timeout during which
/// `checkSideGraph` still treats the lock as held, absorbing clock skew
/// between the node that set the lock and the node now evaluating a call
/// against it. Zero: this core trusts `EvalCtx::current_timestamp` (block
/// time) rather than wall-clock time, so no skew exists to absorb.
pub const SIDE_GRAPH_SWEEP_GRACE_MICROS: i64 = 0;

/// Upper bound on a method's declared argument count, rejected upstream by
/// the typechecker in practice but enforced here too since arity is
/// consensus-relevant.
pub const MAX_METHOD_ARITY: usize = 32;

/// Upper bound on a storage key's byte length.
pub const MAX_STORAGE_KEY_LEN: usize = 256;
