//! Storage scopes and canonical value hashing.
//!
//! Three scopes per method evaluation: `global` (persisted on the
//! contract), `local` (per-counterparty, persisted, only populated for
//! observed counterparties), and `temp` (method-scoped scratch, discarded
//! when the method returns). Modeled as plain `BTreeMap<String, Value>`
//! rather than a concurrent map, since a single evaluation is
//! single-threaded and deterministic iteration order is
//! required wherever storage is enumerated.

use std::collections::BTreeMap;

use sha2::{Digest, Sha256};

use crate::error::EvalFail;
use crate::value::Value;

/// A storage key, addressed as UTF-8 bytes.
pub type Key = String;

/// One of the three scopes a method evaluation reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Global,
    Local,
    Temp,
}

/// A flat key-value store, used for each of `globalStorage`,
/// `localStorage[addr]`, and `tempStorage`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Storage(BTreeMap<Key, Value>);

impl Storage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn put(&mut self, name: impl Into<Key>, value: Value) {
        self.0.insert(name.into(), value);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Key, &Value)> {
        self.0.iter()
    }
}

/// Hashes a [`Value`] per its canonical encoding (SPEC_FULL.md §3).
/// `Sig` and `Undefined` are rejected as unhashable.
pub fn hash_value(value: &Value) -> Result<[u8; 32], EvalFail> {
    let bytes = canonical_bytes(value)?;
    Ok(Sha256::digest(bytes).into())
}

fn canonical_bytes(value: &Value) -> Result<Vec<u8>, EvalFail> {
    Ok(match value {
        Value::Int(i) => i.to_be_bytes().to_vec(),
        Value::Float(f) => f.to_bits().to_be_bytes().to_vec(),
        Value::Fixed(prec, scaled) => {
            let mut out = vec![prec.get()];
            out.extend_from_slice(&scaled.to_be_bytes());
            out
        }
        Value::Bool(b) => vec![u8::from(*b)],
        Value::Msg(bytes) => bytes.clone(),
        Value::Account(addr) | Value::Asset(addr) | Value::Contract(addr) | Value::Address(addr) => {
            addr.as_bytes().to_vec()
        }
        Value::DateTime(dt) => dt.0.to_be_bytes().to_vec(),
        Value::TimeDelta(td) => td.0.to_be_bytes().to_vec(),
        Value::State(state) => {
            let mut out = Vec::new();
            match state {
                crate::value::GraphState::Initial => out.push(0),
                crate::value::GraphState::Terminal => out.push(1),
                crate::value::GraphState::Label(name) => {
                    out.push(2);
                    out.extend_from_slice(name.as_bytes());
                }
            }
            out
        }
        Value::Void => Vec::new(),
        Value::Sig(_) | Value::Undefined => return Err(EvalFail::CannotHash),
        Value::Crypto(ct) => ct.to_string().into_bytes(),
    })
}
