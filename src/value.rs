//! Tagged runtime values, addresses, and contract graph state.
//!
//! Modeled after `iroha_data_model::Value`'s tagged union and
//! `iroha_primitives::fixed::Fixed`: a single closed enum that every
//! expression form and primitive produces, with exhaustive match replacing
//! duck-typed dispatch.

use std::fmt;

use derive_more::{Deref, From};
use serde::{Deserialize, Serialize};

use crate::evaluator::homomorphic::Ciphertext;

/// Opaque byte identity for accounts, assets, and contracts.
///
/// Equality and ordering are byte-lexicographic because they derive
/// directly from `Vec<u8>`'s own `Ord` impl.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Deref, From, Serialize, Deserialize)]
pub struct Address(pub Vec<u8>);

impl Address {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.0))
    }
}

/// Fixed-point scale, 1..=6 decimal places, stored as a scaled `i64`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Precision(u8);

impl Precision {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 6;

    /// Fails (returns `None`) for any value outside `1..=6`, per the
    /// `Prec` range in the data model.
    pub fn new(scale: u8) -> Option<Self> {
        (Self::MIN..=Self::MAX).contains(&scale).then_some(Self(scale))
    }

    pub fn get(self) -> u8 {
        self.0
    }

    fn pow10(self) -> i64 {
        10_i64.pow(u32::from(self.0))
    }
}

/// A contract's position in its control-flow automaton.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GraphState {
    Initial,
    Terminal,
    Label(String),
}

impl GraphState {
    /// Parses the textual tag a method's `Main` precondition is written
    /// against: `"initial" <-> Initial`, `"terminal" <-> Terminal`, anything
    /// else is `Label(x)`.
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "initial" => GraphState::Initial,
            "terminal" => GraphState::Terminal,
            other => GraphState::Label(other.to_owned()),
        }
    }
}

impl fmt::Display for GraphState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphState::Initial => write!(f, "initial"),
            GraphState::Terminal => write!(f, "terminal"),
            GraphState::Label(name) => write!(f, "{name}"),
        }
    }
}

/// A raw Ed25519 signature, kept as an `(r, s)` scalar pair for naming
/// parity with signature schemes that split into two components, even
/// though Ed25519 itself is a single 64-byte value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Sig {
    pub r: [u8; 32],
    pub s: [u8; 32],
}

impl Sig {
    pub fn to_bytes(&self) -> [u8; 64] {
        let mut out = [0_u8; 64];
        out[..32].copy_from_slice(&self.r);
        out[32..].copy_from_slice(&self.s);
        out
    }

    pub fn from_bytes(bytes: [u8; 64]) -> Self {
        let mut r = [0_u8; 32];
        let mut s = [0_u8; 32];
        r.copy_from_slice(&bytes[..32]);
        s.copy_from_slice(&bytes[32..]);
        Self { r, s }
    }
}

/// Microseconds since the POSIX epoch. All `DateTime` values in this core
/// derive from `EvalCtx::current_timestamp`, never the wall clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DateTime(pub i64);

/// Signed microsecond duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimeDelta(pub i64);

/// The tagged runtime value. Every expression form and primitive in the
/// evaluator ultimately produces one of these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Int(i64),
    Float(f64),
    Fixed(Precision, i64),
    Bool(bool),
    Msg(Vec<u8>),
    Account(Address),
    Asset(Address),
    Contract(Address),
    Address(Address),
    Sig(Sig),
    DateTime(DateTime),
    TimeDelta(TimeDelta),
    State(GraphState),
    Crypto(Ciphertext),
    Void,
    Undefined,
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "Int",
            Value::Float(_) => "Float",
            Value::Fixed(..) => "Fixed",
            Value::Bool(_) => "Bool",
            Value::Msg(_) => "Msg",
            Value::Account(_) => "Account",
            Value::Asset(_) => "Asset",
            Value::Contract(_) => "Contract",
            Value::Address(_) => "Address",
            Value::Sig(_) => "Sig",
            Value::DateTime(_) => "DateTime",
            Value::TimeDelta(_) => "TimeDelta",
            Value::State(_) => "State",
            Value::Crypto(_) => "Crypto",
            Value::Void => "Void",
            Value::Undefined => "Undefined",
        }
    }
}

/// Rounds `value` to the nearest representable value at `scale` decimal
/// places, ties-to-even, without relying on any single toolchain's float
/// rounding intrinsics, which would otherwise be a determinism hazard.
pub fn float_to_fixed(value: f64, scale: Precision) -> Option<(Precision, i64)> {
    if !value.is_finite() {
        return None;
    }
    let factor = scale.pow10() as f64;
    let scaled = value * factor;
    let floor = scaled.floor();
    let diff = scaled - floor;
    let rounded = if diff > 0.5 {
        floor + 1.0
    } else if diff < 0.5 {
        floor
    } else {
        // Tie: round to even.
        if (floor as i64) % 2 == 0 {
            floor
        } else {
            floor + 1.0
        }
    };
    if rounded > i64::MAX as f64 || rounded < i64::MIN as f64 {
        return None;
    }
    Some((scale, rounded as i64))
}

pub fn fixed_to_float(scale: Precision, scaled: i64) -> f64 {
    scaled as f64 / scale.pow10() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precision_range() {
        assert!(Precision::new(0).is_none());
        assert!(Precision::new(7).is_none());
        assert!(Precision::new(1).is_some());
        assert!(Precision::new(6).is_some());
    }

    #[test]
    fn fixed_round_trip() {
        let p = Precision::new(2).unwrap();
        let (p2, scaled) = float_to_fixed(12.345, p).unwrap();
        // 12.345 at scale 2 rounds to 12.34 (tie broken toward even cent 34, since
        // 12.345 * 100 = 1234.5 exactly, 1234 is even).
        assert_eq!(p2.get(), 2);
        assert_eq!(scaled, 1234);
        assert_eq!(fixed_to_float(p, scaled), 12.34);
    }

    #[test]
    fn fixed_round_half_up_to_even_next() {
        let p = Precision::new(0).unwrap_or(Precision::new(1).unwrap());
        let (_, scaled) = float_to_fixed(2.5, p).unwrap();
        // 2.5 at scale 1 => 25.0 exactly, no rounding needed.
        assert_eq!(scaled, 25);
    }

    #[test]
    fn address_ordering_is_byte_lexicographic() {
        let a = Address::new(vec![1, 2, 3]);
        let b = Address::new(vec![1, 2, 4]);
        assert!(a < b);
    }
}
