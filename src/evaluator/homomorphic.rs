//! Additive-homomorphic ciphertext values (`VCrypto`).
//!
//! A per-invocation key would be cryptographically meaningless for this
//! purpose, since additions across calls need to stay under the same key —
//! so this implementation threads a [`HomomorphicKey`] derived once from the
//! owning contract's address and carries a bounded ciphertext (`Ciphertext`),
//! in the same style as an additive ElGamal wrapper type.

use std::fmt;

use num_bigint::BigUint;
use num_integer::Integer;
use num_traits::{One, Zero};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::EvalFail;
use crate::value::Address;

/// Ciphertexts wider than this are rejected as `HugeInteger`: the bound a
/// `SafeInteger` must respect to stay within this core's serialization
/// limits.
pub const MAX_CIPHERTEXT_BITS: u64 = 2048;

/// A bounded big integer used to carry ciphertexts without exceeding
/// [`MAX_CIPHERTEXT_BITS`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ciphertext(#[serde(with = "biguint_serde")] BigUint);

impl Ciphertext {
    fn check_bound(value: BigUint) -> Result<Self, EvalFail> {
        if value.bits() > MAX_CIPHERTEXT_BITS {
            return Err(EvalFail::HugeInteger);
        }
        Ok(Self(value))
    }

    pub fn from_u64(value: u64) -> Self {
        Self(BigUint::from(value))
    }
}

impl fmt::Display for Ciphertext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

mod biguint_serde {
    use num_bigint::BigUint;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(value: &BigUint, s: S) -> Result<S::Ok, S::Error> {
        value.to_bytes_be().serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<BigUint, D::Error> {
        let bytes = Vec::<u8>::deserialize(d)?;
        Ok(BigUint::from_bytes_be(&bytes))
    }
}

/// A stable, contract-owned key parameterizing homomorphic arithmetic.
/// Derived deterministically from the owning contract's address at
/// `CreateContract` time and stored on the `Contract` entity, per the
/// Open Question resolution in SPEC_FULL.md §4.4.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HomomorphicKey {
    modulus: Ciphertext,
}

impl HomomorphicKey {
    /// Expands the contract address into a large odd modulus via repeated
    /// SHA-256, giving every contract a distinct, deterministic key without
    /// requiring a primality search (out of scope: this core models
    /// homomorphic *arithmetic*, not a full Paillier key-generation
    /// ceremony, which belongs to the external key-operations boundary).
    pub fn derive(contract: &Address) -> Self {
        let mut bytes = Vec::with_capacity(64);
        let mut block = Sha256::digest(contract.as_bytes()).to_vec();
        bytes.extend_from_slice(&block);
        block = Sha256::digest(&block).to_vec();
        bytes.extend_from_slice(&block);
        // Force odd + top bit set so the modulus is consistently "large".
        bytes[0] |= 0x80;
        let last = bytes.len() - 1;
        bytes[last] |= 0x01;
        Self {
            modulus: Ciphertext(BigUint::from_bytes_be(&bytes)),
        }
    }

    fn n(&self) -> &BigUint {
        &self.modulus.0
    }

    /// `cipherAdd`: homomorphic addition of two ciphertexts under this key.
    pub fn add(&self, a: &Ciphertext, b: &Ciphertext) -> Result<Ciphertext, EvalFail> {
        Ciphertext::check_bound((&a.0 + &b.0) % self.n())
    }

    /// `cipherSub`: homomorphic subtraction, via modular additive inverse.
    pub fn sub(&self, a: &Ciphertext, b: &Ciphertext) -> Result<Ciphertext, EvalFail> {
        let n = self.n();
        let a = &a.0 % n;
        let b = &b.0 % n;
        let result = if a >= b { a - b } else { n - (b - a) };
        Ciphertext::check_bound(result)
    }

    /// `cipherMul`: scalar multiplication of a ciphertext by a plain `i64`.
    pub fn mul_scalar(&self, a: &Ciphertext, scalar: i64) -> Result<Ciphertext, EvalFail> {
        let n = self.n();
        if scalar == 0 {
            return Ok(Ciphertext(BigUint::zero()));
        }
        let magnitude = BigUint::from(scalar.unsigned_abs());
        let product = (&a.0 * &magnitude) % n;
        if scalar.is_negative() {
            self.negate(&Ciphertext(product))
        } else {
            Ciphertext::check_bound(product)
        }
    }

    fn negate(&self, a: &Ciphertext) -> Result<Ciphertext, EvalFail> {
        let n = self.n();
        let a = &a.0 % n;
        if a.is_zero() {
            return Ciphertext::check_bound(a);
        }
        Ciphertext::check_bound(n - a)
    }

    /// Homomorphic "divide by a shared secret factor" used only
    /// internally to demonstrate the extended-gcd failure path: fails
    /// `HomomorphicFail` when `a` and the modulus are not coprime.
    pub fn invert(&self, a: &Ciphertext) -> Result<Ciphertext, EvalFail> {
        let n = self.n();
        let (gcd, x, _y) = extended_gcd(a.0.clone().into(), n.clone().into());
        if gcd != num_bigint::BigInt::one() {
            return Err(EvalFail::HomomorphicFail);
        }
        let modulus = num_bigint::BigInt::from(n.clone());
        let inv = ((x % &modulus) + &modulus) % &modulus;
        Ciphertext::check_bound(inv.to_biguint().ok_or(EvalFail::HomomorphicFail)?)
    }
}

trait IsNegative {
    fn is_negative(&self) -> bool;
}
impl IsNegative for i64 {
    fn is_negative(&self) -> bool {
        *self < 0
    }
}

fn extended_gcd(
    a: num_bigint::BigInt,
    b: num_bigint::BigInt,
) -> (num_bigint::BigInt, num_bigint::BigInt, num_bigint::BigInt) {
    if b.is_zero() {
        (a, num_bigint::BigInt::one(), num_bigint::BigInt::zero())
    } else {
        let (q, r) = a.div_mod_floor(&b);
        let (g, x, y) = extended_gcd(b, r);
        (g, y.clone(), x - q * y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_and_sub_round_trip() {
        let key = HomomorphicKey::derive(&Address::new(vec![1, 2, 3]));
        let a = Ciphertext::from_u64(100);
        let b = Ciphertext::from_u64(42);
        let sum = key.add(&a, &b).unwrap();
        let back = key.sub(&sum, &b).unwrap();
        assert_eq!(back, a);
    }

    #[test]
    fn scalar_mul() {
        let key = HomomorphicKey::derive(&Address::new(vec![9]));
        let a = Ciphertext::from_u64(7);
        let doubled = key.mul_scalar(&a, 2).unwrap();
        let expected = key.add(&a, &a).unwrap();
        assert_eq!(doubled, expected);
    }

    #[test]
    fn huge_integer_rejected() {
        let huge = BigUint::from(1_u8) << (MAX_CIPHERTEXT_BITS + 1);
        assert!(Ciphertext::check_bound(huge).is_err());
    }

    #[test]
    fn distinct_contracts_derive_distinct_keys() {
        let k1 = HomomorphicKey::derive(&Address::new(vec![1]));
        let k2 = HomomorphicKey::derive(&Address::new(vec![2]));
        assert_ne!(k1, k2);
    }
}
