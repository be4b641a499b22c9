//! Deterministic signing, verification, and key decoding.
//!
//! Grounded on `iroha_crypto`'s use of `ed25519-dalek`: EdDSA (RFC 8032) is
//! deterministic by construction, avoiding the determinism hazard randomized
//! ECDSA would raise — no RFC 6979 retrofit is needed once Ed25519 is the
//! chosen scheme.

use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::value::{Address, Sig};

/// A decoded Ed25519 public key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKey(#[serde(with = "pk_serde")] VerifyingKey);

/// A decoded Ed25519 private (signing) key.
#[derive(Clone)]
pub struct PrivateKey(SigningKey);

mod pk_serde {
    use ed25519_dalek::VerifyingKey;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(key: &VerifyingKey, s: S) -> Result<S::Ok, S::Error> {
        key.to_bytes().serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<VerifyingKey, D::Error> {
        let bytes = <[u8; 32]>::deserialize(d)?;
        VerifyingKey::from_bytes(&bytes).map_err(serde::de::Error::custom)
    }
}

/// Decodes 32 raw bytes into an Ed25519 public key. Fails (returns `None`)
/// on malformed input, surfaced by callers as `InvalidPubKeyByteString` /
/// `InvalidPubKey`.
pub fn try_decode_pub(bytes: &[u8]) -> Option<PublicKey> {
    let array: [u8; 32] = bytes.try_into().ok()?;
    VerifyingKey::from_bytes(&array).ok().map(PublicKey)
}

impl PublicKey {
    pub fn to_bytes(&self) -> [u8; 32] {
        self.0.to_bytes()
    }
}

impl PrivateKey {
    pub fn from_bytes(bytes: &[u8; 32]) -> Self {
        Self(SigningKey::from_bytes(bytes))
    }

    pub fn public(&self) -> PublicKey {
        PublicKey(self.0.verifying_key())
    }
}

/// The `Sign` primitive needs a key every validator can reconstruct
/// identically, but no real account private key is ever present during
/// block validation. This derives a deterministic, contract-owned signing
/// key from the contract's own address — not a secret, just a consensus-
/// visible keypair — the same shortcut `HomomorphicKey::derive` already
/// takes for `VCrypto` arithmetic, so `Sign`'s determinism requirement
/// holds without the ledger ever custodying a real private key.
pub fn derive_contract_signing_key(contract: &Address) -> PrivateKey {
    let digest: [u8; 32] = Sha256::digest(contract.as_bytes()).into();
    PrivateKey::from_bytes(&digest)
}

/// Signs `msg` with `priv_key`. Deterministic: identical inputs always
/// produce the identical signature, which every validator must agree on.
pub fn sign(priv_key: &PrivateKey, msg: &[u8]) -> Sig {
    let signature = priv_key.0.sign(msg);
    Sig::from_bytes(signature.to_bytes())
}

/// Verifies `sig` over `msg` against `pub_key`.
pub fn verify(pub_key: &PublicKey, sig: &Sig, msg: &[u8]) -> bool {
    let signature = ed25519_dalek::Signature::from_bytes(&sig.to_bytes());
    pub_key.0.verify(msg, &signature).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key(seed: u8) -> PrivateKey {
        PrivateKey::from_bytes(&[seed; 32])
    }

    #[test]
    fn sign_then_verify_round_trips() {
        let priv_key = test_key(7);
        let pub_key = priv_key.public();
        let msg = b"transfer 10 units";
        let sig = sign(&priv_key, msg);
        assert!(verify(&pub_key, &sig, msg));
    }

    #[test]
    fn signing_is_deterministic() {
        let priv_key = test_key(3);
        let msg = b"same message";
        assert_eq!(sign(&priv_key, msg), sign(&priv_key, msg));
    }

    #[test]
    fn verify_rejects_tampered_message() {
        let priv_key = test_key(1);
        let pub_key = priv_key.public();
        let sig = sign(&priv_key, b"original");
        assert!(!verify(&pub_key, &sig, b"tampered"));
    }

    #[test]
    fn try_decode_pub_rejects_wrong_length() {
        assert!(try_decode_pub(&[0_u8; 31]).is_none());
    }
}
