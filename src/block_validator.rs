//! Two-phase block processing: a pure `Verify` phase over signatures and
//! hashes, followed by a stateful `Validate` phase that feeds every
//! transaction through [`crate::tx_applier`].
//!
//! Mirrors the `BlockValidator`/`Chain` split in `iroha_core::block` —
//! structural verification (signatures, headers) never touches the world
//! state; only `Validate` does, and it does so transaction-by-transaction so
//! one bad transaction never aborts the rest of the block.

use std::collections::BTreeSet;

use crate::crypto;
use crate::error::{InvalidBlock, InvalidTxField, TxCause};
use crate::transaction::{Block, Transaction, TxAccount, TxHeader};
use crate::value::Address;
use crate::world::World;

/// Phase 1: pure verification. Checks the block origin exists, every
/// collected signature verifies against a known signer, and every
/// transaction's own signature verifies against its origin account.
/// Never mutates `world`.
#[tracing::instrument(skip_all, fields(index = block.header.index))]
pub fn verify_block(world: &World, block: &Block, _current_validators: &BTreeSet<Address>) -> Result<(), InvalidBlock> {
    world.lookup_account(&block.header.origin).map_err(|_| InvalidBlock::InvalidBlockOrigin)?;

    let signing_bytes = block.signing_bytes();
    for (sig, signer) in &block.signatures {
        let account = world.lookup_account(signer).map_err(|_| InvalidBlock::InvalidBlockSigner)?;
        if !crypto::verify(&account.public_key, sig, &signing_bytes) {
            return Err(InvalidBlock::InvalidBlockSignature);
        }
    }

    for (index, tx) in block.transactions.iter().enumerate() {
        verify_transaction(world, tx).map_err(|cause| InvalidBlock::InvalidBlockTx { index, cause })?;
    }
    Ok(())
}

fn verify_transaction(world: &World, tx: &Transaction) -> Result<(), TxCause> {
    let public_key = if let TxHeader::Account(TxAccount::CreateAccount { public_key_bytes, .. }) = &tx.header {
        crate::transaction::decode_account_public_key(public_key_bytes)
            .ok_or(TxCause::Field(InvalidTxField::InvalidPubKey))?
    } else {
        world.lookup_account(&tx.origin).map_err(|_| TxCause::NoSuchOriginAccount)?.public_key.clone()
    };
    if !crypto::verify(&public_key, &tx.signature, &tx.signing_bytes()) {
        return Err(TxCause::Field(InvalidTxField::InvalidTxSignature));
    }
    Ok(())
}

/// The result of the stateful `Validate` phase: the world after every
/// transaction that passed has been applied, plus the full list of
/// transactions that were rejected — rejected transactions don't stop the
/// block or mutate the world, they're just recorded.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockOutcome {
    pub world: World,
    pub invalid: Vec<InvalidBlock>,
}

/// Phase 2: applies every transaction in order against `world`, collecting
/// failures instead of aborting on the first one.
#[tracing::instrument(skip_all, fields(index = block.header.index, tx_count = block.transactions.len()))]
pub fn validate_block(mut world: World, block: &Block, current_validators: &BTreeSet<Address>) -> BlockOutcome {
    let mut invalid = Vec::new();
    for (index, tx) in block.transactions.iter().enumerate() {
        if let Err(err) = crate::tx_applier::apply_transaction(&mut world, tx, &block.header, current_validators) {
            tracing::warn!(index, cause = %err.cause, "transaction rejected");
            invalid.push(InvalidBlock::InvalidBlockTx { index, cause: err.cause });
        }
    }
    BlockOutcome { world, invalid }
}

/// Runs both phases. `Verify` failing is a hard rejection of the whole
/// block; `Validate` never hard-rejects, it reports per-transaction
/// failures in the returned [`BlockOutcome`].
pub fn process_block(world: World, block: &Block, current_validators: &BTreeSet<Address>) -> Result<BlockOutcome, InvalidBlock> {
    verify_block(&world, block, current_validators)?;
    Ok(validate_block(world, block, current_validators))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::PrivateKey;
    use crate::transaction::{BlockHeader, TxAccount, TxAsset, TxHeader};
    use crate::world::{Account, AssetType};
    use std::collections::BTreeMap;

    fn setup() -> (World, Address, PrivateKey, BTreeSet<Address>) {
        let mut world = World::new();
        let priv_key = PrivateKey::from_bytes(&[3; 32]);
        let validator = Address::new(vec![1]);
        world
            .add_account(Account {
                address: validator.clone(),
                public_key: priv_key.public(),
                timezone: "UTC".into(),
                metadata: BTreeMap::new(),
            })
            .unwrap();
        let mut validators = BTreeSet::new();
        validators.insert(validator.clone());
        (world, validator, priv_key, validators)
    }

    fn signed_tx(header: TxHeader, origin: &Address, priv_key: &PrivateKey, timestamp: i64) -> Transaction {
        let mut tx = Transaction { header, origin: origin.clone(), signature: crate::value::Sig { r: [0; 32], s: [0; 32] }, timestamp };
        tx.signature = crypto::sign(priv_key, &tx.signing_bytes());
        tx
    }

    fn signed_block(header: BlockHeader, transactions: Vec<Transaction>, priv_key: &PrivateKey, signer: Address) -> Block {
        let mut block = Block { header, transactions, signatures: vec![] };
        let sig = crypto::sign(priv_key, &block.signing_bytes());
        block.signatures.push((sig, signer));
        block
    }

    #[test]
    fn valid_block_applies_all_transactions() {
        let (world, origin, priv_key, validators) = setup();
        let asset_addr = Address::new(vec![9]);
        let tx = signed_tx(
            TxHeader::Asset(TxAsset::CreateAsset {
                to: origin.clone(),
                address: asset_addr.clone(),
                name: "USD".into(),
                issuer: origin.clone(),
                initial_supply: 10,
                reference: None,
                asset_type: AssetType::Discrete,
            }),
            &origin,
            &priv_key,
            1,
        );
        let header = BlockHeader { index: 1, origin: origin.clone(), timestamp: 1, prev_hash: [0; 32] };
        let block = signed_block(header, vec![tx], &priv_key, origin.clone());

        let outcome = process_block(world, &block, &validators).unwrap();
        assert!(outcome.invalid.is_empty());
        assert!(outcome.world.lookup_asset(&asset_addr).is_ok());
    }

    #[test]
    fn self_signed_bootstrap_create_account_verifies_against_its_own_key() {
        let (world, origin, priv_key, validators) = setup();
        let brand_new = Address::new(vec![55]);
        let new_key = PrivateKey::from_bytes(&[55; 32]);
        let tx = signed_tx(
            TxHeader::Account(TxAccount::CreateAccount {
                address: brand_new.clone(),
                public_key_bytes: new_key.public().to_bytes().to_vec(),
                timezone: "UTC".into(),
            }),
            &brand_new,
            &new_key,
            1,
        );
        let header = BlockHeader { index: 1, origin: origin.clone(), timestamp: 1, prev_hash: [0; 32] };
        let block = signed_block(header, vec![tx], &priv_key, origin);

        let outcome = process_block(world, &block, &validators).unwrap();
        assert!(outcome.invalid.is_empty());
        assert!(outcome.world.lookup_account(&brand_new).is_ok());
    }

    #[test]
    fn forged_block_signature_is_rejected() {
        let (world, origin, priv_key, validators) = setup();
        let header = BlockHeader { index: 1, origin: origin.clone(), timestamp: 1, prev_hash: [0; 32] };
        let mut block = signed_block(header, vec![], &priv_key, origin.clone());
        // Tamper with the signed payload after signing.
        block.header.timestamp += 1;

        let err = process_block(world, &block, &validators).unwrap_err();
        assert_eq!(err, InvalidBlock::InvalidBlockSignature);
    }

    #[test]
    fn one_bad_transaction_does_not_block_the_rest() {
        let (world, origin, priv_key, validators) = setup();
        let bad_tx = signed_tx(
            TxHeader::Account(TxAccount::RevokeAccount { address: Address::new(vec![99]) }),
            &origin,
            &priv_key,
            1,
        );
        let good_tx = signed_tx(
            TxHeader::Asset(TxAsset::CreateAsset {
                to: origin.clone(),
                address: Address::new(vec![9]),
                name: "USD".into(),
                issuer: origin.clone(),
                initial_supply: 10,
                reference: None,
                asset_type: AssetType::Discrete,
            }),
            &origin,
            &priv_key,
            2,
        );
        let header = BlockHeader { index: 1, origin: origin.clone(), timestamp: 1, prev_hash: [0; 32] };
        let block = signed_block(header, vec![bad_tx, good_tx], &priv_key, origin.clone());

        let outcome = process_block(world, &block, &validators).unwrap();
        assert_eq!(outcome.invalid.len(), 1);
        assert!(matches!(&outcome.invalid[0], InvalidBlock::InvalidBlockTx { index: 0, .. }));
        assert!(outcome.world.lookup_asset(&Address::new(vec![9])).is_ok());
    }
}
