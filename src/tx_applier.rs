//! Single-threaded, strictly-ordered transaction application.
//!
//! Mirrors the `TransactionExecutor`/ISI-execution pipeline in
//! `iroha_core::smartcontracts::isi`: each transaction is checked against a
//! cloned candidate world; on success the candidate replaces the live world,
//! on failure it is discarded and the live world is untouched — a failing
//! transaction neither mutates the world nor stops the block.

use std::collections::{BTreeMap, BTreeSet};

use crate::crypto;
use crate::error::{InvalidTransaction, InvalidTxAccount, InvalidTxAsset, InvalidTxContract, InvalidTxHeader, TxCause};
use crate::evaluator::{EvalCtx, EvalState, Evaluator, SideState};
use crate::storage::Storage;
use crate::transaction::{BlockHeader, Transaction, TxAccount, TxAsset, TxContract, TxHeader};
use crate::value::{Address, GraphState};
use crate::world::{Account, Asset, Contract, World};

/// Applies one transaction against `world`, in place. Returns the delta log
/// a `TxContract::Call` produced (empty for `TxAccount`/`TxAsset` headers,
/// which have no evaluator-observable deltas of their own).
#[tracing::instrument(skip_all, fields(origin = %tx.origin, header = tx.header.tag()))]
pub fn apply_transaction(
    world: &mut World,
    tx: &Transaction,
    block_header: &BlockHeader,
    current_validators: &BTreeSet<Address>,
) -> Result<Vec<crate::delta::Delta>, InvalidTransaction> {
    let mut candidate = world.clone();
    match apply_inner(&mut candidate, tx, block_header, current_validators) {
        Ok(deltas) => {
            *world = candidate;
            Ok(deltas)
        }
        Err(cause) => Err(InvalidTransaction { header: tx.header.tag(), cause }),
    }
}

fn apply_inner(
    world: &mut World,
    tx: &Transaction,
    block_header: &BlockHeader,
    current_validators: &BTreeSet<Address>,
) -> Result<Vec<crate::delta::Delta>, TxCause> {
    let is_bootstrap_create_account = matches!(&tx.header, TxHeader::Account(TxAccount::CreateAccount { .. }));
    if !is_bootstrap_create_account {
        world.lookup_account(&tx.origin).map_err(|_| TxCause::NoSuchOriginAccount)?;
    }
    match &tx.header {
        TxHeader::Account(op) => apply_account(world, op, current_validators)
            .map(|()| Vec::new())
            .map_err(|e| TxCause::Header(InvalidTxHeader::Account(e))),
        TxHeader::Asset(op) => apply_asset(world, op, tx.timestamp)
            .map(|()| Vec::new())
            .map_err(|e| TxCause::Header(InvalidTxHeader::Asset(e))),
        TxHeader::Contract(op) => {
            apply_contract(world, op, tx, block_header).map_err(|e| TxCause::Header(InvalidTxHeader::Contract(e)))
        }
    }
}

fn apply_account(world: &mut World, op: &TxAccount, current_validators: &BTreeSet<Address>) -> Result<(), InvalidTxAccount> {
    match op {
        TxAccount::CreateAccount { address, public_key_bytes, timezone } => {
            let public_key =
                crypto::try_decode_pub(public_key_bytes).ok_or(InvalidTxAccount::InvalidPubKeyByteString)?;
            world.add_account(Account {
                address: address.clone(),
                public_key,
                timezone: timezone.clone(),
                metadata: BTreeMap::new(),
            })?;
            Ok(())
        }
        TxAccount::RevokeAccount { address } => {
            if current_validators.contains(address) {
                return Err(InvalidTxAccount::RevokeValidatorError(address.clone()));
            }
            world.remove_account(address)?;
            Ok(())
        }
    }
}

fn apply_asset(world: &mut World, op: &TxAsset, timestamp: i64) -> Result<(), InvalidTxAsset> {
    match op {
        TxAsset::CreateAsset { to, address, name, issuer, initial_supply, reference, asset_type } => {
            if to.as_bytes().is_empty() {
                return Err(InvalidTxAsset::MissingAssetAddress);
            }
            let mut holdings = BTreeMap::new();
            holdings.insert(to.clone(), *initial_supply);
            world.add_asset(
                address.clone(),
                Asset {
                    address: address.clone(),
                    name: name.clone(),
                    issuer: issuer.clone(),
                    supply: *initial_supply,
                    reference: reference.clone(),
                    asset_type: *asset_type,
                    timestamp,
                    holdings,
                },
            )?;
            Ok(())
        }
        TxAsset::Transfer { asset, from, to, amount } => {
            world.transfer_asset(asset, from, to, *amount)?;
            Ok(())
        }
        TxAsset::Bind { .. } => Err(InvalidTxAsset::Unsupported),
    }
}

fn apply_contract(
    world: &mut World,
    op: &TxContract,
    tx: &Transaction,
    block_header: &BlockHeader,
) -> Result<Vec<crate::delta::Delta>, InvalidTxContract> {
    match op {
        TxContract::CreateContract { address, owner, script } => {
            let contract = Contract {
                address: address.clone(),
                owner: owner.clone(),
                timestamp: tx.timestamp,
                script: script.clone(),
                global_storage: Storage::new(),
                local_storage: BTreeMap::new(),
                local_storage_vars: script.locals.clone(),
                graph_state: GraphState::Initial,
                homomorphic_key: crate::evaluator::homomorphic::HomomorphicKey::derive(address),
                side_lock: None,
            };
            world.add_contract(address.clone(), contract)?;
            Ok(Vec::new())
        }
        TxContract::Call { contract, method, args } => {
            let existing = world.lookup_contract(contract)?.clone();
            let eval_ctx = EvalCtx {
                current_block: Address::new(block_header.prev_hash.to_vec()),
                current_validator: block_header.origin.clone(),
                current_transaction: tx.signing_bytes(),
                current_timestamp: tx.timestamp,
                current_created: existing.timestamp,
                current_deployer: existing.owner.clone(),
                current_tx_issuer: tx.origin.clone(),
                current_address: existing.address.clone(),
                current_priv_key: crypto::derive_contract_signing_key(&existing.address),
                current_storage_key: existing.homomorphic_key.clone(),
            };
            let eval_state = EvalState {
                global_storage: existing.global_storage.clone(),
                temp_storage: Storage::new(),
                local_storage: existing.local_storage.clone(),
                graph_state: existing.graph_state.clone(),
                side_state: SideState::None,
                side_lock: existing.side_lock,
                world: world.clone(),
                deltas: Vec::new(),
            };
            let mut evaluator = Evaluator::new(eval_ctx, eval_state, &existing.script);
            evaluator.eval_method(method, args.clone())?;

            let mut updated_contract = existing;
            updated_contract.global_storage = evaluator.state.global_storage;
            updated_contract.local_storage = evaluator.state.local_storage;
            updated_contract.graph_state = evaluator.state.graph_state;
            updated_contract.side_lock = evaluator.state.side_lock;

            let mut new_world = evaluator.state.world;
            new_world.update_contract(contract, updated_contract)?;
            let deltas = evaluator.state.deltas;
            *world = new_world;
            Ok(deltas)
        }
        TxContract::SyncLocal { .. } => Err(InvalidTxContract::Unsupported),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::PrivateKey;
    use crate::script::{Method, MethodTag, Script};
    use crate::value::{Sig, Value};
    use crate::world::AssetType;

    fn signed(header: TxHeader, origin: Address, timestamp: i64) -> Transaction {
        // Tests exercise the applier directly; signature verification is
        // `BlockValidator`'s job, not `apply_transaction`'s, so a
        // placeholder signature is fine here.
        Transaction { header, origin, signature: Sig { r: [0; 32], s: [0; 32] }, timestamp }
    }

    fn bootstrap_world() -> (World, Address) {
        let mut world = World::new();
        let priv_key = PrivateKey::from_bytes(&[1; 32]);
        let origin = Address::new(vec![1]);
        world
            .add_account(Account {
                address: origin.clone(),
                public_key: priv_key.public(),
                timezone: "UTC".into(),
                metadata: BTreeMap::new(),
            })
            .unwrap();
        (world, origin)
    }

    #[test]
    fn create_account_then_asset_then_transfer() {
        let (mut world, origin) = bootstrap_world();
        let validators = BTreeSet::new();

        let new_account = Address::new(vec![2]);
        let priv_key2 = PrivateKey::from_bytes(&[2; 32]);
        let tx1 = signed(
            TxHeader::Account(TxAccount::CreateAccount {
                address: new_account.clone(),
                public_key_bytes: priv_key2.public().to_bytes().to_vec(),
                timezone: "UTC".into(),
            }),
            new_account.clone(),
            1,
        );
        apply_transaction(&mut world, &tx1, &header(), &validators).unwrap();
        assert!(world.lookup_account(&new_account).is_ok());

        let asset_addr = Address::new(vec![9]);
        let tx2 = signed(
            TxHeader::Asset(TxAsset::CreateAsset {
                to: origin.clone(),
                address: asset_addr.clone(),
                name: "USD".into(),
                issuer: origin.clone(),
                initial_supply: 1000,
                reference: None,
                asset_type: AssetType::Discrete,
            }),
            origin.clone(),
            2,
        );
        apply_transaction(&mut world, &tx2, &header(), &validators).unwrap();

        let tx3 = signed(
            TxHeader::Asset(TxAsset::Transfer { asset: asset_addr.clone(), from: origin.clone(), to: new_account.clone(), amount: 100 }),
            origin.clone(),
            3,
        );
        apply_transaction(&mut world, &tx3, &header(), &validators).unwrap();
        let asset = world.lookup_asset(&asset_addr).unwrap();
        assert_eq!(*asset.holdings.get(&new_account).unwrap(), 100);
        assert_eq!(*asset.holdings.get(&origin).unwrap(), 900);
    }

    #[test]
    fn bootstrap_create_account_is_self_signed_and_origin_need_not_preexist() {
        let mut world = World::new();
        let validators = BTreeSet::new();
        let brand_new = Address::new(vec![7]);
        let priv_key = PrivateKey::from_bytes(&[7; 32]);
        let tx = signed(
            TxHeader::Account(TxAccount::CreateAccount {
                address: brand_new.clone(),
                public_key_bytes: priv_key.public().to_bytes().to_vec(),
                timezone: "UTC".into(),
            }),
            brand_new.clone(),
            1,
        );
        apply_transaction(&mut world, &tx, &header(), &validators).unwrap();
        assert!(world.lookup_account(&brand_new).is_ok());
    }

    #[test]
    fn missing_asset_address_is_rejected() {
        let (mut world, origin) = bootstrap_world();
        let validators = BTreeSet::new();
        let tx = signed(
            TxHeader::Asset(TxAsset::CreateAsset {
                to: Address::new(Vec::new()),
                address: Address::new(vec![9]),
                name: "USD".into(),
                issuer: origin.clone(),
                initial_supply: 1000,
                reference: None,
                asset_type: AssetType::Discrete,
            }),
            origin,
            1,
        );
        let err = apply_transaction(&mut world, &tx, &header(), &validators).unwrap_err();
        assert_eq!(err.header, "TxAsset");
    }

    #[test]
    fn failing_transaction_does_not_mutate_world() {
        let (mut world, origin) = bootstrap_world();
        let validators = BTreeSet::new();
        let before = world.clone();
        let tx = signed(
            TxHeader::Asset(TxAsset::Transfer { asset: Address::new(vec![99]), from: origin.clone(), to: origin.clone(), amount: 1 }),
            origin,
            1,
        );
        let err = apply_transaction(&mut world, &tx, &header(), &validators).unwrap_err();
        assert_eq!(err.header, "TxAsset");
        assert_eq!(world, before);
    }

    #[test]
    fn revoking_a_validator_is_rejected() {
        let (mut world, origin) = bootstrap_world();
        let mut validators = BTreeSet::new();
        validators.insert(origin.clone());
        let tx = signed(TxHeader::Account(TxAccount::RevokeAccount { address: origin.clone() }), origin, 1);
        let err = apply_transaction(&mut world, &tx, &header(), &validators).unwrap_err();
        assert_eq!(err.header, "TxAccount");
    }

    #[test]
    fn contract_call_emits_deltas_and_persists_storage() {
        let (mut world, origin) = bootstrap_world();
        let validators = BTreeSet::new();
        let contract_addr = Address::new(vec![50]);
        let mut globals = BTreeSet::new();
        globals.insert("count".to_owned());
        let mut methods = BTreeMap::new();
        methods.insert(
            "init".to_owned(),
            Method {
                name: "init".to_owned(),
                args: vec![],
                tag: MethodTag::Main("initial".to_owned()),
                body: crate::script::Expr::Seq(
                    Box::new(crate::script::Expr::Assign(
                        "count".to_owned(),
                        Box::new(crate::script::Expr::Lit(Value::Int(0))),
                    )),
                    Box::new(crate::script::Expr::Call(
                        crate::script::Prim::Transition("started".to_owned()),
                        vec![],
                    )),
                ),
            },
        );
        methods.insert(
            "bump".to_owned(),
            Method {
                name: "bump".to_owned(),
                args: vec![],
                tag: MethodTag::Main("started".to_owned()),
                body: crate::script::Expr::Assign(
                    "count".to_owned(),
                    Box::new(crate::script::Expr::BinOp(
                        crate::script::BinOp::Add,
                        Box::new(crate::script::Expr::Var("count".to_owned())),
                        Box::new(crate::script::Expr::Lit(Value::Int(1))),
                    )),
                ),
            },
        );
        let script = Script { globals, locals: BTreeSet::new(), methods };
        let create_tx = signed(
            TxHeader::Contract(TxContract::CreateContract { address: contract_addr.clone(), owner: origin.clone(), script }),
            origin.clone(),
            1,
        );
        apply_transaction(&mut world, &create_tx, &header(), &validators).unwrap();

        let init_tx = signed(
            TxHeader::Contract(TxContract::Call { contract: contract_addr.clone(), method: "init".to_owned(), args: vec![] }),
            origin.clone(),
            2,
        );
        apply_transaction(&mut world, &init_tx, &header(), &validators).unwrap();

        let call_tx = signed(
            TxHeader::Contract(TxContract::Call { contract: contract_addr.clone(), method: "bump".to_owned(), args: vec![] }),
            origin,
            3,
        );
        let deltas = apply_transaction(&mut world, &call_tx, &header(), &validators).unwrap();
        assert_eq!(deltas.len(), 1);
        let contract = world.lookup_contract(&contract_addr).unwrap();
        assert_eq!(contract.global_storage.get("count"), Some(&Value::Int(1)));
    }

    fn header() -> BlockHeader {
        BlockHeader { index: 0, origin: Address::new(vec![0xAA]), timestamp: 0, prev_hash: [0; 32] }
    }
}
