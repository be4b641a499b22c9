//! World entities (`Account`, `Asset`, `Contract`) and the pure `World`
//! transitions that act on them.
//!
//! Modeled after the `WorldStateView`/`World` split in `iroha_core::wsv`,
//! but simplified to plain, pure `World -> Result<World, WorldErr>`
//! functions: this core has no async runtime, no `DashMap`, and no interior
//! mutability — a single transaction owns `&mut World` for the duration of
//! its application.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::crypto::PublicKey;
use crate::error::WorldErr;
use crate::evaluator::homomorphic::HomomorphicKey;
use crate::script::Script;
use crate::storage::Storage;
use crate::value::{Address, GraphState};

/// Asset accounting type: `Discrete` units cannot be fractionally divided
/// below 1, `Divisible` assets track the same integer holdings but signal
/// to callers that fractional transfer semantics may apply at a higher
/// layer (this core always moves whole `i64` units).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssetType {
    Discrete,
    Divisible,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub address: Address,
    pub public_key: PublicKey,
    pub timezone: String,
    pub metadata: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub address: Address,
    pub name: String,
    pub issuer: Address,
    pub supply: i64,
    pub reference: Option<String>,
    pub asset_type: AssetType,
    pub timestamp: i64,
    pub holdings: BTreeMap<Address, i64>,
}

impl Asset {
    /// Total supply equals the sum of holdings.
    pub fn holdings_sum(&self) -> i64 {
        self.holdings.values().sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contract {
    pub address: Address,
    pub owner: Address,
    pub timestamp: i64,
    pub script: Script,
    pub global_storage: Storage,
    pub local_storage: BTreeMap<Address, Storage>,
    pub local_storage_vars: std::collections::BTreeSet<String>,
    pub graph_state: GraphState,
    pub homomorphic_key: HomomorphicKey,
    /// `Some((lock_start, lock_timeout_end))` while the side-graph lock from
    /// a prior `NovationInit` call is still held; persists across calls the
    /// same way `graph_state` does.
    pub side_lock: Option<(i64, i64)>,
}

/// The ledger's three entity maps. Every transition is a pure function
/// `World -> Result<World, WorldErr>`: no partial mutation ever escapes a
/// failed call (invariant checked by construction, since every mutator
/// takes `&mut self` and only commits once all preconditions have passed).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct World {
    pub accounts: BTreeMap<Address, Account>,
    pub assets: BTreeMap<Address, Asset>,
    pub contracts: BTreeMap<Address, Contract>,
}

impl World {
    pub fn new() -> Self {
        Self::default()
    }

    /// No address names more than one kind of entity.
    fn address_is_free(&self, address: &Address) -> bool {
        !self.accounts.contains_key(address)
            && !self.assets.contains_key(address)
            && !self.contracts.contains_key(address)
    }

    pub fn lookup_account(&self, address: &Address) -> Result<&Account, WorldErr> {
        self.accounts
            .get(address)
            .ok_or_else(|| WorldErr::NoSuchAccount(address.clone()))
    }

    pub fn add_account(&mut self, account: Account) -> Result<(), WorldErr> {
        if !self.address_is_free(&account.address) {
            return Err(WorldErr::AddressCollision(account.address));
        }
        self.accounts.insert(account.address.clone(), account);
        Ok(())
    }

    pub fn remove_account(&mut self, address: &Address) -> Result<(), WorldErr> {
        self.accounts
            .remove(address)
            .map(|_| ())
            .ok_or_else(|| WorldErr::NoSuchAccount(address.clone()))
    }

    pub fn lookup_asset(&self, address: &Address) -> Result<&Asset, WorldErr> {
        self.assets
            .get(address)
            .ok_or_else(|| WorldErr::NoSuchAsset(address.clone()))
    }

    pub fn add_asset(&mut self, to: Address, asset: Asset) -> Result<(), WorldErr> {
        if !self.address_is_free(&to) {
            return Err(WorldErr::AddressCollision(to));
        }
        self.assets.insert(to, asset);
        Ok(())
    }

    /// Atomically moves `amount` units of `asset` from `from` to `to`.
    /// Fails on a missing asset, a missing holder, insufficient holdings,
    /// or overflow; never partially mutates on failure.
    pub fn transfer_asset(
        &mut self,
        asset: &Address,
        from: &Address,
        to: &Address,
        amount: i64,
    ) -> Result<(), WorldErr> {
        let asset_entry = self
            .assets
            .get(asset)
            .ok_or_else(|| WorldErr::NoSuchAsset(asset.clone()))?;
        let from_balance = *asset_entry
            .holdings
            .get(from)
            .ok_or_else(|| WorldErr::NoSuchHolder(from.clone()))?;
        let new_from_balance = from_balance
            .checked_sub(amount)
            .ok_or(WorldErr::InsufficientHoldings)?;
        if new_from_balance < 0 {
            return Err(WorldErr::InsufficientHoldings);
        }
        let to_balance = *asset_entry.holdings.get(to).unwrap_or(&0);
        let new_to_balance = to_balance
            .checked_add(amount)
            .ok_or(WorldErr::SupplyOverflow)?;

        let asset_entry = self.assets.get_mut(asset).expect("checked above");
        asset_entry.holdings.insert(from.clone(), new_from_balance);
        asset_entry.holdings.insert(to.clone(), new_to_balance);
        Ok(())
    }

    pub fn add_contract(&mut self, address: Address, contract: Contract) -> Result<(), WorldErr> {
        if !self.address_is_free(&address) {
            return Err(WorldErr::AddressCollision(address));
        }
        self.contracts.insert(address, contract);
        Ok(())
    }

    pub fn lookup_contract(&self, address: &Address) -> Result<&Contract, WorldErr> {
        self.contracts
            .get(address)
            .ok_or_else(|| WorldErr::NoSuchContract(address.clone()))
    }

    pub fn update_contract(&mut self, address: &Address, contract: Contract) -> Result<(), WorldErr> {
        if !self.contracts.contains_key(address) {
            return Err(WorldErr::NoSuchContract(address.clone()));
        }
        self.contracts.insert(address.clone(), contract);
        Ok(())
    }
}
