//! # Vault Ledger
//!
//! The vault is the multi-tenant book of record for every underlying asset
//! the protocol custodies. It answers one question -- "how much of asset
//! `A` is recorded as belonging to account `X`?" -- and refuses every
//! mutation that would make the answer negative.
//!
//! ## Security Model
//!
//! - **Caller gating**: every mutating operation consults the injected
//!   [`Authorizer`] first. A rejected caller gets
//!   [`VaultError::Unauthorized`] and the table is untouched.
//! - **Backed movements only**: debits and transfers are checked against
//!   the recorded balance; credits are checked for overflow.
//! - **Reconciled withdrawals**: [`Vault::withdraw_to`] measures the
//!   vault's own external holding before and after instructing the asset to
//!   pay out, and fails unless it dropped by exactly the requested amount.
//!   Fee-on-transfer and silently failing assets are caught here.
//!
//! ## Atomicity
//!
//! Every mutation is staged against a working overlay while the write lock
//! is held and committed only if all of its steps succeed. This includes the
//! batch operations: a batch either applies completely or not at all.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use basket_protocol::{Address, Asset, AssetError, Authorizer, Quantity};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during vault operations.
#[derive(Debug, Error)]
pub enum VaultError {
    /// The caller failed the authorization check.
    #[error("unauthorized: {caller} may not mutate the vault")]
    Unauthorized {
        /// The rejected caller.
        caller: Address,
    },

    /// A debit or transfer exceeds the recorded balance.
    #[error(
        "insufficient balance: {account} holds {available} of {asset}, requested {requested}"
    )]
    InsufficientBalance {
        /// The asset being moved.
        asset: Address,
        /// The account being debited.
        account: Address,
        /// Its recorded balance.
        available: Quantity,
        /// The amount requested.
        requested: Quantity,
    },

    /// Batch inputs were empty or of different lengths.
    #[error("length mismatch: {assets} assets, {quantities} quantities")]
    LengthMismatch {
        /// Number of assets supplied.
        assets: usize,
        /// Number of quantities supplied.
        quantities: usize,
    },

    /// A withdrawal did not reduce the vault's custodied holding by the
    /// requested amount.
    #[error(
        "reconciliation failed for {asset}: expected decrease of {expected}, holding went from {before} to {after}"
    )]
    Reconciliation {
        /// The asset withdrawn.
        asset: Address,
        /// The requested withdrawal.
        expected: Quantity,
        /// Vault holding before the transfer.
        before: Quantity,
        /// Vault holding after the transfer.
        after: Quantity,
    },

    /// A credit would overflow the recorded balance.
    #[error("arithmetic overflow crediting {account} with {asset}")]
    ArithmeticOverflow {
        /// The asset being credited.
        asset: Address,
        /// The account being credited.
        account: Address,
    },

    /// The underlying asset rejected a call.
    #[error("asset error: {0}")]
    Asset(#[from] AssetError),
}

// ---------------------------------------------------------------------------
// Balance table
// ---------------------------------------------------------------------------

/// Recorded balances, `asset -> (account -> quantity)`.
pub type BalanceTable = BTreeMap<Address, BTreeMap<Address, Quantity>>;

/// Uncommitted balance changes layered over the table.
struct Staged<'a> {
    table: &'a BalanceTable,
    overlay: HashMap<(Address, Address), Quantity>,
}

impl<'a> Staged<'a> {
    fn new(table: &'a BalanceTable) -> Self {
        Self {
            table,
            overlay: HashMap::new(),
        }
    }

    fn get(&self, asset: &Address, account: &Address) -> Quantity {
        self.overlay
            .get(&(*asset, *account))
            .copied()
            .unwrap_or_else(|| read_balance(self.table, asset, account))
    }

    fn credit(
        &mut self,
        asset: Address,
        account: Address,
        quantity: Quantity,
    ) -> Result<(), VaultError> {
        let updated = self
            .get(&asset, &account)
            .checked_add(quantity)
            .ok_or(VaultError::ArithmeticOverflow { asset, account })?;
        self.overlay.insert((asset, account), updated);
        Ok(())
    }

    fn debit(
        &mut self,
        asset: Address,
        account: Address,
        quantity: Quantity,
    ) -> Result<(), VaultError> {
        let available = self.get(&asset, &account);
        if available < quantity {
            return Err(VaultError::InsufficientBalance {
                asset,
                account,
                available,
                requested: quantity,
            });
        }
        if quantity > 0 {
            self.overlay.insert((asset, account), available - quantity);
        }
        Ok(())
    }

    fn transfer(
        &mut self,
        asset: Address,
        from: Address,
        to: Address,
        quantity: Quantity,
    ) -> Result<(), VaultError> {
        self.debit(asset, from, quantity)?;
        self.credit(asset, to, quantity)
    }

    fn into_changes(self) -> HashMap<(Address, Address), Quantity> {
        self.overlay
    }
}

fn read_balance(table: &BalanceTable, asset: &Address, account: &Address) -> Quantity {
    table
        .get(asset)
        .and_then(|accounts| accounts.get(account))
        .copied()
        .unwrap_or(0)
}

fn check_batch(assets: usize, quantities: usize) -> Result<(), VaultError> {
    if assets == 0 || quantities == 0 || assets != quantities {
        return Err(VaultError::LengthMismatch { assets, quantities });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// A serializable copy of the vault's recorded balances.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultSnapshot {
    /// The vault's custody address.
    pub custodian: Address,
    /// Recorded balances, `asset -> (account -> quantity)`.
    pub balances: BalanceTable,
}

// ---------------------------------------------------------------------------
// Vault
// ---------------------------------------------------------------------------

/// The multi-tenant asset ledger.
///
/// `Vault` is `Send + Sync`; share it behind an `Arc`. Ledger mutations are
/// serialized by an internal write lock, external withdrawals by a separate
/// mutex.
pub struct Vault {
    /// The account under which the vault custodies assets externally.
    custodian: Address,
    /// Gate for every mutating call.
    authorizer: Arc<dyn Authorizer>,
    /// Recorded balances.
    balances: RwLock<BalanceTable>,
    /// Held across each withdrawal's before/transfer/after sequence so that
    /// concurrent payouts cannot leak into one another's reconciliation.
    withdrawals: Mutex<()>,
}

impl fmt::Debug for Vault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Vault")
            .field("custodian", &self.custodian)
            .field("assets", &self.balances.read().len())
            .finish()
    }
}

impl Vault {
    /// Creates an empty vault custodying under `custodian`.
    pub fn new(custodian: Address, authorizer: Arc<dyn Authorizer>) -> Self {
        Self {
            custodian,
            authorizer,
            balances: RwLock::new(BTreeMap::new()),
            withdrawals: Mutex::new(()),
        }
    }

    /// Rebuilds a vault from a previously taken [`snapshot`](Self::snapshot).
    pub fn restore(snapshot: VaultSnapshot, authorizer: Arc<dyn Authorizer>) -> Self {
        Self {
            custodian: snapshot.custodian,
            authorizer,
            balances: RwLock::new(snapshot.balances),
            withdrawals: Mutex::new(()),
        }
    }

    /// The vault's custody address.
    pub fn custodian(&self) -> Address {
        self.custodian
    }

    // -----------------------------------------------------------------------
    // Ledger mutations
    // -----------------------------------------------------------------------

    /// Adds `quantity` of `asset` to `account`'s recorded balance.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Unauthorized`] if the caller is rejected and
    /// [`VaultError::ArithmeticOverflow`] if the balance would overflow.
    pub fn credit(
        &self,
        caller: &Address,
        asset: Address,
        account: Address,
        quantity: Quantity,
    ) -> Result<Quantity, VaultError> {
        self.authorize(caller)?;
        let balance = self.apply(|staged| {
            staged.credit(asset, account, quantity)?;
            Ok(staged.get(&asset, &account))
        })?;
        tracing::debug!(%asset, %account, quantity, balance, "vault credit");
        Ok(balance)
    }

    /// Removes `quantity` of `asset` from `account`'s recorded balance.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::InsufficientBalance`] if the account holds less
    /// than `quantity`.
    pub fn debit(
        &self,
        caller: &Address,
        asset: Address,
        account: Address,
        quantity: Quantity,
    ) -> Result<Quantity, VaultError> {
        self.authorize(caller)?;
        let balance = self.apply(|staged| {
            staged.debit(asset, account, quantity)?;
            Ok(staged.get(&asset, &account))
        })?;
        tracing::debug!(%asset, %account, quantity, balance, "vault debit");
        Ok(balance)
    }

    /// Moves `quantity` of `asset` from `from` to `to`, all or nothing.
    pub fn transfer(
        &self,
        caller: &Address,
        asset: Address,
        from: Address,
        to: Address,
        quantity: Quantity,
    ) -> Result<(), VaultError> {
        self.authorize(caller)?;
        self.apply(|staged| staged.transfer(asset, from, to, quantity))?;
        tracing::debug!(%asset, %from, %to, quantity, "vault transfer");
        Ok(())
    }

    /// Transfers each `(assets[i], quantities[i])` from `from` to `to`.
    ///
    /// Zero quantities are skipped. The batch is atomic: if any pair fails,
    /// none of the pairs are applied.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::LengthMismatch`] if the slices are empty or of
    /// different lengths, and the first pair's error otherwise.
    pub fn batch_transfer(
        &self,
        caller: &Address,
        assets: &[Address],
        from: Address,
        to: Address,
        quantities: &[Quantity],
    ) -> Result<(), VaultError> {
        self.authorize(caller)?;
        check_batch(assets.len(), quantities.len())?;
        self.apply(|staged| {
            for (asset, &quantity) in assets.iter().zip(quantities) {
                if quantity > 0 {
                    staged.transfer(*asset, from, to, quantity)?;
                }
            }
            Ok(())
        })?;
        tracing::debug!(%from, %to, pairs = assets.len(), "vault batch transfer");
        Ok(())
    }

    /// Credits each `(assets[i], quantities[i])` to `account`, atomically.
    pub fn batch_credit(
        &self,
        caller: &Address,
        assets: &[Address],
        account: Address,
        quantities: &[Quantity],
    ) -> Result<(), VaultError> {
        self.authorize(caller)?;
        check_batch(assets.len(), quantities.len())?;
        self.apply(|staged| {
            for (asset, &quantity) in assets.iter().zip(quantities) {
                if quantity > 0 {
                    staged.credit(*asset, account, quantity)?;
                }
            }
            Ok(())
        })?;
        tracing::debug!(%account, pairs = assets.len(), "vault batch credit");
        Ok(())
    }

    /// Debits each `(assets[i], quantities[i])` from `account`, atomically.
    pub fn batch_debit(
        &self,
        caller: &Address,
        assets: &[Address],
        account: Address,
        quantities: &[Quantity],
    ) -> Result<(), VaultError> {
        self.authorize(caller)?;
        check_batch(assets.len(), quantities.len())?;
        self.apply(|staged| {
            for (asset, &quantity) in assets.iter().zip(quantities) {
                if quantity > 0 {
                    staged.debit(*asset, account, quantity)?;
                }
            }
            Ok(())
        })?;
        tracing::debug!(%account, pairs = assets.len(), "vault batch debit");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // External withdrawals
    // -----------------------------------------------------------------------

    /// Pays `quantity` of `asset` out of custody to `to` and verifies the
    /// vault's external holding dropped by exactly that amount.
    ///
    /// Recorded balances are not touched; pair this with a
    /// [`debit`](Self::debit). A zero quantity is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Reconciliation`] if the observed decrease differs
    /// from `quantity`, and [`VaultError::Asset`] if the asset call fails.
    pub fn withdraw_to(
        &self,
        caller: &Address,
        asset: &dyn Asset,
        to: Address,
        quantity: Quantity,
    ) -> Result<(), VaultError> {
        self.authorize(caller)?;
        self.withdraw_unchecked(asset, to, quantity)
    }

    /// Runs [`withdraw_to`](Self::withdraw_to) for each non-zero pair in
    /// order, stopping at the first failure.
    ///
    /// Payouts that completed before a failure stay paid: external transfers
    /// cannot be recalled.
    pub fn batch_withdraw_to(
        &self,
        caller: &Address,
        assets: &[&dyn Asset],
        to: Address,
        quantities: &[Quantity],
    ) -> Result<(), VaultError> {
        self.authorize(caller)?;
        check_batch(assets.len(), quantities.len())?;
        for (asset, &quantity) in assets.iter().zip(quantities) {
            self.withdraw_unchecked(*asset, to, quantity)?;
        }
        Ok(())
    }

    fn withdraw_unchecked(
        &self,
        asset: &dyn Asset,
        to: Address,
        quantity: Quantity,
    ) -> Result<(), VaultError> {
        if quantity == 0 {
            return Ok(());
        }

        let asset_id = asset.address();
        let _serialized = self.withdrawals.lock();
        let before = asset.balance_of(&self.custodian)?;
        asset.transfer(&self.custodian, &to, quantity)?;
        let after = asset.balance_of(&self.custodian)?;

        if before.checked_sub(after) != Some(quantity) {
            tracing::warn!(
                asset = %asset_id,
                expected = quantity,
                before,
                after,
                "withdrawal failed reconciliation"
            );
            return Err(VaultError::Reconciliation {
                asset: asset_id,
                expected: quantity,
                before,
                after,
            });
        }

        tracing::debug!(asset = %asset_id, %to, quantity, "vault withdrawal");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Recorded balance of `asset` for `account`. Zero if never credited.
    pub fn balance_of(&self, asset: &Address, account: &Address) -> Quantity {
        read_balance(&self.balances.read(), asset, account)
    }

    /// Recorded balances of several assets for one account.
    pub fn balances_of(&self, assets: &[Address], account: &Address) -> Vec<Quantity> {
        let table = self.balances.read();
        assets
            .iter()
            .map(|asset| read_balance(&table, asset, account))
            .collect()
    }

    /// Sum of every account's recorded balance of `asset`, or `None` if the
    /// sum does not fit in a [`Quantity`].
    pub fn total_recorded(&self, asset: &Address) -> Option<Quantity> {
        match self.balances.read().get(asset) {
            Some(accounts) => accounts
                .values()
                .try_fold(0 as Quantity, |acc, q| acc.checked_add(*q)),
            None => Some(0),
        }
    }

    /// Returns `true` if an entry exists for `(asset, account)`, even a zero one.
    pub fn has_entry(&self, asset: &Address, account: &Address) -> bool {
        self.balances
            .read()
            .get(asset)
            .is_some_and(|accounts| accounts.contains_key(account))
    }

    /// A serializable copy of the recorded balances.
    pub fn snapshot(&self) -> VaultSnapshot {
        VaultSnapshot {
            custodian: self.custodian,
            balances: self.balances.read().clone(),
        }
    }

    // -----------------------------------------------------------------------
    // Internal Helpers
    // -----------------------------------------------------------------------

    fn authorize(&self, caller: &Address) -> Result<(), VaultError> {
        if !self.authorizer.is_authorized(caller) {
            tracing::warn!(%caller, "vault call rejected: caller not authorized");
            return Err(VaultError::Unauthorized { caller: *caller });
        }
        Ok(())
    }

    /// Stages `op` under the write lock and commits its changes only if it
    /// succeeds.
    fn apply<T>(
        &self,
        op: impl FnOnce(&mut Staged<'_>) -> Result<T, VaultError>,
    ) -> Result<T, VaultError> {
        let mut table = self.balances.write();
        let (value, changes) = {
            let mut staged = Staged::new(&table);
            let value = op(&mut staged)?;
            (value, staged.into_changes())
        };
        for ((asset, account), quantity) in changes {
            table.entry(asset).or_default().insert(account, quantity);
        }
        Ok(value)
    }
}
