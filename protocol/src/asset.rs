//! # Underlying Asset Interface
//!
//! The vault custodies arbitrary external assets. The core only needs three
//! things from them: a balance query, a transfer, and -- optionally -- a
//! precision (`decimals`) query. Real assets are not trustworthy: some do
//! not expose precision at all, some fail when asked, and some deliver less
//! (or take more) than a transfer requested. The [`Asset`] trait captures
//! the surface; callers are expected to verify outcomes themselves.
//!
//! [`LedgerAsset`] is an in-memory reference implementation. It is what
//! simulations and tests plug in, and it can be configured to misbehave in
//! each of the ways production assets do.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::address::{Address, Quantity};
use crate::config::BPS_DENOMINATOR;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors reported by an underlying asset.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AssetError {
    /// The asset does not implement the queried capability.
    #[error("operation not supported by asset")]
    Unsupported,

    /// The asset call failed outright.
    #[error("asset call failed: {0}")]
    Failed(String),

    /// The sending account does not hold enough of the asset.
    #[error("insufficient funds: {account} has {available}, requested {requested}")]
    InsufficientFunds {
        /// The account being debited.
        account: Address,
        /// Its current holding.
        available: Quantity,
        /// The amount the transfer needed.
        requested: Quantity,
    },

    /// Crediting the recipient would overflow.
    #[error("asset balance overflow")]
    Overflow,
}

// ---------------------------------------------------------------------------
// Asset trait
// ---------------------------------------------------------------------------

/// An external fungible asset the vault can custody.
pub trait Asset: Send + Sync {
    /// The asset's identifier.
    fn address(&self) -> Address;

    /// Quantity of this asset held by `account`, as the asset reports it.
    fn balance_of(&self, account: &Address) -> Result<Quantity, AssetError>;

    /// Moves `quantity` from `from` to `to`.
    ///
    /// A successful return says nothing about how much actually moved.
    fn transfer(&self, from: &Address, to: &Address, quantity: Quantity)
        -> Result<(), AssetError>;

    /// Number of fractional digits, if the asset exposes it.
    fn decimals(&self) -> Result<u8, AssetError> {
        Err(AssetError::Unsupported)
    }
}

// ---------------------------------------------------------------------------
// Reference implementation
// ---------------------------------------------------------------------------

/// How a [`LedgerAsset`] answers a precision query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecimalsBehavior {
    /// Reports the given number of decimals.
    Reports(u8),
    /// Does not implement the query.
    Unsupported,
    /// Implements the query but fails when called.
    Fails,
}

/// How a [`LedgerAsset`] executes a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferBehavior {
    /// Moves exactly the requested quantity.
    Standard,
    /// Reports success but only moves `delivered_bps / 10_000` of the
    /// requested quantity.
    Partial {
        /// Share of the request that actually moves, in basis points.
        delivered_bps: u16,
    },
    /// Reports success and moves nothing.
    Silent,
    /// Delivers the requested quantity but charges the sender an extra fee.
    SenderFee {
        /// Fee on top of the transfer, in basis points.
        fee_bps: u16,
    },
}

/// An in-memory fungible asset with configurable precision and transfer
/// semantics.
#[derive(Debug)]
pub struct LedgerAsset {
    address: Address,
    decimals: DecimalsBehavior,
    transfer_behavior: RwLock<TransferBehavior>,
    holdings: RwLock<HashMap<Address, Quantity>>,
}

impl LedgerAsset {
    /// Creates a standard asset reporting `decimals` precision.
    pub fn new(address: Address, decimals: u8) -> Self {
        Self::with_behavior(address, DecimalsBehavior::Reports(decimals))
    }

    /// Creates an asset with explicit precision behavior.
    pub fn with_behavior(address: Address, decimals: DecimalsBehavior) -> Self {
        Self {
            address,
            decimals,
            transfer_behavior: RwLock::new(TransferBehavior::Standard),
            holdings: RwLock::new(HashMap::new()),
        }
    }

    /// Changes how subsequent transfers behave.
    pub fn set_transfer_behavior(&self, behavior: TransferBehavior) {
        *self.transfer_behavior.write() = behavior;
    }

    /// Creates `quantity` new units held by `to`.
    pub fn mint(&self, to: &Address, quantity: Quantity) -> Result<Quantity, AssetError> {
        let mut holdings = self.holdings.write();
        let entry = holdings.entry(*to).or_insert(0);
        *entry = entry.checked_add(quantity).ok_or(AssetError::Overflow)?;
        Ok(*entry)
    }

    /// Sum of all holdings, saturating at `Quantity::MAX`.
    pub fn total_supply(&self) -> Quantity {
        self.holdings
            .read()
            .values()
            .fold(0 as Quantity, |acc, q| acc.saturating_add(*q))
    }

    fn bps_of(quantity: Quantity, bps: u16) -> Result<Quantity, AssetError> {
        quantity
            .checked_mul(bps as u128)
            .map(|scaled| scaled / BPS_DENOMINATOR)
            .ok_or(AssetError::Overflow)
    }
}

impl Asset for LedgerAsset {
    fn address(&self) -> Address {
        self.address
    }

    fn balance_of(&self, account: &Address) -> Result<Quantity, AssetError> {
        Ok(self.holdings.read().get(account).copied().unwrap_or(0))
    }

    fn transfer(
        &self,
        from: &Address,
        to: &Address,
        quantity: Quantity,
    ) -> Result<(), AssetError> {
        let (debited, delivered) = match *self.transfer_behavior.read() {
            TransferBehavior::Standard => (quantity, quantity),
            TransferBehavior::Partial { delivered_bps } => {
                let moved = Self::bps_of(quantity, delivered_bps)?;
                (moved, moved)
            }
            TransferBehavior::Silent => return Ok(()),
            TransferBehavior::SenderFee { fee_bps } => {
                let fee = Self::bps_of(quantity, fee_bps)?;
                let total = quantity.checked_add(fee).ok_or(AssetError::Overflow)?;
                (total, quantity)
            }
        };

        let mut holdings = self.holdings.write();
        let available = holdings.get(from).copied().unwrap_or(0);
        if available < debited {
            return Err(AssetError::InsufficientFunds {
                account: *from,
                available,
                requested: debited,
            });
        }

        // Validate the credit side before touching either entry.
        let recipient = if from == to {
            available - debited
        } else {
            holdings.get(to).copied().unwrap_or(0)
        };
        let credited = recipient
            .checked_add(delivered)
            .ok_or(AssetError::Overflow)?;

        holdings.insert(*from, available - debited);
        holdings.insert(*to, credited);
        Ok(())
    }

    fn decimals(&self) -> Result<u8, AssetError> {
        match self.decimals {
            DecimalsBehavior::Reports(d) => Ok(d),
            DecimalsBehavior::Unsupported => Err(AssetError::Unsupported),
            DecimalsBehavior::Fails => Err(AssetError::Failed("decimals() reverted".into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn asset() -> LedgerAsset {
        LedgerAsset::new(Address::derive("asset-x"), 18)
    }

    #[test]
    fn standard_transfer_moves_exact_quantity() {
        let a = asset();
        let alice = Address::derive("alice");
        let bob = Address::derive("bob");
        a.mint(&alice, 1_000).unwrap();

        a.transfer(&alice, &bob, 400).unwrap();
        assert_eq!(a.balance_of(&alice).unwrap(), 600);
        assert_eq!(a.balance_of(&bob).unwrap(), 400);
        assert_eq!(a.total_supply(), 1_000);
    }

    #[test]
    fn transfer_beyond_holdings_rejected() {
        let a = asset();
        let alice = Address::derive("alice");
        a.mint(&alice, 10).unwrap();

        let result = a.transfer(&alice, &Address::derive("bob"), 11);
        assert!(matches!(
            result,
            Err(AssetError::InsufficientFunds {
                available: 10,
                requested: 11,
                ..
            })
        ));
        assert_eq!(a.balance_of(&alice).unwrap(), 10);
    }

    #[test]
    fn partial_transfer_moves_fraction() {
        let a = asset();
        let alice = Address::derive("alice");
        let bob = Address::derive("bob");
        a.mint(&alice, 1_000).unwrap();
        a.set_transfer_behavior(TransferBehavior::Partial {
            delivered_bps: 5_000,
        });

        a.transfer(&alice, &bob, 400).unwrap();
        assert_eq!(a.balance_of(&alice).unwrap(), 800);
        assert_eq!(a.balance_of(&bob).unwrap(), 200);
    }

    #[test]
    fn silent_transfer_moves_nothing() {
        let a = asset();
        let alice = Address::derive("alice");
        a.mint(&alice, 100).unwrap();
        a.set_transfer_behavior(TransferBehavior::Silent);

        a.transfer(&alice, &Address::derive("bob"), 100).unwrap();
        assert_eq!(a.balance_of(&alice).unwrap(), 100);
    }

    #[test]
    fn sender_fee_takes_extra_from_sender() {
        let a = asset();
        let alice = Address::derive("alice");
        let bob = Address::derive("bob");
        a.mint(&alice, 1_000).unwrap();
        a.set_transfer_behavior(TransferBehavior::SenderFee { fee_bps: 100 });

        a.transfer(&alice, &bob, 500).unwrap();
        assert_eq!(a.balance_of(&alice).unwrap(), 495);
        assert_eq!(a.balance_of(&bob).unwrap(), 500);
    }

    #[test]
    fn self_transfer_preserves_balance() {
        let a = asset();
        let alice = Address::derive("alice");
        a.mint(&alice, 50).unwrap();
        a.transfer(&alice, &alice, 20).unwrap();
        assert_eq!(a.balance_of(&alice).unwrap(), 50);
    }

    #[test]
    fn total_supply_saturates_across_holders() {
        let a = asset();
        a.mint(&Address::derive("alice"), Quantity::MAX).unwrap();
        a.mint(&Address::derive("bob"), Quantity::MAX).unwrap();
        assert_eq!(a.total_supply(), Quantity::MAX);
    }

    #[test]
    fn decimals_behaviors() {
        let addr = Address::derive("asset-y");
        assert_eq!(LedgerAsset::new(addr, 6).decimals(), Ok(6));
        assert_eq!(
            LedgerAsset::with_behavior(addr, DecimalsBehavior::Unsupported).decimals(),
            Err(AssetError::Unsupported)
        );
        assert!(matches!(
            LedgerAsset::with_behavior(addr, DecimalsBehavior::Fails).decimals(),
            Err(AssetError::Failed(_))
        ));
    }
}
