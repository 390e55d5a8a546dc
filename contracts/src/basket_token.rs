//! # Basket Token Contract
//!
//! A basket token is a claim on a fixed bundle of underlying assets. Each
//! basket declares, once and forever, which assets it holds and how many
//! base units of each back one *natural unit* of shares. Shares are minted
//! and burned only by the controller the owning factory reports.
//!
//! ## Construction
//!
//! [`BasketToken::new`] validates its inputs in a fixed order and fails
//! with [`BasketError::InvalidConstruction`] on the first problem:
//!
//! 1. `natural_unit` must be non-zero.
//! 2. Assets and units must be non-empty and of equal length.
//! 3. Per component, in order: unit non-zero, asset not the null address,
//!    precision queried, asset not already present.
//! 4. `natural_unit >= 10^(18 - min_decimals)`.
//!
//! The precision floor is the least precise component. An asset whose
//! `decimals` query is unsupported or fails pins the floor to zero for the
//! rest of construction, even if later components report more.
//!
//! ## Security Model
//!
//! - **Controller gating**: `mint_shares`/`burn_shares` compare the caller
//!   with `factory.controller()` on every call. Nothing is cached.
//! - **Supply tracking**: total supply and per-account balances move
//!   together under one lock; `total_supply == sum(balances)` always holds.
//! - **Immutable composition**: [`ComponentSet`] has no mutators.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use basket_protocol::config::{
    FIXED_TEXT_LENGTH, MAX_COMPONENT_DECIMALS, SHARE_DECIMALS, UNKNOWN_DECIMALS,
};
use basket_protocol::{Address, Asset, ControllerSource, Quantity};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Reasons a basket cannot be constructed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConstructionError {
    /// The natural unit is zero or below the precision floor.
    #[error("invalid natural unit {natural_unit}: must be at least {required}")]
    InvalidNaturalUnit {
        /// The natural unit supplied.
        natural_unit: Quantity,
        /// The smallest acceptable natural unit.
        required: Quantity,
    },

    /// No components, or asset and unit lists of different lengths.
    #[error("empty or mismatched component set: {assets} assets, {units} units")]
    EmptyComponentSet {
        /// Number of assets supplied.
        assets: usize,
        /// Number of units supplied.
        units: usize,
    },

    /// A component unit is zero.
    #[error("component {index} has a zero unit")]
    NonPositiveUnit {
        /// Position of the offending component.
        index: usize,
    },

    /// A component asset is the null address.
    #[error("component {index} has the null asset address")]
    ZeroAddress {
        /// Position of the offending component.
        index: usize,
    },

    /// An asset appears more than once.
    #[error("duplicate component asset {asset}")]
    DuplicateComponent {
        /// The repeated asset.
        asset: Address,
    },
}

/// Errors that can occur during basket token operations.
#[derive(Debug, Error)]
pub enum BasketError {
    /// Construction inputs were rejected.
    #[error("invalid construction: {0}")]
    InvalidConstruction(#[from] ConstructionError),

    /// The caller is not the factory's current controller.
    #[error("unauthorized: {caller} is not the basket controller")]
    Unauthorized {
        /// The rejected caller.
        caller: Address,
    },

    /// A burn or share transfer exceeds the account's balance.
    #[error("insufficient shares: {account} holds {available}, requested {requested}")]
    InsufficientBalance {
        /// The account being debited.
        account: Address,
        /// Its share balance.
        available: Quantity,
        /// The amount requested.
        requested: Quantity,
    },

    /// A delegated transfer exceeds the spender's allowance.
    #[error("insufficient allowance: {spender} may move {available} of {owner}'s shares, requested {requested}")]
    InsufficientAllowance {
        /// The share owner.
        owner: Address,
        /// The delegated spender.
        spender: Address,
        /// Remaining allowance.
        available: Quantity,
        /// The amount requested.
        requested: Quantity,
    },

    /// Shares cannot be sent to the null address.
    #[error("invalid destination: shares cannot be sent to the null address")]
    InvalidDestination,

    /// Allowances cannot be granted to the null address.
    #[error("invalid spender: allowances cannot be granted to the null address")]
    InvalidSpender,

    /// Supply or a balance would overflow.
    #[error("arithmetic overflow: {quantity} shares for {account}")]
    ArithmeticOverflow {
        /// The account being credited.
        account: Address,
        /// The amount that overflowed.
        quantity: Quantity,
    },
}

// ---------------------------------------------------------------------------
// Components
// ---------------------------------------------------------------------------

/// One underlying asset and the base units of it behind one natural unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Component {
    /// The underlying asset.
    pub asset: Address,
    /// Base units of `asset` per natural unit of shares. Always positive.
    pub unit: Quantity,
}

/// A validated, ordered, duplicate-free set of components.
///
/// Only [`ComponentSet::build`] creates one, and nothing modifies it
/// afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentSet {
    components: Vec<Component>,
    members: HashSet<Address>,
    min_decimals: u8,
}

impl ComponentSet {
    /// Validates `assets` and `units` pairwise and records the precision
    /// floor.
    ///
    /// # Errors
    ///
    /// [`ConstructionError::EmptyComponentSet`],
    /// [`ConstructionError::NonPositiveUnit`],
    /// [`ConstructionError::ZeroAddress`] or
    /// [`ConstructionError::DuplicateComponent`].
    pub fn build(
        assets: &[Arc<dyn Asset>],
        units: &[Quantity],
    ) -> Result<Self, ConstructionError> {
        if assets.is_empty() || units.is_empty() || assets.len() != units.len() {
            return Err(ConstructionError::EmptyComponentSet {
                assets: assets.len(),
                units: units.len(),
            });
        }

        let mut components = Vec::with_capacity(assets.len());
        let mut members = HashSet::with_capacity(assets.len());
        let mut min_decimals = MAX_COMPONENT_DECIMALS;

        for (index, (asset, &unit)) in assets.iter().zip(units).enumerate() {
            if unit == 0 {
                return Err(ConstructionError::NonPositiveUnit { index });
            }

            let address = asset.address();
            if address.is_zero() {
                return Err(ConstructionError::ZeroAddress { index });
            }

            // The floor only ever falls, so an unknown precision sticks.
            match asset.decimals() {
                Ok(decimals) => min_decimals = min_decimals.min(decimals),
                Err(err) => {
                    tracing::debug!(asset = %address, %err, "precision unknown, assuming 0");
                    min_decimals = UNKNOWN_DECIMALS;
                }
            }

            if !members.insert(address) {
                return Err(ConstructionError::DuplicateComponent { asset: address });
            }
            components.push(Component {
                asset: address,
                unit,
            });
        }

        Ok(Self {
            components,
            members,
            min_decimals,
        })
    }

    /// Components in construction order.
    pub fn as_slice(&self) -> &[Component] {
        &self.components
    }

    /// Number of components.
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Always `false`: a built set has at least one component.
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Returns `true` if `asset` is a component.
    pub fn contains(&self, asset: &Address) -> bool {
        self.members.contains(asset)
    }

    /// Least precision across components; zero if any was unknown.
    pub fn min_decimals(&self) -> u8 {
        self.min_decimals
    }
}

/// Smallest natural unit a basket whose least precise component has
/// `min_decimals` decimals may use: `10^(18 - min_decimals)`.
pub fn required_natural_unit(min_decimals: u8) -> Quantity {
    let exponent = MAX_COMPONENT_DECIMALS.saturating_sub(min_decimals);
    10u128.pow(exponent as u32)
}

// ---------------------------------------------------------------------------
// Fixed-length text
// ---------------------------------------------------------------------------

/// Fixed-width, NUL-padded text as supplied at construction.
pub type FixedText = [u8; FIXED_TEXT_LENGTH];

/// Encodes `text` into a NUL-padded fixed-width buffer, truncating anything
/// past [`FIXED_TEXT_LENGTH`] bytes.
pub fn encode_fixed_text(text: &str) -> FixedText {
    let mut buf = [0u8; FIXED_TEXT_LENGTH];
    let bytes = text.as_bytes();
    let len = bytes.len().min(FIXED_TEXT_LENGTH);
    buf[..len].copy_from_slice(&bytes[..len]);
    buf
}

/// Decodes NUL-padded fixed-width text. Trailing NULs are dropped and
/// invalid UTF-8 is replaced.
pub fn decode_fixed_text(raw: &FixedText) -> String {
    let end = raw
        .iter()
        .rposition(|&b| b != 0)
        .map(|i| i + 1)
        .unwrap_or(0);
    String::from_utf8_lossy(&raw[..end]).into_owned()
}

// ---------------------------------------------------------------------------
// Construction inputs
// ---------------------------------------------------------------------------

/// Everything needed to construct a [`BasketToken`].
pub struct BasketParams {
    /// The owning factory; reports the controller.
    pub factory: Arc<dyn ControllerSource>,
    /// Component assets, in order.
    pub assets: Vec<Arc<dyn Asset>>,
    /// Base units per natural unit, parallel to `assets`.
    pub units: Vec<Quantity>,
    /// Minimum share multiple for issuance and redemption.
    pub natural_unit: Quantity,
    /// Display name, NUL-padded.
    pub name: FixedText,
    /// Ticker symbol, NUL-padded.
    pub symbol: FixedText,
}

/// Serializable description of a basket's composition and supply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasketManifest {
    /// Display name.
    pub name: String,
    /// Ticker symbol.
    pub symbol: String,
    /// Minimum share multiple.
    pub natural_unit: Quantity,
    /// Components in construction order.
    pub components: Vec<Component>,
    /// Shares outstanding.
    pub total_supply: Quantity,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Share ledger
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct ShareLedger {
    total_supply: Quantity,
    balances: HashMap<Address, Quantity>,
    allowances: HashMap<(Address, Address), Quantity>,
}

impl ShareLedger {
    fn balance(&self, account: &Address) -> Quantity {
        self.balances.get(account).copied().unwrap_or(0)
    }

    fn allowance(&self, owner: &Address, spender: &Address) -> Quantity {
        self.allowances
            .get(&(*owner, *spender))
            .copied()
            .unwrap_or(0)
    }

    /// Moves shares between holders after checking both sides.
    fn move_shares(
        &mut self,
        from: Address,
        to: Address,
        quantity: Quantity,
    ) -> Result<(), BasketError> {
        if to.is_zero() {
            return Err(BasketError::InvalidDestination);
        }
        let available = self.balance(&from);
        if available < quantity {
            return Err(BasketError::InsufficientBalance {
                account: from,
                available,
                requested: quantity,
            });
        }
        if from == to {
            return Ok(());
        }
        let credited = self
            .balance(&to)
            .checked_add(quantity)
            .ok_or(BasketError::ArithmeticOverflow {
                account: to,
                quantity,
            })?;

        self.balances.insert(from, available - quantity);
        self.balances.insert(to, credited);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// BasketToken
// ---------------------------------------------------------------------------

/// A basket definition plus its share supply.
pub struct BasketToken {
    factory: Arc<dyn ControllerSource>,
    components: ComponentSet,
    natural_unit: Quantity,
    name: String,
    symbol: String,
    created_at: DateTime<Utc>,
    shares: RwLock<ShareLedger>,
}

impl fmt::Debug for BasketToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasketToken")
            .field("symbol", &self.symbol)
            .field("components", &self.components.as_slice())
            .field("natural_unit", &self.natural_unit)
            .field("total_supply", &self.total_supply())
            .finish()
    }
}

impl BasketToken {
    /// Validates `params` and creates a basket with zero supply.
    ///
    /// # Errors
    ///
    /// Returns [`BasketError::InvalidConstruction`] describing the first
    /// rule violated, in the order listed in the module docs.
    pub fn new(params: BasketParams) -> Result<Self, BasketError> {
        let BasketParams {
            factory,
            assets,
            units,
            natural_unit,
            name,
            symbol,
        } = params;

        if natural_unit == 0 {
            return Err(ConstructionError::InvalidNaturalUnit {
                natural_unit,
                required: 1,
            }
            .into());
        }

        let components = ComponentSet::build(&assets, &units)?;

        let required = required_natural_unit(components.min_decimals());
        if natural_unit < required {
            return Err(ConstructionError::InvalidNaturalUnit {
                natural_unit,
                required,
            }
            .into());
        }

        let basket = Self {
            factory,
            components,
            natural_unit,
            name: decode_fixed_text(&name),
            symbol: decode_fixed_text(&symbol),
            created_at: Utc::now(),
            shares: RwLock::new(ShareLedger::default()),
        };

        tracing::info!(
            symbol = %basket.symbol,
            components = basket.components.len(),
            natural_unit,
            min_decimals = basket.components.min_decimals(),
            "basket created"
        );
        Ok(basket)
    }

    // -----------------------------------------------------------------------
    // Supply
    // -----------------------------------------------------------------------

    /// Creates `quantity` shares for `account`.
    ///
    /// # Errors
    ///
    /// Returns [`BasketError::Unauthorized`] unless `caller` is the current
    /// controller, and [`BasketError::ArithmeticOverflow`] if supply would
    /// overflow.
    pub fn mint_shares(
        &self,
        caller: &Address,
        account: Address,
        quantity: Quantity,
    ) -> Result<(), BasketError> {
        self.ensure_controller(caller)?;

        let mut shares = self.shares.write();
        let overflow = BasketError::ArithmeticOverflow { account, quantity };
        let supply = shares.total_supply.checked_add(quantity);
        let balance = shares.balance(&account).checked_add(quantity);
        let (Some(supply), Some(balance)) = (supply, balance) else {
            return Err(overflow);
        };

        shares.total_supply = supply;
        shares.balances.insert(account, balance);
        tracing::debug!(%account, quantity, supply, "shares minted");
        Ok(())
    }

    /// Destroys `quantity` of `account`'s shares.
    ///
    /// # Errors
    ///
    /// Returns [`BasketError::Unauthorized`] unless `caller` is the current
    /// controller, and [`BasketError::InsufficientBalance`] if the account
    /// holds fewer shares.
    pub fn burn_shares(
        &self,
        caller: &Address,
        account: Address,
        quantity: Quantity,
    ) -> Result<(), BasketError> {
        self.ensure_controller(caller)?;

        let mut shares = self.shares.write();
        let available = shares.balance(&account);
        if available < quantity {
            return Err(BasketError::InsufficientBalance {
                account,
                available,
                requested: quantity,
            });
        }
        // Supply is the sum of all balances, so it covers any one of them.
        debug_assert!(shares.total_supply >= available);
        let supply = shares.total_supply - quantity;

        shares.total_supply = supply;
        shares.balances.insert(account, available - quantity);
        tracing::debug!(%account, quantity, supply, "shares burned");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Share transfers
    // -----------------------------------------------------------------------

    /// Moves `quantity` of the caller's shares to `to`.
    pub fn transfer_shares(
        &self,
        caller: &Address,
        to: Address,
        quantity: Quantity,
    ) -> Result<(), BasketError> {
        self.shares.write().move_shares(*caller, to, quantity)?;
        tracing::debug!(from = %caller, %to, quantity, "shares transferred");
        Ok(())
    }

    /// Lets `spender` move up to `quantity` of the caller's shares.
    /// Replaces any previous allowance.
    ///
    /// # Errors
    ///
    /// Returns [`BasketError::InvalidSpender`] for the null address.
    pub fn approve(
        &self,
        caller: &Address,
        spender: Address,
        quantity: Quantity,
    ) -> Result<(), BasketError> {
        if spender.is_zero() {
            return Err(BasketError::InvalidSpender);
        }
        self.shares
            .write()
            .allowances
            .insert((*caller, spender), quantity);
        tracing::debug!(owner = %caller, %spender, quantity, "allowance set");
        Ok(())
    }

    /// Remaining shares `spender` may move on behalf of `owner`.
    pub fn allowance(&self, owner: &Address, spender: &Address) -> Quantity {
        self.shares.read().allowance(owner, spender)
    }

    /// Moves `quantity` of `from`'s shares to `to`, spending the caller's
    /// allowance.
    pub fn transfer_shares_from(
        &self,
        caller: &Address,
        from: Address,
        to: Address,
        quantity: Quantity,
    ) -> Result<(), BasketError> {
        let mut shares = self.shares.write();
        let available = shares.allowance(&from, caller);
        if available < quantity {
            return Err(BasketError::InsufficientAllowance {
                owner: from,
                spender: *caller,
                available,
                requested: quantity,
            });
        }

        shares.move_shares(from, to, quantity)?;
        shares
            .allowances
            .insert((from, *caller), available - quantity);
        tracing::debug!(spender = %caller, %from, %to, quantity, "shares transferred");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Component assets in construction order.
    pub fn list_component_assets(&self) -> Vec<Address> {
        self.components.as_slice().iter().map(|c| c.asset).collect()
    }

    /// Component units in construction order.
    pub fn list_component_units(&self) -> Vec<Quantity> {
        self.components.as_slice().iter().map(|c| c.unit).collect()
    }

    /// Returns `true` if `asset` is one of the basket's components.
    pub fn is_component(&self, asset: &Address) -> bool {
        self.components.contains(asset)
    }

    /// The validated component set.
    pub fn components(&self) -> &ComponentSet {
        &self.components
    }

    /// Minimum share multiple for issuance and redemption.
    pub fn natural_unit(&self) -> Quantity {
        self.natural_unit
    }

    /// Shares outstanding.
    pub fn total_supply(&self) -> Quantity {
        self.shares.read().total_supply
    }

    /// Shares held by `account`.
    pub fn share_balance_of(&self, account: &Address) -> Quantity {
        self.shares.read().balance(account)
    }

    /// Display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Ticker symbol.
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Share precision. Always 18.
    pub fn decimals(&self) -> u8 {
        SHARE_DECIMALS
    }

    /// The controller the factory reports right now.
    pub fn factory_controller(&self) -> Address {
        self.factory.controller()
    }

    /// Creation time.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// A serializable description of the basket.
    pub fn manifest(&self) -> BasketManifest {
        BasketManifest {
            name: self.name.clone(),
            symbol: self.symbol.clone(),
            natural_unit: self.natural_unit,
            components: self.components.as_slice().to_vec(),
            total_supply: self.total_supply(),
            created_at: self.created_at,
        }
    }

    fn ensure_controller(&self, caller: &Address) -> Result<(), BasketError> {
        let controller = self.factory.controller();
        if *caller != controller {
            tracing::warn!(%caller, %controller, "supply call rejected: caller is not controller");
            return Err(BasketError::Unauthorized { caller: *caller });
        }
        Ok(())
    }
}
