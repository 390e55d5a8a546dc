//! # Basket Accounting Contracts
//!
//! The two stateful components of the basket protocol's accounting core:
//!
//! - **Vault** — the multi-tenant ledger recording how much of each
//!   underlying asset belongs to each user or basket, with reconciled
//!   external withdrawals.
//! - **Basket Token** — a basket's immutable composition, its natural-unit
//!   precision check, and the controller-gated share supply.
//!
//! The components never call each other. An external orchestrator moves
//! assets through the vault and mints or burns shares on the basket, and
//! keeps the two consistent.
//!
//! ## Design Principles
//!
//! 1. All quantity arithmetic is checked — `checked_add` and `checked_sub`
//!    everywhere, never wrapping.
//! 2. A failed call changes nothing.
//! 3. Every privileged operation asks an injected collaborator first.
//! 4. Persistable state derives serde.

pub mod basket_token;
pub mod vault;

pub use basket_token::{
    BasketError, BasketManifest, BasketParams, BasketToken, Component, ComponentSet,
    ConstructionError,
};
pub use vault::{Vault, VaultError, VaultSnapshot};
