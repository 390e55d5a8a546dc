// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Basket Protocol — Shared Primitives
//!
//! Everything the accounting contracts need to agree on without depending
//! on each other: identifiers, quantities, protocol constants, and the
//! interfaces of the external collaborators the contracts call out to.
//!
//! ## Modules
//!
//! - **address** — Opaque 20-byte identifiers and the `Quantity` type.
//! - **asset** — The underlying asset interface plus an in-memory reference
//!   asset that can be told to misbehave.
//! - **access** — Authorization and controller-resolution interfaces.
//! - **config** — Protocol constants.
//! - **logging** — `tracing` subscriber setup for embedding applications.
//!
//! ## Design Philosophy
//!
//! 1. Quantities are integers. The core never divides, never prices.
//! 2. Collaborators are traits, injected as `Arc<dyn ...>`, so tests can
//!    swap in doubles.
//! 3. Nothing external is trusted to do what it says.

pub mod access;
pub mod address;
pub mod asset;
pub mod config;
pub mod logging;

pub use access::{AuthorizedCallers, Authorizer, ControllerSource, FixedController};
pub use address::{Address, AddressError, Quantity};
pub use asset::{Asset, AssetError, DecimalsBehavior, LedgerAsset, TransferBehavior};
