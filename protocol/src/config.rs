//! # Protocol Constants
//!
//! Every fixed number the accounting core relies on lives here. Changing
//! any of these after baskets have been created invalidates the natural
//! unit checks those baskets were built with, so treat them as frozen.

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Length of an [`Address`](crate::Address) in bytes.
pub const ADDRESS_LENGTH: usize = 20;

/// Width of the fixed-length encoded name and symbol supplied at basket
/// construction. Shorter text is right-padded with NUL bytes.
pub const FIXED_TEXT_LENGTH: usize = 32;

// ---------------------------------------------------------------------------
// Precision
// ---------------------------------------------------------------------------

/// Decimal places of a basket share. Every basket reports 18, regardless of
/// its components.
pub const SHARE_DECIMALS: u8 = 18;

/// Seed for the running minimum precision during basket construction.
///
/// Components reporting more than 18 decimals do not raise the minimum past
/// this, so the natural-unit exponent `18 - min_decimals` never underflows.
pub const MAX_COMPONENT_DECIMALS: u8 = 18;

/// Precision assumed for a component whose `decimals` query is unsupported
/// or fails. Zero is the worst case: it demands the largest natural unit.
pub const UNKNOWN_DECIMALS: u8 = 0;

// ---------------------------------------------------------------------------
// Fees
// ---------------------------------------------------------------------------

/// Basis-point denominator used by the reference fee-on-transfer asset.
pub const BPS_DENOMINATOR: u128 = 10_000;
