//! # Authorization Collaborators
//!
//! Two privileged gates guard the accounting core:
//!
//! - **Ledger mutations** ask an [`Authorizer`] whether the caller is
//!   currently allowed in. How grants and revocations are scheduled (time
//!   locks, governance votes) is the authorizer's business, not the vault's.
//! - **Basket supply mutations** compare the caller against the identity a
//!   [`ControllerSource`] reports *at call time*. The answer is never cached,
//!   so reassigning the controller takes effect on the very next call.
//!
//! [`AuthorizedCallers`] and [`FixedController`] are minimal in-memory
//! implementations with immediate effect, used by simulations and tests.

use std::collections::HashSet;

use parking_lot::RwLock;

use crate::address::Address;

/// Decides whether a caller may invoke privileged ledger operations.
pub trait Authorizer: Send + Sync {
    /// Returns `true` if `caller` is authorized right now.
    fn is_authorized(&self, caller: &Address) -> bool;
}

/// Resolves the single identity allowed to mint and burn basket shares.
pub trait ControllerSource: Send + Sync {
    /// The current controller.
    fn controller(&self) -> Address;
}

// ---------------------------------------------------------------------------
// AuthorizedCallers
// ---------------------------------------------------------------------------

/// A set of authorized callers with immediate grant and revoke.
#[derive(Debug, Default)]
pub struct AuthorizedCallers {
    callers: RwLock<HashSet<Address>>,
}

impl AuthorizedCallers {
    /// Creates an empty set. Nobody is authorized.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a set pre-populated with `callers`.
    pub fn with_callers(callers: impl IntoIterator<Item = Address>) -> Self {
        Self {
            callers: RwLock::new(callers.into_iter().collect()),
        }
    }

    /// Authorizes `caller`. Returns `false` if it was already authorized.
    pub fn grant(&self, caller: Address) -> bool {
        let added = self.callers.write().insert(caller);
        if added {
            tracing::info!(%caller, "authorization granted");
        }
        added
    }

    /// Revokes `caller`. Returns `false` if it was not authorized.
    pub fn revoke(&self, caller: &Address) -> bool {
        let removed = self.callers.write().remove(caller);
        if removed {
            tracing::info!(%caller, "authorization revoked");
        }
        removed
    }

    /// Number of authorized callers.
    pub fn len(&self) -> usize {
        self.callers.read().len()
    }

    /// Returns `true` if nobody is authorized.
    pub fn is_empty(&self) -> bool {
        self.callers.read().is_empty()
    }
}

impl Authorizer for AuthorizedCallers {
    fn is_authorized(&self, caller: &Address) -> bool {
        self.callers.read().contains(caller)
    }
}

// ---------------------------------------------------------------------------
// FixedController
// ---------------------------------------------------------------------------

/// A factory stand-in reporting a single, reassignable controller.
#[derive(Debug)]
pub struct FixedController {
    controller: RwLock<Address>,
}

impl FixedController {
    /// Creates a source reporting `controller`.
    pub fn new(controller: Address) -> Self {
        Self {
            controller: RwLock::new(controller),
        }
    }

    /// Hands control to `controller`. Returns the previous controller.
    pub fn reassign(&self, controller: Address) -> Address {
        let previous = std::mem::replace(&mut *self.controller.write(), controller);
        tracing::info!(%previous, %controller, "controller reassigned");
        previous
    }
}

impl ControllerSource for FixedController {
    fn controller(&self) -> Address {
        *self.controller.read()
    }
}
