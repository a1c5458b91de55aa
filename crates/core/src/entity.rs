//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// Implemented by the ledger records (grants, completion logs, reservations)
/// so storage adapters can key them generically.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}
