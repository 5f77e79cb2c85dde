//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}

/// Entities that belong to exactly one location.
///
/// Every read or write of such an entity is scoped by location; an entity seen
/// through the wrong location is treated as absent.
pub trait LocationScoped: Entity {
    fn location_id(&self) -> crate::LocationId;

    fn visible_to(&self, location_id: crate::LocationId) -> bool {
        self.location_id() == location_id
    }
}
