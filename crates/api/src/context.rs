use stockledger_auth::ActingIdentity;
use stockledger_core::{ActorId, LocationId};

/// Acting identity for a request, taken from the bearer token.
///
/// Immutable and present on every protected route. Handlers pass both ids to
/// the services explicitly; nothing reads them from ambient state.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RequestContext {
    identity: ActingIdentity,
}

impl RequestContext {
    pub fn new(identity: ActingIdentity) -> Self {
        Self { identity }
    }

    pub fn actor_id(&self) -> ActorId {
        self.identity.actor_id
    }

    pub fn location_id(&self) -> LocationId {
        self.identity.location_id
    }

    pub fn identity(&self) -> ActingIdentity {
        self.identity
    }
}
