//! Actor identity and the authorization seam.
//!
//! The wider system resolves sessions and role claims elsewhere; the engine
//! only sees an [`Actor`] and asks an injected [`Authorizer`] whether that
//! actor may administer the program for a given organization. Role lists
//! never appear inside the state machines themselves.

use crate::model::OrgId;

/// Actor identifier, as resolved by the identity layer.
pub type ActorId = u32;

/// Role claim attached to an authenticated actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
    Backoffice,
    Salesman,
}

/// An authenticated caller of an administrative operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: ActorId,
    pub org: OrgId,
    pub role: Role,
}

impl Actor {
    pub fn new(id: ActorId, org: OrgId, role: Role) -> Self {
        Self { id, org, role }
    }
}

/// Capability check injected at the boundary of each state machine.
pub trait Authorizer: Send + Sync {
    /// May `actor` administer the loyalty program for masons of `org`?
    fn may_administer(&self, actor: &Actor, org: OrgId) -> bool;
}

/// Default policy: admins and backoffice staff, scoped to their own org.
#[derive(Debug, Default)]
pub struct RoleGate;

impl Authorizer for RoleGate {
    fn may_administer(&self, actor: &Actor, org: OrgId) -> bool {
        actor.org == org && matches!(actor.role, Role::Admin | Role::Backoffice)
    }
}
