use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{AuthzError, VendorStore};

/// Role carried by an authenticated principal.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Role {
    Admin,
    Vendor,
    /// Any role issued upstream that this crate grants nothing to.
    Other(String),
}

impl Role {
    pub fn as_str(&self) -> &str {
        match self {
            Role::Admin => "admin",
            Role::Vendor => "vendor",
            Role::Other(raw) => raw,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AuthzError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "" => Err(AuthzError::UnknownRole(value.to_string())),
            "admin" => Ok(Role::Admin),
            "vendor" => Ok(Role::Vendor),
            other => Ok(Role::Other(other.to_string())),
        }
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.as_str().to_string()
    }
}

impl TryFrom<String> for Role {
    type Error = AuthzError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Authenticated principal attached to a request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: Option<String>,
    pub role: Role,
}

impl Actor {
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self {
            id: Some(id.into()),
            role,
        }
    }

    pub fn admin(id: impl Into<String>) -> Self {
        Self::new(id, Role::Admin)
    }

    pub fn vendor(id: impl Into<String>) -> Self {
        Self::new(id, Role::Vendor)
    }
}

/// Everything a single access decision may look at.
///
/// Built per request and never mutated; resolvers only borrow it.
#[derive(Clone, Copy, Default)]
pub struct AccessContext<'a> {
    actor: Option<&'a Actor>,
    data: Option<&'a Value>,
    store: Option<&'a dyn VendorStore>,
}

impl<'a> AccessContext<'a> {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn new(actor: Option<&'a Actor>) -> Self {
        Self {
            actor,
            ..Self::default()
        }
    }

    pub fn for_actor(actor: &'a Actor) -> Self {
        Self::new(Some(actor))
    }

    pub fn with_data(mut self, data: &'a Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_store(mut self, store: &'a dyn VendorStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn actor(&self) -> Option<&'a Actor> {
        self.actor
    }

    pub fn data(&self) -> Option<&'a Value> {
        self.data
    }

    pub fn store(&self) -> Option<&'a dyn VendorStore> {
        self.store
    }
}

impl fmt::Debug for AccessContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessContext")
            .field("actor", &self.actor)
            .field("data", &self.data)
            .field("store", &self.store.is_some())
            .finish()
    }
}

pub fn is_admin(ctx: &AccessContext<'_>) -> bool {
    matches!(ctx.actor, Some(Actor { role: Role::Admin, .. }))
}

pub fn is_vendor(ctx: &AccessContext<'_>) -> bool {
    matches!(ctx.actor, Some(Actor { role: Role::Vendor, .. }))
}

pub fn is_authenticated(ctx: &AccessContext<'_>) -> bool {
    ctx.actor.is_some()
}

/// Admins may touch any record; everyone else only the record keyed by
/// their own id. An actor without an id never matches, not even a missing
/// target.
pub fn is_admin_or_self(ctx: &AccessContext<'_>, target_id: Option<&str>) -> bool {
    if is_admin(ctx) {
        return true;
    }
    match (ctx.actor.and_then(|actor| actor.id.as_deref()), target_id) {
        (Some(actor_id), Some(target)) => actor_id == target,
        _ => false,
    }
}
