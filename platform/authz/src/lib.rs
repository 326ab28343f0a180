//! Authorization primitives for the vendor directory.
//!
//! Access decisions are made from three pieces: the [`Tier`] ordinal, the
//! role predicates over an [`AccessContext`], and the resolvers that combine
//! them (optionally consulting a [`VendorStore`]). Denial is always a plain
//! `false`; only a failing store surfaces as an error.

mod actor;
mod error;
pub mod features;
pub mod field_access;
mod resolver;
mod store;
mod tier;
pub mod tier_change;

pub use actor::{
    AccessContext, Actor, Role, is_admin, is_admin_or_self, is_authenticated, is_vendor,
};
pub use error::{AuthzError, StoreError};
pub use features::{TierFeature, TierLimits, has_feature_access};
pub use field_access::ProfileViolation;
pub use resolver::{
    AccessRule, CanAccessTierField, HasTierAccess, can_access_tier_field, has_tier_access,
};
pub use store::{InMemoryVendorStore, VendorRecord, VendorStore};
pub use tier::Tier;
