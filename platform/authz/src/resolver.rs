use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::{AccessContext, StoreError, Tier, is_admin, is_vendor};

/// An access decision that may need to consult the vendor store.
///
/// `Ok(false)` is a denial. `Err` is reserved for store failures, which are
/// passed through untouched so the caller can turn them into a 5xx.
#[async_trait]
pub trait AccessRule: Send + Sync {
    async fn evaluate(&self, ctx: &AccessContext<'_>) -> Result<bool, StoreError>;
}

/// Checks the acting vendor's own subscription against a minimum tier.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HasTierAccess {
    minimum: Tier,
}

pub fn has_tier_access(minimum: Tier) -> HasTierAccess {
    HasTierAccess { minimum }
}

impl HasTierAccess {
    pub fn minimum(&self) -> Tier {
        self.minimum
    }
}

#[async_trait]
impl AccessRule for HasTierAccess {
    #[instrument(name = "authz.has_tier_access", skip_all, fields(minimum = %self.minimum))]
    async fn evaluate(&self, ctx: &AccessContext<'_>) -> Result<bool, StoreError> {
        if is_admin(ctx) {
            debug!("admin bypass");
            return Ok(true);
        }
        if !is_vendor(ctx) {
            debug!("not a vendor");
            return Ok(false);
        }
        let Some(user_id) = ctx.actor().and_then(|actor| actor.id.as_deref()) else {
            debug!("vendor without id");
            return Ok(false);
        };
        let store = ctx.store().ok_or(StoreError::Unconfigured)?;
        let records = store.find_by_user(user_id).await?;
        let Some(record) = records.first() else {
            debug!(user_id, "no vendor record");
            return Ok(false);
        };
        let allowed = record.tier.satisfies(self.minimum);
        debug!(user_id, tier = %record.tier, allowed, "vendor tier compared");
        Ok(allowed)
    }
}

/// Checks the tier tag carried by the payload under evaluation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CanAccessTierField {
    minimum: Tier,
}

pub fn can_access_tier_field(minimum: Tier) -> CanAccessTierField {
    CanAccessTierField { minimum }
}

impl CanAccessTierField {
    pub fn minimum(&self) -> Tier {
        self.minimum
    }

    /// Same decision as [`AccessRule::evaluate`]; this rule never touches
    /// the store so it can not fail.
    pub fn check(&self, ctx: &AccessContext<'_>) -> bool {
        if is_admin(ctx) {
            return true;
        }
        if !is_vendor(ctx) {
            return false;
        }
        match data_tier(ctx.data()) {
            Some(tier) => tier.satisfies(self.minimum),
            None => false,
        }
    }
}

#[async_trait]
impl AccessRule for CanAccessTierField {
    #[instrument(name = "authz.can_access_tier_field", skip_all, fields(minimum = %self.minimum))]
    async fn evaluate(&self, ctx: &AccessContext<'_>) -> Result<bool, StoreError> {
        let allowed = self.check(ctx);
        debug!(allowed, "field tier compared");
        Ok(allowed)
    }
}

/// Tier tag on the payload. Absent data, a missing, `null` or empty tag all
/// mean `free`; a tag that is not a known tier yields `None`.
fn data_tier(data: Option<&Value>) -> Option<Tier> {
    match data.and_then(|value| value.get("tier")) {
        None | Some(Value::Null) => Some(Tier::Free),
        Some(Value::String(raw)) if raw.is_empty() => Some(Tier::Free),
        Some(Value::String(raw)) => raw.parse().ok(),
        Some(_) => None,
    }
}
