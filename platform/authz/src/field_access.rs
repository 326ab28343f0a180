//! Which vendor profile fields each tier may write.
//!
//! Every tier inherits the fields of the tiers below it. Profile writes are
//! checked field by field, and a downgrade is refused while the profile still
//! holds data the target tier could not have written.

use serde_json::Value;
use thiserror::Error;

use crate::{Tier, TierLimits};

const FREE_FIELDS: &[&str] = &[
    "companyName",
    "slug",
    "description",
    "logo",
    "contactEmail",
    "contactPhone",
    "published",
    "featured",
    "partner",
];

const TIER1_FIELDS: &[&str] = &[
    "website",
    "linkedinUrl",
    "twitterUrl",
    "foundedYear",
    "certifications",
    "awards",
    "totalProjects",
    "employeeCount",
    "linkedinFollowers",
    "instagramFollowers",
    "clientSatisfactionScore",
    "repeatClientPercentage",
    "videoUrl",
    "videoThumbnail",
    "videoDuration",
    "videoTitle",
    "videoDescription",
    "caseStudies",
    "innovationHighlights",
    "teamMembers",
    "yachtProjects",
    "longDescription",
    "serviceAreas",
    "companyValues",
];

const TIER2_FIELDS: &[&str] = &[
    "locations",
    "featuredInCategory",
    "advancedAnalytics",
    "apiAccess",
    "customDomain",
];

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ProfileViolation {
    #[error("fields {} are not accessible for {tier} tier", .fields.join(", "))]
    RestrictedFields { tier: Tier, fields: Vec<String> },
    #[error("tier {tier} allows maximum {max} location(s), but {count} provided")]
    LocationLimit { tier: Tier, max: u32, count: usize },
    #[error("cannot downgrade: vendor has data in {field} which requires {requires}")]
    DowngradeBlocked { field: &'static str, requires: Tier },
}

/// Fields first unlocked at `tier`, without the inherited ones.
pub fn fields_unlocked_at(tier: Tier) -> &'static [&'static str] {
    match tier {
        Tier::Free => FREE_FIELDS,
        Tier::Tier1 => TIER1_FIELDS,
        Tier::Tier2 => TIER2_FIELDS,
    }
}

/// Lowest tier that may write `field`; `None` for fields no tier unlocks.
pub fn required_tier(field: &str) -> Option<Tier> {
    Tier::ORDER
        .into_iter()
        .find(|tier| fields_unlocked_at(*tier).iter().any(|known| *known == field))
}

pub fn validate_field_access(tier: Tier, field: &str) -> bool {
    required_tier(field).is_some_and(|required| tier.satisfies(required))
}

/// Every field `tier` may write, lowest tier first.
pub fn accessible_fields(tier: Tier) -> impl Iterator<Item = &'static str> {
    Tier::ORDER
        .into_iter()
        .filter(move |unlocked| tier.satisfies(*unlocked))
        .flat_map(|unlocked| fields_unlocked_at(unlocked).iter().copied())
}

/// Collects every field in `fields` that `tier` may not write.
pub fn validate_fields_access<'a>(
    tier: Tier,
    fields: impl IntoIterator<Item = &'a str>,
) -> Result<(), ProfileViolation> {
    let restricted: Vec<String> = fields
        .into_iter()
        .filter(|field| !validate_field_access(tier, field))
        .map(str::to_string)
        .collect();
    if restricted.is_empty() {
        Ok(())
    } else {
        Err(ProfileViolation::RestrictedFields {
            tier,
            fields: restricted,
        })
    }
}

pub fn validate_location_limit(tier: Tier, count: usize) -> Result<(), ProfileViolation> {
    let max = TierLimits::for_tier(tier).max_locations;
    if count > max as usize {
        Err(ProfileViolation::LocationLimit { tier, max, count })
    } else {
        Ok(())
    }
}

/// Checks a profile update submitted by a vendor on `tier`: every key must be
/// writable and a `locations` array must fit the tier's quota.
pub fn validate_profile_update(tier: Tier, update: &Value) -> Result<(), Vec<ProfileViolation>> {
    let mut errors = Vec::new();
    if let Some(object) = update.as_object() {
        if let Err(err) = validate_fields_access(tier, object.keys().map(String::as_str)) {
            errors.push(err);
        }
    }
    if let Some(Value::Array(locations)) = update.get("locations") {
        if let Err(err) = validate_location_limit(tier, locations.len()) {
            errors.push(err);
        }
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Checks that `profile` still fits after moving from `current` to `target`.
/// Upgrades and lateral moves always pass.
pub fn validate_tier_change(
    current: Tier,
    target: Tier,
    profile: &Value,
) -> Result<(), Vec<ProfileViolation>> {
    if target >= current {
        return Ok(());
    }

    let mut errors: Vec<ProfileViolation> = accessible_fields(current)
        .filter(|field| !validate_field_access(target, field))
        .filter(|field| profile.get(*field).is_some_and(holds_data))
        .map(|field| ProfileViolation::DowngradeBlocked {
            field,
            requires: current,
        })
        .collect();

    if let Some(Value::Array(locations)) = profile.get("locations") {
        if let Err(err) = validate_location_limit(target, locations.len()) {
            errors.push(err);
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

// Only non-empty strings, arrays and objects count as data to lose.
fn holds_data(value: &Value) -> bool {
    match value {
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        Value::Null | Value::Bool(_) | Value::Number(_) => false,
    }
}
