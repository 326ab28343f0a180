//! Validation rules for vendor tier upgrade and downgrade requests.
//!
//! Requests arrive as loosely-typed drafts (tiers and status are raw strings
//! from the portal), so validation collects every violation instead of
//! stopping at the first one.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::Tier;

pub const MIN_VENDOR_NOTES: usize = 20;
pub const MAX_VENDOR_NOTES: usize = 500;
pub const MAX_REJECTION_REASON: usize = 1000;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestType {
    Upgrade,
    Downgrade,
}

impl RequestType {
    fn allows_target(self, tier: Tier) -> bool {
        match self {
            RequestType::Upgrade => tier != Tier::Free,
            RequestType::Downgrade => tier != Tier::Tier2,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
}

impl RequestStatus {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum TierChangeViolation {
    #[error("vendor is required")]
    MissingVendor,
    #[error("user is required")]
    MissingUser,
    #[error("requested tier is required")]
    MissingRequestedTier,
    #[error("invalid current tier value")]
    InvalidCurrentTier,
    #[error("invalid requested tier value")]
    InvalidRequestedTier,
    #[error("invalid status value")]
    InvalidStatus,
    #[error("invalid requested tier value for {0:?}")]
    InvalidTargetForType(RequestType),
    #[error("requested tier must be higher than current tier for upgrades")]
    NotAnUpgrade,
    #[error("requested tier must be lower than current tier for downgrades")]
    NotADowngrade,
    #[error("requested tier must be different from current tier")]
    SameTier,
    #[error("vendor notes must be at least {} characters when provided", MIN_VENDOR_NOTES)]
    NotesTooShort,
    #[error("vendor notes must not exceed {} characters", MAX_VENDOR_NOTES)]
    NotesTooLong,
    #[error("rejection reason must not exceed {} characters", MAX_REJECTION_REASON)]
    RejectionReasonTooLong,
    #[error("vendor already has a pending tier {0:?} request")]
    DuplicatePending(RequestType),
}

/// Draft of a tier change request as submitted by the portal.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TierChangeRequest {
    pub vendor: Option<String>,
    pub user: Option<String>,
    pub current_tier: Option<String>,
    pub requested_tier: Option<String>,
    pub request_type: Option<RequestType>,
    pub status: Option<String>,
    pub vendor_notes: Option<String>,
    pub rejection_reason: Option<String>,
}

/// Upgrade when the rank goes up, downgrade when it goes down.
pub fn detect_request_type(current: Tier, requested: Tier) -> Option<RequestType> {
    match requested.rank().cmp(&current.rank()) {
        std::cmp::Ordering::Greater => Some(RequestType::Upgrade),
        std::cmp::Ordering::Less => Some(RequestType::Downgrade),
        std::cmp::Ordering::Equal => None,
    }
}

impl TierChangeRequest {
    /// Fill `current_tier` from the vendor's record unless already set.
    pub fn with_current_tier(mut self, tier: Tier) -> Self {
        if self.current_tier.is_none() {
            self.current_tier = Some(tier.as_str().to_string());
        }
        self
    }

    pub fn validate(&self) -> Result<(), Vec<TierChangeViolation>> {
        let mut errors = Vec::new();

        if is_blank(self.vendor.as_deref()) {
            errors.push(TierChangeViolation::MissingVendor);
        }
        if is_blank(self.user.as_deref()) {
            errors.push(TierChangeViolation::MissingUser);
        }

        let current = match self.current_tier.as_deref() {
            Some(raw) => {
                let parsed = raw.parse::<Tier>().ok();
                if parsed.is_none() {
                    errors.push(TierChangeViolation::InvalidCurrentTier);
                }
                parsed
            }
            None => None,
        };

        let requested = match self.requested_tier.as_deref() {
            None | Some("") => {
                errors.push(TierChangeViolation::MissingRequestedTier);
                None
            }
            Some(raw) => {
                let parsed = raw.parse::<Tier>().ok();
                if parsed.is_none() {
                    errors.push(TierChangeViolation::InvalidRequestedTier);
                }
                parsed
            }
        };

        if let Some(raw) = self.status.as_deref() {
            if RequestStatus::parse(raw).is_none() {
                errors.push(TierChangeViolation::InvalidStatus);
            }
        }

        let kind = self.request_type.or_else(|| match (current, requested) {
            (Some(current), Some(requested)) => detect_request_type(current, requested),
            _ => None,
        });

        if let (Some(kind), Some(requested)) = (kind, requested) {
            if !kind.allows_target(requested) {
                errors.push(TierChangeViolation::InvalidTargetForType(kind));
            }
        }

        if let (Some(current), Some(requested)) = (current, requested) {
            match kind {
                Some(RequestType::Upgrade) if requested <= current => {
                    errors.push(TierChangeViolation::NotAnUpgrade);
                }
                Some(RequestType::Downgrade) if requested >= current => {
                    errors.push(TierChangeViolation::NotADowngrade);
                }
                None if requested == current => errors.push(TierChangeViolation::SameTier),
                _ => {}
            }
        }

        if let Some(notes) = self.vendor_notes.as_deref() {
            let trimmed = notes.trim().chars().count();
            if trimmed > 0 && trimmed < MIN_VENDOR_NOTES {
                errors.push(TierChangeViolation::NotesTooShort);
            }
            if notes.chars().count() > MAX_VENDOR_NOTES {
                errors.push(TierChangeViolation::NotesTooLong);
            }
        }

        if let Some(reason) = self.rejection_reason.as_deref() {
            if reason.chars().count() > MAX_REJECTION_REASON {
                errors.push(TierChangeViolation::RejectionReasonTooLong);
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

fn is_blank(value: Option<&str>) -> bool {
    value.is_none_or(|v| v.trim().is_empty())
}

/// Minimal view of an existing request used for the uniqueness check.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExistingRequest {
    pub vendor: String,
    pub status: RequestStatus,
    pub request_type: Option<RequestType>,
}

/// A vendor may have one pending upgrade and one pending downgrade at a time.
/// Requests stored without a type predate downgrades and count as upgrades.
pub fn check_unique_pending(
    vendor: &str,
    existing: &[ExistingRequest],
    kind: RequestType,
) -> Result<(), TierChangeViolation> {
    let duplicate = existing.iter().any(|req| {
        req.vendor == vendor
            && req.status == RequestStatus::Pending
            && req.request_type.unwrap_or(RequestType::Upgrade) == kind
    });
    if duplicate {
        Err(TierChangeViolation::DuplicatePending(kind))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(current: &str, requested: &str) -> TierChangeRequest {
        TierChangeRequest {
            vendor: Some("vendor-1".into()),
            user: Some("user-1".into()),
            current_tier: Some(current.into()),
            requested_tier: Some(requested.into()),
            ..TierChangeRequest::default()
        }
    }

    #[test]
    fn valid_upgrade_and_downgrade() {
        assert_eq!(draft("free", "tier1").validate(), Ok(()));
        assert_eq!(draft("tier2", "free").validate(), Ok(()));
    }

    #[test]
    fn detects_request_type_from_ranks() {
        assert_eq!(
            detect_request_type(Tier::Free, Tier::Tier2),
            Some(RequestType::Upgrade)
        );
        assert_eq!(
            detect_request_type(Tier::Tier2, Tier::Tier1),
            Some(RequestType::Downgrade)
        );
        assert_eq!(detect_request_type(Tier::Tier1, Tier::Tier1), None);
    }

    #[test]
    fn missing_fields_are_all_reported() {
        let errors = TierChangeRequest::default().validate().unwrap_err();
        assert_eq!(
            errors,
            vec![
                TierChangeViolation::MissingVendor,
                TierChangeViolation::MissingUser,
                TierChangeViolation::MissingRequestedTier,
            ]
        );
    }

    #[test]
    fn same_tier_is_rejected() {
        let errors = draft("tier1", "tier1").validate().unwrap_err();
        assert_eq!(errors, vec![TierChangeViolation::SameTier]);
    }

    #[test]
    fn explicit_type_must_match_direction() {
        let mut req = draft("tier2", "tier1");
        req.request_type = Some(RequestType::Upgrade);
        assert_eq!(
            req.validate().unwrap_err(),
            vec![TierChangeViolation::NotAnUpgrade]
        );

        let mut req = draft("free", "tier1");
        req.request_type = Some(RequestType::Downgrade);
        assert_eq!(
            req.validate().unwrap_err(),
            vec![TierChangeViolation::NotADowngrade]
        );
    }

    #[test]
    fn upgrade_to_free_is_invalid_target() {
        let mut req = draft("free", "free");
        req.request_type = Some(RequestType::Upgrade);
        assert_eq!(
            req.validate().unwrap_err(),
            vec![
                TierChangeViolation::InvalidTargetForType(RequestType::Upgrade),
                TierChangeViolation::NotAnUpgrade,
            ]
        );
    }

    #[test]
    fn unresolvable_tiers_are_invalid() {
        let errors = draft("tier2", "tier3").validate().unwrap_err();
        assert_eq!(errors, vec![TierChangeViolation::InvalidRequestedTier]);
        let errors = draft("gold", "tier1").validate().unwrap_err();
        assert_eq!(errors, vec![TierChangeViolation::InvalidCurrentTier]);
    }

    #[test]
    fn notes_and_reason_lengths() {
        let mut req = draft("free", "tier1");
        req.vendor_notes = Some("too short".into());
        assert_eq!(
            req.validate().unwrap_err(),
            vec![TierChangeViolation::NotesTooShort]
        );

        req.vendor_notes = Some("   ".into());
        assert_eq!(req.validate(), Ok(()));

        req.vendor_notes = Some("x".repeat(MAX_VENDOR_NOTES + 1));
        assert_eq!(
            req.validate().unwrap_err(),
            vec![TierChangeViolation::NotesTooLong]
        );

        req.vendor_notes = None;
        req.rejection_reason = Some("r".repeat(MAX_REJECTION_REASON + 1));
        assert_eq!(
            req.validate().unwrap_err(),
            vec![TierChangeViolation::RejectionReasonTooLong]
        );
    }

    #[test]
    fn invalid_status_is_reported() {
        let mut req = draft("free", "tier1");
        req.status = Some("archived".into());
        assert_eq!(
            req.validate().unwrap_err(),
            vec![TierChangeViolation::InvalidStatus]
        );
    }

    #[test]
    fn current_tier_is_filled_from_vendor() {
        let req = TierChangeRequest {
            vendor: Some("vendor-1".into()),
            user: Some("user-1".into()),
            requested_tier: Some("tier2".into()),
            ..TierChangeRequest::default()
        }
        .with_current_tier(Tier::Tier1);
        assert_eq!(req.current_tier.as_deref(), Some("tier1"));

        let kept = draft("free", "tier2").with_current_tier(Tier::Tier1);
        assert_eq!(kept.current_tier.as_deref(), Some("free"));
    }

    #[test]
    fn one_pending_request_per_type() {
        let existing = vec![
            ExistingRequest {
                vendor: "vendor-1".into(),
                status: RequestStatus::Pending,
                request_type: None,
            },
            ExistingRequest {
                vendor: "vendor-2".into(),
                status: RequestStatus::Pending,
                request_type: Some(RequestType::Downgrade),
            },
            ExistingRequest {
                vendor: "vendor-1".into(),
                status: RequestStatus::Rejected,
                request_type: Some(RequestType::Downgrade),
            },
        ];
        assert_eq!(
            check_unique_pending("vendor-1", &existing, RequestType::Upgrade),
            Err(TierChangeViolation::DuplicatePending(RequestType::Upgrade))
        );
        assert_eq!(
            check_unique_pending("vendor-1", &existing, RequestType::Downgrade),
            Ok(())
        );
        assert_eq!(
            check_unique_pending("vendor-3", &existing, RequestType::Upgrade),
            Ok(())
        );
    }
}
