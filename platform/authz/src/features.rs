//! Vendor portal features and quotas keyed by subscription tier.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{AuthzError, HasTierAccess, Tier, has_tier_access};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TierFeature {
    MultipleLocations,
    MediaGallery,
    AdvancedAnalytics,
    ApiAccess,
    CustomDomain,
    ExcelImport,
    ProductManagement,
}

impl TierFeature {
    pub const ALL: [TierFeature; 7] = [
        TierFeature::MultipleLocations,
        TierFeature::MediaGallery,
        TierFeature::AdvancedAnalytics,
        TierFeature::ApiAccess,
        TierFeature::CustomDomain,
        TierFeature::ExcelImport,
        TierFeature::ProductManagement,
    ];

    pub fn minimum_tier(self) -> Tier {
        match self {
            TierFeature::MultipleLocations | TierFeature::MediaGallery => Tier::Tier1,
            TierFeature::AdvancedAnalytics
            | TierFeature::ApiAccess
            | TierFeature::CustomDomain
            | TierFeature::ExcelImport
            | TierFeature::ProductManagement => Tier::Tier2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TierFeature::MultipleLocations => "multipleLocations",
            TierFeature::MediaGallery => "mediaGallery",
            TierFeature::AdvancedAnalytics => "advancedAnalytics",
            TierFeature::ApiAccess => "apiAccess",
            TierFeature::CustomDomain => "customDomain",
            TierFeature::ExcelImport => "excelImport",
            TierFeature::ProductManagement => "productManagement",
        }
    }

    /// Features unlocked by `tier`, in declaration order.
    pub fn available_for(tier: Tier) -> impl Iterator<Item = TierFeature> {
        Self::ALL
            .into_iter()
            .filter(move |feature| tier.satisfies(feature.minimum_tier()))
    }
}

impl fmt::Display for TierFeature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TierFeature {
    type Err = AuthzError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        // Older clients send the kebab-case names.
        let normalized = match value {
            "media-gallery" => "mediaGallery",
            "excel-import" => "excelImport",
            other => other,
        };
        Self::ALL
            .into_iter()
            .find(|feature| feature.as_str() == normalized)
            .ok_or_else(|| AuthzError::UnknownFeature(value.to_string()))
    }
}

/// Gate a feature on the acting vendor's own subscription.
pub fn has_feature_access(feature: TierFeature) -> HasTierAccess {
    has_tier_access(feature.minimum_tier())
}

/// Per-tier quotas enforced by the vendor portal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TierLimits {
    pub max_locations: u32,
    pub max_products: u32,
    pub max_media: u32,
}

impl TierLimits {
    pub fn for_tier(tier: Tier) -> Self {
        match tier {
            Tier::Free => Self {
                max_locations: 1,
                max_products: 3,
                max_media: 5,
            },
            Tier::Tier1 => Self {
                max_locations: 3,
                max_products: 10,
                max_media: 20,
            },
            Tier::Tier2 => Self {
                max_locations: 10,
                max_products: 25,
                max_media: 50,
            },
        }
    }

    pub fn can_add_location(&self, current: u32) -> bool {
        current < self.max_locations
    }

    pub fn can_add_product(&self, current: u32) -> bool {
        current < self.max_products
    }

    pub fn can_add_media(&self, current: u32) -> bool {
        current < self.max_media
    }
}
