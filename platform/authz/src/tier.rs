use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::AuthzError;

/// Subscription tier attached to a vendor record.
///
/// The derived ordering follows [`Tier::ORDER`]; `rank` exposes the same
/// order as an integer for callers that store or compare levels.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    #[default]
    Free,
    Tier1,
    Tier2,
}

impl Tier {
    /// Every resolvable tier, lowest first.
    pub const ORDER: [Tier; 3] = [Tier::Free, Tier::Tier1, Tier::Tier2];

    pub fn rank(self) -> u8 {
        match self {
            Tier::Free => 0,
            Tier::Tier1 => 1,
            Tier::Tier2 => 2,
        }
    }

    /// Whether this tier meets `minimum`.
    pub fn satisfies(self, minimum: Tier) -> bool {
        self.rank() >= minimum.rank()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Free => "free",
            Tier::Tier1 => "tier1",
            Tier::Tier2 => "tier2",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Tier::Free => "Free",
            Tier::Tier1 => "Professional",
            Tier::Tier2 => "Business",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = AuthzError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Tier::ORDER
            .into_iter()
            .find(|tier| tier.as_str() == value)
            .ok_or_else(|| AuthzError::UnknownTier(value.to_string()))
    }
}
