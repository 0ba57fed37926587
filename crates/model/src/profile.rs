use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{GeoPoint, UnknownStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileRole {
    Buyer,
    Pharmacy,
    Wholesaler,
    Rider,
    Admin,
}

impl ProfileRole {
    pub const fn as_str(self) -> &'static str {
        match self {
            ProfileRole::Buyer => "buyer",
            ProfileRole::Pharmacy => "pharmacy",
            ProfileRole::Wholesaler => "wholesaler",
            ProfileRole::Rider => "rider",
            ProfileRole::Admin => "admin",
        }
    }

    /// Pharmacies and wholesalers both fulfil orders.
    pub const fn is_seller(self) -> bool {
        matches!(self, ProfileRole::Pharmacy | ProfileRole::Wholesaler)
    }
}

impl fmt::Display for ProfileRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProfileRole {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "buyer" | "customer" => Ok(ProfileRole::Buyer),
            "pharmacy" => Ok(ProfileRole::Pharmacy),
            "wholesaler" => Ok(ProfileRole::Wholesaler),
            "rider" => Ok(ProfileRole::Rider),
            "admin" => Ok(ProfileRole::Admin),
            other => Err(UnknownStatus {
                kind: "role",
                value: other.to_string(),
            }),
        }
    }
}

/// Identity record resolved through the profile directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub email: String,
    pub display_name: String,
    pub role: ProfileRole,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub location: Option<GeoPoint>,
}
