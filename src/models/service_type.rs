//! Catalog of billable AI operations
//!
//! The set is fixed at deploy time; only the HTTP boundary parses
//! untrusted strings into a [`ServiceType`].

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Billable AI operation kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceType {
    RemoveBackground,
    EnlargeImage,
    ImageFilter,
}

/// Display data and default price for a [`ServiceType`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceDescriptor {
    pub display_name: &'static str,
    pub default_credits: i32,
}

impl ServiceType {
    pub const ALL: [ServiceType; 3] = [
        ServiceType::RemoveBackground,
        ServiceType::EnlargeImage,
        ServiceType::ImageFilter,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RemoveBackground => "remove_background",
            Self::EnlargeImage => "enlarge_image",
            Self::ImageFilter => "image_filter",
        }
    }

    pub fn describe(self) -> ServiceDescriptor {
        match self {
            Self::RemoveBackground => ServiceDescriptor {
                display_name: "AI Background Removal",
                default_credits: 1,
            },
            Self::EnlargeImage => ServiceDescriptor {
                display_name: "AI Image Enlargement",
                default_credits: 2,
            },
            Self::ImageFilter => ServiceDescriptor {
                display_name: "AI Image Filter",
                default_credits: 1,
            },
        }
    }

    pub fn display_name(self) -> &'static str {
        self.describe().display_name
    }

    pub fn default_credits(self) -> i32 {
        self.describe().default_credits
    }

    /// Membership test for an untrusted wire name
    ///
    /// Public helper for callers that only need a yes/no answer. The request
    /// path needs the variant itself, so it parses through [`FromStr`] which
    /// accepts exactly the same set.
    pub fn is_valid(kind: &str) -> bool {
        kind.parse::<ServiceType>().is_ok()
    }

    /// Wire names of every service type, in catalog order
    pub fn valid_types() -> Vec<&'static str> {
        Self::ALL.iter().map(ServiceType::as_str).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown service type: {0}")]
pub struct UnknownServiceType(pub String);

impl FromStr for ServiceType {
    type Err = UnknownServiceType;

    // Exact match only: wire names are case-sensitive
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownServiceType(s.to_string()))
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
