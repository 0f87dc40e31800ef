//! Cross-registry link types.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use super::registry_type::RegistryType;

/// Outbound reference from a code to a code in another registry.
///
/// The target registry is kept as the raw tag so that links naming a
/// registry outside [`RegistryType`] survive a load/save cycle untouched.
/// Implements `Ord` for deterministic ordering: (codeset, value).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LinkTo {
    /// Tag of the target registry.
    #[serde(rename = "@codeset")]
    pub codeset: String,
    /// Value of the target code.
    #[serde(rename = "@value")]
    pub value: String,
}

impl LinkTo {
    /// Create a link to a known registry.
    pub fn new(target: RegistryType, value: impl Into<String>) -> Self {
        Self {
            codeset: target.tag().to_string(),
            value: value.into(),
        }
    }

    /// Target registry, if the tag names one of ours.
    pub fn target(&self) -> Option<RegistryType> {
        RegistryType::from_tag(&self.codeset)
    }

    /// True when this link points at `value` in `target`.
    ///
    /// Code values are case-insensitive within a registry, so the value
    /// comparison is too.
    pub fn points_to(&self, target: RegistryType, value: &str) -> bool {
        self.codeset == target.tag() && self.value.eq_ignore_ascii_case(value)
    }

    /// Key identifying the target pair, used for duplicate detection.
    pub fn key(&self) -> (String, String) {
        (self.codeset.clone(), self.value.to_ascii_lowercase())
    }
}

impl fmt::Display for LinkTo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.codeset, self.value)
    }
}

impl PartialOrd for LinkTo {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for LinkTo {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.codeset.cmp(&other.codeset) {
            Ordering::Equal => self.value.cmp(&other.value),
            ord => ord,
        }
    }
}
