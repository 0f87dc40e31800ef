//! Code records.

use serde::{Deserialize, Serialize};

use super::link::LinkTo;
use super::registry_type::RegistryType;
use crate::text::is_blank;

/// Status written for codes that are in use.
pub const STATUS_VALID: &str = "Valid";
/// Status written for historical aliases of a code.
pub const STATUS_DEPRECATED: &str = "Deprecated";

/// Deprecation block: when a code stopped being the preferred form and what
/// replaced it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deprecation {
    /// Effective date, `yyyyMMdd`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effective_date: Option<String>,
    /// Value of the replacement code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_code_value: Option<String>,
    /// Human readable reason.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Status of a code plus its optional deprecation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeStatus {
    /// Status label ("Valid", "Deprecated", "Pending", ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Deprecation details.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deprecated: Option<Deprecation>,
}

impl CodeStatus {
    /// True when neither a status nor a deprecation is recorded.
    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.deprecated.is_none()
    }
}

/// Validity window of a code. Every bound is an 8-digit `yyyyMMdd` string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UseDate {
    /// First date the code may be used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_before: Option<String>,
    /// Last date the code may be used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_after: Option<String>,
    /// Date after which use of the code should raise a warning.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_expected_after: Option<String>,
}

impl UseDate {
    /// True when no bound is set.
    pub fn is_empty(&self) -> bool {
        self.not_before.is_none() && self.not_after.is_none() && self.not_expected_after.is_none()
    }
}

/// Outbound links of a code.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    /// Links, in insertion order.
    #[serde(rename = "linkTo", default)]
    pub link_to: Vec<LinkTo>,
}

impl Reference {
    /// True when there are no links.
    pub fn is_empty(&self) -> bool {
        self.link_to.is_empty()
    }
}

/// One entry of a registry.
///
/// `value` is the identity; it is unique within its registry, compared
/// case-insensitively. Field order is the persisted element order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Code {
    /// Short display label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Identifying value.
    pub value: String,
    /// Long description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Classification tag ("vaccine", "pending", ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concept_type: Option<String>,
    /// Status and deprecation.
    #[serde(default, skip_serializing_if = "CodeStatus::is_empty")]
    pub code_status: CodeStatus,
    /// Validity window.
    #[serde(default, skip_serializing_if = "UseDate::is_empty")]
    pub use_date: UseDate,
    /// Cross-registry links.
    #[serde(default, skip_serializing_if = "Reference::is_empty")]
    pub reference: Reference,
    /// Child elements outside this model, as verbatim XML in document order.
    /// The file store lifts them out on load and writes them back on save.
    #[serde(skip)]
    pub extensions: Vec<String>,
}

impl Code {
    /// Create an empty code with the given value.
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            ..Self::default()
        }
    }

    /// Current status, if any.
    pub fn status(&self) -> Option<&str> {
        self.code_status.status.as_deref()
    }

    /// True when a deprecation block is present.
    pub fn is_deprecated(&self) -> bool {
        self.code_status.deprecated.is_some()
    }

    /// True when the code has no `notAfter` bound and is not deprecated.
    pub fn is_active(&self) -> bool {
        is_blank(self.use_date.not_after.as_deref()) && !self.is_deprecated()
    }

    /// Outbound links.
    pub fn links(&self) -> &[LinkTo] {
        &self.reference.link_to
    }

    /// True when a link to `(target, value)` is already present.
    pub fn has_link(&self, target: RegistryType, value: &str) -> bool {
        self.links().iter().any(|l| l.points_to(target, value))
    }

    /// Add a link to `(target, value)` unless it is already present.
    ///
    /// Returns `true` when the link was added. Blank values are never linked.
    pub fn ensure_link(&mut self, target: RegistryType, value: &str) -> bool {
        if value.trim().is_empty() || self.has_link(target, value) {
            return false;
        }
        self.reference.link_to.push(LinkTo::new(target, value));
        true
    }

    /// Mutable access to the outbound links.
    pub fn links_mut(&mut self) -> &mut Vec<LinkTo> {
        &mut self.reference.link_to
    }
}

/// Set `slot` to `incoming` when the slot is blank and `incoming` is not.
///
/// Returns `true` when the slot changed. This is the fill-if-empty rule used
/// for every merged attribute.
pub fn fill_if_empty(slot: &mut Option<String>, incoming: &str) -> bool {
    if is_blank(slot.as_deref()) && !incoming.trim().is_empty() {
        *slot = Some(incoming.to_string());
        true
    } else {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_link_is_idempotent() {
        let mut code = Code::new("208");
        assert!(code.ensure_link(RegistryType::VaccineGroup, "COVID-19"));
        assert!(!code.ensure_link(RegistryType::VaccineGroup, "COVID-19"));
        assert!(!code.ensure_link(RegistryType::VaccineGroup, "covid-19"));
        assert!(code.ensure_link(RegistryType::TradeName, "COVID-19"));
        assert_eq!(code.links().len(), 2);
    }

    #[test]
    fn test_ensure_link_rejects_blank_value() {
        let mut code = Code::new("208");
        assert!(!code.ensure_link(RegistryType::Cvx, ""));
        assert!(!code.ensure_link(RegistryType::Cvx, "  "));
        assert!(code.links().is_empty());
    }

    #[test]
    fn test_fill_if_empty() {
        let mut slot = None;
        assert!(!fill_if_empty(&mut slot, ""));
        assert_eq!(slot, None);
        assert!(fill_if_empty(&mut slot, "first"));
        assert!(!fill_if_empty(&mut slot, "second"));
        assert_eq!(slot.as_deref(), Some("first"));

        let mut blank = Some("  ".to_string());
        assert!(fill_if_empty(&mut blank, "filled"));
        assert_eq!(blank.as_deref(), Some("filled"));
    }

    #[test]
    fn test_is_active() {
        let mut code = Code::new("1234-5678-90");
        assert!(code.is_active());
        code.use_date.not_after = Some("20250101".to_string());
        assert!(!code.is_active());

        let mut alias = Code::new("1234567890");
        alias.code_status.deprecated = Some(Deprecation::default());
        assert!(!alias.is_active());
    }
}
