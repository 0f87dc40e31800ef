//! Fact merger: fold one source fact into a registry.
//!
//! ## Merge Policy
//!
//! Every attribute is fill-if-empty: an attribute is written only when the
//! code's current value is blank and the incoming value is not. Curated data
//! already in a registry is never overwritten, and merging the same fact a
//! second time changes nothing.
//!
//! The one compound attribute is the description. When the description is
//! filled by a merge and the fact carries notes, the notes are appended to
//! that freshly written description as ` Notes: <notes>`. A description that
//! was already present is left alone, notes or not, so reruns never stack
//! repeated notes.

use crate::types::{fill_if_empty, Registry, RegistryType};

/// Error type for merge operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MergeError {
    /// The fact has no identifying value.
    #[error("Fact for {0} has a blank identifying value")]
    BlankValue(RegistryType),
}

/// Attributes carried by a source fact. Blank strings mean "not supplied".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FactAttributes {
    /// Display label.
    pub label: String,
    /// Long description.
    pub description: String,
    /// Supplementary notes appended to a freshly filled description.
    pub notes: String,
    /// Classification tag.
    pub concept_type: String,
    /// Status label.
    pub status: String,
}

impl FactAttributes {
    /// Attributes with only a label.
    pub fn labelled(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Self::default()
        }
    }

    /// Set the description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the notes.
    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    /// Set the concept type.
    pub fn concept_type(mut self, concept_type: impl Into<String>) -> Self {
        self.concept_type = concept_type.into();
        self
    }

    /// Set the status.
    pub fn status(mut self, status: impl Into<String>) -> Self {
        self.status = status.into();
        self
    }
}

/// Result of merging one fact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Value of the code the fact landed on, as stored in the registry.
    pub value: String,
    /// The code did not exist before this merge.
    pub created: bool,
    /// Any attribute of the code changed (always true when created).
    pub changed: bool,
}

/// Running counters for one registry during an update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct MergeTally {
    /// Codes created.
    pub added: usize,
    /// Existing codes that changed.
    pub updated: usize,
    /// Codes given an expiry window.
    pub expired: usize,
    /// Codes in the registry afterwards.
    pub total: usize,
}

impl MergeTally {
    /// Count one merge outcome.
    pub fn record(&mut self, outcome: &MergeOutcome) {
        self.record_change(outcome.created, outcome.changed);
    }

    /// Count a code that was created or changed by something other than
    /// [`merge_fact`].
    pub fn record_change(&mut self, created: bool, changed: bool) {
        if created {
            self.added += 1;
        } else if changed {
            self.updated += 1;
        }
    }

    /// True when any code was created, changed or expired.
    pub fn changed(&self) -> bool {
        self.added > 0 || self.updated > 0 || self.expired > 0
    }
}

/// Merge a fact keyed by `value` into `registry`.
///
/// Finds the code case-insensitively or appends a new one, then fills blank
/// attributes from `attributes`.
pub fn merge_fact(
    registry: &mut Registry,
    value: &str,
    attributes: &FactAttributes,
) -> Result<MergeOutcome, MergeError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(MergeError::BlankValue(registry.registry_type()));
    }

    let (code, created) = registry.get_or_create(value);
    let mut changed = created;

    changed |= fill_if_empty(&mut code.label, &attributes.label);

    let notes = attributes.notes.trim();
    let description = if notes.is_empty() {
        attributes.description.clone()
    } else if attributes.description.trim().is_empty() {
        format!("Notes: {}", notes)
    } else {
        format!("{} Notes: {}", attributes.description, notes)
    };
    changed |= fill_if_empty(&mut code.description, &description);

    changed |= fill_if_empty(&mut code.concept_type, &attributes.concept_type);
    changed |= fill_if_empty(&mut code.code_status.status, &attributes.status);

    Ok(MergeOutcome {
        value: code.value.clone(),
        created,
        changed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::STATUS_VALID;

    fn cvx_fact() -> FactAttributes {
        FactAttributes::labelled("COVID-19 mRNA")
            .description("SARS-COV-2 (COVID-19) vaccine, mRNA")
            .notes("EUA 12/11/2020")
            .concept_type("vaccine")
            .status(STATUS_VALID)
    }

    #[test]
    fn test_merge_creates_and_fills() {
        let mut registry = Registry::new(RegistryType::Cvx);
        let outcome = merge_fact(&mut registry, "208", &cvx_fact()).unwrap();

        assert!(outcome.created);
        assert!(outcome.changed);
        let code = registry.find("208").unwrap();
        assert_eq!(code.label.as_deref(), Some("COVID-19 mRNA"));
        assert_eq!(
            code.description.as_deref(),
            Some("SARS-COV-2 (COVID-19) vaccine, mRNA Notes: EUA 12/11/2020")
        );
        assert_eq!(code.concept_type.as_deref(), Some("vaccine"));
        assert_eq!(code.status(), Some("Valid"));
    }

    #[test]
    fn test_merge_is_idempotent() {
        let mut registry = Registry::new(RegistryType::Cvx);
        merge_fact(&mut registry, "208", &cvx_fact()).unwrap();
        let before = registry.find("208").cloned();

        let outcome = merge_fact(&mut registry, "208", &cvx_fact()).unwrap();

        assert!(!outcome.created);
        assert!(!outcome.changed);
        assert_eq!(registry.find("208").cloned(), before);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_merge_never_overwrites_curated_fields() {
        let mut registry = Registry::new(RegistryType::Mvx);
        {
            let (code, _) = registry.get_or_create("PFR");
            code.label = Some("Pfizer (curated)".to_string());
            code.description = Some("hand written".to_string());
        }
        let outcome = merge_fact(
            &mut registry,
            "pfr",
            &FactAttributes::labelled("Pfizer, Inc").description("from feed").notes("n").status("Valid"),
        )
        .unwrap();

        assert!(outcome.changed); // status was blank
        assert_eq!(outcome.value, "PFR");
        let code = registry.find("PFR").unwrap();
        assert_eq!(code.label.as_deref(), Some("Pfizer (curated)"));
        assert_eq!(code.description.as_deref(), Some("hand written"));
        assert_eq!(code.status(), Some("Valid"));
    }

    #[test]
    fn test_notes_without_description() {
        let mut registry = Registry::new(RegistryType::Cvx);
        merge_fact(&mut registry, "99", &FactAttributes::default().notes("inactive")).unwrap();
        assert_eq!(
            registry.find("99").unwrap().description.as_deref(),
            Some("Notes: inactive")
        );
    }

    #[test]
    fn test_blank_attributes_leave_fields_unset() {
        let mut registry = Registry::new(RegistryType::Cpt);
        let outcome = merge_fact(&mut registry, "90707", &FactAttributes::default()).unwrap();
        assert!(outcome.created);
        let code = registry.find("90707").unwrap();
        assert_eq!(code.label, None);
        assert_eq!(code.description, None);

        let outcome = merge_fact(&mut registry, "90707", &FactAttributes::default()).unwrap();
        assert!(!outcome.changed);
    }

    #[test]
    fn test_tally_counts_created_and_updated() {
        let mut registry = Registry::new(RegistryType::Mvx);
        let mut tally = MergeTally::default();
        tally.record(&merge_fact(&mut registry, "PFR", &FactAttributes::labelled("Pfizer")).unwrap());
        tally.record(&merge_fact(&mut registry, "PFR", &FactAttributes::default().status("Valid")).unwrap());
        tally.record(&merge_fact(&mut registry, "PFR", &FactAttributes::default().status("Valid")).unwrap());

        assert_eq!(tally.added, 1);
        assert_eq!(tally.updated, 1);
        assert!(tally.changed());
        assert!(!MergeTally::default().changed());
    }

    #[test]
    fn test_blank_value_is_rejected() {
        let mut registry = Registry::new(RegistryType::Cpt);
        assert_eq!(
            merge_fact(&mut registry, "  ", &FactAttributes::default()),
            Err(MergeError::BlankValue(RegistryType::Cpt))
        );
        assert!(registry.is_empty());
    }
}
