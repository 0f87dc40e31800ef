//! In-memory registry: one named collection of codes.

use std::collections::BTreeMap;

use super::code::Code;
use super::registry_type::RegistryType;

/// A code registry held in memory.
///
/// Codes keep their insertion order; persistence sorts by value. Lookups go
/// through a case-folded index, so two values differing only in case name the
/// same code and the first one seen wins.
#[derive(Debug, Clone)]
pub struct Registry {
    registry_type: RegistryType,
    label: String,
    codes: Vec<Code>,
    /// Lower-cased value -> position in `codes`.
    index: BTreeMap<String, usize>,
    /// Unmodelled document-level elements, verbatim.
    extensions: Vec<String>,
}

impl Registry {
    /// Create an empty registry with the type's default label.
    pub fn new(registry_type: RegistryType) -> Self {
        Self::with_codes(registry_type, registry_type.label(), Vec::new())
    }

    /// Build a registry from loaded parts.
    ///
    /// If `codes` holds values that collide case-insensitively, every copy is
    /// kept but lookups resolve to the first.
    pub fn with_codes(registry_type: RegistryType, label: impl Into<String>, codes: Vec<Code>) -> Self {
        let mut registry = Self {
            registry_type,
            label: label.into(),
            codes,
            index: BTreeMap::new(),
            extensions: Vec::new(),
        };
        registry.reindex();
        registry
    }

    fn reindex(&mut self) {
        self.index.clear();
        for (i, code) in self.codes.iter().enumerate() {
            self.index.entry(code.value.to_ascii_lowercase()).or_insert(i);
        }
    }

    /// Attach document-level elements the store does not model.
    pub fn with_extensions(mut self, extensions: Vec<String>) -> Self {
        self.extensions = extensions;
        self
    }

    /// Document-level elements the store does not model.
    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    /// Registry type.
    pub fn registry_type(&self) -> RegistryType {
        self.registry_type
    }

    /// Display label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// All codes in insertion order.
    pub fn codes(&self) -> &[Code] {
        &self.codes
    }

    /// Mutable access to all codes.
    ///
    /// Callers may change anything but `value`, which is indexed.
    pub fn codes_mut(&mut self) -> &mut [Code] {
        &mut self.codes
    }

    /// Number of codes.
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    /// True when the registry holds no codes.
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// Find a code by value, ignoring case.
    pub fn find(&self, value: &str) -> Option<&Code> {
        self.index
            .get(&value.to_ascii_lowercase())
            .map(|&i| &self.codes[i])
    }

    /// Find a code by value for mutation, ignoring case.
    pub fn find_mut(&mut self, value: &str) -> Option<&mut Code> {
        let i = *self.index.get(&value.to_ascii_lowercase())?;
        Some(&mut self.codes[i])
    }

    /// True when a code with this value exists.
    pub fn contains(&self, value: &str) -> bool {
        self.index.contains_key(&value.to_ascii_lowercase())
    }

    /// Find the code with this value or append a new one.
    ///
    /// Returns the code and whether it was just created.
    pub fn get_or_create(&mut self, value: &str) -> (&mut Code, bool) {
        let key = value.to_ascii_lowercase();
        if let Some(&i) = self.index.get(&key) {
            return (&mut self.codes[i], false);
        }
        let i = self.codes.len();
        self.codes.push(Code::new(value));
        self.index.insert(key, i);
        (&mut self.codes[i], true)
    }

    /// Codes sorted by value, the persisted order.
    pub fn sorted_codes(&self) -> Vec<&Code> {
        let mut codes: Vec<&Code> = self.codes.iter().collect();
        codes.sort_by(|a, b| a.value.cmp(&b.value));
        codes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_or_create_is_case_insensitive() {
        let mut registry = Registry::new(RegistryType::Mvx);
        let (_, created) = registry.get_or_create("PFR");
        assert!(created);
        let (code, created) = registry.get_or_create("pfr");
        assert!(!created);
        assert_eq!(code.value, "PFR");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_first_seen_wins_on_load() {
        let codes = vec![Code::new("abc"), Code::new("ABC")];
        let mut registry = Registry::with_codes(RegistryType::Cvx, "CVX", codes);
        registry.find_mut("Abc").unwrap().label = Some("first".to_string());
        assert_eq!(registry.codes()[0].label.as_deref(), Some("first"));
        assert_eq!(registry.codes()[1].label, None);
    }

    #[test]
    fn test_sorted_codes() {
        let mut registry = Registry::new(RegistryType::Cvx);
        for v in ["88", "03", "208", "10"] {
            registry.get_or_create(v);
        }
        let values: Vec<_> = registry.sorted_codes().iter().map(|c| c.value.as_str()).collect();
        assert_eq!(values, vec!["03", "10", "208", "88"]);
        // insertion order untouched
        assert_eq!(registry.codes()[0].value, "88");
    }

    #[test]
    fn test_new_uses_default_label() {
        let registry = Registry::new(RegistryType::NdcUnitOfSale);
        assert_eq!(registry.label(), "Vaccination NDC for Unit-of-Sale");
        assert!(registry.is_empty());
    }
}
