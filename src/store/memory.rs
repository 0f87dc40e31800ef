//! In-memory registry store for testing and dry runs.

use std::collections::BTreeMap;

use crate::types::{Code, Registry, RegistryType};
use super::RegistryStore;

/// Error type for in-memory store.
#[derive(Debug, Clone, thiserror::Error)]
pub enum InMemoryError {
    /// Registry was saved under a type that does not match its content.
    #[error("Registry {0} cannot be stored: {1}")]
    Rejected(RegistryType, String),
}

/// In-memory registry store.
///
/// Keeps a sorted copy of every saved registry and counts saves per type, so
/// tests can assert which registries a run actually wrote.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRegistryStore {
    registries: BTreeMap<RegistryType, Registry>,
    saves: BTreeMap<RegistryType, usize>,
}

impl InMemoryRegistryStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a registry without counting it as a save.
    pub fn insert(&mut self, registry: Registry) {
        let codes = registry.sorted_codes().into_iter().cloned().collect();
        let sorted = Registry::with_codes(registry.registry_type(), registry.label(), codes)
            .with_extensions(registry.extensions().to_vec());
        self.registries.insert(registry.registry_type(), sorted);
    }

    /// Number of times `registry_type` has been saved.
    pub fn save_count(&self, registry_type: RegistryType) -> usize {
        self.saves.get(&registry_type).copied().unwrap_or(0)
    }

    /// Total number of saves across all registries.
    pub fn total_saves(&self) -> usize {
        self.saves.values().sum()
    }

    /// Stored codes for a registry, in persisted order.
    pub fn codes(&self, registry_type: RegistryType) -> &[Code] {
        self.registries
            .get(&registry_type)
            .map(Registry::codes)
            .unwrap_or(&[])
    }
}

impl RegistryStore for InMemoryRegistryStore {
    type Error = InMemoryError;

    fn load(&self, registry_type: RegistryType) -> Result<Option<Registry>, Self::Error> {
        Ok(self.registries.get(&registry_type).cloned())
    }

    fn save(&mut self, registry: &Registry) -> Result<(), Self::Error> {
        if registry.label().trim().is_empty() {
            return Err(InMemoryError::Rejected(
                registry.registry_type(),
                "label is empty".to_string(),
            ));
        }
        self.insert(registry.clone());
        *self.saves.entry(registry.registry_type()).or_default() += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_missing_is_none() {
        let store = InMemoryRegistryStore::new();
        assert!(store.load(RegistryType::Cvx).unwrap().is_none());
    }

    #[test]
    fn test_save_sorts_and_counts() {
        let mut store = InMemoryRegistryStore::new();
        let mut registry = Registry::new(RegistryType::Cvx);
        registry.get_or_create("88");
        registry.get_or_create("03");

        store.save(&registry).unwrap();
        store.save(&registry).unwrap();

        assert_eq!(store.save_count(RegistryType::Cvx), 2);
        assert_eq!(store.save_count(RegistryType::Mvx), 0);
        let values: Vec<_> = store.codes(RegistryType::Cvx).iter().map(|c| c.value.as_str()).collect();
        assert_eq!(values, vec!["03", "88"]);

        let loaded = store.load(RegistryType::Cvx).unwrap().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.label(), "Vaccination CVX Code");
    }

    #[test]
    fn test_insert_is_not_a_save() {
        let mut store = InMemoryRegistryStore::new();
        store.insert(Registry::new(RegistryType::Mvx));
        assert_eq!(store.total_saves(), 0);
        assert!(store.load(RegistryType::Mvx).unwrap().is_some());
    }

    #[test]
    fn test_unmodelled_elements_survive() {
        let mut store = InMemoryRegistryStore::new();
        let mut registry = Registry::new(RegistryType::BodyRoute).with_extensions(vec!["<note>x</note>".to_string()]);
        registry.get_or_create("IM").0.extensions = vec!["<testAge/>".to_string()];
        store.save(&registry).unwrap();

        let loaded = store.load(RegistryType::BodyRoute).unwrap().unwrap();
        assert_eq!(loaded.extensions(), &["<note>x</note>".to_string()]);
        assert_eq!(loaded.find("IM").unwrap().extensions, vec!["<testAge/>".to_string()]);
    }
}
