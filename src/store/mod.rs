//! Registry storage backends.

pub mod memory;
pub mod xml;

use crate::types::{Registry, RegistryType};

/// Trait for registry storage backends.
///
/// A store round-trips a registry: its type, label and codes. Implementations
/// must persist codes sorted by value so that saving an unchanged registry
/// produces identical output.
pub trait RegistryStore {
    /// Error type for store operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Load a registry. `Ok(None)` means it has never been saved.
    fn load(&self, registry_type: RegistryType) -> Result<Option<Registry>, Self::Error>;

    /// Replace the persisted registry with this one.
    fn save(&mut self, registry: &Registry) -> Result<(), Self::Error>;
}

pub use memory::InMemoryRegistryStore;
pub use xml::{XmlFileStore, CodesetDocument, StoreError, XML_DECLARATION};
