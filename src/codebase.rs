//! The codebase: every registry of a run, held together in memory.
//!
//! Registries live in an arena indexed by [`RegistryType`], so any registry
//! can be reached without string lookups and two different registries can be
//! borrowed mutably at once. Mutations report whether they changed anything;
//! the codebase collects those reports into a dirty set and only dirty
//! registries are written back.

use std::collections::BTreeSet;

use tracing::{debug, info};

use crate::store::RegistryStore;
use crate::types::{Registry, RegistryType};

/// All registries of one update run plus the set of registries changed by it.
#[derive(Debug, Clone)]
pub struct Codebase {
    /// One registry per [`RegistryType`], at `RegistryType::index()`.
    registries: Vec<Registry>,
    dirty: BTreeSet<RegistryType>,
}

impl Codebase {
    /// Create a codebase of empty registries.
    pub fn empty() -> Self {
        Self {
            registries: RegistryType::ALL.iter().map(|&t| Registry::new(t)).collect(),
            dirty: BTreeSet::new(),
        }
    }

    /// Load every registry from `store`.
    ///
    /// Registries the store has never seen start empty and are only written
    /// if they gain content.
    pub fn load<S: RegistryStore>(store: &S) -> Result<Self, S::Error> {
        let mut registries = Vec::with_capacity(RegistryType::ALL.len());
        for registry_type in RegistryType::ALL {
            let registry = match store.load(registry_type)? {
                Some(registry) => registry,
                None => {
                    debug!(registry = %registry_type, "registry not found, starting empty");
                    Registry::new(registry_type)
                }
            };
            info!(registry = %registry_type, codes = registry.len(), "loaded registry");
            registries.push(registry);
        }
        Ok(Self {
            registries,
            dirty: BTreeSet::new(),
        })
    }

    /// Borrow a registry.
    pub fn registry(&self, registry_type: RegistryType) -> &Registry {
        &self.registries[registry_type.index()]
    }

    /// Borrow a registry for mutation.
    ///
    /// Callers report changes through [`Codebase::mark_dirty`].
    pub fn registry_mut(&mut self, registry_type: RegistryType) -> &mut Registry {
        &mut self.registries[registry_type.index()]
    }

    /// Borrow two different registries for mutation at once.
    ///
    /// # Panics
    ///
    /// Panics if `a == b`.
    pub fn pair_mut(&mut self, a: RegistryType, b: RegistryType) -> (&mut Registry, &mut Registry) {
        assert_ne!(a, b, "pair_mut needs two different registries");
        let (ia, ib) = (a.index(), b.index());
        if ia < ib {
            let (left, right) = self.registries.split_at_mut(ib);
            (&mut left[ia], &mut right[0])
        } else {
            let (left, right) = self.registries.split_at_mut(ia);
            (&mut right[0], &mut left[ib])
        }
    }

    /// Record that a registry changed.
    pub fn mark_dirty(&mut self, registry_type: RegistryType) {
        self.dirty.insert(registry_type);
    }

    /// Record a change if `changed` is true. Returns `changed`.
    pub fn note_change(&mut self, registry_type: RegistryType, changed: bool) -> bool {
        if changed {
            self.dirty.insert(registry_type);
        }
        changed
    }

    /// True when the registry changed during this run.
    pub fn is_dirty(&self, registry_type: RegistryType) -> bool {
        self.dirty.contains(&registry_type)
    }

    /// Registries changed during this run, in processing order.
    pub fn dirty(&self) -> impl Iterator<Item = RegistryType> + '_ {
        self.dirty.iter().copied()
    }

    /// All registries in processing order.
    pub fn registries(&self) -> impl Iterator<Item = &Registry> {
        self.registries.iter()
    }

    /// Total number of codes across all registries.
    pub fn total_codes(&self) -> usize {
        self.registries.iter().map(Registry::len).sum()
    }

    /// Save every dirty registry and clear the dirty set.
    ///
    /// Returns the registries that were written, in processing order. On
    /// error the dirty set is left as it was.
    pub fn persist<S: RegistryStore>(&mut self, store: &mut S) -> Result<Vec<RegistryType>, S::Error> {
        let dirty: Vec<RegistryType> = self.dirty.iter().copied().collect();
        for &registry_type in &dirty {
            let registry = self.registry(registry_type);
            info!(registry = %registry_type, label = registry.label(), codes = registry.len(), "saving registry");
            store.save(registry)?;
        }
        self.dirty.clear();
        Ok(dirty)
    }
}

impl Default for Codebase {
    fn default() -> Self {
        Self::empty()
    }
}
