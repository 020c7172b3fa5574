//! Lookup table from data type to renderer.
//!
//! Registrations go through a [`RegistryBuilder`]; lookups are only possible
//! on the [`ComponentRegistry`] it builds, so every registration has happened
//! before the first lookup.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::domain::DataType;
use crate::renderers::Renderer;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("a renderer is already registered for {0}")]
    AlreadyRegistered(DataType),
}

/// Collects renderer registrations during startup
#[derive(Default)]
pub struct RegistryBuilder {
    entries: HashMap<DataType, Arc<dyn Renderer>>,
}

impl RegistryBuilder {
    /// Register a renderer for a data type; each type may be registered once
    pub fn register(
        &mut self,
        data_type: DataType,
        renderer: Arc<dyn Renderer>,
    ) -> Result<&mut Self, RegistryError> {
        match self.entries.entry(data_type) {
            Entry::Occupied(_) => Err(RegistryError::AlreadyRegistered(data_type)),
            Entry::Vacant(slot) => {
                debug!(%data_type, component = renderer.name(), "Registered renderer");
                slot.insert(renderer);
                Ok(self)
            }
        }
    }

    pub fn build(self) -> ComponentRegistry {
        ComponentRegistry {
            entries: self.entries,
        }
    }
}

/// Immutable data type to renderer table
#[derive(Default)]
pub struct ComponentRegistry {
    entries: HashMap<DataType, Arc<dyn Renderer>>,
}

impl ComponentRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// A registry with nothing registered; every lookup misses
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn lookup(&self, data_type: DataType) -> Option<Arc<dyn Renderer>> {
        self.entries.get(&data_type).cloned()
    }

    pub fn contains(&self, data_type: DataType) -> bool {
        self.entries.contains_key(&data_type)
    }

    /// Registered data types in priority order
    pub fn data_types(&self) -> Vec<DataType> {
        let mut types: Vec<DataType> = self.entries.keys().copied().collect();
        types.sort();
        types
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(
                self.data_types()
                    .into_iter()
                    .filter_map(|t| self.entries.get(&t).map(|r| (t, r.name().to_string()))),
            )
            .finish()
    }
}
