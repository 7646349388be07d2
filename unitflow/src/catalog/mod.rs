//! Unit catalog: the source of truth for which units are active.
//!
//! The pipeline snapshots the catalog during discovery and watches its
//! revision to detect changes that require a restart.

use crate::core::UnitId;
use crate::errors::CatalogError;
use crate::units::Unit;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Provides snapshots of the active units.
#[cfg_attr(test, mockall::automock)]
pub trait UnitCatalog: Send + Sync {
    /// Returns the currently active units.
    fn current_units(&self) -> Result<Vec<Arc<dyn Unit>>, CatalogError>;

    /// Returns a counter that changes whenever the unit set changes.
    fn revision(&self) -> u64;
}

/// A mutable in-memory catalog.
///
/// Every mutation bumps the revision, including replacing a unit with a new
/// value under the same identity.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    units: RwLock<Vec<Arc<dyn Unit>>>,
    revision: AtomicU64,
}

impl InMemoryCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a catalog holding the given units.
    #[must_use]
    pub fn with_units(units: impl IntoIterator<Item = Arc<dyn Unit>>) -> Self {
        Self {
            units: RwLock::new(units.into_iter().collect()),
            revision: AtomicU64::new(0),
        }
    }

    /// Adds a unit, replacing any unit with the same identity.
    pub fn insert(&self, unit: Arc<dyn Unit>) {
        let id = unit.descriptor().id;
        let mut units = self.units.write();
        units.retain(|existing| existing.descriptor().id != id);
        units.push(unit);
        drop(units);
        self.bump(&id, "inserted");
    }

    /// Removes a unit by identity. Returns true if it was present.
    pub fn remove(&self, id: &UnitId) -> bool {
        let mut units = self.units.write();
        let before = units.len();
        units.retain(|existing| existing.descriptor().id != *id);
        let removed = units.len() != before;
        drop(units);
        if removed {
            self.bump(id, "removed");
        }
        removed
    }

    /// Returns the number of units.
    #[must_use]
    pub fn len(&self) -> usize {
        self.units.read().len()
    }

    /// Returns true if the catalog is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.units.read().is_empty()
    }

    fn bump(&self, id: &UnitId, action: &str) {
        let revision = self.revision.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(unit = %id, action, revision, "Catalog changed");
    }
}

impl UnitCatalog for InMemoryCatalog {
    fn current_units(&self) -> Result<Vec<Arc<dyn Unit>>, CatalogError> {
        Ok(self.units.read().clone())
    }

    fn revision(&self) -> u64 {
        self.revision.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::{FnUnit, UnitDescriptor};

    fn unit(name: &str) -> Arc<dyn Unit> {
        Arc::new(FnUnit::new(UnitDescriptor::new(name), |_| Ok(())))
    }

    #[test]
    fn test_insert_and_remove_bump_revision() {
        let catalog = InMemoryCatalog::new();
        assert_eq!(catalog.revision(), 0);

        catalog.insert(unit("a"));
        catalog.insert(unit("b"));
        assert_eq!(catalog.revision(), 2);
        assert_eq!(catalog.len(), 2);

        assert!(catalog.remove(&UnitId::new("a")));
        assert_eq!(catalog.revision(), 3);

        assert!(!catalog.remove(&UnitId::new("missing")));
        assert_eq!(catalog.revision(), 3);
    }

    #[test]
    fn test_insert_replaces_same_identity() {
        let catalog = InMemoryCatalog::with_units([unit("a")]);
        catalog.insert(unit("a"));

        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.revision(), 1);
    }

    #[test]
    fn test_snapshot_is_independent_of_later_changes() {
        let catalog = InMemoryCatalog::with_units([unit("a"), unit("b")]);
        let snapshot = catalog.current_units().unwrap();
        catalog.remove(&UnitId::new("a"));

        assert_eq!(snapshot.len(), 2);
        assert_eq!(catalog.current_units().unwrap().len(), 1);
    }
}
