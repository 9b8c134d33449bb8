//! Unit registry boundary
//!
//! The engine does not own unit records. It consumes them through
//! [`UnitRegistry`], which the host implements over whatever store it keeps
//! units in. [`UnitCatalog`] is the in-memory implementation used by the
//! CLI and by tests.

use std::collections::BTreeMap;

use super::id::UnitId;
use super::unit::Unit;

/// Read access to the set of known units
pub trait UnitRegistry {
    /// Looks up a unit by id
    fn unit(&self, id: &UnitId) -> Option<&Unit>;

    /// Returns every registered unit id in ascending order
    fn unit_ids(&self) -> Vec<UnitId>;

    fn unit_exists(&self, id: &UnitId) -> bool {
        self.unit(id).is_some()
    }

    fn unit_display_name(&self, id: &UnitId) -> Option<&str> {
        self.unit(id).map(|unit| unit.name.as_str())
    }
}

/// In-memory unit registry keyed and ordered by unit id
#[derive(Debug, Clone, Default)]
pub struct UnitCatalog {
    units: BTreeMap<UnitId, Unit>,
}

impl UnitCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a catalog from a collection of units. Later duplicates win.
    pub fn from_units(units: impl IntoIterator<Item = Unit>) -> Self {
        Self {
            units: units.into_iter().map(|u| (u.id.clone(), u)).collect(),
        }
    }

    /// Inserts or replaces a unit, returning the previous record
    pub fn insert(&mut self, unit: Unit) -> Option<Unit> {
        self.units.insert(unit.id.clone(), unit)
    }

    /// Removes a unit record. Edge cleanup is the caller's job.
    pub fn remove(&mut self, id: &UnitId) -> Option<Unit> {
        self.units.remove(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Unit> {
        self.units.values()
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

impl UnitRegistry for UnitCatalog {
    fn unit(&self, id: &UnitId) -> Option<&Unit> {
        self.units.get(id)
    }

    fn unit_ids(&self) -> Vec<UnitId> {
        self.units.keys().cloned().collect()
    }
}
