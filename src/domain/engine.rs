//! Lock-guarded engine for hosts that share one hierarchy across threads
//!
//! All writes take one global write lock for their whole duration. The
//! cycle guard walks ancestor chains that may span any unit, so per-unit
//! locking would let two unrelated-looking writes combine into a cycle.
//! Readers share a read lock and always see fully committed state.

use std::sync::RwLock;

use log::debug;

use super::edge::HierarchyEdge;
use super::error::HierarchyError;
use super::id::UnitId;
use super::index::ValidityIndex;
use super::mutation::HierarchyWriter;
use super::navigator::{EngineLimits, HierarchyNavigator};
use super::registry::UnitRegistry;

struct EngineState<R> {
    index: ValidityIndex,
    registry: R,
}

/// A registry and its validity index behind a single reader-writer lock
pub struct SharedHierarchy<R: UnitRegistry> {
    state: RwLock<EngineState<R>>,
    limits: EngineLimits,
}

impl<R: UnitRegistry> SharedHierarchy<R> {
    pub fn new(registry: R, index: ValidityIndex, limits: EngineLimits) -> Self {
        Self {
            state: RwLock::new(EngineState { index, registry }),
            limits,
        }
    }

    pub fn limits(&self) -> EngineLimits {
        self.limits
    }

    /// Runs a query against a consistent snapshot
    pub fn read<T>(&self, query: impl FnOnce(&HierarchyNavigator<'_, R>) -> T) -> Result<T, HierarchyError> {
        let state = self.state.read().map_err(|_| HierarchyError::Poisoned)?;
        let navigator = HierarchyNavigator::new(&state.index, &state.registry)
            .with_walk_depth(self.limits.walk_depth);
        Ok(query(&navigator))
    }

    /// Runs one or more mutations under the global write lock
    pub fn write<T>(
        &self,
        mutation: impl FnOnce(&mut HierarchyWriter<'_, R>) -> Result<T, HierarchyError>,
    ) -> Result<T, HierarchyError> {
        let mut state = self.state.write().map_err(|_| HierarchyError::Poisoned)?;
        let EngineState { index, registry } = &mut *state;
        let mut writer = HierarchyWriter::new(index, &*registry).with_guard_depth(self.limits.guard_depth);
        mutation(&mut writer)
    }

    /// Detaches every edge naming `unit`, then lets the caller drop the
    /// unit from the registry, all under one write lock
    pub fn retire_unit(
        &self,
        unit: &UnitId,
        remove: impl FnOnce(&mut R, &UnitId),
    ) -> Result<Vec<HierarchyEdge>, HierarchyError> {
        let mut state = self.state.write().map_err(|_| HierarchyError::Poisoned)?;
        let EngineState { index, registry } = &mut *state;

        if !registry.unit_exists(unit) {
            return Err(HierarchyError::UnknownUnit(unit.clone()));
        }

        let removed = HierarchyWriter::new(index, &*registry).remove_edges_referencing(unit);
        remove(registry, unit);
        debug!("event=unit_retired unit={} edges_removed={}", unit, removed.len());
        Ok(removed)
    }

    /// Copies the committed index, e.g. for persisting it
    pub fn index_snapshot(&self) -> Result<ValidityIndex, HierarchyError> {
        let state = self.state.read().map_err(|_| HierarchyError::Poisoned)?;
        Ok(state.index.clone())
    }

    /// Consumes the engine, returning registry and index
    pub fn into_parts(self) -> Result<(R, ValidityIndex), HierarchyError> {
        let state = self.state.into_inner().map_err(|_| HierarchyError::Poisoned)?;
        Ok((state.registry, state.index))
    }
}
