//! echelon - time-aware organizational hierarchies
//!
//! Units (corps, divisions, brigades, ...) are placed under one another by
//! edges that hold for a date interval. The engine answers "who reported
//! to whom on this date" and refuses any change that would give a unit two
//! parents at once or make the hierarchy cyclic on any date.

pub mod cli;
pub mod domain;
pub mod storage;

pub use domain::{
    EdgeId, HierarchyEdge, HierarchyError, HierarchyNavigator, HierarchyWriter, InvariantViolation, Partial,
    SharedHierarchy, Unit, UnitCatalog, UnitId, UnitRegistry, Validity, ValidityIndex,
};
