//! Temporal hierarchy engine
//!
//! Contains the core business logic without any I/O concerns: time-versioned
//! parent edges, point-in-time queries over them, and the write path that
//! keeps every snapshot a forest.

mod id;
mod unit;
mod registry;
mod edge;
mod error;
mod index;
mod guard;
mod navigator;
mod mutation;
mod engine;
mod audit;

pub use id::{EdgeId, IdError, UnitId};
pub use unit::Unit;
pub use registry::{UnitCatalog, UnitRegistry};
pub use edge::{HierarchyEdge, Validity};
pub use error::{HierarchyError, InvariantViolation, Partial};
pub use index::ValidityIndex;
pub use guard::{CycleGuard, DEFAULT_GUARD_DEPTH};
pub use navigator::{Descendant, Descendants, EngineLimits, HierarchyNavigator, DEFAULT_WALK_DEPTH};
pub use mutation::{HierarchyWriter, Reparented};
pub use engine::SharedHierarchy;
pub use audit::{audit, AuditReport, CycleFinding, OverlapFinding};
