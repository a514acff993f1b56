//! Schema introspection and planning.
//!
//! - [`introspect`]: read table definitions from a live connection
//! - [`planner`]: decide which tables must be created on the target

pub mod introspect;
pub mod planner;

pub use introspect::{introspect, introspect_table, list_tables};
pub use planner::{plan, plan_table, PlanAction, SyncPlanEntry};
