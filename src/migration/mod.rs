//! Schema migration
//!
//! Planning turns the registry into schema directives; execution applies
//! them to the live store and reports an outcome for each one.

pub mod executor;
pub mod planner;

pub use executor::{MigrationExecutor, MigrationOutcome, MigrationReport, MigrationSummary};
pub use planner::{escape_identifier, ConstraintPlanner, DirectiveKind, SchemaDirective};
