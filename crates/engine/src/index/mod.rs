//! Index lifecycle
//!
//! - [`definitions`]: declared specs and their dirty flags
//! - [`builder`]: fingerprint comparison and extension (re)registration

pub mod builder;
pub mod definitions;

pub use builder::{BuildReport, IndexBuildCoordinator, IndexKind};
pub use definitions::{DirtyFlag, ExtensionPlan, IndexDefinitionStore};
