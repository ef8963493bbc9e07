//! Subsystems built on the catalog.

pub mod experiments;
pub mod metrics;
pub mod usage;
pub mod versions;
