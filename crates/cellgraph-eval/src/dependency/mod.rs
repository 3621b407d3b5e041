//! Dependency graph over pooled references.

mod manager;
mod map;

pub use manager::DependencyManager;
pub use map::{DependencyMap, Heads};
