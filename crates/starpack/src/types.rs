//! Shared type definitions for the starpack crate
//!
//! This module contains common types that are used across multiple components
//! of the bundler, ensuring consistency and avoiding circular dependencies.

use indexmap::{IndexMap, IndexSet};
use rustc_hash::FxBuildHasher;

pub type FxIndexMap<K, V> = IndexMap<K, V, FxBuildHasher>;
pub type FxIndexSet<T> = IndexSet<T, FxBuildHasher>;

/// Visitation state of a module during one resolution run
///
/// A module moves `NotStarted -> InProgress -> Done` exactly once. Meeting a
/// module that is still `InProgress` means the load graph has a cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum LoadState {
    /// Never requested
    #[default]
    NotStarted,

    /// Being parsed or executed; its importers are further up the stack
    InProgress,

    /// Executed once, successfully or not; the outcome is cached
    Done,
}

impl LoadState {
    pub fn is_done(self) -> bool {
        matches!(self, Self::Done)
    }

    pub fn is_in_progress(self) -> bool {
        matches!(self, Self::InProgress)
    }
}

impl std::fmt::Display for LoadState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotStarted => write!(f, "not started"),
            Self::InProgress => write!(f, "in progress"),
            Self::Done => write!(f, "done"),
        }
    }
}
