//! revgraph Core Library
//!
//! This library reconstructs the dependency graph of an Alembic-style
//! migration directory. Each version script declares its own revision id and
//! the revision(s) it revises; the library parses those declarations, indexes
//! them, and classifies every revision as base, head, or merge while tracking
//! dangling references as first-class data.

pub mod discovery;
pub mod graph;
pub mod parser;

// Re-export commonly used types
pub use graph::{DependencyEdge, GraphSummary, Revision, RevisionGraph, ShadowedRevision};
