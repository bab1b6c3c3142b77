//! # cvgraph Prelude
//!
//! This module provides a convenient prelude for the most commonly used types from
//! the cvgraph library. Import this module to get quick access to the essential
//! types for symbol-dump reconstruction.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all cvgraph operations
pub use crate::Error;

/// The result type used throughout cvgraph
pub use crate::Result;

/// Categorized log of recoverable degradations
pub use crate::diagnostics::{Category, Diagnostic, DiagnosticLog};

// ================================================================================================
// Main Entry Points
// ================================================================================================

/// Symbol database loaded from a JSON dump
pub use crate::symbols::SymbolDatabase;

/// The staged reconstruction pipeline and its frozen result
pub use crate::pipeline::{reconstruct, FrozenGraph};

/// Configuration for graph construction and the later pipeline stages
pub use crate::graph::BuildOptions;

// ================================================================================================
// Type Graph
// ================================================================================================

/// The arena holding every node of the reconstructed graph
pub use crate::graph::{NodeId, TypeGraph};

/// Node payloads and their component types
pub use crate::graph::{
    AggregateData, AggregateKind, DataMember, EnumData, FuncMember, MissReason, Node, NodeKind,
    NodeName, ProcData, StaticMember, VirtualSlot,
};

/// Scalar kinds recognized by the graph builder
pub use crate::graph::ScalarKind;

/// Image sections and address resolution
pub use crate::graph::{Section, SectionTable, DEFAULT_IMAGE_BASE};

/// Reconstructed physical layouts
pub use crate::graph::{View, ViewItem, ViewLeaf, POINTER_SIZE};

// ================================================================================================
// Reflection
// ================================================================================================

/// The flat reflection table and its entries
pub use crate::reflect::{build_table, ReflectKind, ReflectionEntry, ReflectionTable};
