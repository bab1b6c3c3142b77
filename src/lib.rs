#![doc(html_no_source)]
#![deny(missing_docs)]
#![allow(clippy::too_many_arguments)]

//! # cvgraph - Type Graph Reconstruction from CodeView Symbol Dumps
//!
//! `cvgraph` rebuilds a complete, self-consistent C-style type graph from a JSON dump of
//! CodeView debug records. It resolves forward references, reconstructs physical struct
//! layouts (including bitfield packing and union recovery from overlapping members),
//! synthesizes virtual-function tables, assigns collision-free C-compatible names, and
//! emits both a declaration order that respects by-value dependencies and a flat
//! reflection table describing every type.
//!
//! ## Features
//!
//! - **Symbol database loading**: Strongly-typed deserialization of type, procedure,
//!   data, section, and name records from a JSON symbol dump
//! - **Graph construction**: Forward-reference resolution, field-list expansion,
//!   method binding, and cycle-tolerant aggregate building
//! - **Layout reconstruction**: Byte-accurate views of every aggregate, with unions
//!   recovered from overlapping members and explicit padding made visible
//! - **Vtable synthesis**: Per-class virtual slot tables merged across the retained
//!   inheritance chain, with derived overrides replacing base slots in place
//! - **Name resolution**: C-identifier normalization, deterministic collision
//!   handling, and namespace synthesis for qualified paths
//! - **Declaration ordering**: Fixed-point emission ordering with automatic
//!   flattening of nested types that block progress
//! - **Reflection**: A dense, index-stable table of every type with field runs,
//!   suitable for embedding in generated artifacts
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cvgraph::prelude::*;
//!
//! let db = SymbolDatabase::from_file("dump.json")?;
//! let diag = DiagnosticLog::new();
//! let frozen = reconstruct(&db, &BuildOptions::default(), &diag)?;
//!
//! for &id in frozen.order() {
//!     let node = frozen.graph().node(id)?;
//!     println!("{}", node.display_path());
//! }
//! # Ok::<(), cvgraph::Error>(())
//! ```
//!
//! ## Architecture
//!
//! `cvgraph` is organized into several key modules:
//!
//! - [`prelude`] - Convenient re-exports of commonly used types
//! - [`symbols`] - Symbol database loading and record definitions
//! - [`graph`] - The type graph arena and every reconstruction stage
//! - [`reflect`] - The flat reflection table built from a finished graph
//! - [`pipeline`] - The staged pipeline that ties everything together
//! - [`diagnostics`] - Categorized log of every degradation applied during a run
//! - [`Error`] and [`Result`] - Error handling for fatal input violations
//!
//! ### Pipeline
//!
//! [`pipeline::reconstruct`] is the main entry point. It runs eight stages in a fixed
//! order, each consuming the previous stage's output: graph construction, address
//! resolution, representability analysis, name resolution, layout reconstruction,
//! vtable synthesis, declaration ordering, and reflection table generation. A fatal
//! error in any stage aborts the whole run; recoverable degradations are recorded as
//! miss reasons on the affected nodes and logged to the [`diagnostics::DiagnosticLog`].
//!
//! ## Error Handling
//!
//! All operations return [`Result<T, Error>`](Result). Fatal errors carry the source
//! location that detected the violation:
//!
//! ```rust,no_run
//! use cvgraph::{Error, SymbolDatabase};
//!
//! match SymbolDatabase::from_file("dump.json") {
//!     Ok(db) => println!("Loaded {} type records", db.type_count()),
//!     Err(Error::Malformed { message, .. }) => println!("Malformed dump: {}", message),
//!     Err(e) => println!("Error: {}", e),
//! }
//! ```
#[macro_use]
pub(crate) mod error;

/// Convenient re-exports of the most commonly used types.
///
/// This module provides a curated selection of the most frequently used types
/// from across the cvgraph library, allowing for convenient glob imports.
///
/// # Example
///
/// ```rust,no_run
/// use cvgraph::prelude::*;
///
/// let db = SymbolDatabase::from_file("dump.json")?;
/// let frozen = reconstruct(&db, &BuildOptions::default(), &DiagnosticLog::new())?;
/// println!("{} top-level declarations", frozen.order().len());
/// # Ok::<(), cvgraph::Error>(())
/// ```
pub mod prelude;

/// Categorized diagnostics for every degradation applied during reconstruction.
///
/// Fatal errors abort a run through [`Error`]; everything recoverable - removed
/// member functions, restored truncated names, synthesized namespaces - lands here
/// instead. The log is thread-safe, preserves insertion order, and can be written
/// out as one file per [`diagnostics::Category`].
pub mod diagnostics;

/// The type graph arena and every reconstruction stage that operates on it.
///
/// # Key Types
///
/// - [`graph::TypeGraph`] - Arena of [`graph::Node`]s addressed by [`graph::NodeId`]
/// - [`graph::BuildOptions`] - Knobs for graph construction and later stages
/// - [`graph::SectionTable`] - Image sections for address resolution
/// - [`graph::View`] - A reconstructed physical layout of one aggregate
///
/// # Stages
///
/// - [`graph::build`] - Construct the graph from a [`SymbolDatabase`]
/// - [`graph::resolve_addresses`] - Turn section-relative addresses into absolute ones
/// - [`graph::analyze_missing`] - Mark members the output representation cannot carry
/// - [`graph::resolve_names`] - Normalize, deduplicate, and namespace all names
/// - [`graph::reconstruct_layouts`] - Rebuild byte-accurate aggregate layouts
/// - [`graph::synthesize_vtables`] - Merge virtual slot tables across base chains
/// - [`graph::order_nodes`] - Produce a dependency-respecting declaration order
pub mod graph;

/// The staged reconstruction pipeline and its frozen result.
///
/// [`pipeline::reconstruct`] runs every stage in order and returns a
/// [`pipeline::FrozenGraph`]: the finished graph plus section table, declaration
/// order, a name lookup table, and the reflection table.
pub mod pipeline;

/// A flat reflection table describing every type in a finished graph.
///
/// [`reflect::build_table`] walks an ordered graph and produces densely indexed
/// [`reflect::ReflectionEntry`] rows with interned names and per-aggregate field
/// runs, suitable for embedding in generated artifacts.
pub mod reflect;

/// Symbol database loading and the record types it is built from.
///
/// [`symbols::SymbolDatabase`] deserializes a JSON symbol dump into strongly-typed
/// records and validates the parts the rest of the pipeline relies on: unique type
/// record ids and well-formed record payloads.
pub mod symbols;

/// The error type for all fatal conditions this library can report.
///
/// Every variant describes a violation of the symbol-database input contract or of
/// a graph invariant. Recoverable degradations never surface here; they are recorded
/// on the affected node and in the [`diagnostics::DiagnosticLog`].
///
/// # Example
///
/// ```rust,no_run
/// use cvgraph::{Error, SymbolDatabase};
///
/// match SymbolDatabase::from_file("dump.json") {
///     Ok(db) => println!("Loaded"),
///     Err(Error::Malformed { message, file, line }) => {
///         println!("Malformed ({}:{}): {}", file, line, message);
///     }
///     Err(e) => println!("Error: {}", e),
/// }
/// ```
pub use error::Error;

/// `Result<T, Error>` alias used throughout cvgraph.
pub type Result<T> = std::result::Result<T, Error>;

/// Main entry point for loading a JSON symbol dump.
///
/// See [`symbols::SymbolDatabase`] for loading and record access.
///
/// # Example
///
/// ```rust,no_run
/// use cvgraph::SymbolDatabase;
/// let db = SymbolDatabase::from_file("dump.json")?;
/// println!("{} type records", db.type_count());
/// # Ok::<(), cvgraph::Error>(())
/// ```
pub use symbols::SymbolDatabase;

/// Configuration for graph construction and the later pipeline stages.
pub use graph::BuildOptions;

/// The staged pipeline entry point and its frozen result.
///
/// # Example
///
/// ```rust,no_run
/// use cvgraph::{reconstruct, BuildOptions, DiagnosticLog, SymbolDatabase};
///
/// let db = SymbolDatabase::from_file("dump.json")?;
/// let frozen = reconstruct(&db, &BuildOptions::default(), &DiagnosticLog::new())?;
/// println!("{} reflection entries", frozen.reflection().len());
/// # Ok::<(), cvgraph::Error>(())
/// ```
pub use pipeline::{reconstruct, FrozenGraph};

/// Thread-safe, insertion-ordered log of recoverable degradations.
pub use diagnostics::DiagnosticLog;
