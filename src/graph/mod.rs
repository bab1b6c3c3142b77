//! Type-graph construction and analysis.
//!
//! The graph is an id-indexed arena of closed-variant nodes built from symbol records,
//! then refined in place by the pipeline stages: address resolution, missing-member
//! analysis, name resolution, layout reconstruction, vtable synthesis, and emission
//! ordering.
//!
//! # Key Components
//!
//! - [`arena::TypeGraph`] - the node arena and id allocator
//! - [`node::Node`] / [`node::NodeKind`] - the node model
//! - [`builder`] - record-to-node construction
//! - [`layout`] - overlap/union layout reconstruction
//! - [`order`] - emission ordering with cycle-breaking

pub mod address;
pub mod arena;
pub mod builder;
pub mod layout;
pub mod missing;
pub mod names;
pub mod node;
pub mod order;
pub mod scalars;
pub mod vtable;

pub use address::{resolve_addresses, Section, SectionTable, DEFAULT_IMAGE_BASE};
pub use arena::{IdAllocator, TypeGraph, SYNTH_BASE};
pub use builder::{build, BuildOptions};
pub use layout::{reconstruct_layouts, View, ViewItem, ViewLeaf, POINTER_SIZE};
pub use missing::analyze_missing;
pub use names::resolve_names;
pub use node::{
    Address, AggregateData, AggregateKind, BaseSpec, Caps, DataMember, EnumData, EnumMember,
    FuncMember, MemberAttrs, MissReason, ModifierFlags, Node, NodeId, NodeKind, NodeName,
    PointerFlags, ProcData, StaticMember, VirtualSlot,
};
pub use order::order_nodes;
pub use scalars::ScalarKind;
pub use vtable::synthesize_vtables;
