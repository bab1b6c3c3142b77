//! Graph node model: the closed variant set and its capability surface.
//!
//! Every entity the pipeline reasons about — primitive, pointer, aggregate, procedure,
//! namespace — is one [`Node`] in the arena, identified by a [`NodeId`] and carrying a
//! [`NodeKind`] payload. Capabilities (sized, named, addressable, element-typed, parented)
//! are a fixed [`Caps`] bitset computed once at construction, so capability queries never
//! inspect the payload.
//!
//! Nodes are created once and mutated only through the defined setters; they are never
//! deleted, only marked or re-parented.

use std::fmt;

use bitflags::bitflags;

use crate::graph::layout::View;
use crate::graph::scalars::ScalarKind;
use crate::Result;

/// Unique positive node identifier.
///
/// Ids below [`crate::graph::arena::SYNTH_BASE`] come from input records; synthesized
/// nodes draw from the disjoint range above it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    /// Wraps a raw id, rejecting zero.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for id 0, which the input contract reserves
    /// as "absent".
    pub fn from_raw(raw: u32) -> Result<Self> {
        if raw == 0 {
            return Err(malformed_error!("node id 0 is reserved"));
        }
        Ok(NodeId(raw))
    }

    /// Raw id value.
    #[must_use]
    pub fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

bitflags! {
    /// Capability set of a node, fixed at construction.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Caps: u16 {
        /// Carries a byte size.
        const SIZED = 1 << 0;
        /// Carries original and display name segments.
        const NAMED = 1 << 1;
        /// References exactly one element type.
        const ELEMENT_TYPED = 1 << 2;
        /// May be bound to a (section, offset) pair.
        const ADDRESSABLE = 1 << 3;
        /// May own children / have a parent.
        const PARENTED = 1 << 4;
        /// May accumulate missing-member reasons.
        const MISSABLE = 1 << 5;
    }
}

bitflags! {
    /// Pointer shape and qualifiers. Exactly one of the four mode bits is set.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PointerFlags: u8 {
        /// Plain pointer.
        const POINTER = 1 << 0;
        /// Lvalue reference.
        const LVALUE_REF = 1 << 1;
        /// Pointer to data member.
        const MEMBER_DATA = 1 << 2;
        /// Pointer to member function.
        const MEMBER_FUNC = 1 << 3;
        /// `const`-qualified.
        const CONST = 1 << 4;
        /// `volatile`-qualified.
        const VOLATILE = 1 << 5;
    }
}

impl PointerFlags {
    /// Mask covering the four addressing-mode bits.
    pub const MODE_MASK: PointerFlags = PointerFlags::POINTER
        .union(PointerFlags::LVALUE_REF)
        .union(PointerFlags::MEMBER_DATA)
        .union(PointerFlags::MEMBER_FUNC);
}

bitflags! {
    /// Const/volatile modifier qualifiers.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ModifierFlags: u8 {
        /// `const` qualifier.
        const CONST = 1 << 0;
        /// `volatile` qualifier.
        const VOLATILE = 1 << 1;
    }
}

bitflags! {
    /// Member attributes shared by data members, methods, and bases.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct MemberAttrs: u8 {
        /// Virtual method.
        const VIRTUAL = 1 << 0;
        /// Introducing virtual method (owns a vtable slot offset).
        const INTRO = 1 << 1;
        /// Pure virtual.
        const PURE = 1 << 2;
        /// Static member.
        const STATIC = 1 << 3;
    }
}

/// Section-relative location of a symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Address {
    /// 1-based section id; 0 addresses the synthetic image-base pseudo-section.
    pub section: u16,
    /// Offset from the section start.
    pub offset: u64,
}

/// Why a member, method, or procedure is excluded from emission.
///
/// The `Display` strings are stable; the missing-member analysis is deterministic over an
/// unchanged graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MissReason {
    /// Constructor (name equals the owner's local name).
    Constructor,
    /// Destructor (name equals `~` + the owner's local name).
    Destructor,
    /// Operator overload.
    OperatorOverload,
    /// Variadic parameter list.
    Variadic,
    /// Recorded owning-class id differs from the actual owner.
    ClassIdMismatch,
    /// Non-zero this-adjustment thunk.
    ThisAdjust(i64),
    /// No resolved address.
    NoAddress,
    /// Argument or return value wider than 8 bytes passed by value.
    LargeByValue,
    /// Aggregate passed or returned by value.
    ByValueAggregate,
    /// Array passed or returned by value.
    ByValueArray,
    /// Root namespace is on the configured block list.
    BlockedNamespace(String),
    /// Backed by a zero-length array.
    ZeroLengthArray,
}

impl fmt::Display for MissReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MissReason::Constructor => write!(f, "constructor"),
            MissReason::Destructor => write!(f, "destructor"),
            MissReason::OperatorOverload => write!(f, "operator overload"),
            MissReason::Variadic => write!(f, "variadic arguments"),
            MissReason::ClassIdMismatch => write!(f, "owning class mismatch"),
            MissReason::ThisAdjust(adjust) => write!(f, "this adjustment {adjust}"),
            MissReason::NoAddress => write!(f, "no address info"),
            MissReason::LargeByValue => write!(f, "arg or ret wider than 8 bytes"),
            MissReason::ByValueAggregate => write!(f, "arg or ret aggregate by value"),
            MissReason::ByValueArray => write!(f, "arg or ret array by value"),
            MissReason::BlockedNamespace(ns) => write!(f, "blocked root namespace \"{ns}\""),
            MissReason::ZeroLengthArray => write!(f, "zero length array"),
        }
    }
}

/// Joins miss reasons the way diagnostics print them.
#[must_use]
pub fn miss_info(reasons: &[MissReason]) -> String {
    reasons.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

/// Aggregate flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum AggregateKind {
    /// `struct`.
    Struct,
    /// `class`.
    Class,
    /// `union`.
    Union,
}

/// One direct base of an aggregate.
#[derive(Debug, Clone)]
pub struct BaseSpec {
    /// Base type node.
    pub ty: NodeId,
    /// Byte offset of the base subobject.
    pub offset: u64,
}

/// One instance data member.
#[derive(Debug, Clone)]
pub struct DataMember {
    /// Original member name.
    pub name: String,
    /// Member type node.
    pub ty: NodeId,
    /// Byte offset within the aggregate.
    pub offset: u64,
    /// Declaration ordinal, unique per aggregate.
    pub index: u32,
    /// Attributes.
    pub attrs: MemberAttrs,
    /// Missing reasons; non-empty excludes the member from emission.
    pub miss: Vec<MissReason>,
}

/// One static data member.
#[derive(Debug, Clone)]
pub struct StaticMember {
    /// Original member name.
    pub name: String,
    /// Member type node.
    pub ty: NodeId,
    /// Attributes.
    pub attrs: MemberAttrs,
    /// Bound location, when a data or name symbol matched.
    pub address: Option<Address>,
    /// Resolved absolute address.
    pub absolute: Option<u64>,
    /// Missing reasons.
    pub miss: Vec<MissReason>,
}

/// One member function.
#[derive(Debug, Clone)]
pub struct FuncMember {
    /// Original method name.
    pub name: String,
    /// Procedure type node.
    pub ty: NodeId,
    /// Attributes.
    pub attrs: MemberAttrs,
    /// Vtable slot byte offset for introducing virtual methods.
    pub vfptr_offset: Option<u64>,
    /// Bound code location, when a procedure symbol matched.
    pub address: Option<Address>,
    /// Resolved absolute address.
    pub absolute: Option<u64>,
    /// Missing reasons.
    pub miss: Vec<MissReason>,
}

/// One retained virtual-table slot after ancestor merging.
#[derive(Debug, Clone)]
pub struct VirtualSlot {
    /// Method name.
    pub name: String,
    /// Procedure type node.
    pub ty: NodeId,
    /// Slot index (vfptr offset divided by pointer size).
    pub slot: u64,
    /// Aggregate that contributed the retained entry.
    pub owner: NodeId,
}

/// Payload of struct / class / union nodes.
#[derive(Debug, Clone)]
pub struct AggregateData {
    /// Aggregate flavor.
    pub kind: AggregateKind,
    /// Direct bases with unique offsets. Empty for unions.
    pub bases: Vec<BaseSpec>,
    /// Instance members in declaration order.
    pub members: Vec<DataMember>,
    /// Static members in declaration order.
    pub statics: Vec<StaticMember>,
    /// Member functions in declaration order (method lists expanded).
    pub methods: Vec<FuncMember>,
    /// Nested type nodes in declaration order.
    pub nested: Vec<NodeId>,
    /// Slot count of the owned virtual table, when a vfunc-tab marker was present.
    pub vtable_shape: Option<u32>,
    /// Direct or indirect virtual base markers were present.
    pub has_virtual_base: bool,
    /// Index into `bases` of the single retained base, set during layout reconstruction.
    pub retained_base: Option<usize>,
    /// Reconstructed layout view, set during layout reconstruction.
    pub layout: Option<View>,
    /// Merged virtual-table slots, set during vtable synthesis.
    pub virtual_methods: Vec<VirtualSlot>,
    /// Display name of the synthesized vtable-accessor companion.
    pub companion: Option<String>,
}

impl AggregateData {
    /// Empty payload of the given flavor.
    #[must_use]
    pub fn new(kind: AggregateKind) -> Self {
        AggregateData {
            kind,
            bases: Vec::new(),
            members: Vec::new(),
            statics: Vec::new(),
            methods: Vec::new(),
            nested: Vec::new(),
            vtable_shape: None,
            has_virtual_base: false,
            retained_base: None,
            layout: None,
            virtual_methods: Vec::new(),
            companion: None,
        }
    }
}

/// One enumerator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumMember {
    /// Enumerator name.
    pub name: String,
    /// Enumerator value.
    pub value: i64,
}

/// Payload of enum nodes.
#[derive(Debug, Clone)]
pub struct EnumData {
    /// Backing scalar node.
    pub backing: NodeId,
    /// Enumerators in declaration order.
    pub members: Vec<EnumMember>,
    /// Scoped enumeration; may be promoted during collision resolution.
    pub scoped: bool,
}

/// Payload of procedure and member-function nodes.
#[derive(Debug, Clone)]
pub struct ProcData {
    /// Calling convention name.
    pub convention: String,
    /// Return type node (a void node for `void`).
    pub return_type: NodeId,
    /// Parameter type nodes in order; one trailing `None` marks variadic arguments.
    pub params: Vec<Option<NodeId>>,
    /// Owning class for member functions.
    pub class: Option<NodeId>,
    /// `this` pointer type for non-static member functions.
    pub this: Option<NodeId>,
    /// Fixed `this` displacement.
    pub this_adjust: i64,
}

impl ProcData {
    /// `true` when the parameter list ends in a variadic marker.
    #[must_use]
    pub fn is_variadic(&self) -> bool {
        matches!(self.params.last(), Some(None))
    }
}

/// Closed variant set of graph nodes.
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// `void`.
    Void,
    /// Builtin primitive.
    Scalar(ScalarKind),
    /// Pointer / reference / pointer-to-member.
    Pointer {
        /// Pointed-to node.
        element: NodeId,
        /// Shape and qualifiers.
        flags: PointerFlags,
    },
    /// Const/volatile wrapper.
    Modifier {
        /// Wrapped node.
        element: NodeId,
        /// Qualifiers.
        flags: ModifierFlags,
    },
    /// Fixed-length array.
    Array {
        /// Element node.
        element: NodeId,
        /// Element count; zero-length arrays exist and are flagged downstream.
        length: u64,
    },
    /// Bitfield over a scalar backing unit.
    Bitfield {
        /// Backing scalar node.
        element: NodeId,
        /// First bit position.
        start_bit: u16,
        /// Bit width.
        bits: u16,
    },
    /// Enumeration.
    Enum(EnumData),
    /// Struct / class / union.
    Aggregate(AggregateData),
    /// Procedure type, or a named procedure symbol when the node is named.
    Procedure(ProcData),
    /// Global variable symbol.
    Var {
        /// Datum type node.
        element: NodeId,
    },
    /// Alias left behind when a nested type is flattened to top level.
    Using {
        /// Aliased node.
        target: NodeId,
    },
    /// Pure grouping namespace, synthesized during name resolution.
    Namespace,
}

impl NodeKind {
    fn caps(&self) -> Caps {
        match self {
            NodeKind::Void => Caps::SIZED,
            NodeKind::Scalar(_) => Caps::SIZED | Caps::NAMED,
            NodeKind::Pointer { .. } | NodeKind::Array { .. } | NodeKind::Bitfield { .. } | NodeKind::Modifier { .. } => {
                Caps::SIZED | Caps::ELEMENT_TYPED
            }
            NodeKind::Enum(_) => Caps::SIZED | Caps::NAMED | Caps::PARENTED | Caps::MISSABLE,
            NodeKind::Aggregate(_) => Caps::SIZED | Caps::NAMED | Caps::PARENTED | Caps::MISSABLE,
            NodeKind::Procedure(_) => Caps::NAMED | Caps::ADDRESSABLE | Caps::MISSABLE,
            NodeKind::Var { .. } => {
                Caps::SIZED | Caps::NAMED | Caps::ELEMENT_TYPED | Caps::ADDRESSABLE | Caps::PARENTED
            }
            NodeKind::Using { .. } => Caps::NAMED | Caps::ELEMENT_TYPED | Caps::PARENTED,
            NodeKind::Namespace => Caps::NAMED | Caps::PARENTED,
        }
    }

    /// Short tag for error messages.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            NodeKind::Void => "void",
            NodeKind::Scalar(_) => "scalar",
            NodeKind::Pointer { .. } => "pointer",
            NodeKind::Modifier { .. } => "modifier",
            NodeKind::Array { .. } => "array",
            NodeKind::Bitfield { .. } => "bitfield",
            NodeKind::Enum(_) => "enum",
            NodeKind::Aggregate(data) => match data.kind {
                AggregateKind::Struct => "struct",
                AggregateKind::Class => "class",
                AggregateKind::Union => "union",
            },
            NodeKind::Procedure(_) => "procedure",
            NodeKind::Var { .. } => "var",
            NodeKind::Using { .. } => "using",
            NodeKind::Namespace => "namespace",
        }
    }
}

/// Name of a node: original qualified segments plus an independently settable display form.
#[derive(Debug, Clone)]
pub struct NodeName {
    /// Segments as dumped, outermost first.
    pub orig: Vec<String>,
    /// Display segments, rewritten by name resolution.
    pub display: Vec<String>,
}

impl NodeName {
    /// Name with display initialized to the original segments.
    #[must_use]
    pub fn new(orig: Vec<String>) -> Self {
        let display = orig.clone();
        NodeName { orig, display }
    }

    /// Original qualified name joined with `::`.
    #[must_use]
    pub fn orig_qualified(&self) -> String {
        self.orig.join("::")
    }

    /// Display qualified name joined with `::`.
    #[must_use]
    pub fn display_qualified(&self) -> String {
        self.display.join("::")
    }

    /// Original unqualified (rightmost) segment.
    #[must_use]
    pub fn orig_local(&self) -> &str {
        self.orig.last().map_or("", String::as_str)
    }

    /// Display unqualified (rightmost) segment.
    #[must_use]
    pub fn display_local(&self) -> &str {
        self.display.last().map_or("", String::as_str)
    }
}

/// One node of the type graph.
#[derive(Debug, Clone)]
pub struct Node {
    /// Unique id.
    pub id: NodeId,
    /// Variant payload.
    pub kind: NodeKind,
    caps: Caps,
    size: u64,
    name: Option<NodeName>,
    address: Option<Address>,
    absolute: Option<u64>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    miss: Vec<MissReason>,
    auto_gen_for_fwd: bool,
    local: bool,
}

impl Node {
    /// Creates a node; capabilities derive from the kind.
    #[must_use]
    pub fn new(id: NodeId, kind: NodeKind, size: u64) -> Self {
        let caps = kind.caps();
        Node {
            id,
            kind,
            caps,
            size,
            name: None,
            address: None,
            absolute: None,
            parent: None,
            children: Vec::new(),
            miss: Vec::new(),
            auto_gen_for_fwd: false,
            local: false,
        }
    }

    /// Capability set.
    #[must_use]
    pub fn caps(&self) -> Caps {
        self.caps
    }

    /// `true` if the node carries the given capability.
    #[must_use]
    pub fn has_cap(&self, cap: Caps) -> bool {
        self.caps.contains(cap)
    }

    /// Byte size; zero only for incomplete markers and unsized kinds.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.size
    }

    pub(crate) fn set_size(&mut self, size: u64) {
        self.size = size;
    }

    /// Node name, if named.
    #[must_use]
    pub fn name(&self) -> Option<&NodeName> {
        self.name.as_ref()
    }

    /// Installs the name.
    pub fn set_name(&mut self, name: NodeName) {
        self.name = Some(name);
    }

    /// Overwrites the display segments, leaving the original untouched.
    pub fn set_display_parts(&mut self, parts: Vec<String>) {
        if let Some(name) = self.name.as_mut() {
            name.display = parts;
        }
    }

    /// Display qualified name, or a placeholder for unnamed nodes.
    #[must_use]
    pub fn display_path(&self) -> String {
        self.name.as_ref().map_or_else(|| format!("<{}>", self.id), NodeName::display_qualified)
    }

    /// Bound section-relative address.
    #[must_use]
    pub fn address(&self) -> Option<Address> {
        self.address
    }

    /// Binds the address. Rebinding an identical pair is a no-op.
    ///
    /// # Errors
    /// Returns [`crate::Error::AddressConflict`] on a conflicting rebind.
    pub fn set_address(&mut self, address: Address) -> Result<()> {
        match self.address {
            None => {
                self.address = Some(address);
                Ok(())
            }
            Some(existing) if existing == address => Ok(()),
            Some(existing) => Err(crate::Error::AddressConflict {
                node: self.id.raw(),
                old_section: existing.section,
                old_offset: existing.offset,
                new_section: address.section,
                new_offset: address.offset,
            }),
        }
    }

    /// Resolved absolute address.
    #[must_use]
    pub fn absolute(&self) -> Option<u64> {
        self.absolute
    }

    /// Binds the absolute address. Rebinding the identical value is a no-op.
    ///
    /// # Errors
    /// Returns [`crate::Error::AddressConflict`] on a conflicting rebind.
    pub fn set_absolute(&mut self, absolute: u64) -> Result<()> {
        match self.absolute {
            None => {
                self.absolute = Some(absolute);
                Ok(())
            }
            Some(existing) if existing == absolute => Ok(()),
            Some(existing) => Err(crate::Error::AddressConflict {
                node: self.id.raw(),
                old_section: 0,
                old_offset: existing,
                new_section: 0,
                new_offset: absolute,
            }),
        }
    }

    /// Parent node, when owned.
    #[must_use]
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub(crate) fn set_parent(&mut self, parent: Option<NodeId>) {
        self.parent = parent;
    }

    /// Owned children in attachment order.
    #[must_use]
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub(crate) fn add_child(&mut self, child: NodeId) {
        if !self.children.contains(&child) {
            self.children.push(child);
        }
    }

    pub(crate) fn del_child(&mut self, child: NodeId) {
        self.children.retain(|&c| c != child);
    }

    /// Missing reasons attached to the node itself.
    #[must_use]
    pub fn miss(&self) -> &[MissReason] {
        &self.miss
    }

    /// Appends a missing reason, skipping exact duplicates.
    pub fn add_miss_reason(&mut self, reason: MissReason) {
        if !self.miss.contains(&reason) {
            self.miss.push(reason);
        }
    }

    /// `true` when any missing reason is recorded.
    #[must_use]
    pub fn is_miss(&self) -> bool {
        !self.miss.is_empty()
    }

    /// Placeholder synthesized for an unresolved forward reference.
    #[must_use]
    pub fn auto_gen_for_fwd(&self) -> bool {
        self.auto_gen_for_fwd
    }

    pub(crate) fn set_auto_gen_for_fwd(&mut self) {
        self.auto_gen_for_fwd = true;
    }

    /// Internal-linkage node; excluded from collision grouping and namespace nesting.
    #[must_use]
    pub fn is_local(&self) -> bool {
        self.local
    }

    pub(crate) fn set_local(&mut self, local: bool) {
        self.local = local;
    }

    /// Aggregate payload, if any.
    #[must_use]
    pub fn aggregate(&self) -> Option<&AggregateData> {
        match &self.kind {
            NodeKind::Aggregate(data) => Some(data),
            _ => None,
        }
    }

    /// Mutable aggregate payload, if any.
    pub fn aggregate_mut(&mut self) -> Option<&mut AggregateData> {
        match &mut self.kind {
            NodeKind::Aggregate(data) => Some(data),
            _ => None,
        }
    }

    /// Element node for element-typed kinds.
    #[must_use]
    pub fn element(&self) -> Option<NodeId> {
        match &self.kind {
            NodeKind::Pointer { element, .. }
            | NodeKind::Modifier { element, .. }
            | NodeKind::Array { element, .. }
            | NodeKind::Bitfield { element, .. }
            | NodeKind::Var { element } => Some(*element),
            NodeKind::Using { target } => Some(*target),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: u32) -> NodeId {
        NodeId::from_raw(raw).unwrap()
    }

    #[test]
    fn test_node_id_rejects_zero() {
        assert!(NodeId::from_raw(0).is_err());
        assert_eq!(id(16).raw(), 16);
    }

    #[test]
    fn test_caps_follow_kind() {
        let scalar = Node::new(id(1), NodeKind::Scalar(ScalarKind::Int32), 4);
        assert!(scalar.has_cap(Caps::SIZED));
        assert!(!scalar.has_cap(Caps::ADDRESSABLE));

        let var = Node::new(
            id(2),
            NodeKind::Var { element: id(1) },
            4,
        );
        assert!(var.has_cap(Caps::ADDRESSABLE));
        assert!(var.has_cap(Caps::ELEMENT_TYPED));
        assert_eq!(var.element(), Some(id(1)));
    }

    #[test]
    fn test_set_address_idempotent_and_conflicting() {
        let mut node = Node::new(
            id(3),
            NodeKind::Var { element: id(1) },
            4,
        );
        let addr = Address { section: 1, offset: 0x10 };
        node.set_address(addr).unwrap();
        node.set_address(addr).unwrap();
        assert_eq!(node.address(), Some(addr));

        let conflict = node.set_address(Address { section: 2, offset: 0x20 });
        assert!(matches!(conflict, Err(crate::Error::AddressConflict { .. })));
    }

    #[test]
    fn test_miss_reasons_dedupe_and_render() {
        let mut node = Node::new(
            id(4),
            NodeKind::Aggregate(AggregateData::new(AggregateKind::Struct)),
            8,
        );
        node.add_miss_reason(MissReason::Variadic);
        node.add_miss_reason(MissReason::Variadic);
        node.add_miss_reason(MissReason::BlockedNamespace("std".into()));
        assert_eq!(node.miss().len(), 2);
        assert_eq!(
            miss_info(node.miss()),
            "variadic arguments, blocked root namespace \"std\""
        );
    }

    #[test]
    fn test_display_name_independent_of_orig() {
        let mut node = Node::new(
            id(5),
            NodeKind::Aggregate(AggregateData::new(AggregateKind::Class)),
            8,
        );
        node.set_name(NodeName::new(vec!["ns".into(), "Widget".into()]));
        node.set_display_parts(vec!["ns".into(), "Widget$".into()]);

        let name = node.name().unwrap();
        assert_eq!(name.orig_qualified(), "ns::Widget");
        assert_eq!(name.display_qualified(), "ns::Widget$");
        assert_eq!(name.orig_local(), "Widget");
        assert_eq!(name.display_local(), "Widget$");
    }
}
