//! Serde models for the symbol-database document.
//!
//! The symbol-dump utility runs upstream and materializes the debug information of a binary
//! as one JSON document: type records, procedure symbols, global data symbols, section
//! headers, and demangled public names. These models mirror that document one to one; all
//! interpretation (reference resolution, invariant checks) happens in
//! [`crate::graph::builder`].
//!
//! # Key Components
//!
//! - [`TypeRecord`] / [`TypePayload`] - one type record per id, payload tagged by `kind`
//! - [`FieldRecord`] - one entry of a field list, tagged by `kind`
//! - [`RecordRef`] - a reference to another record by id, or to a builtin primitive
//! - [`ProcRecord`], [`DataRecord`], [`SectionRecord`], [`NameRecord`] - symbol tables

use serde::Deserialize;

/// Reference to a type: either another record by id, or a builtin primitive by name.
///
/// `{"builtin": "int32"}` names a scalar (or `"void"`); `{"builtin": "void", "ptr": true}`
/// is shorthand for a pointer to the builtin, used where the dump collapsed a trivial
/// pointer type that has no record of its own.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum RecordRef {
    /// Reference to the type record with this id.
    Id(u32),
    /// Builtin primitive, optionally wrapped in one pointer level.
    Builtin {
        /// Primitive name, e.g. `"int32"`, `"uint8"`, `"void"`.
        builtin: String,
        /// Wrap the primitive in one pointer level.
        #[serde(default)]
        ptr: bool,
    },
}

/// Member attribute block shared by data members, methods, and base classes.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MemberAttrsRecord {
    /// Access specifier (`"public"` / `"protected"` / `"private"`), informational only.
    #[serde(default)]
    pub access: Option<String>,
    /// Virtual method.
    #[serde(default, rename = "virtual")]
    pub is_virtual: bool,
    /// First introduction of a virtual method (carries the vtable slot offset).
    #[serde(default)]
    pub intro: bool,
    /// Pure virtual.
    #[serde(default)]
    pub pure: bool,
    /// Static member.
    #[serde(default, rename = "static")]
    pub is_static: bool,
}

/// One entry of a field list, tagged by `kind`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum FieldRecord {
    /// Instance data member.
    Member {
        /// Member name as dumped (possibly truncated).
        name: String,
        /// Member type.
        #[serde(rename = "type")]
        ty: RecordRef,
        /// Byte offset within the owning aggregate.
        offset: u64,
        /// Attributes.
        #[serde(default)]
        attrs: MemberAttrsRecord,
    },
    /// Static data member; its address arrives separately through data/name symbols.
    StaticMember {
        /// Member name.
        name: String,
        /// Member type.
        #[serde(rename = "type")]
        ty: RecordRef,
        /// Attributes.
        #[serde(default)]
        attrs: MemberAttrsRecord,
    },
    /// Single (non-overloaded) method.
    OneMethod {
        /// Method name.
        name: String,
        /// Member-function (or procedure, for static methods) type record id.
        #[serde(rename = "type")]
        ty: u32,
        /// Attributes.
        #[serde(default)]
        attrs: MemberAttrsRecord,
        /// Vtable slot byte offset, present on introducing virtual methods.
        #[serde(default)]
        vfptr_offset: Option<u64>,
    },
    /// Overloaded method group; expands through a method-list record.
    Method {
        /// Shared method name.
        name: String,
        /// Referenced method-list record id.
        method_list: u32,
        /// Number of overloads in the list.
        count: u32,
    },
    /// Nested type declaration.
    NestedType {
        /// Local name of the nested type.
        name: String,
        /// Nested type record.
        #[serde(rename = "type")]
        ty: RecordRef,
    },
    /// Direct base class.
    BaseClass {
        /// Base type record.
        #[serde(rename = "type")]
        ty: RecordRef,
        /// Byte offset of the base subobject.
        offset: u64,
        /// Attributes.
        #[serde(default)]
        attrs: MemberAttrsRecord,
    },
    /// Virtual-function-table pointer marker.
    VfuncTab {
        /// Pointer-to-vt-shape type record.
        #[serde(rename = "type")]
        ty: RecordRef,
    },
    /// Direct virtual base class marker.
    VirtualBase {
        /// Base type record.
        #[serde(rename = "type")]
        ty: RecordRef,
    },
    /// Indirect virtual base class marker.
    IndirectVirtualBase {
        /// Base type record.
        #[serde(rename = "type")]
        ty: RecordRef,
    },
    /// Enumerator (only valid inside an enum's field list).
    Enumerate {
        /// Enumerator name.
        name: String,
        /// Enumerator value.
        value: i64,
    },
}

/// Struct / class / union record.
#[derive(Debug, Clone, Deserialize)]
pub struct AggregateRecord {
    /// Qualified name as dumped.
    pub name: String,
    /// Declared byte size (zero on forward references).
    #[serde(default)]
    pub size: u64,
    /// Declared number of field-list entries, counting each method-list overload.
    #[serde(default)]
    pub member_count: u32,
    /// Referenced field-list record id; absent on forward references.
    #[serde(default)]
    pub field_list: Option<u32>,
    /// Forward reference without a body.
    #[serde(default)]
    pub forward: bool,
    /// Internal-linkage (function-local or anonymous-namespace) type.
    #[serde(default)]
    pub local: bool,
}

/// Enum record.
#[derive(Debug, Clone, Deserialize)]
pub struct EnumRecord {
    /// Qualified name as dumped.
    pub name: String,
    /// Backing scalar type.
    pub backing: RecordRef,
    /// Declared enumerator count.
    #[serde(default)]
    pub member_count: u32,
    /// Referenced field-list record id; absent on forward references.
    #[serde(default)]
    pub field_list: Option<u32>,
    /// Forward reference without a body.
    #[serde(default)]
    pub forward: bool,
    /// Internal-linkage type.
    #[serde(default)]
    pub local: bool,
    /// Scoped enumeration (`enum class`).
    #[serde(default)]
    pub scoped: bool,
}

/// Pointer addressing mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PointerModeRecord {
    /// Plain pointer.
    #[default]
    Pointer,
    /// Lvalue reference.
    LvalueRef,
    /// Pointer to data member.
    MemberData,
    /// Pointer to member function.
    MemberFunc,
}

/// Pointer record.
#[derive(Debug, Clone, Deserialize)]
pub struct PointerRecord {
    /// Pointed-to type.
    pub element: RecordRef,
    /// Addressing mode.
    #[serde(default)]
    pub mode: PointerModeRecord,
    /// `const`-qualified pointer.
    #[serde(default, rename = "const")]
    pub is_const: bool,
    /// `volatile`-qualified pointer.
    #[serde(default, rename = "volatile")]
    pub is_volatile: bool,
}

/// Const/volatile modifier record.
#[derive(Debug, Clone, Deserialize)]
pub struct ModifierRecord {
    /// Wrapped type.
    pub element: RecordRef,
    /// `const` qualifier.
    #[serde(default, rename = "const")]
    pub is_const: bool,
    /// `volatile` qualifier.
    #[serde(default, rename = "volatile")]
    pub is_volatile: bool,
}

/// Array record.
#[derive(Debug, Clone, Deserialize)]
pub struct ArrayRecord {
    /// Element type.
    pub element: RecordRef,
    /// Element count; zero-length arrays are legal input and handled downstream.
    pub length: u64,
}

/// Bitfield record.
#[derive(Debug, Clone, Deserialize)]
pub struct BitfieldRecord {
    /// Backing scalar type.
    pub element: RecordRef,
    /// First bit position within the backing unit.
    pub start: u16,
    /// Bit width.
    pub bits: u16,
}

/// Free-procedure type record.
#[derive(Debug, Clone, Deserialize)]
pub struct ProcedureRecord {
    /// Return type.
    pub returns: RecordRef,
    /// Calling convention name, e.g. `"cdecl"`.
    #[serde(default)]
    pub convention: Option<String>,
    /// Declared parameter count, including a trailing variadic marker.
    pub param_count: u32,
    /// Parameter types in order; a trailing `null` marks variadic arguments.
    pub params: Vec<Option<RecordRef>>,
}

/// Member-function type record.
#[derive(Debug, Clone, Deserialize)]
pub struct MemberFunctionRecord {
    /// Return type.
    pub returns: RecordRef,
    /// Calling convention name.
    #[serde(default)]
    pub convention: Option<String>,
    /// Owning class record id.
    pub class: u32,
    /// `this` pointer type; absent on static methods routed through this record kind.
    #[serde(default)]
    pub this: Option<RecordRef>,
    /// Fixed `this` displacement applied when calling through a derived vtable.
    #[serde(default)]
    pub this_adjust: i64,
    /// Declared parameter count, including a trailing variadic marker.
    pub param_count: u32,
    /// Parameter types in order; a trailing `null` marks variadic arguments.
    pub params: Vec<Option<RecordRef>>,
}

/// Field-list record.
#[derive(Debug, Clone, Deserialize)]
pub struct FieldListRecord {
    /// Entries in declaration order.
    #[serde(default)]
    pub fields: Vec<FieldRecord>,
}

/// One overload inside a method-list record.
#[derive(Debug, Clone, Deserialize)]
pub struct MethodEntry {
    /// Member-function type record id.
    #[serde(rename = "type")]
    pub ty: u32,
    /// Attributes.
    #[serde(default)]
    pub attrs: MemberAttrsRecord,
    /// Vtable slot byte offset, present on introducing virtual methods.
    #[serde(default)]
    pub vfptr_offset: Option<u64>,
}

/// Method-list record backing an overloaded `method` field.
#[derive(Debug, Clone, Deserialize)]
pub struct MethodListRecord {
    /// Overloads in declaration order.
    pub methods: Vec<MethodEntry>,
}

/// Virtual-table shape record.
#[derive(Debug, Clone, Deserialize)]
pub struct VtShapeRecord {
    /// Number of slots.
    #[serde(default)]
    pub count: u32,
}

/// Kind-tagged payload of a [`TypeRecord`].
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum TypePayload {
    /// `struct` definition or forward reference.
    Struct(AggregateRecord),
    /// `class` definition or forward reference.
    Class(AggregateRecord),
    /// `union` definition or forward reference.
    Union(AggregateRecord),
    /// `enum` definition or forward reference.
    Enum(EnumRecord),
    /// Pointer type.
    Pointer(PointerRecord),
    /// Const/volatile modifier.
    Modifier(ModifierRecord),
    /// Array type.
    Array(ArrayRecord),
    /// Free-procedure type.
    Procedure(ProcedureRecord),
    /// Member-function type.
    MemberFunction(MemberFunctionRecord),
    /// Bitfield type.
    Bitfield(BitfieldRecord),
    /// Field list (referenced by aggregates/enums, never a type itself).
    FieldList(FieldListRecord),
    /// Method list (referenced by overloaded method fields).
    MethodList(MethodListRecord),
    /// Virtual-table shape.
    VtShape(VtShapeRecord),
}

impl TypePayload {
    /// Short tag for error messages.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            TypePayload::Struct(_) => "struct",
            TypePayload::Class(_) => "class",
            TypePayload::Union(_) => "union",
            TypePayload::Enum(_) => "enum",
            TypePayload::Pointer(_) => "pointer",
            TypePayload::Modifier(_) => "modifier",
            TypePayload::Array(_) => "array",
            TypePayload::Procedure(_) => "procedure",
            TypePayload::MemberFunction(_) => "member-function",
            TypePayload::Bitfield(_) => "bitfield",
            TypePayload::FieldList(_) => "field-list",
            TypePayload::MethodList(_) => "method-list",
            TypePayload::VtShape(_) => "vt-shape",
        }
    }
}

/// One type record: positive id plus kind-tagged payload.
#[derive(Debug, Clone, Deserialize)]
pub struct TypeRecord {
    /// Record id, unique and greater than zero.
    pub id: u32,
    /// Kind-tagged payload.
    #[serde(flatten)]
    pub payload: TypePayload,
}

/// Procedure symbol with its code address.
#[derive(Debug, Clone, Deserialize)]
pub struct ProcRecord {
    /// Qualified (demangled) name.
    pub name: String,
    /// Function type record id, when the dump recovered one.
    #[serde(default, rename = "type")]
    pub ty: Option<u32>,
    /// Section id the body lives in.
    pub section: u16,
    /// Section-relative offset.
    pub offset: u64,
    /// Best-effort parameter names.
    #[serde(default)]
    pub arg_names: Vec<String>,
}

/// Global data symbol with its address.
#[derive(Debug, Clone, Deserialize)]
pub struct DataRecord {
    /// Qualified (demangled) name.
    pub name: String,
    /// Datum type.
    #[serde(rename = "type")]
    pub ty: RecordRef,
    /// Section id.
    pub section: u16,
    /// Section-relative offset.
    pub offset: u64,
}

/// Section header of the target binary.
#[derive(Debug, Clone, Deserialize)]
pub struct SectionRecord {
    /// 1-based section id.
    pub id: u16,
    /// Relative virtual address of the section start.
    pub rva: u64,
    /// Section byte size.
    pub size: u64,
    /// Alignment, informational.
    #[serde(default)]
    pub align: u32,
    /// Characteristics bits, informational.
    #[serde(default)]
    pub characteristics: u32,
    /// Section name.
    #[serde(default)]
    pub name: String,
}

/// Demangled public symbol; secondary, best-effort address source.
#[derive(Debug, Clone, Deserialize)]
pub struct NameRecord {
    /// Qualified (demangled) name.
    pub name: String,
    /// Section id.
    pub section: u16,
    /// Section-relative offset.
    pub offset: u64,
}

/// Top-level symbol-database document.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SymbolDocument {
    /// Type records.
    #[serde(default)]
    pub types: Vec<TypeRecord>,
    /// Procedure symbols.
    #[serde(default)]
    pub procs: Vec<ProcRecord>,
    /// Global data symbols.
    #[serde(default)]
    pub data: Vec<DataRecord>,
    /// Section headers.
    #[serde(default)]
    pub sections: Vec<SectionRecord>,
    /// Demangled public symbols.
    #[serde(default)]
    pub names: Vec<NameRecord>,
}
