//! Record-to-node construction.
//!
//! Turns the flat record tables of a [`SymbolDatabase`] into a [`TypeGraph`]: resolves
//! references on demand (leaves first), pairs forward references with their implementation
//! records, routes aggregate fields by role, expands method lists, and binds procedure /
//! data / public-name symbols to the nodes they address.
//!
//! Construction is idempotent per record id: every record builds exactly one node, and a
//! second request for the same id returns the memoized node. Aggregates register their
//! node before routing fields, so self-referential records (a struct holding a pointer to
//! itself) terminate.

use std::collections::HashMap;

use crate::diagnostics::{Category, DiagnosticLog};
use crate::graph::address::{SectionTable, DEFAULT_IMAGE_BASE};
use crate::graph::arena::TypeGraph;
use crate::graph::layout::POINTER_SIZE;
use crate::graph::node::{
    Address, AggregateData, AggregateKind, BaseSpec, DataMember, EnumData, EnumMember,
    FuncMember, MemberAttrs, ModifierFlags, Node, NodeId, NodeKind, NodeName, PointerFlags,
    ProcData, StaticMember,
};
use crate::graph::scalars::ScalarKind;
use crate::symbols::records::{
    AggregateRecord, EnumRecord, FieldRecord, MemberAttrsRecord, MemberFunctionRecord,
    PointerModeRecord, ProcedureRecord, RecordRef, TypePayload,
};
use crate::symbols::SymbolDatabase;
use crate::Result;

/// Dump tools truncate identifiers at this byte length; a member name of exactly this
/// length that prefixes its owner's name is assumed cut short.
const TRUNCATED_NAME_LEN: usize = 255;

/// Default calling convention when the dump omitted one.
const DEFAULT_CONVENTION: &str = "cdecl";

/// Tunables of a reconstruction run.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Load base added to every resolved address.
    pub image_base: u64,
    /// Build member functions as member-function nodes. When off, they degrade to plain
    /// procedures with `this` prepended as parameter 0.
    pub method_aware: bool,
    /// Root namespaces whose functions are excluded from emission.
    pub blocked_root_namespaces: Vec<String>,
    /// Cap on dependency-ordering passes; defaults to a bound proportional to graph size.
    pub max_order_passes: Option<usize>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        BuildOptions {
            image_base: DEFAULT_IMAGE_BASE,
            method_aware: true,
            blocked_root_namespaces: Vec::new(),
            max_order_passes: None,
        }
    }
}

/// Builds the full type graph and section table from a symbol database.
///
/// # Errors
/// Fatal on unsupported or self-inconsistent records, dangling references, and duplicate
/// ids; degradations (forward references without bodies, incomplete bases) are logged and
/// the run continues.
pub fn build(
    db: &SymbolDatabase,
    options: &BuildOptions,
    diag: &DiagnosticLog,
) -> Result<(TypeGraph, SectionTable)> {
    let sections = SectionTable::new(db.sections(), options.image_base)?;
    let mut builder = GraphBuilder::new(db, options, diag);
    builder.run()?;
    Ok((builder.graph, sections))
}

struct GraphBuilder<'a> {
    db: &'a SymbolDatabase,
    options: &'a BuildOptions,
    diag: &'a DiagnosticLog,
    graph: TypeGraph,
    by_record: HashMap<u32, NodeId>,
    impl_index: HashMap<(&'static str, String), u32>,
    builtin_cache: HashMap<String, NodeId>,
}

impl<'a> GraphBuilder<'a> {
    fn new(db: &'a SymbolDatabase, options: &'a BuildOptions, diag: &'a DiagnosticLog) -> Self {
        // Forward records resolve to the implementation record of the same kind and name.
        let mut impl_index = HashMap::new();
        for (id, payload) in db.types() {
            let key = match payload {
                TypePayload::Struct(r) | TypePayload::Class(r) | TypePayload::Union(r)
                    if !r.forward =>
                {
                    (payload.kind_name(), r.name.clone())
                }
                TypePayload::Enum(r) if !r.forward => (payload.kind_name(), r.name.clone()),
                _ => continue,
            };
            impl_index.entry(key).or_insert(id);
        }
        GraphBuilder {
            db,
            options,
            diag,
            graph: TypeGraph::new(),
            by_record: HashMap::new(),
            impl_index,
            builtin_cache: HashMap::new(),
        }
    }

    fn run(&mut self) -> Result<()> {
        // Leaves first: enums carry no cross-aggregate references.
        let enum_ids: Vec<u32> = self
            .db
            .types()
            .filter(|(_, p)| matches!(p, TypePayload::Enum(_)))
            .map(|(id, _)| id)
            .collect();
        for id in enum_ids {
            self.build_record(id)?;
        }

        let aggregate_ids: Vec<u32> = self
            .db
            .types()
            .filter(|(_, p)| {
                matches!(
                    p,
                    TypePayload::Struct(_) | TypePayload::Class(_) | TypePayload::Union(_)
                )
            })
            .map(|(id, _)| id)
            .collect();
        for id in aggregate_ids {
            self.build_record(id)?;
        }

        self.bind_procs()?;
        self.bind_data()?;
        self.bind_names()?;
        log::info!(
            "graph built: {} nodes from {} type records",
            self.graph.len(),
            self.db.type_count()
        );
        Ok(())
    }

    /// Resolves a record reference to a node, building it on demand.
    fn build_ref(&mut self, r: &RecordRef) -> Result<NodeId> {
        match r {
            RecordRef::Id(id) => self.build_record(*id),
            RecordRef::Builtin { builtin, ptr } => self.builtin_node(builtin, *ptr),
        }
    }

    fn builtin_node(&mut self, name: &str, ptr: bool) -> Result<NodeId> {
        let key = if ptr { format!("{name}*") } else { name.to_string() };
        if let Some(&id) = self.builtin_cache.get(&key) {
            return Ok(id);
        }
        let base = if let Some(&id) = self.builtin_cache.get(name) {
            id
        } else {
            let id = self.graph.alloc_id();
            let node = if name == "void" {
                Node::new(id, NodeKind::Void, 0)
            } else {
                let kind = ScalarKind::parse(name)?;
                let mut node = Node::new(id, NodeKind::Scalar(kind), kind.size());
                node.set_name(NodeName::new(vec![kind.to_string()]));
                node
            };
            self.graph.insert(node)?;
            self.builtin_cache.insert(name.to_string(), id);
            id
        };
        if !ptr {
            return Ok(base);
        }
        let id = self.graph.alloc_id();
        self.graph.insert(Node::new(
            id,
            NodeKind::Pointer { element: base, flags: PointerFlags::POINTER },
            POINTER_SIZE,
        ))?;
        self.builtin_cache.insert(key, id);
        Ok(id)
    }

    /// Builds the node for a type record, memoized per id.
    fn build_record(&mut self, id: u32) -> Result<NodeId> {
        if let Some(&node) = self.by_record.get(&id) {
            return Ok(node);
        }
        let payload = self.db.type_record(id)?.clone();
        let node = match payload {
            TypePayload::Struct(r) => self.build_aggregate(id, AggregateKind::Struct, &r)?,
            TypePayload::Class(r) => self.build_aggregate(id, AggregateKind::Class, &r)?,
            TypePayload::Union(r) => self.build_aggregate(id, AggregateKind::Union, &r)?,
            TypePayload::Enum(r) => self.build_enum(id, &r)?,
            TypePayload::Pointer(r) => {
                let element = self.build_ref(&r.element)?;
                let mut flags = match r.mode {
                    PointerModeRecord::Pointer => PointerFlags::POINTER,
                    PointerModeRecord::LvalueRef => PointerFlags::LVALUE_REF,
                    PointerModeRecord::MemberData => PointerFlags::MEMBER_DATA,
                    PointerModeRecord::MemberFunc => PointerFlags::MEMBER_FUNC,
                };
                flags.set(PointerFlags::CONST, r.is_const);
                flags.set(PointerFlags::VOLATILE, r.is_volatile);
                self.install(
                    id,
                    Node::new(self.ids(id), NodeKind::Pointer { element, flags }, POINTER_SIZE),
                )?
            }
            TypePayload::Modifier(r) => {
                let element = self.build_ref(&r.element)?;
                let mut flags = ModifierFlags::empty();
                flags.set(ModifierFlags::CONST, r.is_const);
                flags.set(ModifierFlags::VOLATILE, r.is_volatile);
                let size = self.graph.node(element)?.size();
                self.install(id, Node::new(self.ids(id), NodeKind::Modifier { element, flags }, size))?
            }
            TypePayload::Array(r) => {
                let element = self.build_ref(&r.element)?;
                let element_size = self.graph.node(element)?.size();
                let size = element_size.checked_mul(r.length).ok_or_else(|| {
                    malformed_error!(
                        "array {:#x} size {element_size}*{} overflows",
                        id,
                        r.length
                    )
                })?;
                self.install(
                    id,
                    Node::new(self.ids(id), NodeKind::Array { element, length: r.length }, size),
                )?
            }
            TypePayload::Bitfield(r) => {
                let element = self.build_ref(&r.element)?;
                let backing = self.graph.node(self.graph.strip_modifiers(element)?)?;
                let backing_bits = match &backing.kind {
                    NodeKind::Scalar(kind) => kind.bits(),
                    NodeKind::Enum(_) => backing.size() * 8,
                    other => {
                        return Err(malformed_error!(
                            "bitfield {:#x} backed by non-scalar {}",
                            id,
                            other.kind_name()
                        ))
                    }
                };
                if u64::from(r.start) + u64::from(r.bits) > backing_bits {
                    return Err(malformed_error!(
                        "bitfield {:#x} range {}+{} exceeds {} backing bits",
                        id,
                        r.start,
                        r.bits,
                        backing_bits
                    ));
                }
                let size = self.graph.node(element)?.size();
                self.install(
                    id,
                    Node::new(
                        self.ids(id),
                        NodeKind::Bitfield { element, start_bit: r.start, bits: r.bits },
                        size,
                    ),
                )?
            }
            TypePayload::Procedure(r) => {
                let data = self.build_proc_data(id, &r)?;
                self.install(id, Node::new(self.ids(id), NodeKind::Procedure(data), 0))?
            }
            TypePayload::MemberFunction(r) => {
                let data = self.build_member_function_data(id, &r)?;
                self.install(id, Node::new(self.ids(id), NodeKind::Procedure(data), 0))?
            }
            TypePayload::FieldList(_) | TypePayload::MethodList(_) | TypePayload::VtShape(_) => {
                return Err(malformed_error!(
                    "record {:#x} ({}) referenced as a type",
                    id,
                    self.db.type_record(id)?.kind_name()
                ))
            }
        };
        Ok(node)
    }

    fn ids(&self, raw: u32) -> NodeId {
        // Record ids were validated positive at database load.
        NodeId::from_raw(raw).unwrap_or_else(|_| unreachable!("record id zero rejected at load"))
    }

    fn install(&mut self, record: u32, node: Node) -> Result<NodeId> {
        let id = self.graph.insert(node)?;
        self.by_record.insert(record, id);
        Ok(id)
    }

    fn build_aggregate(
        &mut self,
        id: u32,
        kind: AggregateKind,
        record: &AggregateRecord,
    ) -> Result<NodeId> {
        if record.forward {
            let kind_tag = match kind {
                AggregateKind::Struct => "struct",
                AggregateKind::Class => "class",
                AggregateKind::Union => "union",
            };
            return self.resolve_forward(id, kind_tag, &record.name, false);
        }
        let field_list = record.field_list.ok_or_else(|| {
            malformed_error!("{} {:#x} \"{}\" has no field list", kind, id, record.name)
        })?;

        // Register before routing fields so self-references terminate.
        let node_id = self.ids(id);
        let mut node = Node::new(node_id, NodeKind::Aggregate(AggregateData::new(kind)), record.size);
        node.set_name(NodeName::new(split_path(&record.name)));
        node.set_local(record.local);
        self.install(id, node)?;

        let fields = self.field_list(field_list)?;

        // A base whose type only ever appeared as a forward reference leaves the whole
        // layout unknowable; the aggregate becomes a placeholder.
        for field in &fields {
            let base_ref = match field {
                FieldRecord::BaseClass { ty, .. } => ty,
                _ => continue,
            };
            let base = self.build_ref(base_ref)?;
            if self.graph.node(base)?.auto_gen_for_fwd() {
                self.diag.record(
                    Category::IncompleteParentType,
                    format!("{} \"{}\" extends an incomplete base", kind, record.name),
                );
                let node = self.graph.node_mut(node_id)?;
                node.set_auto_gen_for_fwd();
                node.set_size(1);
                return Ok(node_id);
            }
        }

        let data = self.route_fields(node_id, id, kind, record, &fields)?;
        self.graph.node_mut(node_id)?.kind = NodeKind::Aggregate(data);
        Ok(node_id)
    }

    fn route_fields(
        &mut self,
        node_id: NodeId,
        record_id: u32,
        kind: AggregateKind,
        record: &AggregateRecord,
        fields: &[FieldRecord],
    ) -> Result<AggregateData> {
        let owner_local = split_path(&record.name).pop().unwrap_or_default();
        let mut data = AggregateData::new(kind);
        let mut member_index = 0u32;
        let mut counted = 0u32;

        for field in fields {
            counted += 1;
            match field {
                FieldRecord::Member { name, ty, offset, attrs } => {
                    let ty = self.build_ref(ty)?;
                    let name = self.restore_name(name, &owner_local, &record.name);
                    data.members.push(DataMember {
                        name,
                        ty,
                        offset: *offset,
                        index: member_index,
                        attrs: convert_attrs(attrs),
                        miss: Vec::new(),
                    });
                    member_index += 1;
                }
                FieldRecord::StaticMember { name, ty, attrs } => {
                    let ty = self.build_ref(ty)?;
                    let name = self.restore_name(name, &owner_local, &record.name);
                    data.statics.push(StaticMember {
                        name,
                        ty,
                        attrs: convert_attrs(attrs) | MemberAttrs::STATIC,
                        address: None,
                        absolute: None,
                        miss: Vec::new(),
                    });
                }
                FieldRecord::OneMethod { name, ty, attrs, vfptr_offset } => {
                    let ty = self.build_record(*ty)?;
                    let name = self.restore_name(name, &owner_local, &record.name);
                    data.methods.push(FuncMember {
                        name,
                        ty,
                        attrs: convert_attrs(attrs),
                        vfptr_offset: *vfptr_offset,
                        address: None,
                        absolute: None,
                        miss: Vec::new(),
                    });
                }
                FieldRecord::Method { name, method_list, count } => {
                    let name = self.restore_name(name, &owner_local, &record.name);
                    let entries = match self.db.type_record(*method_list)? {
                        TypePayload::MethodList(list) => list.methods.clone(),
                        other => {
                            return Err(malformed_error!(
                                "method \"{}\" of \"{}\" references {} record {:#x}",
                                name,
                                record.name,
                                other.kind_name(),
                                method_list
                            ))
                        }
                    };
                    if *count == 0 {
                        return Err(malformed_error!(
                            "method \"{}\" of \"{}\" declares zero overloads",
                            name,
                            record.name
                        ));
                    }
                    if entries.len() as u32 != *count {
                        return Err(malformed_error!(
                            "method list {:#x} holds {} overloads, field declares {}",
                            method_list,
                            entries.len(),
                            count
                        ));
                    }
                    counted += count - 1;
                    for entry in &entries {
                        let ty = self.build_record(entry.ty)?;
                        data.methods.push(FuncMember {
                            name: name.clone(),
                            ty,
                            attrs: convert_attrs(&entry.attrs),
                            vfptr_offset: entry.vfptr_offset,
                            address: None,
                            absolute: None,
                            miss: Vec::new(),
                        });
                    }
                }
                FieldRecord::NestedType { ty, .. } => {
                    let nested = self.build_ref(ty)?;
                    if !data.nested.contains(&nested) {
                        data.nested.push(nested);
                    }
                    if self.graph.node(nested)?.parent().is_none() {
                        self.graph.node_mut(nested)?.set_parent(Some(node_id));
                        self.graph.node_mut(node_id)?.add_child(nested);
                    }
                }
                FieldRecord::BaseClass { ty, offset, .. } => {
                    let base = self.build_ref(ty)?;
                    if data.bases.iter().any(|b| b.offset == *offset) {
                        return Err(malformed_error!(
                            "\"{}\" declares two bases at offset {:#x}",
                            record.name,
                            offset
                        ));
                    }
                    data.bases.push(BaseSpec { ty: base, offset: *offset });
                }
                FieldRecord::VfuncTab { ty } => {
                    if data.vtable_shape.is_some() {
                        return Err(malformed_error!(
                            "\"{}\" declares two vfunc-table markers",
                            record.name
                        ));
                    }
                    data.vtable_shape = Some(self.vtable_shape_slots(ty));
                }
                FieldRecord::VirtualBase { ty } | FieldRecord::IndirectVirtualBase { ty } => {
                    self.build_ref(ty)?;
                    data.has_virtual_base = true;
                    log::debug!("\"{}\" carries a virtual base", record.name);
                }
                FieldRecord::Enumerate { name, .. } => {
                    return Err(malformed_error!(
                        "enumerator \"{}\" inside {} \"{}\"",
                        name,
                        kind,
                        record.name
                    ))
                }
            }
        }

        if counted != record.member_count {
            return Err(malformed_error!(
                "\"{}\" ({:#x}) declares {} members, field list yields {}",
                record.name,
                record_id,
                record.member_count,
                counted
            ));
        }
        if kind == AggregateKind::Union && !data.bases.is_empty() {
            return Err(malformed_error!("union \"{}\" declares a base class", record.name));
        }
        if kind == AggregateKind::Union && data.vtable_shape.is_some() {
            return Err(malformed_error!("union \"{}\" declares a vtable", record.name));
        }
        Ok(data)
    }

    /// Slot count behind a vfunc-table marker: pointer record to a vt-shape record.
    /// Shape resolution is best-effort; a broken chain yields zero slots.
    fn vtable_shape_slots(&self, marker: &RecordRef) -> u32 {
        let RecordRef::Id(pointer_id) = marker else { return 0 };
        let Some(TypePayload::Pointer(ptr)) = self.db.try_type_record(*pointer_id) else {
            return 0;
        };
        let RecordRef::Id(shape_id) = &ptr.element else { return 0 };
        match self.db.try_type_record(*shape_id) {
            Some(TypePayload::VtShape(shape)) => shape.count,
            _ => 0,
        }
    }

    fn build_enum(&mut self, id: u32, record: &EnumRecord) -> Result<NodeId> {
        if record.forward {
            return self.resolve_forward(id, "enum", &record.name, true);
        }
        let field_list = record.field_list.ok_or_else(|| {
            malformed_error!("enum {:#x} \"{}\" has no field list", id, record.name)
        })?;
        let backing = self.build_ref(&record.backing)?;
        let backing_node = self.graph.node(self.graph.strip_modifiers(backing)?)?;
        if !matches!(backing_node.kind, NodeKind::Scalar(_)) {
            return Err(malformed_error!(
                "enum \"{}\" backed by non-scalar {}",
                record.name,
                backing_node.kind.kind_name()
            ));
        }
        let size = backing_node.size();

        let mut members = Vec::new();
        for field in self.field_list(field_list)? {
            match field {
                FieldRecord::Enumerate { name, value } => {
                    members.push(EnumMember { name, value });
                }
                other => {
                    return Err(malformed_error!(
                        "non-enumerator field in enum \"{}\": {:?}",
                        record.name,
                        std::mem::discriminant(&other)
                    ))
                }
            }
        }
        if members.len() as u32 != record.member_count {
            return Err(malformed_error!(
                "enum \"{}\" declares {} members, field list yields {}",
                record.name,
                record.member_count,
                members.len()
            ));
        }

        let node_id = self.ids(id);
        let mut node = Node::new(
            node_id,
            NodeKind::Enum(EnumData { backing, members, scoped: record.scoped }),
            size,
        );
        node.set_name(NodeName::new(split_path(&record.name)));
        node.set_local(record.local);
        self.install(id, node)
    }

    /// Pairs a forward record with its implementation, or synthesizes a placeholder.
    fn resolve_forward(
        &mut self,
        id: u32,
        kind_tag: &'static str,
        name: &str,
        is_enum: bool,
    ) -> Result<NodeId> {
        if let Some(&impl_id) = self.impl_index.get(&(kind_tag, name.to_string())) {
            if impl_id != id {
                let node = self.build_record(impl_id)?;
                self.by_record.insert(id, node);
                return Ok(node);
            }
        }

        self.diag.record(
            Category::IncompleteType,
            format!("{kind_tag} \"{name}\" has no implementation record"),
        );
        let node_id = self.ids(id);
        let mut node = if is_enum {
            let backing = self.builtin_node("int32", false)?;
            Node::new(
                node_id,
                NodeKind::Enum(EnumData { backing, members: Vec::new(), scoped: false }),
                4,
            )
        } else {
            let kind = match kind_tag {
                "class" => AggregateKind::Class,
                "union" => AggregateKind::Union,
                _ => AggregateKind::Struct,
            };
            Node::new(node_id, NodeKind::Aggregate(AggregateData::new(kind)), 1)
        };
        node.set_name(NodeName::new(split_path(name)));
        node.set_auto_gen_for_fwd();
        self.install(id, node)
    }

    fn build_proc_data(&mut self, id: u32, record: &ProcedureRecord) -> Result<ProcData> {
        let params = self.build_params(id, record.param_count, &record.params)?;
        Ok(ProcData {
            convention: record
                .convention
                .clone()
                .unwrap_or_else(|| DEFAULT_CONVENTION.to_string()),
            return_type: self.build_ref(&record.returns)?,
            params,
            class: None,
            this: None,
            this_adjust: 0,
        })
    }

    fn build_member_function_data(
        &mut self,
        id: u32,
        record: &MemberFunctionRecord,
    ) -> Result<ProcData> {
        let return_type = self.build_ref(&record.returns)?;
        let mut params = self.build_params(id, record.param_count, &record.params)?;
        let this = record.this.as_ref().map(|t| self.build_ref(t)).transpose()?;
        let class = self.build_record(record.class)?;
        let convention = record
            .convention
            .clone()
            .unwrap_or_else(|| DEFAULT_CONVENTION.to_string());

        // The this pointer must point back at the owning class, modulo const.
        if let Some(this) = this {
            let pointee = match self.graph.node(this)?.kind {
                NodeKind::Pointer { element, .. } => element,
                _ => {
                    return Err(malformed_error!(
                        "member function {:#x} has a non-pointer this type",
                        id
                    ))
                }
            };
            let stripped = self.graph.strip_modifiers(pointee)?;
            if stripped != class {
                return Err(malformed_error!(
                    "member function {:#x}: this points at {} instead of owning class {}",
                    id,
                    stripped,
                    class
                ));
            }
        }

        if !self.options.method_aware {
            self.diag.record(
                Category::MemberFunctionToProcedure,
                format!("member function {id:#x} built as plain procedure"),
            );
            if let Some(this) = this {
                params.insert(0, Some(this));
            }
            return Ok(ProcData {
                convention,
                return_type,
                params,
                class: None,
                this: None,
                this_adjust: record.this_adjust,
            });
        }

        Ok(ProcData {
            convention,
            return_type,
            params,
            class: Some(class),
            this,
            this_adjust: record.this_adjust,
        })
    }

    fn build_params(
        &mut self,
        id: u32,
        declared: u32,
        params: &[Option<RecordRef>],
    ) -> Result<Vec<Option<NodeId>>> {
        if params.len() as u32 != declared {
            return Err(malformed_error!(
                "procedure {:#x} declares {} parameters, list yields {}",
                id,
                declared,
                params.len()
            ));
        }
        params
            .iter()
            .map(|p| p.as_ref().map(|r| self.build_ref(r)).transpose())
            .collect()
    }

    fn field_list(&self, id: u32) -> Result<Vec<FieldRecord>> {
        match self.db.type_record(id)? {
            TypePayload::FieldList(list) => Ok(list.fields.clone()),
            other => Err(malformed_error!(
                "record {:#x} is a {}, expected a field list",
                id,
                other.kind_name()
            )),
        }
    }

    fn restore_name(&self, raw: &str, owner_local: &str, owner_path: &str) -> String {
        if raw.len() < TRUNCATED_NAME_LEN {
            return raw.to_string();
        }
        let destructor = format!("~{owner_local}");
        let full = if owner_local.starts_with(raw) {
            owner_local.to_string()
        } else if destructor.starts_with(raw) {
            destructor
        } else {
            return raw.to_string();
        };
        self.diag.record(
            Category::RestoredMemberName,
            format!("\"{owner_path}\": truncated member restored to \"{full}\""),
        );
        full
    }

    /// Binds procedure symbols: member functions get their address on the owning method
    /// entry; everything else becomes a named top-level procedure node.
    fn bind_procs(&mut self) -> Result<()> {
        let procs = self.db.procs().to_vec();
        for proc in &procs {
            let address = Address { section: proc.section, offset: proc.offset };
            if let Some(ty) = proc.ty {
                if self.bind_method_address(ty, &proc.name, address)? {
                    continue;
                }
            }

            let data = match proc.ty {
                Some(ty) => {
                    let node = self.build_record(ty)?;
                    match self.graph.node(node)?.kind.clone() {
                        NodeKind::Procedure(data) => data,
                        other => {
                            return Err(malformed_error!(
                                "procedure symbol \"{}\" references {} record {:#x}",
                                proc.name,
                                other.kind_name(),
                                ty
                            ))
                        }
                    }
                }
                // Public symbols without a recovered function type still get a node, so
                // their address survives into the reflection table.
                None => ProcData {
                    convention: DEFAULT_CONVENTION.to_string(),
                    return_type: self.builtin_node("void", false)?,
                    params: Vec::new(),
                    class: None,
                    this: None,
                    this_adjust: 0,
                },
            };
            let id = self.graph.alloc_id();
            let mut node = Node::new(id, NodeKind::Procedure(data), 0);
            node.set_name(NodeName::new(split_path(&proc.name)));
            node.set_address(address)?;
            self.graph.insert(node)?;
        }
        Ok(())
    }

    /// Tries to attach a procedure symbol to the matching method of its owning class.
    fn bind_method_address(&mut self, ty: u32, name: &str, address: Address) -> Result<bool> {
        let owner = {
            let Some(TypePayload::MemberFunction(record)) = self.db.try_type_record(ty) else {
                return Ok(false);
            };
            let class = record.class;
            self.build_record(class)?
        };
        let proc_node = self.build_record(ty)?;

        let owner_path = match self.graph.node(owner)?.name() {
            Some(n) => n.orig_qualified(),
            None => return Ok(false),
        };
        let Some(local) = name.strip_prefix(&format!("{owner_path}::")) else {
            return Ok(false);
        };

        let Some(data) = self.graph.node_mut(owner)?.aggregate_mut() else {
            return Ok(false);
        };
        for method in &mut data.methods {
            if method.name == local && method.ty == proc_node {
                if method.address.is_none() {
                    method.address = Some(address);
                }
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Binds data symbols: static members by qualified name plus type shape; leftovers
    /// become top-level variable nodes.
    fn bind_data(&mut self) -> Result<()> {
        let records = self.db.data().to_vec();
        for record in &records {
            let ty = self.build_ref(&record.ty)?;
            let address = Address { section: record.section, offset: record.offset };
            if self.bind_static_address(&record.name, Some(ty), address)? {
                continue;
            }

            let size = self.graph.node(ty)?.size();
            let id = self.graph.alloc_id();
            let mut node = Node::new(id, NodeKind::Var { element: ty }, size);
            node.set_name(NodeName::new(split_path(&record.name)));
            node.set_address(address)?;
            self.graph.insert(node)?;
        }
        Ok(())
    }

    /// Public names are a secondary source: they carry no type, so they only fill static
    /// member addresses left open by the data pass.
    fn bind_names(&mut self) -> Result<()> {
        let records = self.db.names().to_vec();
        for record in &records {
            let address = Address { section: record.section, offset: record.offset };
            self.bind_static_address(&record.name, None, address)?;
        }
        Ok(())
    }

    fn bind_static_address(
        &mut self,
        name: &str,
        ty: Option<NodeId>,
        address: Address,
    ) -> Result<bool> {
        let Some((owner_path, local)) = name.rsplit_once("::") else {
            return Ok(false);
        };
        let owner = self.graph.iter().find_map(|node| {
            let node_name = node.name()?;
            (node.aggregate().is_some() && node_name.orig_qualified() == owner_path)
                .then_some(node.id)
        });
        let Some(owner) = owner else {
            return Ok(false);
        };

        let matched = {
            let Some(data) = self.graph.node(owner)?.aggregate() else {
                return Ok(false);
            };
            let mut found = None;
            for (index, member) in data.statics.iter().enumerate() {
                if member.name != local {
                    continue;
                }
                if let Some(ty) = ty {
                    if !self.graph.structural_eq(member.ty, ty)? {
                        continue;
                    }
                }
                found = Some(index);
                break;
            }
            found
        };
        let Some(index) = matched else {
            return Ok(false);
        };

        if let Some(data) = self.graph.node_mut(owner)?.aggregate_mut() {
            let member = &mut data.statics[index];
            if member.address.is_none() {
                member.address = Some(address);
            }
        }
        Ok(true)
    }
}

fn convert_attrs(record: &MemberAttrsRecord) -> MemberAttrs {
    let mut attrs = MemberAttrs::empty();
    attrs.set(MemberAttrs::VIRTUAL, record.is_virtual);
    attrs.set(MemberAttrs::INTRO, record.intro);
    attrs.set(MemberAttrs::PURE, record.pure);
    attrs.set(MemberAttrs::STATIC, record.is_static);
    attrs
}

/// Splits a dumped qualified name into segments.
fn split_path(name: &str) -> Vec<String> {
    if name.is_empty() {
        return vec![String::new()];
    }
    name.split("::").map(ToString::to_string).collect()
}
