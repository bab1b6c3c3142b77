//! Flat reflection type table.
//!
//! The table is the wire-stable contract handed to the blob writer: entries densely
//! indexed from 1 (index 0 means "absent"), each carrying a kind tag, size, interned name,
//! element reference, offset, field range, bitfield geometry, and absolute address.
//!
//! References collapse to the representation a runtime consumer dereferences: modifiers
//! are stripped, enums stand in as their backing scalar, and procedure-typed elements
//! collapse to void. Every aggregate entry is reserved first; the per-aggregate field
//! runs are then appended contiguously at the table end, so a field range is always one
//! dense `(start, count)` window.

use std::collections::HashMap;

use crate::graph::arena::TypeGraph;
use crate::graph::node::{AggregateKind, NodeId, NodeKind};
use crate::Result;

/// Stable kind tags shared with the blob writer. Values never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
#[repr(u8)]
pub enum ReflectKind {
    /// Sentinel for index 0.
    Absent = 0,
    /// `void`.
    Void = 1,
    /// Builtin primitive.
    Scalar = 2,
    /// Bitfield over a scalar.
    Bitfield = 3,
    /// Pointer or reference.
    Pointer = 4,
    /// Fixed-length array.
    Array = 5,
    /// `struct`.
    Struct = 6,
    /// `class`.
    Class = 7,
    /// `union`.
    Union = 8,
    /// Instance data member.
    DataMemberField = 10,
    /// Static data member.
    StaticDataMemberField = 11,
    /// Global variable.
    Var = 12,
}

/// One record of the flat table.
#[derive(Debug, Clone)]
pub struct ReflectionEntry {
    /// Kind tag.
    pub kind: ReflectKind,
    /// Byte size.
    pub size: u64,
    /// Interned name index; 0 = unnamed.
    pub name: u32,
    /// Element / member type as a table index; 0 = absent.
    pub element: u32,
    /// Byte offset for member fields.
    pub offset: u64,
    /// `(start, count)` window of field entries; `(0, 0)` = none.
    pub fields: (u32, u32),
    /// First bit for bitfields.
    pub start_bit: u16,
    /// Bit width for bitfields.
    pub bits: u16,
    /// Absolute address for statics and vars; 0 = unknown.
    pub address: u64,
}

impl ReflectionEntry {
    fn absent() -> Self {
        ReflectionEntry {
            kind: ReflectKind::Absent,
            size: 0,
            name: 0,
            element: 0,
            offset: 0,
            fields: (0, 0),
            start_bit: 0,
            bits: 0,
            address: 0,
        }
    }
}

/// The full table plus its interned name list.
#[derive(Debug)]
pub struct ReflectionTable {
    entries: Vec<ReflectionEntry>,
    names: Vec<String>,
    by_node: HashMap<NodeId, u32>,
}

impl ReflectionTable {
    /// All entries, index 0 included.
    #[must_use]
    pub fn entries(&self) -> &[ReflectionEntry] {
        &self.entries
    }

    /// Entry by table index.
    #[must_use]
    pub fn get(&self, index: u32) -> Option<&ReflectionEntry> {
        self.entries.get(index as usize)
    }

    /// Interned names, index 0 = empty.
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Table index of a graph node, when it has an entry.
    #[must_use]
    pub fn index_of(&self, id: NodeId) -> Option<u32> {
        self.by_node.get(&id).copied()
    }

    /// Number of entries, sentinel included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always false; the sentinel entry is unconditional.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Builds the reflection table over a fully processed graph.
///
/// # Errors
/// Fatal only on dangling references.
pub fn build_table(graph: &TypeGraph) -> Result<ReflectionTable> {
    let mut builder = TableBuilder {
        graph,
        entries: vec![ReflectionEntry::absent()],
        names: vec![String::new()],
        name_index: HashMap::new(),
        by_node: HashMap::new(),
    };
    builder.reserve()?;
    builder.fill()?;
    builder.append_field_runs()?;
    Ok(ReflectionTable {
        entries: builder.entries,
        names: builder.names,
        by_node: builder.by_node,
    })
}

struct TableBuilder<'a> {
    graph: &'a TypeGraph,
    entries: Vec<ReflectionEntry>,
    names: Vec<String>,
    name_index: HashMap<String, u32>,
    by_node: HashMap<NodeId, u32>,
}

impl TableBuilder<'_> {
    fn reflect_kind(kind: &NodeKind) -> Option<ReflectKind> {
        match kind {
            NodeKind::Void => Some(ReflectKind::Void),
            NodeKind::Scalar(_) => Some(ReflectKind::Scalar),
            NodeKind::Bitfield { .. } => Some(ReflectKind::Bitfield),
            NodeKind::Pointer { .. } => Some(ReflectKind::Pointer),
            NodeKind::Array { .. } => Some(ReflectKind::Array),
            NodeKind::Aggregate(data) => Some(match data.kind {
                AggregateKind::Struct => ReflectKind::Struct,
                AggregateKind::Class => ReflectKind::Class,
                AggregateKind::Union => ReflectKind::Union,
            }),
            NodeKind::Var { .. } => Some(ReflectKind::Var),
            _ => None,
        }
    }

    /// Reserves one dense index per reflectable node, ascending id order.
    fn reserve(&mut self) -> Result<()> {
        for id in self.graph.ids() {
            if Self::reflect_kind(&self.graph.node(id)?.kind).is_none() {
                continue;
            }
            let index = self.entries.len() as u32;
            self.entries.push(ReflectionEntry::absent());
            self.by_node.insert(id, index);
        }
        Ok(())
    }

    fn intern(&mut self, name: &str) -> u32 {
        if name.is_empty() {
            return 0;
        }
        if let Some(&index) = self.name_index.get(name) {
            return index;
        }
        let index = self.names.len() as u32;
        self.names.push(name.to_string());
        self.name_index.insert(name.to_string(), index);
        index
    }

    /// Table index a reference resolves to: modifiers stripped, enums as their backing
    /// scalar, procedures as void.
    fn element_index(&self, ty: NodeId) -> Result<u32> {
        let stripped = self.graph.strip_modifiers(ty)?;
        let target = match &self.graph.node(stripped)?.kind {
            NodeKind::Enum(data) => self.graph.strip_modifiers(data.backing)?,
            NodeKind::Procedure(_) => {
                return Ok(self
                    .by_node
                    .iter()
                    .find_map(|(&id, &index)| {
                        matches!(self.graph.get(id).map(|n| &n.kind), Some(NodeKind::Void))
                            .then_some(index)
                    })
                    .unwrap_or(0));
            }
            NodeKind::Using { target } => self.graph.strip_modifiers(*target)?,
            _ => stripped,
        };
        Ok(self.by_node.get(&target).copied().unwrap_or(0))
    }

    fn fill(&mut self) -> Result<()> {
        let reserved: Vec<(NodeId, u32)> = {
            let mut pairs: Vec<_> = self.by_node.iter().map(|(&id, &i)| (id, i)).collect();
            pairs.sort_by_key(|&(_, i)| i);
            pairs
        };
        for (id, index) in reserved {
            let node = self.graph.node(id)?;
            let Some(kind) = Self::reflect_kind(&node.kind) else {
                continue;
            };
            let name = node
                .name()
                .map(|n| n.display_qualified())
                .unwrap_or_default();
            let mut entry = ReflectionEntry {
                kind,
                size: node.size(),
                name: self.intern(&name),
                ..ReflectionEntry::absent()
            };
            match &node.kind {
                NodeKind::Bitfield { element, start_bit, bits } => {
                    entry.element = self.element_index(*element)?;
                    entry.start_bit = *start_bit;
                    entry.bits = *bits;
                }
                NodeKind::Pointer { element, .. } | NodeKind::Array { element, .. } => {
                    entry.element = self.element_index(*element)?;
                }
                NodeKind::Var { element } => {
                    entry.element = self.element_index(*element)?;
                    entry.address = node.absolute().unwrap_or(0);
                }
                _ => {}
            }
            self.entries[index as usize] = entry;
        }
        Ok(())
    }

    /// Instance fields a consumer sees: inherited (root first, zero-offset bases only)
    /// then own, derived overriding base by name, missing members excluded.
    fn visible_members(&self, id: NodeId) -> Result<Vec<(String, NodeId, u64)>> {
        let mut chain = vec![id];
        let mut current = id;
        loop {
            let next = {
                let Some(data) = self.graph.node(current)?.aggregate() else {
                    break;
                };
                match data.retained_base {
                    Some(index) if data.bases[index].offset == 0 => {
                        self.graph.strip_modifiers(data.bases[index].ty)?
                    }
                    _ => break,
                }
            };
            if chain.contains(&next) {
                break;
            }
            chain.push(next);
            current = next;
        }
        chain.reverse();

        let mut fields: Vec<(String, NodeId, u64)> = Vec::new();
        for ancestor in chain {
            let Some(data) = self.graph.node(ancestor)?.aggregate() else {
                continue;
            };
            for member in &data.members {
                if !member.miss.is_empty() {
                    continue;
                }
                let field = (member.name.clone(), member.ty, member.offset);
                match fields.iter_mut().find(|(name, _, _)| *name == member.name) {
                    Some(existing) => *existing = field,
                    None => fields.push(field),
                }
            }
        }
        Ok(fields)
    }

    fn append_field_runs(&mut self) -> Result<()> {
        let aggregates: Vec<(NodeId, u32)> = {
            let mut pairs: Vec<_> = self
                .by_node
                .iter()
                .filter(|(&id, _)| {
                    self.graph.get(id).is_some_and(|n| n.aggregate().is_some())
                })
                .map(|(&id, &i)| (id, i))
                .collect();
            pairs.sort_by_key(|&(_, i)| i);
            pairs
        };

        for (id, index) in aggregates {
            let start = self.entries.len() as u32;

            for (name, ty, offset) in self.visible_members(id)? {
                let element = self.element_index(ty)?;
                let size = self.graph.node(self.graph.strip_modifiers(ty)?)?.size();
                let name = self.intern(&name);
                self.entries.push(ReflectionEntry {
                    kind: ReflectKind::DataMemberField,
                    size,
                    name,
                    element,
                    offset,
                    ..ReflectionEntry::absent()
                });
            }

            let statics: Vec<(String, NodeId, u64)> = self
                .graph
                .node(id)?
                .aggregate()
                .map(|data| {
                    data.statics
                        .iter()
                        .filter(|s| s.miss.is_empty())
                        .map(|s| (s.name.clone(), s.ty, s.absolute.unwrap_or(0)))
                        .collect()
                })
                .unwrap_or_default();
            for (name, ty, address) in statics {
                let element = self.element_index(ty)?;
                let size = self.graph.node(self.graph.strip_modifiers(ty)?)?.size();
                let name = self.intern(&name);
                self.entries.push(ReflectionEntry {
                    kind: ReflectKind::StaticDataMemberField,
                    size,
                    name,
                    element,
                    address,
                    ..ReflectionEntry::absent()
                });
            }

            let count = self.entries.len() as u32 - start;
            self.entries[index as usize].fields = if count == 0 { (0, 0) } else { (start, count) };
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::node::{
        AggregateData, BaseSpec, DataMember, EnumData, Node, NodeName, StaticMember,
    };
    use crate::graph::scalars::ScalarKind;

    fn id(raw: u32) -> NodeId {
        NodeId::from_raw(raw).unwrap()
    }

    fn sample_graph() -> TypeGraph {
        let mut graph = TypeGraph::new();
        let int32 = graph
            .insert(Node::new(id(1), NodeKind::Scalar(ScalarKind::Int32), 4))
            .unwrap();

        let mut base = Node::new(
            id(0x10),
            NodeKind::Aggregate(AggregateData::new(AggregateKind::Struct)),
            8,
        );
        base.set_name(NodeName::new(vec!["Base".into()]));
        graph.insert(base).unwrap();
        if let Some(data) = graph.node_mut(id(0x10)).unwrap().aggregate_mut() {
            data.members.push(DataMember {
                name: "head".into(),
                ty: int32,
                offset: 0,
                index: 0,
                attrs: Default::default(),
                miss: Vec::new(),
            });
            data.members.push(DataMember {
                name: "shadowed".into(),
                ty: int32,
                offset: 4,
                index: 1,
                attrs: Default::default(),
                miss: Vec::new(),
            });
        }

        let mut derived = Node::new(
            id(0x20),
            NodeKind::Aggregate(AggregateData::new(AggregateKind::Class)),
            16,
        );
        derived.set_name(NodeName::new(vec!["Derived".into()]));
        graph.insert(derived).unwrap();
        if let Some(data) = graph.node_mut(id(0x20)).unwrap().aggregate_mut() {
            data.bases.push(BaseSpec { ty: id(0x10), offset: 0 });
            data.retained_base = Some(0);
            data.members.push(DataMember {
                name: "shadowed".into(),
                ty: int32,
                offset: 8,
                index: 0,
                attrs: Default::default(),
                miss: Vec::new(),
            });
            data.statics.push(StaticMember {
                name: "limit".into(),
                ty: int32,
                attrs: Default::default(),
                address: None,
                absolute: Some(0x1_4000_2000),
                miss: Vec::new(),
            });
        }
        graph
    }

    #[test]
    fn test_dense_indexing_from_one() {
        let graph = sample_graph();
        let table = build_table(&graph).unwrap();

        assert_eq!(table.get(0).unwrap().kind, ReflectKind::Absent);
        assert_eq!(table.index_of(id(1)), Some(1));
        assert_eq!(table.index_of(id(0x10)), Some(2));
        assert_eq!(table.index_of(id(0x20)), Some(3));
        assert_eq!(table.names()[0], "");
    }

    #[test]
    fn test_inherited_then_own_with_override() {
        let graph = sample_graph();
        let table = build_table(&graph).unwrap();

        let derived = table.get(table.index_of(id(0x20)).unwrap()).unwrap();
        let (start, count) = derived.fields;
        // head (inherited), shadowed (derived override), limit (static).
        assert_eq!(count, 3);
        let fields: Vec<&ReflectionEntry> =
            (start..start + count).map(|i| table.get(i).unwrap()).collect();
        assert_eq!(fields[0].kind, ReflectKind::DataMemberField);
        assert_eq!(table.names()[fields[0].name as usize], "head");
        assert_eq!(fields[0].offset, 0);
        assert_eq!(table.names()[fields[1].name as usize], "shadowed");
        // The derived redeclaration wins, at its own offset.
        assert_eq!(fields[1].offset, 8);
        assert_eq!(fields[2].kind, ReflectKind::StaticDataMemberField);
        assert_eq!(fields[2].address, 0x1_4000_2000);
    }

    #[test]
    fn test_enum_collapses_to_backing_scalar() {
        let mut graph = sample_graph();
        let backing = id(1);
        let mut e = Node::new(
            id(0x30),
            NodeKind::Enum(EnumData { backing, members: Vec::new(), scoped: false }),
            4,
        );
        e.set_name(NodeName::new(vec!["Mode".into()]));
        graph.insert(e).unwrap();
        let mut var = Node::new(id(0x31), NodeKind::Var { element: id(0x30) }, 4);
        var.set_name(NodeName::new(vec!["g_mode".into()]));
        var.set_absolute(0x1_4000_3000).unwrap();
        graph.insert(var).unwrap();

        let table = build_table(&graph).unwrap();
        // Enums get no entry of their own.
        assert_eq!(table.index_of(id(0x30)), None);
        let var_entry = table.get(table.index_of(id(0x31)).unwrap()).unwrap();
        assert_eq!(var_entry.kind, ReflectKind::Var);
        assert_eq!(var_entry.element, table.index_of(backing).unwrap());
        assert_eq!(var_entry.address, 0x1_4000_3000);
    }

    #[test]
    fn test_missing_members_excluded_from_field_run() {
        let mut graph = sample_graph();
        if let Some(data) = graph.node_mut(id(0x10)).unwrap().aggregate_mut() {
            data.members[1]
                .miss
                .push(crate::graph::node::MissReason::ZeroLengthArray);
        }
        let table = build_table(&graph).unwrap();
        let base = table.get(table.index_of(id(0x10)).unwrap()).unwrap();
        assert_eq!(base.fields.1, 1);
        // Derived no longer inherits the flagged member, keeps its own redeclaration.
        let derived = table.get(table.index_of(id(0x20)).unwrap()).unwrap();
        assert_eq!(derived.fields.1, 3);
    }
}
