//! Virtual-table slot merging and companion naming.
//!
//! Walks the retained single-inheritance chain of every struct/class root-first and
//! collects each non-missing virtual method with a known slot offset. A more-derived
//! method with the same name and `this`-free signature replaces the earlier entry, so the
//! final list reflects the dispatch the object actually performs. Owners with a non-empty
//! list get a companion accessor-type name for emission.
//!
//! Runs after layout reconstruction, which settles the retained base of each aggregate.

use std::collections::HashMap;

use crate::graph::arena::TypeGraph;
use crate::graph::layout::POINTER_SIZE;
use crate::graph::node::{NodeId, NodeKind, VirtualSlot};
use crate::Result;

/// Suffix of the synthesized vtable-accessor companion type.
const COMPANION_SUFFIX: &str = "_VFUNCTAB_IMP";

/// Merges virtual methods along each retained inheritance chain.
///
/// # Errors
/// Fatal on slot offsets not divisible by the pointer size and on dangling references.
pub fn synthesize_vtables(graph: &mut TypeGraph) -> Result<()> {
    for id in graph.ids() {
        if graph.node(id)?.aggregate().is_none() {
            continue;
        }
        let chain = retained_chain(graph, id)?;
        let has_vtable = chain.iter().try_fold(false, |acc, &ancestor| {
            Ok::<_, crate::Error>(
                acc || graph
                    .node(ancestor)?
                    .aggregate()
                    .is_some_and(|d| d.vtable_shape.is_some()),
            )
        })?;
        if !has_vtable {
            continue;
        }

        let slots = merge_chain(graph, &chain)?;
        if slots.is_empty() {
            continue;
        }

        let local = graph
            .node(id)?
            .name()
            .map(|n| n.display_local().to_string())
            .unwrap_or_default();
        let companion = format!("{local}{COMPANION_SUFFIX}{}", graph.next_token(""));
        log::debug!(
            "{}: {} virtual slots, companion \"{companion}\"",
            graph.node(id)?.display_path(),
            slots.len()
        );

        if let Some(data) = graph.node_mut(id)?.aggregate_mut() {
            data.virtual_methods = slots;
            data.companion = Some(companion);
        }
    }
    Ok(())
}

/// Ancestors along the retained single-inheritance chain, root first, ending at `id`.
fn retained_chain(graph: &TypeGraph, id: NodeId) -> Result<Vec<NodeId>> {
    let mut chain = vec![id];
    let mut current = id;
    loop {
        let next = {
            let Some(data) = graph.node(current)?.aggregate() else {
                break;
            };
            match data.retained_base.map(|index| data.bases[index].ty) {
                Some(base) => graph.strip_modifiers(base)?,
                None => break,
            }
        };
        if chain.contains(&next) {
            break;
        }
        chain.push(next);
        current = next;
    }
    chain.reverse();
    Ok(chain)
}

fn merge_chain(graph: &TypeGraph, chain: &[NodeId]) -> Result<Vec<VirtualSlot>> {
    let mut slots: Vec<VirtualSlot> = Vec::new();
    let mut by_key: HashMap<(String, String), usize> = HashMap::new();

    for &ancestor in chain {
        let Some(data) = graph.node(ancestor)?.aggregate() else {
            continue;
        };
        for method in &data.methods {
            if !method.miss.is_empty() {
                continue;
            }
            let Some(offset) = method.vfptr_offset else {
                continue;
            };
            if offset % POINTER_SIZE != 0 {
                return Err(malformed_error!(
                    "{}::{}: vtable offset {:#x} not divisible by pointer size",
                    graph.node(ancestor)?.display_path(),
                    method.name,
                    offset
                ));
            }
            let slot = offset / POINTER_SIZE;

            let signature = match &graph.node(method.ty)?.kind {
                NodeKind::Procedure(proc) => graph.proc_fingerprint(proc, false)?,
                other => {
                    return Err(malformed_error!(
                        "method \"{}\" typed as {}",
                        method.name,
                        other.kind_name()
                    ))
                }
            };
            let key = (method.name.clone(), signature);
            let entry = VirtualSlot {
                name: method.name.clone(),
                ty: method.ty,
                slot,
                owner: ancestor,
            };
            match by_key.get(&key) {
                // Derived override replaces the base's entry in place.
                Some(&index) => slots[index] = entry,
                None => {
                    by_key.insert(key, slots.len());
                    slots.push(entry);
                }
            }
        }
    }

    slots.sort_by_key(|s| s.slot);
    Ok(slots)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::node::{
        AggregateData, AggregateKind, BaseSpec, FuncMember, MissReason, Node, NodeName,
        PointerFlags, ProcData,
    };
    use crate::graph::scalars::ScalarKind;

    fn id(raw: u32) -> NodeId {
        NodeId::from_raw(raw).unwrap()
    }

    fn proc_node(graph: &mut TypeGraph, raw: u32, this_class: NodeId, ret: NodeId) -> NodeId {
        let this = graph.alloc_id();
        graph
            .insert(Node::new(
                this,
                NodeKind::Pointer { element: this_class, flags: PointerFlags::POINTER },
                8,
            ))
            .unwrap();
        graph
            .insert(Node::new(
                id(raw),
                NodeKind::Procedure(ProcData {
                    convention: "thiscall".into(),
                    return_type: ret,
                    params: Vec::new(),
                    class: Some(this_class),
                    this: Some(this),
                    this_adjust: 0,
                }),
                0,
            ))
            .unwrap()
    }

    fn method(name: &str, ty: NodeId, offset: u64) -> FuncMember {
        FuncMember {
            name: name.into(),
            ty,
            attrs: Default::default(),
            vfptr_offset: Some(offset),
            address: Some(crate::graph::node::Address { section: 1, offset: 0 }),
            absolute: None,
            miss: Vec::new(),
        }
    }

    fn vtable_pair(graph: &mut TypeGraph) -> (NodeId, NodeId) {
        let ret = graph
            .insert(Node::new(id(1), NodeKind::Scalar(ScalarKind::Int32), 4))
            .unwrap();

        let base = id(0x100);
        let mut base_node = Node::new(
            base,
            NodeKind::Aggregate(AggregateData::new(AggregateKind::Struct)),
            8,
        );
        base_node.set_name(NodeName::new(vec!["Base".into()]));
        graph.insert(base_node).unwrap();

        let derived = id(0x200);
        let mut derived_node = Node::new(
            derived,
            NodeKind::Aggregate(AggregateData::new(AggregateKind::Class)),
            16,
        );
        derived_node.set_name(NodeName::new(vec!["Derived".into()]));
        graph.insert(derived_node).unwrap();

        let base_get = proc_node(graph, 0x101, base, ret);
        let base_other = proc_node(graph, 0x102, base, ret);
        let derived_get = proc_node(graph, 0x201, derived, ret);

        if let Some(data) = graph.node_mut(base).unwrap().aggregate_mut() {
            data.vtable_shape = Some(2);
            data.methods.push(method("get", base_get, 0));
            data.methods.push(method("other", base_other, 8));
        }
        if let Some(data) = graph.node_mut(derived).unwrap().aggregate_mut() {
            data.bases.push(BaseSpec { ty: base, offset: 0 });
            data.retained_base = Some(0);
            data.methods.push(method("get", derived_get, 0));
        }
        (base, derived)
    }

    #[test]
    fn test_derived_override_replaces_base_slot() {
        let mut graph = TypeGraph::new();
        let (base, derived) = vtable_pair(&mut graph);
        synthesize_vtables(&mut graph).unwrap();

        let data = graph.node(derived).unwrap().aggregate().unwrap();
        assert_eq!(data.virtual_methods.len(), 2);
        assert_eq!(data.virtual_methods[0].name, "get");
        assert_eq!(data.virtual_methods[0].owner, derived);
        assert_eq!(data.virtual_methods[0].slot, 0);
        assert_eq!(data.virtual_methods[1].name, "other");
        assert_eq!(data.virtual_methods[1].owner, base);
        assert_eq!(data.virtual_methods[1].slot, 1);
        assert!(data.companion.as_deref().unwrap().contains("_VFUNCTAB_IMP"));

        // The base keeps its own two-slot view.
        let base_data = graph.node(base).unwrap().aggregate().unwrap();
        assert_eq!(base_data.virtual_methods.len(), 2);
        assert_eq!(base_data.virtual_methods[0].owner, base);
    }

    #[test]
    fn test_missing_methods_skipped() {
        let mut graph = TypeGraph::new();
        let (base, _) = vtable_pair(&mut graph);
        if let Some(data) = graph.node_mut(base).unwrap().aggregate_mut() {
            data.methods[1].miss.push(MissReason::NoAddress);
        }
        synthesize_vtables(&mut graph).unwrap();

        let data = graph.node(base).unwrap().aggregate().unwrap();
        assert_eq!(data.virtual_methods.len(), 1);
        assert_eq!(data.virtual_methods[0].name, "get");
    }

    #[test]
    fn test_indivisible_slot_offset_fatal() {
        let mut graph = TypeGraph::new();
        let (base, _) = vtable_pair(&mut graph);
        if let Some(data) = graph.node_mut(base).unwrap().aggregate_mut() {
            data.methods[0].vfptr_offset = Some(3);
        }
        assert!(synthesize_vtables(&mut graph).is_err());
    }

    #[test]
    fn test_no_vtable_no_companion() {
        let mut graph = TypeGraph::new();
        let plain = id(0x300);
        let mut node = Node::new(
            plain,
            NodeKind::Aggregate(AggregateData::new(AggregateKind::Struct)),
            4,
        );
        node.set_name(NodeName::new(vec!["Plain".into()]));
        graph.insert(node).unwrap();
        synthesize_vtables(&mut graph).unwrap();

        let data = graph.node(plain).unwrap().aggregate().unwrap();
        assert!(data.virtual_methods.is_empty());
        assert!(data.companion.is_none());
    }
}
