//! Emission ordering with cycle-breaking.
//!
//! Computes, for every top-level node, a direct-dependency set (types needed before the
//! node's definition: bases, by-value member types) and an all-dependency superset
//! (adding function signatures and static member types). A nested type cannot be
//! forward-declared, so any all-dependency that lives inside another node is promoted to
//! an effective direct dependency.
//!
//! The fixed-point loop emits a node once its effective dependencies are all emitted;
//! emitting a node emits its whole owned subtree. When the loop stalls, the nested types
//! blocking it are flattened to top level — detached from their parent, renamed to a flat
//! identifier, with a `Using` alias left behind — and emission restarts from scratch.
//! A stall with nothing left to flatten is a genuine top-level cycle and fatal.

use std::collections::HashSet;

use crate::diagnostics::{Category, DiagnosticLog};
use crate::graph::arena::TypeGraph;
use crate::graph::builder::BuildOptions;
use crate::graph::names::normalize_segment;
use crate::graph::node::{Node, NodeId, NodeKind, NodeName};
use crate::Result;

/// Orders all top-level nodes for forward-declare-then-define emission.
///
/// # Errors
/// Fatal when the pass cap is exceeded or a top-level dependency cycle remains after all
/// flattening opportunities are exhausted.
pub fn order_nodes(
    graph: &mut TypeGraph,
    options: &BuildOptions,
    diag: &DiagnosticLog,
) -> Result<Vec<NodeId>> {
    let limit = options.max_order_passes.unwrap_or(graph.len() * 2 + 8);

    for _pass in 0..=limit {
        match emit_pass(graph)? {
            PassOutcome::Done(order) => return Ok(order),
            PassOutcome::Stuck(blocking) => {
                if blocking.is_empty() {
                    return Err(malformed_error!(
                        "dependency cycle among top-level nodes cannot be broken"
                    ));
                }
                for id in blocking {
                    flatten_nested(graph, id, diag)?;
                }
            }
        }
    }
    Err(crate::Error::IterationLimit { stage: "ordering", limit })
}

enum PassOutcome {
    Done(Vec<NodeId>),
    /// Nested nodes whose absence blocks further emission.
    Stuck(Vec<NodeId>),
}

fn emit_pass(graph: &TypeGraph) -> Result<PassOutcome> {
    let mut pending: Vec<NodeId> = Vec::new();
    for id in graph.ids() {
        let node = graph.node(id)?;
        if node.parent().is_some() {
            continue;
        }
        if matches!(
            node.kind,
            NodeKind::Aggregate(_)
                | NodeKind::Enum(_)
                | NodeKind::Namespace
                | NodeKind::Var { .. }
                | NodeKind::Using { .. }
        ) || (matches!(node.kind, NodeKind::Procedure(_)) && node.name().is_some())
        {
            pending.push(id);
        }
    }

    let mut emitted: HashSet<NodeId> = HashSet::new();
    let mut order: Vec<NodeId> = Vec::new();

    loop {
        let mut progressed = false;
        let mut still_pending = Vec::with_capacity(pending.len());
        for &id in &pending {
            let deps = effective_deps(graph, id)?;
            if deps.iter().all(|d| emitted.contains(d)) {
                emitted.extend(graph.subtree_ids(id)?);
                order.push(id);
                progressed = true;
            } else {
                still_pending.push(id);
            }
        }
        pending = still_pending;
        if pending.is_empty() {
            return Ok(PassOutcome::Done(order));
        }
        if !progressed {
            break;
        }
    }

    // Collect the nested dependencies that keep the remaining nodes blocked.
    let mut blocking: Vec<NodeId> = Vec::new();
    for &id in &pending {
        for dep in effective_deps(graph, id)? {
            if emitted.contains(&dep) {
                continue;
            }
            if graph.node(dep)?.parent().is_some() && !blocking.contains(&dep) {
                blocking.push(dep);
            }
        }
    }
    Ok(PassOutcome::Stuck(blocking))
}

/// Direct dependencies plus every all-dependency that lives inside another node.
fn effective_deps(graph: &TypeGraph, id: NodeId) -> Result<Vec<NodeId>> {
    let direct = node_deps(graph, id, true)?;
    let all = node_deps(graph, id, false)?;
    let mut deps = direct.clone();
    for dep in all {
        if !deps.contains(&dep) && graph.node(dep)?.parent().is_some() {
            deps.push(dep);
        }
    }
    Ok(deps)
}

/// Dependency set of one node, excluding its own subtree.
fn node_deps(graph: &TypeGraph, id: NodeId, direct: bool) -> Result<Vec<NodeId>> {
    let own: HashSet<NodeId> = graph.subtree_ids(id)?.into_iter().collect();
    let mut out = Vec::new();
    collect_deps(graph, id, direct, &mut out)?;
    out.retain(|d| !own.contains(d));
    out.dedup();
    Ok(out)
}

fn collect_deps(graph: &TypeGraph, id: NodeId, direct: bool, out: &mut Vec<NodeId>) -> Result<()> {
    let node = graph.node(id)?;
    match &node.kind {
        NodeKind::Aggregate(data) => {
            for base in &data.bases {
                ref_deps(graph, base.ty, direct, out)?;
            }
            for member in &data.members {
                ref_deps(graph, member.ty, direct, out)?;
            }
            if !direct {
                for member in &data.statics {
                    ref_deps(graph, member.ty, false, out)?;
                }
                for method in &data.methods {
                    ref_deps(graph, method.ty, false, out)?;
                }
            }
        }
        NodeKind::Var { element } => ref_deps(graph, *element, direct, out)?,
        NodeKind::Using { target } => ref_deps(graph, *target, direct, out)?,
        NodeKind::Procedure(data) => {
            if !direct {
                proc_deps(graph, data, out)?;
            }
        }
        _ => {}
    }
    for &child in node.children() {
        collect_deps(graph, child, direct, out)?;
    }
    Ok(())
}

/// Dependencies induced by referencing the type `ty`.
fn ref_deps(graph: &TypeGraph, ty: NodeId, direct: bool, out: &mut Vec<NodeId>) -> Result<()> {
    match &graph.node(ty)?.kind {
        NodeKind::Aggregate(_) | NodeKind::Enum(_) => {
            if !out.contains(&ty) {
                out.push(ty);
            }
        }
        // A pointer is forward-declarable; its pointee only matters for the all-set.
        NodeKind::Pointer { element, .. } => {
            if !direct {
                ref_deps(graph, *element, false, out)?;
            }
        }
        NodeKind::Modifier { element, .. }
        | NodeKind::Array { element, .. }
        | NodeKind::Bitfield { element, .. }
        | NodeKind::Var { element } => ref_deps(graph, *element, direct, out)?,
        NodeKind::Using { target } => ref_deps(graph, *target, direct, out)?,
        NodeKind::Procedure(data) => {
            if !direct {
                proc_deps(graph, data, out)?;
            }
        }
        _ => {}
    }
    Ok(())
}

fn proc_deps(graph: &TypeGraph, data: &crate::graph::node::ProcData, out: &mut Vec<NodeId>) -> Result<()> {
    ref_deps(graph, data.return_type, false, out)?;
    for param in data.params.iter().flatten() {
        ref_deps(graph, *param, false, out)?;
    }
    if let Some(this) = data.this {
        ref_deps(graph, this, false, out)?;
    }
    Ok(())
}

/// Detaches a nested node to top level, leaving a `Using` alias under the former parent.
fn flatten_nested(graph: &mut TypeGraph, id: NodeId, diag: &DiagnosticLog) -> Result<()> {
    let (parent, parts) = {
        let node = graph.node(id)?;
        let Some(parent) = node.parent() else {
            return Ok(());
        };
        let parts = node
            .name()
            .map(|n| n.display.clone())
            .unwrap_or_else(|| vec![format!("<{id}>")]);
        (parent, parts)
    };
    let taken: HashSet<String> = graph
        .iter()
        .filter_map(|n| n.name().map(NodeName::display_qualified))
        .collect();
    let mut flat = normalize_segment(&parts.join("_"));
    while taken.contains(&flat) {
        flat.push('$');
    }

    diag.record(
        Category::FlattenNestedType,
        format!("\"{}\" -> \"{flat}\"", parts.join("::")),
    );

    graph.node_mut(parent)?.del_child(id);
    {
        let node = graph.node_mut(id)?;
        node.set_parent(None);
        node.set_display_parts(vec![flat]);
    }

    // The alias keeps the nested spelling usable at its old scope.
    let alias_id = graph.alloc_id();
    let mut alias = Node::new(alias_id, NodeKind::Using { target: id }, 0);
    alias.set_name(NodeName::new(parts));
    alias.set_parent(Some(parent));
    graph.insert(alias)?;
    graph.node_mut(parent)?.add_child(alias_id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::node::{AggregateData, AggregateKind, DataMember, PointerFlags};

    fn id(raw: u32) -> NodeId {
        NodeId::from_raw(raw).unwrap()
    }

    fn named_struct(graph: &mut TypeGraph, raw: u32, name: &str) -> NodeId {
        let mut node = Node::new(
            id(raw),
            NodeKind::Aggregate(AggregateData::new(AggregateKind::Struct)),
            8,
        );
        node.set_name(NodeName::new(name.split("::").map(ToString::to_string).collect()));
        graph.insert(node).unwrap()
    }

    fn add_member(graph: &mut TypeGraph, owner: NodeId, ty: NodeId) {
        if let Some(data) = graph.node_mut(owner).unwrap().aggregate_mut() {
            let index = data.members.len() as u32;
            data.members.push(DataMember {
                name: format!("m{index}"),
                ty,
                offset: u64::from(index) * 8,
                index,
                attrs: Default::default(),
                miss: Vec::new(),
            });
        }
    }

    fn pointer_to(graph: &mut TypeGraph, raw: u32, element: NodeId) -> NodeId {
        graph
            .insert(Node::new(
                id(raw),
                NodeKind::Pointer { element, flags: PointerFlags::POINTER },
                8,
            ))
            .unwrap()
    }

    #[test]
    fn test_by_value_member_forces_order() {
        let mut graph = TypeGraph::new();
        // Holder has the lower id but embeds Part by value.
        let holder = named_struct(&mut graph, 1, "Holder");
        let part = named_struct(&mut graph, 2, "Part");
        add_member(&mut graph, holder, part);

        let diag = DiagnosticLog::new();
        let order = order_nodes(&mut graph, &BuildOptions::default(), &diag).unwrap();
        let holder_pos = order.iter().position(|&n| n == holder).unwrap();
        let part_pos = order.iter().position(|&n| n == part).unwrap();
        assert!(part_pos < holder_pos);
    }

    #[test]
    fn test_pointer_member_does_not_force_order() {
        let mut graph = TypeGraph::new();
        let holder = named_struct(&mut graph, 1, "Holder");
        let part = named_struct(&mut graph, 2, "Part");
        let ptr = pointer_to(&mut graph, 3, part);
        add_member(&mut graph, holder, ptr);

        let diag = DiagnosticLog::new();
        let order = order_nodes(&mut graph, &BuildOptions::default(), &diag).unwrap();
        // A forward declaration suffices; the lower id emits first.
        let holder_pos = order.iter().position(|&n| n == holder).unwrap();
        let part_pos = order.iter().position(|&n| n == part).unwrap();
        assert!(holder_pos < part_pos);
    }

    #[test]
    fn test_pointer_to_nested_type_waits_for_owner() {
        let mut graph = TypeGraph::new();
        let holder = named_struct(&mut graph, 1, "Holder");
        let outer = named_struct(&mut graph, 2, "Outer");
        let inner = named_struct(&mut graph, 3, "Outer::Inner");
        graph.node_mut(inner).unwrap().set_parent(Some(outer));
        graph.node_mut(outer).unwrap().add_child(inner);
        let ptr = pointer_to(&mut graph, 4, inner);
        add_member(&mut graph, holder, ptr);

        let diag = DiagnosticLog::new();
        let order = order_nodes(&mut graph, &BuildOptions::default(), &diag).unwrap();
        // Nested types cannot be forward-declared, so Outer must precede Holder.
        let holder_pos = order.iter().position(|&n| n == holder).unwrap();
        let outer_pos = order.iter().position(|&n| n == outer).unwrap();
        assert!(outer_pos < holder_pos);
    }

    #[test]
    fn test_stuck_cycle_flattens_nested_type() {
        let mut graph = TypeGraph::new();
        // Outer embeds Blocker by value; Blocker points at Outer::Inner. Neither can go
        // first until Inner leaves its parent.
        let outer = named_struct(&mut graph, 1, "Outer");
        let inner = named_struct(&mut graph, 2, "Outer::Inner");
        graph.node_mut(inner).unwrap().set_parent(Some(outer));
        graph.node_mut(outer).unwrap().add_child(inner);
        let blocker = named_struct(&mut graph, 3, "Blocker");
        let ptr = pointer_to(&mut graph, 4, inner);
        add_member(&mut graph, blocker, ptr);
        add_member(&mut graph, outer, blocker);

        let diag = DiagnosticLog::new();
        let order = order_nodes(&mut graph, &BuildOptions::default(), &diag).unwrap();

        assert_eq!(diag.count(Category::FlattenNestedType), 1);
        // Inner became top-level with a flat name and a Using alias under Outer.
        let inner_node = graph.node(inner).unwrap();
        assert!(inner_node.parent().is_none());
        assert_eq!(inner_node.display_path(), "Outer_Inner");
        assert!(order.contains(&inner));

        let alias = graph
            .iter()
            .find(|n| matches!(n.kind, NodeKind::Using { target } if target == inner))
            .unwrap();
        assert_eq!(alias.parent(), Some(outer));
        assert_eq!(alias.name().unwrap().display_local(), "Inner");

        let blocker_pos = order.iter().position(|&n| n == blocker).unwrap();
        let outer_pos = order.iter().position(|&n| n == outer).unwrap();
        assert!(blocker_pos < outer_pos);
    }

    #[test]
    fn test_top_level_cycle_is_fatal() {
        let mut graph = TypeGraph::new();
        let a = named_struct(&mut graph, 1, "A");
        let b = named_struct(&mut graph, 2, "B");
        add_member(&mut graph, a, b);
        add_member(&mut graph, b, a);

        let diag = DiagnosticLog::new();
        assert!(order_nodes(&mut graph, &BuildOptions::default(), &diag).is_err());
    }

    #[test]
    fn test_pass_cap_is_fatal() {
        let mut graph = TypeGraph::new();
        let outer = named_struct(&mut graph, 1, "Outer");
        let inner = named_struct(&mut graph, 2, "Outer::Inner");
        graph.node_mut(inner).unwrap().set_parent(Some(outer));
        graph.node_mut(outer).unwrap().add_child(inner);
        let blocker = named_struct(&mut graph, 3, "Blocker");
        let ptr = pointer_to(&mut graph, 4, inner);
        add_member(&mut graph, blocker, ptr);
        add_member(&mut graph, outer, blocker);

        let options = BuildOptions { max_order_passes: Some(0), ..BuildOptions::default() };
        let diag = DiagnosticLog::new();
        let result = order_nodes(&mut graph, &options, &diag);
        assert!(matches!(result, Err(crate::Error::IterationLimit { .. })));
    }
}
