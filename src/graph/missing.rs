//! Missing-member analysis.
//!
//! Walks every function member, static data member, instance member, and top-level
//! procedure and accumulates all reasons that make it unsafe to emit as code. Reasons are
//! checked in a fixed order and never short-circuit, so re-running the analysis over an
//! unchanged graph yields byte-identical reason sets. Nothing is deleted; flagged entries
//! stay in the graph for diagnostics and reflection.

use crate::diagnostics::{Category, DiagnosticLog};
use crate::graph::arena::TypeGraph;
use crate::graph::builder::BuildOptions;
use crate::graph::node::{miss_info, MissReason, NodeId, NodeKind, ProcData};
use crate::Result;

/// Widest by-value passing a call stub supports, in bytes.
const MAX_BY_VALUE: u64 = 8;

/// Flags every unrepresentable member and procedure with its reasons.
///
/// # Errors
/// Fatal only on dangling references; flagged members are a degradation, not an error.
pub fn analyze_missing(
    graph: &mut TypeGraph,
    options: &BuildOptions,
    diag: &DiagnosticLog,
) -> Result<()> {
    enum Target {
        Aggregate,
        Procedure,
    }
    for id in graph.ids() {
        let target = {
            let node = graph.node(id)?;
            match &node.kind {
                NodeKind::Aggregate(_) => Some(Target::Aggregate),
                // Unnamed procedure nodes are pure types; only symbol-backed ones emit.
                NodeKind::Procedure(_) if node.name().is_some() => Some(Target::Procedure),
                _ => None,
            }
        };
        match target {
            Some(Target::Aggregate) => analyze_aggregate(graph, id, options, diag)?,
            Some(Target::Procedure) => analyze_procedure(graph, id, options, diag)?,
            None => {}
        }
    }
    Ok(())
}

fn analyze_aggregate(
    graph: &mut TypeGraph,
    id: NodeId,
    options: &BuildOptions,
    diag: &DiagnosticLog,
) -> Result<()> {
    let node = graph.node(id)?;
    let owner_path = node.display_path();
    let owner_local = node.name().map(|n| n.orig_local().to_string()).unwrap_or_default();
    let owner_root = node
        .name()
        .and_then(|n| n.orig.first().cloned())
        .unwrap_or_default();
    let Some(data) = node.aggregate() else {
        return Ok(());
    };

    let mut method_misses: Vec<(usize, Vec<MissReason>)> = Vec::new();
    for (index, method) in data.methods.iter().enumerate() {
        let mut reasons = Vec::new();
        if method.name == owner_local {
            push(&mut reasons, MissReason::Constructor);
        }
        if method.name.strip_prefix('~') == Some(owner_local.as_str()) {
            push(&mut reasons, MissReason::Destructor);
        }
        if is_operator(&method.name) {
            push(&mut reasons, MissReason::OperatorOverload);
        }
        if let NodeKind::Procedure(proc) = &graph.node(method.ty)?.kind {
            if proc.is_variadic() {
                push(&mut reasons, MissReason::Variadic);
            }
            if proc.class.is_some_and(|class| class != id) {
                push(&mut reasons, MissReason::ClassIdMismatch);
            }
            if proc.this_adjust != 0 {
                push(&mut reasons, MissReason::ThisAdjust(proc.this_adjust));
            }
            if method.address.is_none() {
                push(&mut reasons, MissReason::NoAddress);
            }
            signature_reasons(graph, proc, &mut reasons)?;
        }
        if options.blocked_root_namespaces.contains(&owner_root) {
            push(&mut reasons, MissReason::BlockedNamespace(owner_root.clone()));
        }
        if !reasons.is_empty() {
            method_misses.push((index, reasons));
        }
    }

    let mut static_misses: Vec<(usize, Vec<MissReason>)> = Vec::new();
    for (index, member) in data.statics.iter().enumerate() {
        let mut reasons = Vec::new();
        if is_zero_length_array(graph, member.ty)? {
            push(&mut reasons, MissReason::ZeroLengthArray);
        }
        if member.address.is_none() {
            push(&mut reasons, MissReason::NoAddress);
        }
        if !reasons.is_empty() {
            static_misses.push((index, reasons));
        }
    }

    let mut member_misses: Vec<usize> = Vec::new();
    for (index, member) in data.members.iter().enumerate() {
        if is_zero_length_array(graph, member.ty)? {
            member_misses.push(index);
        }
    }

    for (index, reasons) in &method_misses {
        let name = graph.node(id)?.aggregate().map_or("", |d| d.methods[*index].name.as_str());
        diag.record(
            Category::RemovedMemberFunction,
            format!("{owner_path}::{name}: {}", miss_info(reasons)),
        );
    }
    for (index, reasons) in &static_misses {
        let name = graph.node(id)?.aggregate().map_or("", |d| d.statics[*index].name.as_str());
        diag.record(
            Category::RemovedStaticDataMember,
            format!("{owner_path}::{name}: {}", miss_info(reasons)),
        );
    }

    if let Some(data) = graph.node_mut(id)?.aggregate_mut() {
        for (index, reasons) in method_misses {
            data.methods[index].miss = reasons;
        }
        for (index, reasons) in static_misses {
            data.statics[index].miss = reasons;
        }
        for index in member_misses {
            data.members[index].miss = vec![MissReason::ZeroLengthArray];
        }
    }
    Ok(())
}

fn analyze_procedure(
    graph: &mut TypeGraph,
    id: NodeId,
    options: &BuildOptions,
    diag: &DiagnosticLog,
) -> Result<()> {
    let node = graph.node(id)?;
    let root = node
        .name()
        .and_then(|n| n.orig.first().cloned())
        .unwrap_or_default();
    let NodeKind::Procedure(proc) = &node.kind else {
        return Ok(());
    };

    let mut reasons = Vec::new();
    if node.address().is_none() {
        push(&mut reasons, MissReason::NoAddress);
    }
    if proc.is_variadic() {
        push(&mut reasons, MissReason::Variadic);
    }
    signature_reasons(graph, proc, &mut reasons)?;
    if options.blocked_root_namespaces.contains(&root) {
        push(&mut reasons, MissReason::BlockedNamespace(root));
    }

    if !reasons.is_empty() {
        diag.record(
            Category::RemovedProcedure,
            format!("{}: {}", node.display_path(), miss_info(&reasons)),
        );
        let node = graph.node_mut(id)?;
        for reason in reasons {
            node.add_miss_reason(reason);
        }
    }
    Ok(())
}

/// By-value passing checks over the whole signature: every parameter and a non-void
/// return must fit the stub calling convention.
fn signature_reasons(graph: &TypeGraph, proc: &ProcData, reasons: &mut Vec<MissReason>) -> Result<()> {
    let mut slots: Vec<NodeId> = proc.params.iter().flatten().copied().collect();
    if !matches!(graph.node(proc.return_type)?.kind, NodeKind::Void) {
        slots.push(proc.return_type);
    }
    for slot in slots {
        let stripped = graph.strip_modifiers(slot)?;
        let node = graph.node(stripped)?;
        if node.size() > MAX_BY_VALUE {
            push(reasons, MissReason::LargeByValue);
        }
        match &node.kind {
            // Enums pass by value as their backing scalar.
            NodeKind::Aggregate(_) => push(reasons, MissReason::ByValueAggregate),
            NodeKind::Array { .. } => push(reasons, MissReason::ByValueArray),
            _ => {}
        }
    }
    Ok(())
}

fn is_zero_length_array(graph: &TypeGraph, ty: NodeId) -> Result<bool> {
    let stripped = graph.strip_modifiers(ty)?;
    Ok(matches!(graph.node(stripped)?.kind, NodeKind::Array { length: 0, .. }))
}

fn is_operator(name: &str) -> bool {
    name.strip_prefix("operator")
        .and_then(|rest| rest.chars().next())
        .is_some_and(|c| !c.is_alphanumeric() && c != '_')
}

fn push(reasons: &mut Vec<MissReason>, reason: MissReason) {
    if !reasons.contains(&reason) {
        reasons.push(reason);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::builder::{build, BuildOptions};
    use crate::graph::node::miss_info;
    use crate::symbols::SymbolDatabase;
    use serde_json::json;

    fn analyzed(value: serde_json::Value, options: BuildOptions) -> (TypeGraph, DiagnosticLog) {
        let db = SymbolDatabase::from_value(value).unwrap();
        let diag = DiagnosticLog::new();
        let (mut graph, _) = build(&db, &options, &diag).unwrap();
        analyze_missing(&mut graph, &options, &diag).unwrap();
        (graph, diag)
    }

    fn obj_with_method(name: &str, extra_param: serde_json::Value) -> serde_json::Value {
        json!({
            "types": [
                { "id": 0x1000, "kind": "struct", "name": "ns::Obj", "size": 4,
                  "member_count": 2, "field_list": 0x1001 },
                { "id": 0x1001, "kind": "field-list", "fields": [
                    { "kind": "member", "name": "v", "type": { "builtin": "int32" }, "offset": 0 },
                    { "kind": "one-method", "name": name, "type": 0x1002 }
                ] },
                { "id": 0x1002, "kind": "member-function",
                  "returns": { "builtin": "void" }, "class": 0x1000,
                  "this": 0x1003, "param_count": 1, "params": [ extra_param ] },
                { "id": 0x1003, "kind": "pointer", "element": 0x1000 }
            ],
            "procs": [
                { "name": format!("ns::Obj::{name}"), "type": 0x1002, "section": 1, "offset": 16 }
            ],
            "sections": [
                { "id": 1, "rva": 4096, "size": 4096 }
            ]
        })
    }

    #[test]
    fn test_constructor_and_destructor_flagged() {
        let (graph, diag) = analyzed(
            obj_with_method("Obj", json!({ "builtin": "int32" })),
            BuildOptions::default(),
        );
        let data = graph.node(NodeId::from_raw(0x1000).unwrap()).unwrap().aggregate().unwrap();
        assert_eq!(data.methods[0].miss, vec![MissReason::Constructor]);
        assert_eq!(diag.count(Category::RemovedMemberFunction), 1);

        let (graph, _) = analyzed(
            obj_with_method("~Obj", json!({ "builtin": "int32" })),
            BuildOptions::default(),
        );
        let data = graph.node(NodeId::from_raw(0x1000).unwrap()).unwrap().aggregate().unwrap();
        assert_eq!(data.methods[0].miss, vec![MissReason::Destructor]);
    }

    #[test]
    fn test_reasons_accumulate_without_short_circuit() {
        // Variadic AND by-value aggregate parameter, both reported, plus no address since
        // the proc symbol name will not match.
        let (graph, _) = analyzed(
            json!({
                "types": [
                    { "id": 0x1000, "kind": "struct", "name": "Obj", "size": 4,
                      "member_count": 2, "field_list": 0x1001 },
                    { "id": 0x1001, "kind": "field-list", "fields": [
                        { "kind": "member", "name": "v", "type": { "builtin": "int32" }, "offset": 0 },
                        { "kind": "one-method", "name": "operator==", "type": 0x1002 }
                    ] },
                    { "id": 0x1002, "kind": "member-function",
                      "returns": { "builtin": "bool" }, "class": 0x1000,
                      "this": 0x1003, "param_count": 2,
                      "params": [ 0x1000, null ] },
                    { "id": 0x1003, "kind": "pointer", "element": 0x1000 }
                ]
            }),
            BuildOptions::default(),
        );
        let data = graph.node(NodeId::from_raw(0x1000).unwrap()).unwrap().aggregate().unwrap();
        let miss = &data.methods[0].miss;
        assert!(miss.contains(&MissReason::OperatorOverload));
        assert!(miss.contains(&MissReason::Variadic));
        assert!(miss.contains(&MissReason::NoAddress));
        assert!(miss.contains(&MissReason::ByValueAggregate));
    }

    #[test]
    fn test_enum_passes_by_value() {
        let (graph, _) = analyzed(
            json!({
                "types": [
                    { "id": 0x0f00, "kind": "enum", "name": "Mode", "backing": { "builtin": "int32" },
                      "member_count": 1, "field_list": 0x0f01 },
                    { "id": 0x0f01, "kind": "field-list", "fields": [
                        { "kind": "enumerate", "name": "On", "value": 1 }
                    ] },
                    { "id": 0x1000, "kind": "struct", "name": "Obj", "size": 4,
                      "member_count": 2, "field_list": 0x1001 },
                    { "id": 0x1001, "kind": "field-list", "fields": [
                        { "kind": "member", "name": "v", "type": { "builtin": "int32" }, "offset": 0 },
                        { "kind": "one-method", "name": "set_mode", "type": 0x1002 }
                    ] },
                    { "id": 0x1002, "kind": "member-function",
                      "returns": { "builtin": "void" }, "class": 0x1000,
                      "this": 0x1003, "param_count": 1, "params": [ 0x0f00 ] },
                    { "id": 0x1003, "kind": "pointer", "element": 0x1000 }
                ],
                "procs": [
                    { "name": "Obj::set_mode", "type": 0x1002, "section": 1, "offset": 16 }
                ],
                "sections": [ { "id": 1, "rva": 4096, "size": 4096 } ]
            }),
            BuildOptions::default(),
        );
        let data = graph.node(NodeId::from_raw(0x1000).unwrap()).unwrap().aggregate().unwrap();
        assert!(data.methods[0].miss.is_empty());
    }

    #[test]
    fn test_blocked_namespace() {
        let options = BuildOptions {
            blocked_root_namespaces: vec!["ns".to_string()],
            ..BuildOptions::default()
        };
        let (graph, _) = analyzed(obj_with_method("poke", json!({ "builtin": "int32" })), options);
        let data = graph.node(NodeId::from_raw(0x1000).unwrap()).unwrap().aggregate().unwrap();
        assert_eq!(
            miss_info(&data.methods[0].miss),
            "blocked root namespace \"ns\""
        );
    }

    #[test]
    fn test_static_and_instance_zero_length_arrays() {
        let (graph, diag) = analyzed(
            json!({
                "types": [
                    { "id": 0x0e00, "kind": "array", "element": { "builtin": "uint8" }, "length": 0 },
                    { "id": 0x1000, "kind": "struct", "name": "Buf", "size": 4,
                      "member_count": 3, "field_list": 0x1001 },
                    { "id": 0x1001, "kind": "field-list", "fields": [
                        { "kind": "member", "name": "len", "type": { "builtin": "int32" }, "offset": 0 },
                        { "kind": "member", "name": "tail", "type": 0x0e00, "offset": 4 },
                        { "kind": "static-member", "name": "pool", "type": 0x0e00 }
                    ] }
                ]
            }),
            BuildOptions::default(),
        );
        let data = graph.node(NodeId::from_raw(0x1000).unwrap()).unwrap().aggregate().unwrap();
        assert!(data.members[0].miss.is_empty());
        assert_eq!(data.members[1].miss, vec![MissReason::ZeroLengthArray]);
        assert!(data.statics[0].miss.contains(&MissReason::ZeroLengthArray));
        assert!(data.statics[0].miss.contains(&MissReason::NoAddress));
        assert_eq!(diag.count(Category::RemovedStaticDataMember), 1);
    }

    #[test]
    fn test_determinism_over_unchanged_graph() {
        let value = obj_with_method("operator+", json!({ "builtin": "int32" }));
        let (graph_a, _) = analyzed(value.clone(), BuildOptions::default());
        let (graph_b, _) = analyzed(value, BuildOptions::default());
        let id = NodeId::from_raw(0x1000).unwrap();
        let a = graph_a.node(id).unwrap().aggregate().unwrap();
        let b = graph_b.node(id).unwrap().aggregate().unwrap();
        assert_eq!(
            miss_info(&a.methods[0].miss),
            miss_info(&b.methods[0].miss)
        );
    }
}
