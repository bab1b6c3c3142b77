//! Name normalization, collision resolution, and namespace synthesis.
//!
//! Three passes over display names, original names untouched throughout:
//!
//! 1. Normalize: anonymous segments are cut and replaced by one unique token, every
//!    segment is escaped to identifier characters, reserved words get a trailing `_`.
//! 2. Collision resolution: nodes sharing a full qualified display path are grouped; the
//!    most-depended-on node keeps the name, the rest gain `$` suffixes until unique.
//!    Renamed enums are promoted to scoped; renamed procedures take their original local
//!    name back once the group is settled, since overload resolution disambiguates them.
//! 3. Namespace synthesis: a trie over non-local display paths; path prefixes without a
//!    node become synthesized [`NodeKind::Namespace`] nodes, and every node attaches to
//!    its immediate parent unless a struct already owns it. Internal-linkage nodes are
//!    flattened to a single underscore-joined segment instead.

use std::collections::{HashMap, HashSet};

use dashmap::DashMap;

use crate::diagnostics::{Category, DiagnosticLog};
use crate::graph::arena::TypeGraph;
use crate::graph::node::{Node, NodeId, NodeKind, NodeName};
use crate::Result;

/// C++ keywords that cannot be used as emitted identifiers.
const RESERVED: &[&str] = &[
    "alignas", "alignof", "auto", "bool", "break", "case", "catch", "char", "class", "const",
    "constexpr", "continue", "default", "delete", "do", "double", "else", "enum", "explicit",
    "export", "extern", "false", "float", "for", "friend", "goto", "if", "inline", "int", "long",
    "mutable", "namespace", "new", "noexcept", "nullptr", "operator", "private", "protected",
    "public", "register", "return", "short", "signed", "sizeof", "static", "struct", "switch",
    "template", "this", "throw", "true", "try", "typedef", "typeid", "typename", "union",
    "unsigned", "using", "virtual", "void", "volatile", "while",
];

/// Runs all three naming passes.
///
/// # Errors
/// Fatal only on dangling references.
pub fn resolve_names(graph: &mut TypeGraph, diag: &DiagnosticLog) -> Result<()> {
    normalize_pass(graph, diag)?;
    collision_pass(graph, diag)?;
    namespace_pass(graph, diag)?;
    Ok(())
}

/// Nodes whose names flow into emission; builtins and synthetic helpers keep theirs.
fn is_nameable(node: &Node) -> bool {
    node.name().is_some()
        && matches!(
            node.kind,
            NodeKind::Aggregate(_) | NodeKind::Enum(_) | NodeKind::Procedure(_) | NodeKind::Var { .. }
        )
}

fn normalize_pass(graph: &mut TypeGraph, diag: &DiagnosticLog) -> Result<()> {
    for id in graph.ids() {
        let parts = {
            let node = graph.node(id)?;
            if !is_nameable(node) {
                continue;
            }
            node.name().map(|n| n.display.clone())
        };
        let Some(parts) = parts else { continue };

        let mut out: Vec<String> = Vec::with_capacity(parts.len());
        let mut cut = false;
        for part in &parts {
            if is_anonymous(part) {
                // Everything from the anonymous segment onward collapses into one token;
                // the prefix stays so grouping by enclosing scope keeps working.
                out.push(graph.next_token("anon"));
                cut = true;
                break;
            }
            out.push(normalize_segment(part));
        }
        if out.is_empty() {
            out.push(graph.next_token("anon"));
        }

        if out != parts {
            let before = parts.join("::");
            let after = out.join("::");
            diag.record(
                Category::NormalizeName,
                if cut {
                    format!("\"{before}\" -> \"{after}\" (anonymous segment)")
                } else {
                    format!("\"{before}\" -> \"{after}\"")
                },
            );
            graph.node_mut(id)?.set_display_parts(out);
        }
    }
    Ok(())
}

fn is_anonymous(segment: &str) -> bool {
    segment.contains("<unnamed") || segment.starts_with("__unnamed")
}

/// Escapes a segment to `[a-zA-Z0-9_$]` and steers clear of reserved words.
pub(crate) fn normalize_segment(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    for c in segment.chars() {
        if c.is_ascii_alphanumeric() || c == '_' || c == '$' {
            out.push(c);
        } else {
            let mut buf = [0u8; 4];
            for byte in c.encode_utf8(&mut buf).bytes() {
                out.push_str(&format!("_N{byte:02X}N_"));
            }
        }
    }
    while RESERVED.contains(&out.as_str()) {
        out.push('_');
    }
    out
}

fn collision_pass(graph: &mut TypeGraph, diag: &DiagnosticLog) -> Result<()> {
    let dependents = reference_counts(graph)?;

    let groups: DashMap<String, Vec<NodeId>> = DashMap::new();
    for id in graph.ids() {
        let node = graph.node(id)?;
        if !is_nameable(node) || node.is_local() {
            continue;
        }
        if let Some(name) = node.name() {
            groups.entry(name.display_qualified()).or_default().push(id);
        }
    }

    let mut taken: HashSet<String> = groups.iter().map(|e| e.key().clone()).collect();
    let mut colliding: Vec<(String, Vec<NodeId>)> = groups
        .into_iter()
        .filter(|(_, ids)| ids.len() > 1)
        .collect();
    colliding.sort_by(|a, b| a.0.cmp(&b.0));

    let mut proc_restores: Vec<(NodeId, String)> = Vec::new();
    for (path, mut ids) in colliding {
        // Most-depended-on keeps the name; ties break toward the older record.
        ids.sort_by_key(|id| {
            (
                std::cmp::Reverse(dependents.get(id).copied().unwrap_or(0)),
                *id,
            )
        });
        for &loser in &ids[1..] {
            let mut parts = match graph.node(loser)?.name() {
                Some(name) => name.display.clone(),
                None => continue,
            };
            let original_local = parts.last().cloned().unwrap_or_default();
            loop {
                if let Some(last) = parts.last_mut() {
                    last.push('$');
                }
                if !taken.contains(&parts.join("::")) {
                    break;
                }
            }
            taken.insert(parts.join("::"));
            diag.record(
                Category::NameCollisionResolved,
                format!("\"{path}\" -> \"{}\"", parts.join("::")),
            );

            let node = graph.node_mut(loser)?;
            node.set_display_parts(parts);
            match &mut node.kind {
                // A renamed enum would no longer shadow its enumerators; scoping keeps
                // the enumerator names stable.
                NodeKind::Enum(data) => data.scoped = true,
                NodeKind::Procedure(_) => proc_restores.push((loser, original_local)),
                _ => {}
            }
        }
    }

    // Overloaded procedures are distinguished by signature, not spelling; the suffixed
    // name only served collision grouping.
    for (id, local) in proc_restores {
        let node = graph.node_mut(id)?;
        if let Some(name) = node.name() {
            let mut parts = name.display.clone();
            if let Some(last) = parts.last_mut() {
                *last = local;
            }
            node.set_display_parts(parts);
        }
    }
    Ok(())
}

/// Number of nodes referencing each node through type references (not ownership).
fn reference_counts(graph: &TypeGraph) -> Result<HashMap<NodeId, usize>> {
    let mut counts: HashMap<NodeId, usize> = HashMap::new();
    let mut bump = |id: NodeId, counts: &mut HashMap<NodeId, usize>| {
        *counts.entry(id).or_default() += 1;
    };
    for node in graph.iter() {
        match &node.kind {
            NodeKind::Pointer { element, .. }
            | NodeKind::Modifier { element, .. }
            | NodeKind::Array { element, .. }
            | NodeKind::Bitfield { element, .. }
            | NodeKind::Var { element } => bump(*element, &mut counts),
            NodeKind::Using { target } => bump(*target, &mut counts),
            NodeKind::Enum(data) => bump(data.backing, &mut counts),
            NodeKind::Aggregate(data) => {
                for base in &data.bases {
                    bump(base.ty, &mut counts);
                }
                for member in &data.members {
                    bump(member.ty, &mut counts);
                }
                for member in &data.statics {
                    bump(member.ty, &mut counts);
                }
                for method in &data.methods {
                    bump(method.ty, &mut counts);
                }
            }
            NodeKind::Procedure(data) => {
                bump(data.return_type, &mut counts);
                for param in data.params.iter().flatten() {
                    bump(*param, &mut counts);
                }
                if let Some(class) = data.class {
                    bump(class, &mut counts);
                }
                if let Some(this) = data.this {
                    bump(this, &mut counts);
                }
            }
            _ => {}
        }
    }
    Ok(counts)
}

fn namespace_pass(graph: &mut TypeGraph, diag: &DiagnosticLog) -> Result<()> {
    // Trie keyed by full display path; existing nodes claim their paths first.
    let mut by_path: HashMap<String, NodeId> = HashMap::new();
    let mut locals: Vec<NodeId> = Vec::new();
    for id in graph.ids() {
        let node = graph.node(id)?;
        if !is_nameable(node) {
            continue;
        }
        if node.is_local() {
            locals.push(id);
            continue;
        }
        if let Some(name) = node.name() {
            by_path.entry(name.display_qualified()).or_insert(id);
        }
    }

    for id in graph.ids() {
        let parts = {
            let node = graph.node(id)?;
            if !is_nameable(node) || node.is_local() {
                continue;
            }
            match node.name() {
                Some(name) => name.display.clone(),
                None => continue,
            }
        };

        // Synthesize the missing enclosing scopes, outermost first.
        for depth in 1..parts.len() {
            let prefix = parts[..depth].join("::");
            if by_path.contains_key(&prefix) {
                continue;
            }
            let ns_id = graph.alloc_id();
            let mut ns = Node::new(ns_id, NodeKind::Namespace, 0);
            ns.set_name(NodeName::new(parts[..depth].to_vec()));
            graph.insert(ns)?;
            by_path.insert(prefix.clone(), ns_id);
            diag.record(Category::CreateNamespace, format!("\"{prefix}\""));
        }

        attach_to_parent(graph, id, &parts, &by_path)?;
    }

    // Namespace nodes synthesized above also need their parent links.
    for id in graph.ids() {
        let parts = {
            let node = graph.node(id)?;
            if !matches!(node.kind, NodeKind::Namespace) {
                continue;
            }
            match node.name() {
                Some(name) => name.display.clone(),
                None => continue,
            }
        };
        attach_to_parent(graph, id, &parts, &by_path)?;
    }

    // Internal-linkage nodes never nest; they collapse to one flat segment.
    let mut used: HashSet<String> = by_path.keys().cloned().collect();
    for id in locals {
        let parts = match graph.node(id)?.name() {
            Some(name) => name.display.clone(),
            None => continue,
        };
        if parts.len() == 1 && !used.contains(&parts[0]) {
            used.insert(parts[0].clone());
            continue;
        }
        let mut flat = normalize_segment(&parts.join("_"));
        while used.contains(&flat) {
            flat.push('$');
        }
        used.insert(flat.clone());
        diag.record(
            Category::FlattenLocalName,
            format!("\"{}\" -> \"{flat}\"", parts.join("::")),
        );
        graph.node_mut(id)?.set_display_parts(vec![flat]);
    }
    Ok(())
}

fn attach_to_parent(
    graph: &mut TypeGraph,
    id: NodeId,
    parts: &[String],
    by_path: &HashMap<String, NodeId>,
) -> Result<()> {
    if parts.len() < 2 {
        return Ok(());
    }
    let current = graph.node(id)?.parent();
    if let Some(parent) = current {
        // A struct that owns a nested type keeps it.
        if graph.node(parent)?.aggregate().is_some() {
            return Ok(());
        }
    }
    let Some(&parent) = by_path.get(&parts[..parts.len() - 1].join("::")) else {
        return Ok(());
    };
    if parent == id {
        return Ok(());
    }
    if let Some(old) = current {
        if old == parent {
            return Ok(());
        }
        graph.node_mut(old)?.del_child(id);
    }
    graph.node_mut(id)?.set_parent(Some(parent));
    graph.node_mut(parent)?.add_child(id);
    Ok(())
}
