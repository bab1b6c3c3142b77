//! Layout reconstruction: flat member lists into nested struct/union view trees.
//!
//! The symbol dump flattens every aggregate into one ordered member list; anonymous unions
//! and overlapping storage survive only as members with colliding byte ranges. This module
//! recovers the nesting: adjacent bitfields collapse into backing-unit groups, overlapping
//! runs fold into union views, gaps become explicit padding, and the result is validated by
//! flattening it back onto the original member sequence.
//!
//! The run-stack scan escalates by merging previously closed runs when a conflicting member
//! matches no run start exactly. That branch is kept exactly as observed in practice; see
//! the deep-overlap tests at the bottom of this file.

use crate::diagnostics::{Category, DiagnosticLog};
use crate::graph::arena::TypeGraph;
use crate::graph::node::{AggregateKind, BaseSpec, NodeId, NodeKind};
use crate::Result;

/// Pointer size of the only supported target family.
pub const POINTER_SIZE: u64 = 8;

/// One entry of a collapsed bitfield group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BitfieldEntry {
    /// Index into the aggregate's member list.
    Member(usize),
    /// Synthetic padding bits filling a declaration gap.
    Pad {
        /// First bit position.
        start_bit: u16,
        /// Bit width.
        bits: u16,
    },
}

/// Leaf payload of a view item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewLeaf {
    /// Index into the aggregate's member list.
    Member(usize),
    /// Collapsed run of bitfields sharing one backing unit.
    BitfieldGroup {
        /// Backing scalar node.
        backing: NodeId,
        /// Entries with contiguous bit positions starting at 0.
        entries: Vec<BitfieldEntry>,
    },
    /// Synthetic padding bytes.
    Padding,
    /// Index into the aggregate's base list.
    Base(usize),
    /// Virtual-table pointer owned by this aggregate.
    VTablePtr,
}

/// One positioned leaf of a layout view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewItem {
    /// Byte offset within the aggregate.
    pub offset: u64,
    /// Byte size.
    pub size: u64,
    /// Leaf payload.
    pub leaf: ViewLeaf,
}

/// Nested layout view of one aggregate.
///
/// Struct views list children in ascending, non-overlapping offset order; union views list
/// overlapping branches. The two alternate: a struct child of a struct has been inlined
/// away by normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum View {
    /// Single positioned leaf.
    Item(ViewItem),
    /// Sequential region.
    Struct(Vec<View>),
    /// Overlapping region.
    Union(Vec<View>),
}

impl View {
    /// Smallest child offset; `u64::MAX` for an empty view.
    #[must_use]
    pub fn offset(&self) -> u64 {
        match self {
            View::Item(item) => item.offset,
            View::Struct(children) | View::Union(children) => {
                children.iter().map(View::offset).min().unwrap_or(u64::MAX)
            }
        }
    }

    /// One past the largest child end; 0 for an empty view.
    #[must_use]
    pub fn end(&self) -> u64 {
        match self {
            View::Item(item) => item.offset + item.size,
            View::Struct(children) | View::Union(children) => {
                children.iter().map(View::end).max().unwrap_or(0)
            }
        }
    }

    /// Covered byte size.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.end().saturating_sub(self.offset())
    }

    /// Collects leaf items depth-first, left to right.
    pub fn flatten_into<'a>(&'a self, out: &mut Vec<&'a ViewItem>) {
        match self {
            View::Item(item) => out.push(item),
            View::Struct(children) | View::Union(children) => {
                for child in children {
                    child.flatten_into(out);
                }
            }
        }
    }

    /// `true` if any union view occurs in the tree.
    #[must_use]
    pub fn has_union(&self) -> bool {
        match self {
            View::Item(_) => false,
            View::Union(_) => true,
            View::Struct(children) => children.iter().any(View::has_union),
        }
    }
}

fn run_offset(run: &[ViewItem]) -> u64 {
    run.iter().map(|m| m.offset).min().unwrap_or(u64::MAX)
}

/// Run-stack overlap scan.
///
/// A member whose offset is at or past the previous member's end extends the current run; a
/// conflicting member closes the run at the entry sharing its exact start offset. When no
/// entry matches, the most recently closed run is folded back in front of the current one
/// and the search retries, escalating the union block outward.
fn find_union(list: Vec<ViewItem>) -> Result<View> {
    let mut union_candidates: Vec<Vec<ViewItem>> = Vec::new();
    let mut tmp: Vec<ViewItem> = Vec::new();
    let mut end_offset: i128 = -1;

    for m in list {
        let prev_end = end_offset;
        end_offset = i128::from(m.offset) + i128::from(m.size);

        if prev_end <= i128::from(m.offset) {
            tmp.push(m);
            continue;
        }

        let idx = loop {
            if let Some(i) = tmp.iter().rposition(|m2| m2.offset == m.offset) {
                break i;
            }
            let Some(previous_run) = union_candidates.pop() else {
                return Err(malformed_error!(
                    "overlapping member at offset {:#x} matches no run start",
                    m.offset
                ));
            };
            let mut merged = previous_run;
            merged.append(&mut tmp);
            tmp = merged;
        };

        let union_block = tmp.split_off(idx);
        if !tmp.is_empty() {
            union_candidates.push(std::mem::take(&mut tmp));
        }
        union_candidates.push(union_block);
        tmp = vec![m];
    }

    if union_candidates.is_empty() {
        return Ok(View::Struct(tmp.into_iter().map(View::Item).collect()));
    }

    let candidates_end = union_candidates
        .iter()
        .flat_map(|run| run.iter().map(|m| m.offset + m.size))
        .max()
        .unwrap_or(0);

    let tail_elems: Vec<ViewItem> = tmp.iter().filter(|m| m.offset >= candidates_end).cloned().collect();
    let inner: Vec<ViewItem> = tmp.into_iter().filter(|m| m.offset < candidates_end).collect();

    let mut runs = union_candidates;
    runs.push(inner);

    let last_offset = run_offset(runs.last().map_or(&[][..], Vec::as_slice));
    let (union_runs, rest): (Vec<Vec<ViewItem>>, Vec<Vec<ViewItem>>) =
        runs.into_iter().partition(|run| run_offset(run) == last_offset);

    let prefix = find_union(rest.into_iter().flatten().collect())?;
    let mut branches = Vec::with_capacity(union_runs.len());
    for run in union_runs {
        branches.push(find_union(run)?);
    }

    let mut children = match prefix {
        View::Struct(inner_children) => inner_children,
        other => vec![other],
    };
    children.push(View::Union(branches));
    if !tail_elems.is_empty() {
        children.push(View::Struct(tail_elems.into_iter().map(View::Item).collect()));
    }
    Ok(View::Struct(children))
}

/// Bottom-up normalization: struct children inline into struct parents; a single-child
/// struct inside a union unwraps.
fn normalize(view: View) -> View {
    match view {
        View::Item(_) => view,
        View::Union(children) => {
            let mut out = Vec::new();
            for child in children {
                match normalize(child) {
                    View::Struct(mut inner) if inner.len() == 1 => out.push(inner.remove(0)),
                    other => out.push(other),
                }
            }
            View::Union(out)
        }
        View::Struct(children) => {
            let mut out = Vec::new();
            for child in children {
                match normalize(child) {
                    View::Struct(inner) => out.extend(inner),
                    other => out.push(other),
                }
            }
            View::Struct(out)
        }
    }
}

/// Wraps bitfield-group items sitting directly under a union into a struct view, so union
/// branches are uniformly renderable as sequences.
fn wrap_groups_under_unions(view: &mut View) {
    match view {
        View::Item(_) => {}
        View::Struct(children) => {
            for child in children {
                wrap_groups_under_unions(child);
            }
        }
        View::Union(children) => {
            for child in children.iter_mut() {
                if matches!(
                    child,
                    View::Item(ViewItem { leaf: ViewLeaf::BitfieldGroup { .. }, .. })
                ) {
                    let item = std::mem::replace(child, View::Struct(Vec::new()));
                    *child = View::Struct(vec![item]);
                }
                wrap_groups_under_unions(child);
            }
        }
    }
}

/// Inserts padding items into struct views wherever the next child starts past the running
/// cursor. The root runs with an explicit start and a trailing target; nested struct views
/// start at their own first offset and get no trailing pad.
fn insert_padding(view: &mut View, type_name: &str) -> Result<()> {
    match view {
        View::Item(_) => Ok(()),
        View::Union(children) => {
            for child in children {
                insert_padding(child, type_name)?;
            }
            Ok(())
        }
        View::Struct(children) => {
            let start = children.iter().map(View::offset).min().unwrap_or(0);
            pad_children(children, start, None, type_name)?;
            for child in children.iter_mut() {
                insert_padding(child, type_name)?;
            }
            Ok(())
        }
    }
}

fn pad_children(
    children: &mut Vec<View>,
    start: u64,
    trailing_to: Option<u64>,
    type_name: &str,
) -> Result<()> {
    let mut out = Vec::with_capacity(children.len());
    let mut cursor = start;
    for child in children.drain(..) {
        let offset = child.offset();
        if offset != u64::MAX && cursor > offset {
            return Err(crate::Error::LayoutMismatch {
                type_name: type_name.to_string(),
                message: format!("cursor {cursor:#x} past sequential child at {offset:#x}"),
            });
        }
        if offset != u64::MAX && cursor < offset {
            out.push(View::Item(ViewItem {
                offset: cursor,
                size: offset - cursor,
                leaf: ViewLeaf::Padding,
            }));
        }
        if offset != u64::MAX {
            cursor = child.end().max(cursor);
        }
        out.push(child);
    }
    if let Some(total) = trailing_to {
        if cursor > total {
            return Err(crate::Error::LayoutMismatch {
                type_name: type_name.to_string(),
                message: format!("members end at {cursor:#x} past declared size {total:#x}"),
            });
        }
        if cursor < total {
            out.push(View::Item(ViewItem {
                offset: cursor,
                size: total - cursor,
                leaf: ViewLeaf::Padding,
            }));
        }
    }
    *children = out;
    Ok(())
}

fn leaf_key(item: &ViewItem) -> Option<usize> {
    match &item.leaf {
        ViewLeaf::Member(index) => Some(*index),
        ViewLeaf::BitfieldGroup { entries, .. } => entries.iter().find_map(|entry| match entry {
            BitfieldEntry::Member(index) => Some(*index),
            BitfieldEntry::Pad { .. } => None,
        }),
        _ => None,
    }
}

fn validate_flatten(view: &View, items: &[ViewItem], type_name: &str) -> Result<()> {
    let mut flat = Vec::new();
    view.flatten_into(&mut flat);
    if flat.len() != items.len() {
        return Err(crate::Error::LayoutMismatch {
            type_name: type_name.to_string(),
            message: format!("view holds {} leaves, member list {}", flat.len(), items.len()),
        });
    }
    for (got, expected) in flat.iter().zip(items) {
        if leaf_key(got) != leaf_key(expected) || got.offset != expected.offset {
            return Err(crate::Error::LayoutMismatch {
                type_name: type_name.to_string(),
                message: format!(
                    "leaf at {:#x} out of order against member list entry at {:#x}",
                    got.offset, expected.offset
                ),
            });
        }
    }
    Ok(())
}

/// `true` for aggregates that occupy no real storage: size at most one byte, no members,
/// no own vtable, and only empty bases, recursively.
pub(crate) fn is_empty_aggregate(graph: &TypeGraph, id: NodeId) -> Result<bool> {
    let id = graph.strip_modifiers(id)?;
    let node = graph.node(id)?;
    let Some(data) = node.aggregate() else {
        return Ok(false);
    };
    if node.size() > 1 || !data.members.is_empty() || data.vtable_shape.is_some() {
        return Ok(false);
    }
    for base in &data.bases {
        if !is_empty_aggregate(graph, base.ty)? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Collapses adjacent bitfield members sharing an offset into group items; all other
/// members become plain items sized by their type.
fn collect_items(graph: &TypeGraph, id: NodeId) -> Result<Vec<ViewItem>> {
    let node = graph.node(id)?;
    let data = node.aggregate().ok_or(crate::Error::NodeNotFound(id.raw()))?;
    let type_name = node.display_path();

    let mut items = Vec::with_capacity(data.members.len());
    let mut i = 0;
    while i < data.members.len() {
        let member = &data.members[i];
        let member_ty = graph.node(member.ty)?;

        let NodeKind::Bitfield { element, start_bit, .. } = member_ty.kind else {
            items.push(ViewItem {
                offset: member.offset,
                size: member_ty.size(),
                leaf: ViewLeaf::Member(i),
            });
            i += 1;
            continue;
        };

        if start_bit != 0 {
            return Err(malformed_error!(
                "`{type_name}`: bitfield group at offset {:#x} starts at bit {start_bit}",
                member.offset
            ));
        }
        let backing = element;
        let backing_size = graph.node(backing)?.size();
        let backing_bits = u16::try_from(backing_size * 8)
            .map_err(|_| malformed_error!("`{type_name}`: oversized bitfield backing unit"))?;

        let group_offset = member.offset;
        let mut entries = Vec::new();
        let mut bit_cursor: u16 = 0;

        while i < data.members.len() {
            let m2 = &data.members[i];
            let NodeKind::Bitfield {
                element: e2,
                start_bit: s2,
                bits: b2,
            } = graph.node(m2.ty)?.kind
            else {
                break;
            };
            if m2.offset != group_offset {
                break;
            }
            if graph.strip_modifiers(e2)? != graph.strip_modifiers(backing)? {
                return Err(malformed_error!(
                    "`{type_name}`: mixed backing units in bitfield group at offset {group_offset:#x}"
                ));
            }
            if bit_cursor > s2 {
                return Err(malformed_error!(
                    "`{type_name}`: overlapping bitfields at offset {group_offset:#x}, bit {s2}"
                ));
            }
            if bit_cursor < s2 {
                entries.push(BitfieldEntry::Pad {
                    start_bit: bit_cursor,
                    bits: s2 - bit_cursor,
                });
                bit_cursor = s2;
            }
            bit_cursor += b2;
            if bit_cursor > backing_bits {
                return Err(malformed_error!(
                    "`{type_name}`: bitfield group at offset {group_offset:#x} exceeds {backing_bits} bits"
                ));
            }
            entries.push(BitfieldEntry::Member(i));
            i += 1;
        }

        items.push(ViewItem {
            offset: group_offset,
            size: backing_size,
            leaf: ViewLeaf::BitfieldGroup { backing, entries },
        });
    }
    Ok(items)
}

/// Selects the single retained base of each aggregate and logs what was dropped.
fn select_retained_base(graph: &mut TypeGraph, id: NodeId, diags: &DiagnosticLog) -> Result<()> {
    let node = graph.node(id)?;
    let Some(data) = node.aggregate() else {
        return Ok(());
    };
    if data.bases.is_empty() {
        return Ok(());
    }
    let type_name = node.display_path();

    let mut order: Vec<usize> = (0..data.bases.len()).collect();
    order.sort_by_key(|&i| data.bases[i].offset);

    let (retained, dropped_from, reason) = if data.vtable_shape.is_some() {
        (None, 0, Some("has vfunctab"))
    } else if data.has_virtual_base {
        (None, 0, Some("has virtual base"))
    } else if order.len() == 1 {
        (Some(order[0]), 1, None)
    } else {
        (Some(order[0]), 1, Some("multiple bases"))
    };

    if let Some(reason) = reason {
        let dropped: Vec<String> = order[dropped_from..]
            .iter()
            .map(|&i| {
                let base = &data.bases[i];
                format!(
                    "{} at {:#x}",
                    graph.get(base.ty).map_or_else(|| base.ty.to_string(), |n| n.display_path()),
                    base.offset
                )
            })
            .collect();
        diags.record(
            Category::RemovedMultipleInheritance,
            format!("`{type_name}` ({reason}): dropped [{}]", dropped.join(", ")),
        );
    }

    if let Some(data) = graph.node_mut(id)?.aggregate_mut() {
        data.retained_base = retained;
    }
    Ok(())
}

/// Reconstructs the layout view of every complete aggregate in the graph.
///
/// # Errors
/// Fatal on malformed bitfield groups, on a view that fails to flatten back onto the
/// member list, and on members extending past the declared size.
pub fn reconstruct_layouts(graph: &mut TypeGraph, diags: &DiagnosticLog) -> Result<()> {
    let aggregate_ids: Vec<NodeId> = graph
        .iter()
        .filter(|n| n.aggregate().is_some() && !n.auto_gen_for_fwd())
        .map(|n| n.id)
        .collect();

    for id in aggregate_ids {
        select_retained_base(graph, id, diags)?;

        let node = graph.node(id)?;
        let data = node.aggregate().ok_or(crate::Error::NodeNotFound(id.raw()))?;
        if data.members.is_empty() {
            continue;
        }
        let type_name = node.display_path();
        let kind = data.kind;
        let declared_size = node.size();
        let vtable_shape = data.vtable_shape;
        let retained: Option<(usize, BaseSpec)> =
            data.retained_base.map(|i| (i, data.bases[i].clone()));

        let items = collect_items(graph, id)?;
        let mut view = normalize(find_union(items.clone())?);
        validate_flatten(&view, &items, &type_name)?;
        wrap_groups_under_unions(&mut view);

        let mut root = if kind == AggregateKind::Union {
            let View::Struct(mut children) = view else {
                return Err(crate::Error::LayoutMismatch {
                    type_name,
                    message: "union did not reduce to a single region".to_string(),
                });
            };
            if children.len() != 1 {
                return Err(crate::Error::LayoutMismatch {
                    type_name,
                    message: format!("union reduced to {} sequential regions", children.len()),
                });
            }
            children.remove(0)
        } else {
            let mut children = Vec::new();
            if vtable_shape.is_some() {
                children.push(View::Item(ViewItem {
                    offset: 0,
                    size: POINTER_SIZE,
                    leaf: ViewLeaf::VTablePtr,
                }));
            }
            if let Some((index, base)) = &retained {
                let base_size = if is_empty_aggregate(graph, base.ty)? {
                    0
                } else {
                    graph.node(graph.strip_modifiers(base.ty)?)?.size()
                };
                children.push(View::Item(ViewItem {
                    offset: base.offset,
                    size: base_size,
                    leaf: ViewLeaf::Base(*index),
                }));
            }
            match view {
                View::Struct(member_children) => children.extend(member_children),
                other => children.push(other),
            }
            pad_children(&mut children, 0, Some(declared_size), &type_name)?;
            View::Struct(children)
        };

        // Fill gaps inside nested regions (the root's own run is already padded above).
        insert_padding(&mut root, &type_name)?;

        if root.has_union() {
            diags.record(Category::UnionDetected, format!("`{type_name}`"));
        }

        if let Some(data) = graph.node_mut(id)?.aggregate_mut() {
            data.layout = Some(root);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(offset: u64, size: u64, index: usize) -> ViewItem {
        ViewItem { offset, size, leaf: ViewLeaf::Member(index) }
    }

    fn member_offsets(view: &View) -> Vec<(u64, usize)> {
        let mut flat = Vec::new();
        view.flatten_into(&mut flat);
        flat.iter()
            .filter_map(|i| match i.leaf {
                ViewLeaf::Member(index) => Some((i.offset, index)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_sequential_members_stay_flat() {
        let items = vec![item(0, 4, 0), item(4, 4, 1), item(8, 4, 2)];
        let view = normalize(find_union(items).unwrap());
        assert!(!view.has_union());
        assert_eq!(member_offsets(&view), vec![(0, 0), (4, 1), (8, 2)]);
    }

    #[test]
    fn test_overlap_folds_into_union() {
        // [0,4) [0,4) [4,8): the first two share storage, the third follows.
        let items = vec![item(0, 4, 0), item(0, 4, 1), item(4, 4, 2)];
        let view = normalize(find_union(items.clone()).unwrap());
        assert!(view.has_union());
        validate_flatten(&view, &items, "t").unwrap();

        let View::Struct(children) = &view else { panic!("expected struct root") };
        let unions: Vec<&View> = children.iter().filter(|c| matches!(c, View::Union(_))).collect();
        assert_eq!(unions.len(), 1);
        let View::Union(branches) = unions[0] else { unreachable!() };
        assert_eq!(branches.len(), 2);
    }

    #[test]
    fn test_union_followed_by_struct_run() {
        // union { a; struct { b; c; } } d;
        let items = vec![item(0, 8, 0), item(0, 4, 1), item(4, 4, 2), item(8, 4, 3)];
        let view = normalize(find_union(items.clone()).unwrap());
        validate_flatten(&view, &items, "t").unwrap();
        assert!(view.has_union());
        // d stays outside any union branch.
        let View::Struct(children) = &view else { panic!("expected struct root") };
        assert!(matches!(children.last(), Some(View::Item(ViewItem { offset: 8, .. }))));
    }

    #[test]
    fn test_merge_and_retry_escalates_runs() {
        // The third member restarts at 0 after two separate runs were already closed;
        // the exact-start search must fold closed runs back before it matches.
        let items = vec![
            item(0, 8, 0),
            item(0, 4, 1),
            item(4, 4, 2),
            item(0, 8, 3),
            item(8, 4, 4),
        ];
        let view = normalize(find_union(items.clone()).unwrap());
        validate_flatten(&view, &items, "t").unwrap();
        assert!(view.has_union());
    }

    #[test]
    fn test_unmatched_overlap_is_fatal() {
        // Overlap at an offset that was never a run start and with nothing to merge.
        let items = vec![item(0, 8, 0), item(4, 8, 1)];
        assert!(find_union(items).is_err());
    }

    #[test]
    fn test_padding_inserted_between_and_after() {
        let mut children = vec![View::Item(item(0, 4, 0)), View::Item(item(8, 4, 1))];
        pad_children(&mut children, 0, Some(16), "t").unwrap();
        let offsets: Vec<(u64, u64, bool)> = children
            .iter()
            .map(|c| match c {
                View::Item(i) => (i.offset, i.size, matches!(i.leaf, ViewLeaf::Padding)),
                _ => panic!("leaf expected"),
            })
            .collect();
        assert_eq!(
            offsets,
            vec![(0, 4, false), (4, 4, true), (8, 4, false), (12, 4, true)]
        );
    }

    #[test]
    fn test_member_past_declared_size_is_fatal() {
        let mut children = vec![View::Item(item(0, 8, 0))];
        let result = pad_children(&mut children, 0, Some(4), "t");
        assert!(matches!(result, Err(crate::Error::LayoutMismatch { .. })));
    }
}
