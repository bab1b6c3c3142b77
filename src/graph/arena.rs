//! Id-indexed node arena.
//!
//! All cross-node references are [`NodeId`]s resolved through the arena; nodes never hold
//! pointers to each other. Ownership (nesting) and plain reference (element, parameter) are
//! separate relations: the former lives in the parent/children links, the latter inside the
//! node payloads.
//!
//! Synthesized nodes draw ids from the disjoint range starting at [`SYNTH_BASE`], so they
//! can never collide with record ids from the input.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::graph::node::{Node, NodeId, NodeKind, ProcData};
use crate::Result;

/// First id of the synthetic range.
pub const SYNTH_BASE: u32 = 1 << 30;

/// Monotonic allocator for synthetic node ids and unique name tokens.
#[derive(Debug)]
pub struct IdAllocator {
    next_id: AtomicU32,
    next_token: AtomicU32,
}

impl Default for IdAllocator {
    fn default() -> Self {
        IdAllocator {
            next_id: AtomicU32::new(SYNTH_BASE),
            next_token: AtomicU32::new(1),
        }
    }
}

impl IdAllocator {
    /// Next unused synthetic node id.
    pub fn next_id(&self) -> NodeId {
        let raw = self.next_id.fetch_add(1, Ordering::Relaxed);
        NodeId::from_raw(raw).unwrap_or_else(|_| unreachable!("synthetic ids start above zero"))
    }

    /// Next deterministic unique name token, e.g. `$g5_gap`.
    pub fn next_token(&self, tag: &str) -> String {
        let n = self.next_token.fetch_add(1, Ordering::Relaxed);
        if tag.is_empty() {
            format!("$g{n:x}")
        } else {
            format!("$g{n:x}_{tag}")
        }
    }
}

/// Arena of all graph nodes, keyed by id.
#[derive(Debug, Default)]
pub struct TypeGraph {
    nodes: BTreeMap<NodeId, Node>,
    alloc: IdAllocator,
}

impl TypeGraph {
    /// Empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// `true` when the graph holds no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Allocates a fresh synthetic id.
    #[must_use]
    pub fn alloc_id(&self) -> NodeId {
        self.alloc.next_id()
    }

    /// Allocates a deterministic unique name token.
    #[must_use]
    pub fn next_token(&self, tag: &str) -> String {
        self.alloc.next_token(tag)
    }

    /// `true` for ids from the synthetic range.
    #[must_use]
    pub fn is_synthetic(&self, id: NodeId) -> bool {
        id.raw() >= SYNTH_BASE
    }

    /// Inserts a node under its own id.
    ///
    /// # Errors
    /// Returns [`crate::Error::DuplicateRecord`] if the id is already occupied.
    pub fn insert(&mut self, node: Node) -> Result<NodeId> {
        let id = node.id;
        if self.nodes.contains_key(&id) {
            return Err(crate::Error::DuplicateRecord(id.raw()));
        }
        self.nodes.insert(id, node);
        Ok(id)
    }

    /// Node by id.
    ///
    /// # Errors
    /// Returns [`crate::Error::NodeNotFound`] for an unknown id.
    pub fn node(&self, id: NodeId) -> Result<&Node> {
        self.nodes.get(&id).ok_or(crate::Error::NodeNotFound(id.raw()))
    }

    /// Mutable node by id.
    ///
    /// # Errors
    /// Returns [`crate::Error::NodeNotFound`] for an unknown id.
    pub fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.nodes.get_mut(&id).ok_or(crate::Error::NodeNotFound(id.raw()))
    }

    /// Node by id without failing.
    #[must_use]
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    /// All ids in ascending order.
    #[must_use]
    pub fn ids(&self) -> Vec<NodeId> {
        self.nodes.keys().copied().collect()
    }

    /// Nodes in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// The node's id plus the ids of its whole owned subtree.
    ///
    /// # Errors
    /// Returns an error if a child link is dangling.
    pub fn subtree_ids(&self, id: NodeId) -> Result<Vec<NodeId>> {
        let mut out = vec![id];
        let mut stack = self.node(id)?.children().to_vec();
        while let Some(child) = stack.pop() {
            out.push(child);
            stack.extend_from_slice(self.node(child)?.children());
        }
        Ok(out)
    }

    /// Walks parent links up to the top-level owner.
    ///
    /// # Errors
    /// Returns an error if a parent link is dangling.
    pub fn root_owner(&self, id: NodeId) -> Result<NodeId> {
        let mut current = id;
        loop {
            match self.node(current)?.parent() {
                Some(parent) => current = parent,
                None => return Ok(current),
            }
        }
    }

    /// Strips modifier wrappers, returning the underlying node id.
    ///
    /// # Errors
    /// Returns an error if a modifier chain dangles.
    pub fn strip_modifiers(&self, id: NodeId) -> Result<NodeId> {
        let mut current = id;
        loop {
            match &self.node(current)?.kind {
                NodeKind::Modifier { element, .. } => current = *element,
                _ => return Ok(current),
            }
        }
    }

    /// Structural fingerprint of a type expression.
    ///
    /// Aggregates and enums fingerprint by identity (their id); everything else by
    /// structure, so two pointer records with the same shape compare equal.
    ///
    /// # Errors
    /// Returns an error on a dangling reference.
    pub fn fingerprint(&self, id: NodeId) -> Result<String> {
        let node = self.node(id)?;
        Ok(match &node.kind {
            NodeKind::Void => "void".to_string(),
            NodeKind::Scalar(kind) => kind.to_string(),
            NodeKind::Pointer { element, flags } => {
                format!("ptr[{:02x}]({})", flags.bits(), self.fingerprint(*element)?)
            }
            NodeKind::Modifier { element, flags } => {
                format!("mod[{:02x}]({})", flags.bits(), self.fingerprint(*element)?)
            }
            NodeKind::Array { element, length } => {
                format!("arr[{length}]({})", self.fingerprint(*element)?)
            }
            NodeKind::Bitfield { element, start_bit, bits } => {
                format!("bf[{start_bit}:{bits}]({})", self.fingerprint(*element)?)
            }
            NodeKind::Enum(_) => format!("enum#{}", id.raw()),
            NodeKind::Aggregate(_) => format!("agg#{}", id.raw()),
            NodeKind::Procedure(data) => self.proc_fingerprint(data, true)?,
            NodeKind::Var { element } => format!("var({})", self.fingerprint(*element)?),
            NodeKind::Using { target } => format!("using({})", self.fingerprint(*target)?),
            NodeKind::Namespace => "namespace".to_string(),
        })
    }

    /// Fingerprint of a procedure signature, optionally excluding the `this` type.
    ///
    /// The `with_this: false` form is the override-matching key of vtable synthesis.
    ///
    /// # Errors
    /// Returns an error on a dangling reference.
    pub fn proc_fingerprint(&self, data: &ProcData, with_this: bool) -> Result<String> {
        let mut parts = Vec::with_capacity(data.params.len() + 2);
        parts.push(self.fingerprint(data.return_type)?);
        for param in &data.params {
            match param {
                Some(ty) => parts.push(self.fingerprint(*ty)?),
                None => parts.push("...".to_string()),
            }
        }
        let this = match (with_this, data.this) {
            (true, Some(this)) => format!(";this={}", self.fingerprint(this)?),
            _ => String::new(),
        };
        Ok(format!("fn[{}]({}){}", data.convention, parts.join(","), this))
    }

    /// Structural equality of two type expressions.
    ///
    /// # Errors
    /// Returns an error on a dangling reference.
    pub fn structural_eq(&self, a: NodeId, b: NodeId) -> Result<bool> {
        if a == b {
            return Ok(true);
        }
        Ok(self.fingerprint(a)? == self.fingerprint(b)?)
    }
}
