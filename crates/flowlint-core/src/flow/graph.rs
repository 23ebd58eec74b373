//! Flow graph model
//!
//! Blocks, edges and per-function graphs live in arenas owned by a
//! [`FlowModel`]. Edges may be open on either end while a construct is
//! still being assembled; the linking operations close them, joining
//! adjacent basic blocks when nothing distinguishes the seam.

use std::collections::HashMap;
use std::fmt;

use id_arena::{Arena, Id};
use swc_common::Span;

use crate::semantic::ScopeId;

pub type BlockId = Id<Block>;
pub type EdgeId = Id<Edge>;
pub type GraphId = Id<FlowGraph>;
pub type NodeId = Id<NodeRecord>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FlowError {
    #[error("block has no open sequential outlet")]
    MissingSequentialOutlet,
    #[error("block has no open sequential inlet")]
    MissingSequentialInlet,
    #[error("break or continue could not be resolved to an enclosing construct")]
    UnresolvedJumpTarget,
    #[error("builder stack underflow")]
    StackUnderflow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    /// Retired edge, kept in the arena so ids stay valid.
    None,
    Sequential,
    Jump,
}

/// Bitset qualifying an edge. Tags combine with `|`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Tag(u8);

impl Tag {
    pub const NONE: Tag = Tag(0);
    pub const TRUE_BRANCH: Tag = Tag(1 << 0);
    pub const FALSE_BRANCH: Tag = Tag(1 << 1);
    pub const LOOP_BACK: Tag = Tag(1 << 2);
    pub const CUT: Tag = Tag(1 << 3);

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn contains(self, other: Tag) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn intersects(self, other: Tag) -> bool {
        self.0 & other.0 != 0
    }

    pub fn without(self, other: Tag) -> Tag {
        Tag(self.0 & !other.0)
    }

    pub fn describe(self) -> String {
        if self.is_empty() {
            return "-".to_string();
        }
        let mut parts = Vec::new();
        if self.contains(Tag::TRUE_BRANCH) {
            parts.push("true");
        }
        if self.contains(Tag::FALSE_BRANCH) {
            parts.push("false");
        }
        if self.contains(Tag::LOOP_BACK) {
            parts.push("loop");
        }
        if self.contains(Tag::CUT) {
            parts.push("cut");
        }
        parts.join("|")
    }
}

impl std::ops::BitOr for Tag {
    type Output = Tag;

    fn bitor(self, rhs: Tag) -> Tag {
        Tag(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for Tag {
    fn bitor_assign(&mut self, rhs: Tag) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tag({})", self.describe())
    }
}

#[derive(Debug, Clone)]
pub struct Edge {
    pub kind: EdgeKind,
    pub tag: Tag,
    /// Missing while the edge is an inbound placeholder.
    pub src: Option<BlockId>,
    /// Missing while the edge is an outbound placeholder.
    pub dst: Option<BlockId>,
}

impl Edge {
    pub fn is_open(&self) -> bool {
        self.kind != EdgeKind::None && (self.src.is_none() || self.dst.is_none())
    }

    pub fn is_closed(&self) -> bool {
        self.kind != EdgeKind::None && self.src.is_some() && self.dst.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    /// Entry marker of a graph; owns no AST nodes.
    Start,
    Basic,
    /// Composite standing for a finished construct. Its edge lists mirror
    /// the entry and exit edges of the blocks it wraps.
    Group { entry: BlockId },
}

#[derive(Debug)]
pub struct Block {
    pub kind: BlockKind,
    pub nodes: Vec<NodeId>,
    pub inlets: Vec<EdgeId>,
    pub outlets: Vec<EdgeId>,
    /// Set when this block was joined into another; the target supersedes it.
    forward: Option<BlockId>,
}

impl Block {
    pub fn is_group(&self) -> bool {
        matches!(self.kind, BlockKind::Group { .. })
    }

    pub fn is_merged(&self) -> bool {
        self.forward.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// A statement the reachability rule reports on.
    Statement,
    /// Hoisted declarations (functions, imports); never reported.
    Hoisted,
    Expression,
    Binding,
    /// Standing node for a function expression whose body lives in a sub graph.
    Function,
}

#[derive(Debug, Clone, Copy)]
pub struct NodeRecord {
    pub span: Span,
    pub kind: NodeKind,
}

/// Per-function flow graph plus the forward-resolution tables used while
/// the builder is still inside the construct that will satisfy them.
#[derive(Debug)]
pub struct FlowGraph {
    pub head: BlockId,
    pub exit: Option<BlockId>,
    pub parent: Option<GraphId>,
    pub subs: Vec<GraphId>,
    /// Every real block created while this graph was current, in order.
    pub blocks: Vec<BlockId>,
    /// Label scope to its entry block.
    pub labels: HashMap<ScopeId, BlockId>,
    /// Label scope to the loop scope it directly wraps, if any.
    pub label_loops: HashMap<ScopeId, ScopeId>,
    /// Loop scope to its header block.
    pub loop_entries: HashMap<ScopeId, BlockId>,
    /// Break edges waiting for the construct that will own their exit.
    pub hanging_breaks: HashMap<ScopeId, Vec<EdgeId>>,
    /// Return/throw edges drained into the exit marker at seal.
    pub pending_exits: Vec<EdgeId>,
}

pub struct FlowModel {
    blocks: Arena<Block>,
    edges: Arena<Edge>,
    graphs: Arena<FlowGraph>,
    nodes: Arena<NodeRecord>,
    root: GraphId,
    node_by_span: HashMap<(u32, u32), NodeId>,
    graph_by_span: HashMap<(u32, u32), GraphId>,
    block_of_node: HashMap<NodeId, BlockId>,
}

fn span_key(span: Span) -> (u32, u32) {
    (span.lo.0, span.hi.0)
}

impl FlowModel {
    pub fn new() -> Self {
        let mut blocks = Arena::new();
        let mut edges = Arena::new();
        let mut graphs = Arena::new();

        let head = blocks.alloc(Block {
            kind: BlockKind::Start,
            nodes: Vec::new(),
            inlets: Vec::new(),
            outlets: Vec::new(),
            forward: None,
        });
        let outlet = edges.alloc(Edge {
            kind: EdgeKind::Sequential,
            tag: Tag::NONE,
            src: Some(head),
            dst: None,
        });
        blocks[head].outlets.push(outlet);
        let root = graphs.alloc(FlowGraph {
            head,
            exit: None,
            parent: None,
            subs: Vec::new(),
            blocks: vec![head],
            labels: HashMap::new(),
            label_loops: HashMap::new(),
            loop_entries: HashMap::new(),
            hanging_breaks: HashMap::new(),
            pending_exits: Vec::new(),
        });

        Self {
            blocks,
            edges,
            graphs,
            nodes: Arena::new(),
            root,
            node_by_span: HashMap::new(),
            graph_by_span: HashMap::new(),
            block_of_node: HashMap::new(),
        }
    }

    // ---- accessors ----

    pub fn root(&self) -> GraphId {
        self.root
    }

    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id]
    }

    pub fn edge(&self, id: EdgeId) -> &Edge {
        &self.edges[id]
    }

    pub fn graph(&self, id: GraphId) -> &FlowGraph {
        &self.graphs[id]
    }

    pub fn graph_mut(&mut self, id: GraphId) -> &mut FlowGraph {
        &mut self.graphs[id]
    }

    pub fn node_record(&self, id: NodeId) -> &NodeRecord {
        &self.nodes[id]
    }

    pub fn graphs(&self) -> impl Iterator<Item = GraphId> + '_ {
        self.graphs.iter().map(|(id, _)| id)
    }

    pub fn edges(&self) -> impl Iterator<Item = (EdgeId, &Edge)> {
        self.edges.iter()
    }

    /// Real blocks of a graph in creation order, skipping joined-away blocks.
    pub fn graph_blocks(&self, graph: GraphId) -> impl Iterator<Item = BlockId> + '_ {
        let blocks = &self.blocks;
        self.graphs[graph]
            .blocks
            .iter()
            .copied()
            .filter(move |&b| !blocks[b].is_merged())
    }

    pub fn node_at(&self, span: Span) -> Option<NodeId> {
        self.node_by_span.get(&span_key(span)).copied()
    }

    pub fn graph_at(&self, span: Span) -> Option<GraphId> {
        self.graph_by_span.get(&span_key(span)).copied()
    }

    /// Block currently holding the node, following joins.
    pub fn block_of(&self, node: NodeId) -> Option<BlockId> {
        self.block_of_node.get(&node).map(|&b| self.resolve(b))
    }

    pub fn resolve(&self, mut block: BlockId) -> BlockId {
        while let Some(next) = self.blocks[block].forward {
            block = next;
        }
        block
    }

    // ---- construction ----

    pub fn new_graph(&mut self, parent: Option<GraphId>, span: Option<Span>) -> GraphId {
        let head = self.blocks.alloc(Block {
            kind: BlockKind::Start,
            nodes: Vec::new(),
            inlets: Vec::new(),
            outlets: Vec::new(),
            forward: None,
        });
        let outlet = self.edges.alloc(Edge {
            kind: EdgeKind::Sequential,
            tag: Tag::NONE,
            src: Some(head),
            dst: None,
        });
        self.blocks[head].outlets.push(outlet);

        let graph = self.graphs.alloc(FlowGraph {
            head,
            exit: None,
            parent,
            subs: Vec::new(),
            blocks: vec![head],
            labels: HashMap::new(),
            label_loops: HashMap::new(),
            loop_entries: HashMap::new(),
            hanging_breaks: HashMap::new(),
            pending_exits: Vec::new(),
        });
        if let Some(p) = parent {
            self.graphs[p].subs.push(graph);
        }
        if let Some(s) = span {
            self.graph_by_span.insert(span_key(s), graph);
        }
        graph
    }

    /// A fresh basic block with open sequential placeholders on both sides.
    pub fn new_basic(&mut self, graph: GraphId) -> BlockId {
        let b = self.blocks.alloc(Block {
            kind: BlockKind::Basic,
            nodes: Vec::new(),
            inlets: Vec::new(),
            outlets: Vec::new(),
            forward: None,
        });
        let inlet = self.edges.alloc(Edge {
            kind: EdgeKind::Sequential,
            tag: Tag::NONE,
            src: None,
            dst: Some(b),
        });
        let outlet = self.edges.alloc(Edge {
            kind: EdgeKind::Sequential,
            tag: Tag::NONE,
            src: Some(b),
            dst: None,
        });
        self.blocks[b].inlets.push(inlet);
        self.blocks[b].outlets.push(outlet);
        self.graphs[graph].blocks.push(b);
        b
    }

    pub fn new_node(&mut self, span: Span, kind: NodeKind) -> NodeId {
        let n = self.nodes.alloc(NodeRecord { span, kind });
        self.node_by_span.insert(span_key(span), n);
        n
    }

    pub fn attach_node(&mut self, block: BlockId, node: NodeId) {
        let b = self.resolve(block);
        self.blocks[b].nodes.push(node);
        self.block_of_node.insert(node, b);
    }

    // ---- edge algebra ----

    /// Open outlets of `block` matching kind and tag; CUT is carried along
    /// rather than matched on.
    pub fn open_outlets(&self, block: BlockId, kind: EdgeKind, tag: Tag) -> Vec<EdgeId> {
        let b = self.resolve(block);
        self.blocks[b]
            .outlets
            .iter()
            .copied()
            .filter(|&e| {
                let edge = &self.edges[e];
                edge.kind == kind && edge.dst.is_none() && edge.tag.without(Tag::CUT) == tag
            })
            .collect()
    }

    /// The block an open sequential inlet of `block` leads into.
    pub fn entry_block(&self, block: BlockId) -> Result<BlockId, FlowError> {
        let b = self.resolve(block);
        if self.blocks[b].kind == BlockKind::Start {
            return Ok(b);
        }
        for &e in &self.blocks[b].inlets {
            let edge = &self.edges[e];
            if edge.kind == EdgeKind::Sequential && edge.src.is_none() {
                return edge
                    .dst
                    .map(|d| self.resolve(d))
                    .ok_or(FlowError::MissingSequentialInlet);
            }
        }
        Err(FlowError::MissingSequentialInlet)
    }

    fn open_seq_out(&self, block: BlockId) -> Result<EdgeId, FlowError> {
        let b = self.resolve(block);
        self.blocks[b]
            .outlets
            .iter()
            .copied()
            .find(|&e| {
                let edge = &self.edges[e];
                edge.kind == EdgeKind::Sequential && edge.dst.is_none()
            })
            .ok_or(FlowError::MissingSequentialOutlet)
    }

    /// The block an open sequential outlet of `block` leaves from.
    pub fn seq_source(&self, block: BlockId) -> Result<BlockId, FlowError> {
        let e = self.open_seq_out(block)?;
        self.edges[e]
            .src
            .map(|s| self.resolve(s))
            .ok_or(FlowError::MissingSequentialOutlet)
    }

    /// Close every open outlet of `from` matching kind and tag onto `to`.
    /// A lone untagged sequential match joins the two basic blocks when the
    /// seam carries no other information. Either side missing is a no-op.
    pub fn link(
        &mut self,
        from: Option<BlockId>,
        kind: EdgeKind,
        tag: Tag,
        to: Option<BlockId>,
    ) -> Result<(), FlowError> {
        let (Some(from), Some(to)) = (from, to) else {
            return Ok(());
        };
        if kind == EdgeKind::None {
            return Ok(());
        }
        let from = self.resolve(from);
        let to = self.resolve(to);

        let matching = self.open_outlets(from, kind, tag);
        if matching.is_empty() {
            return Ok(());
        }

        if kind == EdgeKind::Sequential
            && tag.is_empty()
            && matching.len() == 1
            && self.try_join(matching[0], to)?
        {
            return Ok(());
        }

        let entry = self.entry_block(to)?;
        for e in matching {
            self.edges[e].dst = Some(entry);
            self.blocks[entry].inlets.push(e);
            if to != entry {
                self.blocks[to].inlets.push(e);
            }
        }
        Ok(())
    }

    /// Sequence two finished siblings: fallthrough plus still-open branch
    /// jumps. Untagged jumps (returns, breaks) and back edges are left alone.
    pub fn link_flow(&mut self, from: BlockId, to: BlockId) -> Result<(), FlowError> {
        self.link(Some(from), EdgeKind::Sequential, Tag::NONE, Some(to))?;
        self.link(Some(from), EdgeKind::Jump, Tag::TRUE_BRANCH, Some(to))?;
        self.link(Some(from), EdgeKind::Jump, Tag::FALSE_BRANCH, Some(to))
    }

    /// Retarget matching open outlets of `from` into the loop header,
    /// turning them into back edges.
    pub fn link_loop(
        &mut self,
        from: BlockId,
        kind: EdgeKind,
        tag: Tag,
        header: BlockId,
    ) -> Result<(), FlowError> {
        let entry = self.entry_block(header)?;
        for e in self.open_outlets(from, kind, tag) {
            let edge = &mut self.edges[e];
            edge.kind = EdgeKind::Jump;
            edge.tag |= Tag::LOOP_BACK;
            edge.dst = Some(entry);
            self.blocks[entry].inlets.push(e);
        }
        Ok(())
    }

    fn try_join(&mut self, out_edge: EdgeId, to: BlockId) -> Result<bool, FlowError> {
        if !self.edges[out_edge].tag.is_empty() {
            return Ok(false);
        }
        let Some(src) = self.edges[out_edge].src else {
            return Ok(false);
        };
        let a = self.resolve(src);
        if self.blocks[a].kind != BlockKind::Basic {
            return Ok(false);
        }
        let live_out = self.blocks[a]
            .outlets
            .iter()
            .filter(|&&e| self.edges[e].kind != EdgeKind::None)
            .count();
        if live_out != 1 {
            return Ok(false);
        }

        let entry = self.entry_block(to)?;
        if entry == a || self.blocks[entry].kind != BlockKind::Basic {
            return Ok(false);
        }
        let live_in: Vec<EdgeId> = self.blocks[entry]
            .inlets
            .iter()
            .copied()
            .filter(|&e| self.edges[e].kind != EdgeKind::None)
            .collect();
        let &[in_edge] = live_in.as_slice() else {
            return Ok(false);
        };
        let placeholder = &self.edges[in_edge];
        if placeholder.src.is_some()
            || placeholder.kind != EdgeKind::Sequential
            || !placeholder.tag.is_empty()
        {
            return Ok(false);
        }

        // Merge: entry's payload and outlets move onto a, the two
        // placeholders at the seam retire.
        let moved = std::mem::take(&mut self.blocks[entry].nodes);
        for &n in &moved {
            self.block_of_node.insert(n, a);
        }
        self.blocks[a].nodes.extend(moved);

        self.edges[out_edge].kind = EdgeKind::None;
        self.edges[in_edge].kind = EdgeKind::None;

        let outlets = std::mem::take(&mut self.blocks[entry].outlets);
        for &e in &outlets {
            if self.edges[e].src == Some(entry) {
                self.edges[e].src = Some(a);
            }
        }
        self.blocks[a].outlets.extend(outlets);
        self.blocks[entry].inlets.clear();
        self.blocks[entry].forward = Some(a);
        Ok(true)
    }

    /// New open outbound jump from wherever `block`'s sequential flow
    /// currently stands.
    pub fn new_jump(&mut self, block: BlockId, tag: Tag) -> Result<EdgeId, FlowError> {
        let b = self.resolve(block);
        let src = self.seq_source(b)?;
        let e = self.edges.alloc(Edge {
            kind: EdgeKind::Jump,
            tag,
            src: Some(src),
            dst: None,
        });
        self.blocks[src].outlets.push(e);
        if src != b {
            self.blocks[b].outlets.push(e);
        }
        Ok(e)
    }

    /// Open inbound jump marking `block`'s entry as a loop header. Its
    /// presence also keeps the header from being joined into a predecessor.
    pub fn new_loop_in(&mut self, block: BlockId) -> Result<EdgeId, FlowError> {
        let b = self.resolve(block);
        let entry = self.entry_block(b)?;
        let e = self.edges.alloc(Edge {
            kind: EdgeKind::Jump,
            tag: Tag::LOOP_BACK,
            src: None,
            dst: Some(entry),
        });
        self.blocks[entry].inlets.push(e);
        if entry != b {
            self.blocks[b].inlets.push(e);
        }
        Ok(e)
    }

    /// Close an open outbound edge onto the entry of `to`.
    pub fn attach(&mut self, edge: EdgeId, to: BlockId) -> Result<(), FlowError> {
        let entry = self.entry_block(to)?;
        self.edges[edge].dst = Some(entry);
        self.blocks[entry].inlets.push(edge);
        Ok(())
    }

    /// Closed edge between the entries of two finished constructs, e.g. the
    /// exceptional path from a try body to its handler.
    pub fn connect(
        &mut self,
        from: BlockId,
        to: BlockId,
        kind: EdgeKind,
        tag: Tag,
    ) -> Result<EdgeId, FlowError> {
        let src = self.entry_block(from)?;
        let dst = self.entry_block(to)?;
        let e = self.edges.alloc(Edge {
            kind,
            tag,
            src: Some(src),
            dst: Some(dst),
        });
        self.blocks[src].outlets.push(e);
        self.blocks[dst].inlets.push(e);
        Ok(e)
    }

    /// Mark the open fallthrough and branch outlets of `block` as severed.
    /// Untagged jumps (the transfer itself) are left live.
    pub fn cut_open_outlets(&mut self, block: BlockId) {
        let b = self.resolve(block);
        let outlets = self.blocks[b].outlets.clone();
        for e in outlets {
            let edge = &mut self.edges[e];
            if edge.dst.is_some() || edge.kind == EdgeKind::None {
                continue;
            }
            let severable = edge.kind == EdgeKind::Sequential
                || edge.tag.intersects(Tag::TRUE_BRANCH | Tag::FALSE_BRANCH);
            if severable {
                edge.tag |= Tag::CUT;
            }
        }
    }

    /// Composite block mirroring `entry`'s inbound edges and the outbound
    /// edges of every exit, plus branch jumps still open at the entry.
    pub fn group_branches(&mut self, entry: BlockId, exits: &[BlockId]) -> BlockId {
        let entry = self.resolve(entry);
        let inlets = self.blocks[entry].inlets.clone();
        let mut outlets: Vec<EdgeId> = Vec::new();
        for &e in &self.blocks[entry].outlets {
            let edge = &self.edges[e];
            if edge.kind == EdgeKind::Jump && edge.dst.is_none() {
                outlets.push(e);
            }
        }
        for &exit in exits {
            let exit = self.resolve(exit);
            for &e in &self.blocks[exit].outlets {
                if self.edges[e].kind != EdgeKind::None && !outlets.contains(&e) {
                    outlets.push(e);
                }
            }
        }
        self.blocks.alloc(Block {
            kind: BlockKind::Group { entry },
            nodes: Vec::new(),
            inlets,
            outlets,
            forward: None,
        })
    }

    pub fn group(&mut self, from: BlockId, to: BlockId) -> BlockId {
        self.group_branches(from, &[to])
    }
}

impl Default for FlowModel {
    fn default() -> Self {
        Self::new()
    }
}
