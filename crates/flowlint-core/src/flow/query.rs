//! Read-side helpers over a built [`FlowModel`]
//!
//! Rules work against these instead of poking at blocks and edges directly.

use std::collections::HashSet;

use swc_common::Span;

use super::graph::{BlockId, BlockKind, EdgeId, EdgeKind, FlowModel, GraphId, Tag};

/// The closed blocks and edges of one graph, discovered from its head.
pub struct GraphView {
    pub blocks: Vec<BlockId>,
    pub edges: Vec<EdgeId>,
}

impl GraphView {
    pub fn collect(model: &FlowModel, graph: GraphId) -> Self {
        let mut blocks = Vec::new();
        let mut edges = Vec::new();
        let mut seen = HashSet::new();
        let mut queue = vec![model.graph(graph).head];

        while let Some(b) = queue.pop() {
            let b = model.resolve(b);
            if !seen.insert(b) {
                continue;
            }
            blocks.push(b);
            for &e in &model.block(b).outlets {
                let edge = model.edge(e);
                if !edge.is_closed() {
                    continue;
                }
                edges.push(e);
                if let Some(dst) = edge.dst {
                    queue.push(dst);
                }
            }
        }

        Self { blocks, edges }
    }
}

/// Blocks reachable from the graph head without crossing a severed edge.
pub fn reachable_blocks(model: &FlowModel, graph: GraphId) -> HashSet<BlockId> {
    let mut live = HashSet::new();
    let mut queue = vec![model.graph(graph).head];

    while let Some(b) = queue.pop() {
        let b = model.resolve(b);
        if !live.insert(b) {
            continue;
        }
        for &e in &model.block(b).outlets {
            let edge = model.edge(e);
            if !edge.is_closed() || edge.tag.contains(Tag::CUT) {
                continue;
            }
            if let Some(dst) = edge.dst {
                queue.push(dst);
            }
        }
    }

    live
}

/// True when every closed inbound edge of the block is severed. A block
/// with no closed inlets at all also counts as cut off.
pub fn is_cut_off(model: &FlowModel, block: BlockId) -> bool {
    let b = model.resolve(block);
    model.block(b).inlets.iter().all(|&e| {
        let edge = model.edge(e);
        !edge.is_closed() || edge.tag.contains(Tag::CUT)
    })
}

/// Block holding the node recorded for this exact span.
pub fn entry_of_node(model: &FlowModel, span: Span) -> Option<BlockId> {
    model.node_at(span).and_then(|n| model.block_of(n))
}

/// Graphviz rendering of one graph, for debugging flow construction.
pub fn to_dot(model: &FlowModel, graph: GraphId) -> String {
    use std::fmt::Write;

    let view = GraphView::collect(model, graph);
    let mut out = String::from("digraph flow {\n  node [shape=box];\n");
    for &b in &view.blocks {
        let block = model.block(b);
        let label = match block.kind {
            BlockKind::Start => "start".to_string(),
            _ => format!("b{} ({} nodes)", b.index(), block.nodes.len()),
        };
        let _ = writeln!(out, "  n{} [label=\"{}\"];", b.index(), label);
    }
    for &e in &view.edges {
        let edge = model.edge(e);
        let (Some(src), Some(dst)) = (edge.src, edge.dst) else {
            continue;
        };
        let mut attrs: Vec<String> = Vec::new();
        if edge.kind == EdgeKind::Jump {
            attrs.push("style=dashed".to_string());
        }
        if !edge.tag.is_empty() {
            attrs.push(format!("label=\"{}\"", edge.tag.describe()));
        }
        if edge.tag.contains(Tag::CUT) {
            attrs.push("color=gray".to_string());
        }
        let suffix = if attrs.is_empty() {
            String::new()
        } else {
            format!(" [{}]", attrs.join(", "))
        };
        let _ = writeln!(
            out,
            "  n{} -> n{}{};",
            model.resolve(src).index(),
            model.resolve(dst).index(),
            suffix
        );
    }
    out.push_str("}\n");
    out
}
