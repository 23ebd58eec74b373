//! Control flow graph construction and queries.

pub mod builder;
pub mod graph;
pub mod query;

pub use builder::CfgBuilder;
pub use graph::{
    Block, BlockId, BlockKind, Edge, EdgeId, EdgeKind, FlowError, FlowGraph, FlowModel, GraphId,
    NodeId, NodeKind, NodeRecord, Tag,
};
pub use query::{GraphView, entry_of_node, is_cut_off, reachable_blocks, to_dot};
