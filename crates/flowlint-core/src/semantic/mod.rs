//! Semantic facts about a parsed module: scopes and labels.

pub mod scope;
pub mod visitor;

pub use scope::{AncestorIter, Scope, ScopeId, ScopeKind, ScopeTree};
pub use visitor::{LabelRecord, LabelTable, ScopeBuilder, SemanticModel};
