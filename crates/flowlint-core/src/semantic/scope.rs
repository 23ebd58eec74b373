//! Lexical scope tree
//!
//! Tracks the nesting of functions, blocks, loops, switches and labels so
//! that flow construction can resolve jump targets by source position.

use std::collections::HashMap;

use id_arena::{Arena, Id};
use swc_common::{BytePos, Span};

pub type ScopeId = Id<Scope>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Module,
    Function,
    Block,
    For,
    ForIn,
    ForOf,
    While,
    DoWhile,
    Switch,
    Catch,
    Label,
}

impl ScopeKind {
    pub fn is_loop(self) -> bool {
        matches!(
            self,
            ScopeKind::For
                | ScopeKind::ForIn
                | ScopeKind::ForOf
                | ScopeKind::While
                | ScopeKind::DoWhile
        )
    }
}

#[derive(Debug)]
pub struct Scope {
    pub kind: ScopeKind,
    pub span: Span,
    pub parent: Option<ScopeId>,
    pub children: Vec<ScopeId>,
}

pub struct ScopeTree {
    scopes: Arena<Scope>,
    root: ScopeId,
    by_span: HashMap<(u32, u32), ScopeId>,
}

impl ScopeTree {
    pub fn new(root_span: Span) -> Self {
        let mut scopes = Arena::new();
        let root = scopes.alloc(Scope {
            kind: ScopeKind::Module,
            span: root_span,
            parent: None,
            children: Vec::new(),
        });
        Self {
            scopes,
            root,
            by_span: HashMap::new(),
        }
    }

    pub fn root(&self) -> ScopeId {
        self.root
    }

    pub fn get(&self, id: ScopeId) -> &Scope {
        &self.scopes[id]
    }

    pub fn create_scope(&mut self, kind: ScopeKind, span: Span, parent: ScopeId) -> ScopeId {
        let id = self.scopes.alloc(Scope {
            kind,
            span,
            parent: Some(parent),
            children: Vec::new(),
        });
        self.scopes[parent].children.push(id);
        // Only jump-target kinds are ever looked up by their statement span.
        if kind.is_loop() || matches!(kind, ScopeKind::Switch | ScopeKind::Label) {
            self.by_span.insert((span.lo.0, span.hi.0), id);
        }
        id
    }

    /// Scope created for the statement with exactly this span, if any.
    pub fn scope_at_span(&self, span: Span) -> Option<ScopeId> {
        self.by_span.get(&(span.lo.0, span.hi.0)).copied()
    }

    /// The deepest scope whose span contains the position.
    pub fn narrowest_at(&self, pos: BytePos) -> ScopeId {
        let mut current = self.root;
        loop {
            let next = self.scopes[current].children.iter().copied().find(|&c| {
                let span = self.scopes[c].span;
                span.lo <= pos && pos < span.hi
            });
            match next {
                Some(child) => current = child,
                None => return current,
            }
        }
    }

    pub fn ancestors(&self, start: ScopeId) -> AncestorIter<'_> {
        AncestorIter {
            tree: self,
            current: Some(start),
        }
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.len() == 0
    }
}

/// Iterates a scope and then each of its ancestors up to the root.
pub struct AncestorIter<'a> {
    tree: &'a ScopeTree,
    current: Option<ScopeId>,
}

impl Iterator for AncestorIter<'_> {
    type Item = ScopeId;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.current?;
        self.current = self.tree.scopes[id].parent;
        Some(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(lo: u32, hi: u32) -> Span {
        Span::new(BytePos(lo), BytePos(hi))
    }

    #[test]
    fn root_is_module_scope() {
        let tree = ScopeTree::new(span(0, 100));

        assert_eq!(tree.get(tree.root()).kind, ScopeKind::Module);
        assert_eq!(tree.len(), 1);
        assert!(!tree.is_empty());
    }

    #[test]
    fn create_scope_links_parent_and_child() {
        let mut tree = ScopeTree::new(span(0, 100));
        let f = tree.create_scope(ScopeKind::Function, span(10, 90), tree.root());

        assert_eq!(tree.get(f).parent, Some(tree.root()));
        assert_eq!(tree.get(tree.root()).children, vec![f]);
    }

    #[test]
    fn narrowest_at_finds_deepest_scope() {
        let mut tree = ScopeTree::new(span(0, 100));
        let f = tree.create_scope(ScopeKind::Function, span(10, 90), tree.root());
        let w = tree.create_scope(ScopeKind::While, span(20, 80), f);

        assert_eq!(tree.narrowest_at(BytePos(50)), w);
        assert_eq!(tree.narrowest_at(BytePos(15)), f);
        assert_eq!(tree.narrowest_at(BytePos(95)), tree.root());
    }

    #[test]
    fn ancestors_walk_to_root() {
        let mut tree = ScopeTree::new(span(0, 100));
        let f = tree.create_scope(ScopeKind::Function, span(10, 90), tree.root());
        let w = tree.create_scope(ScopeKind::While, span(20, 80), f);

        let chain: Vec<ScopeId> = tree.ancestors(w).collect();

        assert_eq!(chain, vec![w, f, tree.root()]);
    }

    #[test]
    fn loop_scopes_are_looked_up_by_span() {
        let mut tree = ScopeTree::new(span(0, 100));
        let w = tree.create_scope(ScopeKind::While, span(20, 80), tree.root());
        let b = tree.create_scope(ScopeKind::Block, span(30, 70), w);

        assert_eq!(tree.scope_at_span(span(20, 80)), Some(w));
        assert_eq!(tree.scope_at_span(span(30, 70)), None);
        let _ = b;
    }

    #[test]
    fn loop_kinds() {
        assert!(ScopeKind::For.is_loop());
        assert!(ScopeKind::ForIn.is_loop());
        assert!(ScopeKind::ForOf.is_loop());
        assert!(ScopeKind::While.is_loop());
        assert!(ScopeKind::DoWhile.is_loop());
        assert!(!ScopeKind::Switch.is_loop());
        assert!(!ScopeKind::Label.is_loop());
    }
}
