//! Flow graph construction
//!
//! Walks a parsed module and assembles the [`FlowModel`] bottom-up. Each
//! statement or expression handler leaves exactly one block on the matching
//! stack; the parent handler pops it and wires it into its own construct.
//! Jumps whose target construct is not finished yet are parked in the
//! graph's hanging tables and drained when the construct seals itself.

use swc_common::{Span, Spanned};
use swc_ecma_ast::{
    BinExpr, BinaryOp, BlockStmtOrExpr, BreakStmt, Class, ClassMember, CondExpr, ContinueStmt,
    Decl, DefaultDecl, DoWhileStmt, Expr, ForHead, ForStmt, Function, Ident, IfStmt, LabeledStmt,
    Lit, Module, ModuleDecl, ModuleItem, ObjectLit, ParamOrTsParamProp, Pat, Prop, PropName,
    PropOrSpread, Stmt, SuperProp, SwitchStmt, TryStmt, VarDecl, VarDeclOrExpr, WhileStmt,
    WithStmt,
};

use super::graph::{BlockId, EdgeKind, FlowError, FlowModel, GraphId, NodeKind, Tag};
use crate::semantic::{ScopeId, SemanticModel};

/// The body form a function subgraph is built from.
enum FnBody<'a> {
    Block(&'a swc_ecma_ast::BlockStmt),
    Expr(&'a Expr),
    None,
}

/// A used label waiting for the first block of its statement.
struct PendingLabel {
    scope: ScopeId,
    wraps_loop: bool,
}

fn is_literal_true(expr: &Expr) -> bool {
    match expr {
        Expr::Lit(Lit::Bool(b)) => b.value,
        Expr::Paren(p) => is_literal_true(&p.expr),
        _ => false,
    }
}

fn is_loop_stmt(stmt: &Stmt) -> bool {
    matches!(
        stmt,
        Stmt::While(_) | Stmt::DoWhile(_) | Stmt::For(_) | Stmt::ForIn(_) | Stmt::ForOf(_)
    )
}

pub struct CfgBuilder<'a> {
    sem: &'a SemanticModel,
    model: FlowModel,
    stmts: Vec<BlockId>,
    exprs: Vec<BlockId>,
    graph_stack: Vec<GraphId>,
    loop_stack: Vec<ScopeId>,
    hanging_labels: Vec<PendingLabel>,
    hanging_loops: Vec<ScopeId>,
}

impl<'a> CfgBuilder<'a> {
    pub fn build(module: &Module, sem: &'a SemanticModel) -> Result<FlowModel, FlowError> {
        let mut builder = CfgBuilder {
            sem,
            model: FlowModel::new(),
            stmts: Vec::new(),
            exprs: Vec::new(),
            graph_stack: Vec::new(),
            loop_stack: Vec::new(),
            hanging_labels: Vec::new(),
            hanging_loops: Vec::new(),
        };
        let root = builder.model.root();
        builder.graph_stack.push(root);

        let mut prev = builder.model.graph(root).head;
        for item in &module.body {
            builder.build_module_item(item)?;
            let b = builder.pop_stmt()?;
            builder.model.link_flow(prev, b)?;
            prev = b;
        }
        builder.seal_graph(root, prev)?;
        Ok(builder.model)
    }

    fn graph(&self) -> GraphId {
        self.graph_stack
            .last()
            .copied()
            .unwrap_or_else(|| self.model.root())
    }

    fn push_stmt(&mut self, block: BlockId) {
        self.stmts.push(block);
    }

    fn pop_stmt(&mut self) -> Result<BlockId, FlowError> {
        self.stmts.pop().ok_or(FlowError::StackUnderflow)
    }

    fn push_expr(&mut self, block: BlockId) {
        self.exprs.push(block);
    }

    fn pop_expr(&mut self) -> Result<BlockId, FlowError> {
        self.exprs.pop().ok_or(FlowError::StackUnderflow)
    }

    /// New basic block; pending label and loop headers land on it.
    fn fresh_basic(&mut self) -> BlockId {
        let g = self.graph();
        let b = self.model.new_basic(g);
        if self.hanging_labels.is_empty() && self.hanging_loops.is_empty() {
            return b;
        }
        let current_loop = self.loop_stack.last().copied();
        let graph = self.model.graph_mut(g);
        for pending in self.hanging_labels.drain(..) {
            graph.labels.insert(pending.scope, b);
            if pending.wraps_loop {
                if let Some(loop_scope) = current_loop {
                    graph.label_loops.insert(pending.scope, loop_scope);
                }
            }
        }
        for scope in self.hanging_loops.drain(..) {
            graph.loop_entries.insert(scope, b);
        }
        b
    }

    /// Marker block, the children in evaluation order, and a node for the
    /// whole expression on the sequential tail.
    fn chain(&mut self, span: Span, kind: NodeKind, children: &[&Expr]) -> Result<BlockId, FlowError> {
        let marker = self.fresh_basic();
        let mut prev = marker;
        for child in children {
            self.build_expr(child)?;
            let b = self.pop_expr()?;
            self.model.link_flow(prev, b)?;
            prev = b;
        }
        let node = self.model.new_node(span, kind);
        let tail = self.model.seq_source(prev)?;
        self.model.attach_node(tail, node);
        if self.model.resolve(prev) == self.model.resolve(marker) {
            Ok(marker)
        } else {
            Ok(self.model.group_branches(marker, &[prev]))
        }
    }

    fn atom(&mut self, span: Span, kind: NodeKind) -> Result<BlockId, FlowError> {
        self.chain(span, kind, &[])
    }

    fn mark_stmt(&mut self, block: BlockId, span: Span, kind: NodeKind) -> Result<(), FlowError> {
        let node = self.model.new_node(span, kind);
        let entry = self.model.entry_block(block)?;
        self.model.attach_node(entry, node);
        Ok(())
    }

    fn link_child_expr(&mut self, prev: &mut BlockId, expr: &Expr) -> Result<(), FlowError> {
        self.build_expr(expr)?;
        let b = self.pop_expr()?;
        self.model.link_flow(*prev, b)?;
        *prev = b;
        Ok(())
    }

    fn link_prop_name(&mut self, prev: &mut BlockId, name: &PropName) -> Result<(), FlowError> {
        if let PropName::Computed(computed) = name {
            self.link_child_expr(prev, &computed.expr)?;
        }
        Ok(())
    }

    /// Statement sequence as one composite block.
    fn build_stmt_list(&mut self, stmts: &[Stmt]) -> Result<BlockId, FlowError> {
        let entry = self.fresh_basic();
        let mut tail = entry;
        for stmt in stmts {
            self.build_stmt(stmt)?;
            let b = self.pop_stmt()?;
            self.model.link_flow(tail, b)?;
            tail = b;
        }
        if self.model.resolve(tail) == self.model.resolve(entry) {
            Ok(entry)
        } else {
            Ok(self.model.group_branches(entry, &[tail]))
        }
    }

    // ---- module items ----

    fn build_module_item(&mut self, item: &ModuleItem) -> Result<(), FlowError> {
        match item {
            ModuleItem::Stmt(stmt) => self.build_stmt(stmt),
            ModuleItem::ModuleDecl(decl) => match decl {
                ModuleDecl::ExportDecl(export) => self.build_decl(&export.decl),
                ModuleDecl::ExportDefaultDecl(export) => match &export.decl {
                    DefaultDecl::Fn(f) => {
                        let block = self.atom(f.function.span, NodeKind::Hoisted)?;
                        self.build_fn(&f.function, f.ident.as_ref())?;
                        self.push_stmt(block);
                        Ok(())
                    }
                    DefaultDecl::Class(c) => {
                        let block = self.build_class(&c.class)?;
                        self.mark_stmt(block, c.class.span, NodeKind::Hoisted)?;
                        self.push_stmt(block);
                        Ok(())
                    }
                    DefaultDecl::TsInterfaceDecl(i) => {
                        let block = self.atom(i.span, NodeKind::Hoisted)?;
                        self.push_stmt(block);
                        Ok(())
                    }
                },
                ModuleDecl::ExportDefaultExpr(export) => {
                    self.build_expr(&export.expr)?;
                    let block = self.pop_expr()?;
                    self.mark_stmt(block, export.span, NodeKind::Statement)?;
                    self.push_stmt(block);
                    Ok(())
                }
                other => {
                    // imports, re-exports, TS module plumbing
                    let block = self.atom(other.span(), NodeKind::Hoisted)?;
                    self.push_stmt(block);
                    Ok(())
                }
            },
        }
    }

    // ---- statements ----

    fn build_stmt(&mut self, stmt: &Stmt) -> Result<(), FlowError> {
        match stmt {
            Stmt::Block(block) => {
                let b = self.build_stmt_list(&block.stmts)?;
                self.push_stmt(b);
                Ok(())
            }
            Stmt::Empty(_) => {
                let b = self.fresh_basic();
                self.push_stmt(b);
                Ok(())
            }
            Stmt::Debugger(d) => {
                let b = self.atom(d.span, NodeKind::Statement)?;
                self.push_stmt(b);
                Ok(())
            }
            Stmt::Expr(expr) => {
                self.build_expr(&expr.expr)?;
                let b = self.pop_expr()?;
                self.mark_stmt(b, expr.span, NodeKind::Statement)?;
                self.push_stmt(b);
                Ok(())
            }
            Stmt::Decl(decl) => self.build_decl(decl),
            Stmt::Return(ret) => self.build_exit_stmt(ret.span, ret.arg.as_deref()),
            Stmt::Throw(throw) => self.build_exit_stmt(throw.span, Some(&*throw.arg)),
            Stmt::If(if_stmt) => self.build_if(if_stmt),
            Stmt::While(while_stmt) => self.build_while(while_stmt),
            Stmt::DoWhile(do_while) => self.build_do_while(do_while),
            Stmt::For(for_stmt) => self.build_for(for_stmt),
            Stmt::ForIn(for_in) => {
                self.build_iter_loop(for_in.span, &for_in.left, &for_in.right, &for_in.body)
            }
            Stmt::ForOf(for_of) => {
                self.build_iter_loop(for_of.span, &for_of.left, &for_of.right, &for_of.body)
            }
            Stmt::Switch(switch) => self.build_switch(switch),
            Stmt::Try(try_stmt) => self.build_try(try_stmt),
            Stmt::Labeled(labeled) => self.build_labeled(labeled),
            Stmt::Break(brk) => self.build_break(brk),
            Stmt::Continue(cont) => self.build_continue(cont),
            Stmt::With(with) => self.build_with(with),
        }
    }

    fn build_decl(&mut self, decl: &Decl) -> Result<(), FlowError> {
        match decl {
            Decl::Fn(f) => {
                let block = self.atom(f.function.span, NodeKind::Hoisted)?;
                self.build_fn(&f.function, Some(&f.ident))?;
                self.push_stmt(block);
                Ok(())
            }
            Decl::Class(c) => {
                // class declarations are not hoisted; dead ones are reportable
                let block = self.build_class(&c.class)?;
                self.mark_stmt(block, c.class.span, NodeKind::Statement)?;
                self.push_stmt(block);
                Ok(())
            }
            Decl::Var(v) => {
                let block = self.build_var_decl(v)?;
                self.push_stmt(block);
                Ok(())
            }
            Decl::Using(u) => {
                let marker = self.fresh_basic();
                let mut prev = marker;
                for d in &u.decls {
                    if let Some(init) = &d.init {
                        self.link_child_expr(&mut prev, init)?;
                    }
                    let binding = self.model.new_node(d.name.span(), NodeKind::Binding);
                    let tail = self.model.seq_source(prev)?;
                    self.model.attach_node(tail, binding);
                }
                self.mark_stmt(marker, u.span, NodeKind::Statement)?;
                let block = if self.model.resolve(prev) == self.model.resolve(marker) {
                    marker
                } else {
                    self.model.group_branches(marker, &[prev])
                };
                self.push_stmt(block);
                Ok(())
            }
            Decl::TsInterface(i) => {
                let block = self.atom(i.span, NodeKind::Hoisted)?;
                self.push_stmt(block);
                Ok(())
            }
            Decl::TsTypeAlias(t) => {
                let block = self.atom(t.span, NodeKind::Hoisted)?;
                self.push_stmt(block);
                Ok(())
            }
            Decl::TsEnum(e) => {
                let block = self.atom(e.span, NodeKind::Statement)?;
                self.push_stmt(block);
                Ok(())
            }
            Decl::TsModule(m) => {
                let block = self.atom(m.span, NodeKind::Hoisted)?;
                self.push_stmt(block);
                Ok(())
            }
        }
    }

    fn build_var_decl(&mut self, var: &VarDecl) -> Result<BlockId, FlowError> {
        let marker = self.fresh_basic();
        let mut prev = marker;
        for d in &var.decls {
            if let Some(init) = &d.init {
                self.link_child_expr(&mut prev, init)?;
            }
            let binding = self.model.new_node(d.name.span(), NodeKind::Binding);
            let tail = self.model.seq_source(prev)?;
            self.model.attach_node(tail, binding);
        }
        self.mark_stmt(marker, var.span, NodeKind::Statement)?;
        if self.model.resolve(prev) == self.model.resolve(marker) {
            Ok(marker)
        } else {
            Ok(self.model.group_branches(marker, &[prev]))
        }
    }

    fn build_if(&mut self, stmt: &IfStmt) -> Result<(), FlowError> {
        let marker = self.fresh_basic();
        let node = self.model.new_node(stmt.span, NodeKind::Statement);
        self.model.attach_node(marker, node);

        self.build_expr(&stmt.test)?;
        let test = self.pop_expr()?;
        self.model.link_flow(marker, test)?;
        self.model.new_jump(test, Tag::FALSE_BRANCH)?;
        self.model.new_jump(test, Tag::TRUE_BRANCH)?;

        self.build_stmt(&stmt.cons)?;
        let cons = self.pop_stmt()?;
        self.model
            .link(Some(test), EdgeKind::Jump, Tag::TRUE_BRANCH, Some(cons))?;
        self.model
            .link(Some(test), EdgeKind::Sequential, Tag::NONE, Some(cons))?;

        let mut exits = vec![test, cons];
        if let Some(alt) = &stmt.alt {
            self.build_stmt(alt)?;
            let alt_block = self.pop_stmt()?;
            self.model
                .link(Some(test), EdgeKind::Jump, Tag::FALSE_BRANCH, Some(alt_block))?;
            exits.push(alt_block);
        }
        let composite = self.model.group_branches(marker, &exits);
        self.push_stmt(composite);
        Ok(())
    }

    fn build_while(&mut self, stmt: &WhileStmt) -> Result<(), FlowError> {
        let scope = self
            .sem
            .loop_scope(stmt.span)
            .ok_or(FlowError::UnresolvedJumpTarget)?;
        self.loop_stack.push(scope);
        self.hanging_loops.push(scope);

        self.build_expr(&stmt.test)?;
        let test = self.pop_expr()?;
        self.model.new_loop_in(test)?;
        let infinite = is_literal_true(&stmt.test);
        if !infinite {
            self.model.new_jump(test, Tag::FALSE_BRANCH)?;
        }
        self.model.new_jump(test, Tag::TRUE_BRANCH)?;

        self.build_stmt(&stmt.body)?;
        let body = self.pop_stmt()?;
        self.model
            .link(Some(test), EdgeKind::Sequential, Tag::NONE, Some(body))?;
        self.model
            .link(Some(test), EdgeKind::Jump, Tag::TRUE_BRANCH, Some(body))?;
        self.close_back_edges(body, test)?;

        self.loop_stack.pop();
        let exit = self.seal_loop(scope, if infinite { None } else { Some(test) })?;
        let composite = match exit {
            Some(e) => self.model.group_branches(test, &[e]),
            None => self.model.group_branches(test, &[]),
        };
        self.mark_stmt(composite, stmt.span, NodeKind::Statement)?;
        self.push_stmt(composite);
        Ok(())
    }

    fn build_do_while(&mut self, stmt: &DoWhileStmt) -> Result<(), FlowError> {
        let scope = self
            .sem
            .loop_scope(stmt.span)
            .ok_or(FlowError::UnresolvedJumpTarget)?;
        self.loop_stack.push(scope);
        self.hanging_loops.push(scope);

        self.build_stmt(&stmt.body)?;
        let body = self.pop_stmt()?;
        self.model.new_loop_in(body)?;

        self.build_expr(&stmt.test)?;
        let test = self.pop_expr()?;
        self.model.link_flow(body, test)?;
        let infinite = is_literal_true(&stmt.test);
        self.model.new_jump(test, Tag::TRUE_BRANCH)?;
        self.model
            .link_loop(test, EdgeKind::Jump, Tag::TRUE_BRANCH, body)?;
        if !infinite {
            self.model.new_jump(test, Tag::FALSE_BRANCH)?;
        }

        self.loop_stack.pop();
        let exit = self.seal_loop(scope, if infinite { None } else { Some(test) })?;
        let composite = match exit {
            Some(e) => self.model.group_branches(body, &[e]),
            None => self.model.group_branches(body, &[]),
        };
        self.mark_stmt(composite, stmt.span, NodeKind::Statement)?;
        self.push_stmt(composite);
        Ok(())
    }

    fn build_for(&mut self, stmt: &ForStmt) -> Result<(), FlowError> {
        let scope = self
            .sem
            .loop_scope(stmt.span)
            .ok_or(FlowError::UnresolvedJumpTarget)?;
        // pushed before the first block so a wrapping label resolves to us
        self.loop_stack.push(scope);

        let marker = self.fresh_basic();
        let node = self.model.new_node(stmt.span, NodeKind::Statement);
        self.model.attach_node(marker, node);

        let mut prev = marker;
        match &stmt.init {
            Some(VarDeclOrExpr::VarDecl(v)) => {
                let b = self.build_var_decl(v)?;
                self.model.link_flow(prev, b)?;
                prev = b;
            }
            Some(VarDeclOrExpr::Expr(e)) => {
                self.link_child_expr(&mut prev, e)?;
            }
            None => {}
        }

        self.hanging_loops.push(scope);
        let (header, infinite) = match &stmt.test {
            Some(test_expr) => {
                self.build_expr(test_expr)?;
                let test = self.pop_expr()?;
                // the header marker must exist before the init flows in,
                // otherwise the header would merge into the init tail
                self.model.new_loop_in(test)?;
                self.model.link_flow(prev, test)?;
                let infinite = is_literal_true(test_expr);
                if !infinite {
                    self.model.new_jump(test, Tag::FALSE_BRANCH)?;
                }
                self.model.new_jump(test, Tag::TRUE_BRANCH)?;

                self.build_stmt(&stmt.body)?;
                let body = self.pop_stmt()?;
                self.model
                    .link(Some(test), EdgeKind::Sequential, Tag::NONE, Some(body))?;
                self.model
                    .link(Some(test), EdgeKind::Jump, Tag::TRUE_BRANCH, Some(body))?;
                self.loop_back_through_update(body, stmt.update.as_deref(), test)?;
                (Some(test), infinite)
            }
            None => {
                self.build_stmt(&stmt.body)?;
                let body = self.pop_stmt()?;
                self.model.new_loop_in(body)?;
                self.model.link_flow(prev, body)?;
                self.loop_back_through_update(body, stmt.update.as_deref(), body)?;
                (None, true)
            }
        };

        self.loop_stack.pop();
        let exit = self.seal_loop(scope, if infinite { None } else { header })?;
        let composite = match exit {
            Some(e) => self.model.group_branches(marker, &[e]),
            None => self.model.group_branches(marker, &[]),
        };
        self.push_stmt(composite);
        Ok(())
    }

    fn loop_back_through_update(
        &mut self,
        body: BlockId,
        update: Option<&Expr>,
        header: BlockId,
    ) -> Result<(), FlowError> {
        let tail = match update {
            Some(update) => {
                self.build_expr(update)?;
                let u = self.pop_expr()?;
                self.model.link_flow(body, u)?;
                u
            }
            None => body,
        };
        self.close_back_edges(tail, header)
    }

    fn close_back_edges(&mut self, from: BlockId, header: BlockId) -> Result<(), FlowError> {
        self.model
            .link_loop(from, EdgeKind::Sequential, Tag::NONE, header)?;
        self.model
            .link_loop(from, EdgeKind::Jump, Tag::TRUE_BRANCH, header)?;
        self.model
            .link_loop(from, EdgeKind::Jump, Tag::FALSE_BRANCH, header)
    }

    fn build_iter_loop(
        &mut self,
        span: Span,
        left: &ForHead,
        right: &Expr,
        body: &Stmt,
    ) -> Result<(), FlowError> {
        let scope = self
            .sem
            .loop_scope(span)
            .ok_or(FlowError::UnresolvedJumpTarget)?;
        self.loop_stack.push(scope);
        self.hanging_loops.push(scope);

        // the binding block doubles as the loop header
        let left_block = self.atom(left.span(), NodeKind::Binding)?;
        self.model.new_loop_in(left_block)?;

        self.build_expr(right)?;
        let right_block = self.pop_expr()?;
        self.model.link_flow(left_block, right_block)?;
        self.model.new_jump(right_block, Tag::FALSE_BRANCH)?;

        self.build_stmt(body)?;
        let body_block = self.pop_stmt()?;
        self.model
            .link(Some(right_block), EdgeKind::Sequential, Tag::NONE, Some(body_block))?;
        self.model
            .link(Some(right_block), EdgeKind::Jump, Tag::TRUE_BRANCH, Some(body_block))?;
        self.close_back_edges(body_block, left_block)?;

        self.loop_stack.pop();
        let exit = self.seal_loop(scope, Some(right_block))?;
        let composite = match exit {
            Some(e) => self.model.group_branches(left_block, &[e]),
            None => self.model.group_branches(left_block, &[]),
        };
        self.mark_stmt(composite, span, NodeKind::Statement)?;
        self.push_stmt(composite);
        Ok(())
    }

    /// Drain breaks targeting the loop and close the conditional exit.
    /// No exit block means nothing ever leaves the loop.
    fn seal_loop(
        &mut self,
        scope: ScopeId,
        test: Option<BlockId>,
    ) -> Result<Option<BlockId>, FlowError> {
        let g = self.graph();
        let breaks = self
            .model
            .graph_mut(g)
            .hanging_breaks
            .remove(&scope)
            .unwrap_or_default();
        let has_false = test.is_some_and(|t| {
            !self
                .model
                .open_outlets(t, EdgeKind::Jump, Tag::FALSE_BRANCH)
                .is_empty()
        });
        if breaks.is_empty() && !has_false {
            return Ok(None);
        }

        let exit = self.fresh_basic();
        // breaks first, so the exit cannot be merged away by the link
        for e in breaks {
            self.model.attach(e, exit)?;
        }
        if let Some(test) = test {
            self.model
                .link(Some(test), EdgeKind::Jump, Tag::FALSE_BRANCH, Some(exit))?;
        }
        Ok(Some(exit))
    }

    fn build_switch(&mut self, stmt: &SwitchStmt) -> Result<(), FlowError> {
        let scope = self
            .sem
            .switch_scope(stmt.span)
            .ok_or(FlowError::UnresolvedJumpTarget)?;
        let marker = self.fresh_basic();
        let node = self.model.new_node(stmt.span, NodeKind::Statement);
        self.model.attach_node(marker, node);

        self.build_expr(&stmt.discriminant)?;
        let disc = self.pop_expr()?;
        self.model.link_flow(marker, disc)?;

        let mut prev_test = disc;
        let mut prev_body: Option<BlockId> = None;
        let mut default_body: Option<BlockId> = None;

        for case in &stmt.cases {
            match &case.test {
                Some(test_expr) => {
                    self.build_expr(test_expr)?;
                    let test = self.pop_expr()?;
                    self.model.link_flow(prev_test, test)?;
                    self.model.new_jump(test, Tag::TRUE_BRANCH)?;

                    let body = self.build_stmt_list(&case.cons)?;
                    self.model
                        .link(Some(test), EdgeKind::Jump, Tag::TRUE_BRANCH, Some(body))?;
                    if let Some(pb) = prev_body {
                        self.model.link_flow(pb, body)?;
                    }
                    prev_test = test;
                    prev_body = Some(body);
                }
                None => {
                    let body = self.build_stmt_list(&case.cons)?;
                    if let Some(pb) = prev_body {
                        self.model.link_flow(pb, body)?;
                    }
                    default_body = Some(body);
                    prev_body = Some(body);
                }
            }
        }

        if let Some(default) = default_body {
            // no case matched
            self.model
                .link(Some(prev_test), EdgeKind::Sequential, Tag::NONE, Some(default))?;
        }

        let mut exits: Vec<BlockId> = Vec::new();
        if default_body.is_none() {
            exits.push(prev_test);
        }
        if let Some(pb) = prev_body {
            exits.push(pb);
        }
        let g = self.graph();
        let breaks = self
            .model
            .graph_mut(g)
            .hanging_breaks
            .remove(&scope)
            .unwrap_or_default();
        if !breaks.is_empty() {
            let exit = self.fresh_basic();
            for e in breaks {
                self.model.attach(e, exit)?;
            }
            exits.push(exit);
        }

        let composite = self.model.group_branches(marker, &exits);
        self.push_stmt(composite);
        Ok(())
    }

    fn build_try(&mut self, stmt: &TryStmt) -> Result<(), FlowError> {
        let marker = self.fresh_basic();
        let node = self.model.new_node(stmt.span, NodeKind::Statement);
        self.model.attach_node(marker, node);

        let try_block = self.build_stmt_list(&stmt.block.stmts)?;
        self.model.link_flow(marker, try_block)?;

        let catch_block = match &stmt.handler {
            Some(handler) => {
                let entry = self.fresh_basic();
                let mut prev = entry;
                if let Some(param) = &handler.param {
                    let p = self.atom(param.span(), NodeKind::Binding)?;
                    self.model.link_flow(prev, p)?;
                    prev = p;
                }
                let body = self.build_stmt_list(&handler.body.stmts)?;
                self.model.link_flow(prev, body)?;
                // exceptional path into the handler
                self.model
                    .connect(marker, entry, EdgeKind::Jump, Tag::NONE)?;
                Some(self.model.group_branches(entry, &[body]))
            }
            None => None,
        };

        let mut exits: Vec<BlockId> = Vec::new();
        match &stmt.finalizer {
            Some(finalizer) => {
                let fin = self.build_stmt_list(&finalizer.stmts)?;
                self.model.link_flow(try_block, fin)?;
                if let Some(cb) = catch_block {
                    self.model.link_flow(cb, fin)?;
                }
                self.model.connect(marker, fin, EdgeKind::Jump, Tag::NONE)?;
                exits.push(fin);
            }
            None => {
                exits.push(try_block);
                if let Some(cb) = catch_block {
                    exits.push(cb);
                }
            }
        }

        let composite = self.model.group_branches(marker, &exits);
        self.push_stmt(composite);
        Ok(())
    }

    fn build_labeled(&mut self, stmt: &LabeledStmt) -> Result<(), FlowError> {
        let scope = self
            .sem
            .label_at(stmt.span)
            .ok_or(FlowError::UnresolvedJumpTarget)?;
        if self.sem.label_used(scope) {
            self.hanging_labels.push(PendingLabel {
                scope,
                wraps_loop: is_loop_stmt(&stmt.body),
            });
        }

        self.build_stmt(&stmt.body)?;
        let body = self.pop_stmt()?;

        // breaks on a label wrapping a loop were re-keyed to the loop scope
        // and already drained by the loop itself
        let g = self.graph();
        let breaks = self
            .model
            .graph_mut(g)
            .hanging_breaks
            .remove(&scope)
            .unwrap_or_default();
        if breaks.is_empty() {
            self.push_stmt(body);
            return Ok(());
        }

        let exit = self.fresh_basic();
        for e in breaks {
            self.model.attach(e, exit)?;
        }
        self.model.link_flow(body, exit)?;
        let composite = self.model.group_branches(body, &[exit]);
        self.push_stmt(composite);
        Ok(())
    }

    fn build_break(&mut self, stmt: &BreakStmt) -> Result<(), FlowError> {
        let block = self.atom(stmt.span, NodeKind::Statement)?;
        let target = match &stmt.label {
            Some(_) => {
                let label_scope = self
                    .sem
                    .jump_target(stmt.span)
                    .ok_or(FlowError::UnresolvedJumpTarget)?;
                let g = self.graph();
                self.model
                    .graph(g)
                    .label_loops
                    .get(&label_scope)
                    .copied()
                    .unwrap_or(label_scope)
            }
            None => self
                .sem
                .innermost_loop_at(stmt.span.lo)
                .or_else(|| self.sem.innermost_switch_at(stmt.span.lo))
                .ok_or(FlowError::UnresolvedJumpTarget)?,
        };
        let edge = self.model.new_jump(block, Tag::NONE)?;
        let g = self.graph();
        self.model
            .graph_mut(g)
            .hanging_breaks
            .entry(target)
            .or_default()
            .push(edge);
        self.model.cut_open_outlets(block);
        self.push_stmt(block);
        Ok(())
    }

    fn build_continue(&mut self, stmt: &ContinueStmt) -> Result<(), FlowError> {
        let block = self.atom(stmt.span, NodeKind::Statement)?;
        let target = match &stmt.label {
            Some(_) => {
                let label_scope = self
                    .sem
                    .jump_target(stmt.span)
                    .ok_or(FlowError::UnresolvedJumpTarget)?;
                let g = self.graph();
                self.model
                    .graph(g)
                    .label_loops
                    .get(&label_scope)
                    .copied()
                    .ok_or(FlowError::UnresolvedJumpTarget)?
            }
            None => self
                .sem
                .innermost_loop_at(stmt.span.lo)
                .ok_or(FlowError::UnresolvedJumpTarget)?,
        };
        let g = self.graph();
        let header = self
            .model
            .graph(g)
            .loop_entries
            .get(&target)
            .copied()
            .ok_or(FlowError::UnresolvedJumpTarget)?;
        let edge = self.model.new_jump(block, Tag::LOOP_BACK)?;
        self.model.attach(edge, header)?;
        self.model.cut_open_outlets(block);
        self.push_stmt(block);
        Ok(())
    }

    /// return and throw: an open untagged jump parked for the graph exit,
    /// everything else severed.
    fn build_exit_stmt(&mut self, span: Span, arg: Option<&Expr>) -> Result<(), FlowError> {
        let marker = self.fresh_basic();
        let node = self.model.new_node(span, NodeKind::Statement);
        self.model.attach_node(marker, node);

        let mut block = marker;
        if let Some(arg) = arg {
            self.build_expr(arg)?;
            let a = self.pop_expr()?;
            self.model.link_flow(marker, a)?;
            if self.model.resolve(a) != self.model.resolve(marker) {
                block = self.model.group_branches(marker, &[a]);
            }
        }
        let edge = self.model.new_jump(block, Tag::NONE)?;
        let g = self.graph();
        self.model.graph_mut(g).pending_exits.push(edge);
        self.model.cut_open_outlets(block);
        self.push_stmt(block);
        Ok(())
    }

    fn build_with(&mut self, stmt: &WithStmt) -> Result<(), FlowError> {
        let marker = self.fresh_basic();
        let node = self.model.new_node(stmt.span, NodeKind::Statement);
        self.model.attach_node(marker, node);

        let mut prev = marker;
        self.link_child_expr(&mut prev, &stmt.obj)?;
        self.build_stmt(&stmt.body)?;
        let body = self.pop_stmt()?;
        self.model.link_flow(prev, body)?;

        let composite = self.model.group_branches(marker, &[body]);
        self.push_stmt(composite);
        Ok(())
    }

    // ---- functions and classes ----

    fn build_fn(&mut self, function: &Function, name: Option<&Ident>) -> Result<(), FlowError> {
        let params: Vec<&Pat> = function.params.iter().map(|p| &p.pat).collect();
        let body = match &function.body {
            Some(b) => FnBody::Block(b),
            None => FnBody::None,
        };
        self.build_function_graph(function.span, name, &params, body)
    }

    fn build_function_graph(
        &mut self,
        span: Span,
        name: Option<&Ident>,
        params: &[&Pat],
        body: FnBody<'_>,
    ) -> Result<(), FlowError> {
        let parent = self.graph();
        let graph = self.model.new_graph(Some(parent), Some(span));
        self.graph_stack.push(graph);
        let saved_loops = std::mem::take(&mut self.loop_stack);
        let saved_labels = std::mem::take(&mut self.hanging_labels);
        let saved_hanging = std::mem::take(&mut self.hanging_loops);

        let mut prev = self.model.graph(graph).head;
        if let Some(ident) = name {
            let b = self.atom(ident.span, NodeKind::Binding)?;
            self.model.link_flow(prev, b)?;
            prev = b;
        }
        for pat in params {
            let b = self.atom(pat.span(), NodeKind::Binding)?;
            self.model.link_flow(prev, b)?;
            prev = b;
            if let Pat::Assign(assign) = pat {
                self.link_child_expr(&mut prev, &assign.right)?;
            }
        }
        match body {
            FnBody::Block(block) => {
                let b = self.build_stmt_list(&block.stmts)?;
                self.model.link_flow(prev, b)?;
                prev = b;
            }
            FnBody::Expr(expr) => {
                self.link_child_expr(&mut prev, expr)?;
            }
            FnBody::None => {}
        }
        self.seal_graph(graph, prev)?;

        self.loop_stack = saved_loops;
        self.hanging_labels = saved_labels;
        self.hanging_loops = saved_hanging;
        self.graph_stack.pop();
        Ok(())
    }

    fn seal_graph(&mut self, graph: GraphId, tail: BlockId) -> Result<(), FlowError> {
        let exit = self.fresh_basic();
        let pending = std::mem::take(&mut self.model.graph_mut(graph).pending_exits);
        for e in pending {
            self.model.attach(e, exit)?;
        }
        self.model.link_flow(tail, exit)?;
        let resolved = self.model.resolve(exit);
        self.model.graph_mut(graph).exit = Some(resolved);
        tracing::debug!(graph = graph.index(), "sealed flow graph");
        Ok(())
    }

    fn build_class(&mut self, class: &Class) -> Result<BlockId, FlowError> {
        let marker = self.fresh_basic();
        let mut prev = marker;
        if let Some(super_class) = &class.super_class {
            self.link_child_expr(&mut prev, super_class)?;
        }
        for member in &class.body {
            match member {
                ClassMember::Constructor(ctor) => {
                    let params: Vec<&Pat> = ctor
                        .params
                        .iter()
                        .filter_map(|p| match p {
                            ParamOrTsParamProp::Param(p) => Some(&p.pat),
                            ParamOrTsParamProp::TsParamProp(_) => None,
                        })
                        .collect();
                    let body = match &ctor.body {
                        Some(b) => FnBody::Block(b),
                        None => FnBody::None,
                    };
                    self.build_function_graph(ctor.span, None, &params, body)?;
                }
                ClassMember::Method(m) => {
                    self.link_prop_name(&mut prev, &m.key)?;
                    self.build_fn(&m.function, None)?;
                }
                ClassMember::PrivateMethod(m) => {
                    self.build_fn(&m.function, None)?;
                }
                ClassMember::ClassProp(p) => {
                    self.link_prop_name(&mut prev, &p.key)?;
                    if let Some(value) = &p.value {
                        self.link_child_expr(&mut prev, value)?;
                    }
                }
                ClassMember::PrivateProp(p) => {
                    if let Some(value) = &p.value {
                        self.link_child_expr(&mut prev, value)?;
                    }
                }
                ClassMember::StaticBlock(block) => {
                    self.build_function_graph(block.span, None, &[], FnBody::Block(&block.body))?;
                }
                _ => {}
            }
        }
        if self.model.resolve(prev) == self.model.resolve(marker) {
            Ok(marker)
        } else {
            Ok(self.model.group_branches(marker, &[prev]))
        }
    }

    // ---- expressions ----

    fn build_expr(&mut self, expr: &Expr) -> Result<(), FlowError> {
        match expr {
            Expr::Bin(bin)
                if matches!(
                    bin.op,
                    BinaryOp::LogicalAnd | BinaryOp::LogicalOr | BinaryOp::NullishCoalescing
                ) =>
            {
                self.build_logical(bin)
            }
            Expr::Bin(bin) => {
                let b = self.chain(bin.span, NodeKind::Expression, &[&*bin.left, &*bin.right])?;
                self.push_expr(b);
                Ok(())
            }
            Expr::Cond(cond) => self.build_cond(cond),
            Expr::Fn(f) => {
                let block = self.atom(f.function.span, NodeKind::Function)?;
                self.build_fn(&f.function, f.ident.as_ref())?;
                self.push_expr(block);
                Ok(())
            }
            Expr::Arrow(arrow) => {
                let block = self.atom(arrow.span, NodeKind::Function)?;
                let params: Vec<&Pat> = arrow.params.iter().collect();
                let body = match &*arrow.body {
                    BlockStmtOrExpr::BlockStmt(b) => FnBody::Block(b),
                    BlockStmtOrExpr::Expr(e) => FnBody::Expr(e),
                };
                self.build_function_graph(arrow.span, None, &params, body)?;
                self.push_expr(block);
                Ok(())
            }
            Expr::Class(c) => {
                let block = self.build_class(&c.class)?;
                self.mark_stmt(block, c.class.span, NodeKind::Function)?;
                self.push_expr(block);
                Ok(())
            }
            Expr::Assign(assign) => {
                let b = self.chain(assign.span, NodeKind::Expression, &[&*assign.right])?;
                self.push_expr(b);
                Ok(())
            }
            Expr::Call(call) => {
                let mut children: Vec<&Expr> = Vec::new();
                if let swc_ecma_ast::Callee::Expr(callee) = &call.callee {
                    children.push(callee.as_ref());
                }
                for arg in &call.args {
                    children.push(&*arg.expr);
                }
                let b = self.chain(call.span, NodeKind::Expression, &children)?;
                self.push_expr(b);
                Ok(())
            }
            Expr::New(new) => {
                let mut children: Vec<&Expr> = vec![&*new.callee];
                if let Some(args) = &new.args {
                    for arg in args {
                        children.push(&*arg.expr);
                    }
                }
                let b = self.chain(new.span, NodeKind::Expression, &children)?;
                self.push_expr(b);
                Ok(())
            }
            Expr::Member(member) => {
                let mut children: Vec<&Expr> = vec![&*member.obj];
                if let swc_ecma_ast::MemberProp::Computed(computed) = &member.prop {
                    children.push(&*computed.expr);
                }
                let b = self.chain(member.span, NodeKind::Expression, &children)?;
                self.push_expr(b);
                Ok(())
            }
            Expr::SuperProp(sp) => {
                let mut children: Vec<&Expr> = Vec::new();
                if let SuperProp::Computed(computed) = &sp.prop {
                    children.push(&*computed.expr);
                }
                let b = self.chain(sp.span, NodeKind::Expression, &children)?;
                self.push_expr(b);
                Ok(())
            }
            Expr::OptChain(opt) => {
                let mut children: Vec<&Expr> = Vec::new();
                match &*opt.base {
                    swc_ecma_ast::OptChainBase::Member(member) => {
                        children.push(&*member.obj);
                        if let swc_ecma_ast::MemberProp::Computed(computed) = &member.prop {
                            children.push(&*computed.expr);
                        }
                    }
                    swc_ecma_ast::OptChainBase::Call(call) => {
                        children.push(&*call.callee);
                        for arg in &call.args {
                            children.push(&*arg.expr);
                        }
                    }
                }
                let b = self.chain(opt.span, NodeKind::Expression, &children)?;
                self.push_expr(b);
                Ok(())
            }
            Expr::Seq(seq) => {
                let children: Vec<&Expr> = seq.exprs.iter().map(|e| &**e).collect();
                let b = self.chain(seq.span, NodeKind::Expression, &children)?;
                self.push_expr(b);
                Ok(())
            }
            Expr::Array(array) => {
                let children: Vec<&Expr> = array
                    .elems
                    .iter()
                    .flatten()
                    .map(|elem| &*elem.expr)
                    .collect();
                let b = self.chain(array.span, NodeKind::Expression, &children)?;
                self.push_expr(b);
                Ok(())
            }
            Expr::Object(object) => self.build_object(object),
            Expr::Unary(u) => {
                let b = self.chain(u.span, NodeKind::Expression, &[&*u.arg])?;
                self.push_expr(b);
                Ok(())
            }
            Expr::Update(u) => {
                let b = self.chain(u.span, NodeKind::Expression, &[&*u.arg])?;
                self.push_expr(b);
                Ok(())
            }
            Expr::Await(a) => {
                let b = self.chain(a.span, NodeKind::Expression, &[&*a.arg])?;
                self.push_expr(b);
                Ok(())
            }
            Expr::Yield(y) => {
                let mut children: Vec<&Expr> = Vec::new();
                if let Some(arg) = &y.arg {
                    children.push(arg.as_ref());
                }
                let b = self.chain(y.span, NodeKind::Expression, &children)?;
                self.push_expr(b);
                Ok(())
            }
            Expr::Tpl(tpl) => {
                let children: Vec<&Expr> = tpl.exprs.iter().map(|e| &**e).collect();
                let b = self.chain(tpl.span, NodeKind::Expression, &children)?;
                self.push_expr(b);
                Ok(())
            }
            Expr::TaggedTpl(tagged) => {
                let mut children: Vec<&Expr> = vec![&*tagged.tag];
                for e in &tagged.tpl.exprs {
                    children.push(e.as_ref());
                }
                let b = self.chain(tagged.span, NodeKind::Expression, &children)?;
                self.push_expr(b);
                Ok(())
            }
            Expr::Paren(p) => self.build_expr(&p.expr),
            Expr::TsNonNull(e) => self.build_expr(&e.expr),
            Expr::TsAs(e) => self.build_expr(&e.expr),
            Expr::TsConstAssertion(e) => self.build_expr(&e.expr),
            Expr::TsTypeAssertion(e) => self.build_expr(&e.expr),
            Expr::TsSatisfies(e) => self.build_expr(&e.expr),
            Expr::TsInstantiation(e) => self.build_expr(&e.expr),
            _ => {
                let b = self.atom(expr.span(), NodeKind::Expression)?;
                self.push_expr(b);
                Ok(())
            }
        }
    }

    /// `&&` skips the rhs when false, `||` and `??` when true. The skip
    /// jump stays open on the composite so the consumer can route it.
    fn build_logical(&mut self, bin: &BinExpr) -> Result<(), FlowError> {
        let skip_tag = match bin.op {
            BinaryOp::LogicalAnd => Tag::FALSE_BRANCH,
            _ => Tag::TRUE_BRANCH,
        };
        let marker = self.fresh_basic();

        self.build_expr(&bin.left)?;
        let lhs = self.pop_expr()?;
        self.model.link_flow(marker, lhs)?;
        self.model.new_jump(lhs, skip_tag)?;

        self.build_expr(&bin.right)?;
        let rhs = self.pop_expr()?;
        self.model
            .link(Some(lhs), EdgeKind::Sequential, Tag::NONE, Some(rhs))?;

        let node = self.model.new_node(bin.span, NodeKind::Expression);
        let tail = self.model.seq_source(rhs)?;
        self.model.attach_node(tail, node);

        let composite = self.model.group_branches(marker, &[lhs, rhs]);
        self.push_expr(composite);
        Ok(())
    }

    fn build_cond(&mut self, cond: &CondExpr) -> Result<(), FlowError> {
        let marker = self.fresh_basic();

        self.build_expr(&cond.test)?;
        let test = self.pop_expr()?;
        self.model.link_flow(marker, test)?;
        self.model.new_jump(test, Tag::FALSE_BRANCH)?;
        self.model.new_jump(test, Tag::TRUE_BRANCH)?;

        self.build_expr(&cond.cons)?;
        let cons = self.pop_expr()?;
        self.model
            .link(Some(test), EdgeKind::Jump, Tag::TRUE_BRANCH, Some(cons))?;
        self.model
            .link(Some(test), EdgeKind::Sequential, Tag::NONE, Some(cons))?;

        self.build_expr(&cond.alt)?;
        let alt = self.pop_expr()?;
        self.model
            .link(Some(test), EdgeKind::Jump, Tag::FALSE_BRANCH, Some(alt))?;

        let node = self.model.new_node(cond.span, NodeKind::Expression);
        let entry = self.model.entry_block(marker)?;
        self.model.attach_node(entry, node);

        let composite = self.model.group_branches(marker, &[cons, alt]);
        self.push_expr(composite);
        Ok(())
    }

    fn build_object(&mut self, object: &ObjectLit) -> Result<(), FlowError> {
        let marker = self.fresh_basic();
        let mut prev = marker;
        for prop in &object.props {
            match prop {
                PropOrSpread::Spread(spread) => {
                    self.link_child_expr(&mut prev, &spread.expr)?;
                }
                PropOrSpread::Prop(prop) => match &**prop {
                    Prop::Shorthand(_) => {}
                    Prop::KeyValue(kv) => {
                        self.link_prop_name(&mut prev, &kv.key)?;
                        self.link_child_expr(&mut prev, &kv.value)?;
                    }
                    Prop::Assign(a) => {
                        self.link_child_expr(&mut prev, &a.value)?;
                    }
                    Prop::Getter(g) => {
                        self.link_prop_name(&mut prev, &g.key)?;
                        let body = match &g.body {
                            Some(b) => FnBody::Block(b),
                            None => FnBody::None,
                        };
                        self.build_function_graph(g.span, None, &[], body)?;
                    }
                    Prop::Setter(s) => {
                        self.link_prop_name(&mut prev, &s.key)?;
                        let params: Vec<&Pat> = vec![&*s.param];
                        let body = match &s.body {
                            Some(b) => FnBody::Block(b),
                            None => FnBody::None,
                        };
                        self.build_function_graph(s.span, None, &params, body)?;
                    }
                    Prop::Method(m) => {
                        self.link_prop_name(&mut prev, &m.key)?;
                        self.build_fn(&m.function, None)?;
                    }
                },
            }
        }
        let node = self.model.new_node(object.span, NodeKind::Expression);
        let tail = self.model.seq_source(prev)?;
        self.model.attach_node(tail, node);
        let block = if self.model.resolve(prev) == self.model.resolve(marker) {
            marker
        } else {
            self.model.group_branches(marker, &[prev])
        };
        self.push_expr(block);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ParsedFile;
    use crate::semantic::ScopeBuilder;

    fn build_flow(code: &str) -> FlowModel {
        let file = ParsedFile::from_source("test.js", code);
        let module = file.module().expect("code should parse");
        let sem = ScopeBuilder::build(module);
        CfgBuilder::build(module, &sem).expect("flow construction")
    }

    fn statement_nodes(model: &FlowModel, graph: GraphId) -> usize {
        model
            .graph_blocks(graph)
            .flat_map(|b| model.block(b).nodes.iter())
            .filter(|&&n| model.node_record(n).kind == NodeKind::Statement)
            .count()
    }

    #[test]
    fn straight_line_code_collapses_into_one_block() {
        let model = build_flow("a(); b(); c();");

        // start block plus a single merged basic block
        assert_eq!(model.graph_blocks(model.root()).count(), 2);
        assert_eq!(statement_nodes(&model, model.root()), 3);
    }

    #[test]
    fn if_else_keeps_branches_apart() {
        let model = build_flow("if (a) { b(); } else { c(); }");

        assert!(model.graph_blocks(model.root()).count() >= 3);
        assert_eq!(statement_nodes(&model, model.root()), 3);
    }

    #[test]
    fn while_loop_creates_back_edge() {
        let model = build_flow("while (a) { b(); }");

        let has_back_edge = model.edges().any(|(_, e)| {
            e.is_closed() && e.tag.contains(Tag::LOOP_BACK)
        });
        assert!(has_back_edge);
    }

    #[test]
    fn logical_and_lhs_carries_the_short_circuit_jump() {
        let code = "a && b; c();";
        let file = ParsedFile::from_source("test.js", code);
        let module = file.module().expect("code should parse");
        let sem = ScopeBuilder::build(module);
        let model = CfgBuilder::build(module, &sem).expect("flow construction");

        let (lhs_span, rhs_span) = match &module.body[0] {
            ModuleItem::Stmt(Stmt::Expr(e)) => match &*e.expr {
                Expr::Bin(bin) => (bin.left.span(), bin.right.span()),
                _ => panic!("expected logical expression"),
            },
            _ => panic!("expected expression statement"),
        };
        let lhs = model
            .block_of(model.node_at(lhs_span).expect("lhs node"))
            .expect("lhs block");
        let rhs = model
            .block_of(model.node_at(rhs_span).expect("rhs node"))
            .expect("rhs block");
        assert_ne!(lhs, rhs, "short-circuit branch must not merge");

        let skips: Vec<_> = model
            .block(lhs)
            .outlets
            .iter()
            .copied()
            .filter(|&e| {
                let edge = model.edge(e);
                edge.kind == EdgeKind::Jump && edge.tag.contains(Tag::FALSE_BRANCH)
            })
            .collect();
        assert_eq!(skips.len(), 1, "lhs carries exactly one skip jump");
        assert!(
            model
                .open_outlets(lhs, EdgeKind::Jump, Tag::TRUE_BRANCH)
                .is_empty()
        );

        // The skip bypasses the rhs and rejoins the fallthrough at the
        // next statement, alongside the rhs's sequential outlet.
        let continuation = model.edge(skips[0]).dst.expect("skip was sequenced");
        assert_ne!(model.resolve(continuation), rhs);
        let next_stmt = model
            .block_of(model.node_at(module.body[1].span()).expect("next statement node"))
            .expect("continuation block");
        assert_eq!(model.resolve(continuation), next_stmt);
    }

    #[test]
    fn function_body_gets_its_own_graph() {
        let code = "function f() { return 1; }";
        let file = ParsedFile::from_source("test.js", code);
        let module = file.module().expect("code should parse");
        let sem = ScopeBuilder::build(module);
        let model = CfgBuilder::build(module, &sem).expect("flow construction");

        assert_eq!(model.graphs().count(), 2);
        let fn_span = match &module.body[0] {
            ModuleItem::Stmt(Stmt::Decl(Decl::Fn(f))) => f.function.span,
            _ => panic!("expected function declaration"),
        };
        let sub = model.graph_at(fn_span).expect("function graph");
        assert_eq!(model.graph(sub).parent, Some(model.root()));
        assert!(model.graph(model.root()).subs.contains(&sub));
    }

    #[test]
    fn graphs_are_sealed_with_an_exit() {
        let model = build_flow("function f() { if (a) { return 1; } return 2; } f();");

        for g in model.graphs() {
            let graph = model.graph(g);
            assert!(graph.exit.is_some());
            assert!(graph.pending_exits.is_empty());
            assert!(graph.hanging_breaks.is_empty());
        }
    }

    #[test]
    fn break_edges_are_drained_by_the_loop() {
        let model = build_flow("while (a) { if (b) { break; } c(); } d();");

        for g in model.graphs() {
            assert!(model.graph(g).hanging_breaks.is_empty());
        }
    }

    #[test]
    fn return_severs_the_fallthrough() {
        let model = build_flow("function f() { return 1; g(); }");

        let cut = model
            .edges()
            .any(|(_, e)| e.kind != EdgeKind::None && e.tag.contains(Tag::CUT));
        assert!(cut);
    }

    #[test]
    fn hoisted_declarations_are_tagged() {
        let code = "import { x } from 'mod'; function f() {} export default f;";
        let file = ParsedFile::from_source("test.js", code);
        let module = file.module().expect("code should parse");
        let sem = ScopeBuilder::build(module);
        let model = CfgBuilder::build(module, &sem).expect("flow construction");

        let fn_span = match &module.body[1] {
            ModuleItem::Stmt(Stmt::Decl(Decl::Fn(f))) => f.function.span,
            _ => panic!("expected function declaration"),
        };
        let node = model.node_at(fn_span).expect("function node");
        assert_eq!(model.node_record(node).kind, NodeKind::Hoisted);
    }

    #[test]
    fn labeled_loop_break_and_continue_resolve() {
        build_flow(
            "outer: for (let i = 0; i < 3; i++) {\n\
             inner: for (let j = 0; j < 3; j++) {\n\
             if (j === 1) continue outer;\n\
             if (i === 2) break outer;\n\
             }\n\
             }",
        );
    }

    #[test]
    fn construct_battery_builds_cleanly() {
        let snippets = [
            "do { a(); } while (b);",
            "for (const x of xs) { use(x); }",
            "for (const k in obj) { use(k); }",
            "for (;;) { if (x) break; }",
            "switch (x) { case 1: a(); break; case 2: b(); default: c(); }",
            "try { a(); } catch (e) { b(); } finally { c(); }",
            "try { a(); } finally { b(); }",
            "const f = (x = 1) => x ? a() : b();",
            "class C extends D { constructor() { super(); } m() { return 1; } static { init(); } }",
            "const o = { get x() { return 1; }, set x(v) { this._x = v; }, m() {}, [k]: v };",
            "label: { a(); break label; } b();",
            "const r = a && b || (c ?? d);",
            "async function f() { await g(); for await (const x of xs) { use(x); } }",
            "function* gen() { yield 1; yield* other(); }",
        ];
        for code in snippets {
            build_flow(code);
        }
    }

    #[test]
    fn nested_statements_in_one_dead_block_each_get_a_node() {
        let model = build_flow("function f() { return 1; a(); b(); }");

        let fn_graph = model
            .graphs()
            .find(|&g| g != model.root())
            .expect("function graph");
        // return, a() and b() all carry statement nodes
        assert_eq!(statement_nodes(&model, fn_graph), 3);
    }
}
