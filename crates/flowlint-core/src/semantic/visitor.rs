//! Scope and label collection pass
//!
//! A single explicit AST walk that builds the [`ScopeTree`] and the label
//! table the flow builder resolves jumps against. Bindings are not tracked;
//! flow construction only needs the scope shape and label usage.

use std::collections::HashMap;

use swc_common::{BytePos, Span, Spanned};
use swc_ecma_ast::{
    ArrowExpr, BlockStmt, BlockStmtOrExpr, Class, ClassMember, Decl, DefaultDecl, Expr, ForHead,
    Function, Module, ModuleDecl, ModuleItem, ParamOrTsParamProp, Prop, PropName, PropOrSpread,
    Stmt, VarDecl, VarDeclOrExpr,
};

use super::scope::{ScopeId, ScopeKind, ScopeTree};

#[derive(Debug, Clone)]
pub struct LabelRecord {
    pub name: String,
    /// Span of the label identifier, for reporting.
    pub span: Span,
    pub used: bool,
}

#[derive(Debug, Default)]
pub struct LabelTable {
    records: HashMap<ScopeId, LabelRecord>,
    by_stmt: HashMap<(u32, u32), ScopeId>,
    jump_targets: HashMap<(u32, u32), ScopeId>,
}

impl LabelTable {
    fn declare(&mut self, scope: ScopeId, stmt_span: Span, name: String, ident_span: Span) {
        self.records.insert(
            scope,
            LabelRecord {
                name,
                span: ident_span,
                used: false,
            },
        );
        self.by_stmt.insert((stmt_span.lo.0, stmt_span.hi.0), scope);
    }

    fn mark_used(&mut self, scope: ScopeId) {
        if let Some(record) = self.records.get_mut(&scope) {
            record.used = true;
        }
    }

    fn record_jump(&mut self, jump_span: Span, scope: ScopeId) {
        self.jump_targets
            .insert((jump_span.lo.0, jump_span.hi.0), scope);
    }

    pub fn record(&self, scope: ScopeId) -> Option<&LabelRecord> {
        self.records.get(&scope)
    }

    pub fn records(&self) -> impl Iterator<Item = &LabelRecord> {
        self.records.values()
    }

    pub fn label_of_stmt(&self, stmt_span: Span) -> Option<ScopeId> {
        self.by_stmt
            .get(&(stmt_span.lo.0, stmt_span.hi.0))
            .copied()
    }

    pub fn jump_target(&self, jump_span: Span) -> Option<ScopeId> {
        self.jump_targets
            .get(&(jump_span.lo.0, jump_span.hi.0))
            .copied()
    }
}

/// Result of the semantic pass: the scope tree plus label facts.
pub struct SemanticModel {
    pub scopes: ScopeTree,
    pub labels: LabelTable,
}

impl SemanticModel {
    /// Innermost loop scope containing the position, not crossing a
    /// function boundary.
    pub fn innermost_loop_at(&self, pos: BytePos) -> Option<ScopeId> {
        self.innermost_at(pos, |k| k.is_loop())
    }

    /// Innermost switch scope containing the position, not crossing a
    /// function boundary.
    pub fn innermost_switch_at(&self, pos: BytePos) -> Option<ScopeId> {
        self.innermost_at(pos, |k| k == ScopeKind::Switch)
    }

    fn innermost_at(&self, pos: BytePos, want: impl Fn(ScopeKind) -> bool) -> Option<ScopeId> {
        for id in self.scopes.ancestors(self.scopes.narrowest_at(pos)) {
            let kind = self.scopes.get(id).kind;
            if want(kind) {
                return Some(id);
            }
            if kind == ScopeKind::Function {
                return None;
            }
        }
        None
    }

    /// Scope of the loop statement with exactly this span.
    pub fn loop_scope(&self, span: Span) -> Option<ScopeId> {
        self.scopes
            .scope_at_span(span)
            .filter(|&id| self.scopes.get(id).kind.is_loop())
    }

    /// Scope of the switch statement with exactly this span.
    pub fn switch_scope(&self, span: Span) -> Option<ScopeId> {
        self.scopes
            .scope_at_span(span)
            .filter(|&id| self.scopes.get(id).kind == ScopeKind::Switch)
    }

    pub fn label_at(&self, labeled_span: Span) -> Option<ScopeId> {
        self.labels.label_of_stmt(labeled_span)
    }

    pub fn label_used(&self, scope: ScopeId) -> bool {
        self.labels.record(scope).is_some_and(|r| r.used)
    }

    pub fn jump_target(&self, jump_span: Span) -> Option<ScopeId> {
        self.labels.jump_target(jump_span)
    }
}

pub struct ScopeBuilder {
    scopes: ScopeTree,
    labels: LabelTable,
    stack: Vec<ScopeId>,
    label_stack: Vec<(String, ScopeId)>,
}

impl ScopeBuilder {
    pub fn build(module: &Module) -> SemanticModel {
        let scopes = ScopeTree::new(module.span);
        let root = scopes.root();
        let mut builder = Self {
            scopes,
            labels: LabelTable::default(),
            stack: vec![root],
            label_stack: Vec::new(),
        };

        for item in &module.body {
            builder.walk_module_item(item);
        }

        SemanticModel {
            scopes: builder.scopes,
            labels: builder.labels,
        }
    }

    fn current(&self) -> ScopeId {
        self.stack.last().copied().unwrap_or(self.scopes.root())
    }

    fn enter(&mut self, kind: ScopeKind, span: Span) -> ScopeId {
        let id = self.scopes.create_scope(kind, span, self.current());
        self.stack.push(id);
        id
    }

    fn exit(&mut self) {
        self.stack.pop();
    }

    fn walk_module_item(&mut self, item: &ModuleItem) {
        match item {
            ModuleItem::Stmt(stmt) => self.walk_stmt(stmt),
            ModuleItem::ModuleDecl(decl) => match decl {
                ModuleDecl::ExportDecl(export) => self.walk_decl(&export.decl),
                ModuleDecl::ExportDefaultDecl(export) => match &export.decl {
                    DefaultDecl::Fn(f) => self.walk_function(&f.function),
                    DefaultDecl::Class(c) => self.walk_class(&c.class),
                    DefaultDecl::TsInterfaceDecl(_) => {}
                },
                ModuleDecl::ExportDefaultExpr(export) => self.walk_expr(&export.expr),
                _ => {}
            },
        }
    }

    fn walk_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Block(block) => {
                self.enter(ScopeKind::Block, block.span);
                self.walk_block_stmts(block);
                self.exit();
            }
            Stmt::Expr(expr) => self.walk_expr(&expr.expr),
            Stmt::Decl(decl) => self.walk_decl(decl),
            Stmt::Return(ret) => {
                if let Some(arg) = &ret.arg {
                    self.walk_expr(arg);
                }
            }
            Stmt::Throw(throw) => self.walk_expr(&throw.arg),
            Stmt::If(if_stmt) => {
                self.walk_expr(&if_stmt.test);
                self.walk_stmt(&if_stmt.cons);
                if let Some(alt) = &if_stmt.alt {
                    self.walk_stmt(alt);
                }
            }
            Stmt::While(while_stmt) => {
                self.enter(ScopeKind::While, while_stmt.span);
                self.walk_expr(&while_stmt.test);
                self.walk_stmt(&while_stmt.body);
                self.exit();
            }
            Stmt::DoWhile(do_while) => {
                self.enter(ScopeKind::DoWhile, do_while.span);
                self.walk_stmt(&do_while.body);
                self.walk_expr(&do_while.test);
                self.exit();
            }
            Stmt::For(for_stmt) => {
                self.enter(ScopeKind::For, for_stmt.span);
                match &for_stmt.init {
                    Some(VarDeclOrExpr::VarDecl(v)) => self.walk_var_decl(v),
                    Some(VarDeclOrExpr::Expr(e)) => self.walk_expr(e),
                    None => {}
                }
                if let Some(test) = &for_stmt.test {
                    self.walk_expr(test);
                }
                if let Some(update) = &for_stmt.update {
                    self.walk_expr(update);
                }
                self.walk_stmt(&for_stmt.body);
                self.exit();
            }
            Stmt::ForIn(for_in) => {
                self.enter(ScopeKind::ForIn, for_in.span);
                self.walk_for_head(&for_in.left);
                self.walk_expr(&for_in.right);
                self.walk_stmt(&for_in.body);
                self.exit();
            }
            Stmt::ForOf(for_of) => {
                self.enter(ScopeKind::ForOf, for_of.span);
                self.walk_for_head(&for_of.left);
                self.walk_expr(&for_of.right);
                self.walk_stmt(&for_of.body);
                self.exit();
            }
            Stmt::Switch(switch) => {
                self.walk_expr(&switch.discriminant);
                self.enter(ScopeKind::Switch, switch.span);
                for case in &switch.cases {
                    if let Some(test) = &case.test {
                        self.walk_expr(test);
                    }
                    for s in &case.cons {
                        self.walk_stmt(s);
                    }
                }
                self.exit();
            }
            Stmt::Try(try_stmt) => {
                self.enter(ScopeKind::Block, try_stmt.block.span);
                self.walk_block_stmts(&try_stmt.block);
                self.exit();
                if let Some(handler) = &try_stmt.handler {
                    self.enter(ScopeKind::Catch, handler.span);
                    self.walk_block_stmts(&handler.body);
                    self.exit();
                }
                if let Some(finalizer) = &try_stmt.finalizer {
                    self.enter(ScopeKind::Block, finalizer.span);
                    self.walk_block_stmts(finalizer);
                    self.exit();
                }
            }
            Stmt::Labeled(labeled) => {
                let scope = self.enter(ScopeKind::Label, labeled.span);
                self.labels.declare(
                    scope,
                    labeled.span,
                    labeled.label.sym.to_string(),
                    labeled.label.span,
                );
                self.label_stack.push((labeled.label.sym.to_string(), scope));
                self.walk_stmt(&labeled.body);
                self.label_stack.pop();
                self.exit();
            }
            Stmt::Break(brk) => {
                if let Some(label) = &brk.label {
                    self.resolve_label_jump(brk.span, &label.sym);
                }
            }
            Stmt::Continue(cont) => {
                if let Some(label) = &cont.label {
                    self.resolve_label_jump(cont.span, &label.sym);
                }
            }
            Stmt::With(with) => {
                self.walk_expr(&with.obj);
                self.walk_stmt(&with.body);
            }
            Stmt::Empty(_) | Stmt::Debugger(_) => {}
        }
    }

    fn resolve_label_jump(&mut self, jump_span: Span, name: &str) {
        let found = self
            .label_stack
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, scope)| *scope);
        if let Some(scope) = found {
            self.labels.mark_used(scope);
            self.labels.record_jump(jump_span, scope);
        }
    }

    fn walk_block_stmts(&mut self, block: &BlockStmt) {
        for stmt in &block.stmts {
            self.walk_stmt(stmt);
        }
    }

    fn walk_for_head(&mut self, head: &ForHead) {
        if let ForHead::VarDecl(v) = head {
            self.walk_var_decl(v);
        }
    }

    fn walk_decl(&mut self, decl: &Decl) {
        match decl {
            Decl::Fn(f) => self.walk_function(&f.function),
            Decl::Class(c) => self.walk_class(&c.class),
            Decl::Var(v) => self.walk_var_decl(v),
            Decl::Using(u) => {
                for d in &u.decls {
                    if let Some(init) = &d.init {
                        self.walk_expr(init);
                    }
                }
            }
            _ => {}
        }
    }

    fn walk_var_decl(&mut self, var: &VarDecl) {
        for decl in &var.decls {
            if let Some(init) = &decl.init {
                self.walk_expr(init);
            }
        }
    }

    fn walk_function(&mut self, function: &Function) {
        self.enter(ScopeKind::Function, function.span);
        let saved = std::mem::take(&mut self.label_stack);
        for param in &function.params {
            self.walk_pat_default(&param.pat);
        }
        if let Some(body) = &function.body {
            self.walk_block_stmts(body);
        }
        self.label_stack = saved;
        self.exit();
    }

    fn walk_arrow(&mut self, arrow: &ArrowExpr) {
        self.enter(ScopeKind::Function, arrow.span);
        let saved = std::mem::take(&mut self.label_stack);
        for pat in &arrow.params {
            self.walk_pat_default(pat);
        }
        match &*arrow.body {
            BlockStmtOrExpr::BlockStmt(block) => self.walk_block_stmts(block),
            BlockStmtOrExpr::Expr(expr) => self.walk_expr(expr),
        }
        self.label_stack = saved;
        self.exit();
    }

    fn walk_fn_body_scope(&mut self, span: Span, body: Option<&BlockStmt>) {
        self.enter(ScopeKind::Function, span);
        let saved = std::mem::take(&mut self.label_stack);
        if let Some(block) = body {
            self.walk_block_stmts(block);
        }
        self.label_stack = saved;
        self.exit();
    }

    fn walk_class(&mut self, class: &Class) {
        if let Some(super_class) = &class.super_class {
            self.walk_expr(super_class);
        }
        for member in &class.body {
            match member {
                ClassMember::Constructor(ctor) => {
                    for param in &ctor.params {
                        if let ParamOrTsParamProp::Param(p) = param {
                            self.walk_pat_default(&p.pat);
                        }
                    }
                    self.walk_fn_body_scope(ctor.span, ctor.body.as_ref());
                }
                ClassMember::Method(m) => {
                    self.walk_prop_name(&m.key);
                    self.walk_function(&m.function);
                }
                ClassMember::PrivateMethod(m) => self.walk_function(&m.function),
                ClassMember::ClassProp(p) => {
                    self.walk_prop_name(&p.key);
                    if let Some(value) = &p.value {
                        self.walk_expr(value);
                    }
                }
                ClassMember::PrivateProp(p) => {
                    if let Some(value) = &p.value {
                        self.walk_expr(value);
                    }
                }
                ClassMember::StaticBlock(block) => {
                    self.walk_fn_body_scope(block.span, Some(&block.body));
                }
                _ => {}
            }
        }
    }

    fn walk_prop_name(&mut self, name: &PropName) {
        if let PropName::Computed(computed) = name {
            self.walk_expr(&computed.expr);
        }
    }

    fn walk_pat_default(&mut self, pat: &swc_ecma_ast::Pat) {
        if let swc_ecma_ast::Pat::Assign(assign) = pat {
            self.walk_expr(&assign.right);
        }
    }

    fn walk_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Fn(f) => self.walk_function(&f.function),
            Expr::Arrow(a) => self.walk_arrow(a),
            Expr::Class(c) => self.walk_class(&c.class),
            Expr::Bin(bin) => {
                self.walk_expr(&bin.left);
                self.walk_expr(&bin.right);
            }
            Expr::Unary(u) => self.walk_expr(&u.arg),
            Expr::Update(u) => self.walk_expr(&u.arg),
            Expr::Assign(a) => self.walk_expr(&a.right),
            Expr::Cond(c) => {
                self.walk_expr(&c.test);
                self.walk_expr(&c.cons);
                self.walk_expr(&c.alt);
            }
            Expr::Call(call) => {
                if let swc_ecma_ast::Callee::Expr(callee) = &call.callee {
                    self.walk_expr(callee);
                }
                for arg in &call.args {
                    self.walk_expr(&arg.expr);
                }
            }
            Expr::New(new) => {
                self.walk_expr(&new.callee);
                if let Some(args) = &new.args {
                    for arg in args {
                        self.walk_expr(&arg.expr);
                    }
                }
            }
            Expr::Member(member) => {
                self.walk_expr(&member.obj);
                if let swc_ecma_ast::MemberProp::Computed(computed) = &member.prop {
                    self.walk_expr(&computed.expr);
                }
            }
            Expr::OptChain(opt) => match &*opt.base {
                swc_ecma_ast::OptChainBase::Member(member) => {
                    self.walk_expr(&member.obj);
                    if let swc_ecma_ast::MemberProp::Computed(computed) = &member.prop {
                        self.walk_expr(&computed.expr);
                    }
                }
                swc_ecma_ast::OptChainBase::Call(call) => {
                    self.walk_expr(&call.callee);
                    for arg in &call.args {
                        self.walk_expr(&arg.expr);
                    }
                }
            },
            Expr::Seq(seq) => {
                for e in &seq.exprs {
                    self.walk_expr(e);
                }
            }
            Expr::Array(array) => {
                for elem in array.elems.iter().flatten() {
                    self.walk_expr(&elem.expr);
                }
            }
            Expr::Object(object) => {
                for prop in &object.props {
                    match prop {
                        PropOrSpread::Spread(spread) => self.walk_expr(&spread.expr),
                        PropOrSpread::Prop(prop) => match &**prop {
                            Prop::Shorthand(_) => {}
                            Prop::KeyValue(kv) => {
                                self.walk_prop_name(&kv.key);
                                self.walk_expr(&kv.value);
                            }
                            Prop::Assign(a) => self.walk_expr(&a.value),
                            Prop::Getter(g) => {
                                self.walk_prop_name(&g.key);
                                self.walk_fn_body_scope(g.span, g.body.as_ref());
                            }
                            Prop::Setter(s) => {
                                self.walk_prop_name(&s.key);
                                self.walk_fn_body_scope(s.span, s.body.as_ref());
                            }
                            Prop::Method(m) => {
                                self.walk_prop_name(&m.key);
                                self.walk_function(&m.function);
                            }
                        },
                    }
                }
            }
            Expr::Tpl(tpl) => {
                for e in &tpl.exprs {
                    self.walk_expr(e);
                }
            }
            Expr::TaggedTpl(tagged) => {
                self.walk_expr(&tagged.tag);
                for e in &tagged.tpl.exprs {
                    self.walk_expr(e);
                }
            }
            Expr::Paren(paren) => self.walk_expr(&paren.expr),
            Expr::Await(a) => self.walk_expr(&a.arg),
            Expr::Yield(y) => {
                if let Some(arg) = &y.arg {
                    self.walk_expr(arg);
                }
            }
            Expr::TsNonNull(e) => self.walk_expr(&e.expr),
            Expr::TsAs(e) => self.walk_expr(&e.expr),
            Expr::TsConstAssertion(e) => self.walk_expr(&e.expr),
            Expr::TsTypeAssertion(e) => self.walk_expr(&e.expr),
            Expr::TsSatisfies(e) => self.walk_expr(&e.expr),
            Expr::TsInstantiation(e) => self.walk_expr(&e.expr),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ParsedFile;

    fn model_of(code: &str) -> SemanticModel {
        let file = ParsedFile::from_source("test.js", code);
        let module = file.module().expect("code should parse");
        ScopeBuilder::build(module)
    }

    fn stmt_span(code: &str, index: usize) -> Span {
        let file = ParsedFile::from_source("test.js", code);
        let module = file.module().expect("code should parse");
        module.body[index].span()
    }

    #[test]
    fn module_root_scope_only_for_flat_code() {
        let model = model_of("const x = 1; const y = 2;");

        assert_eq!(model.scopes.len(), 1);
    }

    #[test]
    fn function_creates_scope() {
        let model = model_of("function foo() { const x = 1; }");

        let kinds: Vec<ScopeKind> = model
            .scopes
            .ancestors(model.scopes.narrowest_at(BytePos(20)))
            .map(|id| model.scopes.get(id).kind)
            .collect();

        assert!(kinds.contains(&ScopeKind::Function));
    }

    #[test]
    fn loop_scope_found_by_statement_span() {
        let code = "while (x) { y(); }";
        let model = model_of(code);
        let span = stmt_span(code, 0);

        let scope = model.loop_scope(span);

        assert!(scope.is_some());
        assert_eq!(model.scopes.get(scope.unwrap()).kind, ScopeKind::While);
    }

    #[test]
    fn innermost_loop_skips_switch() {
        let code = "while (a) { switch (b) { case 1: break; } }";
        let model = model_of(code);
        // position of the break keyword
        let pos = BytePos(code.find("break").unwrap() as u32 + 2);

        let scope = model.innermost_loop_at(pos).expect("loop scope");

        assert_eq!(model.scopes.get(scope).kind, ScopeKind::While);
        let switch = model.innermost_switch_at(pos).expect("switch scope");
        assert_eq!(model.scopes.get(switch).kind, ScopeKind::Switch);
    }

    #[test]
    fn innermost_loop_does_not_cross_function_boundary() {
        let code = "while (a) { const f = () => { g(); }; }";
        let model = model_of(code);
        let pos = BytePos(code.find("g()").unwrap() as u32 + 1);

        assert_eq!(model.innermost_loop_at(pos), None);
    }

    #[test]
    fn used_label_is_marked() {
        let code = "outer: while (a) { break outer; }";
        let model = model_of(code);
        let span = stmt_span(code, 0);

        let label = model.label_at(span).expect("label scope");

        assert!(model.label_used(label));
    }

    #[test]
    fn unused_label_is_not_marked() {
        let code = "outer: while (a) { b(); }";
        let model = model_of(code);
        let span = stmt_span(code, 0);

        let label = model.label_at(span).expect("label scope");

        assert!(!model.label_used(label));
    }

    #[test]
    fn labeled_break_resolves_to_label_scope() {
        let code = "outer: while (a) { while (b) { break outer; } }";
        let file = ParsedFile::from_source("test.js", code);
        let module = file.module().unwrap();
        let model = ScopeBuilder::build(module);

        let labeled_span = module.body[0].span();
        let label = model.label_at(labeled_span).expect("label scope");

        // find the break statement span
        let mut break_span = None;
        if let ModuleItem::Stmt(Stmt::Labeled(labeled)) = &module.body[0] {
            if let Stmt::While(outer) = &*labeled.body {
                if let Stmt::Block(block) = &*outer.body {
                    if let Stmt::While(inner) = &block.stmts[0] {
                        if let Stmt::Block(inner_block) = &*inner.body {
                            break_span = Some(inner_block.stmts[0].span());
                        }
                    }
                }
            }
        }

        let break_span = break_span.expect("break statement");
        assert_eq!(model.jump_target(break_span), Some(label));
    }

    #[test]
    fn labels_do_not_leak_into_nested_functions() {
        // `break outer` inside the function body has no matching label
        let code = "outer: while (a) { const f = function () { outer: { break outer; } }; }";
        let model = model_of(code);

        // both labels exist as separate records
        assert_eq!(model.labels.records().count(), 2);
    }
}
