//! F001: Detect unreachable code.
//!
//! Builds the control flow graph for each function scope and the module
//! body, then reports every statement that sits in a block no uncut path
//! from the graph head can reach. Hoisted declarations are exempt since
//! the engine binds them before execution.

use crate::declare_rule;
use crate::diagnostic::Diagnostic;
use crate::flow::{CfgBuilder, NodeKind, reachable_blocks};
use crate::parser::ParsedFile;
use crate::rules::{Rule, RuleMetadata, Severity};
use crate::semantic::ScopeBuilder;

declare_rule!(
    NoUnreachable,
    id = "F001",
    name = "no-unreachable",
    description = "Detects code that can never be executed",
    category = Correctness,
    severity = Warning,
    examples = r#"
// Bad
function f() {
    return 1;
    console.log('never runs');
}

// Good
function f() {
    console.log('runs');
    return 1;
}
"#
);

impl Rule for NoUnreachable {
    fn metadata(&self) -> &RuleMetadata {
        &self.metadata
    }

    fn check(&self, file: &ParsedFile) -> Vec<Diagnostic> {
        let Some(module) = file.module() else {
            return Vec::new();
        };

        let semantics = ScopeBuilder::build(module);
        let model = match CfgBuilder::build(module, &semantics) {
            Ok(model) => model,
            Err(err) => {
                tracing::warn!(
                    file = %file.metadata().filename,
                    error = %err,
                    "skipping unreachable code analysis"
                );
                return Vec::new();
            }
        };

        let filename = &file.metadata().filename;
        let mut diagnostics = Vec::new();

        for graph in model.graphs() {
            let live = reachable_blocks(&model, graph);
            for block in model.graph_blocks(graph) {
                if live.contains(&block) {
                    continue;
                }
                for &node in &model.block(block).nodes {
                    let record = model.node_record(node);
                    if record.kind != NodeKind::Statement {
                        continue;
                    }
                    let (line, column) = file.span_to_location(record.span);
                    diagnostics.push(
                        Diagnostic::new(
                            self.metadata.id,
                            self.metadata.severity,
                            "Unreachable code detected",
                            filename,
                            line,
                            column,
                        )
                        .with_suggestion("Remove unreachable code or check the control flow"),
                    );
                }
            }
        }

        diagnostics
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_rule(code: &str) -> Vec<Diagnostic> {
        let file = ParsedFile::from_source("test.js", code);
        NoUnreachable::new().check(&file)
    }

    #[test]
    fn no_unreachable_code_no_warning() {
        let code = r#"
function f() {
    const x = 1;
    console.log(x);
    return x;
}
"#;
        assert!(run_rule(code).is_empty());
    }

    #[test]
    fn code_after_return_warns() {
        let code = r#"
function f() {
    return 1;
    const x = 2;
}
"#;
        let diagnostics = run_rule(code);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].rule_id, "F001");
    }

    #[test]
    fn code_after_throw_warns() {
        let code = r#"
function f() {
    throw new Error('boom');
    const x = 2;
}
"#;
        assert_eq!(run_rule(code).len(), 1);
    }

    #[test]
    fn code_after_conditional_return_no_warning() {
        let code = r#"
function f(a) {
    if (a) {
        return 1;
    }
    const x = 2;
    return x;
}
"#;
        assert!(run_rule(code).is_empty());
    }

    #[test]
    fn code_after_if_else_both_return_warns() {
        let code = r#"
function f(a) {
    if (a) {
        return 1;
    } else {
        return 2;
    }
    const y = 3;
}
"#;
        assert_eq!(run_rule(code).len(), 1);
    }

    #[test]
    fn unreachable_in_nested_block() {
        let code = r#"
function f(a) {
    if (a) {
        return 1;
        const x = 2;
    }
    return 3;
}
"#;
        assert_eq!(run_rule(code).len(), 1);
    }

    #[test]
    fn code_after_break_in_loop_warns() {
        let code = r#"
for (let i = 0; i < 10; i++) {
    break;
    const x = 1;
}
"#;
        assert_eq!(run_rule(code).len(), 1);
    }

    #[test]
    fn code_after_continue_in_loop_warns() {
        let code = r#"
for (let i = 0; i < 10; i++) {
    continue;
    const x = 1;
}
"#;
        assert_eq!(run_rule(code).len(), 1);
    }

    #[test]
    fn switch_case_with_break_no_warning() {
        let code = r#"
switch (x) {
    case 1:
        doSomething();
        break;
    case 2:
        doOther();
        break;
}
"#;
        assert!(run_rule(code).is_empty());
    }

    #[test]
    fn switch_with_default_all_return_warns() {
        let code = r#"
function f(x) {
    switch (x) {
        case 1:
            return 1;
        default:
            return 2;
    }
    const y = 3;
}
"#;
        assert_eq!(run_rule(code).len(), 1);
    }

    #[test]
    fn switch_without_default_no_warning() {
        let code = r#"
function f(x) {
    switch (x) {
        case 1:
            return 1;
    }
    const y = 3;
    return y;
}
"#;
        assert!(run_rule(code).is_empty());
    }

    #[test]
    fn try_catch_both_return_warns() {
        let code = r#"
function f() {
    try {
        return risky();
    } catch (e) {
        return fallback();
    }
    const x = 1;
}
"#;
        assert_eq!(run_rule(code).len(), 1);
    }

    #[test]
    fn try_finally_return_in_try_no_warning() {
        // The finalizer is reachable on the exceptional path, and code
        // after the statement stays live through the finalizer's exit.
        let code = r#"
function f() {
    try {
        return risky();
    } finally {
        cleanup();
    }
    const x = 3;
}
"#;
        assert!(run_rule(code).is_empty());
    }

    #[test]
    fn return_in_finally_warns() {
        let code = r#"
function f() {
    try {
        work();
    } finally {
        return 1;
    }
    const x = 3;
}
"#;
        assert_eq!(run_rule(code).len(), 1);
    }

    #[test]
    fn unreachable_inside_try_block() {
        let code = r#"
function f() {
    try {
        return 1;
        const x = 2;
    } catch (e) {
        handle(e);
    }
}
"#;
        assert_eq!(run_rule(code).len(), 1);
    }

    #[test]
    fn function_declaration_after_return_allowed() {
        let code = r#"
function outer() {
    return helper();
    function helper() {
        return 1;
    }
}
"#;
        assert!(run_rule(code).is_empty());
    }

    #[test]
    fn code_after_break_in_while_warns() {
        let code = r#"
while (cond()) {
    break;
    const x = 1;
}
"#;
        assert_eq!(run_rule(code).len(), 1);
    }

    #[test]
    fn code_after_break_in_do_while_warns() {
        let code = r#"
do {
    break;
    const x = 1;
} while (cond());
"#;
        assert_eq!(run_rule(code).len(), 1);
    }

    #[test]
    fn code_after_break_in_for_in_warns() {
        let code = r#"
for (const k in obj) {
    break;
    const x = 1;
}
"#;
        assert_eq!(run_rule(code).len(), 1);
    }

    #[test]
    fn code_after_break_in_for_of_warns() {
        let code = r#"
for (const v of items) {
    break;
    const x = 1;
}
"#;
        assert_eq!(run_rule(code).len(), 1);
    }

    #[test]
    fn code_after_infinite_while_warns() {
        let code = r#"
while (true) {
    spin();
}
after();
"#;
        assert_eq!(run_rule(code).len(), 1);
    }

    #[test]
    fn code_after_infinite_for_warns() {
        let code = r#"
for (;;) {
    spin();
}
after();
"#;
        assert_eq!(run_rule(code).len(), 1);
    }

    #[test]
    fn infinite_loop_with_break_no_warning() {
        let code = r#"
while (true) {
    if (done()) {
        break;
    }
}
after();
"#;
        assert!(run_rule(code).is_empty());
    }

    #[test]
    fn break_in_switch_inside_loop_targets_the_loop() {
        let code = r#"
while (cond()) {
    switch (x) {
        case 1:
            break;
    }
}
after();
"#;
        assert!(run_rule(code).is_empty());
    }

    #[test]
    fn arrow_function_unreachable() {
        let code = r#"
const f = () => {
    return 1;
    const x = 2;
};
"#;
        assert_eq!(run_rule(code).len(), 1);
    }

    #[test]
    fn arrow_function_expression_body_no_warning() {
        let code = "const f = () => compute();";
        assert!(run_rule(code).is_empty());
    }

    #[test]
    fn multiple_unreachable_statements() {
        let code = r#"
function f() {
    return 1;
    const x = 2;
    const y = 3;
}
"#;
        assert_eq!(run_rule(code).len(), 2);
    }

    #[test]
    fn labeled_statement_unreachable() {
        let code = r#"
outer: {
    break outer;
    const x = 1;
}
"#;
        assert_eq!(run_rule(code).len(), 1);
    }

    #[test]
    fn labeled_continue_no_warning() {
        let code = r#"
outer: for (let i = 0; i < 3; i++) {
    for (let j = 0; j < 3; j++) {
        if (skip(i, j)) {
            continue outer;
        }
        visit(i, j);
    }
}
"#;
        assert!(run_rule(code).is_empty());
    }

    #[test]
    fn nested_if_all_branches_return() {
        let code = r#"
function f(a, b) {
    if (a) {
        if (b) {
            return 1;
        } else {
            return 2;
        }
    } else {
        return 3;
    }
    const x = 4;
}
"#;
        assert_eq!(run_rule(code).len(), 1);
    }

    #[test]
    fn nested_if_partial_return_no_warning() {
        let code = r#"
function f(a, b) {
    if (a) {
        if (b) {
            return 1;
        }
    } else {
        return 3;
    }
    const x = 4;
    return x;
}
"#;
        assert!(run_rule(code).is_empty());
    }

    #[test]
    fn class_method_unreachable() {
        let code = r#"
class Service {
    run() {
        return this.work();
        this.cleanup();
    }
}
"#;
        assert_eq!(run_rule(code).len(), 1);
    }

    #[test]
    fn empty_function_no_warning() {
        let code = "function f() {}";
        assert!(run_rule(code).is_empty());
    }

    #[test]
    fn return_at_end_no_warning() {
        let code = r#"
function f() {
    const x = 1;
    return x;
}
"#;
        assert!(run_rule(code).is_empty());
    }

    #[test]
    fn parse_failure_produces_no_diagnostics() {
        assert!(run_rule("function f( {").is_empty());
    }

    #[test]
    fn metadata_is_correct() {
        let rule = NoUnreachable::new();
        let metadata = rule.metadata();
        assert_eq!(metadata.id, "F001");
        assert_eq!(metadata.name, "no-unreachable");
        assert_eq!(metadata.severity, Severity::Warning);
    }
}
