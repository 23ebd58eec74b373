//! F002: Detect labels that no break or continue ever names.

use crate::declare_rule;
use crate::diagnostic::Diagnostic;
use crate::parser::ParsedFile;
use crate::rules::{Rule, RuleMetadata};
use crate::semantic::ScopeBuilder;

declare_rule!(
    NoUnusedLabels,
    id = "F002",
    name = "no-unused-labels",
    description = "Detects labels that are never referenced by a break or continue",
    category = Quality,
    severity = Warning,
    examples = r#"
// Bad
outer: for (const item of items) {
    process(item);
}

// Good
outer: for (const item of items) {
    if (shouldStop(item)) {
        break outer;
    }
}
"#
);

impl Rule for NoUnusedLabels {
    fn metadata(&self) -> &RuleMetadata {
        &self.metadata
    }

    fn check(&self, file: &ParsedFile) -> Vec<Diagnostic> {
        let Some(module) = file.module() else {
            return Vec::new();
        };

        let semantics = ScopeBuilder::build(module);
        let filename = &file.metadata().filename;
        let mut diagnostics: Vec<Diagnostic> = semantics
            .labels
            .records()
            .filter(|record| !record.used)
            .map(|record| {
                let (line, column) = file.span_to_location(record.span);
                Diagnostic::new(
                    self.metadata.id,
                    self.metadata.severity,
                    &format!("Label '{}' is never used", record.name),
                    filename,
                    line,
                    column,
                )
                .with_suggestion("Remove the label or reference it with break or continue")
            })
            .collect();

        diagnostics.sort_by_key(|d| (d.line, d.column));
        diagnostics
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_rule(code: &str) -> Vec<Diagnostic> {
        let file = ParsedFile::from_source("test.js", code);
        NoUnusedLabels::new().check(&file)
    }

    #[test]
    fn unused_label_warns() {
        let code = r#"
outer: for (let i = 0; i < 3; i++) {
    work(i);
}
"#;
        let diagnostics = run_rule(code);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].rule_id, "F002");
        assert!(diagnostics[0].message.contains("outer"));
    }

    #[test]
    fn label_used_by_break_no_warning() {
        let code = r#"
outer: for (let i = 0; i < 3; i++) {
    for (let j = 0; j < 3; j++) {
        if (stop(i, j)) {
            break outer;
        }
    }
}
"#;
        assert!(run_rule(code).is_empty());
    }

    #[test]
    fn label_used_by_continue_no_warning() {
        let code = r#"
outer: for (let i = 0; i < 3; i++) {
    for (let j = 0; j < 3; j++) {
        continue outer;
    }
}
"#;
        assert!(run_rule(code).is_empty());
    }

    #[test]
    fn unlabeled_break_does_not_mark_the_label() {
        let code = r#"
outer: for (let i = 0; i < 3; i++) {
    break;
}
"#;
        assert_eq!(run_rule(code).len(), 1);
    }

    #[test]
    fn mixed_labels_report_only_the_unused_one() {
        let code = r#"
first: for (let i = 0; i < 3; i++) {
    break first;
}
second: for (let j = 0; j < 3; j++) {
    work(j);
}
"#;
        let diagnostics = run_rule(code);
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].message.contains("second"));
    }

    #[test]
    fn labels_inside_functions_are_tracked_independently() {
        let code = r#"
function f() {
    inner: while (cond()) {
        break inner;
    }
}
dead: while (cond()) {
    spin();
}
"#;
        let diagnostics = run_rule(code);
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].message.contains("dead"));
    }

    #[test]
    fn labeled_block_statement_used_no_warning() {
        let code = r#"
checks: {
    if (bad()) {
        break checks;
    }
    finish();
}
"#;
        assert!(run_rule(code).is_empty());
    }

    #[test]
    fn metadata_is_correct() {
        let rule = NoUnusedLabels::new();
        let metadata = rule.metadata();
        assert_eq!(metadata.id, "F002");
        assert_eq!(metadata.name, "no-unused-labels");
    }
}
