//! Flowlint core: control flow analysis for JavaScript and TypeScript
//!
//! Parses source files with swc, builds a per-function control flow
//! graph, and runs flow-backed lint rules over the result.

pub mod analysis;
pub mod config;
pub mod diagnostic;
pub mod flow;
pub mod parser;
pub mod rules;
pub mod semantic;

pub use analysis::AnalysisEngine;
pub use config::{CONFIG_FILENAME, Config, ConfigError, RulesConfig};
pub use diagnostic::Diagnostic;
pub use flow::{CfgBuilder, FlowError, FlowModel};
pub use parser::ParsedFile;
pub use rules::{Rule, RuleMetadata, RuleRegistry, Severity};
pub use semantic::{ScopeBuilder, SemanticModel};
