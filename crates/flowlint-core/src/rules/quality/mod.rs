//! Code quality rules.

pub mod no_unused_labels;

pub use no_unused_labels::NoUnusedLabels;
