//! Correctness rules backed by flow analysis.

pub mod no_unreachable;

pub use no_unreachable::NoUnreachable;
