//! Unbeam REPL - Interactive command-line inspector for compiled BEAM
//! modules
//!
//! This crate provides the interactive session around `unbeam-core`:
//! dot-command parsing, module loading, and output notification plumbing.

pub mod repl;

// Re-export commonly used types for convenience
pub use repl::{DefaultNotifier, Repl, ReplCommand, ReplNotifier};
