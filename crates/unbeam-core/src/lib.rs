//! # Unbeam Core
//!
//! Core implementation of BEAM file inspection and Elixir decompilation,
//! including:
//! - Quoted-form tree model and traversal
//! - Lowering-reversal rewrite rules for compiler-emitted debug info
//! - Precedence-aware source printer
//! - BEAM container, external-term, and Code chunk decoders
//! - Whole-module reconstruction from `Dbgi` debug info
//!
//! This crate provides the foundational components that can be used to build
//! various inspection interfaces (REPL, batch decompiler, embedded tooling).

#![warn(clippy::all)]

pub mod beam;
pub mod debug_info;
pub mod decompiler;
pub mod render;
pub mod rewrite;
pub mod term;

// Re-export commonly used types
pub use beam::{BeamFile, DecodeError};
pub use debug_info::{Clause, DebugInfo, DebugInfoError, DefKind, Definition};
pub use decompiler::{decompile, decompile_debug_info};
pub use render::{render, RenderError};
pub use rewrite::{deinline, rewrite_guard};
pub use term::{
    traverse::{prewalk, traverse, TraverseError},
    Args, Node, Term,
};

/// Unbeam version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize tracing for unbeam core components
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("unbeam_core=info".parse().unwrap()),
        )
        .init();
}

/// Error types for unbeam core operations
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// BEAM container, external-term, or Code chunk decoding error
    #[error("Decode error: {0}")]
    Decode(#[from] beam::DecodeError),

    /// Quoted-form rendering error
    #[error("Render error: {0}")]
    Render(#[from] render::RenderError),

    /// Debug-info envelope error
    #[error("Debug info error: {0}")]
    DebugInfo(#[from] debug_info::DebugInfoError),

    /// Tree traversal error
    #[error("Traversal error: {0}")]
    Traverse(#[from] term::traverse::TraverseError),
}

/// Result type for unbeam core operations
pub type Result<T> = std::result::Result<T, Error>;
