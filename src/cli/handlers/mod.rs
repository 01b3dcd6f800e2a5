//! CLI command handlers module
//!
//! This module is organized by functional domains:
//! - ask: Single questions and interactive chat
//! - index: Embedding cache rebuilds and document listing
//! - info: Information display (config)

pub mod ask;
pub mod index;
pub mod info;

// Re-export all public handlers
pub use ask::*;
pub use index::*;
pub use info::*;
