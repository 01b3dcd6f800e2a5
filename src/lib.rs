pub mod cli;
pub mod config;
pub mod embeddings;
pub mod errors;
pub mod llm;
pub mod logging;
pub mod models;
pub mod rag;
pub mod session;
pub mod store;

pub use config::AppConfig;
pub use errors::*;
