//! Text generation capability
//!
//! The pipeline treats the language model as an opaque `Generator`: a prompt
//! goes in, free text comes out, optionally with web-search grounding
//! citations when the request asks for the search tool.

pub mod client;
pub mod prompts;

use std::future::Future;
use std::sync::Arc;

pub use client::LlmService;

use crate::errors::Result;

/// One generation call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub prompt: String,
    /// Let the model use its web-search tool and report grounding sources
    pub web_search: bool,
}

impl GenerationRequest {
    pub fn internal(prompt: String) -> Self {
        Self {
            prompt,
            web_search: false,
        }
    }

    pub fn web_search(prompt: String) -> Self {
        Self {
            prompt,
            web_search: true,
        }
    }
}

/// A web page the model grounded its answer on
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroundingChunk {
    pub title: Option<String>,
    pub uri: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Generation {
    /// `None` when the model produced no text part
    pub text: Option<String>,
    pub grounding: Vec<GroundingChunk>,
}

impl Generation {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            grounding: Vec::new(),
        }
    }
}

/// Prompt to text capability
pub trait Generator: Send + Sync {
    fn generate(
        &self,
        request: &GenerationRequest,
    ) -> impl Future<Output = Result<Generation>> + Send;
}

impl<T: Generator> Generator for Arc<T> {
    fn generate(
        &self,
        request: &GenerationRequest,
    ) -> impl Future<Output = Result<Generation>> + Send {
        (**self).generate(request)
    }
}
