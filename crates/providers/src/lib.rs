//! LLM provider implementations for thinkloop.
//!
//! All providers implement [`thinkloop_core::LlmClient`]. The router picks
//! the client for each request from the configured model table.

pub mod openai_compat;
pub mod router;

pub use openai_compat::OpenAiCompatProvider;
pub use router::{ModelRouter, build_from_config};
