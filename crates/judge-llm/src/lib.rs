//! Provider-neutral model client used by the review agents.
//!
//! The crate exposes a small message model, a streaming event protocol, a
//! middleware-capable [`Client`] and HTTP adapters for OpenAI-compatible
//! (OpenAI, OpenRouter) and Anthropic endpoints.

pub mod client;
pub mod errors;
pub mod middleware;
pub mod provider;
pub mod providers;
pub mod stream;
pub mod types;
pub mod utils;

pub use client::*;
pub use errors::*;
pub use middleware::*;
pub use provider::*;
pub use providers::*;
pub use stream::*;
pub use types::*;
pub use utils::sse::{SseDecoder, SseEvent};
pub use utils::stream_accumulator::{ResponseSeed, StreamAccumulator};
