//! Review orchestration for the `judge` tool.
//!
//! A [`Session`] owns the conversation history and drives one round at a time:
//! the coordinator model reasons over the history and may request actions,
//! the [`ActionRegistry`] executes them against a sandboxed
//! [`RepositoryAccessor`] or a [`Specialist`], and the observations flow back
//! until the coordinator answers without requesting anything.

pub mod actions;
pub mod config;
pub mod errors;
pub mod events;
pub mod history;
pub mod profiles;
pub mod prompts;
pub mod repository;
pub mod session;
pub mod specialist;

#[cfg(test)]
mod testing;

pub use actions::*;
pub use config::*;
pub use errors::*;
pub use events::*;
pub use history::*;
pub use profiles::*;
pub use prompts::*;
pub use repository::*;
pub use session::*;
pub use specialist::*;
