//! Model access for Replyline.
//!
//! The OpenAI-compatible HTTP provider implements `replyline_core::Provider`;
//! the retry wrapper adds bounded backoff; [`ModelClient`] is what the stage
//! agents call.

pub mod client;
pub mod openai_compat;
pub mod retry;

pub use client::{Completion, ModelClient};
pub use openai_compat::OpenAiCompatProvider;
pub use retry::{RetryConfig, RetryProvider};
