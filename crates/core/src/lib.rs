//! # Replyline Core
//!
//! Domain types, traits, and error definitions for the Replyline
//! customer-service pipeline. This crate has **no framework dependencies**:
//! it defines the domain model that the provider, agent, pipeline and
//! gateway crates implement against.
//!
//! ## Design Philosophy
//!
//! The model backend is a trait ([`Provider`]) defined here, so every stage
//! agent can be exercised against a scripted provider in tests and against
//! the hosted endpoint in production.

pub mod customer;
pub mod error;
pub mod event;
pub mod message;
pub mod provider;
pub mod run;
#[cfg(any(test, feature = "test-util"))]
pub mod testing;
pub mod verdict;

// Re-export key types at crate root for ergonomics
pub use customer::CustomerMessage;
pub use error::{Error, ProviderError, Result, ReviewError};
pub use event::{DomainEvent, EventBus};
pub use message::{Message, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, Usage};
pub use run::{PipelineRun, ReviewRecord, RunId, RunStatus, StageName, StageRecord};
pub use verdict::{SafetyCategory, SafetyResult, ToneIssue, ToneResult};
