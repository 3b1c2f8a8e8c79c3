//! Scripted provider for tests.
//!
//! Enabled inside this crate's tests and, for downstream crates, through the
//! `test-util` feature.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::ProviderError;
use crate::message::{Message, Role};
use crate::provider::{Provider, ProviderRequest, ProviderResponse, Usage};

type Reply = Result<String, ProviderError>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// What a [`ScriptedProvider`] was asked.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub model: String,
    pub system: Vec<String>,
    pub user: String,
    pub max_tokens: Option<u32>,
    pub temperature: f32,
}

/// A provider that returns scripted replies and records every request.
///
/// Replies scripted for a specific model are used first; everything else
/// comes from the shared queue in order. An exhausted script answers with
/// [`ProviderError::NotConfigured`] so a test fails instead of hanging.
#[derive(Default)]
pub struct ScriptedProvider {
    shared: Mutex<VecDeque<Reply>>,
    per_model: Mutex<HashMap<String, VecDeque<Reply>>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl ScriptedProvider {
    /// Replies returned in order, whatever model is asked.
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            shared: Mutex::new(replies.into_iter().map(|r| Ok(r.into())).collect()),
            ..Self::default()
        }
    }

    /// Queue replies for one model.
    pub fn with_model<I, S>(self, model: &str, replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        lock(&self.per_model)
            .entry(model.to_string())
            .or_default()
            .extend(replies.into_iter().map(|r| Ok(r.into())));
        self
    }

    /// Append an error to the shared queue.
    pub fn then_fail(self, error: ProviderError) -> Self {
        lock(&self.shared).push_back(Err(error));
        self
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        lock(&self.requests).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.requests).len()
    }

    pub fn models_called(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.model).collect()
    }

    fn next_reply(&self, model: &str) -> Reply {
        if let Some(queue) = lock(&self.per_model).get_mut(model) {
            if let Some(reply) = queue.pop_front() {
                return reply;
            }
        }
        lock(&self.shared).pop_front().unwrap_or_else(|| {
            Err(ProviderError::NotConfigured(format!(
                "script exhausted (model {model})"
            )))
        })
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let system = request
            .messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.clone())
            .collect();
        let user = request
            .messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.clone())
            .unwrap_or_default();

        lock(&self.requests).push(RecordedRequest {
            model: request.model.clone(),
            system,
            user,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        });

        let text = self.next_reply(&request.model)?;
        Ok(ProviderResponse {
            message: Message::assistant(text),
            usage: Some(Usage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            }),
            model: request.model,
        })
    }
}
