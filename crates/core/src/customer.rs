//! The customer message that enters the pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Free-text input from a customer plus optional identifiers.
///
/// Immutable once built: fields are private and only the builder-style
/// `with_*` methods (which consume `self`) can set them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerMessage {
    text: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    customer_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    order_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    urgency: Option<String>,

    received_at: DateTime<Utc>,
}

impl CustomerMessage {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            customer_id: None,
            order_id: None,
            urgency: None,
            received_at: Utc::now(),
        }
    }

    pub fn with_customer_id(mut self, id: impl Into<String>) -> Self {
        self.customer_id = Some(id.into());
        self
    }

    pub fn with_order_id(mut self, id: impl Into<String>) -> Self {
        self.order_id = Some(id.into());
        self
    }

    pub fn with_urgency(mut self, urgency: impl Into<String>) -> Self {
        self.urgency = Some(urgency.into());
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn customer_id(&self) -> Option<&str> {
        self.customer_id.as_deref()
    }

    pub fn order_id(&self) -> Option<&str> {
        self.order_id.as_deref()
    }

    pub fn urgency(&self) -> Option<&str> {
        self.urgency.as_deref()
    }

    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }

    /// Context line for the response prompt, e.g.
    /// `Customer ID: c-1 | Order ID: o-9`. `None` when nothing is known.
    pub fn context_line(&self) -> Option<String> {
        let parts: Vec<String> = [
            self.customer_id.as_ref().map(|v| format!("Customer ID: {v}")),
            self.order_id.as_ref().map(|v| format!("Order ID: {v}")),
            self.urgency.as_ref().map(|v| format!("Urgency level: {v}")),
        ]
        .into_iter()
        .flatten()
        .collect();

        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" | "))
        }
    }

    /// First `max_chars` characters, for log lines and event previews.
    pub fn preview(&self, max_chars: usize) -> String {
        let mut preview: String = self.text.chars().take(max_chars).collect();
        if self.text.chars().count() > max_chars {
            preview.push_str("...");
        }
        preview
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_line_joins_known_fields() {
        let msg = CustomerMessage::new("Where is my table?")
            .with_customer_id("c-17")
            .with_urgency("high");
        assert_eq!(
            msg.context_line().as_deref(),
            Some("Customer ID: c-17 | Urgency level: high")
        );
    }

    #[test]
    fn no_context_without_identifiers() {
        assert!(CustomerMessage::new("hi").context_line().is_none());
    }

    #[test]
    fn preview_truncates_on_char_boundary() {
        let msg = CustomerMessage::new("héllo wörld");
        assert_eq!(msg.preview(5), "héllo...");
        assert_eq!(msg.preview(50), "héllo wörld");
    }
}
