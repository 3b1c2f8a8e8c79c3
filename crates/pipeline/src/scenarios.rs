//! Built-in demo scenarios, from a routine enquiry to an abusive customer.

use replyline_core::customer::CustomerMessage;
use serde::Serialize;

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Scenario {
    pub name: &'static str,
    pub description: &'static str,
    pub text: &'static str,
}

impl Scenario {
    pub fn message(&self) -> CustomerMessage {
        CustomerMessage::new(self.text)
    }
}

pub const SCENARIOS: [Scenario; 5] = [
    Scenario {
        name: "late_delivery",
        description: "Polite order status enquiry",
        text: "My order was supposed to arrive yesterday but I haven't received anything. Can you check the status?",
    },
    Scenario {
        name: "repeat_contact",
        description: "Frustrated repeat contact about a damaged item",
        text: "This is the third time I'm contacting you about my damaged dining table. When will this be resolved?",
    },
    Scenario {
        name: "abusive_delivery_complaint",
        description: "Insults aimed at delivery staff",
        text: "This is absolutely ridiculous! Your delivery team are complete idiots who damaged my wall and now you're ignoring me. Fix this NOW or I'm never shopping here again!",
    },
    Scenario {
        name: "hostile_service_complaint",
        description: "Hostile complaint about customer service",
        text: "What the heck is wrong with your company?! This whole experience has been a complete disaster and I'm sick of being redirected by your useless customer service!",
    },
    Scenario {
        name: "refund_threat",
        description: "Refund demand with a public shaming threat",
        text: "I don't care about your policies. I want a full refund immediately and I expect you to pay for my time wasted dealing with this garbage. Make it happen or I'll blast you on social media.",
    },
];

/// Scenario by zero-based index.
pub fn scenario(index: usize) -> Option<&'static Scenario> {
    SCENARIOS.get(index)
}
