//! A scriptable [`LlmProvider`], for exercising the LLM Invocation Layer's
//! fallback chain and caching without a real OpenAI/OpenRouter backend.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use copilot_core::CopilotError;
use copilot_providers::{ChatMessage, LlmProvider};
use copilot_types::LlmProviderTag;
use serde_json::Value;

use crate::MockBehavior;

struct State {
    queue: VecDeque<MockBehavior<Value, CopilotError>>,
    calls: Vec<Vec<ChatMessage>>,
}

/// An [`LlmProvider`] whose completions are scripted, in call order, through
/// a paired [`MockLlmProviderController`]. Every call's messages are recorded
/// so a test can assert on what prompt/schema the orchestrator actually sent.
pub struct MockLlmProvider {
    tag: LlmProviderTag,
    state: Arc<Mutex<State>>,
}

/// Handle used to script [`MockLlmProvider`] completions and inspect call history.
#[derive(Clone)]
pub struct MockLlmProviderController {
    state: Arc<Mutex<State>>,
}

impl MockLlmProvider {
    /// Build a provider tagged `tag`, with no scripted completions yet.
    #[must_use]
    pub fn new_with_controller(tag: LlmProviderTag) -> (Self, MockLlmProviderController) {
        let state = Arc::new(Mutex::new(State {
            queue: VecDeque::new(),
            calls: Vec::new(),
        }));
        (
            Self {
                tag,
                state: Arc::clone(&state),
            },
            MockLlmProviderController { state },
        )
    }
}

impl MockLlmProviderController {
    /// Queue the next call's outcome.
    pub fn push(&self, behavior: MockBehavior<Value, CopilotError>) {
        self.state.lock().unwrap().queue.push_back(behavior);
    }

    /// The messages sent on every call so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<Vec<ChatMessage>> {
        self.state.lock().unwrap().calls.clone()
    }

    /// How many times `complete` has been called.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.state.lock().unwrap().calls.len()
    }
}

#[async_trait]
impl LlmProvider for MockLlmProvider {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        _schema: Option<&Value>,
    ) -> Result<Value, CopilotError> {
        let behavior = {
            let mut state = self.state.lock().unwrap();
            state.calls.push(messages.to_vec());
            state
                .queue
                .pop_front()
                .unwrap_or_else(|| panic!("mock LLM provider has no scripted completions left"))
        };
        match behavior {
            MockBehavior::Return(v) => Ok(v),
            MockBehavior::Fail(err) => Err(err),
            MockBehavior::Hang => std::future::pending::<Result<Value, CopilotError>>().await,
        }
    }

    fn tag(&self) -> LlmProviderTag {
        self.tag
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn scripted_completions_are_returned_in_order() {
        let (provider, controller) = MockLlmProvider::new_with_controller(LlmProviderTag::OpenAi);
        controller.push(MockBehavior::Return(json!({"price": 1.0})));
        controller.push(MockBehavior::Fail(CopilotError::Timeout { provider: "openai" }));

        let messages = [ChatMessage::new("user", "hello")];
        let first = provider.complete(&messages, None).await.unwrap();
        assert_eq!(first, json!({"price": 1.0}));

        let second = provider.complete(&messages, None).await.unwrap_err();
        assert!(matches!(second, CopilotError::Timeout { .. }));

        assert_eq!(controller.call_count(), 2);
    }
}
