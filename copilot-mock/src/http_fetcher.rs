//! A scriptable [`HttpFetcher`], keyed by URL substring so a test can script
//! one behavior per upstream endpoint without hand-rolling a new type per
//! test module.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use copilot_core::{CopilotError, FetchOptions, HttpFetcher};
use serde_json::Value;

use crate::MockBehavior;

#[derive(Debug, Clone)]
enum Payload {
    Json(Value),
    Text(String),
}

#[derive(Default)]
struct State {
    queues: HashMap<String, VecDeque<MockBehavior<Payload, CopilotError>>>,
}

/// An [`HttpFetcher`] whose responses are scripted, per matching URL
/// substring, through a paired [`MockHttpFetcherController`].
pub struct MockHttpFetcher {
    state: Arc<Mutex<State>>,
}

/// Handle used to script [`MockHttpFetcher`] responses after construction.
#[derive(Clone)]
pub struct MockHttpFetcherController {
    state: Arc<Mutex<State>>,
}

impl MockHttpFetcher {
    /// Build a fetcher with no scripted responses yet, plus its controller.
    #[must_use]
    pub fn new_with_controller() -> (Self, MockHttpFetcherController) {
        let state = Arc::new(Mutex::new(State::default()));
        (
            Self {
                state: Arc::clone(&state),
            },
            MockHttpFetcherController { state },
        )
    }

    fn next_behavior(&self, url: &str) -> MockBehavior<Payload, CopilotError> {
        let mut state = self.state.lock().unwrap();
        let key = state
            .queues
            .keys()
            .find(|k| url.contains(k.as_str()))
            .cloned()
            .unwrap_or_else(|| panic!("no scripted http response registered matching url: {url}"));
        state
            .queues
            .get_mut(&key)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| panic!("scripted responses for `{key}` exhausted (url: {url})"))
    }
}

impl MockHttpFetcherController {
    /// Queue a JSON response for the next call to a URL containing `matching`.
    pub fn push_json(&self, matching: impl Into<String>, behavior: MockBehavior<Value, CopilotError>) {
        self.push(matching, map_behavior(behavior, Payload::Json));
    }

    /// Queue a text response for the next call to a URL containing `matching`.
    pub fn push_text(&self, matching: impl Into<String>, behavior: MockBehavior<String, CopilotError>) {
        self.push(matching, map_behavior(behavior, Payload::Text));
    }

    fn push(&self, matching: impl Into<String>, behavior: MockBehavior<Payload, CopilotError>) {
        self.state
            .lock()
            .unwrap()
            .queues
            .entry(matching.into())
            .or_default()
            .push_back(behavior);
    }
}

fn map_behavior<T, U>(behavior: MockBehavior<T, CopilotError>, wrap: impl FnOnce(T) -> U) -> MockBehavior<U, CopilotError> {
    match behavior {
        MockBehavior::Return(v) => MockBehavior::Return(wrap(v)),
        MockBehavior::Fail(e) => MockBehavior::Fail(e),
        MockBehavior::Hang => MockBehavior::Hang,
    }
}

#[async_trait]
impl HttpFetcher for MockHttpFetcher {
    async fn fetch_json(&self, url: &str, _opts: FetchOptions) -> Result<Value, CopilotError> {
        match self.next_behavior(url) {
            MockBehavior::Return(Payload::Json(v)) => Ok(v),
            MockBehavior::Return(Payload::Text(_)) => {
                panic!("scripted a text response for a JSON fetch: {url}")
            }
            MockBehavior::Fail(err) => Err(err),
            MockBehavior::Hang => std::future::pending::<Result<Value, CopilotError>>().await,
        }
    }

    async fn fetch_text(&self, url: &str, _opts: FetchOptions) -> Result<String, CopilotError> {
        match self.next_behavior(url) {
            MockBehavior::Return(Payload::Text(s)) => Ok(s),
            MockBehavior::Return(Payload::Json(v)) => Ok(v.to_string()),
            MockBehavior::Fail(err) => Err(err),
            MockBehavior::Hang => std::future::pending::<Result<String, CopilotError>>().await,
        }
    }
}
