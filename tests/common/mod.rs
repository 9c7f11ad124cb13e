//! Scripted model and host fakes shared by the contract tests.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use concierge_core::{
    CapabilityHost, GenerationRequest, GenerationResponse, ModelClient, ModelError,
};

/// Replays queued responses in order and records every request.
#[derive(Default)]
pub struct ScriptedModel {
    responses: Mutex<VecDeque<Result<GenerationResponse, ModelError>>>,
    pub requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, text: &str) -> Self {
        self.responses
            .lock()
            .unwrap()
            .push_back(Ok(GenerationResponse::text(text)));
        self
    }

    pub fn reply_with(self, response: GenerationResponse) -> Self {
        self.responses.lock().unwrap().push_back(Ok(response));
        self
    }

    pub fn fail(self, status: u16, body: &str) -> Self {
        self.responses.lock().unwrap().push_back(Err(ModelError::Server {
            status,
            body: body.to_string(),
        }));
        self
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn last_prompt(&self) -> String {
        self.requests
            .lock()
            .unwrap()
            .last()
            .map(|r| r.prompt_text())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ModelClient for ScriptedModel {
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResponse, ModelError> {
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(ModelError::EmptyResponse))
    }
}

/// Host whose selection flow always ends with a capability selected.
pub struct SelectingHost {
    pub selected: AtomicBool,
    pub prompts: AtomicUsize,
}

impl SelectingHost {
    pub fn unselected() -> Self {
        Self {
            selected: AtomicBool::new(false),
            prompts: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl CapabilityHost for SelectingHost {
    async fn has_selected_capability(&self) -> bool {
        self.selected.load(Ordering::SeqCst)
    }

    async fn select_capability(&self) {
        self.prompts.fetch_add(1, Ordering::SeqCst);
        self.selected.store(true, Ordering::SeqCst);
    }
}
