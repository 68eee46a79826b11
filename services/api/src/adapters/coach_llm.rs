//! services/api/src/adapters/coach_llm.rs
//!
//! This module contains the adapter for the coaching LLM. It implements the
//! `CoachModelService` port from the `core` crate against any
//! OpenAI-compatible chat completion endpoint.

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequest,
        CreateChatCompletionRequestArgs, StopConfiguration as Stop,
    },
    Client,
};
use async_trait::async_trait;
use futures::StreamExt;

use minimalism_coach_core::coaching::GenerationSettings;
use minimalism_coach_core::ports::{ChunkStream, CoachModelService, PortError, PortResult};

/// Sequences that end generation before the model starts impersonating the
/// other side of the conversation.
const STOP_SEQUENCES: &[&str] = &[
    "\n\nHuman:",
    "\nUser:",
    "\nCoach:",
    "Human:",
    "User:",
    "Coach:",
];

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `CoachModelService` using an OpenAI-compatible LLM.
#[derive(Clone)]
pub struct OpenAiCoachAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiCoachAdapter {
    /// Creates a new `OpenAiCoachAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }

    fn build_request(
        &self,
        prompt: &str,
        settings: &GenerationSettings,
        stream: bool,
    ) -> Result<CreateChatCompletionRequest, OpenAIError> {
        let message = ChatCompletionRequestUserMessageArgs::default()
            .content(prompt)
            .build()?;

        CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages([message.into()])
            .temperature(settings.temperature)
            .top_p(settings.top_p)
            .max_tokens(settings.max_tokens)
            .stop(Stop::StringArray(
                STOP_SEQUENCES.iter().map(|s| s.to_string()).collect(),
            ))
            .stream(stream)
            .build()
    }
}

//=========================================================================================
// `CoachModelService` Trait Implementation
//=========================================================================================

#[async_trait]
impl CoachModelService for OpenAiCoachAdapter {
    /// Generates a full coaching reply for the given prompt.
    async fn complete(&self, prompt: &str, settings: &GenerationSettings) -> PortResult<String> {
        let request = self
            .build_request(prompt, settings, false)
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e: OpenAIError| PortError::Unexpected(e.to_string()))?;

        let text = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .unwrap_or_default();

        Ok(text.trim().to_string())
    }

    /// Generates a coaching reply as a stream of text chunks. Dropping the
    /// returned stream abandons the request.
    async fn complete_streaming(
        &self,
        prompt: &str,
        settings: &GenerationSettings,
    ) -> PortResult<ChunkStream> {
        let request = self
            .build_request(prompt, settings, true)
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let mut upstream = self
            .client
            .chat()
            .create_stream(request)
            .await
            .map_err(|e: OpenAIError| PortError::Unexpected(e.to_string()))?;

        let chunks = async_stream::stream! {
            while let Some(result) = upstream.next().await {
                match result {
                    Ok(response) => {
                        let content = response
                            .choices
                            .first()
                            .and_then(|choice| choice.delta.content.clone());
                        if let Some(content) = content {
                            if !content.is_empty() {
                                yield Ok(content);
                            }
                        }
                    }
                    Err(e) => {
                        yield Err(PortError::Unexpected(e.to_string()));
                        break;
                    }
                }
            }
        };

        Ok(Box::pin(chunks))
    }
}
