//! services/api/src/adapters/model_llm.rs
//!
//! This module contains the adapter for the hosted generative model.
//! It implements the `GenerativeModel` port from the `core` crate using an
//! OpenAI-compatible chat completions endpoint.

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestMessageContentPartImageArgs,
        ChatCompletionRequestMessageContentPartTextArgs, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, ChatCompletionRequestUserMessageContent,
        ChatCompletionRequestUserMessageContentPart, CreateChatCompletionRequestArgs, ImageUrlArgs,
        ResponseFormat,
    },
    Client,
};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use medscan_core::domain::InlineImage;
use medscan_core::ports::{GenerativeModel, ModelRequest, PortError, PortResult};
use tracing::{debug, error};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `GenerativeModel` using an OpenAI-compatible LLM.
#[derive(Clone)]
pub struct OpenAiModelAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiModelAdapter {
    /// Creates a new `OpenAiModelAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }

    /// The schema travels inside the system message; the endpoint itself is only
    /// told to answer with a JSON object.
    fn system_text(request: &ModelRequest) -> String {
        match &request.response_schema {
            Some(schema) => format!(
                "{}\n\nRespond ONLY with a JSON value that conforms to this JSON schema:\n{}",
                request.system_instruction, schema
            ),
            None => request.system_instruction.clone(),
        }
    }

    fn user_content(
        prompt: &str,
        image: Option<&InlineImage>,
    ) -> PortResult<ChatCompletionRequestUserMessageContent> {
        let Some(image) = image else {
            return Ok(ChatCompletionRequestUserMessageContent::Text(prompt.to_string()));
        };

        let text_part = ChatCompletionRequestMessageContentPartTextArgs::default()
            .text(prompt)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        let data_url = format!("data:{};base64,{}", image.mime_type, STANDARD.encode(&image.data));
        let image_part = ChatCompletionRequestMessageContentPartImageArgs::default()
            .image_url(
                ImageUrlArgs::default()
                    .url(data_url)
                    .build()
                    .map_err(|e| PortError::Unexpected(e.to_string()))?,
            )
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        Ok(ChatCompletionRequestUserMessageContent::Array(vec![
            ChatCompletionRequestUserMessageContentPart::Text(text_part),
            ChatCompletionRequestUserMessageContentPart::ImageUrl(image_part),
        ]))
    }
}

/// Authentication and permission failures are reported separately so callers can
/// tell a misconfigured key apart from an outage.
fn map_openai_error(e: OpenAIError) -> PortError {
    let message = e.to_string();
    let lowered = message.to_lowercase();
    if lowered.contains("403")
        || lowered.contains("401")
        || lowered.contains("invalid_api_key")
        || lowered.contains("permission")
    {
        PortError::AccessDenied(message)
    } else {
        PortError::Unexpected(message)
    }
}

//=========================================================================================
// `GenerativeModel` Trait Implementation
//=========================================================================================

#[async_trait]
impl GenerativeModel for OpenAiModelAdapter {
    async fn generate(&self, request: ModelRequest) -> PortResult<String> {
        let messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(Self::system_text(&request))
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(Self::user_content(&request.prompt, request.image.as_ref())?)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
        ];

        let mut builder = CreateChatCompletionRequestArgs::default();
        builder
            .model(&self.model)
            .messages(messages)
            .temperature(request.temperature)
            .n(1);
        if request.response_schema.is_some() {
            builder.response_format(ResponseFormat::JsonObject);
        }
        let completion_request = builder
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        debug!(
            "Sending model request (model: {}, image: {}, structured: {})",
            self.model,
            request.image.is_some(),
            request.response_schema.is_some()
        );

        let response = self
            .client
            .chat()
            .create(completion_request)
            .await
            .map_err(|e| {
                error!("Model request failed: {}", e);
                map_openai_error(e)
            })?;

        // Extract the text content from the first choice in the response.
        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| PortError::Unexpected("Model returned an empty response.".to_string()))
    }
}
