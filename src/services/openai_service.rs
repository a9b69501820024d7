//! OpenAI 兼容生成服务 - 业务能力层
//!
//! ## 技术栈
//! - 使用 `async-openai` crate 进行 API 调用
//! - 支持自定义 API 端点和模型
//! - 兼容 OpenAI API 的服务（如 Azure, Gemini OpenAI 兼容端点, vLLM 等）
//!
//! 图片附件以 base64 data URL 形式放进用户消息。

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestMessageContentPartImage,
        ChatCompletionRequestMessageContentPartText, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, ChatCompletionRequestUserMessageContent,
        ChatCompletionRequestUserMessageContentPart, CreateChatCompletionRequestArgs, ImageDetail,
        ImageUrl,
    },
    Client,
};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::ServiceError;
use crate::models::usage::TokenUsage;
use crate::services::generation::{Attachment, Generation, GenerationRequest, Generator};

/// OpenAI 兼容生成服务
pub struct OpenAiGenerator {
    client: Client<OpenAIConfig>,
    model_name: String,
    temperature: Option<f32>,
    max_output_tokens: Option<u32>,
}

impl OpenAiGenerator {
    /// 创建新的生成服务
    pub fn new(config: &Config, model: &str) -> Self {
        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.llm_api_key)
            .with_api_base(&config.llm_api_base_url);

        Self {
            client: Client::with_config(openai_config),
            model_name: model.to_string(),
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
        }
    }

    fn build_messages(
        &self,
        request: &GenerationRequest,
    ) -> Result<Vec<ChatCompletionRequestMessage>, ServiceError> {
        let mut messages = Vec::new();

        if let Some(system) = &request.system {
            let system_msg = ChatCompletionRequestSystemMessageArgs::default()
                .content(system.as_str())
                .build()
                .map_err(|e| ServiceError::request_failed(&self.model_name, e))?;
            messages.push(ChatCompletionRequestMessage::System(system_msg));
        }

        let built = if request.attachments.is_empty() {
            ChatCompletionRequestUserMessageArgs::default()
                .content(request.prompt.as_str())
                .build()
        } else {
            // 使用 Vision API：先放图片，再放文本
            let mut content_parts = Vec::with_capacity(request.attachments.len() + 1);
            for attachment in &request.attachments {
                content_parts.push(ChatCompletionRequestUserMessageContentPart::ImageUrl(
                    ChatCompletionRequestMessageContentPartImage {
                        image_url: ImageUrl {
                            url: self.data_url(attachment)?,
                            detail: Some(ImageDetail::Auto),
                        },
                    },
                ));
            }
            content_parts.push(ChatCompletionRequestUserMessageContentPart::Text(
                ChatCompletionRequestMessageContentPartText {
                    text: request.prompt.clone(),
                },
            ));

            ChatCompletionRequestUserMessageArgs::default()
                .content(ChatCompletionRequestUserMessageContent::Array(
                    content_parts,
                ))
                .build()
        };
        let user_msg = built.map_err(|e| ServiceError::request_failed(&self.model_name, e))?;

        messages.push(ChatCompletionRequestMessage::User(user_msg));
        Ok(messages)
    }

    /// 图片转成 data URL；聊天接口不接受其他二进制类型
    fn data_url(&self, attachment: &Attachment) -> Result<String, ServiceError> {
        if !attachment.is_image() {
            return Err(ServiceError::UnsupportedInput {
                model: self.model_name.clone(),
                mime_type: attachment.mime_type.clone(),
            });
        }
        Ok(format!(
            "data:{};base64,{}",
            attachment.mime_type,
            STANDARD.encode(&attachment.data)
        ))
    }
}

#[async_trait]
impl Generator for OpenAiGenerator {
    fn model(&self) -> &str {
        &self.model_name
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<Generation, ServiceError> {
        debug!("调用 LLM API，模型: {}", self.model_name);
        debug!("用户消息长度: {} 字符", request.prompt.len());
        if !request.attachments.is_empty() {
            debug!("包含 {} 个附件", request.attachments.len());
        }

        let messages = self.build_messages(request)?;

        // 构建请求
        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(&self.model_name).messages(messages);
        if let Some(temperature) = self.temperature {
            args.temperature(temperature);
        }
        if let Some(max_tokens) = self.max_output_tokens {
            args.max_tokens(max_tokens);
        }
        let chat_request = args
            .build()
            .map_err(|e| ServiceError::request_failed(&self.model_name, e))?;

        // 调用 API
        let response = self
            .client
            .chat()
            .create(chat_request)
            .await
            .map_err(|e| {
                warn!("LLM API 调用失败: {}", e);
                ServiceError::request_failed(&self.model_name, e)
            })?;

        debug!("LLM API 调用成功");

        let choice = response
            .choices
            .first()
            .ok_or_else(|| ServiceError::EmptyResponse {
                model: self.model_name.clone(),
            })?;

        let text = choice
            .message
            .content
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .ok_or_else(|| ServiceError::EmptyContent {
                model: self.model_name.clone(),
            })?
            .to_string();

        let usage = response.usage.ok_or_else(|| ServiceError::MissingField {
            model: self.model_name.clone(),
            field: "usage",
        })?;
        let reasoning_tokens = usage
            .completion_tokens_details
            .and_then(|details| details.reasoning_tokens)
            .unwrap_or(0);

        Ok(Generation {
            text,
            usage: TokenUsage {
                input_tokens: u64::from(usage.prompt_tokens),
                output_tokens: u64::from(usage.completion_tokens),
                total_tokens: u64::from(usage.total_tokens),
                reasoning_tokens: u64::from(reasoning_tokens),
            },
        })
    }
}
