//! 生成能力抽象 - 业务能力层
//!
//! 只负责"一次请求换一段文本和用量"，不关心条目、检查点和流程。

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{Config, Provider};
use crate::error::ServiceError;
use crate::models::usage::TokenUsage;
use crate::services::gemini_service::GeminiGenerator;
use crate::services::openai_service::OpenAiGenerator;

/// 随请求发送的二进制附件（图片页 / PDF）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl Attachment {
    pub fn new(mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data,
        }
    }

    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }
}

/// 一次生成请求
#[derive(Debug, Clone, Default)]
pub struct GenerationRequest {
    pub system: Option<String>,
    pub prompt: String,
    /// 附件排在提示词之前发送
    pub attachments: Vec<Attachment>,
}

impl GenerationRequest {
    pub fn text(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Self::default()
        }
    }

    pub fn with_attachments(mut self, attachments: Vec<Attachment>) -> Self {
        self.attachments = attachments;
        self
    }
}

/// 一次生成的结果
#[derive(Debug, Clone, PartialEq)]
pub struct Generation {
    pub text: String,
    pub usage: TokenUsage,
}

/// 生成服务
///
/// 内部可以重试，对调用方来说仍是一次调用：要么返回非空文本和用量，要么返回错误。
#[async_trait]
pub trait Generator: Send + Sync {
    /// 模型名，用于日志
    fn model(&self) -> &str;

    async fn generate(&self, request: &GenerationRequest) -> Result<Generation, ServiceError>;
}

/// 按配置创建生成服务
///
/// # 参数
/// - `config`: 程序配置，决定 provider、端点和密钥
/// - `model`: 使用的模型名（生成和评测可以不同）
pub fn build_generator(config: &Config, model: &str) -> Arc<dyn Generator> {
    match config.provider {
        Provider::OpenAi => Arc::new(OpenAiGenerator::new(config, model)),
        Provider::Gemini => Arc::new(GeminiGenerator::new(config, model)),
    }
}
