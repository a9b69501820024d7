//! Gemini 原生生成服务 - 业务能力层
//!
//! 直接调用 `models/{model}:generateContent` REST 接口（`reqwest`），
//! 附件以 `inlineData` 发送，支持 PNG / JPEG / PDF。
//! 429 和 5xx 会在内部按指数退避重试 `max_retries` 次。

use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::ServiceError;
use crate::models::usage::{GeminiUsage, TokenUsage};
use crate::services::generation::{Generation, GenerationRequest, Generator};

const RETRY_BASE_DELAY: Duration = Duration::from_secs(2);
const RETRY_MAX_DELAY: Duration = Duration::from_secs(60);

/// 第 `attempt` 次重试前的等待（从 0 开始），封顶 `RETRY_MAX_DELAY`
fn backoff_delay(attempt: u32) -> Duration {
    RETRY_BASE_DELAY
        .saturating_mul(2u32.saturating_pow(attempt))
        .min(RETRY_MAX_DELAY)
}

/// Gemini 生成服务
pub struct GeminiGenerator {
    http_client: reqwest::Client,
    api_key: String,
    base_url: String,
    model_name: String,
    generation_config: GenerationConfig,
    max_retries: u32,
}

// ========== 请求 / 响应结构 ==========

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "GenerationConfig::is_empty")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
    /// 思考内容，不计入回答
    #[serde(default, skip_serializing_if = "Option::is_none")]
    thought: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    thinking_config: Option<ThinkingConfig>,
}

impl GenerationConfig {
    fn is_empty(&self) -> bool {
        self.temperature.is_none()
            && self.max_output_tokens.is_none()
            && self.thinking_config.is_none()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct ThinkingConfig {
    thinking_budget: i32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<GeminiUsage>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

impl GeminiGenerator {
    /// 创建新的生成服务
    pub fn new(config: &Config, model: &str) -> Self {
        // 超时设置失败时退回默认客户端
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .unwrap_or_default();

        Self {
            http_client,
            api_key: config.gemini_api_key.clone(),
            base_url: config.gemini_api_base_url.trim_end_matches('/').to_string(),
            model_name: model.to_string(),
            generation_config: GenerationConfig {
                temperature: config.temperature,
                max_output_tokens: config.max_output_tokens,
                thinking_config: config.thinking_budget.map(|thinking_budget| ThinkingConfig {
                    thinking_budget,
                }),
            },
            max_retries: config.max_retries,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model_name)
    }

    fn build_request(&self, request: &GenerationRequest) -> GenerateContentRequest {
        let mut parts: Vec<Part> = request
            .attachments
            .iter()
            .map(|attachment| Part {
                inline_data: Some(InlineData {
                    mime_type: attachment.mime_type.clone(),
                    data: STANDARD.encode(&attachment.data),
                }),
                ..Part::default()
            })
            .collect();
        parts.push(Part {
            text: Some(request.prompt.clone()),
            ..Part::default()
        });

        GenerateContentRequest {
            system_instruction: request.system.as_ref().map(|system| Content {
                role: None,
                parts: vec![Part {
                    text: Some(system.clone()),
                    ..Part::default()
                }],
            }),
            contents: vec![Content {
                role: Some("user".to_string()),
                parts,
            }],
            generation_config: self.generation_config.clone(),
        }
    }

    /// 发送一次请求，成功时返回响应正文
    async fn send_once(&self, body: &GenerateContentRequest) -> Result<String, Attempt> {
        let response = self
            .http_client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                let retryable = e.is_timeout() || e.is_connect();
                Attempt {
                    retryable,
                    error: ServiceError::request_failed(&self.model_name, e),
                }
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| Attempt {
            retryable: true,
            error: ServiceError::request_failed(&self.model_name, e),
        })?;

        if !status.is_success() {
            return Err(Attempt {
                retryable: status.as_u16() == 429 || status.is_server_error(),
                error: ServiceError::BadStatus {
                    model: self.model_name.clone(),
                    status: status.as_u16(),
                    body: text,
                },
            });
        }

        Ok(text)
    }

    fn parse_response(&self, body: &str) -> Result<Generation, ServiceError> {
        let response: GenerateContentResponse = serde_json::from_str(body)
            .map_err(|e| ServiceError::request_failed(&self.model_name, e))?;

        let parts = response
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| content.parts)
            .filter(|parts| !parts.is_empty())
            .ok_or_else(|| ServiceError::EmptyResponse {
                model: self.model_name.clone(),
            })?;

        let text: String = parts
            .into_iter()
            .filter(|part| !part.thought.unwrap_or(false))
            .filter_map(|part| part.text)
            .collect();
        let text = text.trim();
        if text.is_empty() {
            return Err(ServiceError::EmptyContent {
                model: self.model_name.clone(),
            });
        }

        let usage = response
            .usage_metadata
            .ok_or_else(|| ServiceError::MissingField {
                model: self.model_name.clone(),
                field: "usageMetadata",
            })?;

        Ok(Generation {
            text: text.to_string(),
            usage: TokenUsage::from(usage),
        })
    }
}

/// 单次请求的失败结果
struct Attempt {
    retryable: bool,
    error: ServiceError,
}

#[async_trait]
impl Generator for GeminiGenerator {
    fn model(&self) -> &str {
        &self.model_name
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<Generation, ServiceError> {
        debug!(
            "调用 Gemini API，模型: {}，提示词 {} 字符，附件 {} 个",
            self.model_name,
            request.prompt.len(),
            request.attachments.len()
        );

        let body = self.build_request(request);
        let mut attempt = 0;

        loop {
            match self.send_once(&body).await {
                Ok(text) => return self.parse_response(&text),
                Err(Attempt { retryable, error }) if retryable && attempt < self.max_retries => {
                    let delay = backoff_delay(attempt);
                    attempt += 1;
                    warn!(
                        "Gemini API 调用失败，{:?} 后重试 ({}/{}): {}",
                        delay, attempt, self.max_retries, error
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(Attempt { error, .. }) => return Err(error),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::generation::Attachment;

    fn create_test_service() -> GeminiGenerator {
        let config = Config {
            gemini_api_key: "test-key".to_string(),
            ..Config::default()
        };
        GeminiGenerator::new(&config, "gemini-2.5-flash")
    }

    #[test]
    fn test_request_layout() {
        let service = create_test_service();
        let request = GenerationRequest::text("question?")
            .with_attachments(vec![Attachment::new("application/pdf", vec![1, 2, 3])]);

        let json = serde_json::to_value(service.build_request(&request)).unwrap();
        let parts = &json["contents"][0]["parts"];

        assert_eq!(json["contents"][0]["role"], "user");
        assert_eq!(parts[0]["inlineData"]["mimeType"], "application/pdf");
        assert_eq!(parts[0]["inlineData"]["data"], "AQID");
        assert_eq!(parts[1]["text"], "question?");
        assert_eq!(
            json["generationConfig"]["thinkingConfig"]["thinkingBudget"],
            -1
        );
        assert!(json.get("systemInstruction").is_none());
    }

    #[test]
    fn test_backoff_delay_is_capped() {
        assert_eq!(backoff_delay(0), Duration::from_secs(2));
        assert_eq!(backoff_delay(2), Duration::from_secs(8));
        assert_eq!(backoff_delay(5), RETRY_MAX_DELAY);
        // 指数远超 u32 范围时不溢出
        assert_eq!(backoff_delay(40), RETRY_MAX_DELAY);
        assert_eq!(backoff_delay(u32::MAX), RETRY_MAX_DELAY);
    }

    #[test]
    fn test_endpoint() {
        let service = create_test_service();
        assert_eq!(
            service.endpoint(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:generateContent"
        );
    }

    #[test]
    fn test_parse_skips_thought_parts() {
        let service = create_test_service();
        let generation = service
            .parse_response(
                r#"{
                    "candidates": [{"content": {"role": "model", "parts": [
                        {"text": "thinking...", "thought": true},
                        {"text": "You own 3 bikes."}
                    ]}}],
                    "usageMetadata": {"promptTokenCount": 100, "candidatesTokenCount": 5, "totalTokenCount": 150, "thoughtsTokenCount": 45}
                }"#,
            )
            .unwrap();

        assert_eq!(generation.text, "You own 3 bikes.");
        assert_eq!(generation.usage.input_tokens, 100);
        assert_eq!(generation.usage.output_tokens, 50);
        assert_eq!(generation.usage.reasoning_tokens, 45);
    }

    #[test]
    fn test_parse_rejects_incomplete_responses() {
        let service = create_test_service();

        let empty = service.parse_response(r#"{"candidates": []}"#);
        assert!(matches!(empty, Err(ServiceError::EmptyResponse { .. })));

        let blank = service.parse_response(
            r#"{"candidates": [{"content": {"parts": [{"text": "  "}]}}], "usageMetadata": {"promptTokenCount": 1, "totalTokenCount": 2}}"#,
        );
        assert!(matches!(blank, Err(ServiceError::EmptyContent { .. })));

        let no_usage =
            service.parse_response(r#"{"candidates": [{"content": {"parts": [{"text": "ok"}]}}]}"#);
        assert!(matches!(
            no_usage,
            Err(ServiceError::MissingField {
                field: "usageMetadata",
                ..
            })
        ));
    }

    #[tokio::test]
    #[ignore] // 需要 GEMINI_API_KEY，运行: cargo test -- --ignored
    async fn test_generate_live() {
        let config = Config::load(None).unwrap();
        let service = GeminiGenerator::new(&config, &config.llm_model_name);
        let generation = service
            .generate(&GenerationRequest::text("Reply with the word ok."))
            .await
            .unwrap();
        assert!(!generation.text.is_empty());
    }
}
