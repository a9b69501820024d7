//! Token 用量
//!
//! 内部只使用一种用量结构 [`TokenUsage`]。历史结果文件里还存在两种
//! 供应商格式，读取时统一转换：
//!
//! | 字段 | AI SDK 格式 | Gemini `usageMetadata` 格式 |
//! |---|---|---|
//! | `input_tokens` | `inputTokens` | `promptTokenCount` |
//! | `output_tokens` | `outputTokens` | `totalTokenCount - promptTokenCount` |
//! | `total_tokens` | `totalTokens` | `totalTokenCount` |
//! | `reasoning_tokens` | `reasoningTokens` | `thoughtsTokenCount` |
//!
//! 写出时始终是规范格式。

use serde::{Deserialize, Serialize};

/// 规范的 token 用量
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "UsageShape")]
pub struct TokenUsage {
    pub input_tokens: u64,
    /// 包含思考 token
    pub output_tokens: u64,
    pub total_tokens: u64,
    /// 思考 / reasoning token，是 `output_tokens` 的子集
    pub reasoning_tokens: u64,
}

impl TokenUsage {
    pub fn new(input_tokens: u64, output_tokens: u64, reasoning_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens: input_tokens + output_tokens,
            reasoning_tokens,
        }
    }
}

/// 可读取的用量格式
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum UsageShape {
    Canonical(CanonicalUsage),
    AiSdk(AiSdkUsage),
    Gemini(GeminiUsage),
}

#[derive(Debug, Clone, Deserialize)]
pub struct CanonicalUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    #[serde(default)]
    pub total_tokens: Option<u64>,
    #[serde(default)]
    pub reasoning_tokens: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiSdkUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    #[serde(default)]
    pub total_tokens: Option<u64>,
    #[serde(default)]
    pub reasoning_tokens: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiUsage {
    pub prompt_token_count: u64,
    #[serde(default)]
    pub candidates_token_count: Option<u64>,
    pub total_token_count: u64,
    #[serde(default)]
    pub thoughts_token_count: Option<u64>,
}

impl From<UsageShape> for TokenUsage {
    fn from(shape: UsageShape) -> Self {
        match shape {
            UsageShape::Canonical(u) => TokenUsage {
                input_tokens: u.input_tokens,
                output_tokens: u.output_tokens,
                total_tokens: u
                    .total_tokens
                    .unwrap_or(u.input_tokens + u.output_tokens),
                reasoning_tokens: u.reasoning_tokens,
            },
            UsageShape::AiSdk(u) => TokenUsage {
                input_tokens: u.input_tokens,
                output_tokens: u.output_tokens,
                total_tokens: u
                    .total_tokens
                    .unwrap_or(u.input_tokens + u.output_tokens),
                reasoning_tokens: u.reasoning_tokens.unwrap_or(0),
            },
            UsageShape::Gemini(u) => u.into(),
        }
    }
}

impl From<GeminiUsage> for TokenUsage {
    fn from(u: GeminiUsage) -> Self {
        TokenUsage {
            input_tokens: u.prompt_token_count,
            output_tokens: u.total_token_count.saturating_sub(u.prompt_token_count),
            total_tokens: u.total_token_count,
            reasoning_tokens: u.thoughts_token_count.unwrap_or(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_ai_sdk_shape() {
        let usage: TokenUsage = serde_json::from_str(
            r#"{"inputTokens": 100, "outputTokens": 40, "totalTokens": 140, "reasoningTokens": 25}"#,
        )
        .unwrap();
        assert_eq!(usage, TokenUsage::new(100, 40, 25));
    }

    #[test]
    fn test_reads_gemini_shape() {
        let usage: TokenUsage = serde_json::from_str(
            r#"{"promptTokenCount": 1000, "candidatesTokenCount": 20, "totalTokenCount": 1300, "thoughtsTokenCount": 280}"#,
        )
        .unwrap();

        assert_eq!(usage.input_tokens, 1000);
        assert_eq!(usage.output_tokens, 300);
        assert_eq!(usage.total_tokens, 1300);
        assert_eq!(usage.reasoning_tokens, 280);
    }

    #[test]
    fn test_gemini_without_thoughts() {
        let usage: TokenUsage =
            serde_json::from_str(r#"{"promptTokenCount": 10, "totalTokenCount": 12}"#).unwrap();
        assert_eq!(usage.reasoning_tokens, 0);
        assert_eq!(usage.output_tokens, 2);
    }

    #[test]
    fn test_writes_canonical_shape() {
        let json = serde_json::to_value(TokenUsage::new(7, 3, 1)).unwrap();
        assert_eq!(json["input_tokens"], 7);
        assert_eq!(json["total_tokens"], 10);

        let back: TokenUsage = serde_json::from_value(json).unwrap();
        assert_eq!(back, TokenUsage::new(7, 3, 1));
    }

    #[test]
    fn test_unknown_shape_is_rejected() {
        assert!(serde_json::from_str::<TokenUsage>(r#"{"tokens": 5}"#).is_err());
    }
}
