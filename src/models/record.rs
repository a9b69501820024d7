//! 持久化到检查点文件中的结果记录

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::models::usage::TokenUsage;

/// 可写入检查点的记录
pub trait CheckpointRecord: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// 对应工作条目的 ID
    fn item_id(&self) -> &str;
}

/// 答案生成结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub question_id: String,
    pub hypothesis: String,
    pub usage: TokenUsage,
}

impl CheckpointRecord for ResultRecord {
    fn item_id(&self) -> &str {
        &self.question_id
    }
}

/// judge 给出的判定
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum JudgeLabel {
    Yes,
    No,
}

impl JudgeLabel {
    /// 解析 judge 的原始回复：以第一个独立的 yes / no 为准
    ///
    /// # 返回
    /// 回复中没有 yes / no 时返回 `None`
    pub fn parse(text: &str) -> Option<Self> {
        static VERDICT: OnceLock<Regex> = OnceLock::new();
        let re = VERDICT.get_or_init(|| Regex::new(r"(?i)\b(yes|no)\b").expect("static regex"));
        re.captures(text).map(|caps| {
            if caps[1].eq_ignore_ascii_case("yes") {
                JudgeLabel::Yes
            } else {
                JudgeLabel::No
            }
        })
    }

    pub fn is_yes(self) -> bool {
        self == JudgeLabel::Yes
    }
}

impl TryFrom<String> for JudgeLabel {
    type Error = String;

    fn try_from(text: String) -> Result<Self, Self::Error> {
        JudgeLabel::parse(&text).ok_or_else(|| format!("evaluation 不是 yes / no 判定: {:?}", text))
    }
}

impl fmt::Display for JudgeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JudgeLabel::Yes => f.write_str("yes"),
            JudgeLabel::No => f.write_str("no"),
        }
    }
}

/// 评测结果，报告聚合的输入
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalRecord {
    pub question_id: String,
    pub question_type: String,
    pub answer: String,
    pub hypothesis: String,
    pub evaluation: JudgeLabel,
    pub answer_generation_usage: TokenUsage,
    #[serde(default)]
    pub evaluation_usage: TokenUsage,
}

impl CheckpointRecord for EvalRecord {
    fn item_id(&self) -> &str {
        &self.question_id
    }
}

/// 渲染产物
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderRecord {
    pub item_id: String,
    pub path: String,
}

impl CheckpointRecord for RenderRecord {
    fn item_id(&self) -> &str {
        &self.item_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_judge_label() {
        assert_eq!(JudgeLabel::parse("yes"), Some(JudgeLabel::Yes));
        assert_eq!(JudgeLabel::parse("Yes."), Some(JudgeLabel::Yes));
        assert_eq!(JudgeLabel::parse(" YES\n"), Some(JudgeLabel::Yes));
        assert_eq!(JudgeLabel::parse("no"), Some(JudgeLabel::No));
        assert_eq!(
            JudgeLabel::parse("No. The response does not say yes."),
            Some(JudgeLabel::No)
        );
        assert_eq!(JudgeLabel::parse("**Yes**, it matches. No issues."), Some(JudgeLabel::Yes));
        assert_eq!(JudgeLabel::parse("eyes closed"), None);
        assert_eq!(JudgeLabel::parse("N/A"), None);
        assert_eq!(JudgeLabel::parse(""), None);
    }

    #[test]
    fn test_eval_record_reads_legacy_usage() {
        let record: EvalRecord = serde_json::from_str(
            r#"{
                "question_id": "q1",
                "question_type": "multi-session",
                "answer": "3",
                "hypothesis": "three",
                "evaluation": "Yes",
                "answer_generation_usage": {"promptTokenCount": 10, "totalTokenCount": 15, "thoughtsTokenCount": 2},
                "evaluation_usage": {"inputTokens": 4, "outputTokens": 1}
            }"#,
        )
        .unwrap();

        assert_eq!(record.evaluation, JudgeLabel::Yes);
        assert_eq!(record.answer_generation_usage.output_tokens, 5);
        assert_eq!(record.evaluation_usage.total_tokens, 5);

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["evaluation"], "yes");
    }

    #[test]
    fn test_eval_record_rejects_label_without_verdict() {
        let result = serde_json::from_str::<EvalRecord>(
            r#"{"question_id": "q1", "question_type": "t", "answer": "a", "hypothesis": "h",
                "evaluation": "ERROR: judge timed out",
                "answer_generation_usage": {"input_tokens": 1, "output_tokens": 1}}"#,
        );
        let err = result.unwrap_err().to_string();
        assert!(err.contains("yes / no"), "{}", err);
    }

    #[test]
    fn test_eval_record_requires_usage() {
        let result = serde_json::from_str::<EvalRecord>(
            r#"{"question_id": "q1", "question_type": "t", "answer": "a", "hypothesis": "h", "evaluation": "no"}"#,
        );
        assert!(result.is_err());
    }
}
