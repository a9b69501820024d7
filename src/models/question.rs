use serde::{Deserialize, Serialize};

/// 可以被批处理的工作条目
///
/// `item_id` 在一个批次内必须唯一，检查点据此判断是否已完成。
pub trait WorkItem {
    fn item_id(&self) -> &str;
}

/// 对话中的发言角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// 单条对话消息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default)]
    pub has_answer: bool,
}

impl Message {
    /// 用于切块预算的字符数
    pub fn char_len(&self) -> usize {
        self.content.chars().count()
    }
}

/// 一个会话就是一组有序消息
pub type Session = Vec<Message>;

/// 数据集中的一道题目
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub question_id: String,
    pub question_type: String,
    pub question: String,
    /// 参考答案，数据集里偶尔是数字，统一转成字符串
    #[serde(deserialize_with = "deserialize_answer")]
    pub answer: String,
    pub question_date: String,
    #[serde(default)]
    pub haystack_dates: Vec<String>,
    #[serde(default)]
    pub haystack_session_ids: Vec<String>,
    #[serde(default)]
    pub haystack_sessions: Vec<Session>,
    #[serde(default)]
    pub answer_session_ids: Vec<String>,
}

impl Question {
    /// 按顺序遍历 (会话序号从 1 开始, 会话 ID, 会话日期, 消息列表)
    pub fn sessions(&self) -> impl Iterator<Item = SessionView<'_>> {
        self.haystack_sessions
            .iter()
            .enumerate()
            .map(move |(i, messages)| SessionView {
                index: i + 1,
                session_id: self
                    .haystack_session_ids
                    .get(i)
                    .map(String::as_str)
                    .unwrap_or(""),
                date: self.haystack_dates.get(i).map(String::as_str).unwrap_or(""),
                messages,
            })
    }

    /// 放弃作答类题目（ID 以 `_abs` 结尾）
    pub fn is_abstention(&self) -> bool {
        self.question_id.ends_with("_abs")
    }
}

impl WorkItem for Question {
    fn item_id(&self) -> &str {
        &self.question_id
    }
}

/// 会话的只读视图
#[derive(Debug, Clone, Copy)]
pub struct SessionView<'a> {
    pub index: usize,
    pub session_id: &'a str,
    pub date: &'a str,
    pub messages: &'a [Message],
}

// Helper function to deserialize answer as either string or number
fn deserialize_answer<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Visitor;
    use std::fmt;

    struct AnswerVisitor;

    impl<'de> Visitor<'de> for AnswerVisitor {
        type Value = String;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a string or number answer")
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(value.to_string())
        }

        fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(value.to_string())
        }

        fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(value.to_string())
        }

        fn visit_f64<E>(self, value: f64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(value.to_string())
        }
    }

    deserializer.deserialize_any(AnswerVisitor)
}
