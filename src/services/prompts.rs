//! 提示词模板
//!
//! 生成答案的三种上下文（文本 / 图片 / PDF）和 judge 的五种评分规则。

use serde::Serialize;

use crate::models::question::{Message, Question};
use crate::models::question_type::JudgeRubric;

/// 完整文本上下文：所有会话按顺序拼进提示词
pub fn full_text_context_prompt(question: &Question) -> String {
    let history = question
        .sessions()
        .map(|session| {
            let content = session
                .messages
                .iter()
                .map(message_line)
                .collect::<Vec<_>>()
                .join("\n\n");
            format!(
                "### Session {}\n\nSession Date: {}\n\nSession Content:\n\n{}",
                session.index, session.date, content
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n\n");

    format!(
        "I will give you several history chats between you and a user. \
Please answer the question based on the relevant chat history.\n\n\
History Chats:\n\n{}\n\n\
Current Date: {}\n\n\
Question: {}\n\n\
Answer:",
        history, question.question_date, question.question
    )
}

/// 单条消息写成一行 JSON，字段顺序固定为 role、content
fn message_line(message: &Message) -> String {
    #[derive(Serialize)]
    struct Line<'a> {
        role: &'a str,
        content: &'a str,
    }

    serde_json::to_string(&Line {
        role: message.role.as_str(),
        content: &message.content,
    })
    .unwrap_or_default()
}

/// 图片上下文：会话内容在随附的图片里
pub fn image_context_prompt(question: &Question) -> String {
    format!(
        "I will give you several history chats between you and a user, rendered as images. \
Each image starts with a header showing the session number and the session date. \
Please answer the question based on the relevant chat history.\n\n\
Current Date: {}\n\n\
Question: {}\n\n\
Answer:",
        question.question_date, question.question
    )
}

/// PDF 上下文：会话内容在随附的 PDF 里
pub fn pdf_context_prompt(question: &Question) -> String {
    format!(
        "I will give you several history chats between you and a user in the attached PDF document. \
Each session starts with a header showing the session number and the session date. \
Please answer the question based on the relevant chat history.\n\n\
Current Date: {}\n\n\
Question: {}\n\n\
Answer:",
        question.question_date, question.question
    )
}

/// judge 提示词
///
/// # 参数
/// - `rubric`: 由题型决定的评分规则
/// - `question`: 题目
/// - `answer`: 参考答案（偏好题是评分细则，拒答题是解释）
/// - `hypothesis`: 模型回答
pub fn judge_prompt(rubric: JudgeRubric, question: &str, answer: &str, hypothesis: &str) -> String {
    const CONTAINS_ANSWER: &str = "I will give you a question, a correct answer, and a response from a model. \
Please answer yes if the response contains the correct answer. Otherwise, answer no. \
If the response is equivalent to the correct answer or contains all the intermediate steps to get the correct answer, you should also answer yes. \
If the response only contains a subset of the information required by the answer, answer no.";

    match rubric {
        JudgeRubric::Exact => format!(
            "{}\n\nQuestion: {}\n\nCorrect Answer: {}\n\nModel Response: {}\n\n\
Is the model response correct? Answer yes or no only.",
            CONTAINS_ANSWER, question, answer, hypothesis
        ),
        JudgeRubric::Temporal => format!(
            "{} In addition, do not penalize off-by-one errors for the number of days. \
If the question asks for the number of days/weeks/months, etc., and the model makes off-by-one errors \
(e.g., predicting 19 days when the answer is 18), the model's response is still correct.\n\n\
Question: {}\n\nCorrect Answer: {}\n\nModel Response: {}\n\n\
Is the model response correct? Answer yes or no only.",
            CONTAINS_ANSWER, question, answer, hypothesis
        ),
        JudgeRubric::KnowledgeUpdate => format!(
            "I will give you a question, a correct answer, and a response from a model. \
Please answer yes if the response contains the correct answer. Otherwise, answer no. \
If the response contains some previous information along with an updated answer, \
the response should be considered as correct as long as the updated answer is the required answer.\n\n\
Question: {}\n\nCorrect Answer: {}\n\nModel Response: {}\n\n\
Is the model response correct? Answer yes or no only.",
            question, answer, hypothesis
        ),
        JudgeRubric::Preference => format!(
            "I will give you a question, a rubric for desired personalized response, and a response from a model. \
Please answer yes if the response satisfies the desired response. Otherwise, answer no. \
The model does not need to reflect all the points in the rubric. \
The response is correct as long as it recalls and utilizes the user's personal information correctly.\n\n\
Question: {}\n\nRubric: {}\n\nModel Response: {}\n\n\
Is the model response correct? Answer yes or no only.",
            question, answer, hypothesis
        ),
        JudgeRubric::Abstention => format!(
            "I will give you an unanswerable question, an explanation, and a response from a model. \
Please answer yes if the model correctly identifies the question as unanswerable. \
The model could say that the information is incomplete, or some other information is given but the asked information is not.\n\n\
Question: {}\n\nExplanation: {}\n\nModel Response: {}\n\n\
Does the model correctly identify the question as unanswerable? Answer yes or no only.",
            question, answer, hypothesis
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn question() -> Question {
        serde_json::from_value(json!({
            "question_id": "q1",
            "question_type": "multi-session",
            "question": "How many bikes do I own?",
            "answer": 3,
            "question_date": "2023/05/30 (Tue) 10:00",
            "haystack_dates": ["2023/05/20 (Sat) 02:21", "2023/05/21 (Sun) 09:00"],
            "haystack_session_ids": ["s1", "s2"],
            "haystack_sessions": [
                [{"role": "user", "content": "I bought a bike"}],
                [{"role": "assistant", "content": "Nice \"bike\"", "has_answer": true}]
            ],
            "answer_session_ids": ["s1"]
        }))
        .unwrap()
    }

    #[test]
    fn test_full_text_prompt_layout() {
        let prompt = full_text_context_prompt(&question());

        assert!(prompt.starts_with("I will give you several history chats"));
        assert!(prompt.contains("### Session 1\n\nSession Date: 2023/05/20 (Sat) 02:21"));
        assert!(prompt.contains("### Session 2"));
        assert!(prompt.contains(r#"{"role":"user","content":"I bought a bike"}"#));
        // 引号经过 JSON 转义
        assert!(prompt.contains(r#"Nice \"bike\""#));
        assert!(prompt.ends_with("Question: How many bikes do I own?\n\nAnswer:"));
    }

    #[test]
    fn test_judge_prompt_per_rubric() {
        let exact = judge_prompt(JudgeRubric::Exact, "Q", "A", "H");
        assert!(exact.contains("Correct Answer: A"));
        assert!(!exact.contains("off-by-one"));

        let temporal = judge_prompt(JudgeRubric::Temporal, "Q", "A", "H");
        assert!(temporal.contains("off-by-one"));

        let preference = judge_prompt(JudgeRubric::Preference, "Q", "R", "H");
        assert!(preference.contains("Rubric: R"));

        let abstention = judge_prompt(JudgeRubric::Abstention, "Q", "E", "H");
        assert!(abstention.contains("Explanation: E"));
        assert!(abstention.ends_with("Answer yes or no only."));
    }
}
