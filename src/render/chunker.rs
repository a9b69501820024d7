//! 对话切块
//!
//! 把每个会话的消息按字符预算切成若干块，每块渲染成一张图片。
//! 切块只在消息边界发生，单条消息永远不会被拆开。

use serde::{Deserialize, Serialize};

use crate::models::question::{Message, Question, WorkItem};

/// 触发超出预算的那条消息归属哪一块
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ChunkBoundary {
    /// 先加入当前块再检查：累计达到预算时当前块（含该消息）结束
    #[default]
    Inclusive,
    /// 先检查再加入：加入后会达到预算时，当前块结束，该消息开启下一块
    Carry,
}

/// 一个渲染单元
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// `{question_id}/{chunk_index}`
    pub chunk_id: String,
    pub question_id: String,
    pub session_id: String,
    /// 会话序号，从 1 开始
    pub session_index: usize,
    pub session_date: String,
    /// 在题目内的块序号，从 1 开始，跨会话连续
    pub chunk_index: usize,
    pub messages: Vec<Message>,
}

impl Chunk {
    pub fn char_len(&self) -> usize {
        self.messages.iter().map(Message::char_len).sum()
    }
}

impl WorkItem for Chunk {
    fn item_id(&self) -> &str {
        &self.chunk_id
    }
}

/// 按字符预算切分一组消息
///
/// 返回的切片按顺序拼接后与输入完全一致，且不会出现空块。
pub fn split_messages(messages: &[Message], budget: usize, boundary: ChunkBoundary) -> Vec<&[Message]> {
    let mut chunks = Vec::new();
    let mut start = 0;
    let mut size = 0;

    for (i, message) in messages.iter().enumerate() {
        let len = message.char_len();
        match boundary {
            ChunkBoundary::Inclusive => {
                size += len;
                if size >= budget {
                    chunks.push(&messages[start..=i]);
                    start = i + 1;
                    size = 0;
                }
            }
            ChunkBoundary::Carry => {
                if i > start && size + len >= budget {
                    chunks.push(&messages[start..i]);
                    start = i;
                    size = 0;
                }
                size += len;
            }
        }
    }

    if start < messages.len() {
        chunks.push(&messages[start..]);
    }

    chunks
}

/// 切分一道题目的所有会话
pub fn chunk_question(question: &Question, budget: usize, boundary: ChunkBoundary) -> Vec<Chunk> {
    let mut chunks = Vec::new();

    for session in question.sessions() {
        for messages in split_messages(session.messages, budget, boundary) {
            let chunk_index = chunks.len() + 1;
            chunks.push(Chunk {
                chunk_id: format!("{}/{}", question.question_id, chunk_index),
                question_id: question.question_id.clone(),
                session_id: session.session_id.to_string(),
                session_index: session.index,
                session_date: session.date.to_string(),
                chunk_index,
                messages: messages.to_vec(),
            });
        }
    }

    chunks
}

/// 切分整个数据集
pub fn chunk_dataset(questions: &[Question], budget: usize, boundary: ChunkBoundary) -> Vec<Chunk> {
    questions
        .iter()
        .flat_map(|q| chunk_question(q, budget, boundary))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::question::Role;

    fn msg(size: usize) -> Message {
        Message {
            role: Role::User,
            content: "x".repeat(size),
            has_answer: false,
        }
    }

    fn sizes(chunks: &[&[Message]]) -> Vec<Vec<usize>> {
        chunks
            .iter()
            .map(|c| c.iter().map(Message::char_len).collect())
            .collect()
    }

    /// 简单的线性同余序列，生成可复现的消息长度
    fn pseudo_sizes(seed: u64, n: usize, max: usize) -> Vec<usize> {
        let mut state = seed;
        (0..n)
            .map(|_| {
                state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                ((state >> 33) as usize) % max
            })
            .collect()
    }

    #[test]
    fn test_inclusive_worked_example() {
        let messages = vec![msg(3000), msg(3000), msg(3000)];
        let chunks = split_messages(&messages, 5500, ChunkBoundary::Inclusive);
        assert_eq!(sizes(&chunks), vec![vec![3000, 3000], vec![3000]]);
    }

    #[test]
    fn test_carry_worked_example() {
        let messages = vec![msg(3000), msg(3000), msg(3000)];
        let chunks = split_messages(&messages, 5500, ChunkBoundary::Carry);
        assert_eq!(sizes(&chunks), vec![vec![3000], vec![3000], vec![3000]]);
    }

    #[test]
    fn test_oversized_first_message_is_alone() {
        let messages = vec![msg(9000), msg(10), msg(10)];
        for boundary in [ChunkBoundary::Inclusive, ChunkBoundary::Carry] {
            let chunks = split_messages(&messages, 5500, boundary);
            assert_eq!(sizes(&chunks), vec![vec![9000], vec![10, 10]]);
        }
    }

    #[test]
    fn test_empty_input_yields_no_chunks() {
        for boundary in [ChunkBoundary::Inclusive, ChunkBoundary::Carry] {
            assert!(split_messages(&[], 5500, boundary).is_empty());
        }
    }

    #[test]
    fn test_zero_budget_is_one_message_per_chunk() {
        let messages = vec![msg(1), msg(0), msg(5)];
        for boundary in [ChunkBoundary::Inclusive, ChunkBoundary::Carry] {
            let chunks = split_messages(&messages, 0, boundary);
            assert_eq!(chunks.len(), 3);
        }
    }

    #[test]
    fn test_split_invariants_hold_for_many_inputs() {
        for seed in 0..200u64 {
            let budget = 1 + (seed as usize * 37) % 4000;
            let input: Vec<Message> = pseudo_sizes(seed, (seed % 40) as usize, 3000)
                .into_iter()
                .map(msg)
                .collect();

            for boundary in [ChunkBoundary::Inclusive, ChunkBoundary::Carry] {
                let chunks = split_messages(&input, budget, boundary);

                let rejoined: Vec<Message> = chunks.iter().flat_map(|c| c.to_vec()).collect();
                assert_eq!(rejoined, input, "seed {} {:?}", seed, boundary);
                assert!(chunks.iter().all(|c| !c.is_empty()));

                for chunk in &chunks {
                    let total: usize = chunk.iter().map(Message::char_len).sum();
                    match boundary {
                        ChunkBoundary::Carry => {
                            assert!(chunk.len() == 1 || total < budget, "seed {}", seed);
                        }
                        ChunkBoundary::Inclusive => {
                            let before_last = total - chunk[chunk.len() - 1].char_len();
                            assert!(before_last < budget, "seed {}", seed);
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_chunk_indices_continue_across_sessions() {
        let question = Question {
            question_id: "q1".to_string(),
            question_type: "multi-session".to_string(),
            question: "?".to_string(),
            answer: "!".to_string(),
            question_date: "2023/05/30".to_string(),
            haystack_dates: vec!["d1".to_string(), "d2".to_string(), "d3".to_string()],
            haystack_session_ids: vec!["s1".to_string(), "s2".to_string(), "s3".to_string()],
            haystack_sessions: vec![
                vec![msg(3000), msg(3000), msg(3000)],
                vec![],
                vec![msg(10)],
            ],
            answer_session_ids: vec![],
        };

        let chunks = chunk_question(&question, 5500, ChunkBoundary::Inclusive);
        let indices: Vec<usize> = chunks.iter().map(|c| c.chunk_index).collect();
        assert_eq!(indices, vec![1, 2, 3]);
        assert_eq!(chunks[2].session_index, 3);
        assert_eq!(chunks[2].session_date, "d3");
        assert_eq!(chunks[1].item_id(), "q1/2");
        assert_eq!(chunks[0].char_len(), 6000);
    }
}
