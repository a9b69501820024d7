//! 评测任务 - 流程层
//!
//! 流程：按题型选择评分规则 → 调用 judge 模型 → 解析 yes/no → 写出 `EvalRecord`

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::models::question::{Question, WorkItem};
use crate::models::question_type::JudgeRubric;
use crate::models::record::{EvalRecord, JudgeLabel, ResultRecord};
use crate::services::generation::{GenerationRequest, Generator};
use crate::services::prompts;
use crate::utils::truncate_text;
use crate::workflow::item_ctx::ItemCtx;
use crate::workflow::job::Job;

/// 待评测条目：一条生成结果和它对应的参考题目
#[derive(Debug, Clone)]
pub struct JudgeItem {
    pub result: ResultRecord,
    /// 参考数据集中找不到时为 `None`，处理时记为失败
    pub reference: Option<Arc<Question>>,
}

impl WorkItem for JudgeItem {
    fn item_id(&self) -> &str {
        &self.result.question_id
    }
}

/// 把生成结果与参考数据集按题目 ID 配对，保持生成结果的顺序
pub fn pair_with_references(results: Vec<ResultRecord>, reference: Vec<Question>) -> Vec<JudgeItem> {
    let by_id: HashMap<String, Arc<Question>> = reference
        .into_iter()
        .map(|q| (q.question_id.clone(), Arc::new(q)))
        .collect();

    results
        .into_iter()
        .map(|result| {
            let reference = by_id.get(&result.question_id).cloned();
            if reference.is_none() {
                warn!("[{}] ⚠️ 参考数据集中没有这道题", result.question_id);
            }
            JudgeItem { result, reference }
        })
        .collect()
}

/// 评测任务
pub struct JudgeJob {
    judge: Arc<dyn Generator>,
}

impl JudgeJob {
    pub fn new(judge: Arc<dyn Generator>) -> Self {
        Self { judge }
    }
}

#[async_trait]
impl Job for JudgeJob {
    type Item = JudgeItem;
    type Record = EvalRecord;

    fn name(&self) -> &'static str {
        "evaluate"
    }

    async fn run(&self, item: &JudgeItem, ctx: &ItemCtx) -> Result<EvalRecord> {
        let question = item
            .reference
            .as_deref()
            .ok_or_else(|| anyhow!("{} 参考数据集中找不到这道题", ctx))?;

        let rubric = JudgeRubric::for_question(&question.question_type, question.is_abstention())
            .ok_or_else(|| anyhow!("{} 未知题型: {}", ctx, question.question_type))?;

        let prompt = prompts::judge_prompt(
            rubric,
            &question.question,
            &question.answer,
            &item.result.hypothesis,
        );

        let generation = self
            .judge
            .generate(&GenerationRequest::text(prompt))
            .await
            .with_context(|| format!("{} judge 调用失败", ctx))?;

        let evaluation = JudgeLabel::parse(&generation.text).ok_or_else(|| {
            anyhow!(
                "{} judge 回复中没有 yes / no 判定: {:?}",
                ctx,
                truncate_text(&generation.text, 80)
            )
        })?;
        debug!("{} judge 回复: {:?} → {}", ctx, generation.text, evaluation);

        Ok(EvalRecord {
            question_id: question.question_id.clone(),
            question_type: question.question_type.clone(),
            answer: question.answer.clone(),
            hypothesis: item.result.hypothesis.clone(),
            evaluation,
            answer_generation_usage: item.result.usage,
            evaluation_usage: generation.usage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceError;
    use crate::models::usage::TokenUsage;
    use crate::services::generation::Generation;
    use std::sync::Mutex;

    struct FixedJudge {
        reply: &'static str,
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Generator for FixedJudge {
        fn model(&self) -> &str {
            "fixed"
        }

        async fn generate(&self, request: &GenerationRequest) -> Result<Generation, ServiceError> {
            self.prompts.lock().unwrap().push(request.prompt.clone());
            Ok(Generation {
                text: self.reply.to_string(),
                usage: TokenUsage::new(50, 1, 0),
            })
        }
    }

    fn judge(reply: &'static str) -> Arc<FixedJudge> {
        Arc::new(FixedJudge {
            reply,
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn reference(id: &str, question_type: &str) -> Question {
        serde_json::from_value(serde_json::json!({
            "question_id": id,
            "question_type": question_type,
            "question": "How many days passed?",
            "answer": "18 days",
            "question_date": "2023/05/30"
        }))
        .unwrap()
    }

    fn result(id: &str) -> ResultRecord {
        ResultRecord {
            question_id: id.to_string(),
            hypothesis: "19 days".to_string(),
            usage: TokenUsage::new(1000, 20, 5),
        }
    }

    #[tokio::test]
    async fn test_judge_builds_eval_record() {
        let judge = judge("Yes.");
        let job = JudgeJob::new(judge.clone());
        let items = pair_with_references(
            vec![result("q1")],
            vec![reference("q1", "temporal-reasoning")],
        );

        let record = job
            .run(&items[0], &ItemCtx::new("evaluate", "q1", 1, 1))
            .await
            .unwrap();

        assert_eq!(record.evaluation, JudgeLabel::Yes);
        assert_eq!(record.question_type, "temporal-reasoning");
        assert_eq!(record.answer, "18 days");
        assert_eq!(record.answer_generation_usage.input_tokens, 1000);
        assert_eq!(record.evaluation_usage.input_tokens, 50);
        assert!(judge.prompts.lock().unwrap()[0].contains("off-by-one"));
    }

    #[tokio::test]
    async fn test_abstention_uses_abstention_rubric() {
        let judge = judge("no");
        let job = JudgeJob::new(judge.clone());
        let items = pair_with_references(
            vec![result("q2_abs")],
            vec![reference("q2_abs", "multi-session")],
        );

        let record = job
            .run(&items[0], &ItemCtx::new("evaluate", "q2_abs", 1, 1))
            .await
            .unwrap();

        assert_eq!(record.evaluation, JudgeLabel::No);
        assert!(judge.prompts.lock().unwrap()[0].contains("unanswerable"));
    }

    #[tokio::test]
    async fn test_reply_without_verdict_is_item_failure() {
        let job = JudgeJob::new(judge("I cannot decide."));
        let items = pair_with_references(
            vec![result("q1")],
            vec![reference("q1", "multi-session")],
        );

        let err = job
            .run(&items[0], &ItemCtx::new("evaluate", "q1", 1, 1))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("yes / no"));
    }

    #[tokio::test]
    async fn test_missing_reference_is_item_failure() {
        let job = JudgeJob::new(judge("yes"));
        let items = pair_with_references(vec![result("ghost")], vec![reference("q1", "multi-session")]);

        assert!(items[0].reference.is_none());
        assert!(job
            .run(&items[0], &ItemCtx::new("evaluate", "ghost", 1, 1))
            .await
            .is_err());
    }
}
