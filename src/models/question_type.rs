use phf::phf_map;

/// judge 使用的评分规则
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JudgeRubric {
    /// 回答需包含参考答案
    Exact,
    /// 时间推理，天数允许差一
    Temporal,
    /// 知识更新，需给出最新的答案
    KnowledgeUpdate,
    /// 个性化偏好，参考答案是评分细则
    Preference,
    /// 无法回答的问题，模型应当拒答
    Abstention,
}

static RUBRICS: phf::Map<&'static str, JudgeRubric> = phf_map! {
    "single-session-user" => JudgeRubric::Exact,
    "single-session-assistant" => JudgeRubric::Exact,
    "multi-session" => JudgeRubric::Exact,
    "temporal-reasoning" => JudgeRubric::Temporal,
    "knowledge-update" => JudgeRubric::KnowledgeUpdate,
    "single-session-preference" => JudgeRubric::Preference,
};

impl JudgeRubric {
    /// 根据题型选择评分规则，未知题型返回 `None`
    ///
    /// 放弃作答类题目优先于题型。
    pub fn for_question(question_type: &str, abstention: bool) -> Option<Self> {
        if abstention {
            return Some(JudgeRubric::Abstention);
        }
        RUBRICS.get(question_type).copied()
    }
}
