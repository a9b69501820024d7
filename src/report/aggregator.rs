//! 评测报告聚合
//!
//! 输入是一个批次的全部 `EvalRecord`，输出：
//! - `summary`: 总数、yes / no 数量、准确率
//! - `overall_token_usage`: 生成答案的 token 用量统计（输入 / 输出 / 思考）
//! - `performance_by_question_type`: 按题型分组的同样指标
//!
//! 平均值和准确率保留两位小数；最小 / 最大值取原始值；空输入时所有字段为 0。

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::error::{AppError, ReportError};
use crate::models::loaders::load_json_array;
use crate::models::record::EvalRecord;

/// 评测报告
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub summary: Summary,
    pub overall_token_usage: UsageStats,
    pub performance_by_question_type: BTreeMap<String, TypeStats>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub total: usize,
    pub valid: usize,
    pub invalid: usize,
    pub accuracy_percentage: f64,
}

/// 输入 / 输出 / 思考 token 统计
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageStats {
    pub input: TotalStat,
    pub output: TotalStat,
    pub thinking: Stat,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TotalStat {
    pub average: f64,
    pub min: u64,
    pub max: u64,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stat {
    pub average: f64,
    pub min: u64,
    pub max: u64,
}

/// 单个题型的指标
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypeStats {
    pub total: usize,
    pub valid: usize,
    pub invalid: usize,
    pub accuracy: f64,
    pub avg_thinking_tokens: f64,
    pub token_usage: UsageStats,
}

/// 聚合评测记录
pub fn aggregate(records: &[EvalRecord]) -> Report {
    let all: Vec<&EvalRecord> = records.iter().collect();

    let mut groups: BTreeMap<String, Vec<&EvalRecord>> = BTreeMap::new();
    for record in records {
        groups
            .entry(record.question_type.clone())
            .or_default()
            .push(record);
    }

    let (valid, invalid) = count_labels(&all);

    Report {
        summary: Summary {
            total: all.len(),
            valid,
            invalid,
            accuracy_percentage: percentage(valid, all.len()),
        },
        overall_token_usage: usage_stats(&all),
        performance_by_question_type: groups
            .into_iter()
            .map(|(question_type, group)| {
                let (valid, invalid) = count_labels(&group);
                let token_usage = usage_stats(&group);
                let stats = TypeStats {
                    total: group.len(),
                    valid,
                    invalid,
                    accuracy: percentage(valid, group.len()),
                    avg_thinking_tokens: token_usage.thinking.average,
                    token_usage,
                };
                (question_type, stats)
            })
            .collect(),
    }
}

/// 读取评测文件，逐行校验
///
/// 任意一行缺少必需字段时直接报错，指明行号和字段。
pub async fn load_eval_records(path: &Path) -> Result<Vec<EvalRecord>, AppError> {
    let rows: Vec<Value> = load_json_array(path).await?;

    let records = rows
        .into_iter()
        .enumerate()
        .map(|(index, row)| {
            serde_json::from_value(row).map_err(|source| ReportError::MalformedRow { index, source })
        })
        .collect::<Result<Vec<EvalRecord>, _>>()?;

    info!("✓ 读取 {} 条评测记录", records.len());
    Ok(records)
}

/// 报告写成格式化的 JSON
pub async fn write_report(path: &Path, report: &Report) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, json).await?;
    info!("📄 报告已写入: {}", path.display());
    Ok(())
}

// ========== 统计辅助函数 ==========

fn count_labels(records: &[&EvalRecord]) -> (usize, usize) {
    let valid = records.iter().filter(|r| r.evaluation.is_yes()).count();
    (valid, records.len() - valid)
}

fn usage_stats(records: &[&EvalRecord]) -> UsageStats {
    let input: Vec<u64> = records
        .iter()
        .map(|r| r.answer_generation_usage.input_tokens)
        .collect();
    let output: Vec<u64> = records
        .iter()
        .map(|r| r.answer_generation_usage.output_tokens)
        .collect();
    let thinking: Vec<u64> = records
        .iter()
        .map(|r| r.answer_generation_usage.reasoning_tokens)
        .collect();

    UsageStats {
        input: total_stat(&input),
        output: total_stat(&output),
        thinking: stat(&thinking),
    }
}

fn total_stat(values: &[u64]) -> TotalStat {
    let Stat { average, min, max } = stat(values);
    TotalStat {
        average,
        min,
        max,
        total: values.iter().sum(),
    }
}

fn stat(values: &[u64]) -> Stat {
    if values.is_empty() {
        return Stat {
            average: 0.0,
            min: 0,
            max: 0,
        };
    }
    let sum: u64 = values.iter().sum();
    Stat {
        average: round2(sum as f64 / values.len() as f64),
        min: values.iter().copied().min().unwrap_or(0),
        max: values.iter().copied().max().unwrap_or(0),
    }
}

fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        round2(part as f64 / whole as f64 * 100.0)
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
