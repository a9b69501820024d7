use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::Path;

use serde::de::DeserializeOwned;
use tokio::fs;
use tracing::{info, warn};

use crate::error::InputError;
use crate::models::question::{Question, WorkItem};

/// 读取一个 JSON 数组文件
pub async fn load_json_array<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, InputError> {
    let content = fs::read_to_string(path).await.map_err(|source| match source.kind() {
        ErrorKind::NotFound => InputError::NotFound {
            path: path.to_path_buf(),
        },
        _ => InputError::ReadFailed {
            path: path.to_path_buf(),
            source,
        },
    })?;

    serde_json::from_str(&content).map_err(|source| InputError::JsonParseFailed {
        path: path.to_path_buf(),
        source,
    })
}

/// 加载数据集并校验题目 ID 唯一
///
/// # 参数
/// - `path`: 数据集文件路径（JSON 数组）
/// - `limit`: 只保留前 N 道题（可选）
pub async fn load_dataset(path: &Path, limit: Option<usize>) -> Result<Vec<Question>, InputError> {
    info!(
        "📁 正在加载数据集: {}",
        path.file_name().unwrap_or_default().to_string_lossy()
    );

    let mut questions: Vec<Question> = load_json_array(path).await?;
    ensure_unique_ids(&questions)?;

    for q in &questions {
        if q.haystack_dates.len() != q.haystack_sessions.len()
            || q.haystack_session_ids.len() != q.haystack_sessions.len()
        {
            warn!(
                "[{}] ⚠️ 会话数 {} 与日期数 {} / 会话 ID 数 {} 不一致",
                q.question_id,
                q.haystack_sessions.len(),
                q.haystack_dates.len(),
                q.haystack_session_ids.len()
            );
        }
    }

    if let Some(limit) = limit {
        questions.truncate(limit);
    }

    info!("✓ 成功加载 {} 道题目", questions.len());
    Ok(questions)
}

/// 同一批次内条目 ID 必须唯一
pub fn ensure_unique_ids<T: WorkItem>(items: &[T]) -> Result<(), InputError> {
    let mut seen = HashSet::with_capacity(items.len());
    for item in items {
        if !seen.insert(item.item_id()) {
            return Err(InputError::DuplicateId {
                item_id: item.item_id().to_string(),
            });
        }
    }
    Ok(())
}
