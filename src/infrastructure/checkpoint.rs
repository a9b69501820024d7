//! 检查点存储 - 基础设施层
//!
//! 结果文件既是批次的输出，也是断点续跑的依据：
//! - 启动时读取已有结果，得到已完成的 ID 集合
//! - 每完成一条就把整个集合重写一遍（先写临时文件再 rename），
//!   文件在任何时刻都是完整的 JSON 数组
//! - 追加与写盘在同一把锁内完成，并发完成的条目不会互相覆盖

use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::CheckpointError;
use crate::models::question::WorkItem;
use crate::models::record::CheckpointRecord;

/// 检查点存储
///
/// 唯一持有结果文件和内存结果集合的对象，只暴露 `load` / `record`。
pub struct CheckpointStore<R> {
    path: PathBuf,
    /// 启动时已完成的 ID，运行期间只读
    completed: HashSet<String>,
    state: Mutex<State<R>>,
}

struct State<R> {
    records: Vec<R>,
    ids: HashSet<String>,
}

impl<R: CheckpointRecord> CheckpointStore<R> {
    /// 读取已有结果；文件不存在或为空时返回空状态
    ///
    /// 文件存在但不是合法的结果数组时报错，避免覆盖掉已有数据。
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self, CheckpointError> {
        let path = path.into();

        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("检查点文件不存在，从头开始: {}", path.display());
                String::new()
            }
            Err(source) => {
                return Err(CheckpointError::ReadFailed {
                    path: path.clone(),
                    source,
                })
            }
        };

        let existing: Vec<R> = if content.trim().is_empty() {
            Vec::new()
        } else {
            serde_json::from_str(&content).map_err(|source| CheckpointError::Corrupt {
                path: path.clone(),
                source,
            })?
        };

        let mut records = Vec::with_capacity(existing.len());
        let mut ids = HashSet::with_capacity(existing.len());
        for record in existing {
            if ids.insert(record.item_id().to_string()) {
                records.push(record);
            } else {
                warn!("检查点中存在重复记录，已忽略: {}", record.item_id());
            }
        }

        if !records.is_empty() {
            info!(
                "📂 从检查点恢复 {} 条已完成记录: {}",
                records.len(),
                path.display()
            );
        }

        Ok(Self {
            path,
            completed: ids.clone(),
            state: Mutex::new(State { records, ids }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 启动时是否已完成
    pub fn is_completed(&self, item_id: &str) -> bool {
        self.completed.contains(item_id)
    }

    /// 启动时已完成的条目数
    pub fn completed_count(&self) -> usize {
        self.completed.len()
    }

    /// 过滤掉启动时已完成的条目
    pub fn pending<T: WorkItem>(&self, items: Vec<T>) -> Vec<T> {
        items
            .into_iter()
            .filter(|item| !self.is_completed(item.item_id()))
            .collect()
    }

    /// 追加一条结果并立即写盘
    ///
    /// # 返回
    /// 新写入返回 `true`；ID 已存在时不重复写入，返回 `false`
    pub async fn record(&self, record: R) -> Result<bool, CheckpointError> {
        let mut state = self.state.lock().await;

        let id = record.item_id().to_string();
        if state.ids.contains(&id) {
            warn!("[{}] 结果已存在，跳过重复写入", id);
            return Ok(false);
        }

        state.ids.insert(id.clone());
        state.records.push(record);

        if let Err(e) = self.write(&state.records).await {
            // 写盘失败时回滚，内存状态与文件保持一致
            state.records.pop();
            state.ids.remove(&id);
            return Err(e);
        }

        Ok(true)
    }

    /// 把当前集合完整写盘
    pub async fn persist(&self) -> Result<(), CheckpointError> {
        let state = self.state.lock().await;
        self.write(&state.records).await
    }

    /// 当前全部记录的快照
    pub async fn records(&self) -> Vec<R> {
        self.state.lock().await.records.clone()
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn write(&self, records: &[R]) -> Result<(), CheckpointError> {
        let json = serde_json::to_string_pretty(records).map_err(CheckpointError::Serialize)?;
        write_atomic(&self.path, json.as_bytes()).await
    }
}

/// 先写临时文件再 rename，避免留下半截文件
async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), CheckpointError> {
    let write_failed = |source| CheckpointError::WriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await.map_err(write_failed)?;
    }

    let file_name = path.file_name().unwrap_or_default().to_string_lossy();
    let tmp = path.with_file_name(format!(".{}.tmp", file_name));

    fs::write(&tmp, bytes).await.map_err(write_failed)?;
    fs::rename(&tmp, path).await.map_err(write_failed)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::record::RenderRecord;
    use std::sync::Arc;

    #[derive(Debug, PartialEq)]
    struct Item(String);

    impl WorkItem for Item {
        fn item_id(&self) -> &str {
            &self.0
        }
    }

    fn record(id: &str) -> RenderRecord {
        RenderRecord {
            item_id: id.to_string(),
            path: format!("out/{}.png", id),
        }
    }

    #[tokio::test]
    async fn test_missing_file_is_empty_state() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::<RenderRecord>::load(dir.path().join("none.json"))
            .await
            .unwrap();

        assert_eq!(store.completed_count(), 0);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_empty_file_is_empty_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.json");
        std::fs::write(&path, "  \n").unwrap();

        let store = CheckpointStore::<RenderRecord>::load(&path).await.unwrap();
        assert_eq!(store.completed_count(), 0);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "[{\"item_id\": \"a\"").unwrap();

        let result = CheckpointStore::<RenderRecord>::load(&path).await;
        assert!(matches!(result, Err(CheckpointError::Corrupt { .. })));
    }

    #[tokio::test]
    async fn test_unreadable_path_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        // 存在但无法按文件读取
        let path = dir.path().join("results.json");
        std::fs::create_dir(&path).unwrap();

        let result = CheckpointStore::<RenderRecord>::load(&path).await;
        assert!(matches!(result, Err(CheckpointError::ReadFailed { .. })));
        assert!(path.is_dir());
    }

    #[tokio::test]
    async fn test_record_rewrites_full_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.json");
        let store = CheckpointStore::<RenderRecord>::load(&path).await.unwrap();

        assert!(store.record(record("a")).await.unwrap());
        assert!(store.record(record("b")).await.unwrap());
        assert!(!store.record(record("a")).await.unwrap());

        let on_disk: Vec<RenderRecord> =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(on_disk, vec![record("a"), record("b")]);
    }

    #[tokio::test]
    async fn test_reload_skips_completed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        std::fs::write(
            &path,
            serde_json::to_string(&vec![record("a"), record("a"), record("c")]).unwrap(),
        )
        .unwrap();

        let store = CheckpointStore::<RenderRecord>::load(&path).await.unwrap();
        assert_eq!(store.completed_count(), 2);
        assert!(store.is_completed("a"));
        assert!(!store.is_completed("b"));

        let items = vec![Item("a".into()), Item("b".into()), Item("c".into())];
        assert_eq!(store.pending(items), vec![Item("b".into())]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_records_are_all_kept() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        let store = Arc::new(CheckpointStore::<RenderRecord>::load(&path).await.unwrap());

        let mut handles = Vec::new();
        for i in 0..50 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.record(record(&format!("item-{}", i))).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let on_disk: Vec<RenderRecord> =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(on_disk.len(), 50);
        assert_eq!(store.len().await, 50);
    }
}
