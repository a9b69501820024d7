//! 批量处理器 - 编排层
//!
//! ## 职责
//!
//! 把一组工作条目交给同一个 [`Job`] 处理：
//!
//! 1. **断点续跑**：启动时用检查点过滤掉已完成的条目
//! 2. **并发控制**：每个条目启动前向 [`Scheduler`] 申请许可
//! 3. **增量持久化**：每完成一条立即写入检查点，写盘成功后进度条前进
//! 4. **失败隔离**：单个条目的错误或 panic 只记录日志，不影响其他条目
//! 5. **批次统计**：汇总成功 / 失败 / 跳过的数量
//!
//! ## 设计特点
//!
//! - **不关心业务**：请求怎么构造、响应怎么映射都由 Job 决定
//! - **不做重试**：失败的条目留给下一次运行，由检查点决定
//! - **并发安全**：检查点是唯一的共享可变状态，内部自带锁

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use anyhow::Result;
use futures::FutureExt;
use indicatif::ProgressBar;
use tokio::task::JoinSet;
use tracing::{error, warn};

use crate::infrastructure::CheckpointStore;
use crate::models::question::WorkItem;
use crate::orchestrator::scheduler::{ConcurrencyPolicy, Scheduler};
use crate::utils::logging;
use crate::workflow::{ItemCtx, Job};

/// 批次统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// 输入条目总数
    pub total: usize,
    /// 启动前已在检查点中的条目数
    pub already_completed: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl BatchSummary {
    /// 本次实际尝试的条目数
    pub fn attempted(&self) -> usize {
        self.succeeded + self.failed
    }
}

/// 单个条目的处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ItemOutcome {
    Succeeded,
    Failed,
}

/// 批量处理器
pub struct BatchProcessor<J: Job> {
    job: Arc<J>,
    store: Arc<CheckpointStore<J::Record>>,
    scheduler: Arc<Scheduler>,
    show_progress: bool,
}

impl<J: Job> BatchProcessor<J> {
    pub fn new(job: J, store: CheckpointStore<J::Record>, policy: ConcurrencyPolicy) -> Self {
        Self {
            job: Arc::new(job),
            store: Arc::new(store),
            scheduler: Arc::new(Scheduler::new(policy)),
            show_progress: false,
        }
    }

    /// 是否在 stderr 上显示进度条
    pub fn with_progress(mut self, visible: bool) -> Self {
        self.show_progress = visible;
        self
    }

    pub fn store(&self) -> &Arc<CheckpointStore<J::Record>> {
        &self.store
    }

    pub fn policy(&self) -> ConcurrencyPolicy {
        self.scheduler.policy()
    }

    /// 处理一个批次
    ///
    /// 只有输入错误才会返回 `Err`；单个条目的失败计入 [`BatchSummary::failed`]。
    pub async fn run(&self, items: Vec<J::Item>) -> Result<BatchSummary> {
        let total = items.len();
        let pending = self.store.pending(items);
        let already_completed = total - pending.len();
        let pending_total = pending.len();

        logging::log_batch_loaded(self.job.name(), total, already_completed, pending_total);

        let progress =
            crate::utils::batch_progress(total, already_completed, self.show_progress);

        let mut tasks = JoinSet::new();
        for (idx, item) in pending.into_iter().enumerate() {
            let permit = self.scheduler.acquire().await?;

            let ctx = ItemCtx::new(self.job.name(), item.item_id(), idx + 1, pending_total);
            let job = self.job.clone();
            let store = self.store.clone();
            let progress = progress.clone();

            tasks.spawn(async move {
                let _permit = permit;
                let outcome = AssertUnwindSafe(process_item(&*job, &store, &progress, &item, &ctx))
                    .catch_unwind()
                    .await;

                match outcome {
                    Ok(outcome) => outcome,
                    Err(panic) => {
                        error!("{} ❌ 处理过程中发生 panic: {}", ctx, panic_message(&*panic));
                        ItemOutcome::Failed
                    }
                }
            });
        }

        // 等待所有任务完成
        let mut summary = BatchSummary {
            total,
            already_completed,
            ..Default::default()
        };

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(ItemOutcome::Succeeded) => summary.succeeded += 1,
                Ok(ItemOutcome::Failed) => summary.failed += 1,
                Err(e) => {
                    error!("任务执行失败: {}", e);
                    summary.failed += 1;
                }
            }
        }

        progress.finish_and_clear();
        logging::log_batch_complete(
            self.job.name(),
            summary.succeeded,
            summary.failed,
            summary.already_completed,
        );

        Ok(summary)
    }
}

/// 处理单个条目：运行任务 → 写检查点 → 推进进度
async fn process_item<J: Job>(
    job: &J,
    store: &CheckpointStore<J::Record>,
    progress: &ProgressBar,
    item: &J::Item,
    ctx: &ItemCtx,
) -> ItemOutcome {
    let record = match job.run(item, ctx).await {
        Ok(record) => record,
        Err(e) => {
            error!("{} ❌ 处理失败: {:#}", ctx, e);
            return ItemOutcome::Failed;
        }
    };

    match store.record(record).await {
        Ok(written) => {
            if !written {
                warn!("{} 结果已存在，未重复写入", ctx);
            }
            progress.inc(1);
            ItemOutcome::Succeeded
        }
        Err(e) => {
            error!("{} ❌ 写入检查点失败: {}", ctx, e);
            ItemOutcome::Failed
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "未知 panic".to_string()
    }
}
