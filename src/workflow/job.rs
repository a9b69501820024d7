//! 单条目任务抽象 - 流程层
//!
//! 一个任务 = 请求构造 + 响应映射：把一个工作条目变成一条可写入检查点的记录。
//! 任务本身不持有检查点，也不关心并发和进度。

use anyhow::Result;
use async_trait::async_trait;

use crate::models::question::WorkItem;
use crate::models::record::CheckpointRecord;
use crate::workflow::item_ctx::ItemCtx;

/// 单条目任务
#[async_trait]
pub trait Job: Send + Sync + 'static {
    /// 输入条目
    type Item: WorkItem + Send + Sync + 'static;
    /// 写入检查点的记录
    type Record: CheckpointRecord;

    /// 任务名，用于日志
    fn name(&self) -> &'static str;

    /// 处理一个条目
    ///
    /// 返回 `Err` 时该条目不会写入检查点，下次运行时重新处理。
    async fn run(&self, item: &Self::Item, ctx: &ItemCtx) -> Result<Self::Record>;
}
