//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责批量处理和流程调度，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `app` - 应用入口
//! - 每个子命令一个处理函数
//! - 加载输入、打开检查点、选择 Job 和限流策略
//! - 持有浏览器等重量级资源，批次结束后释放
//!
//! ### `batch_processor` - 批量处理器
//! - 用检查点过滤已完成的条目
//! - 通过调度器控制并发，tokio::spawn 执行每个条目
//! - 每完成一条写一次检查点，然后推进进度条
//! - 输出批次统计
//!
//! ### `scheduler` - 限流调度器
//! - 同时处理中的条目数上限（Semaphore）
//! - 时间窗口内的启动次数上限（滑动窗口）
//!
//! ## 层次关系
//!
//! ```text
//! app (处理子命令)
//!     ↓
//! batch_processor (处理 Vec<Item>)
//!     ↓
//! workflow::Job (处理单个 Item)
//!     ↓
//! services / render (能力层：生成 / 渲染)
//!     ↓
//! infrastructure (基础设施：检查点、限流窗口)
//! ```

pub mod app;
pub mod batch_processor;
pub mod scheduler;

// 重新导出主要类型
pub use app::App;
pub use batch_processor::{BatchProcessor, BatchSummary};
pub use scheduler::{ConcurrencyPolicy, Scheduler};
