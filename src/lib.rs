//! # LongMem Bench
//!
//! 长上下文问答基准的生成与评测工具：把历史对话以文本、图片或 PDF 的形式
//! 交给模型作答，再用 judge 模型评分，最后汇总准确率和 token 用量。
//!
//! ## 架构设计
//!
//! 本系统采用四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有共享资源，只暴露能力
//! - `CheckpointStore` - 结果文件的唯一 owner，提供 load / record
//! - `SlidingWindow` - 时间窗口限流
//!
//! ### ② 业务能力层（Services / Render）
//! - `services/` - 生成能力（OpenAI 兼容接口 / Gemini 原生接口）与提示词
//! - `render/` - 切块、HTML 模板、无头浏览器渲染
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一个条目"如何变成一条结果记录
//! - `AnswerJob` / `JudgeJob` / `RenderImageJob` / `RenderPdfJob`
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/batch_processor` - 断点续跑、限流、失败隔离、进度
//! - `orchestrator/app` - 子命令入口
//!
//! ## 模块结构

pub mod browser;
pub mod cli;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod logger;
pub mod models;
pub mod orchestrator;
pub mod render;
pub mod report;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::Config;
pub use error::{AppError, AppResult};
pub use infrastructure::CheckpointStore;
pub use models::question::{Question, WorkItem};
pub use orchestrator::{App, BatchProcessor, BatchSummary, ConcurrencyPolicy};
pub use workflow::{ItemCtx, Job};
