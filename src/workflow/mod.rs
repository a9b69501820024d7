//! 流程层：定义"一个条目"如何变成一条结果记录

pub mod answer_job;
pub mod item_ctx;
pub mod job;
pub mod judge_job;
pub mod render_job;

pub use answer_job::{AnswerJob, ContextMode};
pub use item_ctx::ItemCtx;
pub use job::Job;
pub use judge_job::{pair_with_references, JudgeItem, JudgeJob};
pub use render_job::{list_pdfs, PdfFile, PdfToImagesJob, RenderImageJob, RenderPdfJob};
