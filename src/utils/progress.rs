//! 进度条
//!
//! 长度 = 批次总数，初始位置 = 检查点中已完成的条目数，
//! 每次检查点写盘成功后前进一格。

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

const TEMPLATE: &str = "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}";

/// 创建批次进度条，`visible` 为 false 时返回隐藏的进度条
pub fn batch_progress(total: usize, completed: usize, visible: bool) -> ProgressBar {
    if !visible {
        let pb = ProgressBar::hidden();
        pb.set_length(total as u64);
        pb.set_position(completed as u64);
        return pb;
    }

    let pb = ProgressBar::with_draw_target(Some(total as u64), ProgressDrawTarget::stderr());
    if let Ok(style) = ProgressStyle::with_template(TEMPLATE) {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb.set_position(completed as u64);
    pb
}
