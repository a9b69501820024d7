/// 日志工具模块
///
/// 提供日志格式化和输出的辅助函数
use tracing::info;

/// 记录程序启动信息
///
/// # 参数
/// - `command`: 子命令名
/// - `model`: 使用的模型（渲染命令为 `None`）
/// - `policy`: 限流策略描述
pub fn log_startup(command: &str, model: Option<&str>, policy: &str) {
    info!("{}", "=".repeat(60));
    info!(
        "🚀 程序启动 - {} ({})",
        command,
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    if let Some(model) = model {
        info!("🤖 模型: {}", model);
    }
    info!("📊 限流策略: {}", policy);
    info!("{}", "=".repeat(60));
}

/// 记录批次加载信息
///
/// # 参数
/// - `job`: 任务名
/// - `total`: 条目总数
/// - `completed`: 检查点中已完成的条目数
/// - `pending`: 本次需要处理的条目数
pub fn log_batch_loaded(job: &str, total: usize, completed: usize, pending: usize) {
    info!("✓ [{}] 共 {} 个条目", job, total);
    if completed > 0 {
        info!("📂 检查点中已完成 {} 个，本次跳过", completed);
    }
    info!("📋 本次待处理 {} 个\n", pending);
}

/// 记录批次完成信息
///
/// # 参数
/// - `job`: 任务名
/// - `succeeded`: 成功数量
/// - `failed`: 失败数量
/// - `skipped`: 因已完成而跳过的数量
pub fn log_batch_complete(job: &str, succeeded: usize, failed: usize, skipped: usize) {
    info!("\n{}", "─".repeat(60));
    info!(
        "✓ [{}] 批次完成: 成功 {}，失败 {}，跳过（已完成）{}",
        job, succeeded, failed, skipped
    );
    info!("{}", "─".repeat(60));
}

/// 打印最终统计信息
///
/// # 参数
/// - `succeeded`: 成功数量
/// - `failed`: 失败数量
/// - `total`: 总数
/// - `output_path`: 结果文件路径
pub fn print_final_stats(succeeded: usize, failed: usize, total: usize, output_path: &str) {
    info!("\n{}", "=".repeat(60));
    info!("📊 全部处理完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("✅ 成功: {}/{}", succeeded, total);
    info!("❌ 失败: {}", failed);
    if failed > 0 {
        info!("💡 失败的条目会在下次运行时重试");
    }
    info!("{}", "=".repeat(60));
    info!("\n结果已保存至: {}", output_path);
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_text_counts_chars() {
        assert_eq!(truncate_text("你好世界", 2), "你好...");
        assert_eq!(truncate_text("short", 10), "short");
    }
}
