//! 条目处理上下文
//!
//! 封装"我正在处理哪个批次的第几个条目"这一信息

use std::fmt::Display;

/// 条目处理上下文
#[derive(Debug, Clone)]
pub struct ItemCtx {
    /// 任务名（generate / evaluate / render-images ...）
    pub job: &'static str,

    /// 条目 ID
    pub item_id: String,

    /// 条目在本次待处理列表中的序号（从1开始，仅用于日志显示）
    pub index: usize,

    /// 本次待处理条目总数
    pub total: usize,
}

impl ItemCtx {
    /// 创建新的条目上下文
    pub fn new(job: &'static str, item_id: impl Into<String>, index: usize, total: usize) -> Self {
        Self {
            job,
            item_id: item_id.into(),
            index,
            total,
        }
    }
}

impl Display for ItemCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{} {}/{} #{}]",
            self.job, self.index, self.total, self.item_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let ctx = ItemCtx::new("generate", "q_abs", 3, 10);
        assert_eq!(ctx.to_string(), "[generate 3/10 #q_abs]");
    }
}
