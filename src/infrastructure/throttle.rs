//! 时间窗口限流 - 基础设施层
//!
//! 滑动日志实现：记录最近一个窗口内每次启动的时间点，
//! 任意长度为 `interval` 的窗口（无论是否对齐）内的启动次数都不超过 `limit`。

use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};
use tracing::debug;

/// 滑动窗口限流器
pub struct SlidingWindow {
    limit: usize,
    interval: Duration,
    starts: Mutex<VecDeque<Instant>>,
}

impl SlidingWindow {
    /// # 参数
    /// - `limit`: 每个窗口允许的最大启动次数，必须大于 0
    /// - `interval`: 窗口长度
    pub fn new(limit: usize, interval: Duration) -> Self {
        Self {
            limit: limit.max(1),
            interval,
            starts: Mutex::new(VecDeque::with_capacity(limit)),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// 等待直到可以启动下一个条目，并登记本次启动
    ///
    /// 等待期间持有锁，排队的调用者按到达顺序依次放行。
    pub async fn acquire(&self) {
        let mut starts = self.starts.lock().await;

        loop {
            let now = Instant::now();
            while let Some(&oldest) = starts.front() {
                if now.duration_since(oldest) >= self.interval {
                    starts.pop_front();
                } else {
                    break;
                }
            }

            if starts.len() < self.limit {
                starts.push_back(now);
                return;
            }

            if let Some(&oldest) = starts.front() {
                let ready_at = oldest + self.interval;
                debug!(
                    "⏳ 已达到限流上限 {}/{:?}，等待 {:?}",
                    self.limit,
                    self.interval,
                    ready_at.saturating_duration_since(now)
                );
                sleep_until(ready_at).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_first_burst_passes_immediately() {
        let window = SlidingWindow::new(3, Duration::from_secs(60));
        let begin = Instant::now();

        for _ in 0..3 {
            window.acquire().await;
        }

        assert_eq!(Instant::now(), begin);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fourth_start_waits_for_window() {
        let window = SlidingWindow::new(3, Duration::from_secs(60));
        let begin = Instant::now();

        for _ in 0..4 {
            window.acquire().await;
        }

        assert!(Instant::now() - begin >= Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_window_exceeds_limit() {
        let limit = 4;
        let interval = Duration::from_secs(10);
        let window = Arc::new(SlidingWindow::new(limit, interval));
        let starts = Arc::new(Mutex::new(Vec::new()));

        let mut handles = Vec::new();
        for i in 0..25u64 {
            let window = window.clone();
            let starts = starts.clone();
            handles.push(tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(i * 700)).await;
                window.acquire().await;
                starts.lock().await.push(Instant::now());
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let mut starts = starts.lock().await.clone();
        starts.sort();
        assert_eq!(starts.len(), 25);
        for (i, &start) in starts.iter().enumerate() {
            let in_window = starts[i..]
                .iter()
                .take_while(|&&t| t.duration_since(start) < interval)
                .count();
            assert!(in_window <= limit, "窗口内启动 {} 次", in_window);
        }
    }
}
