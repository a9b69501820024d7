//! 限流调度器 - 编排层
//!
//! 两种上限可以单独或同时使用：
//! - 同时处理中的条目数（Semaphore）
//! - 每个时间窗口内启动的条目数（[`SlidingWindow`]）
//!
//! 达到上限时新条目的启动被推迟，不会被丢弃。

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::config::{Config, DEFAULT_MAX_IN_FLIGHT};
use crate::infrastructure::SlidingWindow;

/// 并发策略
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConcurrencyPolicy {
    /// 同时处理中的最大条目数
    pub max_in_flight: Option<usize>,
    /// 每个窗口内最多启动 `limit` 个条目
    pub per_interval: Option<(usize, Duration)>,
}

impl ConcurrencyPolicy {
    pub fn in_flight(max: usize) -> Self {
        Self {
            max_in_flight: Some(max),
            per_interval: None,
        }
    }

    pub fn per_interval(limit: usize, interval: Duration) -> Self {
        Self {
            max_in_flight: None,
            per_interval: Some((limit, interval)),
        }
    }

    pub fn with_max_in_flight(mut self, max: usize) -> Self {
        self.max_in_flight = Some(max);
        self
    }

    /// 从配置构造生成 / 评测批次使用的策略
    ///
    /// 只配置了时间窗口限流时不限制并发；两者都没配置时使用默认并发上限。
    pub fn from_config(config: &Config) -> Self {
        let max_in_flight = match (config.max_in_flight, config.per_interval_limit) {
            (Some(max), _) => Some(max),
            (None, Some(_)) => None,
            (None, None) => Some(DEFAULT_MAX_IN_FLIGHT),
        };
        Self {
            max_in_flight,
            per_interval: config
                .per_interval_limit
                .map(|limit| (limit, Duration::from_secs(config.interval_secs))),
        }
    }
}

impl std::fmt::Display for ConcurrencyPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.max_in_flight, self.per_interval) {
            (Some(max), Some((limit, interval))) => {
                write!(f, "最多 {} 个并发，每 {:?} 最多启动 {} 个", max, interval, limit)
            }
            (Some(max), None) => write!(f, "最多 {} 个并发", max),
            (None, Some((limit, interval))) => {
                write!(f, "每 {:?} 最多启动 {} 个", interval, limit)
            }
            (None, None) => write!(f, "不限流"),
        }
    }
}

/// 启动许可，drop 时释放并发名额
pub struct StartPermit {
    _slot: Option<OwnedSemaphorePermit>,
}

/// 限流调度器
///
/// 由整个批次共享，每个条目启动前调用一次 [`Scheduler::acquire`]。
pub struct Scheduler {
    policy: ConcurrencyPolicy,
    slots: Option<Arc<Semaphore>>,
    window: Option<SlidingWindow>,
}

impl Scheduler {
    pub fn new(policy: ConcurrencyPolicy) -> Self {
        Self {
            policy,
            slots: policy
                .max_in_flight
                .map(|max| Arc::new(Semaphore::new(max.max(1)))),
            window: policy
                .per_interval
                .map(|(limit, interval)| SlidingWindow::new(limit, interval)),
        }
    }

    pub fn policy(&self) -> ConcurrencyPolicy {
        self.policy
    }

    /// 等待直到允许启动下一个条目
    ///
    /// 先占并发名额，再登记窗口内的启动时间。
    pub async fn acquire(&self) -> Result<StartPermit> {
        let slot = match &self.slots {
            Some(slots) => Some(slots.clone().acquire_owned().await?),
            None => None,
        };

        if let Some(window) = &self.window {
            window.acquire().await;
        }

        Ok(StartPermit { _slot: slot })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::Instant;

    #[tokio::test]
    async fn test_in_flight_high_water_mark() {
        let scheduler = Arc::new(Scheduler::new(ConcurrencyPolicy::in_flight(3)));
        let current = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for i in 0..20u64 {
            let permit = scheduler.acquire().await.unwrap();
            let current = current.clone();
            let peak = peak.clone();
            handles.push(tokio::spawn(async move {
                let _permit = permit;
                let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5 + i % 4)).await;
                current.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert!(peak.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_per_interval_delays_instead_of_dropping() {
        let scheduler = Scheduler::new(ConcurrencyPolicy::per_interval(
            2,
            Duration::from_secs(30),
        ));
        let begin = Instant::now();

        for _ in 0..5 {
            scheduler.acquire().await.unwrap();
        }

        // 5 次启动需要 3 个窗口：0s、30s、60s
        assert!(Instant::now() - begin >= Duration::from_secs(60));
    }

    #[test]
    fn test_policy_from_config() {
        let config = Config {
            max_in_flight: Some(12),
            per_interval_limit: Some(4),
            interval_secs: 60,
            ..Config::default()
        };
        let policy = ConcurrencyPolicy::from_config(&config);
        assert_eq!(policy.max_in_flight, Some(12));
        assert_eq!(policy.per_interval, Some((4, Duration::from_secs(60))));
    }

    #[test]
    fn test_throttle_only_policy_from_config() {
        let config = Config {
            per_interval_limit: Some(4),
            ..Config::default()
        };
        let policy = ConcurrencyPolicy::from_config(&config);
        assert_eq!(policy, ConcurrencyPolicy::per_interval(4, Duration::from_secs(60)));

        let policy = ConcurrencyPolicy::from_config(&Config::default());
        assert_eq!(policy, ConcurrencyPolicy::in_flight(DEFAULT_MAX_IN_FLIGHT));
    }
}
