//! 基础设施层：持有共享资源（结果文件、限流窗口），只暴露能力

pub mod checkpoint;
pub mod throttle;

pub use checkpoint::CheckpointStore;
pub use throttle::SlidingWindow;
