//! 评测报告

pub mod aggregator;

pub use aggregator::{aggregate, load_eval_records, write_report, Report};
