pub mod logging;
pub mod progress;

pub use logging::truncate_text;
pub use progress::batch_progress;
