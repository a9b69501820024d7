pub mod loaders;
pub mod question;
pub mod question_type;
pub mod record;
pub mod usage;

pub use loaders::{load_dataset, load_json_array};
pub use question::{Message, Question, Role, Session, WorkItem};
pub use question_type::JudgeRubric;
pub use record::{CheckpointRecord, EvalRecord, JudgeLabel, RenderRecord, ResultRecord};
pub use usage::TokenUsage;
