//! 业务能力层：生成服务与提示词，不关心条目流程

pub mod gemini_service;
pub mod generation;
pub mod openai_service;
pub mod prompts;

pub use gemini_service::GeminiGenerator;
pub use generation::{build_generator, Attachment, Generation, GenerationRequest, Generator};
pub use openai_service::OpenAiGenerator;
