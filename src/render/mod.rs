//! 上下文渲染：切块、HTML 模板、浏览器渲染、PDF 栅格化

pub mod chunker;
pub mod html;
pub mod rasterizer;
pub mod renderer;

pub use chunker::{chunk_dataset, chunk_question, split_messages, Chunk, ChunkBoundary};
pub use rasterizer::{PdfiumRasterizer, Rasterizer};
pub use renderer::{ChromiumRenderer, Renderer};
