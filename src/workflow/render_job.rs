//! 渲染任务 - 流程层
//!
//! - `RenderImageJob`: 一个切块 → `<out>/<question_id>/<chunk_index>.png`
//! - `RenderPdfJob`: 一道题的全部会话 → `<out>/<question_id>.pdf`
//! - `PdfToImagesJob`: `<question_id>.pdf` → `<out>/<question_id>/page.N.png`

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::fs;
use tracing::debug;

use crate::error::RenderError;
use crate::models::question::{Question, WorkItem};
use crate::models::record::RenderRecord;
use crate::render::chunker::Chunk;
use crate::render::html;
use crate::render::rasterizer::Rasterizer;
use crate::render::renderer::Renderer;
use crate::workflow::item_ctx::ItemCtx;
use crate::workflow::job::Job;

/// 切块渲染成图片
pub struct RenderImageJob {
    renderer: Arc<dyn Renderer>,
    out_dir: PathBuf,
}

impl RenderImageJob {
    pub fn new(renderer: Arc<dyn Renderer>, out_dir: impl Into<PathBuf>) -> Self {
        Self {
            renderer,
            out_dir: out_dir.into(),
        }
    }

    pub fn output_path(&self, chunk: &Chunk) -> PathBuf {
        self.out_dir
            .join(&chunk.question_id)
            .join(format!("{}.png", chunk.chunk_index))
    }
}

#[async_trait]
impl Job for RenderImageJob {
    type Item = Chunk;
    type Record = RenderRecord;

    fn name(&self) -> &'static str {
        "render-images"
    }

    async fn run(&self, chunk: &Chunk, ctx: &ItemCtx) -> Result<RenderRecord> {
        let path = self.output_path(chunk);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("{} 创建目录失败: {}", ctx, parent.display()))?;
        }

        self.renderer
            .render_png(&html::chunk_html(chunk), &path)
            .await?;

        Ok(RenderRecord {
            item_id: chunk.chunk_id.clone(),
            path: path.display().to_string(),
        })
    }
}

/// 整段对话渲染成 PDF
pub struct RenderPdfJob {
    renderer: Arc<dyn Renderer>,
    out_dir: PathBuf,
}

impl RenderPdfJob {
    pub fn new(renderer: Arc<dyn Renderer>, out_dir: impl Into<PathBuf>) -> Self {
        Self {
            renderer,
            out_dir: out_dir.into(),
        }
    }

    pub fn output_path(&self, question: &Question) -> PathBuf {
        self.out_dir.join(format!("{}.pdf", question.question_id))
    }
}

#[async_trait]
impl Job for RenderPdfJob {
    type Item = Question;
    type Record = RenderRecord;

    fn name(&self) -> &'static str {
        "render-pdfs"
    }

    async fn run(&self, question: &Question, ctx: &ItemCtx) -> Result<RenderRecord> {
        fs::create_dir_all(&self.out_dir)
            .await
            .with_context(|| format!("{} 创建目录失败: {}", ctx, self.out_dir.display()))?;

        let path = self.output_path(question);
        self.renderer
            .render_pdf(&html::conversation_html(question), &path)
            .await?;

        Ok(RenderRecord {
            item_id: question.question_id.clone(),
            path: path.display().to_string(),
        })
    }
}

/// 待栅格化的 PDF
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfFile {
    /// 文件名第一个 `.` 之前的部分，即题目 ID
    pub question_id: String,
    pub path: PathBuf,
}

impl WorkItem for PdfFile {
    fn item_id(&self) -> &str {
        &self.question_id
    }
}

/// 列出目录下的 PDF，按文件名排序
pub async fn list_pdfs(dir: &Path) -> Result<Vec<PdfFile>, RenderError> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(RenderError::MissingContext {
                path: dir.to_path_buf(),
            })
        }
        Err(e) => return Err(RenderError::page_failed(dir, e)),
    };

    let mut pdfs = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| RenderError::page_failed(dir, e))?
    {
        let path = entry.path();
        let is_pdf = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("pdf"))
            .unwrap_or(false);
        let question_id = path
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(|name| name.split('.').next())
            .filter(|id| !id.is_empty())
            .map(str::to_string);

        if let (true, Some(question_id)) = (is_pdf, question_id) {
            pdfs.push(PdfFile { question_id, path });
        }
    }

    pdfs.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(pdfs)
}

/// PDF 逐页栅格化成图片
pub struct PdfToImagesJob {
    rasterizer: Arc<dyn Rasterizer>,
    out_dir: PathBuf,
}

impl PdfToImagesJob {
    pub fn new(rasterizer: Arc<dyn Rasterizer>, out_dir: impl Into<PathBuf>) -> Self {
        Self {
            rasterizer,
            out_dir: out_dir.into(),
        }
    }

    pub fn output_dir(&self, pdf: &PdfFile) -> PathBuf {
        self.out_dir.join(&pdf.question_id)
    }
}

#[async_trait]
impl Job for PdfToImagesJob {
    type Item = PdfFile;
    type Record = RenderRecord;

    fn name(&self) -> &'static str {
        "pdf-to-images"
    }

    async fn run(&self, pdf: &PdfFile, ctx: &ItemCtx) -> Result<RenderRecord> {
        let dir = self.output_dir(pdf);
        fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("{} 创建目录失败: {}", ctx, dir.display()))?;

        let pages = self.rasterizer.rasterize(&pdf.path, &dir).await?;
        debug!("{} 🖼️ 共 {} 页", ctx, pages);

        Ok(RenderRecord {
            item_id: pdf.question_id.clone(),
            path: dir.display().to_string(),
        })
    }
}
