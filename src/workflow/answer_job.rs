//! 答案生成任务 - 流程层
//!
//! 流程：准备上下文（文本 / 图片页 / PDF）→ 调用生成服务 → 写出 `ResultRecord`

use std::cmp::Ordering;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, info};

use crate::error::RenderError;
use crate::models::question::Question;
use crate::models::record::ResultRecord;
use crate::services::generation::{Attachment, GenerationRequest, Generator};
use crate::services::prompts;
use crate::utils::logging::truncate_text;
use crate::workflow::item_ctx::ItemCtx;
use crate::workflow::job::Job;

/// 上下文的呈现方式
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextMode {
    /// 全部会话拼进文本提示词
    Text,
    /// `<dir>/<question_id>/` 下渲染好的图片页
    Images { dir: PathBuf },
    /// `<dir>/<question_id>.pdf`
    Pdf { dir: PathBuf },
}

impl ContextMode {
    pub fn label(&self) -> &'static str {
        match self {
            ContextMode::Text => "text",
            ContextMode::Images { .. } => "images",
            ContextMode::Pdf { .. } => "pdf",
        }
    }
}

/// 答案生成任务
pub struct AnswerJob {
    generator: Arc<dyn Generator>,
    mode: ContextMode,
    /// 图片模式下要求的最少页数，不足时视为失败，下次运行重试
    min_images: Option<usize>,
    verbose_logging: bool,
}

impl AnswerJob {
    pub fn new(generator: Arc<dyn Generator>, mode: ContextMode) -> Self {
        Self {
            generator,
            mode,
            min_images: None,
            verbose_logging: false,
        }
    }

    pub fn with_min_images(mut self, min_images: Option<usize>) -> Self {
        self.min_images = min_images;
        self
    }

    pub fn with_verbose_logging(mut self, verbose: bool) -> Self {
        self.verbose_logging = verbose;
        self
    }

    /// 按上下文模式构造请求
    async fn build_request(&self, question: &Question) -> Result<GenerationRequest> {
        let request = match &self.mode {
            ContextMode::Text => GenerationRequest::text(prompts::full_text_context_prompt(question)),
            ContextMode::Images { dir } => {
                let folder = dir.join(&question.question_id);
                let images = list_context_images(&folder).await?;
                let required = self.min_images.unwrap_or(1);
                if images.len() < required {
                    return Err(RenderError::IncompleteContext {
                        path: folder,
                        required,
                        found: images.len(),
                    }
                    .into());
                }

                let mut attachments = Vec::with_capacity(images.len());
                for path in &images {
                    let data = fs::read(path)
                        .await
                        .with_context(|| format!("读取图片失败: {}", path.display()))?;
                    attachments.push(Attachment::new(image_mime_type(path), data));
                }
                debug!("[{}] 载入 {} 张上下文图片", question.question_id, attachments.len());

                GenerationRequest::text(prompts::image_context_prompt(question))
                    .with_attachments(attachments)
            }
            ContextMode::Pdf { dir } => {
                let path = dir.join(format!("{}.pdf", question.question_id));
                let data = match fs::read(&path).await {
                    Ok(data) => data,
                    Err(e) if e.kind() == ErrorKind::NotFound => {
                        return Err(RenderError::MissingContext { path }.into());
                    }
                    Err(e) => {
                        return Err(e).with_context(|| format!("读取 PDF 失败: {}", path.display()));
                    }
                };

                GenerationRequest::text(prompts::pdf_context_prompt(question))
                    .with_attachments(vec![Attachment::new("application/pdf", data)])
            }
        };
        Ok(request)
    }
}

#[async_trait]
impl Job for AnswerJob {
    type Item = Question;
    type Record = ResultRecord;

    fn name(&self) -> &'static str {
        "generate"
    }

    async fn run(&self, question: &Question, ctx: &ItemCtx) -> Result<ResultRecord> {
        let request = self.build_request(question).await?;

        let generation = self
            .generator
            .generate(&request)
            .await
            .with_context(|| format!("{} 生成答案失败", ctx))?;

        if self.verbose_logging {
            info!(
                "{} 💬 {}",
                ctx,
                truncate_text(&generation.text.replace('\n', " "), 80)
            );
        }

        Ok(ResultRecord {
            question_id: question.question_id.clone(),
            hypothesis: generation.text,
            usage: generation.usage,
        })
    }
}

/// 列出目录下的图片页，按文件名中的数字自然排序（2.png 在 10.png 之前）
pub async fn list_context_images(dir: &Path) -> Result<Vec<PathBuf>, RenderError> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(RenderError::MissingContext {
                path: dir.to_path_buf(),
            })
        }
        Err(e) => return Err(RenderError::page_failed(dir, e)),
    };

    let mut images = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| RenderError::page_failed(dir, e))?
    {
        let path = entry.path();
        let is_image = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| matches!(ext.to_ascii_lowercase().as_str(), "png" | "jpg" | "jpeg"))
            .unwrap_or(false);
        if is_image {
            images.push(path);
        }
    }

    images.sort_by(|a, b| natural_cmp(a, b));
    Ok(images)
}

fn natural_cmp(a: &Path, b: &Path) -> Ordering {
    let key = |p: &Path| {
        let stem = p
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let number: Option<u64> = stem
            .chars()
            .filter(char::is_ascii_digit)
            .collect::<String>()
            .parse()
            .ok();
        (number, stem)
    };
    key(a).cmp(&key(b))
}

fn image_mime_type(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .as_deref()
    {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        _ => "image/png",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceError;
    use crate::models::usage::TokenUsage;
    use crate::services::generation::Generation;
    use std::sync::Mutex;

    /// 记录收到的请求并返回固定答案
    #[derive(Default)]
    struct EchoGenerator {
        requests: Mutex<Vec<GenerationRequest>>,
    }

    #[async_trait]
    impl Generator for EchoGenerator {
        fn model(&self) -> &str {
            "echo"
        }

        async fn generate(&self, request: &GenerationRequest) -> Result<Generation, ServiceError> {
            self.requests.lock().unwrap().push(request.clone());
            Ok(Generation {
                text: "three".to_string(),
                usage: TokenUsage::new(10, 2, 1),
            })
        }
    }

    fn question(id: &str) -> Question {
        serde_json::from_value(serde_json::json!({
            "question_id": id,
            "question_type": "multi-session",
            "question": "How many?",
            "answer": "3",
            "question_date": "2023/05/30",
            "haystack_dates": ["2023/05/20"],
            "haystack_session_ids": ["s1"],
            "haystack_sessions": [[{"role": "user", "content": "hello"}]],
            "answer_session_ids": []
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_text_mode_produces_result_record() {
        let generator = Arc::new(EchoGenerator::default());
        let job = AnswerJob::new(generator.clone(), ContextMode::Text);
        let ctx = ItemCtx::new("generate", "q1", 1, 1);

        let record = job.run(&question("q1"), &ctx).await.unwrap();

        assert_eq!(record.question_id, "q1");
        assert_eq!(record.hypothesis, "three");
        assert_eq!(record.usage.total_tokens, 12);
        let requests = generator.requests.lock().unwrap();
        assert!(requests[0].prompt.contains("Session Content:"));
        assert!(requests[0].attachments.is_empty());
    }

    #[tokio::test]
    async fn test_images_are_sent_in_natural_order() {
        let dir = tempfile::tempdir().unwrap();
        let folder = dir.path().join("q1");
        std::fs::create_dir_all(&folder).unwrap();
        for name in ["10.png", "2.png", "1.png", "notes.txt"] {
            std::fs::write(folder.join(name), name.as_bytes()).unwrap();
        }

        let generator = Arc::new(EchoGenerator::default());
        let job = AnswerJob::new(
            generator.clone(),
            ContextMode::Images {
                dir: dir.path().to_path_buf(),
            },
        );
        job.run(&question("q1"), &ItemCtx::new("generate", "q1", 1, 1))
            .await
            .unwrap();

        let requests = generator.requests.lock().unwrap();
        let pages: Vec<&[u8]> = requests[0]
            .attachments
            .iter()
            .map(|a| a.data.as_slice())
            .collect();
        assert_eq!(pages, vec![&b"1.png"[..], &b"2.png"[..], &b"10.png"[..]]);
        assert!(requests[0].attachments.iter().all(|a| a.mime_type == "image/png"));
    }

    #[tokio::test]
    async fn test_missing_image_folder_is_item_failure() {
        let dir = tempfile::tempdir().unwrap();
        let job = AnswerJob::new(
            Arc::new(EchoGenerator::default()),
            ContextMode::Images {
                dir: dir.path().to_path_buf(),
            },
        );

        let err = job
            .run(&question("q9"), &ItemCtx::new("generate", "q9", 1, 1))
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RenderError>(),
            Some(RenderError::MissingContext { .. })
        ));
    }

    #[tokio::test]
    async fn test_min_images_rejects_incomplete_folder() {
        let dir = tempfile::tempdir().unwrap();
        let folder = dir.path().join("q1");
        std::fs::create_dir_all(&folder).unwrap();
        std::fs::write(folder.join("1.png"), b"x").unwrap();

        let job = AnswerJob::new(
            Arc::new(EchoGenerator::default()),
            ContextMode::Images {
                dir: dir.path().to_path_buf(),
            },
        )
        .with_min_images(Some(3));

        let err = job
            .run(&question("q1"), &ItemCtx::new("generate", "q1", 1, 1))
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RenderError>(),
            Some(RenderError::IncompleteContext {
                required: 3,
                found: 1,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_unreadable_pdf_is_not_reported_as_missing() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("q1.pdf")).unwrap();

        let job = AnswerJob::new(
            Arc::new(EchoGenerator::default()),
            ContextMode::Pdf {
                dir: dir.path().to_path_buf(),
            },
        );
        let err = job
            .run(&question("q1"), &ItemCtx::new("generate", "q1", 1, 1))
            .await
            .unwrap_err();

        assert!(err.downcast_ref::<RenderError>().is_none());
        assert!(err.to_string().contains("读取 PDF 失败"));
    }

    #[tokio::test]
    async fn test_rasterized_pages_sort_naturally() {
        let dir = tempfile::tempdir().unwrap();
        for n in [10, 2, 1] {
            std::fs::write(dir.path().join(format!("page.{}.png", n)), b"x").unwrap();
        }

        let images = list_context_images(dir.path()).await.unwrap();
        let names: Vec<String> = images
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["page.1.png", "page.2.png", "page.10.png"]);
    }

    #[tokio::test]
    async fn test_pdf_mode_attaches_document() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("q1.pdf"), b"%PDF").unwrap();

        let generator = Arc::new(EchoGenerator::default());
        let job = AnswerJob::new(
            generator.clone(),
            ContextMode::Pdf {
                dir: dir.path().to_path_buf(),
            },
        );
        job.run(&question("q1"), &ItemCtx::new("generate", "q1", 1, 1))
            .await
            .unwrap();

        let requests = generator.requests.lock().unwrap();
        assert_eq!(requests[0].attachments[0].mime_type, "application/pdf");
        assert!(requests[0].prompt.contains("attached PDF"));
    }
}
