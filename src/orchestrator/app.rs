//! 应用入口 - 编排层
//!
//! 每个子命令对应一个处理函数：加载输入 → 打开检查点 → 组装 Job 与限流策略 →
//! 交给 [`BatchProcessor`] → 输出统计。输入错误在任何条目开始之前返回。

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::{info, warn};

use crate::cli::{
    ChunkArgs, Commands, ContextKind, EvaluateArgs, GenerateArgs, PdfToImagesArgs,
    RenderImagesArgs, RenderPdfsArgs, ReportArgs,
};
use crate::config::Config;
use crate::infrastructure::CheckpointStore;
use crate::models::loaders::{ensure_unique_ids, load_dataset, load_json_array};
use crate::models::record::ResultRecord;
use crate::orchestrator::batch_processor::{BatchProcessor, BatchSummary};
use crate::orchestrator::scheduler::ConcurrencyPolicy;
use crate::render::chunker::{chunk_dataset, Chunk};
use crate::render::rasterizer::{PdfiumRasterizer, Rasterizer};
use crate::render::renderer::{ChromiumRenderer, Renderer};
use crate::report;
use crate::services::build_generator;
use crate::utils::logging;
use crate::workflow::{
    list_pdfs, pair_with_references, AnswerJob, ContextMode, JudgeJob, PdfToImagesJob,
    RenderImageJob, RenderPdfJob,
};

/// 应用主结构
#[derive(Debug)]
pub struct App {
    config: Config,
    /// 只处理前 N 个条目
    limit: Option<usize>,
}

impl App {
    /// 校验配置并创建应用
    pub fn new(config: Config, limit: Option<usize>) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, limit })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// 运行子命令
    pub async fn run(&self, command: Commands) -> Result<()> {
        match command {
            Commands::Generate(args) => self.generate(args).await.map(|_| ()),
            Commands::Evaluate(args) => self.evaluate(args).await.map(|_| ()),
            Commands::Report(args) => self.report(args).await,
            Commands::Chunk(args) => self.chunk(args).await.map(|_| ()),
            Commands::RenderImages(args) => self.render_images(args).await.map(|_| ()),
            Commands::RenderPdfs(args) => self.render_pdfs(args).await.map(|_| ()),
            Commands::PdfToImages(args) => self.pdf_to_images(args).await.map(|_| ()),
        }
    }

    /// 生成答案
    pub async fn generate(&self, args: GenerateArgs) -> Result<BatchSummary> {
        self.config.require_api_key()?;

        let mode = match (args.context, args.context_dir) {
            (ContextKind::Text, _) => ContextMode::Text,
            (ContextKind::Images, Some(dir)) => ContextMode::Images { dir },
            (ContextKind::Pdf, Some(dir)) => ContextMode::Pdf { dir },
            (kind, None) => bail!("--context {:?} 需要同时指定 --context-dir", kind),
        };

        let questions = load_dataset(&args.input, self.limit).await?;
        let store = CheckpointStore::load(&args.output).await?;

        let model = args
            .model
            .unwrap_or_else(|| self.config.llm_model_name.clone());
        let generator = build_generator(&self.config, &model);
        let policy = ConcurrencyPolicy::from_config(&self.config);

        logging::log_startup(
            &format!("generate ({})", mode.label()),
            Some(&model),
            &policy.to_string(),
        );

        let job = AnswerJob::new(generator, mode)
            .with_min_images(args.min_images)
            .with_verbose_logging(self.config.verbose_logging);
        let processor =
            BatchProcessor::new(job, store, policy).with_progress(self.config.show_progress);

        let summary = processor.run(questions).await?;
        print_summary(&summary, &args.output);
        Ok(summary)
    }

    /// 评测生成结果
    pub async fn evaluate(&self, args: EvaluateArgs) -> Result<BatchSummary> {
        self.config.require_api_key()?;

        let reference = load_dataset(&args.reference, None).await?;
        let responses: Vec<ResultRecord> = load_json_array(&args.responses).await?;
        let mut items = pair_with_references(responses, reference);
        ensure_unique_ids(&items)?;
        if let Some(limit) = self.limit {
            items.truncate(limit);
        }

        let store = CheckpointStore::load(&args.output).await?;

        let model = args
            .model
            .unwrap_or_else(|| self.config.judge_model_name.clone());
        let judge = build_generator(&self.config, &model);
        let policy = ConcurrencyPolicy::from_config(&self.config)
            .with_max_in_flight(self.config.judge_max_in_flight);

        logging::log_startup("evaluate", Some(&model), &policy.to_string());

        let processor = BatchProcessor::new(JudgeJob::new(judge), store, policy)
            .with_progress(self.config.show_progress);
        let summary = processor.run(items).await?;
        print_summary(&summary, &args.output);

        if let Some(report_path) = &args.report {
            let records = processor.store().records().await;
            let report = report::aggregate(&records);
            report::write_report(report_path, &report).await?;
            info!(
                "🎯 准确率: {:.2}% ({}/{})",
                report.summary.accuracy_percentage, report.summary.valid, report.summary.total
            );
        }

        Ok(summary)
    }

    /// 生成报告
    pub async fn report(&self, args: ReportArgs) -> Result<()> {
        let records = report::load_eval_records(&args.input).await?;
        let report = report::aggregate(&records);
        report::write_report(&args.output, &report).await?;

        info!(
            "🎯 准确率: {:.2}% ({}/{})",
            report.summary.accuracy_percentage, report.summary.valid, report.summary.total
        );
        for (question_type, stats) in &report.performance_by_question_type {
            info!(
                "  - {}: {:.2}% ({}/{})",
                question_type, stats.accuracy, stats.valid, stats.total
            );
        }
        Ok(())
    }

    /// 切块并写出清单
    pub async fn chunk(&self, args: ChunkArgs) -> Result<Vec<Chunk>> {
        let budget = args.budget.unwrap_or(self.config.chunk_char_budget);
        let boundary = args.boundary.unwrap_or(self.config.chunk_boundary);

        let questions = load_dataset(&args.input, self.limit).await?;
        let chunks = chunk_dataset(&questions, budget, boundary);

        write_json(&args.output, &chunks).await?;
        info!(
            "✂️ {} 道题目切成 {} 块（预算 {} 字符，{:?}），清单: {}",
            questions.len(),
            chunks.len(),
            budget,
            boundary,
            args.output.display()
        );
        Ok(chunks)
    }

    /// 切块渲染成 PNG
    pub async fn render_images(&self, args: RenderImagesArgs) -> Result<BatchSummary> {
        let mut chunks: Vec<Chunk> = load_json_array(&args.chunks).await?;
        ensure_unique_ids(&chunks)?;
        if let Some(limit) = self.limit {
            chunks.truncate(limit);
        }

        let store = CheckpointStore::load(&args.checkpoint).await?;
        let policy = ConcurrencyPolicy::in_flight(self.config.render_max_in_flight);
        logging::log_startup("render-images", None, &policy.to_string());

        let renderer = Arc::new(
            ChromiumRenderer::launch(self.config.browser_executable.as_deref()).await?,
        );
        let job = RenderImageJob::new(renderer.clone() as Arc<dyn Renderer>, &args.out_dir);
        let processor =
            BatchProcessor::new(job, store, policy).with_progress(self.config.show_progress);

        let summary = processor.run(chunks).await;
        drop(processor);
        close_renderer(renderer).await;

        let summary = summary?;
        print_summary(&summary, &args.checkpoint);
        Ok(summary)
    }

    /// 每道题渲染成一个 PDF
    pub async fn render_pdfs(&self, args: RenderPdfsArgs) -> Result<BatchSummary> {
        let questions = load_dataset(&args.input, self.limit).await?;
        let store = CheckpointStore::load(&args.checkpoint).await?;
        let policy = ConcurrencyPolicy::in_flight(self.config.render_max_in_flight);
        logging::log_startup("render-pdfs", None, &policy.to_string());

        let renderer = Arc::new(
            ChromiumRenderer::launch(self.config.browser_executable.as_deref()).await?,
        );
        let job = RenderPdfJob::new(renderer.clone() as Arc<dyn Renderer>, &args.out_dir);
        let processor =
            BatchProcessor::new(job, store, policy).with_progress(self.config.show_progress);

        let summary = processor.run(questions).await;
        drop(processor);
        close_renderer(renderer).await;

        let summary = summary?;
        print_summary(&summary, &args.checkpoint);
        Ok(summary)
    }

    /// PDF 逐页栅格化，产物供 `generate --context images` 使用
    pub async fn pdf_to_images(&self, args: PdfToImagesArgs) -> Result<BatchSummary> {
        let mut pdfs = list_pdfs(&args.pdf_dir).await?;
        if let Some(limit) = self.limit {
            pdfs.truncate(limit);
        }

        let store = CheckpointStore::load(&args.checkpoint).await?;
        let policy = ConcurrencyPolicy::in_flight(self.config.render_max_in_flight);
        logging::log_startup("pdf-to-images", None, &policy.to_string());

        let rasterizer = PdfiumRasterizer::launch(self.config.pdfium_library.as_deref()).await?;
        let job = PdfToImagesJob::new(Arc::new(rasterizer) as Arc<dyn Rasterizer>, &args.out_dir);
        let processor =
            BatchProcessor::new(job, store, policy).with_progress(self.config.show_progress);

        let summary = processor.run(pdfs).await?;
        print_summary(&summary, &args.checkpoint);
        Ok(summary)
    }
}

// ========== 辅助函数 ==========

fn print_summary(summary: &BatchSummary, output: &Path) {
    logging::print_final_stats(
        summary.already_completed + summary.succeeded,
        summary.failed,
        summary.total,
        &output.display().to_string(),
    );
}

async fn close_renderer(renderer: Arc<ChromiumRenderer>) {
    match Arc::try_unwrap(renderer) {
        Ok(renderer) => renderer.close().await,
        Err(_) => warn!("浏览器仍被占用，跳过关闭"),
    }
}

async fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("创建目录失败: {}", parent.display()))?;
    }
    tokio::fs::write(path, json)
        .await
        .with_context(|| format!("写入文件失败: {}", path.display()))?;
    Ok(())
}
