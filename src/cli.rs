//! 命令行参数

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::config::{Config, Provider};
use crate::render::chunker::ChunkBoundary;

#[derive(Parser, Debug)]
#[command(
    name = "longmem-bench",
    version,
    about = "Resumable, rate-limited long-context QA generation and evaluation"
)]
pub struct Cli {
    #[command(flatten)]
    pub common: CommonArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// 为数据集中的每道题生成答案
    Generate(GenerateArgs),
    /// 用 judge 模型评测生成结果
    Evaluate(EvaluateArgs),
    /// 从评测结果生成报告
    Report(ReportArgs),
    /// 把会话切块并写出切块清单
    Chunk(ChunkArgs),
    /// 把切块渲染成 PNG
    RenderImages(RenderImagesArgs),
    /// 把每道题的全部会话渲染成 PDF
    RenderPdfs(RenderPdfsArgs),
    /// 把 PDF 逐页栅格化成图片上下文
    PdfToImages(PdfToImagesArgs),
}

/// 所有子命令共用的参数，覆盖配置文件和环境变量
#[derive(Args, Debug, Clone, Default)]
pub struct CommonArgs {
    /// TOML 配置文件
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, value_enum)]
    pub provider: Option<Provider>,

    /// 同时处理的最大条目数
    #[arg(long, global = true)]
    pub max_in_flight: Option<usize>,

    /// 每个时间窗口内允许启动的最大条目数
    #[arg(long, global = true)]
    pub per_interval_limit: Option<usize>,

    /// 时间窗口长度（秒）
    #[arg(long, global = true)]
    pub interval_secs: Option<u64>,

    /// 只处理前 N 个条目
    #[arg(long, global = true)]
    pub limit: Option<usize>,

    #[arg(long, global = true, default_value_t = false)]
    pub no_progress: bool,

    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

impl CommonArgs {
    /// 命令行参数覆盖配置
    pub fn apply(&self, config: &mut Config) {
        if let Some(provider) = self.provider {
            config.provider = provider;
        }
        if let Some(max) = self.max_in_flight {
            config.max_in_flight = Some(max);
            config.judge_max_in_flight = max;
            config.render_max_in_flight = max;
        }
        if let Some(limit) = self.per_interval_limit {
            config.per_interval_limit = Some(limit);
        }
        if let Some(secs) = self.interval_secs {
            config.interval_secs = secs;
        }
        if self.no_progress {
            config.show_progress = false;
        }
        if self.verbose {
            config.verbose_logging = true;
        }
    }
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, ValueEnum)]
pub enum ContextKind {
    #[default]
    Text,
    Images,
    Pdf,
}

#[derive(Args, Debug, Clone)]
pub struct GenerateArgs {
    /// 数据集文件（JSON 数组）
    #[arg(long)]
    pub input: PathBuf,

    /// 结果文件，同时作为检查点
    #[arg(long)]
    pub output: PathBuf,

    #[arg(long, value_enum, default_value_t = ContextKind::Text)]
    pub context: ContextKind,

    /// 图片页或 PDF 所在目录
    #[arg(long)]
    pub context_dir: Option<PathBuf>,

    /// 图片页数少于该值的题目记为失败
    #[arg(long)]
    pub min_images: Option<usize>,

    /// 覆盖生成模型
    #[arg(long)]
    pub model: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct EvaluateArgs {
    /// 参考数据集
    #[arg(long)]
    pub reference: PathBuf,

    /// generate 的结果文件
    #[arg(long)]
    pub responses: PathBuf,

    /// 评测结果文件，同时作为检查点
    #[arg(long)]
    pub output: PathBuf,

    /// 评测完成后顺便写出报告
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// 覆盖 judge 模型
    #[arg(long)]
    pub model: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct ReportArgs {
    #[arg(long)]
    pub input: PathBuf,

    #[arg(long)]
    pub output: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct ChunkArgs {
    #[arg(long)]
    pub input: PathBuf,

    #[arg(long, default_value = "chunks.json")]
    pub output: PathBuf,

    /// 每块的字符预算
    #[arg(long)]
    pub budget: Option<usize>,

    #[arg(long, value_enum)]
    pub boundary: Option<ChunkBoundary>,
}

#[derive(Args, Debug, Clone)]
pub struct RenderImagesArgs {
    /// chunk 命令写出的切块清单
    #[arg(long, default_value = "chunks.json")]
    pub chunks: PathBuf,

    #[arg(long)]
    pub out_dir: PathBuf,

    #[arg(long, default_value = "render-images.json")]
    pub checkpoint: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct RenderPdfsArgs {
    #[arg(long)]
    pub input: PathBuf,

    #[arg(long)]
    pub out_dir: PathBuf,

    #[arg(long, default_value = "render-pdfs.json")]
    pub checkpoint: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct PdfToImagesArgs {
    /// render-pdfs 写出的 `<question_id>.pdf` 所在目录
    #[arg(long)]
    pub pdf_dir: PathBuf,

    /// 输出 `<out-dir>/<question_id>/page.N.png`
    #[arg(long)]
    pub out_dir: PathBuf,

    #[arg(long, default_value = "pdf-to-images.json")]
    pub checkpoint: PathBuf,
}
