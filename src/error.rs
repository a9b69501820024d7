//! 错误类型
//!
//! 输入错误在批处理开始前直接终止；单条任务的错误只记录日志并跳过，
//! 等下一次运行时通过检查点重新处理。

use std::path::PathBuf;

use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 输入错误（文件缺失、格式错误、ID 重复等）
    #[error("输入错误: {0}")]
    Input(#[from] InputError),
    /// 检查点读写错误
    #[error("检查点错误: {0}")]
    Checkpoint(#[from] CheckpointError),
    /// 生成 / 评测服务错误
    #[error("服务错误: {0}")]
    Service(#[from] ServiceError),
    /// 渲染错误
    #[error("渲染错误: {0}")]
    Render(#[from] RenderError),
    /// 报告输入错误
    #[error("报告错误: {0}")]
    Report(#[from] ReportError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
}

#[derive(Debug, Error)]
pub enum InputError {
    #[error("文件不存在: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("读取文件失败 ({}): {source}", path.display())]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON 解析失败 ({}): {source}", path.display())]
    JsonParseFailed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("数据集中存在重复的 ID: {item_id}")]
    DuplicateId { item_id: String },
}

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("读取检查点失败 ({}): {source}", path.display())]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("检查点文件不是合法的结果数组 ({}): {source}", path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("写入检查点失败 ({}): {source}", path.display())]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("序列化检查点失败: {0}")]
    Serialize(#[source] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("请求失败 (模型: {model}): {source}")]
    RequestFailed {
        model: String,
        #[source]
        source: BoxError,
    },

    #[error("服务返回错误状态 (模型: {model}): HTTP {status}: {body}")]
    BadStatus {
        model: String,
        status: u16,
        body: String,
    },

    #[error("服务返回结果为空 (模型: {model})")]
    EmptyResponse { model: String },

    #[error("服务返回内容为空 (模型: {model})")]
    EmptyContent { model: String },

    #[error("服务响应缺少字段 {field} (模型: {model})")]
    MissingField { model: String, field: &'static str },

    #[error("不支持的输入类型 {mime_type} (模型: {model})")]
    UnsupportedInput { model: String, mime_type: String },
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("启动浏览器失败: {0}")]
    BrowserLaunch(#[source] BoxError),

    #[error("加载 pdfium 失败: {0}")]
    PdfiumUnavailable(#[source] BoxError),

    #[error("渲染页面失败 ({}): {source}", path.display())]
    PageFailed {
        path: PathBuf,
        #[source]
        source: BoxError,
    },

    #[error("上下文目录不存在: {}", path.display())]
    MissingContext { path: PathBuf },

    #[error("上下文页数不足 ({}): 需要 {required} 页，实际 {found} 页", path.display())]
    IncompleteContext {
        path: PathBuf,
        required: usize,
        found: usize,
    },
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("第 {index} 条评测记录无效: {source}")]
    MalformedRow {
        index: usize,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("配置文件解析失败 ({}): {source}", path.display())]
    TomlParseFailed {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("环境变量 {var_name} 解析失败: 值 '{value}' 无法转换为 {expected_type}")]
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: &'static str,
    },

    #[error("配置项 {field} 无效: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("缺少 API 密钥，请设置环境变量 {var_name}")]
    MissingApiKey { var_name: &'static str },
}

// ========== 便捷构造函数 ==========

impl ServiceError {
    /// 包装请求错误
    pub fn request_failed(
        model: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        ServiceError::RequestFailed {
            model: model.into(),
            source: Box::new(source),
        }
    }
}

impl RenderError {
    /// 包装页面渲染错误
    pub fn page_failed(
        path: impl Into<PathBuf>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        RenderError::PageFailed {
            path: path.into(),
            source: Box::new(source),
        }
    }
}

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
