//! 程序配置
//!
//! 加载顺序：默认值 → TOML 配置文件（可选）→ 环境变量 → 命令行参数。

use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::render::chunker::ChunkBoundary;

/// 生成服务提供方
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// 兼容 OpenAI API 的服务（async-openai）
    #[value(name = "openai")]
    OpenAi,
    /// Gemini 原生 generateContent 接口
    Gemini,
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Provider::OpenAi),
            "gemini" => Ok(Provider::Gemini),
            other => Err(format!("未知的 provider: {}", other)),
        }
    }
}

/// 既没有并发上限也没有时间窗口限流时使用的并发上限
pub const DEFAULT_MAX_IN_FLIGHT: usize = 12;

/// 程序配置
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    pub provider: Provider,
    // --- OpenAI 兼容服务 ---
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    // --- Gemini 原生接口 ---
    pub gemini_api_key: String,
    pub gemini_api_base_url: String,
    /// 生成答案使用的模型
    pub llm_model_name: String,
    /// 评测（judge）使用的模型
    pub judge_model_name: String,
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<u32>,
    /// Gemini 思考预算，-1 表示动态
    pub thinking_budget: Option<i32>,
    pub request_timeout_secs: u64,
    /// 服务客户端内部的重试次数（对流水线来说仍是一次调用）
    pub max_retries: u32,
    // --- 调度 ---
    /// 同时处理的最大条目数
    ///
    /// 未设置时：没有时间窗口限流则取 [`DEFAULT_MAX_IN_FLIGHT`]，否则只按时间窗口限流
    pub max_in_flight: Option<usize>,
    /// 每个时间窗口内允许启动的最大条目数
    pub per_interval_limit: Option<usize>,
    pub interval_secs: u64,
    /// 评测批次同时处理的最大条目数
    pub judge_max_in_flight: usize,
    // --- 切块与渲染 ---
    pub chunk_char_budget: usize,
    pub chunk_boundary: ChunkBoundary,
    pub browser_executable: Option<String>,
    /// pdfium 动态库所在目录
    pub pdfium_library: Option<String>,
    pub render_max_in_flight: usize,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    pub show_progress: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider: Provider::Gemini,
            llm_api_key: String::new(),
            llm_api_base_url: "https://api.openai.com/v1".to_string(),
            gemini_api_key: String::new(),
            gemini_api_base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            llm_model_name: "gemini-2.5-flash".to_string(),
            judge_model_name: "gemini-2.5-pro".to_string(),
            temperature: None,
            max_output_tokens: None,
            thinking_budget: Some(-1),
            request_timeout_secs: 600,
            max_retries: 2,
            max_in_flight: None,
            per_interval_limit: None,
            interval_secs: 60,
            judge_max_in_flight: 5,
            chunk_char_budget: 5500,
            chunk_boundary: ChunkBoundary::Inclusive,
            browser_executable: None,
            pdfium_library: None,
            render_max_in_flight: 20,
            verbose_logging: false,
            show_progress: true,
        }
    }
}

impl Config {
    /// 加载配置：默认值 → 配置文件 → 环境变量
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let base = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        base.apply_env()
    }

    /// 从 TOML 文件读取配置，缺省字段使用默认值
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Invalid {
            field: "config",
            reason: format!("无法读取 {}: {}", path.display(), e),
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::TomlParseFailed {
            path: path.to_path_buf(),
            source,
        })
    }

    /// 用环境变量覆盖配置
    pub fn apply_env(self) -> Result<Self, ConfigError> {
        self.apply_vars(|name| std::env::var(name).ok())
    }

    fn apply_vars(mut self, var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        if let Some(v) = var("LLM_PROVIDER") {
            self.provider = parse_var("LLM_PROVIDER", &v, "openai | gemini")?;
        }
        if let Some(v) = var("LLM_API_KEY") {
            self.llm_api_key = v;
        }
        if let Some(v) = var("LLM_API_BASE_URL") {
            self.llm_api_base_url = v;
        }
        if let Some(v) = var("GEMINI_API_KEY") {
            self.gemini_api_key = v;
        }
        if let Some(v) = var("GEMINI_API_BASE_URL") {
            self.gemini_api_base_url = v;
        }
        if let Some(v) = var("LLM_MODEL_NAME") {
            self.llm_model_name = v;
        }
        if let Some(v) = var("JUDGE_MODEL_NAME") {
            self.judge_model_name = v;
        }
        if let Some(v) = var("MAX_IN_FLIGHT") {
            self.max_in_flight = Some(parse_var("MAX_IN_FLIGHT", &v, "usize")?);
        }
        if let Some(v) = var("CHUNK_CHAR_BUDGET") {
            self.chunk_char_budget = parse_var("CHUNK_CHAR_BUDGET", &v, "usize")?;
        }
        if let Some(v) = var("BROWSER_EXECUTABLE") {
            self.browser_executable = Some(v);
        }
        if let Some(v) = var("PDFIUM_LIBRARY") {
            self.pdfium_library = Some(v);
        }
        if let Some(v) = var("VERBOSE_LOGGING") {
            self.verbose_logging = parse_var("VERBOSE_LOGGING", &v, "bool")?;
        }
        Ok(self)
    }

    /// 校验配置，在任何任务开始之前调用
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_in_flight == Some(0) {
            return Err(ConfigError::Invalid {
                field: "max_in_flight",
                reason: "必须大于 0".to_string(),
            });
        }
        if self.per_interval_limit == Some(0) {
            return Err(ConfigError::Invalid {
                field: "per_interval_limit",
                reason: "必须大于 0".to_string(),
            });
        }
        if self.per_interval_limit.is_some() && self.interval_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "interval_secs",
                reason: "启用时间窗口限流时必须大于 0".to_string(),
            });
        }
        if self.judge_max_in_flight == 0 {
            return Err(ConfigError::Invalid {
                field: "judge_max_in_flight",
                reason: "必须大于 0".to_string(),
            });
        }
        if self.render_max_in_flight == 0 {
            return Err(ConfigError::Invalid {
                field: "render_max_in_flight",
                reason: "必须大于 0".to_string(),
            });
        }
        Ok(())
    }

    /// 校验所选服务的 API 密钥
    pub fn require_api_key(&self) -> Result<(), ConfigError> {
        match self.provider {
            Provider::OpenAi if self.llm_api_key.is_empty() => Err(ConfigError::MissingApiKey {
                var_name: "LLM_API_KEY",
            }),
            Provider::Gemini if self.gemini_api_key.is_empty() => {
                Err(ConfigError::MissingApiKey {
                    var_name: "GEMINI_API_KEY",
                })
            }
            _ => Ok(()),
        }
    }
}

fn parse_var<T: FromStr>(
    var_name: &str,
    value: &str,
    expected_type: &'static str,
) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::EnvVarParseFailed {
            var_name: var_name.to_string(),
            value: value.to_string(),
            expected_type,
        })
}
