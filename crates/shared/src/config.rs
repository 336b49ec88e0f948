//! 配置管理模块
//!
//! 支持多格式配置文件加载，环境变量覆盖，以及类型安全的配置访问。

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// 表达式深度上限允许配置的最大值，超过后递归编译/评估有栈溢出风险
pub const MAX_EXPRESSION_DEPTH_LIMIT: usize = 1024;

/// 评估引擎配置
///
/// 打分区间、触发阈值和状态分级阈值均可通过配置调整，
/// 默认值为 0–100 分制，80 分以上为 Success，50 分以下为 Critical。
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// 评估起始分
    pub baseline_score: f64,
    pub min_score: f64,
    pub max_score: f64,
    /// 触发强度必须严格大于该值，规则才算触发
    pub firing_threshold: f64,
    /// 分数 >= 该值为 Success
    pub success_threshold: f64,
    /// 分数 >= 该值（且低于 success_threshold）为 Warning
    pub warning_threshold: f64,
    /// 前件表达式树的最大深度
    pub max_expression_depth: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            baseline_score: 100.0,
            min_score: 0.0,
            max_score: 100.0,
            firing_threshold: 0.0,
            success_threshold: 80.0,
            warning_threshold: 50.0,
            max_expression_depth: 64,
        }
    }
}

impl EngineConfig {
    /// 校验配置的自洽性
    pub fn validate(&self) -> Result<(), ConfigError> {
        let values = [
            ("baseline_score", self.baseline_score),
            ("min_score", self.min_score),
            ("max_score", self.max_score),
            ("firing_threshold", self.firing_threshold),
            ("success_threshold", self.success_threshold),
            ("warning_threshold", self.warning_threshold),
        ];
        if let Some((name, _)) = values.iter().find(|(_, v)| !v.is_finite()) {
            return Err(ConfigError::Message(format!("engine.{} 必须是有限数值", name)));
        }

        if self.min_score >= self.max_score {
            return Err(ConfigError::Message(format!(
                "engine.min_score ({}) 必须小于 engine.max_score ({})",
                self.min_score, self.max_score
            )));
        }

        if !(0.0..1.0).contains(&self.firing_threshold) {
            return Err(ConfigError::Message(format!(
                "engine.firing_threshold ({}) 必须位于 [0, 1)",
                self.firing_threshold
            )));
        }

        if self.warning_threshold > self.success_threshold {
            return Err(ConfigError::Message(format!(
                "engine.warning_threshold ({}) 不能大于 engine.success_threshold ({})",
                self.warning_threshold, self.success_threshold
            )));
        }

        if self.max_expression_depth == 0 || self.max_expression_depth > MAX_EXPRESSION_DEPTH_LIMIT {
            return Err(ConfigError::Message(format!(
                "engine.max_expression_depth ({}) 必须位于 [1, {}]",
                self.max_expression_depth, MAX_EXPRESSION_DEPTH_LIMIT
            )));
        }

        Ok(())
    }
}

/// 规则集来源配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RuleSourceConfig {
    /// 规则集 JSON 文件所在目录
    pub dir: PathBuf,
    /// 是否监听目录变化并热更新
    pub watch: bool,
    /// 文件事件去抖窗口
    pub debounce_ms: u64,
}

impl Default for RuleSourceConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("rules"),
            watch: true,
            debounce_ms: 500,
        }
    }
}

/// 可观测性配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub log_level: String,
    /// 日志输出格式：json（结构化）或 pretty（人类可读）
    pub log_format: String,
    pub metrics_enabled: bool,
    pub metrics_port: u16,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: false,
            metrics_port: 9090,
        }
    }
}

impl ObservabilityConfig {
    pub fn json_logs(&self) -> bool {
        self.log_format.eq_ignore_ascii_case("json")
    }
}

/// 应用配置
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub service_name: String,
    pub environment: String,
    pub engine: EngineConfig,
    pub rules: RuleSourceConfig,
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    /// 从配置文件和环境变量加载配置
    ///
    /// 加载顺序（后加载的会覆盖先加载的同名配置项）：
    /// 1. config/default.toml（默认配置）
    /// 2. config/{environment}.toml（环境特定配置）
    /// 3. config/{service_name}.toml（服务特定配置）
    /// 4. 环境变量（FUZZY_ 前缀，`__` 分隔层级，如 FUZZY_ENGINE__FIRING_THRESHOLD -> engine.firing_threshold）
    pub fn load(service_name: &str) -> Result<Self, ConfigError> {
        let env = std::env::var("FUZZY_ENV").unwrap_or_else(|_| "development".to_string());
        let config_dir = std::env::var("CONFIG_DIR").unwrap_or_else(|_| "config".to_string());

        let config = Self::load_from(service_name, &env, Path::new(&config_dir))?;
        config.engine.validate()?;
        Ok(config)
    }

    fn load_from(service_name: &str, env: &str, config_dir: &Path) -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .set_default("service_name", service_name)?
            .set_default("environment", env)?
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            .add_source(File::from(config_dir.join(format!("{}.toml", env))).required(false))
            .add_source(
                File::from(config_dir.join(format!("{}.toml", service_name))).required(false),
            )
            .add_source(
                Environment::with_prefix("FUZZY")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// 是否为生产环境
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}
