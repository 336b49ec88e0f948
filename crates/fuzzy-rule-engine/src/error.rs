//! 规则引擎错误类型

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuleError {
    #[error("无效的隶属函数 '{term}': {reason}")]
    InvalidShape { term: String, reason: String },

    #[error("规则集结构不一致: {0}")]
    SchemaInconsistency(String),

    #[error("规则 '{rule_id}' 的前件表达式过深: 超过上限 {limit}")]
    ExpressionTooDeep { rule_id: String, limit: usize },

    #[error("规则 '{rule_id}' 的消息模板无效: {reason}")]
    InvalidTemplate { rule_id: String, reason: String },

    #[error("规则集未找到: {0}")]
    UnknownRuleSet(String),

    #[error("规则集解析失败: {0}")]
    ParseError(String),

    #[error("引擎配置无效: {0}")]
    InvalidConfig(String),

    #[error("规则执行失败: {0}")]
    ExecutionError(String),

    #[error("读取规则集失败: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON 序列化错误: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl RuleError {
    /// 是否为构建期错误（规则集本身有问题，重试无意义）
    pub fn is_build_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidShape { .. }
                | Self::SchemaInconsistency(_)
                | Self::ExpressionTooDeep { .. }
                | Self::InvalidTemplate { .. }
                | Self::ParseError(_)
                | Self::JsonError(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, RuleError>;
