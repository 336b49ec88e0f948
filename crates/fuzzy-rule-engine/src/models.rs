//! 规则引擎领域模型
//!
//! 规则集的持久化文档结构，以及评估输入输出类型。

use crate::expression::Antecedent;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// 评估输入：变量名 -> 精确值
pub type Bindings = HashMap<String, f64>;

/// 规则集文档
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSetDocument {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub variables: Vec<VariableDef>,
    pub rules: Vec<RuleDef>,
}

/// 输入变量定义
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableDef {
    pub name: String,
    pub terms: Vec<TermDef>,
}

impl VariableDef {
    pub fn new(name: impl Into<String>, terms: Vec<TermDef>) -> Self {
        Self {
            name: name.into(),
            terms,
        }
    }
}

/// 语言项定义
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermDef {
    pub name: String,
    pub shape: ShapeDef,
}

impl TermDef {
    pub fn new(name: impl Into<String>, shape: ShapeDef) -> Self {
        Self {
            name: name.into(),
            shape,
        }
    }

    pub fn trapezoid(name: impl Into<String>, a: f64, b: f64, c: f64, d: f64) -> Self {
        Self::new(name, ShapeDef::Trapezoid { points: [a, b, c, d] })
    }

    pub fn triangle(name: impl Into<String>, a: f64, peak: f64, c: f64) -> Self {
        Self::new(name, ShapeDef::Triangle { points: [a, peak, c] })
    }

    pub fn gaussian(name: impl Into<String>, mean: f64, sigma: f64) -> Self {
        Self::new(name, ShapeDef::Gaussian { mean, sigma })
    }
}

/// 隶属函数形状定义
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ShapeDef {
    Trapezoid { points: [f64; 4] },
    Triangle { points: [f64; 3] },
    Gaussian { mean: f64, sigma: f64 },
}

/// 规则定义
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleDef {
    pub id: String,
    pub antecedent: Antecedent,
    pub score_delta: f64,
    pub severity: Severity,
    pub message_template: String,
    #[serde(default)]
    pub message_args: Vec<String>,
}

impl RuleDef {
    pub fn new(
        id: impl Into<String>,
        antecedent: Antecedent,
        score_delta: f64,
        severity: Severity,
        message_template: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            antecedent,
            score_delta,
            severity,
            message_template: message_template.into(),
            message_args: Vec::new(),
        }
    }

    /// 设置消息模板的位置参数
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.message_args = args.into_iter().map(Into::into).collect();
        self
    }
}

/// 规则严重级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// 评估状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Critical,
    Warning,
    Success,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::Warning => "warning",
            Self::Success => "success",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 评估结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    /// 评估所用规则集名称
    pub rule_set: String,
    /// 评估所用规则集版本
    pub version: u64,
    pub score: f64,
    pub status: Status,
    /// 按规则注册顺序排列的消息（含缺失输入诊断）
    pub messages: Vec<String>,
    /// 触发强度超过阈值的规则 ID，按规则顺序
    pub fired_rule_ids: Vec<String>,
    /// 已触发规则中的最高严重级别
    pub highest_severity: Option<Severity>,
}

impl EvaluationResult {
    pub fn fired(&self, rule_id: &str) -> bool {
        self.fired_rule_ids.iter().any(|id| id == rule_id)
    }
}
