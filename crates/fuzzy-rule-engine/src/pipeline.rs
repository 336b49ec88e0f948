//! 数据管道集成
//!
//! `QualityGate` 在管道的某个阶段对一条记录做规则集评估，
//! 把分数折叠进管道上下文的质量分，并按状态决定放行、复核或拒绝。

use crate::engine::FuzzyEngine;
use crate::error::{Result, RuleError};
use crate::models::{Bindings, EvaluationResult, Status};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, warn};
use uuid::Uuid;

/// 需要人工复核时写入 metadata 的键
pub const REQUIRES_APPROVAL_KEY: &str = "requires_approval";

/// 管道执行上下文
#[derive(Debug, Clone, Serialize)]
pub struct PipelineContext {
    pub job_id: Uuid,
    /// 第几次尝试，从 1 开始
    pub attempt_number: u32,
    /// 累计质量分，从 100 开始
    pub quality_score: f64,
    pub metadata: HashMap<String, serde_json::Value>,
    pub errors: Vec<String>,
    pub messages: Vec<String>,
    pub started_at: DateTime<Utc>,
}

impl PipelineContext {
    pub fn new() -> Self {
        Self {
            job_id: Uuid::new_v4(),
            attempt_number: 1,
            quality_score: 100.0,
            metadata: HashMap::new(),
            errors: Vec::new(),
            messages: Vec::new(),
            started_at: Utc::now(),
        }
    }

    /// 同一作业的下一次重试：保留 job_id 与 metadata，其余状态重置
    pub fn retry(&self) -> Self {
        Self {
            job_id: self.job_id,
            attempt_number: self.attempt_number + 1,
            metadata: self.metadata.clone(),
            ..Self::new()
        }
    }

    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn requires_approval(&self) -> bool {
        self.metadata
            .get(REQUIRES_APPROVAL_KEY)
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false)
    }
}

impl Default for PipelineContext {
    fn default() -> Self {
        Self::new()
    }
}

/// 评估分数并入上下文质量分的方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScoreFold {
    /// 直接替换
    #[default]
    Replace,
    /// 取较小值
    Minimum,
    /// ctx * score / 100
    Multiplicative,
    /// ctx + (score - 100)
    Additive,
}

impl ScoreFold {
    /// 折叠后截断到 [0, 100]
    pub fn fold(self, current: f64, score: f64) -> f64 {
        let folded = match self {
            Self::Replace => score,
            Self::Minimum => current.min(score),
            Self::Multiplicative => current * score / 100.0,
            Self::Additive => current + (score - 100.0),
        };
        folded.clamp(0.0, 100.0)
    }
}

/// 规则集未注册时的处理策略
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum MissingRuleSetPolicy {
    /// 跳过本次质量检查
    #[default]
    Skip,
    /// 返回 UnknownRuleSet 错误
    Fail,
    /// 改用指定的规则集
    Fallback(String),
}

/// 质量门判定结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome {
    Passed,
    NeedsReview,
    Rejected,
    Skipped,
}

impl GateOutcome {
    /// 是否应当终止管道
    pub fn is_blocking(&self) -> bool {
        matches!(self, Self::Rejected)
    }
}

/// 质量门
pub struct QualityGate {
    engine: FuzzyEngine,
    rule_set: String,
    fold: ScoreFold,
    missing: MissingRuleSetPolicy,
}

impl QualityGate {
    pub fn new(engine: FuzzyEngine, rule_set: impl Into<String>) -> Self {
        Self {
            engine,
            rule_set: rule_set.into(),
            fold: ScoreFold::default(),
            missing: MissingRuleSetPolicy::default(),
        }
    }

    pub fn with_fold(mut self, fold: ScoreFold) -> Self {
        self.fold = fold;
        self
    }

    pub fn with_missing_policy(mut self, policy: MissingRuleSetPolicy) -> Self {
        self.missing = policy;
        self
    }

    pub fn rule_set(&self) -> &str {
        &self.rule_set
    }

    /// 评估一条记录并更新上下文
    pub fn apply(&self, bindings: &Bindings, ctx: &mut PipelineContext) -> Result<GateOutcome> {
        let Some(result) = self.evaluate(bindings)? else {
            debug!(rule_set = %self.rule_set, job_id = %ctx.job_id, "规则集未注册，跳过质量检查");
            return Ok(GateOutcome::Skipped);
        };

        ctx.quality_score = self.fold.fold(ctx.quality_score, result.score);

        let outcome = match result.status {
            Status::Critical => {
                let produced = !result.messages.is_empty();
                ctx.errors.extend(result.messages);
                if !produced {
                    let threshold = self.engine.config().warning_threshold;
                    ctx.errors.push(format!(
                        "Quality score {} is below threshold ({})",
                        result.score, threshold
                    ));
                }
                GateOutcome::Rejected
            }
            Status::Warning => {
                ctx.messages.extend(result.messages);
                ctx.metadata
                    .insert(REQUIRES_APPROVAL_KEY.to_string(), serde_json::Value::Bool(true));
                GateOutcome::NeedsReview
            }
            Status::Success => {
                ctx.messages.extend(result.messages);
                GateOutcome::Passed
            }
        };

        if outcome.is_blocking() {
            warn!(
                rule_set = %result.rule_set,
                job_id = %ctx.job_id,
                score = result.score,
                "质量检查未通过"
            );
        }
        Ok(outcome)
    }

    fn evaluate(&self, bindings: &Bindings) -> Result<Option<EvaluationResult>> {
        match self.engine.evaluate(&self.rule_set, bindings) {
            Ok(result) => Ok(Some(result)),
            Err(RuleError::UnknownRuleSet(name)) => match &self.missing {
                MissingRuleSetPolicy::Skip => Ok(None),
                MissingRuleSetPolicy::Fail => Err(RuleError::UnknownRuleSet(name)),
                MissingRuleSetPolicy::Fallback(fallback) => {
                    debug!(rule_set = %name, fallback = %fallback, "使用后备规则集");
                    self.engine.evaluate(fallback, bindings).map(Some)
                }
            },
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::Antecedent;
    use crate::models::{RuleDef, RuleSetDocument, Severity, TermDef, VariableDef};

    /// rowCount small: -30；uuid missing (hasUuid low): -60
    fn engine() -> FuzzyEngine {
        let engine = FuzzyEngine::new();
        engine
            .register_document(&RuleSetDocument {
                name: "FileQuality".to_string(),
                description: None,
                variables: vec![
                    VariableDef::new("rowCount", vec![TermDef::trapezoid("small", -1.0, 0.0, 9.0, 10.0)]),
                    VariableDef::new("hasUuid", vec![TermDef::trapezoid("no", -1.0, 0.0, 0.0, 1.0)]),
                ],
                rules: vec![
                    RuleDef::new(
                        "small-file",
                        Antecedent::test("rowCount", "small"),
                        -30.0,
                        Severity::Warning,
                        "File too small",
                    ),
                    RuleDef::new(
                        "missing-uuid",
                        Antecedent::test("hasUuid", "no"),
                        -60.0,
                        Severity::Critical,
                        "Schema Mismatch: Critical Column 'uuid' is missing.",
                    ),
                ],
            })
            .unwrap();
        engine
    }

    fn record(rows: f64, has_uuid: f64) -> Bindings {
        [("rowCount".to_string(), rows), ("hasUuid".to_string(), has_uuid)]
            .into_iter()
            .collect()
    }

    #[test]
    fn test_context_defaults() {
        let ctx = PipelineContext::new();
        assert_eq!(ctx.attempt_number, 1);
        assert_eq!(ctx.quality_score, 100.0);
        assert!(ctx.is_success());
        assert!(!ctx.requires_approval());
    }

    #[test]
    fn test_context_retry() {
        let mut ctx = PipelineContext::new();
        ctx.errors.push("boom".to_string());
        ctx.metadata.insert("source".to_string(), serde_json::json!("a.zip"));

        let retry = ctx.retry();
        assert_eq!(retry.job_id, ctx.job_id);
        assert_eq!(retry.attempt_number, 2);
        assert!(retry.is_success());
        assert_eq!(retry.metadata["source"], "a.zip");
    }

    #[test]
    fn test_score_fold() {
        assert_eq!(ScoreFold::Replace.fold(80.0, 70.0), 70.0);
        assert_eq!(ScoreFold::Minimum.fold(60.0, 70.0), 60.0);
        assert_eq!(ScoreFold::Multiplicative.fold(80.0, 50.0), 40.0);
        assert_eq!(ScoreFold::Additive.fold(80.0, 70.0), 50.0);
        assert_eq!(ScoreFold::Additive.fold(20.0, 10.0), 0.0);
    }

    #[test]
    fn test_gate_passed() {
        let gate = QualityGate::new(engine(), "FileQuality");
        let mut ctx = PipelineContext::new();

        let outcome = gate.apply(&record(500.0, 1.0), &mut ctx).unwrap();

        assert_eq!(outcome, GateOutcome::Passed);
        assert_eq!(ctx.quality_score, 100.0);
        assert!(ctx.is_success());
    }

    #[test]
    fn test_gate_needs_review() {
        let gate = QualityGate::new(engine(), "FileQuality");
        let mut ctx = PipelineContext::new();

        let outcome = gate.apply(&record(5.0, 1.0), &mut ctx).unwrap();

        assert_eq!(outcome, GateOutcome::NeedsReview);
        assert_eq!(ctx.quality_score, 70.0);
        assert_eq!(ctx.messages, vec!["File too small"]);
        assert!(ctx.requires_approval());
        assert!(ctx.is_success());
    }

    #[test]
    fn test_gate_rejected() {
        let gate = QualityGate::new(engine(), "FileQuality");
        let mut ctx = PipelineContext::new();

        let outcome = gate.apply(&record(5.0, 0.0), &mut ctx).unwrap();

        assert_eq!(outcome, GateOutcome::Rejected);
        assert!(outcome.is_blocking());
        assert_eq!(ctx.quality_score, 10.0);
        assert_eq!(
            ctx.errors,
            vec![
                "File too small",
                "Schema Mismatch: Critical Column 'uuid' is missing."
            ]
        );
        assert!(!ctx.is_success());
    }

    #[test]
    fn test_gate_rejected_without_messages_adds_generic_error() {
        let engine = FuzzyEngine::new();
        engine
            .register_document(&RuleSetDocument {
                name: "Silent".to_string(),
                description: None,
                variables: vec![VariableDef::new("x", vec![TermDef::triangle("bad", 0.0, 1.0, 2.0)])],
                rules: vec![RuleDef::new(
                    "silent",
                    Antecedent::test("x", "bad"),
                    -90.0,
                    Severity::Critical,
                    "",
                )],
            })
            .unwrap();

        let gate = QualityGate::new(engine, "Silent");
        let mut ctx = PipelineContext::new();
        let x: Bindings = [("x".to_string(), 1.0)].into_iter().collect();

        assert_eq!(gate.apply(&x, &mut ctx).unwrap(), GateOutcome::Rejected);
        assert_eq!(ctx.errors, vec!["Quality score 10 is below threshold (50)"]);
    }

    #[test]
    fn test_missing_rule_set_policies() {
        let engine = engine();
        let mut ctx = PipelineContext::new();
        let input = record(5.0, 1.0);

        let skip = QualityGate::new(engine.clone(), "Unknown");
        assert_eq!(skip.apply(&input, &mut ctx).unwrap(), GateOutcome::Skipped);
        assert_eq!(ctx.quality_score, 100.0);

        let fail = QualityGate::new(engine.clone(), "Unknown")
            .with_missing_policy(MissingRuleSetPolicy::Fail);
        assert!(matches!(
            fail.apply(&input, &mut ctx),
            Err(RuleError::UnknownRuleSet(ref name)) if name == "Unknown"
        ));

        let fallback = QualityGate::new(engine.clone(), "Unknown")
            .with_missing_policy(MissingRuleSetPolicy::Fallback("FileQuality".to_string()));
        assert_eq!(fallback.apply(&input, &mut ctx).unwrap(), GateOutcome::NeedsReview);

        let broken_fallback = QualityGate::new(engine, "Unknown")
            .with_missing_policy(MissingRuleSetPolicy::Fallback("AlsoUnknown".to_string()));
        assert!(broken_fallback.apply(&input, &mut ctx).is_err());
    }

    #[test]
    fn test_gates_fold_across_stages() {
        let engine = engine();
        let mut ctx = PipelineContext::new();
        let gate = QualityGate::new(engine, "FileQuality").with_fold(ScoreFold::Multiplicative);

        gate.apply(&record(5.0, 1.0), &mut ctx).unwrap();
        gate.apply(&record(5.0, 1.0), &mut ctx).unwrap();

        assert!((ctx.quality_score - 49.0).abs() < 1e-9);
    }
}
