//! 规则集执行器
//!
//! 对一个规则集快照做单遍评估：逐条计算触发强度，按强度线性缩放
//! score_delta 后累加（加权求和去模糊化），再截断分数并分级。

use crate::models::{Bindings, EvaluationResult, Severity, Status};
use crate::operators;
use crate::ruleset::RuleSet;
use fuzzy_shared::config::EngineConfig;

/// 缺失输入的诊断消息前缀
pub const MISSING_INPUT_PREFIX: &str = "missing input: ";

/// 规则集执行器
pub struct RuleSetExecutor<'a> {
    config: &'a EngineConfig,
}

impl<'a> RuleSetExecutor<'a> {
    pub fn new(config: &'a EngineConfig) -> Self {
        Self { config }
    }

    /// 执行规则集评估
    ///
    /// 缺失变量的叶子隶属度为 0，并照常参与 AND/OR/NOT 运算；规则引用
    /// 的变量（前件或消息参数）缺失时，每个变量只在首次被引用的位置
    /// 追加一条诊断消息，评估本身不失败。
    pub fn execute(&self, rule_set: &RuleSet, bindings: &Bindings) -> EvaluationResult {
        let mut score = self.config.baseline_score;
        let mut messages: Vec<String> = Vec::new();
        let mut fired_rule_ids = Vec::new();
        let mut highest_severity: Option<Severity> = None;
        let mut reported_missing: Vec<&str> = Vec::new();

        for rule in rule_set.rules() {
            for variable in rule.variables() {
                if !bindings.contains_key(variable) && !reported_missing.contains(&variable.as_str()) {
                    reported_missing.push(variable);
                    messages.push(format!("{}{}", MISSING_INPUT_PREFIX, variable));
                }
            }

            let strength = rule.firing_strength(bindings);
            debug_assert!(operators::is_valid_degree(strength));

            if strength > self.config.firing_threshold {
                score += rule.score_delta() * strength;
                fired_rule_ids.push(rule.id().to_string());
                highest_severity = highest_severity.max(Some(rule.severity()));

                let message = rule.render_message(bindings);
                // 多条规则产生相同消息时只保留一条
                if !message.is_empty() && !messages.contains(&message) {
                    messages.push(message);
                }
            }
        }

        let score = score.clamp(self.config.min_score, self.config.max_score);

        EvaluationResult {
            rule_set: rule_set.name().to_string(),
            version: rule_set.version(),
            score,
            status: self.classify(score),
            messages,
            fired_rule_ids,
            highest_severity,
        }
    }

    /// 按配置阈值分级
    pub fn classify(&self, score: f64) -> Status {
        if score >= self.config.success_threshold {
            Status::Success
        } else if score >= self.config.warning_threshold {
            Status::Warning
        } else {
            Status::Critical
        }
    }
}
