//! 规则集编译器
//!
//! 将 JSON 规则集文档解析并编译成不可变的 `RuleSet`。所有结构校验
//! （隶属函数形状、schema 一致性、表达式深度、消息模板）都在这里一次完成，
//! 评估路径因此不存在构建期错误。

use crate::error::{Result, RuleError};
use crate::expression::{Antecedent, CompiledExpression};
use crate::membership::MembershipFunction;
use crate::models::{RuleDef, RuleSetDocument, VariableDef};
use crate::ruleset::{Rule, RuleSet, Schema, Variable};
use crate::template::MessageTemplate;
use std::collections::HashSet;

/// 前件表达式默认最大深度
pub const DEFAULT_MAX_EXPRESSION_DEPTH: usize = 64;

/// 规则集编译器
pub struct RuleSetCompiler {
    compile_version: u64,
    max_depth: usize,
}

impl RuleSetCompiler {
    pub fn new() -> Self {
        Self {
            compile_version: 0,
            max_depth: DEFAULT_MAX_EXPRESSION_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn set_max_depth(&mut self, max_depth: usize) {
        self.max_depth = max_depth;
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// 从 JSON 字符串编译规则集
    pub fn compile_from_json(&mut self, json: &str) -> Result<RuleSet> {
        let doc: RuleSetDocument = serde_json::from_str(json)?;
        self.compile(&doc)
    }

    /// 编译规则集文档
    pub fn compile(&mut self, doc: &RuleSetDocument) -> Result<RuleSet> {
        if doc.name.trim().is_empty() {
            return Err(RuleError::ParseError("规则集名称不能为空".to_string()));
        }

        let schema = self.compile_schema(&doc.variables)?;

        let mut seen_ids = HashSet::new();
        let mut rules = Vec::with_capacity(doc.rules.len());
        for (i, def) in doc.rules.iter().enumerate() {
            if def.id.trim().is_empty() {
                return Err(RuleError::ParseError(format!("rules[{}] 的规则 ID 不能为空", i)));
            }
            if !seen_ids.insert(def.id.as_str()) {
                return Err(RuleError::ParseError(format!("规则 ID 重复: {}", def.id)));
            }
            rules.push(self.compile_rule(def, &schema)?);
        }

        self.compile_version += 1;

        Ok(RuleSet::new(
            doc.name.clone(),
            doc.description.clone(),
            schema,
            rules,
            self.compile_version,
        ))
    }

    /// 编译变量 schema
    fn compile_schema(&self, variables: &[VariableDef]) -> Result<Schema> {
        let mut seen_vars = HashSet::new();
        let mut compiled = Vec::with_capacity(variables.len());

        for var in variables {
            if var.name.trim().is_empty() {
                return Err(RuleError::ParseError("变量名不能为空".to_string()));
            }
            if !seen_vars.insert(var.name.as_str()) {
                return Err(RuleError::ParseError(format!("变量重复声明: {}", var.name)));
            }
            if var.terms.is_empty() {
                return Err(RuleError::ParseError(format!(
                    "变量 '{}' 至少需要一个语言项",
                    var.name
                )));
            }

            let mut seen_terms = HashSet::new();
            let mut terms = Vec::with_capacity(var.terms.len());
            for term in &var.terms {
                if !seen_terms.insert(term.name.as_str()) {
                    return Err(RuleError::ParseError(format!(
                        "变量 '{}' 的语言项重复: {}",
                        var.name, term.name
                    )));
                }
                terms.push(MembershipFunction::from_def(term.name.clone(), &term.shape)?);
            }

            compiled.push(Variable::new(var.name.clone(), terms));
        }

        Ok(Schema::new(compiled))
    }

    /// 编译单条规则
    fn compile_rule(&self, def: &RuleDef, schema: &Schema) -> Result<Rule> {
        if !def.score_delta.is_finite() {
            return Err(RuleError::ParseError(format!(
                "规则 '{}' 的 score_delta 必须是有限数值",
                def.id
            )));
        }

        let expression = self.compile_node(&def.antecedent, schema, &def.id, "antecedent", 1)?;

        for arg in &def.message_args {
            if !schema.contains(arg) {
                return Err(RuleError::InvalidTemplate {
                    rule_id: def.id.clone(),
                    reason: format!("消息参数引用了未声明的变量 '{}'", arg),
                });
            }
        }

        let template = MessageTemplate::parse(&def.message_template, &def.message_args).map_err(
            |reason| RuleError::InvalidTemplate {
                rule_id: def.id.clone(),
                reason,
            },
        )?;

        Ok(Rule::new(
            def.id.clone(),
            expression,
            def.score_delta,
            def.severity,
            template,
        ))
    }

    /// 递归编译表达式节点
    ///
    /// 深度在下降过程中检查，超限立即返回，不会继续递归。
    fn compile_node(
        &self,
        node: &Antecedent,
        schema: &Schema,
        rule_id: &str,
        path: &str,
        depth: usize,
    ) -> Result<CompiledExpression> {
        if depth > self.max_depth {
            return Err(RuleError::ExpressionTooDeep {
                rule_id: rule_id.to_string(),
                limit: self.max_depth,
            });
        }

        let child = |child: &Antecedent, name: &str| {
            self.compile_node(child, schema, rule_id, &format!("{}.{}", path, name), depth + 1)
                .map(Box::new)
        };

        let compiled = match node {
            Antecedent::Test { variable, term } => {
                let function = schema.lookup(variable, term).ok_or_else(|| {
                    RuleError::SchemaInconsistency(format!(
                        "规则 '{}' 的条件 '{}' 引用了未声明的 ({}, {})",
                        rule_id, path, variable, term
                    ))
                })?;
                CompiledExpression::Test {
                    variable: variable.clone(),
                    function: function.clone(),
                }
            }
            Antecedent::And { left, right } => {
                CompiledExpression::And(child(left, "left")?, child(right, "right")?)
            }
            Antecedent::Or { left, right } => {
                CompiledExpression::Or(child(left, "left")?, child(right, "right")?)
            }
            Antecedent::Not { inner } => CompiledExpression::Not(child(inner, "inner")?),
            Antecedent::Hedge { hedge, inner } => {
                CompiledExpression::Hedge(*hedge, child(inner, "inner")?)
            }
        };

        Ok(compiled)
    }
}

impl Default for RuleSetCompiler {
    fn default() -> Self {
        Self::new()
    }
}
