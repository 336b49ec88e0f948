//! 编译后的规则集
//!
//! 规则集由 `RuleSetCompiler` 构建，构建后不可变；更新规则集意味着
//! 构建一个新值并整体替换注册表中的旧快照。

use crate::expression::CompiledExpression;
use crate::membership::MembershipFunction;
use crate::models::{Bindings, RuleDef, RuleSetDocument, Severity, TermDef, VariableDef};
use crate::template::MessageTemplate;
use chrono::{DateTime, Utc};

/// 输入变量及其语言项
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    name: String,
    terms: Vec<MembershipFunction>,
}

impl Variable {
    pub(crate) fn new(name: String, terms: Vec<MembershipFunction>) -> Self {
        Self { name, terms }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn terms(&self) -> &[MembershipFunction] {
        &self.terms
    }

    pub fn term(&self, name: &str) -> Option<&MembershipFunction> {
        self.terms.iter().find(|t| t.name() == name)
    }
}

/// 规则集的输入契约：变量名及其合法语言项
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Schema {
    variables: Vec<Variable>,
}

impl Schema {
    pub(crate) fn new(variables: Vec<Variable>) -> Self {
        Self { variables }
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.variables.iter().find(|v| v.name() == name)
    }

    pub fn contains(&self, variable: &str) -> bool {
        self.variable(variable).is_some()
    }

    /// 查找 (变量, 语言项) 对应的隶属函数
    pub fn lookup(&self, variable: &str, term: &str) -> Option<&MembershipFunction> {
        self.variable(variable)?.term(term)
    }
}

/// 编译后的规则
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    id: String,
    expression: CompiledExpression,
    score_delta: f64,
    severity: Severity,
    template: MessageTemplate,
    /// 前件与消息参数引用的全部变量（去重，按出现顺序）
    variables: Vec<String>,
}

impl Rule {
    pub(crate) fn new(
        id: String,
        expression: CompiledExpression,
        score_delta: f64,
        severity: Severity,
        template: MessageTemplate,
    ) -> Self {
        let mut variables = expression.variables();
        for arg in template.args() {
            if !variables.contains(arg) {
                variables.push(arg.clone());
            }
        }

        Self {
            id,
            expression,
            score_delta,
            severity,
            template,
            variables,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn expression(&self) -> &CompiledExpression {
        &self.expression
    }

    pub fn score_delta(&self) -> f64 {
        self.score_delta
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn template(&self) -> &MessageTemplate {
        &self.template
    }

    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    /// 规则触发强度，即前件表达式的隶属度
    pub fn firing_strength(&self, bindings: &Bindings) -> f64 {
        self.expression.evaluate(bindings)
    }

    pub fn render_message(&self, bindings: &Bindings) -> String {
        self.template.render(bindings)
    }

    pub fn to_def(&self) -> RuleDef {
        RuleDef {
            id: self.id.clone(),
            antecedent: self.expression.to_antecedent(),
            score_delta: self.score_delta,
            severity: self.severity,
            message_template: self.template.source().to_string(),
            message_args: self.template.args().to_vec(),
        }
    }
}

/// 规则集快照
#[derive(Debug, Clone, PartialEq)]
pub struct RuleSet {
    name: String,
    description: Option<String>,
    schema: Schema,
    rules: Vec<Rule>,
    /// 注册表版本号，发布时由引擎分配，未发布时为 0
    version: u64,
    /// 编译器本地的编译序号
    compile_version: u64,
    published_at: Option<DateTime<Utc>>,
}

impl RuleSet {
    pub(crate) fn new(
        name: String,
        description: Option<String>,
        schema: Schema,
        rules: Vec<Rule>,
        compile_version: u64,
    ) -> Self {
        Self {
            name,
            description,
            schema,
            rules,
            version: 0,
            compile_version,
            published_at: None,
        }
    }

    /// 以指定名称和版本发布
    pub(crate) fn into_published(mut self, name: String, version: u64) -> Self {
        self.name = name;
        self.version = version;
        self.published_at = Some(Utc::now());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn rule(&self, id: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.id() == id)
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn compile_version(&self) -> u64 {
        self.compile_version
    }

    pub fn published_at(&self) -> Option<DateTime<Utc>> {
        self.published_at
    }

    pub fn is_published(&self) -> bool {
        self.version > 0
    }

    /// 转回持久化文档
    pub fn to_document(&self) -> RuleSetDocument {
        RuleSetDocument {
            name: self.name.clone(),
            description: self.description.clone(),
            variables: self
                .schema
                .variables()
                .iter()
                .map(|v| {
                    VariableDef::new(
                        v.name(),
                        v.terms()
                            .iter()
                            .map(|t| TermDef::new(t.name(), t.to_def()))
                            .collect(),
                    )
                })
                .collect(),
            rules: self.rules.iter().map(Rule::to_def).collect(),
        }
    }
}
