//! 前件表达式
//!
//! `Antecedent` 是文档中的表达式树；`CompiledExpression` 是编译后绑定了
//! 隶属函数的执行树，求值是纯函数式的递归折叠。

use crate::membership::MembershipFunction;
use crate::models::Bindings;
use crate::operators::{self, Hedge};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 前件表达式节点
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Antecedent {
    /// 叶子：变量在指定语言项上的隶属度
    Test { variable: String, term: String },
    And {
        left: Box<Antecedent>,
        right: Box<Antecedent>,
    },
    Or {
        left: Box<Antecedent>,
        right: Box<Antecedent>,
    },
    Not { inner: Box<Antecedent> },
    Hedge { hedge: Hedge, inner: Box<Antecedent> },
}

impl Antecedent {
    pub fn test(variable: impl Into<String>, term: impl Into<String>) -> Self {
        Self::Test {
            variable: variable.into(),
            term: term.into(),
        }
    }

    pub fn and(self, right: Antecedent) -> Self {
        Self::And {
            left: Box::new(self),
            right: Box::new(right),
        }
    }

    pub fn or(self, right: Antecedent) -> Self {
        Self::Or {
            left: Box::new(self),
            right: Box::new(right),
        }
    }

    pub fn hedge(self, hedge: Hedge) -> Self {
        Self::Hedge {
            hedge,
            inner: Box::new(self),
        }
    }
}

impl std::ops::Not for Antecedent {
    type Output = Antecedent;

    fn not(self) -> Self::Output {
        Antecedent::Not {
            inner: Box::new(self),
        }
    }
}

impl fmt::Display for Antecedent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Test { variable, term } => write!(f, "{} is {}", variable, term),
            Self::And { left, right } => write!(f, "({} AND {})", left, right),
            Self::Or { left, right } => write!(f, "({} OR {})", left, right),
            Self::Not { inner } => write!(f, "NOT {}", inner),
            Self::Hedge { hedge, inner } => write!(f, "{} {}", hedge, inner),
        }
    }
}

/// 编译后的前件表达式
///
/// 叶子节点直接持有隶属函数，求值期不再查 schema。
#[derive(Debug, Clone, PartialEq)]
pub enum CompiledExpression {
    Test {
        variable: String,
        function: MembershipFunction,
    },
    And(Box<CompiledExpression>, Box<CompiledExpression>),
    Or(Box<CompiledExpression>, Box<CompiledExpression>),
    Not(Box<CompiledExpression>),
    Hedge(Hedge, Box<CompiledExpression>),
}

impl CompiledExpression {
    /// 计算隶属度
    ///
    /// 缺失的变量按 0.0 处理，由调用方负责记录诊断信息。
    pub fn evaluate(&self, bindings: &Bindings) -> f64 {
        match self {
            Self::Test { variable, function } => bindings
                .get(variable)
                .map_or(0.0, |value| function.evaluate(*value)),
            Self::And(left, right) => operators::and(left.evaluate(bindings), right.evaluate(bindings)),
            Self::Or(left, right) => operators::or(left.evaluate(bindings), right.evaluate(bindings)),
            Self::Not(inner) => operators::not(inner.evaluate(bindings)),
            Self::Hedge(hedge, inner) => operators::clamp_degree(hedge.apply(inner.evaluate(bindings))),
        }
    }

    /// 按首次出现顺序收集引用的变量（去重）
    pub fn variables(&self) -> Vec<String> {
        let mut vars = Vec::new();
        self.collect_variables(&mut vars);
        vars
    }

    fn collect_variables(&self, vars: &mut Vec<String>) {
        match self {
            Self::Test { variable, .. } => {
                if !vars.contains(variable) {
                    vars.push(variable.clone());
                }
            }
            Self::And(left, right) | Self::Or(left, right) => {
                left.collect_variables(vars);
                right.collect_variables(vars);
            }
            Self::Not(inner) | Self::Hedge(_, inner) => inner.collect_variables(vars),
        }
    }

    /// 还原为文档形式
    pub fn to_antecedent(&self) -> Antecedent {
        match self {
            Self::Test { variable, function } => Antecedent::test(variable.clone(), function.name()),
            Self::And(left, right) => left.to_antecedent().and(right.to_antecedent()),
            Self::Or(left, right) => left.to_antecedent().or(right.to_antecedent()),
            Self::Not(inner) => !inner.to_antecedent(),
            Self::Hedge(hedge, inner) => inner.to_antecedent().hedge(*hedge),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(variable: &str, a: f64, b: f64, c: f64, d: f64) -> CompiledExpression {
        CompiledExpression::Test {
            variable: variable.to_string(),
            function: MembershipFunction::trapezoid("term", a, b, c, d).unwrap(),
        }
    }

    fn bindings(pairs: &[(&str, f64)]) -> Bindings {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_leaf_evaluation() {
        let expr = leaf("pressure", 0.0, 20.0, 80.0, 100.0);
        assert_eq!(expr.evaluate(&bindings(&[("pressure", 10.0)])), 0.5);
        assert_eq!(expr.evaluate(&bindings(&[("pressure", 50.0)])), 1.0);
    }

    #[test]
    fn test_missing_variable_is_zero() {
        let expr = leaf("pressure", 0.0, 20.0, 80.0, 100.0);
        assert_eq!(expr.evaluate(&bindings(&[("vibration", 50.0)])), 0.0);
    }

    #[test]
    fn test_zadeh_operators() {
        // pressure=10 -> 0.5, vibration=5 -> 0.25
        let p = leaf("pressure", 0.0, 20.0, 80.0, 100.0);
        let v = leaf("vibration", 0.0, 20.0, 80.0, 100.0);
        let input = bindings(&[("pressure", 10.0), ("vibration", 5.0)]);

        let and = CompiledExpression::And(Box::new(p.clone()), Box::new(v.clone()));
        let or = CompiledExpression::Or(Box::new(p.clone()), Box::new(v.clone()));
        let not = CompiledExpression::Not(Box::new(p.clone()));
        let very = CompiledExpression::Hedge(Hedge::Very, Box::new(p.clone()));

        assert_eq!(and.evaluate(&input), 0.25);
        assert_eq!(or.evaluate(&input), 0.5);
        assert_eq!(not.evaluate(&input), 0.5);
        assert_eq!(very.evaluate(&input), 0.25);
    }

    #[test]
    fn test_double_negation() {
        let p = leaf("pressure", 0.0, 20.0, 80.0, 100.0);
        let expr = CompiledExpression::Not(Box::new(CompiledExpression::Not(Box::new(p.clone()))));
        for x in [0.0, 5.0, 10.0, 15.0, 50.0, 90.0] {
            let input = bindings(&[("pressure", x)]);
            assert!((expr.evaluate(&input) - p.evaluate(&input)).abs() < 1e-12);
        }
    }

    #[test]
    fn test_variables_are_deduplicated_in_order() {
        let p = leaf("pressure", 0.0, 1.0, 2.0, 3.0);
        let v = leaf("vibration", 0.0, 1.0, 2.0, 3.0);
        let expr = CompiledExpression::And(
            Box::new(CompiledExpression::Or(Box::new(p.clone()), Box::new(v))),
            Box::new(CompiledExpression::Not(Box::new(p))),
        );
        assert_eq!(expr.variables(), vec!["pressure", "vibration"]);
    }

    #[test]
    fn test_builder_and_display() {
        let expr = (Antecedent::test("pressure", "high").and(!Antecedent::test("vibration", "low")))
            .or(Antecedent::test("temperature", "hot").hedge(Hedge::Very));
        assert_eq!(
            expr.to_string(),
            "((pressure is high AND NOT vibration is low) OR very temperature is hot)"
        );
    }

    #[test]
    fn test_antecedent_serde_tags() {
        let expr = !Antecedent::test("rowCount", "small");
        let json = serde_json::to_value(&expr).unwrap();
        assert_eq!(json["type"], "not");
        assert_eq!(json["inner"]["type"], "test");
        assert_eq!(json["inner"]["variable"], "rowCount");

        let parsed: Antecedent = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, expr);
    }

    #[test]
    fn test_to_antecedent() {
        let p = leaf("pressure", 0.0, 1.0, 2.0, 3.0);
        let expr = CompiledExpression::Hedge(Hedge::Somewhat, Box::new(CompiledExpression::Not(Box::new(p))));
        assert_eq!(
            expr.to_antecedent(),
            (!Antecedent::test("pressure", "term")).hedge(Hedge::Somewhat)
        );
    }
}
