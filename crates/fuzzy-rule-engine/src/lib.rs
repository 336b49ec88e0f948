//! 模糊规则引擎
//!
//! 基于模糊逻辑的数据质量评估，支持：
//! - 梯形 / 三角 / 高斯隶属函数与语言修饰词
//! - JSON 规则集定义、编译期校验和不可变快照
//! - 按名称发布、原子替换的规则集注册表
//! - 加权求和去模糊化打分与状态分级
//! - 规则目录加载与热更新
//! - 数据管道质量门

pub mod compiler;
pub mod engine;
pub mod error;
pub mod executor;
pub mod expression;
pub mod loader;
pub mod membership;
pub mod models;
pub mod operators;
pub mod pipeline;
pub mod ruleset;
pub mod store;
pub mod template;
pub mod watcher;

pub use compiler::RuleSetCompiler;
pub use engine::FuzzyEngine;
pub use error::{Result, RuleError};
pub use expression::{Antecedent, CompiledExpression};
pub use loader::{DirectoryRuleSetSource, LoadReport, RuleSetLoader, RuleSetSource, SourceEntry};
pub use membership::{MembershipFunction, Shape};
pub use models::{
    Bindings, EvaluationResult, RuleDef, RuleSetDocument, Severity, ShapeDef, Status, TermDef,
    VariableDef,
};
pub use operators::Hedge;
pub use pipeline::{GateOutcome, MissingRuleSetPolicy, PipelineContext, QualityGate, ScoreFold};
pub use ruleset::{Rule, RuleSet, Schema, Variable};
pub use store::{RuleSetStore, RuleSetStoreStats};
pub use watcher::RuleSetWatcher;

pub use fuzzy_shared::config::EngineConfig;
