//! 模糊规则引擎
//!
//! 引擎是一个可廉价克隆的句柄，内部共享注册表、编译器与配置快照。
//! 启动时创建一次，然后传递给各个调用方；不存在全局单例。

use crate::compiler::RuleSetCompiler;
use crate::error::{Result, RuleError};
use crate::executor::RuleSetExecutor;
use crate::models::{Bindings, EvaluationResult, RuleSetDocument};
use crate::ruleset::RuleSet;
use crate::store::{RuleSetStore, RuleSetStoreStats};
use arc_swap::ArcSwap;
use fuzzy_shared::config::EngineConfig;
use fuzzy_shared::observability::metrics;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

/// 模糊规则引擎
#[derive(Clone)]
pub struct FuzzyEngine {
    store: RuleSetStore,
    config: Arc<ArcSwap<EngineConfig>>,
    compiler: Arc<parking_lot::Mutex<RuleSetCompiler>>,
}

impl FuzzyEngine {
    /// 使用默认配置创建引擎
    pub fn new() -> Self {
        let config = EngineConfig::default();
        Self {
            store: RuleSetStore::new(),
            compiler: Arc::new(parking_lot::Mutex::new(
                RuleSetCompiler::new().with_max_depth(config.max_expression_depth),
            )),
            config: Arc::new(ArcSwap::from_pointee(config)),
        }
    }

    /// 使用指定配置创建引擎
    pub fn with_config(config: EngineConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| RuleError::InvalidConfig(e.to_string()))?;

        Ok(Self {
            store: RuleSetStore::new(),
            compiler: Arc::new(parking_lot::Mutex::new(
                RuleSetCompiler::new().with_max_depth(config.max_expression_depth),
            )),
            config: Arc::new(ArcSwap::from_pointee(config)),
        })
    }

    /// 当前配置快照
    pub fn config(&self) -> Arc<EngineConfig> {
        self.config.load_full()
    }

    /// 运行时替换配置
    ///
    /// 进行中的评估继续使用旧快照；新的深度上限只影响之后编译的规则集。
    #[instrument(skip(self, config))]
    pub fn reconfigure(&self, config: EngineConfig) -> Result<()> {
        config
            .validate()
            .map_err(|e| RuleError::InvalidConfig(e.to_string()))?;

        // 持有编译器锁期间同时替换两者，编译不会看到新旧混合的配置
        let mut compiler = self.compiler.lock();
        compiler.set_max_depth(config.max_expression_depth);
        self.config.store(Arc::new(config));
        drop(compiler);

        info!("引擎配置已更新");
        Ok(())
    }

    /// 编译规则集文档（不发布）
    pub fn compile(&self, doc: &RuleSetDocument) -> Result<RuleSet> {
        self.compiler.lock().compile(doc)
    }

    /// 以指定名称发布或替换规则集，返回新版本号
    pub fn register(&self, name: &str, rule_set: RuleSet) -> u64 {
        self.store.register(name, rule_set)
    }

    /// 以规则集自身的名称发布
    pub fn publish(&self, rule_set: RuleSet) -> u64 {
        let name = rule_set.name().to_string();
        self.store.register(&name, rule_set)
    }

    /// 编译并发布规则集文档
    #[instrument(skip(self, doc), fields(rule_set = %doc.name))]
    pub fn register_document(&self, doc: &RuleSetDocument) -> Result<u64> {
        let rule_set = self.compile(doc)?;
        Ok(self.publish(rule_set))
    }

    /// 从 JSON 编译并发布规则集，返回 (名称, 版本号)
    #[instrument(skip(self, json))]
    pub fn register_json(&self, json: &str) -> Result<(String, u64)> {
        let rule_set = {
            let mut compiler = self.compiler.lock();
            compiler.compile_from_json(json)?
        };
        let name = rule_set.name().to_string();
        let version = self.store.register(&name, rule_set);
        Ok((name, version))
    }

    pub fn unregister(&self, name: &str) -> bool {
        self.store.unregister(name)
    }

    /// 获取规则集的当前快照
    pub fn lookup(&self, name: &str) -> Option<Arc<RuleSet>> {
        self.store.get(name)
    }

    pub fn rule_set_names(&self) -> Vec<String> {
        self.store.names()
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn stats(&self) -> RuleSetStoreStats {
        self.store.stats()
    }

    /// 评估单条记录
    ///
    /// 评估期间只读取一个规则集快照和一个配置快照，不会阻塞也不做 I/O。
    #[instrument(level = "debug", skip(self, bindings), fields(inputs = bindings.len()))]
    pub fn evaluate(&self, name: &str, bindings: &Bindings) -> Result<EvaluationResult> {
        let rule_set = self.resolve(name)?;
        let config = self.config.load();
        Ok(evaluate_snapshot(&rule_set, &config, bindings))
    }

    /// 对同一快照批量评估
    #[instrument(level = "debug", skip(self, inputs), fields(count = inputs.len()))]
    pub fn evaluate_batch(&self, name: &str, inputs: &[Bindings]) -> Result<Vec<EvaluationResult>> {
        let rule_set = self.resolve(name)?;
        let config = self.config.load();
        Ok(inputs
            .iter()
            .map(|bindings| evaluate_snapshot(&rule_set, &config, bindings))
            .collect())
    }

    /// 在 Tokio 阻塞线程池上并行批量评估，结果顺序与输入一致
    #[instrument(skip(self, inputs), fields(count = inputs.len()))]
    pub async fn evaluate_many(
        &self,
        name: &str,
        inputs: Vec<Bindings>,
    ) -> Result<Vec<EvaluationResult>> {
        let rule_set = self.resolve(name)?;
        let config = self.config.load_full();

        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        let workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        let chunk_size = inputs.len().div_ceil(workers);

        let mut chunks = Vec::new();
        let mut remaining = inputs;
        while !remaining.is_empty() {
            let rest = remaining.split_off(chunk_size.min(remaining.len()));
            chunks.push(std::mem::replace(&mut remaining, rest));
        }

        let tasks = chunks.into_iter().map(|chunk| {
            let rule_set = Arc::clone(&rule_set);
            let config = Arc::clone(&config);
            tokio::task::spawn_blocking(move || {
                chunk
                    .iter()
                    .map(|bindings| evaluate_snapshot(&rule_set, &config, bindings))
                    .collect::<Vec<_>>()
            })
        });

        let mut results = Vec::new();
        for joined in futures::future::join_all(tasks).await {
            let chunk = joined.map_err(|e| RuleError::ExecutionError(format!("批量评估任务失败: {}", e)))?;
            results.extend(chunk);
        }

        debug!(count = results.len(), "批量评估完成");
        Ok(results)
    }

    fn resolve(&self, name: &str) -> Result<Arc<RuleSet>> {
        self.store.get(name).ok_or_else(|| {
            metrics::record_unknown_rule_set(name);
            warn!("评估未注册的规则集: {}", name);
            RuleError::UnknownRuleSet(name.to_string())
        })
    }
}

impl Default for FuzzyEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn evaluate_snapshot(rule_set: &RuleSet, config: &EngineConfig, bindings: &Bindings) -> EvaluationResult {
    let start = Instant::now();
    let result = RuleSetExecutor::new(config).execute(rule_set, bindings);

    metrics::record_evaluation(
        rule_set.name(),
        result.status.as_str(),
        start.elapsed().as_secs_f64(),
    );
    debug!(
        rule_set = %rule_set.name(),
        version = rule_set.version(),
        score = result.score,
        status = %result.status,
        fired = result.fired_rule_ids.len(),
        "规则集评估完成"
    );

    result
}
