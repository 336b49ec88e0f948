//! 规则集注册表
//!
//! 使用 DashMap 保存按名称索引的规则集快照。快照以 `Arc` 共享，
//! 评估期间持有的快照不受并发替换影响；版本号按名称单调递增，
//! 注销后重新注册也不会回退。

use crate::ruleset::RuleSet;
use dashmap::DashMap;
use fuzzy_shared::observability::metrics;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// 规则集注册表
#[derive(Clone, Default)]
pub struct RuleSetStore {
    /// 当前发布的规则集快照
    slots: Arc<DashMap<String, Arc<RuleSet>>>,
    /// 每个名称最后分配的版本号
    versions: Arc<DashMap<String, u64>>,
}

impl RuleSetStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// 以指定名称发布规则集，返回分配的版本号
    ///
    /// 同名规则集的注册互相串行：版本号分配与快照替换在同一把
    /// 分片锁内完成，读者只会看到旧快照或新快照。
    #[instrument(skip(self, rule_set), fields(rules = rule_set.rules().len()))]
    pub fn register(&self, name: &str, rule_set: RuleSet) -> u64 {
        let mut version_entry = self.versions.entry(name.to_string()).or_insert(0);
        *version_entry += 1;
        let version = *version_entry;

        let published = Arc::new(rule_set.into_published(name.to_string(), version));
        let replaced = self.slots.insert(name.to_string(), published).is_some();
        drop(version_entry);

        metrics::set_rule_sets_registered(self.slots.len());

        if replaced {
            info!("规则集已替换: {} (v{})", name, version);
        } else {
            info!("规则集已发布: {} (v{})", name, version);
        }
        version
    }

    /// 注销规则集；名称不存在时返回 false
    #[instrument(skip(self))]
    pub fn unregister(&self, name: &str) -> bool {
        let removed = {
            // 与 register 持有同一名称的版本锁，避免和并发发布交错
            let _guard = self.versions.get_mut(name);
            self.slots.remove(name).is_some()
        };

        if removed {
            metrics::set_rule_sets_registered(self.slots.len());
            info!("规则集已注销: {}", name);
        } else {
            warn!("注销不存在的规则集: {}", name);
        }
        removed
    }

    /// 获取当前快照
    pub fn get(&self, name: &str) -> Option<Arc<RuleSet>> {
        self.slots.get(name).map(|entry| Arc::clone(entry.value()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.slots.contains_key(name)
    }

    /// 已发布的规则集名称（按字典序）
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.slots.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// 清空所有规则集；版本计数保留
    #[instrument(skip(self))]
    pub fn clear(&self) {
        let count = self.slots.len();
        self.slots.clear();
        metrics::set_rule_sets_registered(0);
        info!("已清空 {} 个规则集", count);
    }

    pub fn stats(&self) -> RuleSetStoreStats {
        let rule_sets_count = self.slots.len();
        let total_rules: usize = self.slots.iter().map(|e| e.value().rules().len()).sum();
        let total_variables: usize = self
            .slots
            .iter()
            .map(|e| e.value().schema().variables().len())
            .sum();

        RuleSetStoreStats {
            rule_sets_count,
            total_rules,
            total_variables,
            avg_rules_per_set: if rule_sets_count > 0 {
                total_rules as f64 / rule_sets_count as f64
            } else {
                0.0
            },
        }
    }
}

/// 注册表统计信息
#[derive(Debug, Clone, PartialEq)]
pub struct RuleSetStoreStats {
    /// 已发布的规则集数量
    pub rule_sets_count: usize,
    /// 规则总数
    pub total_rules: usize,
    /// 所有规则集声明的变量总数
    pub total_variables: usize,
    /// 平均每个规则集的规则数
    pub avg_rules_per_set: f64,
}
