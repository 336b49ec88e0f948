//! 规则集加载
//!
//! `RuleSetSource` 抽象规则集文档的来源（目录、远端配置中心等），
//! `RuleSetLoader` 负责把来源中的文档编译并发布到引擎，
//! 同时注销来源中已经消失的规则集。

use crate::engine::FuzzyEngine;
use crate::error::Result;
use async_trait::async_trait;
use fuzzy_shared::observability::metrics;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

/// 来源中的一份原始规则集文档
#[derive(Debug, Clone, PartialEq)]
pub struct SourceEntry {
    /// 文档在来源中的位置，例如文件路径
    pub origin: String,
    /// JSON 文本
    pub content: String,
}

impl SourceEntry {
    pub fn new(origin: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            content: content.into(),
        }
    }
}

/// 规则集来源接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RuleSetSource: Send + Sync {
    /// 拉取来源中的全部文档
    async fn fetch_all(&self) -> Result<Vec<SourceEntry>>;

    /// 来源描述，用于日志和指标标签
    fn describe(&self) -> String;
}

/// 从目录读取全部 `*.json` 文件
pub struct DirectoryRuleSetSource {
    dir: PathBuf,
}

impl DirectoryRuleSetSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl RuleSetSource for DirectoryRuleSetSource {
    async fn fetch_all(&self) -> Result<Vec<SourceEntry>> {
        let mut paths = Vec::new();
        let mut dir = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") && entry.file_type().await?.is_file() {
                paths.push(path);
            }
        }
        paths.sort();

        let mut entries = Vec::with_capacity(paths.len());
        for path in paths {
            let content = tokio::fs::read_to_string(&path).await?;
            entries.push(SourceEntry::new(path.display().to_string(), content));
        }
        Ok(entries)
    }

    fn describe(&self) -> String {
        format!("dir:{}", self.dir.display())
    }
}

/// 单个文档加载失败
#[derive(Debug, Clone, PartialEq)]
pub struct LoadFailure {
    pub origin: String,
    pub error: String,
}

/// 一次同步的结果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    /// 本次发布的规则集 (名称, 版本号)
    pub loaded: Vec<(String, u64)>,
    /// 内容未变化、未重新发布的规则集
    pub unchanged: Vec<String>,
    pub failed: Vec<LoadFailure>,
    /// 来源中已消失并被注销的规则集
    pub removed: Vec<String>,
}

impl LoadReport {
    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}

#[derive(Debug, Clone)]
struct LoadedEntry {
    name: String,
    content: String,
}

/// 规则集加载器
pub struct RuleSetLoader {
    engine: FuzzyEngine,
    source: Arc<dyn RuleSetSource>,
    /// origin -> 上次成功发布的规则集；同时串行化并发的 sync 调用
    loaded: Mutex<HashMap<String, LoadedEntry>>,
}

impl RuleSetLoader {
    pub fn new(engine: FuzzyEngine, source: Arc<dyn RuleSetSource>) -> Self {
        Self {
            engine,
            source,
            loaded: Mutex::new(HashMap::new()),
        }
    }

    pub fn engine(&self) -> &FuzzyEngine {
        &self.engine
    }

    /// 同步来源中的全部规则集
    ///
    /// 无效文档只记录并跳过，不会注销同一来源位置上次成功发布的规则集。
    /// 拉取来源本身失败时不做任何变更，直接返回错误。
    #[instrument(skip(self), fields(source = %self.source.describe()))]
    pub async fn sync(&self) -> Result<LoadReport> {
        let mut loaded = self.loaded.lock().await;
        let entries = self.source.fetch_all().await?;

        let mut report = LoadReport::default();
        let mut current: HashMap<String, LoadedEntry> = HashMap::with_capacity(entries.len());

        for entry in entries {
            if let Some(previous) = loaded.get(&entry.origin)
                && previous.content == entry.content
                && self.engine.lookup(&previous.name).is_some()
            {
                debug!("规则集未变化: {}", previous.name);
                report.unchanged.push(previous.name.clone());
                current.insert(entry.origin, previous.clone());
                continue;
            }

            match self.engine.register_json(&entry.content) {
                Ok((name, version)) => {
                    report.loaded.push((name.clone(), version));
                    current.insert(
                        entry.origin,
                        LoadedEntry {
                            name,
                            content: entry.content,
                        },
                    );
                }
                Err(e) => {
                    warn!(origin = %entry.origin, "规则集加载失败: {}", e);
                    metrics::record_load_failure(&self.source.describe());
                    if let Some(previous) = loaded.get(&entry.origin) {
                        current.insert(entry.origin.clone(), previous.clone());
                    }
                    report.failed.push(LoadFailure {
                        origin: entry.origin,
                        error: e.to_string(),
                    });
                }
            }
        }

        let live: HashSet<&str> = current.values().map(|e| e.name.as_str()).collect();
        let mut stale: Vec<&str> = loaded
            .values()
            .map(|e| e.name.as_str())
            .filter(|name| !live.contains(name))
            .collect();
        stale.sort();
        stale.dedup();
        for name in stale {
            if self.engine.unregister(name) {
                report.removed.push(name.to_string());
            }
        }

        *loaded = current;

        info!(
            loaded = report.loaded.len(),
            unchanged = report.unchanged.len(),
            failed = report.failed.len(),
            removed = report.removed.len(),
            "规则集同步完成"
        );
        Ok(report)
    }
}
