//! 规则目录热更新
//!
//! 使用 `notify` 监听规则目录，`*.json` 文件的创建、修改和删除事件
//! 经过去抖窗口后触发一次 `RuleSetLoader::sync`。

use crate::loader::RuleSetLoader;
use anyhow::{Context, Result};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// 规则目录监听器
pub struct RuleSetWatcher {
    dir: PathBuf,
    debounce: Duration,
    loader: Arc<RuleSetLoader>,
    shutdown_tx: watch::Sender<bool>,
    /// 监听句柄，drop 后系统监听随之释放
    watcher: parking_lot::Mutex<Option<RecommendedWatcher>>,
    task: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

impl RuleSetWatcher {
    pub fn new(dir: impl AsRef<Path>, debounce: Duration, loader: Arc<RuleSetLoader>) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            dir: dir.as_ref().to_path_buf(),
            debounce,
            loader,
            shutdown_tx,
            watcher: parking_lot::Mutex::new(None),
            task: parking_lot::Mutex::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.watcher.lock().is_some()
    }

    /// 启动监听；重复调用无副作用
    pub fn start(&self) -> Result<()> {
        let mut watcher_slot = self.watcher.lock();
        if watcher_slot.is_some() {
            return Ok(());
        }

        let (event_tx, mut event_rx) = mpsc::channel::<()>(16);

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            match res {
                Ok(event) => {
                    let relevant = matches!(
                        event.kind,
                        EventKind::Modify(_) | EventKind::Create(_) | EventKind::Remove(_)
                    ) && event
                        .paths
                        .iter()
                        .any(|p| p.extension().is_some_and(|ext| ext == "json"));
                    if relevant {
                        let _ = event_tx.try_send(());
                    }
                }
                Err(e) => warn!(error = %e, "规则目录监听事件错误"),
            }
        })
        .context("创建规则目录监听器失败")?;

        watcher
            .watch(&self.dir, RecursiveMode::NonRecursive)
            .with_context(|| format!("监听规则目录失败: {}", self.dir.display()))?;

        let loader = Arc::clone(&self.loader);
        let debounce = self.debounce;
        let _ = self.shutdown_tx.send(false);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    Some(()) = event_rx.recv() => {
                        // 去抖：等待窗口期后合并积压事件
                        tokio::time::sleep(debounce).await;
                        while event_rx.try_recv().is_ok() {}

                        match loader.sync().await {
                            Ok(report) if report.has_failures() => {
                                warn!(failed = report.failed.len(), "规则目录变更，部分规则集加载失败");
                            }
                            Ok(_) => info!("规则目录变更，已重新加载"),
                            Err(e) => error!(error = %e, "规则目录重新加载失败，保留当前规则集"),
                        }
                    }
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            info!("规则目录监听已停止");
        });

        *watcher_slot = Some(watcher);
        *self.task.lock() = Some(task);

        info!(path = %self.dir.display(), debounce_ms = debounce.as_millis() as u64, "规则目录监听已启动");
        Ok(())
    }

    /// 停止监听并等待后台任务退出
    pub async fn stop(&self) {
        self.watcher.lock().take();
        let _ = self.shutdown_tx.send(true);

        let task = self.task.lock().take();
        if let Some(task) = task
            && let Err(e) = task.await
        {
            warn!(error = %e, "规则目录监听任务异常退出");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::FuzzyEngine;
    use crate::loader::DirectoryRuleSetSource;

    const RULE_SET: &str = r#"
    {
        "name": "Watched",
        "variables": [
            { "name": "x", "terms": [ { "name": "low", "shape": { "type": "triangle", "points": [0, 1, 2] } } ] }
        ],
        "rules": [
            {
                "id": "r1",
                "antecedent": { "type": "test", "variable": "x", "term": "low" },
                "score_delta": -10,
                "severity": "info",
                "message_template": "x is low"
            }
        ]
    }
    "#;

    async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
        for _ in 0..100 {
            if condition() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        false
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_watcher_reloads_on_change() {
        let dir = tempfile::tempdir().unwrap();
        let engine = FuzzyEngine::new();
        let loader = Arc::new(RuleSetLoader::new(
            engine.clone(),
            Arc::new(DirectoryRuleSetSource::new(dir.path())),
        ));

        let watcher = RuleSetWatcher::new(dir.path(), Duration::from_millis(50), loader);
        watcher.start().unwrap();
        assert!(watcher.is_running());

        std::fs::write(dir.path().join("watched.json"), RULE_SET).unwrap();
        assert!(wait_until(|| engine.lookup("Watched").is_some()).await);

        std::fs::remove_file(dir.path().join("watched.json")).unwrap();
        assert!(wait_until(|| engine.lookup("Watched").is_none()).await);

        watcher.stop().await;
        assert!(!watcher.is_running());
    }

    #[tokio::test]
    async fn test_start_on_missing_dir_fails() {
        let engine = FuzzyEngine::new();
        let loader = Arc::new(RuleSetLoader::new(
            engine,
            Arc::new(DirectoryRuleSetSource::new("/nonexistent/fuzzy-rules")),
        ));
        let watcher = RuleSetWatcher::new("/nonexistent/fuzzy-rules", Duration::from_millis(10), loader);

        assert!(watcher.start().is_err());
        assert!(!watcher.is_running());
    }
}
