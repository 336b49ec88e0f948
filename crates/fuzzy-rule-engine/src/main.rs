//! 模糊规则评估服务
//!
//! 从规则目录加载规则集，然后逐行读取标准输入中的评估请求
//! `{"rule_set": "...", "inputs": {...}}`，每行输出一个 JSON 结果。

use anyhow::{Context, Result};
use fuzzy_engine::{Bindings, DirectoryRuleSetSource, FuzzyEngine, RuleSetLoader, RuleSetWatcher};
use fuzzy_shared::config::AppConfig;
use fuzzy_shared::observability;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::signal;
use tracing::{error, info, warn};

const SERVICE_NAME: &str = "fuzzy-rule-engine";

/// 单行评估请求
#[derive(Debug, Deserialize)]
struct EvaluationRequest {
    rule_set: String,
    #[serde(default)]
    inputs: Bindings,
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load(SERVICE_NAME).unwrap_or_else(|e| {
        eprintln!("Failed to load config, using defaults: {}", e);
        AppConfig {
            service_name: SERVICE_NAME.to_string(),
            ..AppConfig::default()
        }
    });

    let _guard = observability::init(&config.service_name, &config.observability)?;

    info!(
        environment = %config.environment,
        rules_dir = %config.rules.dir.display(),
        "Starting fuzzy-rule-engine..."
    );

    let engine = FuzzyEngine::with_config(config.engine.clone()).context("引擎配置无效")?;

    let loader = Arc::new(RuleSetLoader::new(
        engine.clone(),
        Arc::new(DirectoryRuleSetSource::new(&config.rules.dir)),
    ));
    match loader.sync().await {
        Ok(report) => info!(
            loaded = report.loaded.len(),
            failed = report.failed.len(),
            "Initial rule sets loaded"
        ),
        Err(e) => warn!("Failed to load rule sets: {}, starting with empty registry", e),
    }

    let watcher = RuleSetWatcher::new(
        &config.rules.dir,
        Duration::from_millis(config.rules.debounce_ms),
        Arc::clone(&loader),
    );
    if config.rules.watch
        && let Err(e) = watcher.start()
    {
        warn!("Rule directory watcher disabled: {:#}", e);
    }

    serve_stdin(&engine).await?;

    watcher.stop().await;
    info!("Service shutdown complete");
    Ok(())
}

/// 逐行处理标准输入，直到 EOF 或收到关闭信号
async fn serve_stdin(engine: &FuzzyEngine) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("读取标准输入失败")? else {
                    info!("Input closed");
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }

                let response = handle_line(engine, &line);
                let mut out = serde_json::to_vec(&response)?;
                out.push(b'\n');
                stdout.write_all(&out).await?;
                stdout.flush().await?;
            }
            _ = &mut shutdown => break,
        }
    }

    Ok(())
}

fn handle_line(engine: &FuzzyEngine, line: &str) -> serde_json::Value {
    let request: EvaluationRequest = match serde_json::from_str(line) {
        Ok(request) => request,
        Err(e) => {
            warn!(error = %e, "Invalid request line");
            return serde_json::json!({ "error": format!("invalid request: {}", e) });
        }
    };

    match engine.evaluate(&request.rule_set, &request.inputs) {
        Ok(result) => serde_json::to_value(&result)
            .unwrap_or_else(|e| serde_json::json!({ "error": e.to_string() })),
        Err(e) => serde_json::json!({ "rule_set": request.rule_set, "error": e.to_string() }),
    }
}

/// 优雅关闭信号处理
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, starting graceful shutdown...");
        }
    }
}
