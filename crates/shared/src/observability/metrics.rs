//! Prometheus 指标模块
//!
//! 基于 metrics crate 和 metrics-exporter-prometheus 实现指标收集与导出。
//! 指标通过独立的 HTTP 端口暴露，供 Prometheus 抓取。

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::info;

use crate::config::ObservabilityConfig;

/// 评估次数计数器（标签：rule_set, status）
pub const EVALUATIONS_TOTAL: &str = "fuzzy_evaluations_total";
/// 单次评估耗时直方图
pub const EVALUATION_DURATION_SECONDS: &str = "fuzzy_evaluation_duration_seconds";
/// 引用未注册规则集的评估次数
pub const UNKNOWN_RULE_SET_TOTAL: &str = "fuzzy_unknown_rule_set_total";
/// 当前已发布的规则集数量
pub const RULE_SETS_REGISTERED: &str = "fuzzy_rule_sets_registered";
/// 规则集加载失败次数
pub const RULE_SET_LOAD_FAILURES_TOTAL: &str = "fuzzy_rule_set_load_failures_total";

/// 初始化 Prometheus 指标导出
pub fn init(service_name: &str, config: &ObservabilityConfig) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], config.metrics_port));

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context("安装 Prometheus recorder 失败")?;

    describe_metrics();
    metrics::counter!("service_starts_total", "service" => service_name.to_string()).increment(1);

    info!("Metrics exporter listening on {}", addr);
    Ok(())
}

/// 描述引擎指标，出现在 /metrics 端点的 HELP 注释中
fn describe_metrics() {
    metrics::describe_counter!(EVALUATIONS_TOTAL, "Total number of rule set evaluations");
    metrics::describe_histogram!(
        EVALUATION_DURATION_SECONDS,
        "Rule set evaluation duration in seconds"
    );
    metrics::describe_counter!(
        UNKNOWN_RULE_SET_TOTAL,
        "Evaluations that referenced an unpublished rule set"
    );
    metrics::describe_gauge!(RULE_SETS_REGISTERED, "Number of published rule sets");
    metrics::describe_counter!(
        RULE_SET_LOAD_FAILURES_TOTAL,
        "Rule set documents rejected while loading"
    );
}

// ============================================================================
// 便捷的指标记录函数
// ============================================================================

/// 记录一次规则集评估
#[inline]
pub fn record_evaluation(rule_set: &str, status: &str, duration_secs: f64) {
    metrics::counter!(
        EVALUATIONS_TOTAL,
        "rule_set" => rule_set.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    metrics::histogram!(
        EVALUATION_DURATION_SECONDS,
        "rule_set" => rule_set.to_string()
    )
    .record(duration_secs);
}

/// 记录一次对未注册规则集的评估请求
#[inline]
pub fn record_unknown_rule_set(rule_set: &str) {
    metrics::counter!(UNKNOWN_RULE_SET_TOTAL, "rule_set" => rule_set.to_string()).increment(1);
}

/// 更新已发布规则集数量
#[inline]
pub fn set_rule_sets_registered(count: usize) {
    metrics::gauge!(RULE_SETS_REGISTERED).set(count as f64);
}

/// 记录一次规则集文档加载失败
#[inline]
pub fn record_load_failure(source: &str) {
    metrics::counter!(RULE_SET_LOAD_FAILURES_TOTAL, "source" => source.to_string()).increment(1);
}
