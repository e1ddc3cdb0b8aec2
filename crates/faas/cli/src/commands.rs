//! Command implementations
//!
//! Each command renders its result into a string so the caller decides where
//! it goes.

use crate::error::CliResult;
use clap::{Args, ValueEnum};
use faas_controller::Controller;
use faas_observability::{export_metrics, InvocationMetrics, InvocationRecorder};
use faas_types::{FaasConfig, FaasResult, InvokerSpec, PolicyKind, ProviderRef, Value};
use prometheus::Registry;
use serde::Serialize;
use serde_json::json;
use std::fmt::Write as _;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::info;

const ACTION_ID: &str = "demo";

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human readable lines
    #[default]
    Text,
    /// JSON document
    Json,
}

/// Built-in actions available to `faas run`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum DemoAction {
    /// Sleep for `--sleep-ms`, then return the argument
    #[default]
    Sleep,
    /// Return the argument unchanged
    Echo,
}

#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    /// Action to dispatch
    #[arg(long, value_enum, default_value = "sleep")]
    pub action: DemoAction,

    /// Number of invocations in the batch
    #[arg(short = 'n', long, default_value = "4")]
    pub count: usize,

    /// RAM units required per invocation
    #[arg(long, default_value = "1")]
    pub ram: u64,

    /// Sleep duration of the `sleep` action
    #[arg(long, default_value = "500")]
    pub sleep_ms: u64,

    /// Dispatch the batch to worker pools instead of the calling thread
    #[arg(long = "async")]
    pub r#async: bool,

    /// Override the configured policy
    #[arg(long)]
    pub policy: Option<PolicyKind>,

    /// Append Prometheus metrics to the report
    #[arg(long)]
    pub metrics: bool,
}

/// Topology used when no config file is given: two leaves of two units
pub fn demo_config() -> FaasConfig {
    FaasConfig {
        invokers: vec![
            InvokerSpec::leaf(2, 2).with_id("worker-1"),
            InvokerSpec::leaf(2, 2).with_id("worker-2"),
        ],
        ..Default::default()
    }
}

#[derive(Debug, Serialize)]
struct InvocationLine {
    index: usize,
    invoker: String,
    elapsed_ms: u128,
    success: bool,
    result: Value,
}

#[derive(Debug, Serialize)]
struct RunReport {
    action: String,
    policy: String,
    invocations: Vec<InvocationLine>,
    total_ms: u128,
    #[serde(skip_serializing_if = "Option::is_none")]
    metrics: Option<String>,
}

fn register_demo_action(controller: &Controller, args: &RunArgs) -> FaasResult<()> {
    match args.action {
        DemoAction::Echo => controller.register_action(ACTION_ID, Ok, args.ram),
        DemoAction::Sleep => {
            let nap = Duration::from_millis(args.sleep_ms);
            controller.register_action(
                ACTION_ID,
                move |v| {
                    thread::sleep(nap);
                    Ok(v)
                },
                args.ram,
            )
        }
    }
}

fn line(index: usize, invoker: String, elapsed: Duration, result: FaasResult<Value>) -> InvocationLine {
    let (success, result) = match result {
        Ok(value) => (true, value),
        Err(e) => (false, json!(e.to_string())),
    };
    InvocationLine {
        index,
        invoker,
        elapsed_ms: elapsed.as_millis(),
        success,
        result,
    }
}

/// Build the topology, dispatch the batch and report per-invocation timings
pub async fn run(mut config: FaasConfig, args: RunArgs, format: OutputFormat) -> CliResult<String> {
    if let Some(kind) = args.policy {
        config.policy.kind = kind;
    }
    let controller = Arc::new(Controller::from_config(&config)?);
    let recorder = Arc::new(InvocationRecorder::new());
    controller.observers().add(recorder.clone());
    let registry = Registry::new();
    controller
        .observers()
        .add(Arc::new(InvocationMetrics::new(&registry)));
    register_demo_action(&controller, &args)?;

    let batch: Vec<Value> = (0..args.count).map(|i| json!(i)).collect();
    info!(
        count = batch.len(),
        ram = args.ram,
        policy = %config.policy.kind,
        asynchronous = args.r#async,
        "Dispatching"
    );

    let started = Instant::now();
    let invocations = if args.r#async {
        let handles = controller.invoke_async_many(ACTION_ID, batch)?;
        let waits = handles.into_iter().enumerate().map(|(index, handle)| {
            let invoker = handle.invoker_id().to_string();
            async move {
                let result = handle.await;
                line(index, invoker, started.elapsed(), result)
            }
        });
        futures::future::join_all(waits).await
    } else {
        let sync_controller = Arc::clone(&controller);
        let sync_recorder = Arc::clone(&recorder);
        tokio::task::spawn_blocking(move || {
            batch
                .into_iter()
                .enumerate()
                .map(|(index, arg)| {
                    let begun = Instant::now();
                    let result = sync_controller.invoke(ACTION_ID, arg);
                    let invoker = sync_recorder
                        .records()
                        .last()
                        .map(|r| r.invoker_id.to_string())
                        .unwrap_or_default();
                    line(index, invoker, begun.elapsed(), result)
                })
                .collect::<Vec<_>>()
        })
        .await?
    };
    let total = started.elapsed();
    controller.shutdown_all_invokers();

    let report = RunReport {
        action: format!("{:?}", args.action).to_lowercase(),
        policy: config.policy.kind.to_string(),
        invocations,
        total_ms: total.as_millis(),
        metrics: if args.metrics {
            Some(export_metrics(&registry)?)
        } else {
            None
        },
    };
    render_run(&report, format)
}

fn render_run(report: &RunReport, format: OutputFormat) -> CliResult<String> {
    if format == OutputFormat::Json {
        return Ok(serde_json::to_string_pretty(report)?);
    }
    let mut out = String::new();
    let _ = writeln!(out, "{} x{} with {}", report.action, report.invocations.len(), report.policy);
    for inv in &report.invocations {
        let status = if inv.success { "ok" } else { "failed" };
        let _ = writeln!(
            out,
            "  #{:<3} {:<24} {:>6} ms  {} {}",
            inv.index, inv.invoker, inv.elapsed_ms, status, inv.result
        );
    }
    let _ = write!(out, "total {} ms", report.total_ms);
    if let Some(metrics) = &report.metrics {
        let _ = write!(out, "\n\n{}", metrics.trim_end());
    }
    Ok(out)
}

#[derive(Debug, Serialize)]
struct TopologyNode {
    id: String,
    max_ram: u64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    children: Vec<TopologyNode>,
}

impl TopologyNode {
    fn from_provider(provider: &ProviderRef) -> Self {
        Self {
            id: provider.id().to_string(),
            max_ram: provider.max_ram(),
            children: provider
                .children()
                .iter()
                .map(TopologyNode::from_provider)
                .collect(),
        }
    }

    fn render(&self, depth: usize, out: &mut String) {
        let kind = if self.children.is_empty() { "leaf" } else { "composite" };
        let _ = writeln!(
            out,
            "{}{} ({}, max_ram={})",
            "  ".repeat(depth),
            self.id,
            kind,
            self.max_ram
        );
        for child in &self.children {
            child.render(depth + 1, out);
        }
    }
}

/// Render the invoker tree described by `config`
pub fn topology(config: &FaasConfig, format: OutputFormat) -> CliResult<String> {
    let controller = Controller::from_config(config)?;
    let nodes: Vec<TopologyNode> = controller
        .invokers()
        .iter()
        .map(TopologyNode::from_provider)
        .collect();
    controller.shutdown_all_invokers();

    if format == OutputFormat::Json {
        return Ok(serde_json::to_string_pretty(&json!({
            "policy": config.policy.kind.to_string(),
            "invokers": nodes,
        }))?);
    }
    let mut out = format!("policy {}\n", config.policy.kind);
    for node in &nodes {
        node.render(0, &mut out);
    }
    Ok(out.trim_end().to_string())
}

fn describe(kind: PolicyKind) -> &'static str {
    match kind {
        PolicyKind::RoundRobin => "rotate over capable invokers, preferring ones with room",
        PolicyKind::GreedyGroup => "tightest fit first, rotate once everything is full",
        PolicyKind::BigGroup => "planned groups per invoker, retrying past incapable ones",
        PolicyKind::UniformGroup => "planned groups per invoker, skipping full ones",
    }
}

/// List policy names with a one-line description
pub fn policies(kinds: &[PolicyKind], format: OutputFormat) -> CliResult<String> {
    if format == OutputFormat::Json {
        let list: Vec<Value> = kinds
            .iter()
            .map(|k| json!({ "name": k.to_string(), "description": describe(*k) }))
            .collect();
        return Ok(serde_json::to_string_pretty(&list)?);
    }
    Ok(kinds
        .iter()
        .map(|k| format!("{:<14} {}", k.to_string(), describe(*k)))
        .collect::<Vec<_>>()
        .join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(action: DemoAction, asynchronous: bool) -> RunArgs {
        RunArgs {
            action,
            count: 4,
            ram: 1,
            sleep_ms: 50,
            r#async: asynchronous,
            policy: None,
            metrics: false,
        }
    }

    #[tokio::test]
    async fn test_run_async_batch_spreads_over_workers() {
        let report = run(demo_config(), args(DemoAction::Sleep, true), OutputFormat::Json)
            .await
            .unwrap();
        let parsed: Value = serde_json::from_str(&report).unwrap();
        let invocations = parsed["invocations"].as_array().unwrap();
        assert_eq!(invocations.len(), 4);
        assert!(invocations.iter().all(|i| i["success"] == json!(true)));
        let workers: std::collections::HashSet<_> =
            invocations.iter().map(|i| i["invoker"].to_string()).collect();
        assert_eq!(workers.len(), 2);
    }

    #[tokio::test]
    async fn test_run_sync_with_metrics() {
        let mut run_args = args(DemoAction::Echo, false);
        run_args.metrics = true;
        run_args.policy = Some(PolicyKind::GreedyGroup);
        let report = run(demo_config(), run_args, OutputFormat::Text).await.unwrap();
        assert!(report.starts_with("echo x4 with greedy_group"));
        assert!(report.contains("invoker:worker-1"));
        assert!(report.contains("faas_invocations_total"));
    }

    #[tokio::test]
    async fn test_run_oversized_request_fails() {
        let mut run_args = args(DemoAction::Echo, true);
        run_args.ram = 8;
        assert!(run(demo_config(), run_args, OutputFormat::Text).await.is_err());
    }

    #[test]
    fn test_topology_renders_tree() {
        let config = FaasConfig {
            invokers: vec![InvokerSpec::leaf(2, 1)
                .with_id("rack")
                .with_child(InvokerSpec::leaf(4, 1).with_id("node"))],
            ..Default::default()
        };
        let text = topology(&config, OutputFormat::Text).unwrap();
        assert_eq!(
            text,
            "policy round_robin\ninvoker:rack (composite, max_ram=2)\n  invoker:node (leaf, max_ram=4)"
        );
        let json = topology(&config, OutputFormat::Json).unwrap();
        assert!(json.contains("\"max_ram\": 4"));
    }

    #[test]
    fn test_policies_lists_every_kind() {
        let text = policies(&PolicyKind::ALL, OutputFormat::Text).unwrap();
        assert_eq!(text.lines().count(), 4);
        assert!(text.starts_with("round_robin"));
    }
}
