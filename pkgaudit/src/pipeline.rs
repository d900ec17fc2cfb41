use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, instrument, warn};

use crate::analyzer::default_analyzers;
use crate::context::{AuditResult, Context};
use crate::error::FatalError;
use crate::finding::Severity;
use crate::package::RepoSource;
use crate::registry::RegistryRouter;
use crate::report::JsonReportRenderer;
use crate::score::score_context;
use crate::tasks::{
    DownloadTask, ExtractReportDataTask, FetchTask, GenerateReportTask, GenerateSbomTask,
    RunAnalysesTask, ScanVulnerabilitiesTask,
};
use crate::tools::{GrypeCli, SyftCli};

/// One step of an audit. Tasks record recoverable trouble as findings and
/// return `Ok`; returning an error halts the chain.
#[async_trait]
pub trait Task: Send + Sync {
    fn name(&self) -> &'static str;

    /// Short human-facing description of the step, evaluated against the
    /// current context.
    fn status_message(&self, ctx: &Context) -> String;

    async fn run(&self, ctx: &mut Context) -> anyhow::Result<()>;
}

const DEFAULT_CHAIN: &[&str] = &[
    "fetch",
    "download",
    "generate_sbom",
    "scan_vulnerabilities",
    "run_analyses",
    "extract_report_data",
    "generate_report",
];

/// Ordered task names for a package source. Every source currently runs
/// the same chain; the lookup stays per-source so chains can diverge
/// without touching the executor.
pub fn task_chain(source: RepoSource) -> &'static [&'static str] {
    match source {
        RepoSource::Pypi | RepoSource::Npm | RepoSource::Rust => DEFAULT_CHAIN,
    }
}

/// Tasks addressable by name. Built explicitly at startup, nothing
/// registers itself as a side effect.
#[derive(Default)]
pub struct TaskRegistry {
    tasks: HashMap<&'static str, Arc<dyn Task>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self {
            tasks: HashMap::new(),
        }
    }

    /// Registry wired with the production task set.
    pub fn with_defaults() -> Self {
        let router = Arc::new(RegistryRouter::with_defaults());
        let mut registry = Self::new();
        registry.register(Arc::new(FetchTask::new(router.clone())));
        registry.register(Arc::new(DownloadTask::new(router)));
        registry.register(Arc::new(GenerateSbomTask::new(Arc::new(SyftCli::new()))));
        registry.register(Arc::new(ScanVulnerabilitiesTask::new(Arc::new(
            GrypeCli::new(),
        ))));
        registry.register(Arc::new(RunAnalysesTask::new(default_analyzers())));
        registry.register(Arc::new(ExtractReportDataTask));
        registry.register(Arc::new(GenerateReportTask::new(Arc::new(
            JsonReportRenderer,
        ))));
        registry
    }

    /// Registers a task under its own name, replacing any previous task
    /// registered with that name.
    pub fn register(&mut self, task: Arc<dyn Task>) {
        self.tasks.insert(task.name(), task);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Task>> {
        self.tasks.get(name)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

/// Status lines for the tasks before, at and after `task_name` in the
/// source's chain, for progress UIs that show where an audit is. A name
/// outside the chain gets empty neighbours; a name missing from the
/// registry falls back to the raw task name.
pub fn surrounding_status_messages(
    registry: &TaskRegistry,
    source: RepoSource,
    task_name: &str,
    ctx: &Context,
) -> (String, String, String) {
    let status_of = |name: &str| {
        registry
            .get(name)
            .map(|task| task.status_message(ctx))
            .unwrap_or_else(|| name.to_string())
    };
    let chain = task_chain(source);
    let Some(position) = chain.iter().position(|name| *name == task_name) else {
        return (String::new(), status_of(task_name), String::new());
    };
    let previous = if position > 0 {
        status_of(chain[position - 1])
    } else {
        String::new()
    };
    let next = chain
        .get(position + 1)
        .map(|name| status_of(name))
        .unwrap_or_default();
    (previous, status_of(task_name), next)
}

/// Runs the full task chain for the context's source.
pub async fn run_pipeline(registry: &TaskRegistry, ctx: Context) -> AuditResult {
    run_chain(registry, task_chain(ctx.source), ctx).await
}

/// Runs an explicit task chain over the context.
///
/// Never returns an error: a missing task aborts before anything runs, a
/// task error halts the chain, and both leave a critical finding on the
/// partial result.
#[instrument(skip(registry, chain, ctx), fields(package = %ctx.package_name, source = %ctx.source, task_count = chain.len()))]
pub async fn run_chain(registry: &TaskRegistry, chain: &[&str], mut ctx: Context) -> AuditResult {
    let mut tasks: Vec<Arc<dyn Task>> = Vec::with_capacity(chain.len());
    let mut missing: Vec<&str> = Vec::new();
    for name in chain {
        match registry.get(name) {
            Some(task) => tasks.push(task.clone()),
            None => missing.push(name),
        }
    }
    if !missing.is_empty() {
        let message = format!(
            "pipeline configuration error: missing tasks in registry: {}",
            missing.join(", ")
        );
        warn!(%message, "aborting before any task ran");
        ctx.emit_error(&message);
        ctx.push_finding("pipeline", message, Severity::Critical);
        return finish(ctx);
    }

    for task in tasks {
        let status = task.status_message(&ctx);
        ctx.emit_status(&status);
        debug!(task = task.name(), status = %status, "running task");
        if let Err(err) = task.run(&mut ctx).await {
            let (source, message) = match err.downcast::<FatalError>() {
                Ok(fatal) => (
                    fatal.task.unwrap_or_else(|| "pipeline".to_string()),
                    fatal.message,
                ),
                Err(other) => ("pipeline".to_string(), format!("{other:#}")),
            };
            warn!(task = task.name(), error = %message, "fatal error, halting chain");
            ctx.emit_error(&format!("fatal: {message}"));
            ctx.push_finding(&source, message, Severity::Critical);
            return finish(ctx);
        }
        debug!(task = task.name(), "task complete");
    }
    finish(ctx)
}

fn finish(ctx: Context) -> AuditResult {
    let score = score_context(&ctx);
    let report_path = ctx.report_path.clone();
    AuditResult {
        context: ctx,
        score,
        report_path,
    }
}
