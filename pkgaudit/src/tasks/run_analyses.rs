use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, instrument};

use crate::analyzer::Analyzer;
use crate::context::Context;
use crate::pipeline::Task;

/// Runs every configured analyzer over the collected state and appends
/// their findings in analyzer order.
pub struct RunAnalysesTask {
    analyzers: Vec<Arc<dyn Analyzer>>,
}

impl RunAnalysesTask {
    pub fn new(analyzers: Vec<Arc<dyn Analyzer>>) -> Self {
        Self { analyzers }
    }
}

#[async_trait]
impl Task for RunAnalysesTask {
    fn name(&self) -> &'static str {
        "run_analyses"
    }

    fn status_message(&self, _ctx: &Context) -> String {
        "Running analyzers".to_string()
    }

    #[instrument(skip(self, ctx), fields(package = %ctx.package_name, analyzer_count = self.analyzers.len()))]
    async fn run(&self, ctx: &mut Context) -> anyhow::Result<()> {
        for analyzer in &self.analyzers {
            let findings = analyzer.run(ctx);
            debug!(
                analyzer = analyzer.name(),
                count = findings.len(),
                "analyzer finished"
            );
            ctx.findings.extend(findings);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::finding::{Finding, Severity};
    use crate::package::RepoSource;

    struct CannedAnalyzer {
        analyzer_name: &'static str,
        messages: Vec<&'static str>,
    }

    impl Analyzer for CannedAnalyzer {
        fn name(&self) -> &'static str {
            self.analyzer_name
        }

        fn run(&self, _ctx: &Context) -> Vec<Finding> {
            self.messages
                .iter()
                .map(|m| Finding::new(self.analyzer_name, *m, Severity::Info))
                .collect()
        }
    }

    #[tokio::test]
    async fn findings_accumulate_in_analyzer_order() {
        let task = RunAnalysesTask::new(vec![
            Arc::new(CannedAnalyzer {
                analyzer_name: "first",
                messages: vec!["a", "b"],
            }),
            Arc::new(CannedAnalyzer {
                analyzer_name: "second",
                messages: vec!["c"],
            }),
        ]);
        let mut ctx = Context::new("demo", RepoSource::Pypi);

        task.run(&mut ctx).await.unwrap();

        let messages: Vec<&str> = ctx.findings.iter().map(|f| f.message.as_str()).collect();
        assert_eq!(messages, vec!["a", "b", "c"]);
        assert_eq!(ctx.findings[2].source, "second");
    }

    #[tokio::test]
    async fn no_analyzers_is_a_no_op() {
        let task = RunAnalysesTask::new(Vec::new());
        let mut ctx = Context::new("demo", RepoSource::Pypi);

        task.run(&mut ctx).await.unwrap();
        assert!(ctx.findings.is_empty());
    }

    #[tokio::test]
    async fn default_analyzer_set_reports_on_missing_metadata() {
        let task = RunAnalysesTask::new(crate::analyzer::default_analyzers());
        let mut ctx = Context::new("demo", RepoSource::Pypi);

        task.run(&mut ctx).await.unwrap();

        assert_eq!(ctx.findings.len(), 1);
        assert!(
            ctx.findings[0].message.contains("metadata is missing"),
            "got: {}",
            ctx.findings[0].message
        );
    }
}
