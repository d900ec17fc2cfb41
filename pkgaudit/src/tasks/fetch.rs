use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, instrument, warn};

use crate::context::Context;
use crate::error::{FatalError, RegistryError};
use crate::finding::Severity;
use crate::pipeline::Task;
use crate::registry::RegistryRouter;

/// Resolves package metadata from the registry matching the context's
/// source.
///
/// A package (or pinned version) that does not exist halts the audit;
/// transport trouble is recorded as a warning and the chain continues
/// without metadata.
pub struct FetchTask {
    registry: Arc<RegistryRouter>,
}

impl FetchTask {
    pub fn new(registry: Arc<RegistryRouter>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl Task for FetchTask {
    fn name(&self) -> &'static str {
        "fetch"
    }

    fn status_message(&self, ctx: &Context) -> String {
        format!(
            "Fetching metadata for {} from {}",
            ctx.package_name,
            ctx.source.registry_name()
        )
    }

    #[instrument(skip(self, ctx), fields(package = %ctx.package_name, source = %ctx.source))]
    async fn run(&self, ctx: &mut Context) -> anyhow::Result<()> {
        let client = self.registry.client_for(ctx.source);
        let outcome = client
            .fetch_metadata(&ctx.package_name, ctx.requested_version.as_deref())
            .await;

        match outcome {
            Ok(package) => {
                debug!(
                    version = package.version.as_deref().unwrap_or("unknown"),
                    "metadata fetched"
                );
                for line in package.info_lines() {
                    ctx.emit(&line);
                }
                ctx.push_finding(
                    self.name(),
                    format!(
                        "fetched metadata for {} version {}",
                        package.name,
                        package.version.as_deref().unwrap_or("unknown")
                    ),
                    Severity::Info,
                );
                ctx.package = Some(package);
                Ok(())
            }
            Err(RegistryError::NotFound(message)) => {
                Err(FatalError::in_task(self.name(), message).into())
            }
            Err(err) => {
                warn!(error = %err, "metadata fetch failed, continuing without metadata");
                let message = format!("could not fetch package metadata: {err}");
                ctx.emit_error(&message);
                ctx.push_finding(self.name(), message, Severity::Warning);
                Ok(())
            }
        }
    }
}
