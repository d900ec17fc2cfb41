mod cli;
mod output;

use std::io::Write;
use std::process;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use pkgaudit::{Context, PackageRequest, TaskRegistry, TracingSink, run_pipeline};

use crate::cli::Cli;

fn main() {
    let args = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(args.verbosity.tracing_level_filter().into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Some(dir) = &args.output_dir {
        // Safety: no other threads are running yet, the runtime starts below.
        unsafe { std::env::set_var(pkgaudit::artifacts::ARTIFACTS_DIR_ENV, dir) };
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("error: could not start async runtime: {err}");
            process::exit(1);
        }
    };

    match runtime.block_on(run(args)) {
        Ok(critical) => {
            if critical {
                process::exit(1);
            }
        }
        Err(err) => {
            eprintln!("error: {err:#}");
            process::exit(1);
        }
    }
}

/// Runs the audit and prints the outcome. Returns whether the result
/// carries a critical finding, which maps to a non-zero exit code.
async fn run(args: Cli) -> anyhow::Result<bool> {
    let request: PackageRequest = args.package.parse()?;
    tracing::debug!(package = %request, source = %args.source, "starting audit");

    let mut ctx = Context::from_request(request, args.source);
    if let Some(version) = args.package_version {
        ctx.requested_version = Some(version);
    }
    let ctx = ctx.with_sink(Arc::new(TracingSink));

    let registry = TaskRegistry::with_defaults();
    let result = run_pipeline(&registry, ctx).await;

    let stdout = std::io::stdout();
    let mut writer = stdout.lock();
    output::formatter(args.json).write_result(&result, &mut writer)?;
    writer.flush()?;

    Ok(result.has_critical_finding())
}
