use std::time::Duration;

use anyhow::Context;
use enrol_config::EnrolConfig;
use enrol_core::jobs::LearnerJobState;
use serde::Serialize;

use crate::cli::GlobalFlags;
use crate::cli::root_commands::WorkerArgs;
use crate::context::AppContext;
use crate::output::output;

#[derive(Serialize)]
struct VersionInfo {
    calculation_version: String,
    providers: Vec<String>,
    learner_job: LearnerJobState,
    scheduled_jobs: Vec<String>,
}

/// Handle `enrolctl version`.
pub fn version(ctx: &AppContext, flags: &GlobalFlags) -> anyhow::Result<()> {
    let info = VersionInfo {
        calculation_version: ctx.manager.get_calculation_version().to_string(),
        providers: ctx
            .manager
            .registry()
            .get_all()
            .map(|p| format!("{}:{}", p.id(), p.version()))
            .collect(),
        learner_job: ctx.manager.learner_job_state()?,
        scheduled_jobs: ctx.site.scheduled_jobs(),
    };
    output(&info, flags.format)
}

#[derive(Serialize)]
struct TickReport {
    learner_job_started: bool,
    jobs_run: usize,
    still_scheduled: Vec<String>,
}

fn run_tick(ctx: &AppContext) -> anyhow::Result<TickReport> {
    let learner_job_started = ctx.manager.maybe_start_learner_calculation()?;
    let jobs_run = ctx.manager.run_due_jobs()?;
    ctx.manager.flush()?;
    Ok(TickReport {
        learner_job_started,
        jobs_run,
        still_scheduled: ctx.site.scheduled_jobs(),
    })
}

/// Handle `enrolctl tick`.
pub fn tick(ctx: &AppContext, flags: &GlobalFlags) -> anyhow::Result<()> {
    output(&run_tick(ctx)?, flags.format)
}

/// Handle `enrolctl worker`.
///
/// Reopens the site document on every tick so writes from other `enrolctl`
/// invocations are picked up.
pub async fn worker(args: &WorkerArgs, config: &EnrolConfig, flags: &GlobalFlags) -> anyhow::Result<()> {
    let secs = args.interval.unwrap_or(config.jobs.tick_interval_secs).max(1);
    let mut interval = tokio::time::interval(Duration::from_secs(secs));
    tracing::info!(interval_secs = secs, site = %flags.site.display(), "enrolment worker started");

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            signal = tokio::signal::ctrl_c() => {
                signal.context("failed to listen for interrupt")?;
                tracing::info!("enrolment worker stopping");
                return Ok(());
            }
        }

        let site = flags.site.clone();
        let config = config.clone();
        let report = tokio::task::spawn_blocking(move || {
            let ctx = AppContext::open(&site, config)?;
            run_tick(&ctx)
        })
        .await
        .context("worker tick panicked")?;

        match report {
            Ok(report) if report.jobs_run > 0 => {
                if !flags.quiet {
                    output(&report, flags.format)?;
                }
            }
            Ok(_) => tracing::debug!("no scheduled enrolment jobs"),
            Err(error) => tracing::warn!(error = %format!("{error:#}"), "worker tick failed"),
        }
    }
}
