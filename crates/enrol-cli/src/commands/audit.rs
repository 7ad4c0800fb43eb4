use enrol_core::time::format_millis;
use serde::Serialize;

use crate::cli::GlobalFlags;
use crate::cli::root_commands::{HistoryArgs, PairArgs, SnapshotArgs};
use crate::context::AppContext;
use crate::output::output;

#[derive(Serialize)]
struct HistoryRow {
    at: i64,
    time: String,
    status: Option<bool>,
}

/// Handle `enrolctl history`.
pub fn history(args: &HistoryArgs, ctx: &AppContext, flags: &GlobalFlags) -> anyhow::Result<()> {
    if !ctx.manager.journal().is_enabled() {
        tracing::warn!("provider journal is disabled; set journal.enabled to record history");
    }
    let rows: Vec<HistoryRow> = ctx
        .manager
        .get_provider_history(&args.provider, args.pair.learner, args.pair.course)?
        .into_iter()
        .map(|entry| HistoryRow {
            at: entry.at,
            time: format_millis(entry.at),
            status: entry.status,
        })
        .collect();
    output(&rows, flags.format)
}

/// Handle `enrolctl snapshot`.
pub fn snapshot(args: &SnapshotArgs, ctx: &AppContext, flags: &GlobalFlags) -> anyhow::Result<()> {
    let snapshot = ctx
        .manager
        .get_enrolment_snapshot(args.pair.learner, args.pair.course, args.at)?;
    output(&snapshot, flags.format)
}

/// Handle `enrolctl debug`.
pub fn debug(args: &PairArgs, ctx: &AppContext, flags: &GlobalFlags) -> anyhow::Result<()> {
    let report = ctx.manager.debug_learner(args.learner, args.course)?;
    output(&report, flags.format)
}
