use enrol_core::{CourseId, LearnerId};
use enrol_engine::JobHandle;
use serde::Serialize;

use crate::cli::GlobalFlags;
use crate::cli::root_commands::{CourseArgs, PairArgs, RecalculateArgs, StatusArgs};
use crate::context::AppContext;
use crate::output::output;

#[derive(Serialize)]
struct PairStatus {
    learner: LearnerId,
    course: CourseId,
    enrolled: bool,
    removed: bool,
}

fn pair_status(pair: &PairArgs, enrolled: bool, ctx: &AppContext) -> anyhow::Result<PairStatus> {
    Ok(PairStatus {
        learner: pair.learner,
        course: pair.course,
        enrolled,
        removed: ctx.manager.is_learner_removed(pair.learner, pair.course)?,
    })
}

/// Handle `enrolctl status`.
pub fn status(args: &StatusArgs, ctx: &AppContext, flags: &GlobalFlags) -> anyhow::Result<()> {
    let pair = &args.pair;
    let enrolled = ctx
        .manager
        .is_enrolled(pair.learner, pair.course, !args.no_cache)?;
    output(&pair_status(pair, enrolled, ctx)?, flags.format)
}

/// Handle `enrolctl enrol`.
pub fn enrol(args: &PairArgs, ctx: &AppContext, flags: &GlobalFlags) -> anyhow::Result<()> {
    ctx.manager.enrol(args.learner, args.course)?;
    let enrolled = ctx.manager.is_enrolled(args.learner, args.course, true)?;
    output(&pair_status(args, enrolled, ctx)?, flags.format)
}

/// Handle `enrolctl withdraw`.
pub fn withdraw(args: &PairArgs, ctx: &AppContext, flags: &GlobalFlags) -> anyhow::Result<()> {
    ctx.manager.withdraw(args.learner, args.course)?;
    let enrolled = ctx.manager.is_enrolled(args.learner, args.course, true)?;
    output(&pair_status(args, enrolled, ctx)?, flags.format)
}

/// Handle `enrolctl remove`.
pub fn remove(args: &PairArgs, ctx: &AppContext, flags: &GlobalFlags) -> anyhow::Result<()> {
    ctx.manager.remove_learner(args.learner, args.course)?;
    output(&pair_status(args, false, ctx)?, flags.format)
}

/// Handle `enrolctl restore`.
pub fn restore(args: &PairArgs, ctx: &AppContext, flags: &GlobalFlags) -> anyhow::Result<()> {
    let enrolled = ctx.manager.restore_learner(args.learner, args.course)?;
    output(&pair_status(args, enrolled, ctx)?, flags.format)
}

/// Handle `enrolctl enrolled`.
pub fn enrolled(args: &CourseArgs, ctx: &AppContext, flags: &GlobalFlags) -> anyhow::Result<()> {
    let learners = ctx.manager.get_enrolled_user_ids(args.course)?;
    output(&learners, flags.format)
}

#[derive(Serialize)]
struct ScheduledJob {
    job: String,
    course: CourseId,
    current_learners_only: bool,
}

/// Handle `enrolctl recalculate`.
pub fn recalculate(
    args: &RecalculateArgs,
    ctx: &AppContext,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    let handle = ctx
        .manager
        .recalculate_enrolment(args.course, args.current_only)?;
    let current_learners_only = match handle {
        JobHandle::CourseCalculation {
            current_learners_only,
            ..
        } => current_learners_only,
        JobHandle::LearnerCalculation => false,
    };
    output(
        &ScheduledJob {
            job: handle.name(),
            course: args.course,
            current_learners_only,
        },
        flags.format,
    )
}
