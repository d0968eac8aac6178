//! `fleet team ...`

use super::Context;
use super::diagnostics;
use crate::args::TeamAction;
use crate::loops;
use crate::policy::actions;
use colored::*;
use fleet_core::NewTeam;
use fleet_core::recovery::{AutoRecoverAction, AutoRecoverReport};
use fleet_core::scaling::{RecommendInputs, Recommendation, count_repo_files, recommend_preset};
use fleet_core::team::{Dashboard, TeamStatus};
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

pub async fn run(ctx: &Context, action: TeamAction) -> anyhow::Result<()> {
    match action {
        TeamAction::List => list(ctx),
        TeamAction::Create {
            name,
            id,
            description,
            lead,
            lead_session,
            cwd,
            force,
        } => {
            let new = NewTeam {
                name,
                team_id: id,
                description,
                lead_member_id: lead,
                lead_session_id: lead_session,
                cwd,
                force,
            };
            create(ctx, new)
        }
        TeamAction::Start => {
            let scope = ctx.authorized_scope("team.start")?;
            let runtime = scope.start()?;
            ctx.console.render(&runtime, |r| {
                ctx.console.success(&format!(
                    "Team {} is {} in session {}",
                    scope.id(),
                    r.state,
                    r.host_session.as_deref().unwrap_or("-")
                ));
            })
        }
        TeamAction::Stop { keep_session } => {
            let scope = ctx.authorized_scope("team.stop")?;
            let runtime = scope.stop(keep_session)?;
            ctx.console.render(&runtime, |_| {
                ctx.console.success(&format!("Team {} stopped", scope.id()));
            })
        }
        TeamAction::Status => {
            let scope = ctx.authorized_scope(actions::STATUS)?;
            let status = scope.status()?;
            ctx.console.render(&status, |s| print_status(ctx, s))
        }
        TeamAction::Dashboard => {
            let scope = ctx.authorized_scope(actions::DASHBOARD)?;
            let dashboard = scope.dashboard()?;
            ctx.console.render(&dashboard, |d| print_dashboard(ctx, d))
        }
        TeamAction::Resume => {
            let scope = ctx.authorized_scope("team.resume")?;
            let report = scope.recovery().resume()?;
            ctx.console.render(&report, |r| {
                ctx.console.success(&format!(
                    "Resumed {} (session live: {}, repaired: {})",
                    scope.id(),
                    r.host_session_live,
                    join_or_none(&r.repaired_members)
                ));
            })
        }
        TeamAction::Reconcile => {
            let scope = ctx.authorized_scope("team.reconcile")?;
            let report = scope.recovery().reconcile()?;
            ctx.console.render(&report, |r| {
                ctx.console.success(&format!("Reconciled {}", scope.id()));
                ctx.console.field("expired claims", r.expired_claims);
                ctx.console.field("refreshed tasks", r.refreshed_tasks);
                ctx.console.field("compacted events", r.compacted_events);
                ctx.console.field("bridged workers", r.bridged_workers);
                ctx.console.field("escalated", r.escalated);
            })
        }
        TeamAction::Doctor => {
            let scope = ctx.authorized_scope(actions::DOCTOR)?;
            let report = scope.recovery().doctor()?;
            ctx.console
                .render(&report, |r| diagnostics::print_report(&ctx.console, r))
        }
        TeamAction::Recover { hard } => recover(ctx, hard),
        TeamAction::RecoverHard => recover(ctx, true),
        TeamAction::AutoRecover { all } => auto_recover(ctx, all),
        TeamAction::RecommendPreset {
            budget,
            task_type,
            repo,
        } => recommend(ctx, budget, &task_type, repo),
        TeamAction::AutoHeal { interval } => auto_heal(ctx, interval).await,
        TeamAction::Bootstrap { preset, spawn } => {
            let scope = ctx.authorized_scope("team.bootstrap")?;
            let outcome = scope.scaling().bootstrap(preset, spawn)?;
            ctx.console.render(&outcome, |o| {
                ctx.console.success(&format!(
                    "Bootstrapped {} with preset {} ({})",
                    scope.id(),
                    o.preset,
                    o.source
                ));
                ctx.console.field("added", join_or_none(&o.applied.added));
            })
        }
        TeamAction::Autoscale { apply, dry_run } => {
            let scope = ctx.authorized_scope("team.autoscale")?;
            let outcome = scope.scaling().autoscale(apply, dry_run)?;
            ctx.console.render(&outcome, |o| {
                let target = o
                    .decision
                    .target
                    .map(|p| p.to_string())
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "{} {} -> {}",
                    "Decision:".bold(),
                    o.decision.decision.to_string().cyan(),
                    target
                );
                ctx.console.field("reason", &o.decision.reason);
                ctx.console.field("queue depth", o.decision.inputs.queue_depth);
                ctx.console
                    .field("budget", format!("{:.1}%", o.decision.inputs.budget_pct));
                ctx.console
                    .field("failures (24h)", o.decision.inputs.failure_rate_24h);
                if let Some(applied) = &o.applied {
                    ctx.console
                        .success(&format!("Applied preset {}", applied.preset));
                }
            })
        }
        TeamAction::ScaleToPreset {
            preset,
            hard,
            spawn,
        } => {
            let scope = ctx.authorized_scope("team.scale")?;
            let outcome = scope.scaling().scale_to_preset(preset, hard, spawn)?;
            ctx.console.render(&outcome, |o| {
                ctx.console
                    .success(&format!("Team {} now at preset {}", scope.id(), o.preset));
                ctx.console.field("added", join_or_none(&o.added));
                ctx.console.field("resumed", join_or_none(&o.resumed));
                ctx.console.field("paused", join_or_none(&o.paused));
                ctx.console.field("stopped", join_or_none(&o.stopped));
            })
        }
        TeamAction::Pause => {
            let scope = ctx.authorized_scope("team.pause")?;
            let paused = scope.members().pause_all()?;
            ctx.console.render(&paused, |p| {
                ctx.console
                    .success(&format!("Paused: {}", join_or_none(p)));
            })
        }
        TeamAction::ResumeAll => {
            let scope = ctx.authorized_scope("team.resume-all")?;
            let resumed = scope.members().resume_all()?;
            ctx.console.render(&resumed, |r| {
                ctx.console
                    .success(&format!("Resumed: {}", join_or_none(r)));
            })
        }
        TeamAction::Teardown { note, keep_session } => {
            let scope = ctx.authorized_scope(actions::TEARDOWN)?;
            let summary = scope.teardown(note, keep_session)?;
            ctx.console.render(&summary, |s| {
                ctx.console.success(&format!("Team {} torn down", s.team_id));
                ctx.console
                    .field("stopped members", join_or_none(&s.stopped_members));
            })
        }
        TeamAction::Archive => {
            let scope = ctx.authorized_scope(actions::ARCHIVE)?;
            let key = scope.archive()?;
            ctx.console.render(&key, |k| {
                ctx.console.success(&format!("Archived to {}", k));
            })
        }
        TeamAction::Gc { max_age_days } => {
            ctx.authorize("*", actions::GC)?;
            let report = ctx.fleet.gc(chrono::Duration::days(max_age_days))?;
            ctx.console.render(&report, |r| {
                ctx.console.success("Garbage collection finished");
                ctx.console
                    .field("archives removed", r.archives_removed.len());
                ctx.console.field("cursors pruned", r.cursors_pruned);
                ctx.console.field("claims dropped", r.claims_dropped);
            })
        }
    }
}

fn list(ctx: &Context) -> anyhow::Result<()> {
    let teams = ctx.fleet.list_teams();
    ctx.console.render(&teams, |teams| {
        if teams.is_empty() {
            ctx.console.warn("No teams yet. Create one with `fleet team create <name>`.");
            return;
        }
        ctx.console.print_header("Teams");
        for entry in teams {
            println!(
                "  {:<24} {:<28} {}",
                entry.team_id.bold(),
                entry.name,
                entry.updated_at.format("%Y-%m-%d %H:%M").to_string().dimmed()
            );
        }
    })
}

fn create(ctx: &Context, new: NewTeam) -> anyhow::Result<()> {
    if new.force {
        let id = new
            .team_id
            .clone()
            .unwrap_or_else(|| fleet_core::ids::slugify(&new.name));
        ctx.authorize(&id, actions::TEARDOWN)?;
    }
    let team = ctx.fleet.create_team(new)?;
    ctx.console.render(&team, |t| {
        ctx.console
            .success(&format!("Created team {} ({})", t.team_id, t.name));
        ctx.console.info(&format!("Lead: {}", t.lead_member_id));
    })
}

fn recover(ctx: &Context, hard: bool) -> anyhow::Result<()> {
    let scope = ctx.authorized_scope("team.recover")?;
    let report = scope.recovery().recover(hard)?;
    ctx.console.render(&report, |r| {
        ctx.console.success(&format!(
            "Recovered {} (repaired: {}, expired claims: {}, healed: {})",
            scope.id(),
            join_or_none(&r.resume.repaired_members),
            r.reconcile.expired_claims,
            join_or_none(&r.healed)
        ));
        diagnostics::print_report(&ctx.console, &r.doctor);
    })
}

fn auto_recover(ctx: &Context, all: bool) -> anyhow::Result<()> {
    let team_ids: Vec<String> = if all {
        ctx.fleet
            .list_teams()
            .into_iter()
            .map(|entry| entry.team_id)
            .collect()
    } else {
        vec![ctx.team_id()?.to_string()]
    };

    let mut reports = Vec::new();
    for team_id in &team_ids {
        ctx.authorize(team_id, actions::AUTO_RECOVER)?;
        let report = ctx
            .fleet
            .team(team_id)
            .and_then(|scope| scope.recovery().auto_recover());
        match report {
            Ok(report) => reports.push(report),
            Err(e) if all => warn!("Auto-recover skipped team {}: {}", team_id, e),
            Err(e) => return Err(e.into()),
        }
    }

    ctx.console.render(&reports, |reports| {
        if reports.is_empty() {
            ctx.console.warn("No teams to check");
        }
        for report in reports {
            print_auto_recover(ctx, report);
        }
    })
}

fn print_auto_recover(ctx: &Context, report: &AutoRecoverReport) {
    let summary = format!(
        "{}: doctor {}, {} failures and {} restarts in the last hour",
        report.team_id,
        if report.doctor_ok { "ok" } else { "failing" },
        report.recent_failures,
        report.recent_restarts
    );
    match report.action {
        AutoRecoverAction::None => ctx.console.success(&format!("{} (healthy)", summary)),
        AutoRecoverAction::RecoverHard => {
            ctx.console.warn(&format!("{} -> recovered", summary));
            if let Some(recover) = &report.recover {
                ctx.console.field("healed", join_or_none(&recover.healed));
                ctx.console
                    .field("expired claims", recover.reconcile.expired_claims);
            }
        }
        AutoRecoverAction::RecoverHardFailed => {
            ctx.console.warn(&format!("{} -> recovery failed", summary))
        }
    }
}

fn recommend(
    ctx: &Context,
    budget: Option<f64>,
    task_type: &str,
    repo: Option<PathBuf>,
) -> anyhow::Result<()> {
    let recommendation = if ctx.team_id().is_ok() {
        let scope = ctx.authorized_scope(actions::RECOMMEND)?;
        scope
            .scaling()
            .recommend(budget, task_type, repo.as_deref())
    } else {
        ctx.authorize("*", actions::RECOMMEND)?;
        recommend_preset(&RecommendInputs {
            daily_budget_usd: budget,
            budget_pct: None,
            work_type: task_type.to_string(),
            repo_files: repo
                .as_deref()
                .filter(|path| path.is_dir())
                .map(count_repo_files),
        })
    };
    ctx.console
        .render(&recommendation, |r| print_recommendation(ctx, r))
}

fn print_recommendation(ctx: &Context, recommendation: &Recommendation) {
    println!(
        "{} {}",
        "Recommended preset:".bold(),
        recommendation.preset.to_string().cyan()
    );
    for line in &recommendation.reasoning {
        println!("  - {}", line);
    }
    ctx.console.field(
        "members",
        recommendation
            .composition
            .iter()
            .map(|slot| format!("{} ({}, {})", slot.member_id, slot.agent_type, slot.model))
            .collect::<Vec<_>>()
            .join(", "),
    );
}

async fn auto_heal(ctx: &Context, interval: Option<u64>) -> anyhow::Result<()> {
    let scope = ctx.authorized_scope("team.auto-heal")?;
    let heal_once = || -> anyhow::Result<()> {
        let healed = scope.recovery().auto_heal()?;
        ctx.console.render(&healed, |h| {
            if h.is_empty() {
                ctx.console.info("Nothing to heal");
            } else {
                ctx.console.success(&format!("Healed: {}", h.join(", ")));
            }
        })
    };

    match interval {
        None => heal_once(),
        Some(secs) => {
            ctx.console.info(&format!(
                "Auto-healing {} every {}s (Ctrl-C to stop)",
                scope.id(),
                secs
            ));
            loops::run_every(Duration::from_secs(secs.max(1)), heal_once).await?;
            Ok(())
        }
    }
}

fn print_status(ctx: &Context, status: &TeamStatus) {
    ctx.console
        .print_header(&format!("Team {} ({})", status.team_id, status.name));
    ctx.console.field("state", status.state);
    let live = if status.host_session_live {
        "live".green()
    } else {
        "absent".yellow()
    };
    ctx.console
        .field("host session", format!("{} ({})", status.host_session, live));

    println!();
    println!("{}", "Tasks".bold());
    for (state, count) in status.task_counts.iter().filter(|(_, n)| **n > 0) {
        ctx.console.field(state, count);
    }

    println!();
    println!("{}", "Members".bold());
    for member in &status.members {
        println!(
            "  {:<16} {:<8} {:<8} {}",
            member.member_id.bold(),
            member.role.to_string(),
            member.kind().to_string(),
            member.status
        );
    }
}

fn print_dashboard(ctx: &Context, dashboard: &Dashboard) {
    print_status(ctx, &dashboard.status);

    println!();
    println!("{}", "Messages".bold());
    ctx.console.field("open", dashboard.open_messages);
    ctx.console.field("stale", dashboard.stale_messages);

    if let Some(budget) = &dashboard.budget {
        println!();
        println!("{}", "Budget".bold());
        ctx.console.field(
            "spend",
            format!(
                "${:.2} of ${:.2} ({:.1}%)",
                budget.current_usd, budget.limit_usd, budget.pct
            ),
        );
    }

    if !dashboard.recent_events.is_empty() {
        println!();
        println!("{}", "Recent events".bold());
        for event in &dashboard.recent_events {
            println!(
                "  {:>5} {} {}",
                event.id.to_string().dimmed(),
                event.ts.format("%H:%M:%S"),
                event.event_type
            );
        }
    }
}

pub(crate) fn join_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "none".to_string()
    } else {
        items.join(", ")
    }
}
