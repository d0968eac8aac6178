//! `fleet task ...`

use super::Context;
use crate::args::TaskAction;
use crate::policy::actions;
use colored::*;
use fleet_core::{NewTask, Task, TaskStatus};
use serde::Serialize;

/// Task with its lease, for `task show`
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TaskDetail {
    #[serde(flatten)]
    task: Task,
    claim: Option<fleet_core::tasks::Claim>,
}

/// Force overrides ownership checks, so it is gated separately
fn action_for(verb: &'static str, force: bool) -> &'static str {
    if force { actions::FORCE_CLAIM } else { verb }
}

pub fn run(ctx: &Context, action: TaskAction) -> anyhow::Result<()> {
    match action {
        TaskAction::Add {
            title,
            id,
            description,
            depends_on,
            files,
            priority,
            created_by,
        } => {
            let scope = ctx.authorized_scope("task.add")?;
            let task = scope.tasks().add(NewTask {
                task_id: id,
                title,
                description,
                depends_on,
                files,
                priority,
                created_by,
            })?;
            ctx.console.render(&task, |t| {
                ctx.console
                    .success(&format!("Added {} \"{}\" ({})", t.task_id, t.title, t.status));
            })
        }
        TaskAction::List { status, owner } => {
            let scope = ctx.authorized_scope("task.list")?;
            let tasks = scope.tasks().list(status, owner.as_deref());
            ctx.console.render(&tasks, |tasks| {
                if tasks.is_empty() {
                    ctx.console.warn("No matching tasks");
                    return;
                }
                ctx.console.print_header(&format!("Tasks of {}", scope.id()));
                for task in tasks {
                    print_task_row(task);
                }
            })
        }
        TaskAction::Show { task } => {
            let scope = ctx.authorized_scope("task.list")?;
            let detail = TaskDetail {
                task: scope.tasks().get(&task)?,
                claim: scope.tasks().claim_of(&task),
            };
            ctx.console.render(&detail, |d| print_detail(ctx, d))
        }
        TaskAction::Claim {
            task,
            member,
            ttl,
            force,
        } => {
            let scope = ctx.authorized_scope(action_for("task.claim", force))?;
            let outcome = scope.tasks().claim(&task, &member, ttl, force)?;
            ctx.console.render(&outcome, |o| {
                ctx.console.success(&format!(
                    "{} claimed {} until {}",
                    o.claim.claimed_by,
                    o.task.task_id,
                    o.claim.expires_at.format("%H:%M:%S")
                ));
                for conflict in &o.conflicts {
                    ctx.console
                        .warn(&format!("Forced over file conflict: {}", conflict));
                }
            })
        }
        TaskAction::Update {
            task,
            status,
            member,
            note,
            force,
        } => {
            let scope = ctx.authorized_scope(action_for("task.update", force))?;
            let updated = scope
                .tasks()
                .update_status(&task, status, member.as_deref(), note, force)?;
            ctx.console.render(&updated, |t| {
                ctx.console
                    .success(&format!("{} is now {}", t.task_id, t.status));
            })
        }
        TaskAction::ReleaseClaim {
            task,
            member,
            force,
        } => {
            let scope = ctx.authorized_scope(action_for("task.release", force))?;
            let released = scope.tasks().release(&task, &member, force)?;
            ctx.console.render(&released, |t| {
                ctx.console
                    .success(&format!("Released {} ({})", t.task_id, t.status));
            })
        }
        TaskAction::Decompose {
            goal,
            template,
            prefix,
            created_by,
        } => {
            let scope = ctx.authorized_scope("task.add")?;
            let tasks = scope
                .tasks()
                .decompose(&goal, template, &prefix, created_by.as_deref())?;
            ctx.console.render(&tasks, |tasks| {
                ctx.console.success(&format!(
                    "Decomposed \"{}\" into {} tasks ({})",
                    goal,
                    tasks.len(),
                    template
                ));
                for task in tasks {
                    print_task_row(task);
                }
            })
        }
    }
}

fn status_colored(status: TaskStatus) -> ColoredString {
    let s = status.as_str();
    match status {
        TaskStatus::Completed => s.green(),
        TaskStatus::Blocked => s.red(),
        TaskStatus::InProgress | TaskStatus::Claimed => s.cyan(),
        _ => s.normal(),
    }
}

fn print_task_row(task: &Task) {
    println!(
        "  {:<14} {:<12} {:<12} {}",
        task.task_id.bold(),
        status_colored(task.status),
        task.claimed_by.as_deref().unwrap_or("-"),
        task.title
    );
}

fn print_detail(ctx: &Context, detail: &TaskDetail) {
    let task = &detail.task;
    ctx.console
        .print_header(&format!("{} - {}", task.task_id, task.title));
    ctx.console.field("status", status_colored(task.status));
    ctx.console.field("priority", task.priority);
    ctx.console
        .field("owner", task.claimed_by.as_deref().unwrap_or("-"));
    if !task.depends_on.is_empty() {
        ctx.console.field("depends on", task.depends_on.join(", "));
    }
    if !task.files.is_empty() {
        ctx.console.field("files", task.files.join(", "));
    }
    if !task.description.is_empty() {
        ctx.console.field("description", &task.description);
    }
    if let Some(claim) = &detail.claim {
        ctx.console.field(
            "lease",
            format!(
                "{} until {} ({:?})",
                claim.claimed_by,
                claim.expires_at.to_rfc3339(),
                claim.status
            ),
        );
    }

    if !task.history.is_empty() {
        println!();
        println!("{}", "History".bold());
        for entry in &task.history {
            println!(
                "  {} {:<16} {:<12} {}",
                entry.ts.format("%Y-%m-%d %H:%M:%S").to_string().dimmed(),
                entry.action,
                entry.by,
                entry.note.as_deref().unwrap_or("")
            );
        }
    }
}
