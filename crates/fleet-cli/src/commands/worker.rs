//! `fleet worker ...`

use super::Context;
use crate::args::WorkerAction;
use colored::*;

pub fn run(ctx: &Context, action: WorkerAction) -> anyhow::Result<()> {
    match action {
        WorkerAction::List => {
            let scope = ctx.authorized_scope("worker.list")?;
            let board = scope.workers().board();
            ctx.console.render(&board.workers, |workers| {
                if workers.is_empty() {
                    ctx.console.info("No workers registered");
                    return;
                }
                ctx.console.print_header(&format!("Workers of {}", scope.id()));
                for worker in workers {
                    let state = match (&worker.status, worker.reported) {
                        (Some(status), true) => status.green(),
                        (Some(status), false) => status.yellow(),
                        (None, _) => "running".normal(),
                    };
                    println!(
                        "  {:<20} {:<10} {:<12} {}",
                        worker.worker_task_id.bold(),
                        worker.task_id.as_deref().unwrap_or("-"),
                        worker.member_id.as_deref().unwrap_or("-"),
                        state
                    );
                }
            })
        }
        WorkerAction::Register {
            worker_task_id,
            task,
            member,
            auto_complete,
        } => {
            let scope = ctx.authorized_scope("worker.register")?;
            let binding = scope.workers().register(
                &worker_task_id,
                task.as_deref(),
                member.as_deref(),
                auto_complete,
            )?;
            ctx.console.render(&binding, |b| {
                ctx.console
                    .success(&format!("Registered worker {}", b.worker_task_id));
            })
        }
        WorkerAction::AttachResult {
            worker_task_id,
            status,
            summary,
        } => {
            let scope = ctx.authorized_scope("worker.attach-result")?;
            let result = scope
                .workers()
                .attach_result(&worker_task_id, &status, summary)?;
            ctx.console.render(&result, |r| {
                ctx.console.success(&format!(
                    "Recorded {} result for {}",
                    r.status, worker_task_id
                ));
            })
        }
        WorkerAction::Bridge => {
            let scope = ctx.authorized_scope("worker.bridge")?;
            let bridged = scope.workers().bridge()?;
            ctx.console.render(&bridged, |n| {
                ctx.console.success(&format!("Bridged {} worker results", n));
            })
        }
    }
}
