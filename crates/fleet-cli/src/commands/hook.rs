//! `fleet hook ...`: called from agent session hooks
//!
//! Spawned panes export `FLEET_TEAM` and `FLEET_MEMBER`, so hooks usually
//! need no flags beyond the session id.

use super::Context;
use crate::args::HookAction;
use crate::loops;
use fleet_core::lifecycle::HeartbeatReport;
use std::time::Duration;

pub async fn run(ctx: &Context, action: HookAction) -> anyhow::Result<()> {
    match action {
        HookAction::SessionStart {
            session_id,
            member,
            pid,
            tty,
        } => {
            let scope = ctx.authorized_scope("hook.session-start")?;
            let outcome = scope
                .members()
                .session_start(&member, &session_id, pid, tty)?;
            ctx.console.render(&outcome, |o| {
                ctx.console.success(&format!(
                    "{} bound to session {} ({} queued messages delivered)",
                    o.member.member_id, session_id, o.flushed
                ));
            })
        }
        HookAction::Heartbeat { member, interval } => {
            let scope = ctx.authorized_scope("hook.heartbeat")?;
            let beat = || -> anyhow::Result<()> {
                let report = scope.members().heartbeat(member.as_deref())?;
                ctx.console
                    .render(&report, |r| print_heartbeat(ctx, r))
            };
            match interval {
                None => beat(),
                Some(secs) => {
                    loops::run_every(Duration::from_secs(secs.max(1)), beat).await?;
                    Ok(())
                }
            }
        }
        HookAction::SessionEnd { member } => {
            let scope = ctx.authorized_scope("hook.session-end")?;
            let closed = scope.members().session_end(&member)?;
            ctx.console.render(&closed, |m| {
                ctx.console
                    .success(&format!("{} closed", m.member_id));
            })
        }
        HookAction::SessionEvents { session_id } => {
            let scope = ctx.authorized_scope("hook.session-events")?;
            let events = scope.members().session_events(&session_id)?;
            // Hooks feed this straight back to the agent, so always emit JSON
            println!("{}", serde_json::to_string(&events)?);
            Ok(())
        }
    }
}

fn print_heartbeat(ctx: &Context, report: &HeartbeatReport) {
    ctx.console.info(&format!(
        "renewed {}, expired {}, idle {}",
        report.renewed.len(),
        report.expired.len(),
        report.idle.len()
    ));
    for expired in &report.expired {
        ctx.console.warn(&format!(
            "Lease on {} held by {} expired",
            expired.task_id, expired.previous_owner
        ));
    }
    for member in &report.idle {
        ctx.console.warn(&format!("{} is idle", member));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::context;
    use crate::policy::Role;
    use fleet_core::{MemberKind, MemberStatus, NewMember};

    #[tokio::test]
    async fn test_session_lifecycle_hooks() {
        let ctx = context(Role::Lead);
        let scope = ctx.scope().unwrap();
        scope
            .members()
            .add_member(NewMember::teammate("coder-1", MemberKind::Session))
            .unwrap();

        run(
            &ctx,
            HookAction::SessionStart {
                session_id: "s1".to_string(),
                member: "coder-1".to_string(),
                pid: None,
                tty: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(
            scope.members().get("coder-1").unwrap().session_id(),
            Some("s1")
        );

        run(
            &ctx,
            HookAction::Heartbeat {
                member: Some("coder-1".to_string()),
                interval: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(
            scope.members().get("coder-1").unwrap().status,
            MemberStatus::Active
        );

        run(
            &ctx,
            HookAction::SessionEnd {
                member: "coder-1".to_string(),
            },
        )
        .await
        .unwrap();
        assert_eq!(
            scope.members().get("coder-1").unwrap().status,
            MemberStatus::Closed
        );
    }
}
