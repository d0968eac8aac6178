//! `fleet member ...`

use super::Context;
use super::team::join_or_none;
use crate::args::MemberAction;
use crate::policy::actions;
use colored::*;
use fleet_core::events::InterruptMode;
use fleet_core::team::Role;
use fleet_core::{Member, NewMember, SpawnOptions};

pub fn run(ctx: &Context, action: MemberAction) -> anyhow::Result<()> {
    match action {
        MemberAction::List => {
            let scope = ctx.authorized_scope("member.list")?;
            let members = scope.members().list()?;
            ctx.console.render(&members, |members| {
                ctx.console.print_header(&format!("Members of {}", scope.id()));
                for member in members {
                    print_member(member);
                }
            })
        }
        MemberAction::Add {
            member,
            kind,
            name,
            agent_type,
            model,
            cwd,
        } => {
            let scope = ctx.authorized_scope("member.add")?;
            let added = scope.members().add_member(NewMember {
                member_id: member,
                name,
                role: Role::Teammate,
                kind,
                agent_type,
                model,
                cwd,
            })?;
            report_member(ctx, &added, "Added")
        }
        MemberAction::Attach {
            member,
            session_id,
            pid,
            tty,
        } => {
            let scope = ctx.authorized_scope("member.attach")?;
            let outcome = scope.members().attach(&member, &session_id, pid, tty)?;
            ctx.console.render(&outcome, |o| {
                ctx.console.success(&format!(
                    "Attached {} to session {}",
                    o.member.member_id, session_id
                ));
                if o.flushed > 0 {
                    ctx.console
                        .info(&format!("Delivered {} queued messages", o.flushed));
                }
            })
        }
        MemberAction::Spawn {
            member,
            prompt,
            cwd,
            agent_type,
            model,
        } => {
            let scope = ctx.authorized_scope("member.spawn")?;
            let spawned = scope.members().spawn(
                &member,
                SpawnOptions {
                    prompt,
                    cwd,
                    agent_type,
                    model,
                },
            )?;
            report_member(ctx, &spawned, "Spawned")
        }
        MemberAction::Focus { member } => {
            let scope = ctx.authorized_scope("member.focus")?;
            let pane = scope.members().focus(&member)?;
            ctx.console.render(&pane, |p| {
                ctx.console.success(&format!("Focused {} ({})", member, p));
            })
        }
        MemberAction::Interrupt { member, message } => {
            let scope = ctx.authorized_scope(actions::INTERRUPT)?;
            let mode = scope.members().interrupt(&member, message.as_deref())?;
            ctx.console.render(&mode, |m| {
                let via = match m {
                    InterruptMode::Pane => "pane keys",
                    InterruptMode::Signal => "SIGINT",
                    InterruptMode::Inbox => "inbox notice",
                    InterruptMode::Mailbox => "mailbox notice",
                };
                ctx.console
                    .success(&format!("Interrupted {} via {}", member, via));
            })
        }
        MemberAction::Restart { member } => {
            let scope = ctx.authorized_scope("member.restart")?;
            let outcome = scope.members().restart(&member)?;
            ctx.console.render(&outcome, |o| {
                let how = if o.respawned {
                    "respawned"
                } else {
                    "restart requested"
                };
                ctx.console
                    .success(&format!("{} {}", o.member_id, how));
                ctx.console
                    .field("resumed tasks", join_or_none(&o.resumed_tasks));
            })
        }
        MemberAction::Replace {
            old,
            new,
            stop_old,
            spawn,
        } => {
            let scope = ctx.authorized_scope("member.replace")?;
            let outcome = scope.members().replace(&old, &new, stop_old, spawn)?;
            ctx.console.render(&outcome, |o| {
                ctx.console.success(&format!(
                    "Replaced {} with {}",
                    o.old_member_id, o.new_member_id
                ));
                ctx.console
                    .field("tasks", join_or_none(&o.transferred_tasks));
                ctx.console.field("workers", o.transferred_workers);
            })
        }
        MemberAction::Clone { source, new } => {
            let scope = ctx.authorized_scope("member.clone")?;
            let cloned = scope.members().clone_member(&source, &new)?;
            report_member(ctx, &cloned, "Cloned")
        }
        MemberAction::Pause { member } => {
            let scope = ctx.authorized_scope("member.pause")?;
            let paused = scope.members().pause(&member)?;
            report_member(ctx, &paused, "Paused")
        }
        MemberAction::Resume { member } => {
            let scope = ctx.authorized_scope("member.resume")?;
            let resumed = scope.members().resume(&member)?;
            report_member(ctx, &resumed, "Resumed")
        }
        MemberAction::Stop { member, kill_pane } => {
            let scope = ctx.authorized_scope("member.stop")?;
            let stopped = scope.members().stop(&member, kill_pane)?;
            report_member(ctx, &stopped, "Stopped")
        }
    }
}

fn report_member(ctx: &Context, member: &Member, verb: &str) -> anyhow::Result<()> {
    ctx.console.render(member, |m| {
        ctx.console
            .success(&format!("{} {} ({})", verb, m.member_id, m.status));
    })
}

fn print_member(member: &Member) {
    let binding = member
        .pane_id()
        .or(member.session_id())
        .unwrap_or("-");
    println!(
        "  {:<16} {:<9} {:<8} {:<18} {}",
        member.member_id.bold(),
        member.role.to_string(),
        member.kind().to_string(),
        member.status.to_string(),
        binding.dimmed()
    );
}
