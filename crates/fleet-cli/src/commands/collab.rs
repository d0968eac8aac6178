//! `fleet collab ...`

use super::Context;
use super::team::join_or_none;
use crate::args::{CollabAction, HandoffAction, OwnershipAction};
use crate::policy::actions;
use colored::*;
use fleet_core::collab::{HandoffView, WhoReport};
use fleet_core::team::Ownership;

pub fn run(ctx: &Context, action: CollabAction) -> anyhow::Result<()> {
    match action {
        CollabAction::Who => {
            let scope = ctx.authorized_scope(actions::WHO)?;
            let who = scope.collab().who()?;
            ctx.console.render(&who, |w| print_who(ctx, w))
        }
        CollabAction::Handoff {
            action: HandoffAction::Create { by, note },
        } => {
            let scope = ctx.authorized_scope(actions::HANDOFF_CREATE)?;
            let handoff = scope.collab().create_handoff(&by, note)?;
            ctx.console.render(&handoff, |h| {
                ctx.console
                    .success(&format!("Created handoff {}", h.handoff_id));
                ctx.console.field("open tasks", h.open_tasks.len());
                ctx.console.field("open messages", h.open_messages);
            })
        }
        CollabAction::Handoff {
            action: HandoffAction::Latest,
        } => {
            let scope = ctx.authorized_scope(actions::HANDOFF_LATEST)?;
            let view = scope.collab().latest_handoff()?;
            ctx.console.render(&view, |v| match v {
                Some(view) => print_handoff(ctx, view),
                None => ctx
                    .console
                    .warn("No handoff yet. Create one with `fleet collab handoff create`."),
            })
        }
        CollabAction::Ownership {
            action:
                OwnershipAction::Set {
                    owners,
                    escalation,
                    project,
                },
        } => {
            let scope = ctx.authorized_scope(actions::OWNERSHIP_SET)?;
            let ownership = scope.collab().set_ownership(owners, escalation, project)?;
            ctx.console.render(&ownership, |o| {
                ctx.console
                    .success(&format!("Ownership of {} updated", scope.id()));
                print_ownership(ctx, o);
            })
        }
        CollabAction::Ownership {
            action: OwnershipAction::Get,
        } => {
            let scope = ctx.authorized_scope(actions::OWNERSHIP_GET)?;
            let ownership = scope.collab().ownership()?;
            ctx.console.render(&ownership, |o| match o {
                Some(ownership) => print_ownership(ctx, ownership),
                None => ctx.console.warn("No ownership recorded"),
            })
        }
        CollabAction::Presence { member, presence } => {
            let scope = ctx.authorized_scope(actions::PRESENCE)?;
            let updated = scope.collab().set_presence(&member, presence)?;
            ctx.console.render(&updated, |m| {
                ctx.console
                    .success(&format!("{} is now {}", m.member_id, presence));
            })
        }
    }
}

fn print_ownership(ctx: &Context, ownership: &Ownership) {
    ctx.console.field("owners", join_or_none(&ownership.owners));
    ctx.console
        .field("escalation", join_or_none(&ownership.escalation));
    ctx.console
        .field("project", ownership.project.as_deref().unwrap_or("-"));
}

fn print_who(ctx: &Context, who: &WhoReport) {
    ctx.console.print_header(&format!("Who is on {}", who.team_id));
    for row in &who.members {
        let presence = row
            .presence
            .map(|p| p.to_string())
            .unwrap_or_else(|| "-".to_string());
        let seen = row
            .last_activity
            .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {:<16} {:<8} {:<10} {:<12} {}",
            row.member_id.bold(),
            row.role.to_string(),
            presence,
            row.status.to_string(),
            seen.dimmed()
        );
    }
    if let Some(ownership) = &who.ownership {
        println!();
        print_ownership(ctx, ownership);
    }
}

fn print_handoff(ctx: &Context, view: &HandoffView) {
    let handoff = &view.handoff;
    ctx.console.print_header(&format!(
        "Handoff {} by {}",
        handoff.handoff_id, handoff.created_by
    ));
    if let Some(note) = &handoff.note {
        ctx.console.field("note", note);
    }
    ctx.console.field("state", handoff.state);
    ctx.console.field("open messages", handoff.open_messages);

    println!();
    println!("{}", "Open tasks".bold());
    for task in &handoff.open_tasks {
        println!(
            "  {:<8} {:<12} {:<12} {}",
            task.task_id.bold(),
            task.status.to_string(),
            task.claimed_by.as_deref().unwrap_or("-"),
            task.title
        );
    }

    if !view.task_delta.is_empty() {
        println!();
        println!("{}", "Since then".bold());
        for (status, delta) in &view.task_delta {
            ctx.console.field(status, format!("{:+}", delta));
        }
    }
    for event in &view.events_since {
        println!(
            "  {:>5} {} {}",
            event.id.to_string().dimmed(),
            event.ts.format("%H:%M:%S"),
            event.event_type
        );
    }
}
